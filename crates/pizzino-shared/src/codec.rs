//! Wire encoding of datagram batches, id lists and key-exchange material.
//!
//! The node never interprets these bytes beyond what routing needs, so the
//! encoding sits behind [`DatagramCodec`] and can be swapped without touching
//! the store or the classifier.

use serde::{de::DeserializeOwned, Serialize};

use crate::datagram::Datagram;
use crate::error::CodecError;
use crate::handshake::{KeyExchangeData, KeyExchangeDataBundle};
use crate::types::DatagramId;

pub trait DatagramCodec: Send + Sync {
    fn pack_datagrams(&self, datagrams: &[Datagram]) -> Result<Vec<u8>, CodecError>;

    fn unpack_datagrams(&self, data: &[u8]) -> Result<Vec<Datagram>, CodecError>;

    fn pack_id_list(&self, ids: &[DatagramId]) -> Result<Vec<u8>, CodecError>;

    fn unpack_id_list(&self, data: &[u8]) -> Result<Vec<DatagramId>, CodecError>;

    fn pack_key_exchange(&self, data: &KeyExchangeData) -> Result<Vec<u8>, CodecError>;

    fn unpack_bundle(&self, data: &[u8]) -> Result<KeyExchangeDataBundle, CodecError>;
}

/// Default codec: bincode over the serde representation.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl BincodeCodec {
    fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
        bincode::serialize(value).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T, CodecError> {
        bincode::deserialize(data).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

impl DatagramCodec for BincodeCodec {
    fn pack_datagrams(&self, datagrams: &[Datagram]) -> Result<Vec<u8>, CodecError> {
        Self::encode(datagrams)
    }

    fn unpack_datagrams(&self, data: &[u8]) -> Result<Vec<Datagram>, CodecError> {
        Self::decode(data)
    }

    fn pack_id_list(&self, ids: &[DatagramId]) -> Result<Vec<u8>, CodecError> {
        Self::encode(ids)
    }

    fn unpack_id_list(&self, data: &[u8]) -> Result<Vec<DatagramId>, CodecError> {
        Self::decode(data)
    }

    fn pack_key_exchange(&self, data: &KeyExchangeData) -> Result<Vec<u8>, CodecError> {
        Self::encode(data)
    }

    fn unpack_bundle(&self, data: &[u8]) -> Result<KeyExchangeDataBundle, CodecError> {
        Self::decode(data)
    }
}
