//! # pizzino-shared
//!
//! Types shared between the Pizzino store and node: identifiers, datagrams,
//! key-exchange bundles, and the capability traits through which the node
//! reaches its cryptographic and wire-codec collaborators.

pub mod codec;
pub mod constants;
pub mod datagram;
pub mod error;
pub mod handshake;
pub mod session;
pub mod types;

pub use codec::{BincodeCodec, DatagramCodec};
pub use datagram::{Datagram, Protocol, StoredMessage};
pub use error::{CodecError, SessionError};
pub use handshake::{KeyExchangeData, KeyExchangeDataBundle, OnetimePreKey};
pub use session::{HandshakeOutcome, SessionProvider, TransparentSession};
pub use types::{DatagramId, PublicKey, UserId};
