use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Missing authorization header")]
    MissingToken,

    #[error("Invalid authorization token: {0}")]
    InvalidToken(String),

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed: invalid ciphertext or unknown session")]
    DecryptionFailed,

    #[error("Key exchange failed: {0}")]
    KeyExchange(String),
}

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Encoding failed: {0}")]
    Encode(String),

    #[error("Decoding failed: {0}")]
    Decode(String),
}

