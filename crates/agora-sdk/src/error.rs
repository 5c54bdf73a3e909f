use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("accepted tokens {accepted_tokens} must be a positive multiple of {trunc_factor}")]
    InvalidAcceptAmount {
        accepted_tokens: u64,
        trunc_factor: u64,
    },

    #[error("accepted tokens {accepted_tokens} exceed offered tokens {offered_tokens}")]
    AcceptAmountTooLarge {
        accepted_tokens: u64,
        offered_tokens: u64,
    },

    #[error("remaining tokens {remainder_tokens} are not a multiple of {trunc_factor}")]
    UnalignedRemainder {
        remainder_tokens: u64,
        trunc_factor: u64,
    },

    #[error("invalid offer parameters: {0}")]
    InvalidOfferParams(String),

    #[error("missing parameter: {0}")]
    MissingParameter(&'static str),

    #[error("unsupported token protocol: {0}")]
    UnsupportedProtocol(String),

    #[error("unparseable offer: {0}")]
    UnparseableOffer(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("insufficient input value: have {available} sats, need {required} sats")]
    InsufficientInputValue { available: u64, required: u64 },

    #[error("input {0} has no sign data")]
    MissingSignData(usize),

    #[error("input {0} has no signatory")]
    MissingSignatory(usize),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("encoding error: {0}")]
    Encoding(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Error::Encoding(e.to_string())
    }
}

impl From<bitcoin::secp256k1::Error> for Error {
    fn from(e: bitcoin::secp256k1::Error) -> Self {
        Error::Signing(e.to_string())
    }
}

impl From<bitcoin::script::Error> for Error {
    fn from(e: bitcoin::script::Error) -> Self {
        Error::Encoding(e.to_string())
    }
}

impl From<bitcoin::script::PushBytesError> for Error {
    fn from(e: bitcoin::script::PushBytesError) -> Self {
        Error::Encoding(e.to_string())
    }
}
