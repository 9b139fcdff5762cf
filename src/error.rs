use rust_decimal::Decimal;
use std::fmt::Display;

#[derive(Debug)]
pub enum Error {
    NotFound(String),
    Storage(String),
    Decode(String),
    InvalidAmount,
    Validation(String),
    InsufficientStock {
        available: Decimal,
        requested: Decimal,
    },
    Config(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NotFound(what) => write!(f, "Not found: {}", what),
            Error::Storage(err) => write!(f, "Storage error: {}", err),
            Error::Decode(err) => write!(f, "Decode error: {}", err),
            Error::InvalidAmount => write!(f, "Invalid amount"),
            Error::Validation(msg) => write!(f, "Validation error: {}", msg),
            Error::InsufficientStock {
                available,
                requested,
            } => write!(
                f,
                "Insufficient stock: requested {}g, available {}g",
                requested, available
            ),
            Error::Config(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}
