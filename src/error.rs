use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    IoError(io::Error),
    ReadError(&'static str, io::Error),
    WriteError(&'static str, io::Error),
    Decode(String, serde_json::Error),
    Encode(String, serde_json::Error),
    UnknownStrategy(String),
    NotASequence(String),
    InvalidPayload(String),
    CollectionTypeMismatch(String),
    NoRuntime,
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::IoError(err)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IoError(err) => write!(f, "I/O error: {}", err),
            Error::ReadError(context, err) => write!(f, "Failed to read {}: {}", context, err),
            Error::WriteError(context, err) => write!(f, "Failed to write {}: {}", context, err),
            Error::Decode(context, err) => write!(f, "Failed to decode {}: {}", context, err),
            Error::Encode(context, err) => write!(f, "Failed to encode {}: {}", context, err),
            Error::UnknownStrategy(name) => write!(f, "Unknown storage strategy: {}", name),
            Error::NotASequence(name) => {
                write!(f, "Payload entry for collection {} is not an array", name)
            }
            Error::InvalidPayload(msg) => write!(f, "Invalid payload: {}", msg),
            Error::CollectionTypeMismatch(name) => write!(
                f,
                "Collection {} is already open with a different element type",
                name
            ),
            Error::NoRuntime => write!(f, "No tokio runtime available for write-back"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(err) | Error::ReadError(_, err) | Error::WriteError(_, err) => Some(err),
            Error::Decode(_, err) | Error::Encode(_, err) => Some(err),
            _ => None,
        }
    }
}
