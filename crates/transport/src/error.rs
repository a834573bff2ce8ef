use thiserror::Error;

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum TransportError {
    #[error("no such element: {0}")]
    NoSuchElement(String),
    #[error("no such session")]
    NoSuchSession,
    #[error("request timed out after {0}ms")]
    Timeout(u64),
    #[error("driver returned status {status}: {message}")]
    Protocol { status: u16, message: String },
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

impl TransportError {
    pub fn is_no_such_element(&self) -> bool {
        matches!(self, TransportError::NoSuchElement(_))
    }
}

pub type TransportResult<T> = Result<T, TransportError>;
