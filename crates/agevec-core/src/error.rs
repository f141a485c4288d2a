use thiserror::Error;

pub type AgevecResult<T> = Result<T, AgevecError>;

#[derive(Debug, Error)]
pub enum AgevecError {
    #[error("config error: {0}")]
    Config(String),

    #[error("unknown expectation: {0:?}")]
    UnknownExpectation(String),

    #[error("malformed vector file: {0}")]
    MalformedVector(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
