use thiserror::Error;

/// TermLine unified error type
#[derive(Error, Debug)]
pub enum TermLineError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Terminal error: {message}")]
    Terminal { message: String },

    #[error("Communication timeout")]
    Timeout,

    #[error("Transport is not connected")]
    NotConnected,

    #[error("Terminal has been disposed")]
    Disposed,
}

pub type TermLineResult<T> = Result<T, TermLineError>;
