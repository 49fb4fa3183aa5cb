use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A decoder setting is out of range or could not be parsed.
    #[error("Invalid decoder configuration: {0}")]
    Config(String),

    /// The tracing subscriber could not be installed.
    #[error("Logging setup failed: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, Error>;
