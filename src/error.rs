use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Server list could not be fetched or decoded
    #[error("Network error: {0}")]
    Network(String),

    /// Missing or invalid executable path, missing selection, session already running
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The game process failed to start or exited unsuccessfully
    #[error("Launch error: {0}")]
    Launch(String),

    /// Persisted state could not be read or written
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn launch(msg: impl Into<String>) -> Self {
        Self::Launch(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::configuration("no executable selected");
        assert_eq!(
            err.to_string(),
            "Configuration error: no executable selected"
        );

        let err = Error::launch("exit status: 1");
        assert_eq!(err.to_string(), "Launch error: exit status: 1");
    }
}
