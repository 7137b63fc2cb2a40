//! Core error types for SQuery

#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    #[error("Received too many challenge key responses ({attempts} attempts)")]
    ChallengeRetryExceeded { attempts: usize },

    #[error("Missing packet #{index} for transaction 0x{transaction:08x}")]
    MissingFragment { transaction: u32, index: u8 },

    #[error("Invalid bzip packet: {0}")]
    InvalidCompressedPacket(String),

    #[error("Request timed out")]
    Timeout,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = QueryError::MissingFragment { transaction: 0x8000_0001, index: 2 };
        assert_eq!(err.to_string(), "Missing packet #2 for transaction 0x80000001");

        let err = QueryError::ChallengeRetryExceeded { attempts: 3 };
        assert!(err.to_string().contains("3 attempts"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::from(std::io::ErrorKind::ConnectionRefused);
        let err: QueryError = io.into();
        assert!(matches!(err, QueryError::Io(_)));
    }
}
