use icn_common::PacketType;

/// Errors raised while building or validating names and messages
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Invalid name URI: {0}")]
    InvalidName(String),
    #[error("Name has {count} components, limit is {limit}")]
    TooManyComponents { count: usize, limit: usize },
    #[error("Malformed {kind} message: {reason}")]
    Malformed {
        kind: PacketType,
        reason: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
