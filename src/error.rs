//! Error taxonomy for the scout core
//!
//! None of these terminate the process. Callers log them with the
//! [`ScoutError::kind`] label and carry on: fetches are retried by the next
//! timer tick, malformed posts are skipped, persistence degrades to memory
//! and failed broadcasts are dropped.

/// Failure classes surfaced by the decision engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScoutError {
    /// Block, account or content fetch failed
    TransientFetch(String),
    /// Post metadata, body or timestamp could not be parsed
    MalformedContent(String),
    /// State store could not be read or written
    Persistence(String),
    /// Vote or report emission failed
    Broadcast(String),
}

impl ScoutError {
    /// Short label used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            ScoutError::TransientFetch(_) => "transient_fetch",
            ScoutError::MalformedContent(_) => "malformed_content",
            ScoutError::Persistence(_) => "persistence",
            ScoutError::Broadcast(_) => "broadcast",
        }
    }

    pub fn fetch(err: impl std::fmt::Display) -> Self {
        ScoutError::TransientFetch(err.to_string())
    }

    pub fn broadcast(err: impl std::fmt::Display) -> Self {
        ScoutError::Broadcast(err.to_string())
    }
}

impl std::fmt::Display for ScoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoutError::TransientFetch(msg) => write!(f, "Fetch failed: {}", msg),
            ScoutError::MalformedContent(msg) => write!(f, "Malformed content: {}", msg),
            ScoutError::Persistence(msg) => write!(f, "State store error: {}", msg),
            ScoutError::Broadcast(msg) => write!(f, "Broadcast failed: {}", msg),
        }
    }
}

impl std::error::Error for ScoutError {}

impl From<std::io::Error> for ScoutError {
    fn from(err: std::io::Error) -> Self {
        ScoutError::Persistence(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels() {
        assert_eq!(ScoutError::fetch("timeout").kind(), "transient_fetch");
        assert_eq!(ScoutError::broadcast("rejected").kind(), "broadcast");
        assert_eq!(
            ScoutError::Persistence("disk full".to_string()).to_string(),
            "State store error: disk full"
        );
    }
}
