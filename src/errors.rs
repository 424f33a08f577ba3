use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("The path {0} does not exist.")]
    PathNotFound(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Scan {0} already reached a terminal state")]
    AlreadyTerminal(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_not_found_display() {
        let err = ScanError::PathNotFound("/nope".to_string());
        assert_eq!(err.to_string(), "The path /nope does not exist.");
    }

    #[test]
    fn test_not_found_display() {
        let err = ScanError::NotFound("scan xyz".to_string());
        assert_eq!(err.to_string(), "Not found: scan xyz");
    }

    #[test]
    fn test_already_terminal_display() {
        let err = ScanError::AlreadyTerminal("abc".to_string());
        assert_eq!(err.to_string(), "Scan abc already reached a terminal state");
    }

    #[test]
    fn test_internal_display() {
        let err = ScanError::Internal("unexpected".to_string());
        assert_eq!(err.to_string(), "Internal error: unexpected");
    }
}
