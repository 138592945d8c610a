// Typed errors returned by task store operations

/// Errors a caller can act on
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No task with this id exists; nothing was changed
    #[error("Task not found: {id}")]
    NotFound { id: String },
}

impl StoreError {
    pub fn not_found(id: impl Into<String>) -> Self {
        StoreError::NotFound { id: id.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = StoreError::not_found("42");
        assert_eq!(err, StoreError::NotFound { id: "42".to_string() });
        assert_eq!(err.to_string(), "Task not found: 42");
    }

    #[test]
    fn test_converts_into_eyre_report() {
        let report: eyre::Report = StoreError::not_found("7").into();
        assert!(report.to_string().contains("7"));
    }
}
