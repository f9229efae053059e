//! Error types for the model layer

/// Errors raised while materializing raw records into instances
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Record is not a JSON object
    #[error("record is not an object")]
    NotAnObject,

    /// Record lacks a usable `type` field
    #[error("record has no type")]
    MissingType,

    /// Record lacks a usable numeric `id` field
    #[error("record of type {object_type} has no numeric id")]
    MissingId {
        /// Type named by the record
        object_type: String,
    },

    /// Record identity does not match the instance it was merged into
    #[error("record {found} cannot be merged into {expected}")]
    IdentityMismatch {
        /// Identity of the target instance
        expected: String,
        /// Identity carried by the record
        found: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_error_display() {
        let err = ModelError::MissingId {
            object_type: "Control".to_string(),
        };
        assert_eq!(err.to_string(), "record of type Control has no numeric id");
    }
}
