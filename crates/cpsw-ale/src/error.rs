//! ALE error types.
//!
//! Every table, control and classifier operation reports its outcome
//! through [`AleError`]. None of them is fatal: the caller decides how to
//! react to a full table or a missing entry.

use thiserror::Error;

/// Error type for ALE operations.
#[derive(Debug, Error)]
pub enum AleError {
    /// Bad port, control, value or field for the active variant.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// The requested entry or VLAN is not in the table.
    #[error("Not found: {item}")]
    NotFound { item: String },

    /// No free or ageable slot is left.
    #[error("Table full: {table}")]
    ResourceExhausted { table: String },

    /// The operation is not meaningful for the active variant.
    #[error("Not supported: {feature}")]
    Unsupported { feature: String },

    /// The device identity does not match any known variant.
    #[error("Unknown ALE device id: {0}")]
    UnknownDevice(String),

    /// The hardware reported a configuration the engine cannot use.
    #[error("Invalid hardware configuration: {message}")]
    InvalidHardware { message: String },

    /// Construction parameters could not be loaded or validated.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (parameter files, aging worker spawn).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AleError {
    /// Creates an invalid argument error with a message.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        AleError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a not found error with an item description.
    pub fn not_found(item: impl Into<String>) -> Self {
        AleError::NotFound { item: item.into() }
    }

    /// Creates a table full error.
    pub fn table_full(table: impl Into<String>) -> Self {
        AleError::ResourceExhausted {
            table: table.into(),
        }
    }

    /// Creates an unsupported error with a feature description.
    pub fn unsupported(feature: impl Into<String>) -> Self {
        AleError::Unsupported {
            feature: feature.into(),
        }
    }

    /// Creates an invalid hardware error.
    pub fn invalid_hardware(message: impl Into<String>) -> Self {
        AleError::InvalidHardware {
            message: message.into(),
        }
    }

    /// Returns true if this is a not found outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AleError::NotFound { .. })
    }

    /// Returns true if the table ran out of slots.
    pub fn is_resource_exhausted(&self) -> bool {
        matches!(self, AleError::ResourceExhausted { .. })
    }

    /// Returns true if the error was raised before touching hardware
    /// because an argument was rejected.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, AleError::InvalidArgument { .. })
    }
}

/// Result type for ALE operations.
pub type AleResult<T> = Result<T, AleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        assert!(AleError::not_found("vlan 10").is_not_found());
        assert!(AleError::table_full("ale").is_resource_exhausted());
        assert!(AleError::invalid_argument("port 9").is_invalid_argument());
        assert!(matches!(
            AleError::unsupported("policer"),
            AleError::Unsupported { .. }
        ));
    }

    #[test]
    fn test_display() {
        let err = AleError::not_found("ucast 00:11:22:33:44:55 vid 0");
        assert_eq!(err.to_string(), "Not found: ucast 00:11:22:33:44:55 vid 0");

        let err = AleError::UnknownDevice("am99".to_string());
        assert_eq!(err.to_string(), "Unknown ALE device id: am99");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: AleError = io.into();
        assert!(matches!(err, AleError::Io(_)));
        assert!(!err.is_not_found());
    }
}
