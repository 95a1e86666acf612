//! Error types for region construction and input validation.
//!
//! Learning itself never fails: empty neighborhoods, empty duty-cycle histories and
//! cells without matching segments all have defined fallbacks. Errors are only
//! raised when the engine is configured inconsistently or fed a grid of the wrong shape.

use thiserror::Error;

/// Errors raised while building or driving a region.
#[derive(Error, Debug)]
pub enum HtmError {
    /// A configuration value is outside its valid range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The supplied column layout does not match `columns_count`.
    #[error("Column count mismatch: expected {expected}, got {actual}")]
    ColumnCountMismatch {
        /// Columns requested by the configuration.
        expected: usize,
        /// Columns present in the layout.
        actual: usize,
    },

    /// A column was wired with the wrong number of potential synapses.
    #[error("Column {column} has {actual} potential synapses, expected {expected}")]
    SynapseCountMismatch {
        /// Offending column index.
        column: usize,
        /// Synapses requested by the configuration.
        expected: usize,
        /// Synapses present in the layout.
        actual: usize,
    },

    /// A column anchor or synapse source lies outside the input grid.
    #[error("Coordinate ({x}, {y}) is outside the {width}x{height} input grid")]
    CoordinateOutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },

    /// The grid handed to a tick has different dimensions than the configured input space.
    #[error("Invalid input shape: expected {expected_width}x{expected_height}, got {width}x{height}")]
    InputShape {
        expected_width: usize,
        expected_height: usize,
        width: usize,
        height: usize,
    },

    /// A configuration document could not be parsed or rendered.
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, HtmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HtmError::ColumnCountMismatch {
            expected: 16,
            actual: 9,
        };
        assert_eq!(err.to_string(), "Column count mismatch: expected 16, got 9");

        let err = HtmError::InputShape {
            expected_width: 4,
            expected_height: 4,
            width: 5,
            height: 4,
        };
        assert_eq!(err.to_string(), "Invalid input shape: expected 4x4, got 5x4");
    }

    #[test]
    fn test_config_error_conversion() {
        let parse = serde_json::from_str::<serde_json::Value>("{ nope");
        let err: HtmError = parse.unwrap_err().into();
        assert!(matches!(err, HtmError::Config(_)));
    }
}
