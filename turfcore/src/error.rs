//! Unified error handling for the turf core library.
//!
//! Geometry functions never fail; these errors cover input that cannot form
//! a capture, invalid samples, and form validation.

use thiserror::Error;

/// Unified error type for turf core operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TurfError {
    /// Polygon or path has too few points for processing
    #[error("'{context}' has {point_count} points, minimum {minimum_required} required")]
    InsufficientPoints {
        context: String,
        point_count: usize,
        minimum_required: usize,
    },
    /// Sample has invalid coordinates
    #[error("Invalid coordinates ({latitude}, {longitude})")]
    InvalidCoordinates { latitude: f64, longitude: f64 },
    /// A form field failed validation
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config { message: String },
    /// Capture polygon spans more grid cells than a single claim may write
    #[error("Claim spans {candidate_cells} cells, limit is {limit}")]
    ClaimTooLarge { candidate_cells: u64, limit: u64 },
}

impl TurfError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        TurfError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        TurfError::Config {
            message: message.into(),
        }
    }
}

/// Result type alias for turf core operations.
pub type Result<T> = std::result::Result<T, TurfError>;

/// Extension trait for converting Option to TurfError.
pub trait OptionExt<T> {
    /// Convert Option to Result with insufficient points error.
    fn ok_or_insufficient_points(
        self,
        context: &str,
        point_count: usize,
        minimum: usize,
    ) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_insufficient_points(
        self,
        context: &str,
        point_count: usize,
        minimum: usize,
    ) -> Result<T> {
        self.ok_or_else(|| TurfError::InsufficientPoints {
            context: context.to_string(),
            point_count,
            minimum_required: minimum,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TurfError::InsufficientPoints {
            context: "capture".to_string(),
            point_count: 2,
            minimum_required: 3,
        };
        assert!(err.to_string().contains("capture"));
        assert!(err.to_string().contains("2 points"));

        let err = TurfError::validation("email", "missing @");
        assert_eq!(err.to_string(), "Invalid email: missing @");
    }

    #[test]
    fn test_option_ext() {
        let none: Option<i32> = None;
        let result = none.ok_or_insufficient_points("capture", 0, 3);
        assert!(matches!(
            result,
            Err(TurfError::InsufficientPoints {
                minimum_required: 3,
                ..
            })
        ));
        assert_eq!(Some(4).ok_or_insufficient_points("capture", 4, 3), Ok(4));
    }
}
