//! Utilities module for logging and error handling
//!
//! This module provides:
//! - Structured logging with tracing
//! - The pipeline error taxonomy

pub mod error;
pub mod logging;

// Re-export main types for convenience
pub use error::{ClassifierError, Result};
pub use logging::{init_logging, LogConfig, LogLevel};

/// Format a duration in milliseconds with two decimals
pub fn format_millis(duration: std::time::Duration) -> String {
    format!("{:.2} ms", duration.as_secs_f64() * 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_format_millis() {
        assert_eq!(format_millis(Duration::from_micros(1500)), "1.50 ms");
        assert_eq!(format_millis(Duration::from_secs(2)), "2000.00 ms");
    }
}
