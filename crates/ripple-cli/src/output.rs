//! Output helpers shared by the commands

use crate::OutputFormat;
use serde::Serialize;

/// Print `value` as JSON in the requested style.
///
/// Returns `false` for [`OutputFormat::Text`] so the caller prints its own
/// text rendition.
pub fn print_json<T: Serialize>(value: &T, format: OutputFormat) -> anyhow::Result<bool> {
    match format {
        OutputFormat::Text => Ok(false),
        OutputFormat::Json => {
            println!("{}", serde_json::to_string(value)?);
            Ok(true)
        }
        OutputFormat::JsonPretty => {
            println!("{}", serde_json::to_string_pretty(value)?);
            Ok(true)
        }
    }
}

/// Format a request cost in dollars.
pub fn format_cost(cost: f64) -> String {
    format!("${cost:.6}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_formatting() {
        assert_eq!(format_cost(0.0004), "$0.000400");
        assert_eq!(format_cost(1.5), "$1.500000");
    }

    #[test]
    fn test_text_defers_to_caller() {
        assert!(!print_json(&1, OutputFormat::Text).unwrap());
        assert!(print_json(&1, OutputFormat::Json).unwrap());
    }
}
