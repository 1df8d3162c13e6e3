//! Human-facing byte accounting for conversion results.

use serde::{Deserialize, Serialize};
use std::fmt;

const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Format a byte count with binary (1024) steps and at most one decimal,
/// dropping a trailing `.0`: `1536 → "1.5 KB"`, `2048 → "2 KB"`.
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }
    let exponent = ((bytes as f64).ln() / 1024_f64.ln()).floor() as usize;
    let exponent = exponent.min(UNITS.len() - 1);
    let value = bytes as f64 / 1024_f64.powi(exponent as i32);
    let rendered = format!("{value:.1}");
    let rendered = rendered.strip_suffix(".0").unwrap_or(&rendered);
    format!("{rendered} {}", UNITS[exponent])
}

/// Original versus produced size.
///
/// Savings are always `1 - output/input`. A result larger than its source is
/// valid and reported as such, never clamped to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeReport {
    pub original: u64,
    pub converted: u64,
}

impl SizeReport {
    pub fn new(original: u64, converted: u64) -> Self {
        Self {
            original,
            converted,
        }
    }

    /// `round(100 * (1 - converted / original))`. Negative when the output
    /// grew; zero for an empty original.
    pub fn savings_percent(&self) -> i64 {
        if self.original == 0 {
            return 0;
        }
        (100.0 * (1.0 - self.converted as f64 / self.original as f64)).round() as i64
    }

    pub fn is_reduction(&self) -> bool {
        self.converted < self.original
    }

    /// Short summary suitable for a result badge.
    pub fn describe(&self) -> String {
        if self.is_reduction() {
            format!("{}% smaller", self.savings_percent())
        } else {
            "no reduction".to_string()
        }
    }
}

impl fmt::Display for SizeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} → {} ({})",
            format_bytes(self.original),
            format_bytes(self.converted),
            self.describe()
        )
    }
}
