//! Conversion of free-form sensor readings into watts
//!
//! Sensors report power as plain numbers, `"2.4 kW"`, `"Power: 1,200w"` and
//! similar. [`parse_to_watts`] extracts the first number and applies the unit
//! that follows it.

use regex::Regex;
use std::sync::LazyLock;

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-+]?\d*\.?\d+(?:[eE][-+]?\d+)?").expect("static regex"));

/// Parse a reading into watts.
///
/// - Thousands separators (`,`) are ignored.
/// - A `kw` after the number multiplies by 1000.
/// - `w` / `watt(s)` after the number is taken as-is.
/// - Readings mentioning amps or volts are returned unconverted.
/// - No recognised unit: assumed to already be watts.
///
/// Returns `None` when the text holds no number.
pub fn parse_to_watts(raw: &str) -> Option<f64> {
    let cleaned = raw.replace(',', "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }

    let found = NUMBER.find(cleaned)?;
    let value: f64 = found.as_str().parse().ok()?;
    let tail = cleaned[found.end()..].to_lowercase();

    if tail.contains("kw") {
        return Some(value * 1000.0);
    }
    if tail.contains('w') {
        return Some(value);
    }

    // amps/volts and unit-less readings both pass through unchanged
    Some(value)
}
