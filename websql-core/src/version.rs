//! Conversion between WebSQL version strings and the engine's integer
//! schema-version counter.
//!
//! A version string is either empty ("no version"), the sentinel `"0.0"` for a
//! brand new database, or `D{ddd}.d{D}`: one to four integer digits without a
//! leading zero, then one digit, then an optional non-zero digit. So `1.0`,
//! `44.02` and `3657.71` are accepted while `1.00`, `0.2`, `2.20` and `0657.5`
//! are not. The counter stores the version multiplied by 100.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{BridgeError, BridgeResult};

static VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[1-9][0-9]{0,3}\.[0-9][1-9]?$").expect("static version pattern")
});

/// Returns `true` if `version` is an accepted version string.
#[must_use]
pub fn is_valid(version: &str) -> bool {
    version.is_empty() || version == "0.0" || VERSION_PATTERN.is_match(version)
}

/// Parses a version string into the ×100 integer form.
///
/// Returns `Ok(None)` for the empty string (no version requirement).
///
/// # Errors
///
/// Returns [`BridgeError::InvalidVersion`] if `version` is not accepted by
/// [`is_valid`].
pub fn parse(version: &str) -> BridgeResult<Option<i64>> {
    if !is_valid(version) {
        return Err(BridgeError::InvalidVersion(version.to_string()));
    }
    if version.is_empty() {
        return Ok(None);
    }
    // Both halves are short digit strings, so integer arithmetic is exact.
    let (int_part, frac_part) = version
        .split_once('.')
        .ok_or_else(|| BridgeError::InvalidVersion(version.to_string()))?;
    let int_value: i64 = int_part
        .parse()
        .map_err(|_| BridgeError::InvalidVersion(version.to_string()))?;
    let frac_value: i64 = frac_part
        .parse()
        .map_err(|_| BridgeError::InvalidVersion(version.to_string()))?;
    let frac_value = if frac_part.len() == 1 {
        frac_value * 10
    } else {
        frac_value
    };
    Ok(Some(int_value * 100 + frac_value))
}

/// Formats a ×100 integer version as a decimal string, always with a
/// fractional part (`100` → `"1.0"`, `150` → `"1.5"`, `4402` → `"44.02"`).
#[must_use]
pub fn format(version: i64) -> String {
    let sign = if version < 0 { "-" } else { "" };
    let magnitude = version.unsigned_abs();
    let whole = magnitude / 100;
    let frac = magnitude % 100;
    if frac == 0 {
        format!("{sign}{whole}.0")
    } else if frac % 10 == 0 {
        format!("{sign}{whole}.{}", frac / 10)
    } else {
        format!("{sign}{whole}.{frac:02}")
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("" ; "empty")]
    #[test_case("0.0" ; "fresh sentinel")]
    #[test_case("1.0" ; "simple")]
    #[test_case("44.02" ; "two fraction digits")]
    #[test_case("3657.71" ; "four integer digits")]
    #[test_case("9.9" ; "single digits")]
    fn accepts(version: &str) {
        assert!(is_valid(version));
        assert!(parse(version).is_ok());
    }

    #[test_case("1.00" ; "trailing zero")]
    #[test_case("0.2" ; "leading zero integer")]
    #[test_case("2.20" ; "second fraction digit zero")]
    #[test_case("0657.5" ; "zero padded")]
    #[test_case("12345.1" ; "five integer digits")]
    #[test_case("1" ; "no fraction")]
    #[test_case("1." ; "empty fraction")]
    #[test_case(" 1.0" ; "leading space")]
    #[test_case("v1.0" ; "prefix")]
    fn rejects(version: &str) {
        assert!(!is_valid(version));
        assert_eq!(
            parse(version),
            Err(BridgeError::InvalidVersion(version.to_string()))
        );
    }

    #[test_case("", None)]
    #[test_case("0.0", Some(0))]
    #[test_case("1.0", Some(100))]
    #[test_case("1.5", Some(150))]
    #[test_case("44.02", Some(4402))]
    #[test_case("44.1", Some(4410))]
    #[test_case("3657.71", Some(365_771))]
    fn parses(version: &str, expected: Option<i64>) {
        assert_eq!(parse(version), Ok(expected));
    }

    #[test_case(0, "0.0")]
    #[test_case(100, "1.0")]
    #[test_case(150, "1.5")]
    #[test_case(4402, "44.02")]
    #[test_case(365_771, "3657.71")]
    #[test_case(7, "0.07")]
    fn formats(version: i64, expected: &str) {
        assert_eq!(format(version), expected);
    }

    #[test]
    fn format_inverts_parse_for_valid_versions() {
        for version in ["0.0", "1.0", "2.5", "10.01", "99.99"] {
            let parsed = parse(version).expect("valid").expect("non-empty");
            assert_eq!(format(parsed), version);
        }
    }
}
