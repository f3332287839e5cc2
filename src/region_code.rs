//! Canonical region codes.
//!
//! ISTAT geometry publishes region codes as integers (`3`), the statistics
//! feeds as strings (`"3"` or `"03"`). Every join goes through [`normalize`] so
//! that all of these land on the same two-digit key.

use crate::types::{CanonicalCode, RawRegionCode, RegionKey};

const WIDTH: usize = 2;

/// Canonicalizes a raw region code.
///
/// Integers and numeric strings are written in base 10, left-padded with `0`
/// to two digits. Wider values pass through unpadded. Non-numeric strings are
/// kept as-is (trimmed); blank strings and missing codes are `Unknown`.
pub fn normalize(code: &RawRegionCode) -> RegionKey {
    match code {
        RawRegionCode::Missing => RegionKey::Unknown,
        RawRegionCode::Number(n) => {
            if let Some(i) = n.as_u64() {
                pad(i)
            } else if let Some(f) = n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0) {
                pad(f as u64)
            } else {
                RegionKey::Code(CanonicalCode(n.to_string()))
            }
        }
        RawRegionCode::Text(s) => normalize_str(s),
    }
}

/// Same as [`normalize`] for a string slice.
pub fn normalize_str(code: &str) -> RegionKey {
    let trimmed = code.trim();
    if trimmed.is_empty() {
        return RegionKey::Unknown;
    }
    if trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return match trimmed.parse::<u64>() {
            Ok(i) => pad(i),
            // More digits than u64 holds: drop leading zeros, never truncate.
            Err(_) => {
                let digits = trimmed.trim_start_matches('0');
                RegionKey::Code(CanonicalCode(format!("{digits:0>WIDTH$}")))
            }
        };
    }
    RegionKey::Code(CanonicalCode(trimmed.to_string()))
}

fn pad(value: u64) -> RegionKey {
    RegionKey::Code(CanonicalCode(format!("{value:0WIDTH$}")))
}

impl From<&RawRegionCode> for RegionKey {
    fn from(code: &RawRegionCode) -> Self {
        normalize(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> RegionKey {
        RegionKey::Code(CanonicalCode(s.to_string()))
    }

    #[test]
    fn equivalent_forms_collapse() {
        assert_eq!(normalize(&3.into()), code("03"));
        assert_eq!(normalize(&"3".into()), code("03"));
        assert_eq!(normalize(&"03".into()), code("03"));
        assert_eq!(normalize(&" 3 ".into()), code("03"));
        assert_eq!(normalize(&"003".into()), code("03"));
    }

    #[test]
    fn two_digit_codes_are_unchanged() {
        assert_eq!(normalize(&20.into()), code("20"));
        assert_eq!(normalize(&"20".into()), code("20"));
    }

    #[test]
    fn wide_values_are_not_truncated() {
        assert_eq!(normalize(&120.into()), code("120"));
        assert_eq!(normalize(&"1234".into()), code("1234"));
        assert_eq!(
            normalize(&"000123456789012345678901234567890".into()),
            code("123456789012345678901234567890")
        );
    }

    #[test]
    fn integral_floats_normalize_like_integers() {
        let n = serde_json::Number::from_f64(5.0).unwrap();
        assert_eq!(normalize(&RawRegionCode::Number(n)), code("05"));
    }

    #[test]
    fn missing_and_blank_are_unknown() {
        assert_eq!(normalize(&RawRegionCode::Missing), RegionKey::Unknown);
        assert_eq!(normalize(&"".into()), RegionKey::Unknown);
        assert_eq!(normalize(&"   ".into()), RegionKey::Unknown);
        assert_ne!(normalize(&"null".into()), RegionKey::Unknown);
    }

    #[test]
    fn non_numeric_codes_pass_through() {
        assert_eq!(normalize(&"ITC1".into()), code("ITC1"));
    }

    #[test]
    fn normalize_is_idempotent() {
        let raws: Vec<RawRegionCode> = vec![
            0.into(),
            1.into(),
            9.into(),
            10.into(),
            20.into(),
            999.into(),
            "7".into(),
            "07".into(),
            "0007".into(),
            " 12".into(),
            "ITC4".into(),
        ];
        for raw in raws {
            let once = normalize(&raw);
            let canonical = once.code().expect("valid code");
            assert_eq!(normalize(&canonical.into()), once, "{raw:?}");
        }
    }
}
