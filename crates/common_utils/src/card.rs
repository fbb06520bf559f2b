//! PAN helpers: masking for public projections and BIN extraction.

use crate::{
    consts::BIN_LENGTH,
    errors::{CustomResult, ValidationError},
};

/// Mask a PAN keeping the first six and last four digits, grouped in
/// blocks of four: `"4282209004348016"` -> `"4282 20** **** 8016"`.
pub fn mask_pan(pan: &str) -> String {
    let digits: String = pan.chars().filter(|c| c.is_ascii_digit()).collect();
    let masked: String = digits
        .chars()
        .enumerate()
        .map(|(index, c)| {
            if index < 6 || index >= digits.len().saturating_sub(4) {
                c
            } else {
                '*'
            }
        })
        .collect();
    masked
        .as_bytes()
        .chunks(4)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Numeric BIN: the leading eight digits of the PAN.
pub fn pan_bin(pan: &str) -> CustomResult<u32, ValidationError> {
    let digits: String = pan.chars().filter(|c| c.is_ascii_digit()).collect();
    digits
        .get(..BIN_LENGTH)
        .and_then(|bin| bin.parse::<u32>().ok())
        .ok_or_else(|| {
            ValidationError::IncorrectValueProvided {
                field_name: "card.number",
            }
            .into()
        })
}

/// Minimal PAN sanity check: digits only (spaces tolerated), 12-19 long.
pub fn validate_pan(pan: &str) -> CustomResult<String, ValidationError> {
    let digits: String = pan.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() < 12 || digits.len() > 19 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::IncorrectValueProvided {
            field_name: "card.number",
        }
        .into());
    }
    Ok(digits)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn masks_sixteen_digit_pan() {
        assert_eq!(mask_pan("4282209004348016"), "4282 20** **** 8016");
    }

    #[test]
    fn masks_pan_with_spaces() {
        assert_eq!(mask_pan("4282 2090 0434 8016"), "4282 20** **** 8016");
    }

    #[test]
    fn extracts_eight_digit_bin() {
        assert_eq!(pan_bin("4282209004348016").expect("bin"), 42822090);
    }

    #[test]
    fn short_pan_has_no_bin() {
        assert!(pan_bin("1234").is_err());
    }

    #[test]
    fn validate_rejects_letters() {
        assert!(validate_pan("4282abcd09004348").is_err());
        assert!(validate_pan("4282 2090 0434 8016").is_ok());
    }
}
