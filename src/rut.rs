//! Chilean RUT/RUN validation (Modulus-11 check digit).
//!
//! A RUT is a numeric body followed by one check digit, written with optional
//! dot separators and a hyphen (`12.345.678-5`). The check digit is computed
//! from the body with weights cycling 2..=7 from right to left.

use regex::Regex;

/// Validates a complete RUT, with or without dots and hyphen.
///
/// Lower-case `k` is accepted as check digit. An all-zero body is
/// syntactically valid and is checked like any other.
#[must_use]
pub fn validate(rut: &str) -> bool {
    if rut.is_empty() {
        return false;
    }

    let clean: String = rut.chars().filter(|c| *c != '.' && *c != '-').collect();

    // digits followed by exactly one check digit (digit or K)
    if !Regex::new(r"^[0-9]+[0-9kK]$").map_or(false, |re| re.is_match(&clean)) {
        return false;
    }

    let body = &clean[..clean.len() - 1];
    let dv = clean
        .chars()
        .last()
        .map(|c| c.to_ascii_uppercase())
        .unwrap_or_default();

    check_digit(body).is_some_and(|expected| expected == dv)
}

/// Computes the expected check digit for a digit-only body.
///
/// Returns `None` if `body` is empty or contains a non-digit character.
#[must_use]
pub fn check_digit(body: &str) -> Option<char> {
    if body.is_empty() {
        return None;
    }

    let mut sum: u32 = 0;
    let mut multiplier: u32 = 2;

    for c in body.chars().rev() {
        let digit = c.to_digit(10)?;
        sum += digit * multiplier;
        multiplier = if multiplier < 7 { multiplier + 1 } else { 2 };
    }

    let expected = 11 - (sum % 11);

    Some(match expected {
        11 => '0',
        10 => 'K',
        _ => char::from_digit(expected, 10)?,
    })
}
