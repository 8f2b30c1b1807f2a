//! Jordanian mobile numbers in the forms people actually type them.
//!
//! Drivers are registered with whatever an admin typed and log in with
//! whatever they type on their phone, so every accepted form has to land on
//! the same canonical key: `+962` followed by the 9-digit national number.

use std::fmt;

const COUNTRY_CODE: &str = "962";
const NATIONAL_LEN: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PhoneError {
    #[error("Phone number is empty.")]
    Empty,
    #[error("Unrecognised phone number: {0}")]
    Unrecognised(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhoneNumber {
    national: String,
}

impl PhoneNumber {
    pub fn parse(input: &str) -> Result<Self, PhoneError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(PhoneError::Empty);
        }

        let digits: String = input.chars().filter(char::is_ascii_digit).collect();
        let digits = digits.strip_prefix("00").unwrap_or(&digits);

        let national = if let Some(rest) = digits.strip_prefix(COUNTRY_CODE) {
            rest
        } else if let Some(rest) = digits.strip_prefix('0') {
            rest
        } else if digits.starts_with('7') {
            digits
        } else {
            return Err(PhoneError::Unrecognised(input.to_string()));
        };

        if national.len() != NATIONAL_LEN {
            return Err(PhoneError::Unrecognised(input.to_string()));
        }

        Ok(PhoneNumber {
            national: national.to_string(),
        })
    }

    /// `+962XXXXXXXXX`
    pub fn canonical(&self) -> String {
        format!("+{}{}", COUNTRY_CODE, self.national)
    }

    /// `0XXXXXXXXX`
    pub fn local(&self) -> String {
        format!("0{}", self.national)
    }

    /// Forms a stored driver row may carry, most specific first.
    pub fn lookup_candidates(&self, raw: &str) -> Vec<String> {
        let raw = raw.trim();
        let canonical = self.canonical();

        unique([
            raw.to_string(),
            canonical.clone(),
            canonical.trim_start_matches('+').to_string(),
            self.local(),
            with_country_code(raw),
        ])
    }
}

/// Candidates for input that does not parse as a mobile number. Rows saved
/// before numbers were normalised can still be found this way.
pub fn raw_candidates(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    unique([raw.to_string(), with_country_code(raw)])
}

/// Swaps a leading trunk `0` for `+962`, leaving the rest as typed.
fn with_country_code(raw: &str) -> String {
    match raw.strip_prefix('0') {
        Some(rest) => format!("+{}{}", COUNTRY_CODE, rest),
        None => raw.to_string(),
    }
}

fn unique<const N: usize>(candidates: [String; N]) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(N);
    for candidate in candidates {
        if !candidate.is_empty() && !unique.contains(&candidate) {
            unique.push(candidate);
        }
    }

    unique
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}
