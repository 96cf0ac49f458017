//! Access key (`claveAcceso`) generation and parsing.
//!
//! A key is a 48-digit payload followed by a mod-11 check digit:
//!
//! | field              | width |
//! |--------------------|-------|
//! | issue date ddmmyyyy| 8     |
//! | document type      | 2     |
//! | RUC                | 13    |
//! | environment        | 1     |
//! | establishment+point| 6     |
//! | sequential         | 9     |
//! | numeric code       | 8     |
//! | emission type      | 1     |
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

pub const PAYLOAD_LEN: usize = 48;
pub const KEY_LEN: usize = PAYLOAD_LEN + 1;

/// Errors raised while building or parsing an access key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyGenerationError {
    #[error("invalid access key input {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },
    #[error("invalid access key: {reason}")]
    InvalidKey { reason: String },
}

/// Raw fields the key is derived from.
#[derive(Debug, Clone, Copy)]
pub struct AccessKeyInput<'a> {
    pub issue_date: NaiveDate,
    pub document_type: &'a str,
    pub ruc: &'a str,
    pub environment: &'a str,
    /// Establishment (3) followed by emission point (3).
    pub establishment_point: &'a str,
    pub sequential: &'a str,
    pub numeric_code: &'a str,
    pub emission_type: &'a str,
}

/// Validated 49-digit access key.
///
/// # Examples
/// ```rust
/// use chrono::NaiveDate;
/// use comprobantes_core::access_key::{generate, AccessKeyInput};
///
/// let key = generate(&AccessKeyInput {
///     issue_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
///     document_type: "01",
///     ruc: "1790012345001",
///     environment: "1",
///     establishment_point: "001001",
///     sequential: "000000001",
///     numeric_code: "12345678",
///     emission_type: "1",
/// })?;
/// assert_eq!(key.as_str(), "0101202401179001234500110010010000000011234567819");
/// # Ok::<(), comprobantes_core::access_key::KeyGenerationError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccessKey(String);

fn numeric_field(field: &'static str, value: &str, width: usize) -> Result<String, KeyGenerationError> {
    if value.is_empty() {
        return Err(KeyGenerationError::InvalidInput {
            field,
            reason: "empty".into(),
        });
    }
    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(KeyGenerationError::InvalidInput {
            field,
            reason: format!("non-numeric value {value:?}"),
        });
    }
    if value.len() > width {
        return Err(KeyGenerationError::InvalidInput {
            field,
            reason: format!("{} digits exceed width {width}", value.len()),
        });
    }
    Ok(format!("{value:0>width$}"))
}

/// Mod-11 check digit over a 48-digit payload.
///
/// Weights 2..=7 cycle starting from the rightmost digit; `r = 11 - sum % 11`,
/// mapped to 0 when 11 and to 1 when 10.
pub fn check_digit(payload: &str) -> Result<u8, KeyGenerationError> {
    if payload.len() != PAYLOAD_LEN || !payload.bytes().all(|b| b.is_ascii_digit()) {
        return Err(KeyGenerationError::InvalidKey {
            reason: format!("payload must be {PAYLOAD_LEN} digits"),
        });
    }
    let sum: u32 = payload
        .bytes()
        .rev()
        .zip((2..=7).cycle())
        .map(|(b, w)| u32::from(b - b'0') * w)
        .sum();
    let digit = match 11 - sum % 11 {
        11 => 0,
        10 => 1,
        r => r as u8,
    };
    Ok(digit)
}

/// Derives the access key for `input`.
pub fn generate(input: &AccessKeyInput<'_>) -> Result<AccessKey, KeyGenerationError> {
    let mut payload = String::with_capacity(KEY_LEN);
    payload.push_str(&input.issue_date.format("%d%m%Y").to_string());
    payload.push_str(&numeric_field("codDoc", input.document_type, 2)?);
    payload.push_str(&numeric_field("ruc", input.ruc, 13)?);
    payload.push_str(&numeric_field("ambiente", input.environment, 1)?);
    payload.push_str(&numeric_field("estab+ptoEmi", input.establishment_point, 6)?);
    payload.push_str(&numeric_field("secuencial", input.sequential, 9)?);
    payload.push_str(&numeric_field("codigoNumerico", input.numeric_code, 8)?);
    payload.push_str(&numeric_field("tipoEmision", input.emission_type, 1)?);

    let digit = check_digit(&payload)?;
    payload.push(char::from(b'0' + digit));
    Ok(AccessKey(payload))
}

impl AccessKey {
    /// Parses a 49-digit key and verifies its check digit.
    pub fn parse(value: impl Into<String>) -> Result<Self, KeyGenerationError> {
        let value = value.into().trim().to_string();
        if value.len() != KEY_LEN || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(KeyGenerationError::InvalidKey {
                reason: format!("expected {KEY_LEN} digits, got {value:?}"),
            });
        }
        let expected = check_digit(&value[..PAYLOAD_LEN])?;
        let actual = value.as_bytes()[PAYLOAD_LEN] - b'0';
        if expected != actual {
            return Err(KeyGenerationError::InvalidKey {
                reason: format!("check digit {actual} does not match {expected}"),
            });
        }
        Ok(AccessKey(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn payload(&self) -> &str {
        &self.0[..PAYLOAD_LEN]
    }

    pub fn check_digit(&self) -> u8 {
        self.0.as_bytes()[PAYLOAD_LEN] - b'0'
    }

    /// `ddmmyyyy`
    pub fn issue_date_digits(&self) -> &str {
        &self.0[0..8]
    }

    pub fn document_type(&self) -> &str {
        &self.0[8..10]
    }

    pub fn ruc(&self) -> &str {
        &self.0[10..23]
    }

    pub fn environment(&self) -> &str {
        &self.0[23..24]
    }

    pub fn establishment_point(&self) -> &str {
        &self.0[24..30]
    }

    pub fn sequential(&self) -> &str {
        &self.0[30..39]
    }

    pub fn numeric_code(&self) -> &str {
        &self.0[39..47]
    }

    pub fn emission_type(&self) -> &str {
        &self.0[47..48]
    }
}

impl fmt::Display for AccessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AccessKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl FromStr for AccessKey {
    type Err = KeyGenerationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccessKey::parse(s)
    }
}

impl TryFrom<String> for AccessKey {
    type Error = KeyGenerationError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        AccessKey::parse(value)
    }
}

impl From<AccessKey> for String {
    fn from(key: AccessKey) -> Self {
        key.0
    }
}
