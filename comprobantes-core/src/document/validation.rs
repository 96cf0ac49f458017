//! Constraint-table validation for document structures.
//!
//! Each validated struct declares a static table of [`FieldConstraint`]s
//! (usually generated by `#[derive(Validate)]`). Validation walks the table,
//! checks every rule against the field's current value and then recurses into
//! nested structures, collecting every violation.
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use comprobantes_derive::Validate;

/// 1 to 14 integer digits, optionally followed by a dot and 1 to 6 decimals.
pub const AMOUNT_PATTERN: &str = r"^[0-9]{1,14}(\.[0-9]{1,6})?$";

static AMOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(AMOUNT_PATTERN).expect("amount pattern compiles"));

/// Returns true when `value` matches the authority's monetary pattern.
pub fn is_amount(value: &str) -> bool {
    AMOUNT.is_match(value)
}

/// A single structural rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Present and not blank (or, for lists, present).
    Required,
    /// Character count within `min..=max`.
    Length { min: usize, max: usize },
    /// Monetary / quantity pattern, see [`AMOUNT_PATTERN`].
    Amount,
    /// Exactly `n` ASCII digits.
    Digits(usize),
    /// `dd/mm/yyyy` calendar date.
    Date,
    /// List holds at least `n` elements.
    MinItems(usize),
    /// One of a closed set of codes.
    OneOf(&'static [&'static str]),
}

/// Row of a constraint table: wire name of the field plus its rules.
#[derive(Debug, Clone, Copy)]
pub struct FieldConstraint {
    pub field: &'static str,
    pub rules: &'static [Rule],
}

/// Borrowed view of a field value as seen by the rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Text(Option<&'a str>),
    Items(Option<usize>),
    Absent,
}

pub trait AsFieldValue {
    fn as_field_value(&self) -> FieldValue<'_>;
}

impl AsFieldValue for String {
    fn as_field_value(&self) -> FieldValue<'_> {
        FieldValue::Text(Some(self.as_str()))
    }
}

impl AsFieldValue for Option<String> {
    fn as_field_value(&self) -> FieldValue<'_> {
        FieldValue::Text(self.as_deref())
    }
}

impl<T> AsFieldValue for Vec<T> {
    fn as_field_value(&self) -> FieldValue<'_> {
        FieldValue::Items(Some(self.len()))
    }
}

impl<T> AsFieldValue for Option<Vec<T>> {
    fn as_field_value(&self) -> FieldValue<'_> {
        FieldValue::Items(self.as_ref().map(Vec::len))
    }
}

impl Rule {
    /// Checks the rule, returning the violation message if it fails.
    pub fn check(&self, field: &str, value: &FieldValue<'_>) -> Option<String> {
        match (self, value) {
            (Rule::Required, FieldValue::Text(Some(text))) if !text.trim().is_empty() => None,
            (Rule::Required, FieldValue::Items(Some(_))) => None,
            (Rule::Required, _) => Some(format!("{field} es obligatorio")),

            (Rule::MinItems(min), FieldValue::Items(Some(len))) if len < min => Some(format!(
                "{field} debe tener al menos {min} elemento(s)"
            )),
            (Rule::MinItems(_), _) => None,

            (_, FieldValue::Text(Some(text))) => self.check_text(field, text),
            _ => None,
        }
    }

    fn check_text(&self, field: &str, text: &str) -> Option<String> {
        match *self {
            Rule::Length { min, max } => {
                let len = text.chars().count();
                (len < min || len > max)
                    .then(|| format!("{field} debe tener de {min} a {max} caracteres"))
            }
            Rule::Amount => (!is_amount(text)).then(|| {
                format!(
                    "{field} debe tener de 1 a 14 enteros y desde 1 hasta 6 decimales separados por punto"
                )
            }),
            Rule::Digits(width) => {
                let ok = text.len() == width && text.bytes().all(|b| b.is_ascii_digit());
                (!ok).then(|| format!("{field} debe tener {width} dígitos numéricos"))
            }
            Rule::Date => {
                (!is_date(text)).then(|| format!("{field} debe tener el formato dd/mm/aaaa"))
            }
            Rule::OneOf(allowed) => (!allowed.iter().any(|a| *a == text))
                .then(|| format!("{field} debe ser uno de: {}", allowed.join(", "))),
            Rule::Required | Rule::MinItems(_) => None,
        }
    }
}

/// Strict `dd/mm/yyyy` check (two-digit day and month, real calendar date).
pub fn is_date(text: &str) -> bool {
    let bytes = text.as_bytes();
    let shape_ok = bytes.len() == 10
        && bytes[2] == b'/'
        && bytes[5] == b'/'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 2 || i == 5 || b.is_ascii_digit());
    shape_ok && parse_date(text).is_some()
}

/// Parses a `dd/mm/yyyy` date.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%d/%m/%Y").ok()
}

/// Dotted path to a field, with list indices: `detalles[0].impuestos[1].valor`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath(String);

impl FieldPath {
    pub fn root() -> Self {
        FieldPath(String::new())
    }

    pub fn child(&self, name: &str) -> Self {
        if self.0.is_empty() {
            FieldPath(name.to_string())
        } else {
            FieldPath(format!("{}.{}", self.0, name))
        }
    }

    pub fn index(&self, index: usize) -> Self {
        FieldPath(format!("{}[{}]", self.0, index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One violated rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    #[serde(rename = "mensaje")]
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// A structure validated through its constraint table.
pub trait Validate {
    const CONSTRAINTS: &'static [FieldConstraint];

    /// Value of the field behind `CONSTRAINTS[index]`.
    fn field_value(&self, index: usize) -> FieldValue<'_>;

    /// Validates nested structures below `path`.
    fn validate_nested(&self, path: &FieldPath, errors: &mut Vec<FieldError>) {
        let _ = (path, errors);
    }

    fn validate_at(&self, path: &FieldPath, errors: &mut Vec<FieldError>) {
        for (index, constraint) in Self::CONSTRAINTS.iter().enumerate() {
            let value = self.field_value(index);
            let field_path = path.child(constraint.field);
            for rule in constraint.rules {
                if let Some(message) = rule.check(constraint.field, &value) {
                    errors.push(FieldError::new(field_path.as_str(), message));
                }
            }
        }
        self.validate_nested(path, errors);
    }

    /// Every violation, in table order, nested structures after their parent.
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        self.validate_at(&FieldPath::root(), &mut errors);
        errors
    }
}
