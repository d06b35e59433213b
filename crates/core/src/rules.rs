//! Per-field value rules: advisory checking at analysis time and strict
//! conversion at commit time.
//!
//! Both paths run the same parsers from [`crate::formats`], so a value
//! flagged during analysis fails conversion with the same diagnosis, and
//! a clean value converts without surprises.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fields::{Field, FieldKind};
use crate::formats::{parse_date, parse_number};
use crate::session::ImportOptions;

// ---------------------------------------------------------------------------
// Severity and check result
// ---------------------------------------------------------------------------

/// How serious a value issue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Advisory; the row still imports.
    Warning,
    /// The row will fail at commit unless the value is fixed.
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of checking one value against a field rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueCheck {
    Ok,
    Issue { message: String, severity: Severity },
}

impl ValueCheck {
    fn error(message: String) -> Self {
        Self::Issue {
            message,
            severity: Severity::Error,
        }
    }

    fn warning(message: String) -> Self {
        Self::Issue {
            message,
            severity: Severity::Warning,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

// ---------------------------------------------------------------------------
// Checking (analysis path)
// ---------------------------------------------------------------------------

/// Check a single cell value against a field's rule.
///
/// Non-string JSON values pass through unchecked; they were produced by
/// an earlier conversion, not typed by a user. Blank strings also pass:
/// requiredness is a row-level concern, not a value-level one.
pub fn check_value(field: &Field, options: &ImportOptions, value: &Value) -> ValueCheck {
    let Value::String(raw) = value else {
        return ValueCheck::Ok;
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ValueCheck::Ok;
    }

    match &field.kind {
        FieldKind::Text | FieldKind::Link { .. } => ValueCheck::Ok,
        FieldKind::Email => {
            if is_email_shaped(trimmed) {
                ValueCheck::Ok
            } else {
                ValueCheck::error(format!("'{trimmed}' is not a valid email address"))
            }
        }
        FieldKind::Number => {
            if parse_number(trimmed, options.number_format).is_some() {
                ValueCheck::Ok
            } else {
                ValueCheck::error(format!(
                    "'{trimmed}' is not a number (expected e.g. {})",
                    options.number_format.example()
                ))
            }
        }
        FieldKind::Date => {
            if parse_date(trimmed, options.date_format).is_some() {
                ValueCheck::Ok
            } else {
                ValueCheck::error(format!(
                    "'{trimmed}' does not match the expected date format {}",
                    options.date_format.expected_pattern()
                ))
            }
        }
        FieldKind::Choice { options: allowed, multiple } => {
            check_choice(trimmed, allowed, *multiple)
        }
    }
}

/// Case-insensitive membership. Multi-select splits on commas and fails
/// fast: the first invalid sub-value is the one reported.
fn check_choice(raw: &str, allowed: &[String], multiple: bool) -> ValueCheck {
    let candidates: Vec<&str> = if multiple {
        raw.split(',').map(str::trim).collect()
    } else {
        vec![raw]
    };

    let mut case_mismatch = false;
    for candidate in candidates {
        if candidate.is_empty() {
            return ValueCheck::error(format!("'{raw}' contains an empty option"));
        }
        match lookup_option(candidate, allowed) {
            Some(canonical) => {
                if canonical != candidate {
                    case_mismatch = true;
                }
            }
            None => {
                return ValueCheck::error(format!("'{candidate}' is not one of the allowed options"));
            }
        }
    }

    if case_mismatch {
        ValueCheck::warning(format!("'{raw}' differs from the configured option casing"))
    } else {
        ValueCheck::Ok
    }
}

fn lookup_option<'a>(candidate: &str, allowed: &'a [String]) -> Option<&'a str> {
    allowed
        .iter()
        .find(|opt| opt.eq_ignore_ascii_case(candidate))
        .map(String::as_str)
}

/// Minimal structural test: one `@` with non-empty local part and a
/// dotted domain.
fn is_email_shaped(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.contains(char::is_whitespace)
}

// ---------------------------------------------------------------------------
// Conversion (commit path)
// ---------------------------------------------------------------------------

/// Convert a raw cell value into its stored representation.
///
/// - blanks become `Null` (the caller decides whether to write them);
/// - dates become ISO `YYYY-MM-DD` strings;
/// - numbers become JSON numbers;
/// - choices are canonicalized to the configured option casing,
///   multi-select to an array;
/// - non-string JSON passes through unchanged.
///
/// Errors carry the same diagnosis [`check_value`] would produce.
pub fn convert_value(field: &Field, options: &ImportOptions, value: Value) -> Result<Value, String> {
    let Value::String(raw) = value else {
        return Ok(value);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Value::Null);
    }

    match &field.kind {
        FieldKind::Text | FieldKind::Link { .. } => Ok(Value::String(trimmed.to_string())),
        FieldKind::Email => {
            if is_email_shaped(trimmed) {
                Ok(Value::String(trimmed.to_ascii_lowercase()))
            } else {
                Err(format!("'{trimmed}' is not a valid email address"))
            }
        }
        FieldKind::Number => match parse_number(trimmed, options.number_format) {
            Some(n) => serde_json::Number::from_f64(n)
                .map(Value::Number)
                .ok_or_else(|| format!("'{trimmed}' is not a representable number")),
            None => Err(format!(
                "'{trimmed}' is not a number (expected e.g. {})",
                options.number_format.example()
            )),
        },
        FieldKind::Date => match parse_date(trimmed, options.date_format) {
            Some(d) => Ok(Value::String(d.format("%Y-%m-%d").to_string())),
            None => Err(format!(
                "'{trimmed}' does not match the expected date format {}",
                options.date_format.expected_pattern()
            )),
        },
        FieldKind::Choice { options: allowed, multiple } => {
            convert_choice(trimmed, allowed, *multiple)
        }
    }
}

fn convert_choice(raw: &str, allowed: &[String], multiple: bool) -> Result<Value, String> {
    if multiple {
        let mut canonical = Vec::new();
        for candidate in raw.split(',').map(str::trim) {
            if candidate.is_empty() {
                return Err(format!("'{raw}' contains an empty option"));
            }
            match lookup_option(candidate, allowed) {
                Some(opt) => canonical.push(Value::String(opt.to_string())),
                None => {
                    return Err(format!("'{candidate}' is not one of the allowed options"));
                }
            }
        }
        Ok(Value::Array(canonical))
    } else {
        match lookup_option(raw, allowed) {
            Some(opt) => Ok(Value::String(opt.to_string())),
            None => Err(format!("'{raw}' is not one of the allowed options")),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn opts() -> ImportOptions {
        ImportOptions::default()
    }

    fn field_of(kind: FieldKind) -> Field {
        Field {
            code: "f".into(),
            label: "F".into(),
            kind,
            required: false,
            unique: false,
            is_custom: false,
        }
    }

    fn choice(options: &[&str], multiple: bool) -> Field {
        field_of(FieldKind::Choice {
            options: options.iter().map(|s| s.to_string()).collect(),
            multiple,
        })
    }

    // -- pass-through ---------------------------------------------------------

    #[test]
    fn non_string_values_pass_unchecked() {
        let field = field_of(FieldKind::Number);
        assert!(check_value(&field, &opts(), &json!(42)).is_ok());
        assert!(check_value(&field, &opts(), &json!(true)).is_ok());
        assert!(check_value(&field, &opts(), &Value::Null).is_ok());
        assert_eq!(
            convert_value(&field, &opts(), json!(42)).unwrap(),
            json!(42)
        );
    }

    #[test]
    fn blank_strings_pass_and_convert_to_null() {
        let field = field_of(FieldKind::Date);
        assert!(check_value(&field, &opts(), &json!("   ")).is_ok());
        assert_eq!(
            convert_value(&field, &opts(), json!("   ")).unwrap(),
            Value::Null
        );
    }

    // -- email ----------------------------------------------------------------

    #[test]
    fn email_shape_check() {
        let field = field_of(FieldKind::Email);
        assert!(check_value(&field, &opts(), &json!("ada@example.com")).is_ok());
        assert!(!check_value(&field, &opts(), &json!("not-an-email")).is_ok());
        assert!(!check_value(&field, &opts(), &json!("a b@example.com")).is_ok());
        assert!(!check_value(&field, &opts(), &json!("x@nodot")).is_ok());
    }

    #[test]
    fn email_converts_lowercased() {
        let field = field_of(FieldKind::Email);
        assert_eq!(
            convert_value(&field, &opts(), json!("Ada@Example.COM")).unwrap(),
            json!("ada@example.com")
        );
    }

    // -- number ---------------------------------------------------------------

    #[test]
    fn number_issue_names_the_format_example() {
        let field = field_of(FieldKind::Number);
        let ValueCheck::Issue { message, severity } =
            check_value(&field, &opts(), &json!("abc"))
        else {
            panic!("expected an issue");
        };
        assert_eq!(severity, Severity::Error);
        assert!(message.contains("1,234.56"), "message: {message}");
    }

    #[test]
    fn number_converts_to_json_number() {
        let field = field_of(FieldKind::Number);
        assert_eq!(
            convert_value(&field, &opts(), json!("1,234.5")).unwrap(),
            json!(1234.5)
        );
    }

    // -- date -----------------------------------------------------------------

    #[test]
    fn date_issue_names_the_expected_pattern() {
        let field = field_of(FieldKind::Date);
        let ValueCheck::Issue { message, .. } = check_value(&field, &opts(), &json!("31/12/2024"))
        else {
            panic!("expected an issue");
        };
        assert!(message.contains("MM/DD/YYYY"), "message: {message}");
    }

    #[test]
    fn date_converts_to_iso() {
        let field = field_of(FieldKind::Date);
        assert_eq!(
            convert_value(&field, &opts(), json!("3/14/24")).unwrap(),
            json!("2024-03-14")
        );
    }

    // -- choice ---------------------------------------------------------------

    #[test]
    fn choice_membership_is_case_insensitive() {
        let field = choice(&["Lead", "Customer"], false);
        assert!(check_value(&field, &opts(), &json!("Lead")).is_ok());
        assert_eq!(
            check_value(&field, &opts(), &json!("lead")),
            ValueCheck::Issue {
                message: "'lead' differs from the configured option casing".into(),
                severity: Severity::Warning,
            }
        );
        assert!(!check_value(&field, &opts(), &json!("Prospect")).is_ok());
    }

    #[test]
    fn multi_select_fails_fast_on_first_invalid() {
        let field = choice(&["A", "B", "C"], true);
        let ValueCheck::Issue { message, severity } =
            check_value(&field, &opts(), &json!("A, X, Y"))
        else {
            panic!("expected an issue");
        };
        assert_eq!(severity, Severity::Error);
        assert!(message.contains("'X'"), "first invalid named: {message}");
        assert!(!message.contains('Y'));
    }

    #[test]
    fn multi_select_rejects_empty_entries() {
        let field = choice(&["A", "B"], true);
        assert!(!check_value(&field, &opts(), &json!("A,,B")).is_ok());
    }

    #[test]
    fn choice_converts_to_canonical_casing() {
        let field = choice(&["Lead", "Customer"], false);
        assert_eq!(
            convert_value(&field, &opts(), json!("lead")).unwrap(),
            json!("Lead")
        );
    }

    #[test]
    fn multi_select_converts_to_array() {
        let field = choice(&["A", "B", "C"], true);
        assert_eq!(
            convert_value(&field, &opts(), json!("b, a")).unwrap(),
            json!(["B", "A"])
        );
    }

    // -- check/convert agreement ----------------------------------------------

    #[test]
    fn error_checks_and_failed_conversions_agree() {
        let cases = [
            (field_of(FieldKind::Number), json!("abc")),
            (field_of(FieldKind::Date), json!("9/99/9999")),
            (field_of(FieldKind::Email), json!("nope")),
            (choice(&["A"], false), json!("B")),
        ];
        for (field, value) in cases {
            let checked = check_value(&field, &opts(), &value);
            let converted = convert_value(&field, &opts(), value.clone());
            assert!(
                !checked.is_ok() && converted.is_err(),
                "field {:?} value {value}",
                field.kind
            );
            if let ValueCheck::Issue { message, .. } = checked {
                assert_eq!(message, converted.unwrap_err());
            }
        }
    }
}
