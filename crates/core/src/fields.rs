//! Field descriptors as exposed by the field-metadata capability.
//!
//! Native and custom fields share one shape: a [`Field`] carries a stable
//! `code`, a display `label`, and a [`FieldKind`] that drives parsing and
//! validation. Consumers never special-case custom fields by name.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Field kind
// ---------------------------------------------------------------------------

/// The value type of a field, including any kind-specific configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    /// Free text. No validation.
    Text,
    /// Email address. Stored lowercased.
    Email,
    /// Numeric, interpreted under the session's `NumberFormat`.
    Number,
    /// Calendar date, interpreted under the session's `DateFormat`.
    Date,
    /// One (or, with `multiple`, several) of a fixed option list.
    Choice {
        options: Vec<String>,
        #[serde(default)]
        multiple: bool,
    },
    /// A reference to a record of another entity type.
    Link { target_entity_type: String },
}

impl FieldKind {
    /// Short name for logs and messages.
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Email => "email",
            Self::Number => "number",
            Self::Date => "date",
            Self::Choice { .. } => "choice",
            Self::Link { .. } => "link",
        }
    }
}

// ---------------------------------------------------------------------------
// Field
// ---------------------------------------------------------------------------

/// A single importable field of an entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Stable machine code, unique per entity type (e.g. `"first_name"`).
    pub code: String,
    /// Human-facing label (e.g. `"First name"`).
    pub label: String,
    pub kind: FieldKind,
    /// Required fields make a row an error when left blank.
    pub required: bool,
    /// Unique fields identify an existing record (candidate match keys).
    pub unique: bool,
    /// Custom fields live in the dynamic value slot rather than a column.
    pub is_custom: bool,
}

impl Field {
    /// Convenience constructor for a plain optional text field.
    pub fn text(code: &str, label: &str) -> Self {
        Self {
            code: code.to_string(),
            label: label.to_string(),
            kind: FieldKind::Text,
            required: false,
            unique: false,
            is_custom: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_serializes_tagged() {
        let kind = FieldKind::Choice {
            options: vec!["Lead".into(), "Customer".into()],
            multiple: false,
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["type"], "choice");
        assert_eq!(json["options"][0], "Lead");
    }

    #[test]
    fn choice_multiple_defaults_to_false() {
        let kind: FieldKind =
            serde_json::from_str(r#"{"type":"choice","options":["A","B"]}"#).unwrap();
        assert_eq!(
            kind,
            FieldKind::Choice {
                options: vec!["A".into(), "B".into()],
                multiple: false,
            }
        );
    }

    #[test]
    fn kind_str_names_every_variant() {
        assert_eq!(FieldKind::Text.kind_str(), "text");
        assert_eq!(
            FieldKind::Link {
                target_entity_type: "company".into()
            }
            .kind_str(),
            "link"
        );
    }
}
