//! Column mapping: targets, auto-suggestion from headers, and
//! normalization of user-submitted mappings.
//!
//! Suggestion is a deterministic heuristic, never a contract: the user
//! reviews and adjusts before anything is written.

use serde::{Deserialize, Serialize};

use crate::fields::Field;
use crate::links::EntityLink;

// ---------------------------------------------------------------------------
// Mapping target
// ---------------------------------------------------------------------------

/// What a spreadsheet column feeds into.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MappingTarget {
    /// A native field, addressed by field code.
    Field { code: String },
    /// A custom field, addressed by field code.
    CustomField { code: String },
    /// An entity link, addressed by link key.
    EntityLink { key: String },
    /// Column is not imported.
    Ignored,
}

impl MappingTarget {
    pub fn is_mapped(&self) -> bool {
        !matches!(self, Self::Ignored)
    }

    /// The field code or link key this target addresses, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Field { code } | Self::CustomField { code } => Some(code),
            Self::EntityLink { key } => Some(key),
            Self::Ignored => None,
        }
    }
}

/// One column of the uploaded spreadsheet and where it goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    /// Zero-based column position in the original file.
    pub source_index: usize,
    /// Header text as uploaded.
    pub source_header: String,
    pub target: MappingTarget,
}

// ---------------------------------------------------------------------------
// Suggestion
// ---------------------------------------------------------------------------

/// Reduce a header or field name to a comparison key: lowercase,
/// alphanumerics only, one trailing plural `s` folded (`"Emails"` and
/// `"email"` compare equal; `"address"` keeps its double `s`).
pub fn normalize_header(raw: &str) -> String {
    let mut key: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if key.len() > 3 && key.ends_with('s') && !key.ends_with("ss") {
        key.pop();
    }
    key
}

/// Suggest a target for every header.
///
/// Two passes per header: exact case-insensitive match on field codes,
/// field labels, link keys, then link labels; failing that, the same
/// comparison on [`normalize_header`] keys. Fields are tried before
/// links, each in definition order, and the first hit wins. Headers with
/// no hit are suggested as [`MappingTarget::Ignored`].
pub fn suggest_mappings(
    headers: &[String],
    fields: &[Field],
    links: &[EntityLink],
) -> Vec<ColumnMapping> {
    headers
        .iter()
        .enumerate()
        .map(|(index, header)| ColumnMapping {
            source_index: index,
            source_header: header.clone(),
            target: suggest_target(header, fields, links),
        })
        .collect()
}

fn suggest_target(header: &str, fields: &[Field], links: &[EntityLink]) -> MappingTarget {
    let exact = header.trim().to_lowercase();

    for field in fields {
        if field.code.to_lowercase() == exact || field.label.to_lowercase() == exact {
            return field_target(field);
        }
    }
    for link in links {
        if link.key.to_lowercase() == exact || link.label.to_lowercase() == exact {
            return MappingTarget::EntityLink {
                key: link.key.clone(),
            };
        }
    }

    let normalized = normalize_header(header);
    if normalized.is_empty() {
        return MappingTarget::Ignored;
    }

    for field in fields {
        if normalize_header(&field.code) == normalized || normalize_header(&field.label) == normalized
        {
            return field_target(field);
        }
    }
    for link in links {
        if normalize_header(&link.key) == normalized || normalize_header(&link.label) == normalized {
            return MappingTarget::EntityLink {
                key: link.key.clone(),
            };
        }
    }

    MappingTarget::Ignored
}

fn field_target(field: &Field) -> MappingTarget {
    if field.is_custom {
        MappingTarget::CustomField {
            code: field.code.clone(),
        }
    } else {
        MappingTarget::Field {
            code: field.code.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Normalization of user-submitted mappings
// ---------------------------------------------------------------------------

/// Validate a user-submitted mapping set and expand it to one entry per
/// column in source order.
///
/// Rules:
/// - every `source_index` must address an existing column, exactly once;
/// - every non-ignored target must name a known field code or link key;
/// - columns the submission omits become `Ignored`.
pub fn normalize_mappings(
    submitted: &[ColumnMapping],
    headers: &[String],
    fields: &[Field],
    links: &[EntityLink],
) -> Result<Vec<ColumnMapping>, String> {
    let mut by_index: Vec<Option<&ColumnMapping>> = vec![None; headers.len()];

    for mapping in submitted {
        let Some(slot) = by_index.get_mut(mapping.source_index) else {
            return Err(format!(
                "column index {} is out of range (file has {} columns)",
                mapping.source_index,
                headers.len()
            ));
        };
        if slot.is_some() {
            return Err(format!(
                "column index {} is mapped more than once",
                mapping.source_index
            ));
        }
        validate_target(&mapping.target, fields, links)?;
        *slot = Some(mapping);
    }

    Ok(headers
        .iter()
        .enumerate()
        .map(|(index, header)| match by_index[index] {
            Some(mapping) => ColumnMapping {
                source_index: index,
                source_header: header.clone(),
                target: mapping.target.clone(),
            },
            None => ColumnMapping {
                source_index: index,
                source_header: header.clone(),
                target: MappingTarget::Ignored,
            },
        })
        .collect())
}

fn validate_target(
    target: &MappingTarget,
    fields: &[Field],
    links: &[EntityLink],
) -> Result<(), String> {
    match target {
        MappingTarget::Ignored => Ok(()),
        MappingTarget::Field { code } => {
            if fields.iter().any(|f| !f.is_custom && f.code == *code) {
                Ok(())
            } else {
                Err(format!("unknown field code '{code}'"))
            }
        }
        MappingTarget::CustomField { code } => {
            if fields.iter().any(|f| f.is_custom && f.code == *code) {
                Ok(())
            } else {
                Err(format!("unknown custom field code '{code}'"))
            }
        }
        MappingTarget::EntityLink { key } => {
            if links.iter().any(|l| l.key == *key) {
                Ok(())
            } else {
                Err(format!("unknown entity link key '{key}'"))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

/// Indexes of columns with a non-ignored target, in source order.
pub fn mapped_column_indexes(mappings: &[ColumnMapping]) -> Vec<usize> {
    mappings
        .iter()
        .filter(|m| m.target.is_mapped())
        .map(|m| m.source_index)
        .collect()
}

/// A row is blank when every mapped cell is empty after trimming.
/// Rows shorter than the header are padded with emptiness.
pub fn is_blank_row(cells: &[String], mapped_indexes: &[usize]) -> bool {
    mapped_indexes
        .iter()
        .all(|&i| cells.get(i).map(|c| c.trim().is_empty()).unwrap_or(true))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldKind;
    use crate::links::StorageStrategy;

    fn field(code: &str, label: &str) -> Field {
        Field::text(code, label)
    }

    fn custom_field(code: &str, label: &str) -> Field {
        let mut f = Field::text(code, label);
        f.is_custom = true;
        f
    }

    fn link(key: &str, label: &str) -> EntityLink {
        EntityLink {
            key: key.to_string(),
            label: label.to_string(),
            target_entity_type: "company".to_string(),
            matchable_fields: vec!["name".to_string()],
            storage: StorageStrategy::ForeignKey {
                attribute: "company_id".to_string(),
            },
            required: false,
        }
    }

    // -- normalize_header -----------------------------------------------------

    #[test]
    fn normalization_strips_punctuation_and_case() {
        assert_eq!(normalize_header("First Name"), "firstname");
        assert_eq!(normalize_header("E-Mail Address"), "emailaddress");
        assert_eq!(normalize_header("first_name"), "firstname");
    }

    #[test]
    fn normalization_folds_one_trailing_plural() {
        assert_eq!(normalize_header("Emails"), "email");
        assert_eq!(normalize_header("email"), "email");
        // Double-s endings are not plurals.
        assert_eq!(normalize_header("address"), "address");
        // Short keys are left alone.
        assert_eq!(normalize_header("is"), "is");
    }

    // -- suggest_mappings -----------------------------------------------------

    #[test]
    fn exact_code_match_wins() {
        let fields = vec![field("email", "Email address")];
        let suggested = suggest_mappings(&["email".to_string()], &fields, &[]);
        assert_eq!(
            suggested[0].target,
            MappingTarget::Field {
                code: "email".into()
            }
        );
    }

    #[test]
    fn label_match_is_case_insensitive() {
        let fields = vec![field("first_name", "First name")];
        let suggested = suggest_mappings(&["FIRST NAME".to_string()], &fields, &[]);
        assert_eq!(
            suggested[0].target,
            MappingTarget::Field {
                code: "first_name".into()
            }
        );
    }

    #[test]
    fn normalized_match_folds_plurals_and_punctuation() {
        let fields = vec![field("email", "Email")];
        let suggested = suggest_mappings(&["E-Mails".to_string()], &fields, &[]);
        assert_eq!(
            suggested[0].target,
            MappingTarget::Field {
                code: "email".into()
            }
        );
    }

    #[test]
    fn custom_fields_suggest_custom_target() {
        let fields = vec![custom_field("lead_source", "Lead source")];
        let suggested = suggest_mappings(&["Lead Source".to_string()], &fields, &[]);
        assert_eq!(
            suggested[0].target,
            MappingTarget::CustomField {
                code: "lead_source".into()
            }
        );
    }

    #[test]
    fn links_suggest_after_fields() {
        // A field and a link that normalize identically: the field wins.
        let fields = vec![field("company", "Company")];
        let links = vec![link("company", "Company")];
        let suggested = suggest_mappings(&["Company".to_string()], &fields, &links);
        assert_eq!(
            suggested[0].target,
            MappingTarget::Field {
                code: "company".into()
            }
        );

        // Without the field, the link is suggested.
        let suggested = suggest_mappings(&["Company".to_string()], &[], &links);
        assert_eq!(
            suggested[0].target,
            MappingTarget::EntityLink {
                key: "company".into()
            }
        );
    }

    #[test]
    fn unknown_headers_are_ignored() {
        let fields = vec![field("email", "Email")];
        let suggested = suggest_mappings(&["Favourite colour".to_string()], &fields, &[]);
        assert_eq!(suggested[0].target, MappingTarget::Ignored);
    }

    #[test]
    fn first_field_in_definition_order_wins() {
        let fields = vec![field("name", "Name"), field("full_name", "Name")];
        let suggested = suggest_mappings(&["Name".to_string()], &fields, &[]);
        assert_eq!(
            suggested[0].target,
            MappingTarget::Field {
                code: "name".into()
            }
        );
    }

    #[test]
    fn suggestion_preserves_source_order() {
        let fields = vec![field("name", "Name"), field("email", "Email")];
        let headers = vec!["Email".to_string(), "Name".to_string()];
        let suggested = suggest_mappings(&headers, &fields, &[]);
        assert_eq!(suggested[0].source_index, 0);
        assert_eq!(suggested[0].source_header, "Email");
        assert_eq!(suggested[1].source_index, 1);
        assert_eq!(suggested[1].source_header, "Name");
    }

    // -- normalize_mappings ---------------------------------------------------

    fn submitted(index: usize, target: MappingTarget) -> ColumnMapping {
        ColumnMapping {
            source_index: index,
            source_header: String::new(),
            target,
        }
    }

    #[test]
    fn omitted_columns_become_ignored() {
        let headers = vec!["Name".to_string(), "Extra".to_string()];
        let fields = vec![field("name", "Name")];
        let normalized = normalize_mappings(
            &[submitted(0, MappingTarget::Field { code: "name".into() })],
            &headers,
            &fields,
            &[],
        )
        .unwrap();

        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized[1].target, MappingTarget::Ignored);
        assert_eq!(normalized[1].source_header, "Extra");
    }

    #[test]
    fn out_of_range_index_rejected() {
        let headers = vec!["Name".to_string()];
        let result = normalize_mappings(
            &[submitted(5, MappingTarget::Ignored)],
            &headers,
            &[],
            &[],
        );
        assert!(result.unwrap_err().contains("out of range"));
    }

    #[test]
    fn duplicate_index_rejected() {
        let headers = vec!["Name".to_string()];
        let result = normalize_mappings(
            &[
                submitted(0, MappingTarget::Ignored),
                submitted(0, MappingTarget::Ignored),
            ],
            &headers,
            &[],
            &[],
        );
        assert!(result.unwrap_err().contains("more than once"));
    }

    #[test]
    fn unknown_field_code_rejected() {
        let headers = vec!["Name".to_string()];
        let result = normalize_mappings(
            &[submitted(0, MappingTarget::Field { code: "nope".into() })],
            &headers,
            &[],
            &[],
        );
        assert!(result.unwrap_err().contains("unknown field code"));
    }

    #[test]
    fn native_code_does_not_satisfy_custom_target() {
        let headers = vec!["Name".to_string()];
        let fields = vec![field("name", "Name")];
        let result = normalize_mappings(
            &[submitted(0, MappingTarget::CustomField { code: "name".into() })],
            &headers,
            &fields,
            &[],
        );
        assert!(result.is_err());
    }

    // -- blank rows -----------------------------------------------------------

    #[test]
    fn blank_row_considers_only_mapped_cells() {
        let mappings = vec![
            ColumnMapping {
                source_index: 0,
                source_header: "Name".into(),
                target: MappingTarget::Field { code: "name".into() },
            },
            ColumnMapping {
                source_index: 1,
                source_header: "Notes".into(),
                target: MappingTarget::Ignored,
            },
        ];
        let mapped = mapped_column_indexes(&mappings);
        assert_eq!(mapped, vec![0]);

        // Unmapped noise does not make the row non-blank.
        assert!(is_blank_row(&["  ".into(), "noise".into()], &mapped));
        assert!(!is_blank_row(&["Ada".into(), String::new()], &mapped));
    }

    #[test]
    fn short_rows_count_as_blank_in_missing_cells() {
        assert!(is_blank_row(&[], &[0, 1]));
    }
}
