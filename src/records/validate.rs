//! Schema validation applied on every insert and update.

use serde_json::Value;

use super::schema::{DocTypeMeta, FieldType};
use super::{Record, RecordError, SYSTEM_FIELDS};

/// A `Link` field value whose target record must exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LinkRef {
    pub target: String,
    pub value: String,
}

pub(crate) fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

/// Drop store-maintained fields from caller data.
pub(crate) fn strip_system_fields(data: &mut Record) {
    for field in SYSTEM_FIELDS {
        data.remove(*field);
    }
}

pub(crate) fn apply_defaults(meta: &DocTypeMeta, record: &mut Record) {
    for field in &meta.fields {
        let Some(default) = field.default.as_deref() else {
            continue;
        };
        if !is_blank(record.get(&field.fieldname)) {
            continue;
        }
        let value = match field.fieldtype {
            FieldType::Check | FieldType::Int => default
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::from(default)),
            _ => Value::from(default),
        };
        record.insert(field.fieldname.clone(), value);
    }
}

/// Fill fields computed from other fields.
pub(crate) fn derive_fields(meta: &DocTypeMeta, record: &mut Record) {
    match meta.name.as_str() {
        "CRM Lead" => {
            let full_name = ["first_name", "last_name"]
                .iter()
                .filter_map(|f| record.get(*f).and_then(Value::as_str))
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            if !full_name.is_empty() {
                record.insert("lead_name".to_string(), Value::from(full_name));
            }
        }
        "CRM Deal" => {
            if is_blank(record.get("deal_name")) {
                if let Some(org) = record.get("organization").filter(|v| !is_blank(Some(*v))).cloned() {
                    record.insert("deal_name".to_string(), org);
                }
            }
        }
        _ => {}
    }
}

/// Check required fields, select options and record-type rules, returning the
/// link references the caller must resolve.
pub(crate) fn validate(meta: &DocTypeMeta, record: &Record) -> Result<Vec<LinkRef>, RecordError> {
    let mut links = Vec::new();

    for field in &meta.fields {
        let value = record.get(&field.fieldname);
        if is_blank(value) {
            if field.is_required() {
                return Err(RecordError::MissingField {
                    doctype: meta.name.clone(),
                    label: field.label.clone(),
                });
            }
            continue;
        }
        let Some(value) = value else { continue };

        match field.fieldtype {
            FieldType::Select => {
                let options = field.select_options();
                let text = value_text(value);
                if !options.is_empty() && !options.contains(&text.as_str()) {
                    return Err(RecordError::InvalidOption {
                        label: field.label.clone(),
                        value: text,
                        options: options.join(", "),
                    });
                }
            }
            FieldType::Link => {
                if let Some(target) = field.link_target() {
                    links.push(LinkRef {
                        target: target.to_string(),
                        value: value_text(value),
                    });
                }
            }
            FieldType::Table => {
                if !value.is_array() {
                    return Err(RecordError::Validation(format!(
                        "{} must be a list of rows",
                        field.label
                    )));
                }
            }
            _ => {}
        }
    }

    if meta.name == "CRM Deal" && value_is(record, "status", "Lost") {
        if is_blank(record.get("lost_reason")) {
            return Err(RecordError::Validation(
                "Please specify a reason for losing the deal".to_string(),
            ));
        }
        if value_is(record, "lost_reason", "Other") && is_blank(record.get("lost_notes")) {
            return Err(RecordError::Validation(
                "Please specify the reason for losing the deal in Lost Notes".to_string(),
            ));
        }
    }

    Ok(links)
}

fn value_is(record: &Record, field: &str, expected: &str) -> bool {
    record.get(field).and_then(Value::as_str) == Some(expected)
}

pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
