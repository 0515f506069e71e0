//! Typed tool arguments and their execution.

use serde::Deserialize;
use serde_json::Value;

use super::{ToolError, ToolKind};
use crate::records::{parse_filters, ListQuery, Record, RecordError, RecordStore, DEFAULT_LIST_LIMIT};

#[derive(Debug, Clone, Deserialize)]
pub struct GetListArgs {
    pub doctype: String,
    #[serde(default)]
    pub filters: Value,
    #[serde(default)]
    pub fields: Option<Vec<String>>,
    /// Models sometimes send integers as floats.
    #[serde(default)]
    pub limit: Option<f64>,
}

/// A record addressed by type and name.
#[derive(Debug, Clone, Deserialize)]
pub struct DocRef {
    pub doctype: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDocArgs {
    pub doctype: String,
    pub data: Record,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateDocArgs {
    pub doctype: String,
    pub name: String,
    pub data: Record,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetaArgs {
    pub doctype: String,
}

/// A decoded tool call.
#[derive(Debug, Clone)]
pub enum ToolInvocation {
    GetList(GetListArgs),
    GetDoc(DocRef),
    CreateDoc(CreateDocArgs),
    UpdateDoc(UpdateDocArgs),
    DeleteDoc(DocRef),
    GetMeta(MetaArgs),
}

fn decode<T: for<'de> Deserialize<'de>>(args: &Value) -> Result<T, ToolError> {
    // A call with no arguments arrives as null or is omitted entirely.
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args.clone()
    };
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, ToolError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ToolError::Record(RecordError::Serialization(e)))
}

impl ToolInvocation {
    pub fn parse(kind: ToolKind, args: &Value) -> Result<Self, ToolError> {
        let invocation = match kind {
            ToolKind::GetList => Self::GetList(decode(args)?),
            ToolKind::GetDoc => Self::GetDoc(decode(args)?),
            ToolKind::CreateDoc => Self::CreateDoc(decode(args)?),
            ToolKind::UpdateDoc => Self::UpdateDoc(decode(args)?),
            ToolKind::DeleteDoc => Self::DeleteDoc(decode(args)?),
            ToolKind::GetMeta => Self::GetMeta(decode(args)?),
        };
        Ok(invocation)
    }

    /// Record type the call targets.
    pub fn doctype(&self) -> &str {
        match self {
            Self::GetList(a) => &a.doctype,
            Self::GetDoc(a) | Self::DeleteDoc(a) => &a.doctype,
            Self::CreateDoc(a) => &a.doctype,
            Self::UpdateDoc(a) => &a.doctype,
            Self::GetMeta(a) => &a.doctype,
        }
    }

    pub async fn run(self, store: &dyn RecordStore) -> Result<String, ToolError> {
        match self {
            Self::GetList(args) => {
                let limit = match args.limit {
                    None => DEFAULT_LIST_LIMIT,
                    Some(l) if l < 0.0 => {
                        return Err(ToolError::InvalidArguments(format!("limit must not be negative, got {}", l)))
                    }
                    // Zero means no limit.
                    Some(l) if l == 0.0 => usize::MAX,
                    Some(l) => l as usize,
                };
                let query = ListQuery {
                    filters: parse_filters(&args.filters)?,
                    fields: args.fields.unwrap_or_default(),
                    limit,
                    doctype: args.doctype,
                };
                let rows = store.get_list(&query).await?;
                to_json(&rows)
            }
            Self::GetDoc(args) => {
                let doc = store.get(&args.doctype, &args.name).await?;
                to_json(&doc)
            }
            Self::CreateDoc(args) => {
                let doc = store.insert(&args.doctype, args.data).await?;
                let name = doc.get("name").and_then(Value::as_str).unwrap_or_default();
                Ok(format!("Created {}: {}", args.doctype, name))
            }
            Self::UpdateDoc(args) => {
                store.update(&args.doctype, &args.name, args.data).await?;
                Ok(format!("Updated {}: {}", args.doctype, args.name))
            }
            Self::DeleteDoc(args) => {
                store.delete(&args.doctype, &args.name).await?;
                Ok(format!("Deleted {}", args.name))
            }
            Self::GetMeta(args) => {
                let meta = store.meta(&args.doctype).await?;
                to_json(&meta.fields)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_reports_missing_fields() {
        let err = ToolInvocation::parse(ToolKind::UpdateDoc, &json!({"doctype": "CRM Lead", "name": "X"}))
            .unwrap_err();
        assert!(err.to_string().contains("missing field `data`"), "{err}");

        let err = ToolInvocation::parse(ToolKind::GetMeta, &Value::Null).unwrap_err();
        assert!(err.to_string().contains("missing field `doctype`"), "{err}");
    }

    #[test]
    fn create_requires_object_data() {
        let err = ToolInvocation::parse(
            ToolKind::CreateDoc,
            &json!({"doctype": "CRM Lead", "data": "first_name=Ada"}),
        )
        .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn doctype_is_exposed_for_every_variant() {
        let inv = ToolInvocation::parse(ToolKind::GetList, &json!({"doctype": "CRM Deal", "limit": 5.0})).unwrap();
        assert_eq!(inv.doctype(), "CRM Deal");
        match inv {
            ToolInvocation::GetList(args) => assert_eq!(args.limit, Some(5.0)),
            other => panic!("unexpected {other:?}"),
        }
    }
}
