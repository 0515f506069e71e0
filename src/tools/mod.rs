//! Tool manifest and execution.
//!
//! The model is offered a fixed set of record tools. Calls are dispatched by
//! [`ToolKind`], decoded into typed arguments, checked against the record-type
//! allow-lists in [`ToolPolicy`], and run against a [`RecordStore`].
//! Execution never fails outward: every problem becomes the textual result
//! the model sees.

mod invocation;

use std::sync::Arc;

use serde_json::{json, Value};
use thiserror::Error;

use crate::config::ToolPolicy;
use crate::llm::{FunctionCall, FunctionDeclaration, ToolDeclarations};
use crate::records::{RecordError, RecordStore};

pub use invocation::{CreateDocArgs, DocRef, GetListArgs, MetaArgs, ToolInvocation, UpdateDocArgs};

/// Whether a tool reads or modifies records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

impl std::fmt::Display for Access {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Access::Read => write!(f, "read"),
            Access::Write => write!(f, "modify"),
        }
    }
}

/// Errors raised while executing one tool call.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Not permitted to {access} {doctype} records")]
    Denied { doctype: String, access: Access },

    #[error(transparent)]
    Record(#[from] RecordError),
}

/// The tools offered to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    GetList,
    GetDoc,
    CreateDoc,
    UpdateDoc,
    DeleteDoc,
    GetMeta,
}

impl ToolKind {
    pub const ALL: [ToolKind; 6] = [
        ToolKind::GetList,
        ToolKind::GetDoc,
        ToolKind::CreateDoc,
        ToolKind::UpdateDoc,
        ToolKind::DeleteDoc,
        ToolKind::GetMeta,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::GetList => "get_list",
            ToolKind::GetDoc => "get_doc",
            ToolKind::CreateDoc => "create_doc",
            ToolKind::UpdateDoc => "update_doc",
            ToolKind::DeleteDoc => "delete_doc",
            ToolKind::GetMeta => "get_meta",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn access(self) -> Access {
        match self {
            ToolKind::GetList | ToolKind::GetDoc | ToolKind::GetMeta => Access::Read,
            ToolKind::CreateDoc | ToolKind::UpdateDoc | ToolKind::DeleteDoc => Access::Write,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ToolKind::GetList => "Get a list of records for a given DocType. Use this to find leads, deals, etc. Always use this to search for records.",
            ToolKind::GetDoc => "Get full details of a specific record by name.",
            ToolKind::CreateDoc => "Create a new record.",
            ToolKind::UpdateDoc => "Update an existing record.",
            ToolKind::DeleteDoc => "Delete a record.",
            ToolKind::GetMeta => "Get metadata (fields) for a DocType to understand its schema and available fields.",
        }
    }

    /// Parameter schema in the endpoint's OpenAPI subset.
    pub fn parameters(self) -> Value {
        match self {
            ToolKind::GetList => json!({
                "type": "OBJECT",
                "properties": {
                    "doctype": {"type": "STRING", "description": "The DocType to query (e.g., 'CRM Lead', 'CRM Deal', 'Contact', 'CRM Organization')"},
                    "filters": {"type": "OBJECT", "description": "Filters to apply (e.g., {'status': 'Nurture', 'email': 'test@example.com'})"},
                    "fields": {
                        "type": "ARRAY",
                        "description": "List of fields to fetch (e.g., ['name', 'lead_name', 'status'])",
                        "items": {"type": "STRING"}
                    },
                    "limit": {"type": "INTEGER", "description": "Max number of records to return (default 10)"}
                },
                "required": ["doctype"]
            }),
            ToolKind::GetDoc => json!({
                "type": "OBJECT",
                "properties": {
                    "doctype": {"type": "STRING", "description": "The DocType of the record"},
                    "name": {"type": "STRING", "description": "The name/ID of the record"}
                },
                "required": ["doctype", "name"]
            }),
            ToolKind::CreateDoc => json!({
                "type": "OBJECT",
                "properties": {
                    "doctype": {"type": "STRING", "description": "The DocType to create"},
                    "data": {"type": "OBJECT", "description": "The data for the new record"}
                },
                "required": ["doctype", "data"]
            }),
            ToolKind::UpdateDoc => json!({
                "type": "OBJECT",
                "properties": {
                    "doctype": {"type": "STRING", "description": "The DocType to update"},
                    "name": {"type": "STRING", "description": "The name/ID of the record"},
                    "data": {"type": "OBJECT", "description": "The data to update"}
                },
                "required": ["doctype", "name", "data"]
            }),
            ToolKind::DeleteDoc => json!({
                "type": "OBJECT",
                "properties": {
                    "doctype": {"type": "STRING", "description": "The DocType to delete"},
                    "name": {"type": "STRING", "description": "The name/ID of the record"}
                },
                "required": ["doctype", "name"]
            }),
            ToolKind::GetMeta => json!({
                "type": "OBJECT",
                "properties": {
                    "doctype": {"type": "STRING", "description": "The DocType to get metadata for"}
                },
                "required": ["doctype"]
            }),
        }
    }

    pub fn declaration(self) -> FunctionDeclaration {
        FunctionDeclaration {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// The static manifest sent with every agent turn.
pub fn manifest() -> Vec<ToolDeclarations> {
    vec![ToolDeclarations {
        function_declarations: ToolKind::ALL.into_iter().map(ToolKind::declaration).collect(),
    }]
}

/// Runs model tool calls against the record store.
#[derive(Clone)]
pub struct ToolExecutor {
    store: Arc<dyn RecordStore>,
    policy: ToolPolicy,
}

impl ToolExecutor {
    pub fn new(store: Arc<dyn RecordStore>, policy: ToolPolicy) -> Self {
        Self { store, policy }
    }

    /// Execute one call and return the text fed back to the model.
    pub async fn execute(&self, call: &FunctionCall) -> String {
        let Some(kind) = ToolKind::from_name(&call.name) else {
            tracing::warn!(tool = %call.name, "Model requested unknown tool");
            return format!("Error: Unknown function {}", call.name);
        };

        match self.run(kind, &call.args).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "Tool call failed");
                format!("Error executing {}: {}", call.name, e)
            }
        }
    }

    async fn run(&self, kind: ToolKind, args: &Value) -> Result<String, ToolError> {
        let invocation = ToolInvocation::parse(kind, args)?;
        self.authorize(invocation.doctype(), kind.access())?;
        tracing::debug!(tool = kind.name(), doctype = invocation.doctype(), "Executing tool");
        invocation.run(self.store.as_ref()).await
    }

    fn authorize(&self, doctype: &str, access: Access) -> Result<(), ToolError> {
        let list = match access {
            Access::Read => &self.policy.readable,
            Access::Write => &self.policy.writable,
        };
        if list.allows(doctype) {
            Ok(())
        } else {
            Err(ToolError::Denied {
                doctype: doctype.to_string(),
                access,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DoctypeAllowList;
    use crate::records::SqliteRecordStore;

    fn executor(policy: ToolPolicy) -> ToolExecutor {
        let store = SqliteRecordStore::open_in_memory().expect("open store");
        ToolExecutor::new(Arc::new(store), policy)
    }

    fn call(name: &str, args: Value) -> FunctionCall {
        FunctionCall {
            id: None,
            name: name.to_string(),
            args,
        }
    }

    #[test]
    fn manifest_lists_the_six_tools_in_order() {
        let manifest = manifest();
        let names: Vec<_> = manifest[0]
            .function_declarations
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["get_list", "get_doc", "create_doc", "update_doc", "delete_doc", "get_meta"]
        );
        for kind in ToolKind::ALL {
            assert_eq!(ToolKind::from_name(kind.name()), Some(kind));
        }
    }

    #[tokio::test]
    async fn unknown_tool_returns_error_text() {
        let exec = executor(ToolPolicy::default());
        let out = exec.execute(&call("drop_database", json!({}))).await;
        assert_eq!(out, "Error: Unknown function drop_database");
    }

    #[tokio::test]
    async fn create_get_update_delete_cycle() {
        let exec = executor(ToolPolicy::default());

        let out = exec
            .execute(&call(
                "create_doc",
                json!({"doctype": "CRM Lead", "data": {"first_name": "Grace", "status": "Nurture"}}),
            ))
            .await;
        assert_eq!(out, "Created CRM Lead: CRM-LEAD-00001");

        let out = exec
            .execute(&call(
                "get_list",
                json!({"doctype": "CRM Lead", "filters": {"status": "Nurture"}, "fields": ["name", "lead_name"]}),
            ))
            .await;
        let rows: Value = serde_json::from_str(&out).expect("json list");
        assert_eq!(rows[0]["lead_name"], "Grace");

        let out = exec
            .execute(&call(
                "update_doc",
                json!({"doctype": "CRM Lead", "name": "CRM-LEAD-00001", "data": {"status": "Qualified"}}),
            ))
            .await;
        assert_eq!(out, "Updated CRM Lead: CRM-LEAD-00001");

        let out = exec
            .execute(&call("get_doc", json!({"doctype": "CRM Lead", "name": "CRM-LEAD-00001"})))
            .await;
        let doc: Value = serde_json::from_str(&out).expect("json doc");
        assert_eq!(doc["status"], "Qualified");

        let out = exec
            .execute(&call("delete_doc", json!({"doctype": "CRM Lead", "name": "CRM-LEAD-00001"})))
            .await;
        assert_eq!(out, "Deleted CRM-LEAD-00001");
    }

    #[tokio::test]
    async fn failures_become_error_strings() {
        let exec = executor(ToolPolicy::default());

        let out = exec.execute(&call("get_doc", json!({"doctype": "CRM Lead"}))).await;
        assert!(out.starts_with("Error executing get_doc: Invalid arguments"), "{out}");

        let out = exec
            .execute(&call("get_doc", json!({"doctype": "CRM Lead", "name": "nope"})))
            .await;
        assert_eq!(out, "Error executing get_doc: CRM Lead nope not found");

        let out = exec
            .execute(&call("create_doc", json!({"doctype": "CRM Lead", "data": {"last_name": "X"}})))
            .await;
        assert_eq!(
            out,
            "Error executing create_doc: Value missing for CRM Lead: First Name"
        );
    }

    #[tokio::test]
    async fn policy_blocks_disallowed_doctypes() {
        let exec = executor(ToolPolicy {
            readable: DoctypeAllowList::parse("CRM Lead"),
            writable: DoctypeAllowList::parse(""),
        });

        let out = exec.execute(&call("get_meta", json!({"doctype": "CRM Deal"}))).await;
        assert_eq!(out, "Error executing get_meta: Not permitted to read CRM Deal records");

        let out = exec
            .execute(&call("create_doc", json!({"doctype": "CRM Lead", "data": {"first_name": "A"}})))
            .await;
        assert_eq!(out, "Error executing create_doc: Not permitted to modify CRM Lead records");

        let out = exec.execute(&call("get_meta", json!({"doctype": "CRM Lead"}))).await;
        let fields: Value = serde_json::from_str(&out).expect("json meta");
        assert!(fields
            .as_array()
            .unwrap()
            .iter()
            .any(|f| f["fieldname"] == "first_name" && f["reqd"] == 1));
    }
}
