//! Built-in CRM record types and their field schemas.

use serde::{Deserialize, Serialize};

/// Record types known to the bundled store.
pub const BUILTIN_DOCTYPES: &[&str] = &[
    "CRM Lead",
    "CRM Deal",
    "CRM Organization",
    "Contact",
    "FCRM Note",
    "CRM Task",
    "CRM Call Log",
    "Event",
    "CRM Industry",
    "CRM Territory",
];

const EMPLOYEE_RANGES: &str = "1-10\n11-50\n51-200\n201-500\n501-1000\n1000+";
const SALUTATIONS: &str = "Mr\nMs\nMrs\nMx\nDr\nProf";
const GENDERS: &str = "Male\nFemale\nNon-binary\nPrefer not to say";

/// Storage type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    Data,
    Select,
    Link,
    Text,
    Currency,
    Percent,
    Int,
    Date,
    Datetime,
    Check,
    Table,
}

/// One field of a record type, as reported by `get_meta`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocField {
    pub fieldname: String,
    pub fieldtype: FieldType,
    pub label: String,
    /// 1 when the field must be set on save.
    pub reqd: u8,
    /// Newline-separated choices for `Select`, target record type for `Link`.
    pub options: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl DocField {
    pub fn is_required(&self) -> bool {
        self.reqd != 0
    }

    /// Choices of a `Select` field.
    pub fn select_options(&self) -> Vec<&str> {
        match (self.fieldtype, self.options.as_deref()) {
            (FieldType::Select, Some(opts)) => {
                opts.lines().map(str::trim).filter(|o| !o.is_empty()).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Target record type of a `Link` field.
    pub fn link_target(&self) -> Option<&str> {
        match self.fieldtype {
            FieldType::Link => self.options.as_deref(),
            _ => None,
        }
    }
}

/// How new records of a type get their `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Naming {
    /// `{prefix}-{00001}` from a per-type counter.
    Series(&'static str),
    /// Value of the given field, which must be unique.
    Field(&'static str),
}

/// Schema of one record type.
#[derive(Debug, Clone)]
pub struct DocTypeMeta {
    pub name: String,
    pub naming: Naming,
    pub fields: Vec<DocField>,
}

impl DocTypeMeta {
    pub fn field(&self, fieldname: &str) -> Option<&DocField> {
        self.fields.iter().find(|f| f.fieldname == fieldname)
    }
}

struct FieldSpec(&'static str, FieldType, &'static str, bool, Option<&'static str>, Option<&'static str>);

fn build(name: &str, naming: Naming, specs: &[FieldSpec]) -> DocTypeMeta {
    DocTypeMeta {
        name: name.to_string(),
        naming,
        fields: specs
            .iter()
            .map(|FieldSpec(fieldname, fieldtype, label, reqd, options, default)| DocField {
                fieldname: fieldname.to_string(),
                fieldtype: *fieldtype,
                label: label.to_string(),
                reqd: u8::from(*reqd),
                options: options.map(ToString::to_string),
                default: default.map(ToString::to_string),
            })
            .collect(),
    }
}

/// Schema for a built-in record type.
pub fn builtin_meta(doctype: &str) -> Option<DocTypeMeta> {
    use FieldType::*;

    let meta = match doctype {
        "CRM Lead" => build(
            doctype,
            Naming::Series("CRM-LEAD"),
            &[
                FieldSpec("salutation", Select, "Salutation", false, Some(SALUTATIONS), None),
                FieldSpec("first_name", Data, "First Name", true, None, None),
                FieldSpec("last_name", Data, "Last Name", false, None, None),
                FieldSpec("lead_name", Data, "Full Name", false, None, None),
                FieldSpec("email", Data, "Email", false, None, None),
                FieldSpec("mobile_no", Data, "Mobile No", false, None, None),
                FieldSpec("phone", Data, "Phone", false, None, None),
                FieldSpec("organization", Data, "Organization", false, None, None),
                FieldSpec("website", Data, "Website", false, None, None),
                FieldSpec("annual_revenue", Currency, "Annual Revenue", false, None, None),
                FieldSpec("industry", Link, "Industry", false, Some("CRM Industry"), None),
                FieldSpec("territory", Link, "Territory", false, Some("CRM Territory"), None),
                FieldSpec("lead_owner", Data, "Lead Owner", false, None, None),
                FieldSpec("source", Data, "Source", false, None, None),
                FieldSpec("no_of_employees", Select, "No. of Employees", false, Some(EMPLOYEE_RANGES), None),
                FieldSpec("gender", Select, "Gender", false, Some(GENDERS), None),
                FieldSpec("job_title", Data, "Job Title", false, None, None),
                FieldSpec(
                    "status",
                    Select,
                    "Status",
                    true,
                    Some("New\nContacted\nNurture\nQualified\nUnqualified\nJunk"),
                    Some("New"),
                ),
            ],
        ),
        "CRM Deal" => build(
            doctype,
            Naming::Series("CRM-DEAL"),
            &[
                FieldSpec("organization", Link, "Organization", false, Some("CRM Organization"), None),
                FieldSpec("deal_name", Data, "Deal Name", false, None, None),
                FieldSpec("probability", Percent, "Probability", false, None, None),
                FieldSpec("annual_revenue", Currency, "Annual Revenue", false, None, None),
                FieldSpec("website", Data, "Website", false, None, None),
                FieldSpec("next_step", Data, "Next Step", false, None, None),
                FieldSpec("lead", Link, "Lead", false, Some("CRM Lead"), None),
                FieldSpec("deal_owner", Data, "Deal Owner", false, None, None),
                FieldSpec("email", Data, "Email", false, None, None),
                FieldSpec("mobile_no", Data, "Mobile No", false, None, None),
                FieldSpec("territory", Link, "Territory", false, Some("CRM Territory"), None),
                FieldSpec("source", Data, "Source", false, None, None),
                FieldSpec("no_of_employees", Select, "No. of Employees", false, Some(EMPLOYEE_RANGES), None),
                FieldSpec("industry", Link, "Industry", false, Some("CRM Industry"), None),
                FieldSpec("currency", Data, "Currency", false, None, None),
                FieldSpec("deal_value", Currency, "Deal Value", false, None, None),
                FieldSpec("expected_deal_value", Currency, "Expected Deal Value", false, None, None),
                FieldSpec("expected_closure_date", Date, "Expected Closure Date", false, None, None),
                FieldSpec("closed_date", Date, "Closed Date", false, None, None),
                FieldSpec(
                    "status",
                    Select,
                    "Status",
                    true,
                    Some("Qualification\nDemo/Making\nProposal/Quotation\nNegotiation\nReady to Close\nWon\nLost"),
                    Some("Qualification"),
                ),
                FieldSpec("lost_reason", Data, "Lost Reason", false, None, None),
                FieldSpec("lost_notes", Text, "Lost Notes", false, None, None),
            ],
        ),
        "CRM Organization" => build(
            doctype,
            Naming::Field("organization_name"),
            &[
                FieldSpec("organization_name", Data, "Organization Name", true, None, None),
                FieldSpec("website", Data, "Website", false, None, None),
                FieldSpec("annual_revenue", Currency, "Annual Revenue", false, None, None),
                FieldSpec("no_of_employees", Select, "No. of Employees", false, Some(EMPLOYEE_RANGES), None),
                FieldSpec("industry", Link, "Industry", false, Some("CRM Industry"), None),
                FieldSpec("territory", Link, "Territory", false, Some("CRM Territory"), None),
                FieldSpec("currency", Data, "Currency", false, None, None),
                FieldSpec("address", Data, "Address", false, None, None),
            ],
        ),
        "Contact" => build(
            doctype,
            Naming::Series("CONTACT"),
            &[
                FieldSpec("salutation", Select, "Salutation", false, Some(SALUTATIONS), None),
                FieldSpec("first_name", Data, "First Name", false, None, None),
                FieldSpec("last_name", Data, "Last Name", false, None, None),
                FieldSpec("email_id", Data, "Email Address", false, None, None),
                FieldSpec("mobile_no", Data, "Mobile No", false, None, None),
                FieldSpec("phone", Data, "Phone", false, None, None),
                FieldSpec("company_name", Data, "Company Name", false, None, None),
                FieldSpec("designation", Data, "Designation", false, None, None),
                FieldSpec("department", Data, "Department", false, None, None),
                FieldSpec("gender", Select, "Gender", false, Some(GENDERS), None),
                FieldSpec("status", Select, "Status", false, Some("Passive\nOpen\nReplied"), Some("Passive")),
                FieldSpec("user", Data, "User Id", false, None, None),
                FieldSpec("address", Data, "Address", false, None, None),
                FieldSpec("email_ids", Table, "Email IDs", false, None, None),
                FieldSpec("phone_nos", Table, "Contact Numbers", false, None, None),
                FieldSpec("links", Table, "Links", false, None, None),
            ],
        ),
        "FCRM Note" => build(
            doctype,
            Naming::Series("NOTE"),
            &[
                FieldSpec("title", Data, "Title", true, None, None),
                FieldSpec("content", Text, "Content", false, None, None),
                FieldSpec("reference_doctype", Data, "Reference Document Type", false, None, None),
                FieldSpec("reference_docname", Data, "Reference Doc", false, None, None),
            ],
        ),
        "CRM Task" => build(
            doctype,
            Naming::Series("TASK"),
            &[
                FieldSpec("title", Data, "Title", true, None, None),
                FieldSpec(
                    "status",
                    Select,
                    "Status",
                    false,
                    Some("Backlog\nTodo\nIn Progress\nDone\nCanceled"),
                    Some("Todo"),
                ),
                FieldSpec("priority", Select, "Priority", false, Some("Low\nMedium\nHigh"), None),
                FieldSpec("due_date", Datetime, "Due Date", false, None, None),
                FieldSpec("description", Text, "Description", false, None, None),
                FieldSpec("assigned_to", Data, "Assigned To", false, None, None),
                FieldSpec("reference_doctype", Data, "Reference Document Type", false, None, None),
                FieldSpec("reference_docname", Data, "Reference Doc", false, None, None),
            ],
        ),
        "CRM Call Log" => build(
            doctype,
            Naming::Series("CALL"),
            &[
                FieldSpec("type", Select, "Type", true, Some("Incoming\nOutgoing"), None),
                FieldSpec(
                    "status",
                    Select,
                    "Status",
                    true,
                    Some("Initiated\nRinging\nIn Progress\nCompleted\nFailed\nBusy\nNo Answer\nQueued\nCanceled\nMissed"),
                    None,
                ),
                FieldSpec("start_time", Datetime, "Start Time", false, None, None),
                FieldSpec("duration", Int, "Duration", false, None, None),
                FieldSpec("from", Data, "From", true, None, None),
                FieldSpec("to", Data, "To", true, None, None),
                FieldSpec("recording_url", Data, "Recording URL", false, None, None),
                FieldSpec("note", Link, "Note", false, Some("FCRM Note"), None),
                FieldSpec(
                    "telephony_medium",
                    Select,
                    "Telephony Medium",
                    false,
                    Some("Manual\nTwilio\nExotel"),
                    Some("Manual"),
                ),
                FieldSpec("reference_doctype", Data, "Reference Document Type", false, None, None),
                FieldSpec("reference_docname", Data, "Reference Name", false, None, None),
            ],
        ),
        "Event" => build(
            doctype,
            Naming::Series("EV"),
            &[
                FieldSpec("subject", Data, "Subject", true, None, None),
                FieldSpec("starts_on", Datetime, "Starts On", true, None, None),
                FieldSpec("ends_on", Datetime, "Ends On", false, None, None),
                FieldSpec("description", Text, "Description", false, None, None),
                FieldSpec("status", Select, "Status", false, Some("Open\nCancelled\nClosed"), Some("Open")),
                FieldSpec("all_day", Check, "All Day", false, None, Some("0")),
                FieldSpec("event_participants", Table, "Event Participants", false, None, None),
            ],
        ),
        "CRM Industry" => build(
            doctype,
            Naming::Field("industry"),
            &[FieldSpec("industry", Data, "Industry", true, None, None)],
        ),
        "CRM Territory" => build(
            doctype,
            Naming::Field("territory_name"),
            &[FieldSpec("territory_name", Data, "Territory Name", true, None, None)],
        ),
        _ => return None,
    };
    Some(meta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_doctype_has_a_schema() {
        for doctype in BUILTIN_DOCTYPES {
            let meta = builtin_meta(doctype).expect("schema exists");
            assert_eq!(meta.name, *doctype);
            assert!(!meta.fields.is_empty());
            if let Naming::Field(field) = meta.naming {
                assert!(meta.field(field).is_some_and(DocField::is_required));
            }
        }
        assert!(builtin_meta("User").is_none());
    }

    #[test]
    fn lead_status_is_required_select_with_default() {
        let meta = builtin_meta("CRM Lead").unwrap();
        let status = meta.field("status").unwrap();
        assert!(status.is_required());
        assert_eq!(status.default.as_deref(), Some("New"));
        assert!(status.select_options().contains(&"Nurture"));
        assert_eq!(meta.field("territory").unwrap().link_target(), Some("CRM Territory"));
    }
}
