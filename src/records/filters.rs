//! Record list filters.
//!
//! Filters arrive from the model as JSON in one of two shapes:
//! - a mapping `{"status": "Nurture", "annual_revenue": [">", 1000]}`
//! - a list of triples `[["status", "=", "Nurture"]]` (a leading doctype
//!   element, as in `[["CRM Lead", "status", "=", "Nurture"]]`, is accepted too)

use serde_json::Value;

use super::{Record, RecordError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Like,
    NotLike,
    In,
    NotIn,
    /// `is set` / `is not set`
    Is,
}

impl FilterOp {
    fn parse(op: &str) -> Option<Self> {
        let op = match op.trim().to_lowercase().as_str() {
            "=" | "==" => Self::Eq,
            "!=" | "<>" => Self::Ne,
            ">" => Self::Gt,
            "<" => Self::Lt,
            ">=" => Self::Ge,
            "<=" => Self::Le,
            "like" => Self::Like,
            "not like" => Self::NotLike,
            "in" => Self::In,
            "not in" => Self::NotIn,
            "is" => Self::Is,
            _ => return None,
        };
        Some(op)
    }
}

/// A single condition on one field.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        let actual = record.get(&self.field).unwrap_or(&Value::Null);
        match self.op {
            FilterOp::Eq => loose_eq(actual, &self.value),
            FilterOp::Ne => !loose_eq(actual, &self.value),
            FilterOp::Gt => compare(actual, &self.value).is_some_and(|o| o.is_gt()),
            FilterOp::Lt => compare(actual, &self.value).is_some_and(|o| o.is_lt()),
            FilterOp::Ge => compare(actual, &self.value).is_some_and(|o| o.is_ge()),
            FilterOp::Le => compare(actual, &self.value).is_some_and(|o| o.is_le()),
            FilterOp::Like => like(actual, &self.value),
            FilterOp::NotLike => !like(actual, &self.value),
            FilterOp::In => in_list(actual, &self.value),
            FilterOp::NotIn => !in_list(actual, &self.value),
            FilterOp::Is => {
                let set = !is_blank(actual);
                match self.value.as_str().map(|s| s.trim().to_lowercase()) {
                    Some(v) if v == "set" => set,
                    Some(v) if v == "not set" => !set,
                    _ => false,
                }
            }
        }
    }
}

/// Parse the model-supplied `filters` argument.
pub fn parse_filters(value: &Value) -> Result<Vec<Filter>, RecordError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Object(map) => map
            .iter()
            .map(|(field, condition)| parse_condition(field, condition))
            .collect(),
        Value::Array(items) => items.iter().map(parse_triple).collect(),
        // Some models send the filters as a JSON-encoded string.
        Value::String(s) if s.trim().is_empty() => Ok(Vec::new()),
        Value::String(s) => {
            let decoded: Value = serde_json::from_str(s)
                .map_err(|e| RecordError::InvalidFilter(format!("filters is not valid JSON: {}", e)))?;
            parse_filters(&decoded)
        }
        other => Err(RecordError::InvalidFilter(format!(
            "filters must be an object or a list, got {}",
            other
        ))),
    }
}

fn parse_condition(field: &str, condition: &Value) -> Result<Filter, RecordError> {
    if let Value::Array(pair) = condition {
        if let [Value::String(op), value] = pair.as_slice() {
            let op = FilterOp::parse(op)
                .ok_or_else(|| RecordError::InvalidFilter(format!("unsupported operator '{}'", op)))?;
            return Ok(Filter {
                field: field.to_string(),
                op,
                value: value.clone(),
            });
        }
    }
    Ok(Filter::eq(field, condition.clone()))
}

fn parse_triple(item: &Value) -> Result<Filter, RecordError> {
    let parts = item
        .as_array()
        .ok_or_else(|| RecordError::InvalidFilter(format!("expected [field, operator, value], got {}", item)))?;
    let parts = match parts.len() {
        3 => &parts[..],
        4 => &parts[1..],
        _ => {
            return Err(RecordError::InvalidFilter(format!(
                "expected [field, operator, value], got {}",
                item
            )))
        }
    };
    let field = parts[0]
        .as_str()
        .ok_or_else(|| RecordError::InvalidFilter("filter field must be a string".to_string()))?;
    let op = parts[1]
        .as_str()
        .and_then(FilterOp::parse)
        .ok_or_else(|| RecordError::InvalidFilter(format!("unsupported operator {}", parts[1])))?;
    Ok(Filter {
        field: field.to_string(),
        op,
        value: parts[2].clone(),
    })
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(u8::from(*b).to_string()),
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        _ => None,
    }
}

/// Equality that tolerates numbers sent as strings and vice versa.
fn loose_eq(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    if is_blank(actual) && is_blank(expected) {
        return true;
    }
    match (as_number(actual), as_number(expected)) {
        (Some(a), Some(b)) if actual.is_number() || expected.is_number() => a == b,
        _ => match (as_text(actual), as_text(expected)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

fn compare(actual: &Value, expected: &Value) -> Option<std::cmp::Ordering> {
    if is_blank(actual) {
        return None;
    }
    if let (Some(a), Some(b)) = (as_number(actual), as_number(expected)) {
        return a.partial_cmp(&b);
    }
    // Dates and datetimes compare correctly as text.
    Some(as_text(actual)?.cmp(&as_text(expected)?))
}

fn like(actual: &Value, pattern: &Value) -> bool {
    match (as_text(actual), as_text(pattern)) {
        (Some(text), Some(pattern)) => like_match(&text.to_lowercase(), &pattern.to_lowercase()),
        _ => false,
    }
}

/// SQL `LIKE` with `%` and `_` wildcards.
fn like_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let (mut t, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((bp, bt)) = backtrack {
            p = bp + 1;
            t = bt + 1;
            backtrack = Some((bp, bt + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|c| *c == '%')
}

fn in_list(actual: &Value, list: &Value) -> bool {
    match list {
        Value::Array(items) => items.iter().any(|item| loose_eq(actual, item)),
        Value::String(s) => s.split(',').any(|item| loose_eq(actual, &Value::String(item.trim().to_string()))),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn mapping_filters_default_to_equality() {
        let filters = parse_filters(&json!({"status": "Nurture"})).unwrap();
        assert_eq!(filters, vec![Filter::eq("status", "Nurture")]);
        assert!(filters[0].matches(&record(json!({"status": "Nurture"}))));
        assert!(!filters[0].matches(&record(json!({"status": "New"}))));
    }

    #[test]
    fn operator_pairs_and_triples_parse() {
        let filters = parse_filters(&json!({"annual_revenue": [">", 1000]})).unwrap();
        assert_eq!(filters[0].op, FilterOp::Gt);
        assert!(filters[0].matches(&record(json!({"annual_revenue": 5000}))));
        assert!(!filters[0].matches(&record(json!({"annual_revenue": null}))));

        let filters = parse_filters(&json!([["CRM Lead", "lead_name", "like", "%ann%"]])).unwrap();
        assert_eq!(filters[0].field, "lead_name");
        assert!(filters[0].matches(&record(json!({"lead_name": "Joanna Smith"}))));
    }

    #[test]
    fn string_encoded_filters_are_decoded() {
        let filters = parse_filters(&json!("{\"status\": \"New\"}")).unwrap();
        assert_eq!(filters, vec![Filter::eq("status", "New")]);
        assert!(parse_filters(&json!("")).unwrap().is_empty());
    }

    #[test]
    fn unsupported_operator_is_rejected() {
        let err = parse_filters(&json!({"status": ["between", "a"]})).unwrap_err();
        assert!(matches!(err, RecordError::InvalidFilter(_)));
        assert!(parse_filters(&json!(42)).is_err());
    }

    #[test]
    fn like_supports_both_wildcards() {
        assert!(like_match("technology", "tech%"));
        assert!(like_match("technology", "%nolo%"));
        assert!(like_match("mumbai", "mumba_"));
        assert!(!like_match("mumbai", "delhi%"));
        assert!(like_match("", "%"));
    }

    #[test]
    fn in_and_is_operators() {
        let rec = record(json!({"status": "Qualified", "email": ""}));
        let f = parse_filters(&json!({"status": ["in", ["New", "Qualified"]]})).unwrap();
        assert!(f[0].matches(&rec));
        let f = parse_filters(&json!({"email": ["is", "not set"]})).unwrap();
        assert!(f[0].matches(&rec));
        let f = parse_filters(&json!({"status": ["is", "set"]})).unwrap();
        assert!(f[0].matches(&rec));
    }

    #[test]
    fn numeric_equality_tolerates_strings() {
        let f = Filter::eq("probability", "50");
        assert!(f.matches(&record(json!({"probability": 50}))));
    }
}
