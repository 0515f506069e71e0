//! SQLite-backed record store.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use tokio::sync::Mutex;

use super::schema::{builtin_meta, DocTypeMeta, Naming};
use super::validate::{apply_defaults, derive_fields, is_blank, strip_system_fields, validate, value_text};
use super::{now_string, ListQuery, Record, RecordError, RecordStore};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    doctype  TEXT NOT NULL,
    name     TEXT NOT NULL,
    data     TEXT NOT NULL,
    creation TEXT NOT NULL,
    modified TEXT NOT NULL,
    PRIMARY KEY (doctype, name)
);
CREATE INDEX IF NOT EXISTS idx_records_modified ON records (doctype, modified);
CREATE TABLE IF NOT EXISTS naming_series (
    prefix  TEXT PRIMARY KEY,
    current INTEGER NOT NULL
);
"#;

/// Record store over a single SQLite connection.
#[derive(Clone)]
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRecordStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, RecordError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::init(conn)
    }

    /// A private in-memory database.
    pub fn open_in_memory() -> Result<Self, RecordError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, RecordError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, RecordError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, RecordError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.blocking_lock();
            f(&mut conn)
        })
        .await
        .map_err(|e| RecordError::Unavailable(e.to_string()))?
    }
}

fn meta_for(doctype: &str) -> Result<DocTypeMeta, RecordError> {
    builtin_meta(doctype).ok_or_else(|| RecordError::UnknownDoctype(doctype.to_string()))
}

fn not_found(doctype: &str, name: &str) -> RecordError {
    RecordError::NotFound {
        doctype: doctype.to_string(),
        name: name.to_string(),
    }
}

fn load(conn: &Connection, doctype: &str, name: &str) -> Result<Option<Record>, RecordError> {
    let row: Option<(String, String, String)> = conn
        .query_row(
            "SELECT data, creation, modified FROM records WHERE doctype = ?1 AND name = ?2",
            params![doctype, name],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;
    row.map(|(data, creation, modified)| decode(doctype, name, &data, creation, modified))
        .transpose()
}

fn decode(
    doctype: &str,
    name: &str,
    data: &str,
    creation: String,
    modified: String,
) -> Result<Record, RecordError> {
    let mut record: Record = serde_json::from_str(data)?;
    record.insert("name".to_string(), Value::from(name));
    record.insert("doctype".to_string(), Value::from(doctype));
    record.insert("creation".to_string(), Value::from(creation));
    record.insert("modified".to_string(), Value::from(modified));
    Ok(record)
}

fn exists(conn: &Connection, doctype: &str, name: &str) -> Result<bool, RecordError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM records WHERE doctype = ?1 AND name = ?2",
            params![doctype, name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Validate a record and resolve its links against stored records.
fn check(conn: &Connection, meta: &DocTypeMeta, record: &Record) -> Result<(), RecordError> {
    for link in validate(meta, record)? {
        // Links to record types outside this store (e.g. User) are not checked.
        if builtin_meta(&link.target).is_none() {
            continue;
        }
        if !exists(conn, &link.target, &link.value)? {
            return Err(RecordError::LinkNotFound {
                doctype: link.target,
                name: link.value,
            });
        }
    }
    Ok(())
}

fn next_in_series(conn: &Connection, prefix: &str) -> Result<String, RecordError> {
    conn.execute(
        "INSERT INTO naming_series (prefix, current) VALUES (?1, 1)
         ON CONFLICT(prefix) DO UPDATE SET current = current + 1",
        params![prefix],
    )?;
    let current: i64 = conn.query_row(
        "SELECT current FROM naming_series WHERE prefix = ?1",
        params![prefix],
        |row| row.get(0),
    )?;
    Ok(format!("{}-{:05}", prefix, current))
}

fn without_system_fields(record: &Record) -> Record {
    let mut data = record.clone();
    strip_system_fields(&mut data);
    data
}

/// Rows of `query.doctype`, newest first, filtered, projected and limited.
fn list_records(conn: &Connection, query: &ListQuery) -> Result<Vec<Record>, RecordError> {
    let mut stmt = conn.prepare(
        "SELECT name, data, creation, modified FROM records
         WHERE doctype = ?1 ORDER BY modified DESC, name DESC",
    )?;
    let rows = stmt.query_map(params![query.doctype], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let default_fields = ["name".to_string()];
    let fields: &[String] = if query.fields.is_empty() {
        &default_fields
    } else {
        &query.fields
    };
    let select_all = fields.iter().any(|f| f == "*");

    let mut out = Vec::new();
    for row in rows {
        if out.len() >= query.limit {
            break;
        }
        let (name, data, creation, modified) = row?;
        let record = decode(&query.doctype, &name, &data, creation, modified)?;
        if !query.filters.iter().all(|f| f.matches(&record)) {
            continue;
        }
        if select_all {
            out.push(record);
            continue;
        }
        let projected: Record = fields
            .iter()
            .map(|f| (f.clone(), record.get(f).cloned().unwrap_or(Value::Null)))
            .collect();
        out.push(projected);
    }
    Ok(out)
}

fn insert_record(conn: &mut Connection, meta: &DocTypeMeta, data: Record) -> Result<Record, RecordError> {
    let doctype = meta.name.as_str();
    check(conn, meta, &data)?;

    let tx = conn.transaction()?;
    let name = match meta.naming {
        Naming::Series(prefix) => next_in_series(&tx, prefix)?,
        Naming::Field(field) => {
            let value = data.get(field);
            if is_blank(value) {
                return Err(RecordError::MissingField {
                    doctype: doctype.to_string(),
                    label: field.to_string(),
                });
            }
            value.map(value_text).unwrap_or_default()
        }
    };
    if exists(&tx, doctype, &name)? {
        return Err(RecordError::Duplicate {
            doctype: doctype.to_string(),
            name,
        });
    }

    let now = now_string();
    let json = serde_json::to_string(&data)?;
    tx.execute(
        "INSERT INTO records (doctype, name, data, creation, modified) VALUES (?1, ?2, ?3, ?4, ?4)",
        params![doctype, name, json, now],
    )?;
    tx.commit()?;

    tracing::debug!(doctype, name = %name, "Inserted record");
    decode(doctype, &name, &json, now.clone(), now)
}

fn update_record(
    conn: &Connection,
    meta: &DocTypeMeta,
    name: &str,
    patch: Record,
) -> Result<Record, RecordError> {
    let doctype = meta.name.as_str();
    let current = load(conn, doctype, name)?.ok_or_else(|| not_found(doctype, name))?;
    let creation = current
        .get("creation")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let mut data = without_system_fields(&current);
    data.extend(patch);
    derive_fields(meta, &mut data);
    check(conn, meta, &data)?;

    let now = now_string();
    let json = serde_json::to_string(&data)?;
    conn.execute(
        "UPDATE records SET data = ?3, modified = ?4 WHERE doctype = ?1 AND name = ?2",
        params![doctype, name, json, now],
    )?;

    tracing::debug!(doctype, name, "Updated record");
    decode(doctype, name, &json, creation, now)
}

fn delete_record(conn: &Connection, doctype: &str, name: &str) -> Result<(), RecordError> {
    let removed = conn.execute(
        "DELETE FROM records WHERE doctype = ?1 AND name = ?2",
        params![doctype, name],
    )?;
    if removed == 0 {
        return Err(not_found(doctype, name));
    }
    tracing::debug!(doctype, name, "Deleted record");
    Ok(())
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn meta(&self, doctype: &str) -> Result<DocTypeMeta, RecordError> {
        meta_for(doctype)
    }

    async fn get_list(&self, query: &ListQuery) -> Result<Vec<Record>, RecordError> {
        meta_for(&query.doctype)?;
        let query = query.clone();
        self.with_conn(move |conn| list_records(conn, &query)).await
    }

    async fn get(&self, doctype: &str, name: &str) -> Result<Record, RecordError> {
        meta_for(doctype)?;
        let (doctype, name) = (doctype.to_string(), name.to_string());
        self.with_conn(move |conn| load(conn, &doctype, &name)?.ok_or_else(|| not_found(&doctype, &name)))
            .await
    }

    async fn insert(&self, doctype: &str, mut data: Record) -> Result<Record, RecordError> {
        let meta = meta_for(doctype)?;
        strip_system_fields(&mut data);
        apply_defaults(&meta, &mut data);
        derive_fields(&meta, &mut data);
        self.with_conn(move |conn| insert_record(conn, &meta, data)).await
    }

    async fn update(&self, doctype: &str, name: &str, mut patch: Record) -> Result<Record, RecordError> {
        let meta = meta_for(doctype)?;
        strip_system_fields(&mut patch);
        let name = name.to_string();
        self.with_conn(move |conn| update_record(conn, &meta, &name, patch)).await
    }

    async fn delete(&self, doctype: &str, name: &str) -> Result<(), RecordError> {
        meta_for(doctype)?;
        let (doctype, name) = (doctype.to_string(), name.to_string());
        self.with_conn(move |conn| delete_record(conn, &doctype, &name)).await
    }
}
