//! SQLite client for the `PlantList` table.
//!
//! One connection is opened at startup and shared behind a mutex. Calls are synchronous; handlers
//! run them on the blocking pool with `web::block`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use common::model::image_links::{InvalidLink, LinkError};
use common::model::plant::ParsedIdentifiers;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Number, Value};
use std::sync::Mutex;
use thiserror::Error;

/// A `PlantList` row with every column, as returned by `POST /scan`.
pub type PlantRow = Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("database connection is closed")]
    Closed,
    #[error("database connection lock is poisoned")]
    Poisoned,
}

/// Failure of a read-modify-write on `ImageLinks`.
#[derive(Debug, Error)]
pub enum LinkUpdateError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("record not found")]
    RecordNotFound,
    #[error(transparent)]
    InvalidLink(#[from] InvalidLink),
}

impl From<LinkError> for LinkUpdateError {
    fn from(e: LinkError) -> Self {
        match e {
            LinkError::RecordNotFound => LinkUpdateError::RecordNotFound,
        }
    }
}

impl From<rusqlite::Error> for LinkUpdateError {
    fn from(e: rusqlite::Error) -> Self {
        LinkUpdateError::Store(e.into())
    }
}

pub struct PlantStore {
    conn: Mutex<Option<Connection>>,
}

impl PlantStore {
    /// Opens the database named by `url`: a file path, optionally prefixed with `sqlite://`, or
    /// `:memory:`.
    pub fn open(url: &str) -> Result<Self, StoreError> {
        let path = url.strip_prefix("sqlite://").unwrap_or(url);
        let conn = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(Some(conn)),
        }
    }

    fn with_conn<T, E>(&self, f: impl FnOnce(&mut Connection) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut guard = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let conn = guard.as_mut().ok_or(StoreError::Closed)?;
        f(conn)
    }

    /// Creates `PlantList` when it does not exist yet. Existing tables, including any extra
    /// descriptive columns they carry, are left alone.
    pub fn ensure_schema(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS PlantList (
                    GroupID INTEGER NOT NULL,
                    Plant INTEGER NOT NULL,
                    ImageLinks TEXT,
                    PRIMARY KEY (GroupID, Plant)
                )",
            )?;
            Ok(())
        })
    }

    pub fn find_one(&self, key: &ParsedIdentifiers) -> Result<Option<PlantRow>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM PlantList WHERE GroupID = ?1 AND Plant = ?2")?;
            let names: Vec<String> = stmt.column_names().iter().map(|n| n.to_string()).collect();
            let row = stmt
                .query_row(params![key.group_id, key.plant_id], |row| {
                    let mut record = Map::with_capacity(names.len());
                    for (i, name) in names.iter().enumerate() {
                        record.insert(name.clone(), column_to_json(row.get_ref(i)?));
                    }
                    Ok(record)
                })
                .optional()?;
            Ok(row)
        })
    }

    /// `None` when there is no such record, `Some(None)` when its `ImageLinks` is NULL.
    pub fn find_image_links(
        &self,
        key: &ParsedIdentifiers,
    ) -> Result<Option<Option<String>>, StoreError> {
        self.with_conn(|conn| Ok(select_image_links(conn, key)?))
    }

    /// Overwrites `ImageLinks`. Returns `false` when no record matched.
    pub fn update_image_links(
        &self,
        key: &ParsedIdentifiers,
        value: &str,
    ) -> Result<bool, StoreError> {
        self.with_conn(|conn| Ok(write_image_links(conn, key, value)? > 0))
    }

    /// Reads `ImageLinks`, computes the new value with `f` and writes it back, all in one
    /// transaction under the connection lock, so concurrent edits of the same record serialize.
    ///
    /// `f` receives `None` when the record does not exist and `Some("")` when the column is NULL.
    /// Nothing is written if `f` fails.
    pub fn modify_image_links<F>(
        &self,
        key: &ParsedIdentifiers,
        f: F,
    ) -> Result<String, LinkUpdateError>
    where
        F: FnOnce(Option<&str>) -> Result<String, LinkUpdateError>,
    {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let current = select_image_links(&tx, key)?;
            let existing = current.as_ref().map(|v| v.as_deref().unwrap_or_default());
            let updated = f(existing)?;
            if write_image_links(&tx, key, &updated)? == 0 {
                return Err(LinkUpdateError::RecordNotFound);
            }
            tx.commit()?;
            Ok(updated)
        })
    }

    /// Closes the connection. Later calls fail with `StoreError::Closed`.
    pub fn close(&self) -> Result<(), StoreError> {
        let mut guard = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        match guard.take() {
            Some(conn) => conn.close().map_err(|(_, e)| StoreError::Sqlite(e)),
            None => Ok(()),
        }
    }

    #[cfg(test)]
    pub(crate) fn seed(&self, sql: &str) {
        self.with_conn(|conn| conn.execute_batch(sql).map_err(StoreError::from))
            .unwrap();
    }
}

fn select_image_links(
    conn: &Connection,
    key: &ParsedIdentifiers,
) -> rusqlite::Result<Option<Option<String>>> {
    conn.query_row(
        "SELECT ImageLinks FROM PlantList WHERE GroupID = ?1 AND Plant = ?2",
        params![key.group_id, key.plant_id],
        |row| row.get::<_, Option<String>>(0),
    )
    .optional()
}

fn write_image_links(
    conn: &Connection,
    key: &ParsedIdentifiers,
    value: &str,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE PlantList SET ImageLinks = ?1 WHERE GroupID = ?2 AND Plant = ?3",
        params![value, key.group_id, key.plant_id],
    )
}

fn column_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(BASE64.encode(bytes)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::model::image_links::{append, remove};
    use std::sync::Arc;
    use std::thread;

    const SEED: &str = "
        CREATE TABLE PlantList (
            GroupID INTEGER NOT NULL,
            Plant INTEGER NOT NULL,
            CommonName TEXT,
            Height REAL,
            Label BLOB,
            ImageLinks TEXT,
            PRIMARY KEY (GroupID, Plant)
        );
        INSERT INTO PlantList VALUES (7, 99, 'Japanese maple', 1.5, x'6869', '/uploads/a.png');
        INSERT INTO PlantList VALUES (7, 100, 'Boxwood', NULL, NULL, NULL);
    ";

    fn store() -> PlantStore {
        let store = PlantStore::open_in_memory().unwrap();
        store.seed(SEED);
        store.ensure_schema().unwrap();
        store
    }

    fn key(group: &str, plant: &str) -> ParsedIdentifiers {
        ParsedIdentifiers::new(group, plant)
    }

    #[test]
    fn find_one_returns_every_column_by_name() {
        let row = store().find_one(&key("7", "99")).unwrap().unwrap();
        assert_eq!(row["GroupID"], Value::from(7));
        assert_eq!(row["Plant"], Value::from(99));
        assert_eq!(row["CommonName"], Value::from("Japanese maple"));
        assert_eq!(row["Height"], Value::from(1.5));
        assert_eq!(row["Label"], Value::from("aGk="));
        assert_eq!(row["ImageLinks"], Value::from("/uploads/a.png"));
    }

    #[test]
    fn find_one_misses_unknown_keys() {
        let store = store();
        assert!(store.find_one(&key("7", "98")).unwrap().is_none());
        assert!(store.find_one(&key("G-7", "rose")).unwrap().is_none());
    }

    #[test]
    fn image_links_distinguish_null_from_missing_record() {
        let store = store();
        assert_eq!(
            store.find_image_links(&key("7", "99")).unwrap(),
            Some(Some("/uploads/a.png".to_string()))
        );
        assert_eq!(store.find_image_links(&key("7", "100")).unwrap(), Some(None));
        assert_eq!(store.find_image_links(&key("8", "1")).unwrap(), None);
    }

    #[test]
    fn update_reports_whether_a_record_matched() {
        let store = store();
        assert!(store.update_image_links(&key("7", "100"), "/uploads/b.png").unwrap());
        assert!(!store.update_image_links(&key("8", "1"), "/uploads/b.png").unwrap());
        assert_eq!(
            store.find_image_links(&key("7", "100")).unwrap(),
            Some(Some("/uploads/b.png".to_string()))
        );
    }

    #[test]
    fn modify_appends_and_removes() {
        let store = store();
        let k = key("7", "99");
        let value = store
            .modify_image_links(&k, |existing| {
                let existing = existing.ok_or(LinkUpdateError::RecordNotFound)?;
                Ok(append(Some(existing), "/uploads/b.png")?)
            })
            .unwrap();
        assert_eq!(value, "/uploads/a.png,/uploads/b.png");

        let value = store
            .modify_image_links(&k, |existing| Ok(remove(existing, "/uploads/a.png")?))
            .unwrap();
        assert_eq!(value, "/uploads/b.png");
        assert_eq!(store.find_image_links(&k).unwrap(), Some(Some(value)));
    }

    #[test]
    fn modify_treats_null_column_as_empty_list() {
        let store = store();
        let value = store
            .modify_image_links(&key("7", "100"), |existing| {
                Ok(remove(existing, "/uploads/x.png")?)
            })
            .unwrap();
        assert_eq!(value, "");
    }

    #[test]
    fn modify_on_missing_record_writes_nothing() {
        let store = store();
        let err = store
            .modify_image_links(&key("8", "1"), |existing| Ok(remove(existing, "x")?))
            .unwrap_err();
        assert!(matches!(err, LinkUpdateError::RecordNotFound));
    }

    #[test]
    fn failed_modify_leaves_the_column_untouched() {
        let store = store();
        let k = key("7", "99");
        let err = store
            .modify_image_links(&k, |existing| Ok(append(existing, "a,b")?))
            .unwrap_err();
        assert!(matches!(err, LinkUpdateError::InvalidLink(_)));
        assert_eq!(
            store.find_image_links(&k).unwrap(),
            Some(Some("/uploads/a.png".to_string()))
        );
    }

    #[test]
    fn concurrent_appends_are_not_lost() {
        let store = Arc::new(store());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    store
                        .modify_image_links(&key("7", "100"), |existing| {
                            Ok(append(existing, &format!("/uploads/{i}.png"))?)
                        })
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let links = store.find_image_links(&key("7", "100")).unwrap().unwrap().unwrap();
        assert_eq!(links.split(',').count(), 8);
    }

    #[test]
    fn closed_store_refuses_queries() {
        let store = store();
        store.close().unwrap();
        assert!(matches!(
            store.find_one(&key("7", "99")),
            Err(StoreError::Closed)
        ));
        store.close().unwrap();
    }
}
