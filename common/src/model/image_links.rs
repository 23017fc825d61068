//! The `ImageLinks` column of a plant record.
//!
//! In storage the column is a single text value: photo URLs joined by `,` in upload order, with
//! no escaping. In memory it is an ordered list of URLs, none of which is empty or contains the
//! delimiter. Conversion happens only at the storage boundary (`from_column` / `to_column`).
//!
//! Appending never deduplicates: each upload gets its own generated file name, so a repeated
//! URL is a repeated photo. Removing drops every entry that is byte-for-byte equal to the target
//! and keeps the survivors in their original order. `remove_last` takes back only the most recent
//! matching entry, which is what undoing a single append needs.

use serde::{Deserialize, Serialize};
use thiserror::Error;

const DELIMITER: char = ',';

/// A URL that cannot be stored in the comma-joined column.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidLink {
    #[error("image url must not be empty")]
    Empty,
    #[error("image url must not contain ','")]
    ContainsDelimiter,
}

/// Failure of the column-level `remove`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// There was no record to remove the link from.
    #[error("record not found")]
    RecordNotFound,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageLinks(Vec<String>);

impl ImageLinks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits a stored column value. `None` (SQL NULL) and `""` both give an empty list; empty
    /// segments such as the middle of `"a,,b"` are dropped.
    pub fn from_column(value: Option<&str>) -> Self {
        let links = value
            .unwrap_or_default()
            .split(DELIMITER)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Self(links)
    }

    pub fn to_column(&self) -> String {
        self.0.join(",")
    }

    pub fn append(&mut self, url: &str) -> Result<(), InvalidLink> {
        if url.is_empty() {
            return Err(InvalidLink::Empty);
        }
        if url.contains(DELIMITER) {
            return Err(InvalidLink::ContainsDelimiter);
        }
        self.0.push(url.to_string());
        Ok(())
    }

    /// Removes every entry equal to `url` and returns how many were removed.
    pub fn remove(&mut self, url: &str) -> usize {
        let before = self.0.len();
        self.0.retain(|link| link != url);
        before - self.0.len()
    }

    /// Removes the last entry equal to `url`. Returns whether one was found.
    pub fn remove_last(&mut self, url: &str) -> bool {
        match self.0.iter().rposition(|link| link == url) {
            Some(i) => {
                self.0.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        self.0.iter().any(|link| link == url)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Column-level append: `None` and `""` both yield `url` alone, otherwise `existing,url`.
pub fn append(existing: Option<&str>, url: &str) -> Result<String, InvalidLink> {
    let mut links = ImageLinks::from_column(existing);
    links.append(url)?;
    Ok(links.to_column())
}

/// Column-level remove. `existing` is `None` only when there is no record at all; a record with
/// a NULL column must be passed as `Some("")`.
pub fn remove(existing: Option<&str>, url: &str) -> Result<String, LinkError> {
    let existing = existing.ok_or(LinkError::RecordNotFound)?;
    let mut links = ImageLinks::from_column(Some(existing));
    links.remove(url);
    Ok(links.to_column())
}

/// Column-level undo of one `append`: drops only the last occurrence of `url`.
pub fn remove_last(existing: Option<&str>, url: &str) -> Result<String, LinkError> {
    let existing = existing.ok_or(LinkError::RecordNotFound)?;
    let mut links = ImageLinks::from_column(Some(existing));
    links.remove_last(url);
    Ok(links.to_column())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_to_absent_or_empty_yields_the_url_alone() {
        assert_eq!(append(None, "x").unwrap(), "x");
        assert_eq!(append(Some(""), "x").unwrap(), "x");
    }

    #[test]
    fn append_keeps_insertion_order_without_dedup() {
        assert_eq!(append(Some("x"), "y").unwrap(), "x,y");
        assert_eq!(append(Some("x,y"), "x").unwrap(), "x,y,x");
    }

    #[test]
    fn append_rejects_urls_that_break_the_column() {
        assert_eq!(append(Some("x"), ""), Err(InvalidLink::Empty));
        assert_eq!(
            append(Some("x"), "/uploads/a,b.png"),
            Err(InvalidLink::ContainsDelimiter)
        );
    }

    #[test]
    fn remove_drops_every_exact_match() {
        assert_eq!(remove(Some("x,y,x"), "x").unwrap(), "y");
        assert_eq!(
            remove(Some("/uploads/a.png,/uploads/b.png,/uploads/c.png"), "/uploads/b.png")
                .unwrap(),
            "/uploads/a.png,/uploads/c.png"
        );
    }

    #[test]
    fn remove_matches_whole_entries_only() {
        assert_eq!(
            remove(Some("/uploads/a.png,/uploads/aa.png"), "/uploads/a").unwrap(),
            "/uploads/a.png,/uploads/aa.png"
        );
    }

    #[test]
    fn remove_missing_target_is_a_no_op() {
        assert_eq!(remove(Some("y"), "z").unwrap(), "y");
        assert_eq!(remove(Some(""), "z").unwrap(), "");
    }

    #[test]
    fn remove_without_a_record_fails() {
        assert_eq!(remove(None, "x"), Err(LinkError::RecordNotFound));
    }

    #[test]
    fn column_parsing_skips_empty_segments() {
        let links = ImageLinks::from_column(Some(",a,,b,"));
        assert_eq!(links.iter().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(links.to_column(), "a,b");
        assert!(ImageLinks::from_column(None).is_empty());
    }

    #[test]
    fn remove_reports_how_many_entries_went() {
        let mut links = ImageLinks::from_column(Some("a,b,a,c"));
        assert_eq!(links.remove("a"), 2);
        assert_eq!(links.remove("a"), 0);
        assert!(!links.contains("a"));
        assert_eq!(links.len(), 2);
    }

    #[test]
    fn remove_last_undoes_a_single_append() {
        let column = append(Some("x,y"), "x").unwrap();
        assert_eq!(remove_last(Some(&column), "x").unwrap(), "x,y");
        assert_eq!(remove_last(Some("x,y,x,z"), "x").unwrap(), "x,y,z");
        assert_eq!(remove_last(Some("y"), "x").unwrap(), "y");
        assert_eq!(remove_last(None, "x"), Err(LinkError::RecordNotFound));

        let mut links = ImageLinks::from_column(Some("a,b"));
        assert!(links.remove_last("a"));
        assert!(!links.remove_last("a"));
        assert_eq!(links.to_column(), "b");
    }
}
