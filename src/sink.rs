use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::info;

use crate::error::{HarvestError, Result};
use crate::record::Row;

/// Rows of one schema in arrival order, written once at the end of a run.
#[derive(Debug)]
pub struct Dataset<R: Row> {
    rows: Vec<R>,
    seen: Option<HashSet<String>>,
    duplicates: usize,
}

impl<R: Row> Default for Dataset<R> {
    fn default() -> Self {
        Dataset {
            rows: Vec::new(),
            seen: None,
            duplicates: 0,
        }
    }
}

impl<R: Row> Dataset<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip rows whose natural key was already pushed.
    pub fn dedup(mut self) -> Self {
        self.seen = Some(HashSet::new());
        self
    }

    /// Returns false when the row was a duplicate.
    pub fn push(&mut self, row: R) -> bool {
        if let Some(seen) = self.seen.as_mut() {
            if !seen.insert(row.natural_key()) {
                self.duplicates += 1;
                return false;
            }
        }
        self.rows.push(row);
        true
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Write header and rows as CSV. The file only appears at `path` once it
    /// is complete.
    pub fn write(&self, path: &Path) -> Result<usize> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = csv::Writer::from_writer(tmp.as_file());
            writer.write_record(R::COLUMNS)?;
            for row in &self.rows {
                writer.write_record(row.cells())?;
            }
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path)
            .map_err(|e| HarvestError::Sink(format!("{}: {}", path.display(), e.error)))?;

        info!(path = %path.display(), rows = self.rows.len(), "dataset written");
        Ok(self.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{QuoteRow, TileRow};

    fn tile(title: Option<&str>, price: Option<&str>, reviews: Option<u64>) -> TileRow {
        TileRow {
            title: title.map(String::from),
            currency: None,
            price: price.map(String::from),
            discount: None,
            rating: None,
            reviews,
        }
    }

    #[test]
    fn writes_fixed_columns_with_empty_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/tiles.csv");

        let mut ds = Dataset::new();
        ds.push(tile(Some("Mouse"), None, Some(3)));
        ds.push(tile(None, Some("1,299"), None));
        assert_eq!(ds.write(&path).unwrap(), 2);

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "title,currency,price,discount,rating,reviews");
        assert_eq!(lines[1], "Mouse,,,,,3");
        assert_eq!(lines[2], ",,\"1,299\",,,");
    }

    #[test]
    fn empty_dataset_writes_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quotes.csv");
        let ds: Dataset<QuoteRow> = Dataset::new();
        assert_eq!(ds.write(&path).unwrap(), 0);
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().collect::<Vec<_>>(), vec!["text,author,tags,page"]);
    }

    #[test]
    fn dedup_by_natural_key() {
        let mut ds = Dataset::new().dedup();
        assert!(ds.push(tile(Some("Mouse"), Some("299"), None)));
        assert!(!ds.push(tile(Some("Mouse"), Some("299"), Some(5))));
        assert!(ds.push(tile(Some("Mouse"), Some("199"), None)));
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.duplicates(), 1);
    }

    #[test]
    fn without_dedup_keeps_repeats() {
        let mut ds = Dataset::new();
        ds.push(tile(Some("Mouse"), Some("299"), None));
        ds.push(tile(Some("Mouse"), Some("299"), None));
        assert_eq!(ds.len(), 2);
    }

    #[test]
    fn overwrite_replaces_previous_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiles.csv");
        fs::write(&path, "stale").unwrap();

        let mut ds = Dataset::new();
        ds.push(tile(Some("Mouse"), None, None));
        ds.write(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("title,"));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
