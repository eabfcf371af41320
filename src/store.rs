//! Per-topic append-only CSV stores.
//!
//! A store is opened once per topic: the ids already on disk are read into
//! memory, then new records are appended behind them. Existing rows are
//! never rewritten or reordered, so a crash mid-write can at worst leave a
//! torn last row.

use crate::error::{CrawlError, Result};
use crate::record::{PaperRecord, StoreRow, StoredPaper, STORE_COLUMNS};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File name of a topic's store: `Graph Theory` → `graph_theory_papers.csv`.
pub fn store_file_name(topic: &str) -> String {
    let slug = topic
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_");
    format!("{}_papers.csv", slug)
}

/// Append-only record store for one topic.
#[derive(Debug)]
pub struct PaperStore {
    path: PathBuf,
    keyword: String,
    ids: HashSet<String>,
}

impl PaperStore {
    /// Open the store for `topic` under `data_dir`.
    pub fn open(data_dir: &Path, topic: &str) -> Result<Self> {
        Self::open_at(data_dir.join(store_file_name(topic)), topic)
    }

    /// Open a store at an explicit path, tagging records with `keyword`.
    pub fn open_at(path: impl Into<PathBuf>, keyword: &str) -> Result<Self> {
        let path = path.into();
        let ids = load_ids(&path)?;
        debug!(keyword, known = ids.len(), "Opened store {:?}", path);
        Ok(Self {
            path,
            keyword: keyword.to_string(),
            ids,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// Number of distinct records on disk.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Append every record whose fingerprint is not yet stored.
    ///
    /// Duplicates inside `batch` are dropped too; the first occurrence wins.
    /// Records with a blank title are never written.
    /// Returns the records actually written, tagged with the store's keyword.
    pub fn append(&mut self, batch: Vec<PaperRecord>) -> Result<Vec<StoredPaper>> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let fresh = file.metadata()?.len() == 0;

        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if fresh {
            wtr.write_record(STORE_COLUMNS)?;
        }

        let total = batch.len();
        let mut written = Vec::new();
        for record in batch {
            if record.title.trim().is_empty() {
                warn!(keyword = %self.keyword, link = %record.link, "Refusing to store a record without a title");
                continue;
            }
            let stored = StoredPaper::new(record, &self.keyword);
            if self.ids.contains(&stored.id) {
                continue;
            }
            wtr.serialize(StoreRow::from(&stored))?;
            self.ids.insert(stored.id.clone());
            written.push(stored);
        }
        wtr.flush()?;

        info!(
            keyword = %self.keyword,
            offered = total,
            written = written.len(),
            stored = self.ids.len(),
            "Saved: {:?}",
            self.path
        );
        Ok(written)
    }

    /// Every record in the store, in write order.
    pub fn read_all(&self) -> Result<Vec<StoredPaper>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut rdr = csv::Reader::from_path(&self.path).map_err(|e| corrupt(&self.path, e))?;
        rdr.deserialize::<StoreRow>()
            .map(|row| {
                row.map(|r| r.into_stored(&self.keyword))
                    .map_err(|e| corrupt(&self.path, e))
            })
            .collect()
    }
}

fn corrupt(path: &Path, e: impl std::fmt::Display) -> CrawlError {
    CrawlError::StoreCorruption {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

/// Ids of every row in an existing store; empty if the store does not exist.
fn load_ids(path: &Path) -> Result<HashSet<String>> {
    if !path.exists() || fs::metadata(path)?.len() == 0 {
        return Ok(HashSet::new());
    }

    let mut rdr = csv::Reader::from_path(path).map_err(|e| corrupt(path, e))?;
    let id_column = rdr
        .headers()
        .map_err(|e| corrupt(path, e))?
        .iter()
        .position(|h| h == "id")
        .ok_or_else(|| corrupt(path, "header has no `id` column"))?;

    let mut ids = HashSet::new();
    for (line, row) in rdr.records().enumerate() {
        let row = row.map_err(|e| corrupt(path, e))?;
        let id = row
            .get(id_column)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| corrupt(path, format!("row {} has no id", line + 2)))?;
        ids.insert(id.to_string());
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SENTINEL;
    use tempfile::TempDir;

    fn paper(title: &str, link: &str) -> PaperRecord {
        PaperRecord::new(title)
            .authors(Some("A Smith".into()))
            .link(Some(link.into()))
            .year(Some(2020))
    }

    fn batch() -> Vec<PaperRecord> {
        vec![
            paper("Spectral graph theory", "https://x.test/1"),
            paper("Random graphs", "https://x.test/2"),
            PaperRecord::new("No link, no year"),
        ]
    }

    #[test]
    fn test_store_file_name() {
        assert_eq!(store_file_name("Graph Theory"), "graph_theory_papers.csv");
        assert_eq!(
            store_file_name("  Internet Of  Things "),
            "internet_of_things_papers.csv"
        );
    }

    #[test]
    fn test_append_creates_header_and_rows() -> Result<()> {
        let dir = TempDir::new()?;
        let mut store = PaperStore::open(dir.path(), "Graph Theory")?;
        assert!(store.is_empty());

        let written = store.append(batch())?;
        assert_eq!(written.len(), 3);
        assert!(written.iter().all(|p| p.keyword == "Graph Theory"));

        let text = fs::read_to_string(store.path())?;
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("id,title,authors,type,abstract,link,paperlink,year")
        );
        assert_eq!(lines.count(), 3);
        Ok(())
    }

    #[test]
    fn test_append_is_idempotent_across_opens() -> Result<()> {
        let dir = TempDir::new()?;
        PaperStore::open(dir.path(), "Graph Theory")?.append(batch())?;

        let mut reopened = PaperStore::open(dir.path(), "Graph Theory")?;
        assert_eq!(reopened.len(), 3);
        let written = reopened.append(batch())?;
        assert!(written.is_empty());

        let rows = reopened.read_all()?;
        assert_eq!(rows.len(), 3);
        Ok(())
    }

    #[test]
    fn test_duplicates_within_batch_keep_first() -> Result<()> {
        let dir = TempDir::new()?;
        let mut store = PaperStore::open(dir.path(), "Graphs")?;
        let first = paper("Random graphs", "https://x.test/2")
            .abstract_text(Some("first".into()));
        let second = paper("Random graphs", "https://x.test/2")
            .abstract_text(Some("second".into()));

        let written = store.append(vec![first, second])?;
        assert_eq!(written.len(), 1);
        assert_eq!(store.read_all()?[0].record.abstract_text, "first");
        Ok(())
    }

    #[test]
    fn test_appends_preserve_existing_rows() -> Result<()> {
        let dir = TempDir::new()?;
        let mut store = PaperStore::open(dir.path(), "Graphs")?;
        store.append(vec![paper("Old", "https://x.test/old")])?;
        let before = fs::read_to_string(store.path())?;

        store.append(vec![paper("New", "https://x.test/new")])?;
        let after = fs::read_to_string(store.path())?;
        assert!(after.starts_with(&before));

        let rows = store.read_all()?;
        assert_eq!(rows[0].record.title, "Old");
        assert_eq!(rows[1].record.title, "New");
        Ok(())
    }

    #[test]
    fn test_read_all_restores_sentinels_and_nulls() -> Result<()> {
        let dir = TempDir::new()?;
        let mut store = PaperStore::open(dir.path(), "Graphs")?;
        store.append(vec![PaperRecord::new("Bare, with \"quotes\"")])?;

        let row = &store.read_all()?[0];
        assert_eq!(row.record.title, "Bare, with \"quotes\"");
        assert_eq!(row.record.link, SENTINEL);
        assert_eq!(row.record.year, None);
        assert_eq!(row.id, row.record.fingerprint());
        Ok(())
    }

    #[test]
    fn test_blank_titles_are_not_written() -> Result<()> {
        let dir = TempDir::new()?;
        let mut store = PaperStore::open(dir.path(), "Graphs")?;
        let untitled = PaperRecord::new("  ")
            .authors(Some("J Doe".into()))
            .kind(Some("[PDF]".into()))
            .year(Some(2020));

        let written = store.append(vec![untitled, paper("Titled", "https://x.test/t")])?;
        assert_eq!(written.len(), 1);
        assert_eq!(store.len(), 1);

        let rows = store.read_all()?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].record.title, "Titled");
        Ok(())
    }

    #[test]
    fn test_corrupt_store_is_reported() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join(store_file_name("Graphs"));

        fs::write(&path, "title,authors\nA,B\n")?;
        assert!(matches!(
            PaperStore::open(dir.path(), "Graphs"),
            Err(CrawlError::StoreCorruption { .. })
        ));

        fs::write(&path, "id,title\nabc,A\nonly-one-field\n")?;
        assert!(matches!(
            PaperStore::open(dir.path(), "Graphs"),
            Err(CrawlError::StoreCorruption { .. })
        ));
        Ok(())
    }
}
