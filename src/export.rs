//! Export of topic stores as search-index documents.

use crate::error::Result;
use crate::record::{is_sentinel, StoredPaper};
use crate::store::PaperStore;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

/// One document as consumed by the search index. Sentinels become `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexDocument {
    pub id: String,
    pub keyword: String,
    pub title: String,
    pub authors: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub link: Option<String>,
    pub paperlink: Option<String>,
    pub year: Option<i32>,
}

fn present(value: String) -> Option<String> {
    (!is_sentinel(&value)).then_some(value)
}

impl From<StoredPaper> for IndexDocument {
    fn from(p: StoredPaper) -> Self {
        let r = p.record;
        Self {
            id: p.id,
            keyword: p.keyword,
            title: r.title,
            authors: present(r.authors),
            kind: present(r.kind),
            abstract_text: present(r.abstract_text),
            link: present(r.link),
            paperlink: present(r.paperlink),
            year: r.year,
        }
    }
}

/// Documents of every topic's store under `data_dir`, topic by topic.
///
/// Topics without a store are skipped with a warning. A store that exists
/// but cannot be read fails the export.
pub fn collect_documents(data_dir: &Path, topics: &[String]) -> Result<Vec<IndexDocument>> {
    let mut documents = Vec::new();
    for topic in topics {
        let store = PaperStore::open(data_dir, topic)?;
        if !store.path().exists() {
            warn!(topic = %topic, "No store found at {:?}, skipping", store.path());
            continue;
        }

        let papers = store.read_all()?;
        info!(topic = %topic, documents = papers.len(), "Loaded store");
        documents.extend(papers.into_iter().map(IndexDocument::from));
    }
    Ok(documents)
}

/// Write `documents` as a pretty-printed JSON array.
pub fn write_documents(path: &Path, documents: &[IndexDocument]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, documents)?;
    writer.flush()?;

    info!(documents = documents.len(), "Exported: {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::PaperRecord;
    use tempfile::TempDir;

    #[test]
    fn test_sentinels_become_null() -> Result<()> {
        let paper = StoredPaper::new(
            PaperRecord::new("Random graphs").authors(Some("P Erdos".into())),
            "Graph Theory",
        );
        let json = serde_json::to_value(IndexDocument::from(paper))?;

        assert_eq!(json["keyword"], "Graph Theory");
        assert_eq!(json["authors"], "P Erdos");
        assert!(json["abstract"].is_null());
        assert!(json["type"].is_null());
        assert!(json["year"].is_null());
        Ok(())
    }

    #[test]
    fn test_export_skips_missing_stores() -> Result<()> {
        let dir = TempDir::new()?;
        PaperStore::open(dir.path(), "Graph Theory")?.append(vec![
            PaperRecord::new("Random graphs").year(Some(1959)),
            PaperRecord::new("Planar graphs"),
        ])?;
        PaperStore::open(dir.path(), "Antenna")?
            .append(vec![PaperRecord::new("Patch antennas")])?;

        let topics = vec!["Graph Theory".to_string(), "Missing".to_string(), "Antenna".to_string()];
        let docs = collect_documents(dir.path(), &topics)?;
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].year, Some(1959));
        assert_eq!(docs[2].keyword, "Antenna");

        let out = dir.path().join("export").join("index.json");
        write_documents(&out, &docs)?;
        let parsed: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out)?)?;
        assert_eq!(parsed.as_array().map(Vec::len), Some(3));
        assert_eq!(parsed[1]["title"], "Planar graphs");
        Ok(())
    }
}
