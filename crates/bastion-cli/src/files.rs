use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use serde::de::DeserializeOwned;

use bastion_core::batch::{BatchItem, BatchReport};
use bastion_core::util::failed_items_path;

/// Read a JSON array from `path`.
pub fn read_json_array<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("{} is not a JSON array of records", path.display()))
}

/// Read batch input records (`[{"url": ..., "id": ...}, ...]`).
pub fn read_batch_items(path: &Path) -> Result<Vec<BatchItem>> {
    let items: Vec<BatchItem> = read_json_array(path)?;
    if items.is_empty() {
        bail!("{} contains no records", path.display());
    }
    Ok(items)
}

/// Pretty-print `value` as JSON into `path`, creating parent directories.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Write all outcomes to `output` and, when anything failed, the failed
/// subset next to it. Returns the failed-items path if one was written.
pub fn write_batch_outputs(output: &Path, report: &BatchReport) -> Result<Option<PathBuf>> {
    write_json(output, &report.outcomes)?;

    if !report.has_failures() {
        return Ok(None);
    }

    let failed_path = failed_items_path(output);
    write_json(&failed_path, &report.failed())?;
    Ok(Some(failed_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    use bastion_core::batch::{BatchOutcome, BatchStats};
    use bastion_core::models::{ArticleRecord, RequestOutcome};

    fn outcome(url: &str, id: i64, success: bool) -> BatchOutcome {
        let outcome = if success {
            RequestOutcome::succeeded(url, ArticleRecord::default(), 1)
        } else {
            RequestOutcome::failed(url, "HTTP 404: gone", 1)
        };
        BatchOutcome {
            id: Some(id.into()),
            outcome,
            extra: Default::default(),
        }
    }

    fn report(outcomes: Vec<BatchOutcome>) -> BatchReport {
        let stats = BatchStats::from_outcomes(&outcomes);
        BatchReport { outcomes, stats }
    }

    #[test]
    fn test_read_batch_items() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("urls.json");
        std::fs::write(
            &input,
            r#"[{"url": "https://a.test/1", "id": 7, "feed": "x"}, {"url": "https://a.test/2"}]"#,
        )
        .unwrap();

        let items = read_batch_items(&input).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, Some(7.into()));
        assert_eq!(items[0].extra["feed"], "x");
        assert_eq!(items[1].id, None);
    }

    #[test]
    fn test_read_batch_items_rejects_bad_input() {
        let dir = tempfile::tempdir().unwrap();

        let empty = dir.path().join("empty.json");
        std::fs::write(&empty, "[]").unwrap();
        assert!(read_batch_items(&empty).is_err());

        let object = dir.path().join("object.json");
        std::fs::write(&object, r#"{"url": "https://a.test"}"#).unwrap();
        assert!(read_batch_items(&object).is_err());

        assert!(read_batch_items(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_all_success_writes_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("results.json");

        let failed = write_batch_outputs(&output, &report(vec![outcome("https://a.test/1", 1, true)]))
            .unwrap();

        assert!(failed.is_none());
        assert!(output.exists());
        assert!(!dir.path().join("results-failed.json").exists());
    }

    #[test]
    fn test_failures_written_next_to_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out").join("results.json");

        let failed = write_batch_outputs(
            &output,
            &report(vec![
                outcome("https://a.test/1", 1, true),
                outcome("https://a.test/2", 2, false),
            ]),
        )
        .unwrap()
        .unwrap();

        assert_eq!(failed, dir.path().join("out").join("results-failed.json"));

        let all: Vec<serde_json::Value> = read_json_array(&output).unwrap();
        assert_eq!(all.len(), 2);

        let only_failed: Vec<serde_json::Value> = read_json_array(&failed).unwrap();
        assert_eq!(only_failed.len(), 1);
        assert_eq!(only_failed[0]["id"], 2);
        assert_eq!(only_failed[0]["success"], false);
    }
}
