//! Inspect command implementation.

use super::{open_existing, CliResult};
use metastore_storage::BucketStats;
use serde::Serialize;
use std::path::Path;

/// Database inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Database path.
    pub path: String,
    /// File size in bytes.
    pub file_size: u64,
    /// Number of buckets.
    pub bucket_count: usize,
    /// Number of keys across all buckets.
    pub total_keys: u64,
    /// Per-bucket key counts, by bucket path.
    pub buckets: Vec<BucketStats>,
}

/// Collects statistics for the database at `path`.
pub fn inspect(path: &Path) -> CliResult<InspectResult> {
    let db = open_existing(path)?;
    let buckets = db.bucket_stats()?;
    Ok(InspectResult {
        path: path.display().to_string(),
        file_size: std::fs::metadata(path)?.len(),
        bucket_count: buckets.len(),
        total_keys: buckets.iter().map(|b| b.keys).sum(),
        buckets,
    })
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> CliResult<()> {
    let result = inspect(path)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Metastore Database: {}", result.path);
    println!("==========================================");
    println!();
    println!("File size: {} bytes", result.file_size);
    println!("Buckets:   {}", result.bucket_count);
    println!("Keys:      {}", result.total_keys);

    if !result.buckets.is_empty() {
        println!();
        let width = result
            .buckets
            .iter()
            .map(|b| b.bucket.len())
            .max()
            .unwrap_or(0);
        for stats in &result.buckets {
            println!("  {:<width$}  {:>8}", stats.bucket, stats.keys);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CliError;
    use metastore_storage::{EmbeddedDb, Engine, Interface};

    #[test]
    fn inspect_counts_keys_per_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.db");
        {
            let db = EmbeddedDb::open_path(&path).unwrap();
            let users = db.store("users").unwrap();
            users.put("a", b"1").unwrap();
            users.put("b", b"2").unwrap();
            db.store_in(&["alerts", "t1"]).unwrap().put("x", b"3").unwrap();
        }

        let result = inspect(&path).unwrap();
        assert_eq!(result.bucket_count, 2);
        assert_eq!(result.total_keys, 3);
        assert_eq!(result.buckets[0].bucket, "alerts/t1");
        assert_eq!(result.buckets[1].bucket, "users");
        assert!(result.file_size > 0);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["buckets"][1]["keys"], 2);
    }

    #[test]
    fn inspect_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = inspect(&dir.path().join("none.db")).unwrap_err();
        assert!(matches!(err, CliError::NotFound(_)));
    }
}
