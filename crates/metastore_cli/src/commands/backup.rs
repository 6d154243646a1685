//! Backup command.
//!
//! Writes a consistent snapshot of a database file. The source stays
//! readable during the copy; writers wait until it finishes.

use super::{open_existing, CliError, CliResult};
use std::fs;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

/// Copies the database at `db_path` to `output_path`.
///
/// Returns the number of bytes written.
pub fn create(db_path: &Path, output_path: &Path, force: bool) -> CliResult<u64> {
    if output_path.exists() && !force {
        return Err(CliError::OutputExists(output_path.display().to_string()));
    }
    info!("Creating backup of {:?}", db_path);

    let db = open_existing(db_path)?;
    let snapshot = db.backup()?;

    let mut writer = BufWriter::new(fs::File::create(output_path)?);
    let written = snapshot.write_to(&mut writer)?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;

    Ok(written)
}

/// Runs the backup command.
pub fn run(db_path: &Path, output_path: &Path, force: bool) -> CliResult<()> {
    let size = create(db_path, output_path, force)?;

    println!("✓ Backup created successfully");
    println!("  Path: {:?}", output_path);
    println!("  Size: {} bytes", size);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use metastore_storage::{EmbeddedDb, Engine, Interface, ReadOperator};

    fn populated(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("live.db");
        let db = EmbeddedDb::open_path(&path).unwrap();
        db.store("users").unwrap().put("ann", b"1").unwrap();
        path
    }

    #[test]
    fn backup_writes_openable_copy() {
        let dir = tempfile::tempdir().unwrap();
        let live = populated(dir.path());
        let out = dir.path().join("copy.db");

        let size = create(&live, &out, false).unwrap();
        assert_eq!(fs::metadata(&out).unwrap().len(), size);

        let copy = EmbeddedDb::open_path(&out).unwrap();
        assert_eq!(copy.store("users").unwrap().get("ann").unwrap().value, b"1");
    }

    #[test]
    fn backup_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let live = populated(dir.path());
        let out = dir.path().join("copy.db");
        fs::write(&out, b"keep").unwrap();

        let err = create(&live, &out, false).unwrap_err();
        assert!(matches!(err, CliError::OutputExists(_)));
        assert_eq!(fs::read(&out).unwrap(), b"keep");

        create(&live, &out, true).unwrap();
        let copy = EmbeddedDb::open_path(&out).unwrap();
        assert!(copy.store("users").unwrap().exists("ann").unwrap());
    }
}
