//! SQL-file migration runner.
//!
//! Migrations are plain SQL files named `NNNN_description.sql`,
//! applied in ascending order. Each file inserts its own row into the
//! `migrations` table; the runner verifies that the deployed version
//! equals the filename prefix after every file, so a migration that
//! forgets its version row aborts the run.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, Statement};

use crate::error::{DbError, Result};

static MIGRATION_FILENAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})_.*\.sql$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    pub version: i32,
    pub path: PathBuf,
}

/// List migration files in ascending version order. Any `.sql` file
/// not matching the naming scheme is an error, not a skip.
pub fn migration_files(dir: &Path) -> Result<Vec<MigrationFile>> {
    let pattern = dir.join("*.sql");
    let pattern = pattern
        .to_str()
        .ok_or_else(|| DbError::Migration(format!("non-utf8 migrations dir {dir:?}")))?;

    let mut files = Vec::new();
    let paths =
        glob::glob(pattern).map_err(|e| DbError::Migration(format!("bad glob pattern: {e}")))?;
    for entry in paths {
        let path = entry.map_err(|e| DbError::Migration(e.to_string()))?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| DbError::Migration(format!("unreadable file name {path:?}")))?;
        let captures = MIGRATION_FILENAME.captures(filename).ok_or_else(|| {
            DbError::Migration(format!("unexpected migration file name {filename}"))
        })?;
        let version: i32 = captures[1]
            .parse()
            .map_err(|e| DbError::Migration(format!("{filename}: {e}")))?;
        files.push(MigrationFile { version, path });
    }
    files.sort_by_key(|f| f.version);
    Ok(files)
}

/// Highest applied version, or `None` when the migrations table does
/// not exist yet.
pub async fn deployed_version(db: &DatabaseConnection) -> Result<Option<i32>> {
    let present = db
        .query_one(Statement::from_string(
            DbBackend::Postgres,
            "SELECT to_regclass('migrations') IS NOT NULL AS present".to_string(),
        ))
        .await?
        .map(|row| row.try_get::<bool>("", "present"))
        .transpose()?
        .unwrap_or(false);
    if !present {
        return Ok(None);
    }

    let version = db
        .query_one(Statement::from_string(
            DbBackend::Postgres,
            "SELECT MAX(version) AS version FROM migrations".to_string(),
        ))
        .await?
        .map(|row| row.try_get::<Option<i32>>("", "version"))
        .transpose()?
        .flatten();
    Ok(version)
}

/// Apply all pending migrations from `dir`.
pub async fn migrate(db: &DatabaseConnection, dir: &Path) -> Result<()> {
    let deployed = deployed_version(db).await?;

    for file in migration_files(dir)? {
        if deployed.map_or(false, |v| v >= file.version) {
            continue;
        }

        tracing::info!(version = file.version, path = %file.path.display(), "Applying migration");
        let sql = std::fs::read_to_string(&file.path)
            .map_err(|e| DbError::Migration(format!("{}: {e}", file.path.display())))?;
        db.execute_unprepared(&sql).await?;

        let now_deployed = deployed_version(db).await?;
        if now_deployed != Some(file.version) {
            return Err(DbError::Migration(format!(
                "unexpected deployed version {now_deployed:?} after applying {}",
                file.path.display()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn lists_files_in_version_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["0002_b.sql", "0001_a.sql", "0010_c.sql"] {
            fs::write(dir.path().join(name), "SELECT 1;").unwrap();
        }
        let files = migration_files(dir.path()).unwrap();
        let versions: Vec<i32> = files.iter().map(|f| f.version).collect();
        assert_eq!(versions, vec![1, 2, 10]);
    }

    #[test]
    fn rejects_unexpected_file_names() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("01_short_prefix.sql"), "SELECT 1;").unwrap();
        assert!(migration_files(dir.path()).is_err());
    }

    #[test]
    fn repo_migrations_are_well_formed() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../migrations");
        let files = migration_files(&dir).unwrap();
        assert!(!files.is_empty());
        for (expected, file) in (1..).zip(&files) {
            assert_eq!(file.version, expected, "gap at {:?}", file.path);
            let sql = fs::read_to_string(&file.path).unwrap();
            assert!(
                sql.contains(&format!("INSERT INTO migrations (version) VALUES ({expected})")),
                "{:?} must record its own version",
                file.path
            );
        }
    }
}
