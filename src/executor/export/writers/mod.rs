//! Artifact writers for export operations
//!
//! This module renders projected records into the artifact body and
//! optionally delivers that body to disk.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;
use uuid::Uuid;

use crate::error::{ExportError, Result};

pub mod csv;

pub use csv::CsvSerializer;

/// Extension of every artifact this exporter produces.
pub const CSV_EXTENSION: &str = "csv";

/// Build an artifact file name: `<report>_<ISO-8601 UTC>_<uuid>.csv`
///
/// # Arguments
/// * `report_name` - Report (or saved search) name
/// * `generated_at` - Generation timestamp
pub fn artifact_file_name(report_name: &str, generated_at: DateTime<Utc>) -> String {
    format!(
        "{}_{}_{}.{}",
        report_name,
        generated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        Uuid::new_v4(),
        CSV_EXTENSION
    )
}

/// Helper function to create a buffered file writer
///
/// # Arguments
/// * `path` - File path to create
///
/// # Returns
/// * `Result<BufWriter<File>>` - Buffered writer or error
pub(crate) async fn create_writer(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).await.map_err(|e| {
        ExportError::Generic(format!("Failed to create file {}: {}", path.display(), e))
    })?;
    Ok(BufWriter::with_capacity(8 * 1024 * 1024, file)) // 8MB buffer
}

/// Helper function to validate the output directory
///
/// # Arguments
/// * `dir` - Directory the artifact is written into
///
/// # Returns
/// * `Result<()>` - Success or error
pub(crate) fn validate_dir(dir: &Path) -> Result<()> {
    if !dir.as_os_str().is_empty() && !dir.is_dir() {
        return Err(ExportError::Generic(format!(
            "Directory does not exist: {}",
            dir.display()
        )));
    }

    Ok(())
}

/// Write an artifact body into `dir` under `file_name`
///
/// # Returns
/// * `Result<(PathBuf, u64)>` - Written path and size in bytes
pub async fn write_artifact(dir: &Path, file_name: &str, body: &str) -> Result<(PathBuf, u64)> {
    validate_dir(dir)?;
    let path = dir.join(file_name);

    let mut writer = create_writer(&path).await?;
    writer.write_all(body.as_bytes()).await?;
    writer.flush().await?;

    let size = tokio::fs::metadata(&path).await?.len();
    debug!("Wrote {} bytes to {}", size, path.display());
    Ok((path, size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_artifact_file_name() {
        let at = Utc.with_ymd_and_hms(2020, 7, 29, 15, 43, 55).unwrap();
        let name = artifact_file_name("Show category and gender", at);

        let rest = name
            .strip_prefix("Show category and gender_2020-07-29T15:43:55.000Z_")
            .unwrap();
        let id = rest.strip_suffix(".csv").unwrap();
        assert!(Uuid::parse_str(id).is_ok());
        assert_ne!(name, artifact_file_name("Show category and gender", at));
    }

    #[test]
    fn test_validate_dir() {
        assert!(validate_dir(Path::new("")).is_ok());
        assert!(validate_dir(&std::env::temp_dir()).is_ok());
        assert!(validate_dir(Path::new("/definitely/not/a/dir")).is_err());
    }

    #[tokio::test]
    async fn test_write_artifact() {
        let dir = std::env::temp_dir();
        let file_name = format!("ssexport-test-{}.csv", Uuid::new_v4());

        let (path, size) = write_artifact(&dir, &file_name, "a,b\n1,2").await.unwrap();

        assert_eq!(size, 7);
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "a,b\n1,2");
        tokio::fs::remove_file(&path).await.unwrap();
    }
}
