//! Saving attachments into the scratch directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Reduce an attachment name to a safe single path component.
///
/// Directory parts are dropped and anything outside `[A-Za-z0-9._ -]` becomes `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "attachment".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Write `content` to `<dir>/<unix-millis>_<sanitized-name>`.
///
/// Never overwrites: when the name is taken a counter is inserted after the
/// timestamp until a free name is found.
pub async fn save_attachment(dir: &Path, name: &str, content: &[u8]) -> std::io::Result<PathBuf> {
    let millis = Utc::now().timestamp_millis();
    let safe = sanitize_file_name(name);

    let mut attempt = 0u32;
    loop {
        let file_name = if attempt == 0 {
            format!("{millis}_{safe}")
        } else {
            format!("{millis}_{attempt}_{safe}")
        };
        let path = dir.join(file_name);

        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(mut file) => {
                file.write_all(content).await?;
                file.flush().await?;
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e),
        }
    }
}

/// Delete attachments saved earlier in a message that could not be completed.
pub(crate) async fn discard_saved(paths: &[PathBuf]) {
    for path in paths {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!(path = %path.display(), "discarded partial attachment"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to discard partial attachment"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_drops_directories_and_odd_characters() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\reports\\Leads Q3.xlsx"), "Leads Q3.xlsx");
        assert_eq!(sanitize_file_name("leads:*?.csv"), "leads___.csv");
        assert_eq!(sanitize_file_name(".hidden.csv"), "hidden.csv");
        assert_eq!(sanitize_file_name("  "), "attachment");
    }

    #[tokio::test]
    async fn save_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let first = save_attachment(dir.path(), "leads.xlsx", b"one").await.unwrap();
        let second = save_attachment(dir.path(), "leads.xlsx", b"two").await.unwrap();

        assert_ne!(first, second);
        assert_eq!(std::fs::read(&first).unwrap(), b"one");
        assert_eq!(std::fs::read(&second).unwrap(), b"two");

        let name = first.file_name().unwrap().to_string_lossy().to_string();
        let (stamp, rest) = name.split_once('_').unwrap();
        assert!(stamp.parse::<i64>().is_ok());
        assert!(rest.ends_with("leads.xlsx"));
    }

    #[tokio::test]
    async fn discard_removes_saved_files_and_tolerates_missing_ones() {
        let dir = tempfile::tempdir().unwrap();
        let saved = save_attachment(dir.path(), "a.csv", b"a").await.unwrap();
        let gone = save_attachment(dir.path(), "b.csv", b"b").await.unwrap();
        std::fs::remove_file(&gone).unwrap();

        discard_saved(&[saved.clone(), gone]).await;
        assert!(!saved.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
