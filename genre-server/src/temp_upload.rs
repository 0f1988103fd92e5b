//! Uploaded bytes → scratch file → classification.
//!
//! The scratch file is a `NamedTempFile` with a random name, so concurrent
//! uploads of the same filename never collide, and it is removed when the
//! guard drops on every path out of `classify_upload`.

use std::io::Write;
use std::path::{Path, PathBuf};

use axum::body::Bytes;
use genre_core::{GenreClassifier, GenreError, GenrePrediction};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

const TEMP_PREFIX: &str = "genre-upload-";

/// Classify an uploaded file on the blocking pool.
///
/// `file_name` only contributes its extension, which the decoder uses as a
/// format hint.
pub async fn classify_upload(
    classifier: GenreClassifier,
    temp_dir: Option<PathBuf>,
    file_name: Option<String>,
    data: Bytes,
) -> Result<GenrePrediction, GenreError> {
    tokio::task::spawn_blocking(move || {
        let extension = file_name.as_deref().and_then(safe_extension);
        let scratch = write_scratch(temp_dir.as_deref(), extension.as_deref(), &data)?;
        debug!(path = ?scratch.path(), bytes = data.len(), "upload staged");

        let result = classifier.classify_file(scratch.path());

        let path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            warn!(path = ?path, "failed to remove upload scratch file: {e}");
        }
        result
    })
    .await
    .map_err(|e| GenreError::Other(anyhow::anyhow!("classification task failed: {e}")))?
}

fn write_scratch(
    dir: Option<&Path>,
    extension: Option<&str>,
    data: &[u8],
) -> Result<NamedTempFile, GenreError> {
    let suffix = extension.map(|ext| format!(".{ext}")).unwrap_or_default();
    let mut builder = tempfile::Builder::new();
    builder.prefix(TEMP_PREFIX).suffix(&suffix);
    let mut file = match dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };
    file.write_all(data)?;
    file.flush()?;
    Ok(file)
}

/// Lower-cased alphanumeric extension of a client-supplied name, if any.
fn safe_extension(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name).extension()?.to_str()?;
    (!ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .then(|| ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_taken_from_client_name() {
        assert_eq!(safe_extension("song.MP3").as_deref(), Some("mp3"));
        assert_eq!(safe_extension("../../etc/clip.wav").as_deref(), Some("wav"));
        assert_eq!(safe_extension("noext"), None);
        assert_eq!(safe_extension("weird.w/v"), None);
        assert_eq!(safe_extension("x.a b"), None);
    }

    #[test]
    fn scratch_file_holds_bytes_and_vanishes_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_scratch(Some(dir.path()), Some("wav"), b"abc").unwrap();
        let path = file.path().to_path_buf();
        assert_eq!(std::fs::read(&path).unwrap(), b"abc");
        assert!(path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(TEMP_PREFIX) && n.ends_with(".wav")));
        drop(file);
        assert!(!path.exists());
    }
}
