//! Image files under the upload directory, served back at `/uploads/<name>`.
//!
//! Uploads are streamed into a temporary file inside the directory while their MD5 digest is
//! computed. The final name (`<unix-millis>-<md5 prefix>-<random>.<ext>`) is fixed at that point but the
//! file only takes it once the caller persists the staged image; dropping a staged image removes
//! the temporary file.

use actix_web::web::Bytes;
use futures_util::{Stream, StreamExt};
use log::debug;
use md5::Context;
use std::fmt::Display;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::NamedTempFile;
use thiserror::Error;
use uuid::Uuid;

pub const URL_PREFIX: &str = "/uploads";

#[derive(Debug, Error)]
pub enum ImageStoreError {
    #[error("file system error: {0}")]
    Io(#[from] io::Error),
    #[error("file exceeds {limit} bytes")]
    TooLarge { limit: usize },
    #[error("upload stream failed: {0}")]
    Stream(String),
    #[error("'{0}' does not name an uploaded file")]
    InvalidUrl(String),
}

pub struct ImageStore {
    dir: PathBuf,
    max_bytes: usize,
}

/// An upload written to a temporary file, not yet visible under its final URL.
pub struct StagedImage {
    file: NamedTempFile,
    path: PathBuf,
    url: String,
    size: usize,
}

impl StagedImage {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Moves the file to its final name. Fails instead of overwriting an existing file.
    pub fn persist(self) -> Result<String, ImageStoreError> {
        self.file
            .persist_noclobber(&self.path)
            .map_err(|e| ImageStoreError::Io(e.error))?;
        Ok(self.url)
    }
}

impl ImageStore {
    /// Opens the upload directory, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>, max_bytes: usize) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, max_bytes })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Streams one uploaded file into the directory.
    ///
    /// The extension comes from `original_name` when it has a plain alphanumeric one, otherwise
    /// from `content_type`, otherwise `bin`.
    pub async fn stage<S, E>(
        &self,
        original_name: Option<&str>,
        content_type: Option<&str>,
        mut stream: S,
    ) -> Result<StagedImage, ImageStoreError>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: Display,
    {
        let mut file = NamedTempFile::new_in(&self.dir)?;
        let mut hasher = Context::new();
        let mut size = 0usize;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ImageStoreError::Stream(e.to_string()))?;
            size += chunk.len();
            if size > self.max_bytes {
                return Err(ImageStoreError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            hasher.consume(&chunk);
            file.write_all(&chunk)?;
        }
        file.flush()?;

        let digest = format!("{:x}", hasher.finalize());
        // Identical bytes uploaded in the same millisecond must still get distinct names.
        let nonce = Uuid::new_v4().simple().to_string();
        let name = format!(
            "{}-{}-{}.{}",
            unix_millis(),
            &digest[..12],
            &nonce[..12],
            extension(original_name, content_type)
        );
        debug!("staged upload {name} ({size} bytes, md5 {digest})");

        Ok(StagedImage {
            file,
            path: self.dir.join(&name),
            url: format!("{URL_PREFIX}/{name}"),
            size,
        })
    }

    /// Maps an image URL to its file. Only the last path segment is used, so
    /// `/uploads/a.png` and `http://host/uploads/a.png` name the same file and `..` cannot
    /// escape the directory.
    pub fn path_for(&self, url: &str) -> Result<PathBuf, ImageStoreError> {
        let name = url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default();
        if name.is_empty() || name == "." || name == ".." || name.contains('\\') {
            return Err(ImageStoreError::InvalidUrl(url.to_string()));
        }
        Ok(self.dir.join(name))
    }

    pub async fn delete(&self, url: &str) -> Result<(), ImageStoreError> {
        let path = self.path_for(url)?;
        tokio::fs::remove_file(&path).await?;
        debug!("removed {}", path.display());
        Ok(())
    }
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

fn extension(original_name: Option<&str>, content_type: Option<&str>) -> String {
    let from_name = original_name
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 10 && e.chars().all(|c| c.is_ascii_alphanumeric()));
    if let Some(ext) = from_name {
        return ext.to_ascii_lowercase();
    }
    content_type
        .and_then(mime_guess::get_mime_extensions_str)
        .and_then(|exts| exts.first())
        .map_or_else(|| "bin".to_string(), |e| e.to_string())
}
