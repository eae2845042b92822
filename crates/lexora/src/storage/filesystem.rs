use std::path::{Component, Path, PathBuf};

use uuid::Uuid;

use crate::error::StorageError;

/// Top-level directories under the upload root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Audio,
    Videos,
    Avatars,
}

impl Bucket {
    pub const ALL: [Bucket; 3] = [Bucket::Audio, Bucket::Videos, Bucket::Avatars];

    pub fn dir_name(&self) -> &'static str {
        match self {
            Bucket::Audio => "audio",
            Bucket::Videos => "videos",
            Bucket::Avatars => "avatars",
        }
    }
}

/// Stores generated and uploaded media below a single upload directory and
/// translates between local paths and externally servable references.
#[derive(Debug, Clone)]
pub struct ArtifactStorage {
    root: PathBuf,
    public_prefix: String,
}

impl ArtifactStorage {
    pub fn new<P: AsRef<Path>>(root: P, public_prefix: &str) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            public_prefix: public_prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Creates the upload root and every bucket directory.
    pub fn ensure_layout(&self) -> Result<(), StorageError> {
        for bucket in Bucket::ALL {
            ensure_directory(&self.bucket_dir(bucket))?;
        }
        Ok(())
    }

    pub fn bucket_dir(&self, bucket: Bucket) -> PathBuf {
        self.root.join(bucket.dir_name())
    }

    /// Returns a fresh, unused path `<bucket>/<uuid>.<extension>`.
    pub fn allocate(&self, bucket: Bucket, extension: &str) -> PathBuf {
        let file_name = format!("{}.{}", Uuid::new_v4(), extension.trim_start_matches('.'));
        self.bucket_dir(bucket).join(file_name)
    }

    /// Public reference for a file in a bucket: `<prefix>/<bucket>/<file>`.
    pub fn public_reference(&self, bucket: Bucket, path: &Path) -> String {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{}/{}/{}", self.public_prefix, bucket.dir_name(), file_name)
    }

    /// Maps a reference back to a local path.
    ///
    /// References under the public prefix resolve into the upload directory.
    /// Anything else is taken as a filesystem path.
    pub fn resolve_reference(&self, reference: &str) -> PathBuf {
        let prefix = format!("{}/", self.public_prefix);
        if let Some(relative) = reference.strip_prefix(&prefix) {
            let mut resolved = self.root.clone();
            for component in Path::new(relative).components() {
                // Only plain names; `..` and absolute parts never escape the root.
                if let Component::Normal(part) = component {
                    resolved.push(part);
                }
            }
            return resolved;
        }
        PathBuf::from(reference)
    }

    pub async fn write(&self, path: &Path, content: &[u8]) -> Result<(), StorageError> {
        write_file(path, content).await
    }

    pub async fn read(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        tokio::fs::read(path)
            .await
            .map_err(|e| StorageError::ReadFile {
                path: path.to_path_buf(),
                source: e,
            })
    }

    /// Removes a file. Returns `false` if it did not exist.
    pub async fn remove_if_exists(&self, path: &Path) -> Result<bool, StorageError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::RemoveFile {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    /// Saves an uploaded avatar as `avatars/<uuid>_<sanitized name>`.
    pub async fn store_avatar(
        &self,
        original_name: &str,
        content: &[u8],
    ) -> Result<PathBuf, StorageError> {
        let file_name = format!("{}_{}", Uuid::new_v4(), sanitize_file_name(original_name));
        let path = self.bucket_dir(Bucket::Avatars).join(file_name);
        write_file(&path, content).await?;
        Ok(path)
    }
}

/// Writes a file, creating its parent directories first.
pub async fn write_file(path: &Path, content: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
    }
    tokio::fs::write(path, content)
        .await
        .map_err(|e| StorageError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })
}

fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

/// Keeps the final path component and replaces anything outside
/// `[A-Za-z0-9._-]` with `_`.
fn sanitize_file_name(original_name: &str) -> String {
    let base = Path::new(original_name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches(|c| c == '.' || c == '_').is_empty() {
        "avatar".to_string()
    } else {
        cleaned
    }
}
