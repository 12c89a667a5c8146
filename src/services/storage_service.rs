//! src/services/storage_service.rs
//!
//! StorageService — every filesystem operation the HTTP layer needs, against
//! a single flat storage root. There is no metadata store: a file record is
//! whatever `stat` says about a regular file directly under `base_path`.

use crate::{
    config::AppConfig,
    filename::{extension_of, secure_filename},
    models::file::FileRecord,
};
use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("no filename supplied")]
    EmptyFilename,
    #[error("file type of `{0}` is not allowed")]
    ExtensionNotAllowed(String),
    #[error("filename `{0}` has no safe representation")]
    InvalidFilename(String),
    #[error("`{0}` resolves outside the storage root")]
    PathEscape(String),
    #[error("file `{0}` not found")]
    FileNotFound(String),
    #[error("reading request body: {0}")]
    Body(#[source] io::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// StorageService provides the three file operations:
/// - Upload a file (streams bytes to a hidden temp file, then renames it in place)
/// - List files (regular, non-hidden entries of the storage root)
/// - Open a file for download (after sanitizing and containment checks)
///
/// Cloned into every request as router state; the configuration it carries
/// is immutable for the life of the process.
#[derive(Clone, Debug)]
pub struct StorageService {
    /// Settings fixed at startup (limits, allow-set, storage root).
    pub config: Arc<AppConfig>,

    /// Directory on disk holding all uploaded files.
    pub base_path: PathBuf,
}

impl StorageService {
    pub fn new(config: Arc<AppConfig>) -> Self {
        let base_path = config.storage_dir.clone();
        Self { config, base_path }
    }

    /// Validate an uploaded filename and return the name it is stored under.
    ///
    /// The extension is checked on the name as sent by the client, before
    /// sanitization, matching what the user sees in their file picker.
    pub fn resolve_upload_name(&self, original: &str) -> StorageResult<String> {
        if original.is_empty() {
            return Err(StorageError::EmptyFilename);
        }

        let allowed = extension_of(original)
            .map(|ext| self.config.is_extension_allowed(&ext))
            .unwrap_or(false);
        if !allowed {
            return Err(StorageError::ExtensionNotAllowed(original.to_string()));
        }

        let name = secure_filename(original);
        if name.is_empty() {
            return Err(StorageError::InvalidFilename(original.to_string()));
        }
        Ok(name)
    }

    /// Stream-upload a file into the storage root.
    ///
    /// - Writes bytes incrementally to `.tmp-<uuid>` inside the root.
    /// - Flushes and fsyncs, then renames over any file with the same name.
    /// - Removes the temp file on any error, so a failed upload never
    ///   leaves a visible or truncated file behind.
    pub async fn upload_file_stream<S>(
        &self,
        original_name: &str,
        stream: S,
    ) -> StorageResult<FileRecord>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        let name = self.resolve_upload_name(original_name)?;
        let file_path = self.base_path.join(&name);
        let tmp_path = self.base_path.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut size: u64 = 0;
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    discard(&tmp_path).await;
                    return Err(StorageError::Body(err));
                }
            };
            size += chunk.len() as u64;
            if let Err(err) = file.write_all(&chunk).await {
                discard(&tmp_path).await;
                return Err(StorageError::Io(err));
            }
        }
        if let Err(err) = file.flush().await {
            discard(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            discard(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        drop(file);

        if let Err(err) = replace_with(&tmp_path, &file_path).await {
            discard(&tmp_path).await;
            return Err(StorageError::Io(err));
        }

        Ok(FileRecord { name, size })
    }

    /// List regular, non-hidden files directly under the storage root.
    ///
    /// Symlinks are followed; dangling links and names that are not valid
    /// UTF-8 are skipped. Results are sorted by name.
    pub async fn list_files(&self) -> StorageResult<Vec<FileRecord>> {
        let mut entries = fs::read_dir(&self.base_path).await?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                debug!("skipping non UTF-8 entry {:?}", entry.path());
                continue;
            };
            if name.starts_with('.') {
                continue;
            }

            match fs::metadata(entry.path()).await {
                Ok(meta) if meta.is_file() => files.push(FileRecord {
                    name,
                    size: meta.len(),
                }),
                Ok(_) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    debug!("skipping vanished or dangling entry {}", name);
                }
                Err(err) => return Err(StorageError::Io(err)),
            }
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    /// Map a requested download name to a canonical path inside the root.
    ///
    /// Returns the sanitized name alongside the path. Fails with
    /// `PathEscape` when the canonical path is not strictly below the
    /// canonical root (e.g. a symlink pointing elsewhere).
    pub async fn resolve_download_path(&self, requested: &str) -> StorageResult<(String, PathBuf)> {
        let name = secure_filename(requested);
        if name.is_empty() {
            return Err(StorageError::FileNotFound(requested.to_string()));
        }

        let root = fs::canonicalize(&self.base_path).await?;
        let resolved = fs::canonicalize(root.join(&name))
            .await
            .map_err(|err| not_found_or_io(err, &name))?;

        if !is_strictly_within(&resolved, &root) {
            return Err(StorageError::PathEscape(requested.to_string()));
        }

        Ok((name, resolved))
    }

    /// Fetch a file for reading.
    ///
    /// Returns its record and an opened File handle ready for streaming out.
    pub async fn open_file(&self, requested: &str) -> StorageResult<(FileRecord, File)> {
        let (name, path) = self.resolve_download_path(requested).await?;

        let file = File::open(&path)
            .await
            .map_err(|err| not_found_or_io(err, &name))?;
        let meta = file.metadata().await?;
        if !meta.is_file() {
            return Err(StorageError::FileNotFound(name));
        }

        Ok((
            FileRecord {
                name,
                size: meta.len(),
            },
            file,
        ))
    }
}

/// Rename `tmp_path` over `file_path`. Platforms that refuse to rename onto
/// an existing file get the target removed first.
async fn replace_with(tmp_path: &Path, file_path: &Path) -> io::Result<()> {
    match fs::rename(tmp_path, file_path).await {
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            fs::remove_file(file_path).await?;
            fs::rename(tmp_path, file_path).await
        }
        other => other,
    }
}

/// Best-effort removal of an abandoned temp file.
async fn discard(tmp_path: &Path) {
    if let Err(err) = fs::remove_file(tmp_path).await {
        warn!("failed to remove temp file {}: {}", tmp_path.display(), err);
    }
}

fn not_found_or_io(err: io::Error, name: &str) -> StorageError {
    if err.kind() == ErrorKind::NotFound {
        StorageError::FileNotFound(name.to_string())
    } else {
        StorageError::Io(err)
    }
}

/// True when `path` is below `root` and not `root` itself.
fn is_strictly_within(path: &Path, root: &Path) -> bool {
    path.starts_with(root) && path != root
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    fn setup_service() -> (TempDir, StorageService) {
        let temp_dir = TempDir::new().unwrap();
        let config = AppConfig::with_storage_dir(temp_dir.path());
        (temp_dir, StorageService::new(Arc::new(config)))
    }

    fn chunks(parts: &[&'static str]) -> impl Stream<Item = io::Result<Bytes>> + use<> {
        let items: Vec<io::Result<Bytes>> = parts
            .iter()
            .map(|p| Ok(Bytes::from_static(p.as_bytes())))
            .collect();
        stream::iter(items)
    }

    #[tokio::test]
    async fn upload_writes_all_chunks() {
        let (temp_dir, service) = setup_service();

        let record = service
            .upload_file_stream("report.pdf", chunks(&["hel", "lo"]))
            .await
            .unwrap();

        assert_eq!(record.name, "report.pdf");
        assert_eq!(record.size, 5);
        let on_disk = std::fs::read(temp_dir.path().join("report.pdf")).unwrap();
        assert_eq!(on_disk, b"hello");
    }

    #[tokio::test]
    async fn upload_sanitizes_name() {
        let (temp_dir, service) = setup_service();

        let record = service
            .upload_file_stream("../../escape.txt", chunks(&["x"]))
            .await
            .unwrap();

        assert_eq!(record.name, "escape.txt");
        assert!(temp_dir.path().join("escape.txt").is_file());
    }

    #[tokio::test]
    async fn upload_overwrites_existing_file() {
        let (temp_dir, service) = setup_service();

        service
            .upload_file_stream("notes.txt", chunks(&["first version"]))
            .await
            .unwrap();
        let record = service
            .upload_file_stream("notes.txt", chunks(&["second"]))
            .await
            .unwrap();

        assert_eq!(record.size, 6);
        let on_disk = std::fs::read(temp_dir.path().join("notes.txt")).unwrap();
        assert_eq!(on_disk, b"second");
    }

    #[tokio::test]
    async fn failed_body_leaves_nothing_behind() {
        let (temp_dir, service) = setup_service();
        let body = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(io::Error::other("client went away")),
        ]);

        let err = service
            .upload_file_stream("broken.zip", body)
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Body(_)));
        let leftovers: Vec<_> = std::fs::read_dir(temp_dir.path()).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn failed_rename_removes_temp_file() {
        let (temp_dir, service) = setup_service();
        // A non-empty directory in the way makes the final rename fail
        let blocker = temp_dir.path().join("blocked.txt");
        std::fs::create_dir(&blocker).unwrap();
        std::fs::write(blocker.join("inner"), b"keep").unwrap();

        let err = service
            .upload_file_stream("blocked.txt", chunks(&["payload"]))
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Io(_)));
        let names: Vec<String> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["blocked.txt"]);
    }

    #[test]
    fn upload_name_validation() {
        let (_temp_dir, service) = setup_service();

        assert!(matches!(
            service.resolve_upload_name(""),
            Err(StorageError::EmptyFilename)
        ));
        assert!(matches!(
            service.resolve_upload_name("setup.exe"),
            Err(StorageError::ExtensionNotAllowed(_))
        ));
        assert!(matches!(
            service.resolve_upload_name("README"),
            Err(StorageError::ExtensionNotAllowed(_))
        ));
        assert!(matches!(
            service.resolve_upload_name("/.txt/..txt"),
            Ok(ref name) if name == "txt_..txt"
        ));
        assert!(matches!(
            service.resolve_upload_name("***.txt"),
            Ok(ref name) if name == "txt"
        ));
        assert!(matches!(
            service.resolve_upload_name(".._.txt"),
            Ok(ref name) if name == "txt"
        ));
        assert_eq!(service.resolve_upload_name("Photo.JPEG").unwrap(), "Photo.JPEG");
    }

    #[test]
    fn upload_name_with_no_safe_form_is_rejected() {
        let (_temp_dir, service) = setup_service();
        let config = AppConfig {
            allowed_extensions: vec!["".into()],
            ..(*service.config).clone()
        };
        let service = StorageService::new(Arc::new(config));

        assert!(matches!(
            service.resolve_upload_name("..."),
            Err(StorageError::InvalidFilename(_))
        ));
    }

    #[tokio::test]
    async fn list_skips_hidden_entries_and_directories() {
        let (temp_dir, service) = setup_service();
        std::fs::write(temp_dir.path().join("b.txt"), b"bb").unwrap();
        std::fs::write(temp_dir.path().join("a.png"), b"a").unwrap();
        std::fs::write(temp_dir.path().join(".gitkeep"), b"").unwrap();
        std::fs::create_dir(temp_dir.path().join("nested")).unwrap();

        let files = service.list_files().await.unwrap();

        assert_eq!(
            files,
            vec![
                FileRecord {
                    name: "a.png".into(),
                    size: 1
                },
                FileRecord {
                    name: "b.txt".into(),
                    size: 2
                },
            ]
        );
    }

    #[tokio::test]
    async fn list_of_missing_root_is_an_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let config = AppConfig::with_storage_dir(temp_dir.path().join("absent"));
        let service = StorageService::new(Arc::new(config));

        assert!(matches!(
            service.list_files().await,
            Err(StorageError::Io(_))
        ));
    }

    #[tokio::test]
    async fn open_returns_contents_and_size() {
        let (temp_dir, service) = setup_service();
        std::fs::write(temp_dir.path().join("song.mp3"), b"la la").unwrap();

        let (record, mut file) = service.open_file("song.mp3").await.unwrap();
        let mut contents = Vec::new();
        file.read_to_end(&mut contents).await.unwrap();

        assert_eq!(record.name, "song.mp3");
        assert_eq!(record.size, 5);
        assert_eq!(contents, b"la la");
    }

    #[tokio::test]
    async fn open_traversal_never_leaves_root() {
        let (_temp_dir, service) = setup_service();

        for requested in ["../../etc/passwd", "/etc/passwd", "..", "../", ""] {
            let err = service.open_file(requested).await.unwrap_err();
            assert!(
                matches!(
                    err,
                    StorageError::FileNotFound(_) | StorageError::PathEscape(_)
                ),
                "unexpected error for {requested:?}: {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn open_directory_is_not_found() {
        let (temp_dir, service) = setup_service();
        std::fs::create_dir(temp_dir.path().join("folder")).unwrap();

        assert!(matches!(
            service.open_file("folder").await,
            Err(StorageError::FileNotFound(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn open_symlink_out_of_root_is_rejected() {
        let (temp_dir, service) = setup_service();
        let outside = TempDir::new().unwrap();
        let secret = outside.path().join("secret.txt");
        std::fs::write(&secret, b"top secret").unwrap();
        std::os::unix::fs::symlink(&secret, temp_dir.path().join("link.txt")).unwrap();

        assert!(matches!(
            service.open_file("link.txt").await,
            Err(StorageError::PathEscape(_))
        ));
    }
}
