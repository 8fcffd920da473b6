//! Object storage for rendered images and datasets
//!
//! [`ObjectStore`] is the seam for any bucket service. [`FsObjectStore`] mirrors
//! buckets into a local directory. [`Uploader`] adds retries and removes a
//! local file only once its upload has been confirmed.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dataset::{build_from_files, LabelSource};
use crate::error::{Error, Result};
use crate::io::{ensure_dir, list_files, remove_file_if_exists};

/// Bucket-style object store
pub trait ObjectStore {
    /// Create `bucket`; creating an existing bucket is not an error
    fn create_bucket(&self, bucket: &str) -> Result<()>;

    /// Upload `local_path` under its file name and return the object key
    fn upload(&self, bucket: &str, local_path: &Path) -> Result<String>;
}

/// Store that copies objects into `<root>/<bucket>/<key>`
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of an uploaded object
    pub fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key)
    }
}

impl ObjectStore for FsObjectStore {
    fn create_bucket(&self, bucket: &str) -> Result<()> {
        if bucket.is_empty() || bucket.contains(['/', '\\']) {
            return Err(Error::InvalidParameter(format!("invalid bucket name '{}'", bucket)));
        }
        ensure_dir(self.root.join(bucket))
    }

    fn upload(&self, bucket: &str, local_path: &Path) -> Result<String> {
        if !local_path.is_file() {
            return Err(Error::FileNotFound(local_path.to_path_buf()));
        }
        let bucket_dir = self.root.join(bucket);
        if !bucket_dir.is_dir() {
            // retrying cannot create the bucket
            return Err(Error::InvalidParameter(format!("bucket '{}' does not exist", bucket)));
        }

        let key = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::InvalidParameter(format!("{:?} has no file name", local_path)))?;
        fs::copy(local_path, bucket_dir.join(&key))?;
        Ok(key)
    }
}

/// What to do once an upload has exhausted its attempts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the batch and return the error
    #[default]
    Abort,
    /// Record the failure, keep the local file and move on
    LogAndContinue,
}

/// Retry behaviour for [`Uploader`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub on_failure: FailurePolicy,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_millis(500),
            on_failure: FailurePolicy::Abort,
        }
    }
}

/// Upload that never succeeded
#[derive(Debug, Clone, Serialize)]
pub struct FailedUpload {
    pub path: PathBuf,
    pub attempts: u32,
    pub reason: String,
}

/// Outcome of an upload batch
#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadReport {
    /// Object keys confirmed by the store
    pub uploaded: Vec<String>,
    /// Local files removed after confirmation
    pub deleted: Vec<PathBuf>,
    pub failed: Vec<FailedUpload>,
}

impl UploadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn merge(&mut self, other: UploadReport) {
        self.uploaded.extend(other.uploaded);
        self.deleted.extend(other.deleted);
        self.failed.extend(other.failed);
    }
}

/// Retrying uploader over an [`ObjectStore`]
pub struct Uploader<S> {
    store: S,
    policy: UploadPolicy,
}

impl<S: ObjectStore> Uploader<S> {
    pub fn new(store: S, policy: UploadPolicy) -> Result<Self> {
        if policy.max_attempts == 0 {
            return Err(Error::InvalidParameter("max_attempts must be > 0".into()));
        }
        Ok(Self { store, policy })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Upload one file, retrying retryable errors up to `max_attempts` times
    pub fn upload(&self, bucket: &str, path: &Path) -> Result<String> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.store.upload(bucket, path) {
                Ok(key) => {
                    debug!(bucket, key = %key, attempt, "uploaded");
                    return Ok(key);
                }
                Err(err) if err.is_retryable() && attempt < self.policy.max_attempts => {
                    warn!(
                        bucket,
                        path = %path.display(),
                        attempt,
                        error = %err,
                        "upload failed, retrying"
                    );
                    thread::sleep(self.policy.retry_delay);
                }
                Err(err) if err.is_retryable() => {
                    return Err(Error::UploadFailure {
                        bucket: bucket.to_string(),
                        path: path.to_path_buf(),
                        attempts: attempt,
                        reason: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Upload each file and delete it locally once the store confirms it.
    ///
    /// Under [`FailurePolicy::Abort`] the first failure is returned and later
    /// files are left untouched.
    pub fn upload_then_delete<P: AsRef<Path>>(&self, bucket: &str, files: &[P]) -> Result<UploadReport> {
        self.upload_batch(bucket, files, true)
    }

    /// Upload each file and keep the local copies
    pub fn upload_all<P: AsRef<Path>>(&self, bucket: &str, files: &[P]) -> Result<UploadReport> {
        self.upload_batch(bucket, files, false)
    }

    fn upload_batch<P: AsRef<Path>>(&self, bucket: &str, files: &[P], delete: bool) -> Result<UploadReport> {
        let mut report = UploadReport::default();

        for path in files {
            let path = path.as_ref();
            match self.upload(bucket, path) {
                Ok(key) => {
                    report.uploaded.push(key);
                    if delete && remove_file_if_exists(path)? {
                        report.deleted.push(path.to_path_buf());
                    }
                }
                Err(err) => match self.policy.on_failure {
                    FailurePolicy::Abort => return Err(err),
                    FailurePolicy::LogAndContinue => {
                        warn!(bucket, path = %path.display(), error = %err, "upload abandoned");
                        let attempts = match &err {
                            Error::UploadFailure { attempts, .. } => *attempts,
                            _ => 1,
                        };
                        report.failed.push(FailedUpload {
                            path: path.to_path_buf(),
                            attempts,
                            reason: err.to_string(),
                        });
                    }
                },
            }
        }

        Ok(report)
    }

    /// Send a directory of images to `bucket`.
    ///
    /// The directory is first packed into `<dir>/<dataset_name>` with `label`,
    /// then every image and finally the dataset file are uploaded and removed.
    /// A dataset file left over from an earlier failed send is rebuilt, never
    /// read as an image.
    pub fn send_dir<P: AsRef<Path>>(
        &self,
        bucket: &str,
        dir: P,
        dataset_name: &str,
        label: LabelSource,
    ) -> Result<UploadReport> {
        let dir = dir.as_ref();
        self.store.create_bucket(bucket)?;

        let dataset_path = dir.join(dataset_name);
        let images: Vec<PathBuf> = list_files(dir)?
            .into_iter()
            .filter(|f| f.file_name().map_or(true, |n| n != dataset_name))
            .collect();
        build_from_files(&images, &dataset_path, label)?;

        let mut report = self.upload_then_delete(bucket, &images)?;
        report.merge(self.upload_then_delete(bucket, &[&dataset_path])?);

        info!(
            bucket,
            dir = %dir.display(),
            uploaded = report.uploaded.len(),
            failed = report.failed.len(),
            "directory sent"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Signal;
    use image::{GrayImage, Luma};
    use std::cell::Cell;
    use tempfile::TempDir;

    /// Store that fails the first `failures` uploads with an IO error
    struct FlakyStore {
        inner: FsObjectStore,
        failures: Cell<u32>,
        calls: Cell<u32>,
    }

    impl FlakyStore {
        fn new(root: &Path, failures: u32) -> Self {
            Self {
                inner: FsObjectStore::new(root),
                failures: Cell::new(failures),
                calls: Cell::new(0),
            }
        }
    }

    impl ObjectStore for FlakyStore {
        fn create_bucket(&self, bucket: &str) -> Result<()> {
            self.inner.create_bucket(bucket)
        }

        fn upload(&self, bucket: &str, local_path: &Path) -> Result<String> {
            self.calls.set(self.calls.get() + 1);
            if self.failures.get() > 0 {
                self.failures.set(self.failures.get() - 1);
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "timeout",
                )));
            }
            self.inner.upload(bucket, local_path)
        }
    }

    fn policy(max_attempts: u32, on_failure: FailurePolicy) -> UploadPolicy {
        UploadPolicy {
            max_attempts,
            retry_delay: Duration::ZERO,
            on_failure,
        }
    }

    fn write_images(dir: &Path, n: usize) -> Vec<PathBuf> {
        (0..n)
            .map(|i| {
                let path = dir.join(format!("AAPL_rsi_buy_2020-01-0{}_line.png", i + 1));
                GrayImage::from_pixel(4, 4, Luma([i as u8 * 40])).save(&path).unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn test_fs_store_upload() {
        let remote = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        let file = local.path().join("a.txt");
        fs::write(&file, "data").unwrap();

        let store = FsObjectStore::new(remote.path());
        store.create_bucket("charts").unwrap();
        store.create_bucket("charts").unwrap();
        let key = store.upload("charts", &file).unwrap();

        assert_eq!(key, "a.txt");
        assert_eq!(fs::read_to_string(store.object_path("charts", "a.txt")).unwrap(), "data");
    }

    #[test]
    fn test_upload_to_missing_bucket_fails() {
        let remote = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        let file = local.path().join("a.txt");
        fs::write(&file, "data").unwrap();

        let err = FsObjectStore::new(remote.path()).upload("nope", &file).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_missing_bucket_is_not_retried() {
        let remote = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        let files = write_images(local.path(), 1);

        let store = FlakyStore::new(remote.path(), 0);
        let uploader = Uploader::new(store, policy(3, FailurePolicy::Abort)).unwrap();

        let err = uploader.upload_then_delete("nope", &files).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
        assert_eq!(uploader.store().calls.get(), 1);
        assert!(files[0].exists());
    }

    #[test]
    fn test_retry_then_success() {
        let remote = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        let files = write_images(local.path(), 1);

        let store = FlakyStore::new(remote.path(), 2);
        store.create_bucket("charts").unwrap();
        let uploader = Uploader::new(store, policy(3, FailurePolicy::Abort)).unwrap();

        let report = uploader.upload_then_delete("charts", &files).unwrap();
        assert_eq!(report.uploaded.len(), 1);
        assert_eq!(uploader.store().calls.get(), 3);
        assert!(!files[0].exists());
    }

    #[test]
    fn test_exhausted_retries_keep_local_file() {
        let remote = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        let files = write_images(local.path(), 2);

        let store = FlakyStore::new(remote.path(), 10);
        store.create_bucket("charts").unwrap();
        let uploader = Uploader::new(store, policy(2, FailurePolicy::LogAndContinue)).unwrap();

        let report = uploader.upload_then_delete("charts", &files).unwrap();
        assert!(!report.is_complete());
        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.failed[0].attempts, 2);
        assert!(files.iter().all(|f| f.exists()));
    }

    #[test]
    fn test_abort_policy_returns_upload_failure() {
        let remote = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        let files = write_images(local.path(), 2);

        let store = FlakyStore::new(remote.path(), 10);
        store.create_bucket("charts").unwrap();
        let uploader = Uploader::new(store, policy(2, FailurePolicy::Abort)).unwrap();

        let err = uploader.upload_then_delete("charts", &files).unwrap_err();
        assert!(matches!(err, Error::UploadFailure { attempts: 2, .. }));
        assert!(files.iter().all(|f| f.exists()));
    }

    #[test]
    fn test_send_dir() {
        let remote = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        write_images(local.path(), 3);

        let uploader = Uploader::new(FsObjectStore::new(remote.path()), policy(1, FailurePolicy::Abort)).unwrap();
        let report = uploader
            .send_dir("charts", local.path(), "buy.parquet", LabelSource::Explicit(Signal::Buy))
            .unwrap();

        assert_eq!(report.uploaded.len(), 4);
        assert_eq!(report.uploaded.last().map(String::as_str), Some("buy.parquet"));
        assert!(list_files(local.path()).unwrap().is_empty());
        assert!(uploader.store().object_path("charts", "buy.parquet").is_file());
    }

    #[test]
    fn test_send_dir_over_leftover_dataset() {
        let remote = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        write_images(local.path(), 2);
        fs::write(local.path().join("df.parquet"), b"stale").unwrap();

        let uploader = Uploader::new(FsObjectStore::new(remote.path()), policy(1, FailurePolicy::Abort)).unwrap();
        let report = uploader
            .send_dir("charts", local.path(), "df.parquet", LabelSource::Explicit(Signal::Buy))
            .unwrap();

        assert_eq!(report.uploaded.len(), 3);
        assert_eq!(report.uploaded.last().map(String::as_str), Some("df.parquet"));
        assert!(list_files(local.path()).unwrap().is_empty());

        let sent = crate::dataset::LabeledDataset::read_parquet(uploader.store().object_path("charts", "df.parquet")).unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent.labels(), &[1, 1]);
    }

    #[test]
    fn test_upload_all_keeps_files() {
        let remote = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        let files = write_images(local.path(), 2);

        let store = FsObjectStore::new(remote.path());
        store.create_bucket("charts").unwrap();
        let uploader = Uploader::new(store, policy(1, FailurePolicy::Abort)).unwrap();

        let report = uploader.upload_all("charts", &files).unwrap();
        assert_eq!(report.uploaded.len(), 2);
        assert!(report.deleted.is_empty());
        assert!(files.iter().all(|f| f.exists()));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let remote = TempDir::new().unwrap();
        let result = Uploader::new(FsObjectStore::new(remote.path()), policy(0, FailurePolicy::Abort));
        assert!(result.is_err());
    }
}
