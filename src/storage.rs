//! Object storage behind the attachment endpoints.
//!
//! Handlers derive deterministic keys (tax period / TIN / file kind /
//! running index); the backend only sees opaque keys. Local disk is the
//! default and is served back under `/files`; S3 is selected with
//! `STORAGE_BACKEND=s3`.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use tokio::fs;

use crate::error::ApiError;

#[async_trait]
pub trait Storage: Send + Sync {
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<(), ApiError>;

    async fn delete(&self, key: &str) -> Result<(), ApiError>;

    /// Public URL a stored object is reachable at. This is what gets
    /// persisted on the record rows.
    fn public_url(&self, key: &str) -> String;

    /// Inverse of [`Storage::public_url`]: recover the object key from a
    /// stored URL. Returns `None` for URLs this store did not produce.
    fn key_from_url(&self, url: &str) -> Option<String>;
}

pub type SharedStorage = Arc<dyn Storage>;

pub struct LocalStorage {
    base_path: PathBuf,
    public_base: String,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            public_base: trim_trailing_slash(public_base.into()),
        }
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<(), ApiError> {
        let path = self.base_path.join(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ApiError::Storage(e.to_string()))?;
        }
        fs::write(&path, data)
            .await
            .map_err(|e| ApiError::Storage(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), ApiError> {
        let path = self.base_path.join(key);
        if path.exists() {
            fs::remove_file(&path)
                .await
                .map_err(|e| ApiError::Storage(e.to_string()))?;
        }
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base, key)
    }

    fn key_from_url(&self, url: &str) -> Option<String> {
        key_from_url(&self.public_base, url)
    }
}

pub struct S3Storage {
    client: S3Client,
    bucket: String,
    public_base: String,
}

impl S3Storage {
    pub fn new(client: S3Client, bucket: String, public_base: String) -> Self {
        Self {
            client,
            bucket,
            public_base: trim_trailing_slash(public_base),
        }
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<(), ApiError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| ApiError::Storage(format!("S3 upload failed: {}", e)))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), ApiError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| ApiError::Storage(format!("S3 delete failed: {}", e)))?;
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base, key)
    }

    fn key_from_url(&self, url: &str) -> Option<String> {
        key_from_url(&self.public_base, url)
    }
}

fn trim_trailing_slash(mut s: String) -> String {
    while s.ends_with('/') {
        s.pop();
    }
    s
}

fn key_from_url(public_base: &str, url: &str) -> Option<String> {
    let rest = url.strip_prefix(public_base)?.trim_start_matches('/');
    if rest.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(rest).ok()?;
    Some(decoded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_round_trip() {
        let store = LocalStorage::new("/tmp/att", "http://localhost:3000/files/");
        let key = "2024-03/123456789/cheque-1.pdf";
        let url = store.public_url(key);
        assert_eq!(url, "http://localhost:3000/files/2024-03/123456789/cheque-1.pdf");
        assert_eq!(store.key_from_url(&url).as_deref(), Some(key));
    }

    #[test]
    fn foreign_urls_do_not_resolve() {
        let store = LocalStorage::new("/tmp/att", "http://localhost:3000/files");
        assert_eq!(store.key_from_url("https://elsewhere.test/a.pdf"), None);
        assert_eq!(store.key_from_url("http://localhost:3000/files/"), None);
    }

    #[test]
    fn percent_encoded_keys_decode() {
        let store = LocalStorage::new("/tmp/att", "http://localhost:3000/files");
        let url = "http://localhost:3000/files/2024-03/123/deposit%20slip-1.pdf";
        assert_eq!(
            store.key_from_url(url).as_deref(),
            Some("2024-03/123/deposit slip-1.pdf")
        );
    }

    #[tokio::test]
    async fn local_store_writes_and_deletes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalStorage::new(dir.path(), "http://localhost:3000/files");

        store
            .upload("2024-03/123/cheque-1.pdf", b"pdf bytes".to_vec())
            .await
            .expect("upload");
        let on_disk = dir.path().join("2024-03/123/cheque-1.pdf");
        assert!(on_disk.exists());

        store.delete("2024-03/123/cheque-1.pdf").await.expect("delete");
        assert!(!on_disk.exists());

        // deleting a missing key is a no-op
        store.delete("2024-03/123/cheque-1.pdf").await.expect("re-delete");
    }
}
