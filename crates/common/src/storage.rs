//! Blob storage abstraction for issue attachments.
//!
//! Supports the local filesystem (served back through HMAC-signed URLs) and
//! S3-compatible object storage (presigned URLs).

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

/// Metadata of a blob that was written to the store.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    /// Storage key (path or object key).
    pub key: String,
    /// Size in bytes.
    pub size: u64,
    /// MIME content type.
    pub content_type: String,
}

/// Blob store used by the attachment subsystem.
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `data` under `key`, replacing anything already there.
    async fn upload(&self, key: &str, data: &[u8], content_type: &str) -> AppResult<StoredBlob>;

    /// Remove the blob. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// A read reference for `key` that stops working after `ttl`.
    async fn signed_url(&self, key: &str, ttl: Duration) -> AppResult<String>;

    /// Check if a blob exists.
    async fn exists(&self, key: &str) -> AppResult<bool>;
}

/// Signs and verifies `key:expires` pairs with HMAC-SHA256.
#[derive(Clone)]
pub struct UrlSigner {
    secret: Vec<u8>,
}

impl UrlSigner {
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
        }
    }

    fn mac(&self, key: &str, expires: i64) -> AppResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| AppError::Internal(format!("Invalid signing key: {e}")))?;
        mac.update(format!("{key}:{expires}").as_bytes());
        Ok(mac)
    }

    /// Hex signature for `key` valid until the unix timestamp `expires`.
    pub fn sign(&self, key: &str, expires: i64) -> AppResult<String> {
        Ok(hex::encode(self.mac(key, expires)?.finalize().into_bytes()))
    }

    /// Whether `signature` matches and `expires` is still in the future at `now`.
    #[must_use]
    pub fn verify(&self, key: &str, expires: i64, signature: &str, now: i64) -> bool {
        if expires <= now {
            return false;
        }
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };
        self.mac(key, expires)
            .is_ok_and(|mac| mac.verify_slice(&expected).is_ok())
    }
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner").finish_non_exhaustive()
    }
}

/// Local filesystem storage backend.
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
    signer: UrlSigner,
}

impl LocalStorage {
    /// Create a new local storage backend.
    #[must_use]
    pub const fn new(base_path: PathBuf, base_url: String, signer: UrlSigner) -> Self {
        Self {
            base_path,
            base_url,
            signer,
        }
    }

    #[must_use]
    pub const fn signer(&self) -> &UrlSigner {
        &self.signer
    }

    /// Resolve a key to a path under the base directory.
    ///
    /// Keys with absolute components or `..` are rejected.
    fn path_for(&self, key: &str) -> AppResult<PathBuf> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(AppError::BadRequest(format!("Invalid storage key: {key}")));
        }
        Ok(self.base_path.join(relative))
    }

    /// Read a blob back, `None` if it does not exist.
    pub async fn read(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Storage(format!("Failed to read file: {e}"))),
        }
    }
}

#[async_trait::async_trait]
impl BlobStore for LocalStorage {
    async fn upload(&self, key: &str, data: &[u8], content_type: &str) -> AppResult<StoredBlob> {
        let path = self.path_for(key)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(format!("Failed to create directory: {e}")))?;
        }

        tokio::fs::write(&path, data)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write file: {e}")))?;

        Ok(StoredBlob {
            key: key.to_string(),
            size: data.len() as u64,
            content_type: content_type.to_string(),
        })
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!("Failed to delete file: {e}"))),
        }
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> AppResult<String> {
        let ttl = i64::try_from(ttl.as_secs())
            .map_err(|_| AppError::Internal("Signed URL lifetime out of range".to_string()))?;
        let expires = chrono::Utc::now().timestamp() + ttl;
        let signature = self.signer.sign(key, expires)?;

        let encoded_key = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");

        Ok(format!(
            "{}/{}?expires={}&signature={}",
            self.base_url.trim_end_matches('/'),
            encoded_key,
            expires,
            signature
        ))
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let path = self.path_for(key)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to stat file: {e}")))
    }
}

/// S3-compatible object storage backend.
#[cfg(feature = "s3")]
pub struct S3Storage {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: Option<String>,
}

#[cfg(feature = "s3")]
impl S3Storage {
    /// Presigned S3 URLs cannot outlive seven days.
    const MAX_PRESIGN: Duration = Duration::from_secs(7 * 24 * 60 * 60);

    /// Lifetime actually requested from S3 for a configured `ttl`.
    fn presign_lifetime(ttl: Duration) -> Duration {
        ttl.min(Self::MAX_PRESIGN)
    }

    /// Create a new S3 storage backend.
    #[must_use]
    pub fn new(config: &crate::config::S3Config) -> Self {
        use aws_config::Region;
        use aws_sdk_s3::config::Credentials;

        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "sinmungo",
        );

        let s3_config = aws_sdk_s3::Config::builder()
            .endpoint_url(&config.endpoint)
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            prefix: config.prefix.clone(),
        }
    }

    fn full_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), key),
            None => key.to_string(),
        }
    }
}

#[cfg(feature = "s3")]
#[async_trait::async_trait]
impl BlobStore for S3Storage {
    async fn upload(&self, key: &str, data: &[u8], content_type: &str) -> AppResult<StoredBlob> {
        use aws_sdk_s3::primitives::ByteStream;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .body(ByteStream::from(data.to_vec()))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("S3 upload failed: {e}")))?;

        Ok(StoredBlob {
            key: key.to_string(),
            size: data.len() as u64,
            content_type: content_type.to_string(),
        })
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("S3 delete failed: {e}")))?;

        Ok(())
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> AppResult<String> {
        use aws_sdk_s3::presigning::PresigningConfig;

        let presign = PresigningConfig::expires_in(Self::presign_lifetime(ttl))
            .map_err(|e| AppError::Storage(format!("Invalid presign lifetime: {e}")))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .presigned(presign)
            .await
            .map_err(|e| AppError::Storage(format!("S3 presign failed: {e}")))?;

        Ok(request.uri().to_string())
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                if e.to_string().contains("NotFound") || e.to_string().contains("404") {
                    Ok(false)
                } else {
                    Err(AppError::Storage(format!("S3 head_object failed: {e}")))
                }
            }
        }
    }
}

/// Make a user-supplied file name safe for use in a storage key.
///
/// Everything except ASCII alphanumerics, Hangul syllables, `.`, `_` and `-`
/// becomes `_`; the result is lowercased.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric()
                || ('가'..='힣').contains(&c)
                || matches!(c, '.' | '_' | '-')
            {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .to_lowercase()
}

/// Storage key for an attachment: `{issue_id}/{unix_millis}_{safe_name}`.
#[must_use]
pub fn attachment_storage_key(
    issue_id: &str,
    timestamp_millis: i64,
    original_name: &str,
) -> String {
    format!(
        "{issue_id}/{timestamp_millis}_{}",
        sanitize_file_name(original_name)
    )
}
