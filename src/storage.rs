use async_trait::async_trait;
use aws_sdk_s3 as s3;
use chrono::{DateTime, Utc};
use s3::primitives::ByteStream;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::{error::StorageError, models::StoredFile};

const MB: usize = 1024 * 1024;

/// UploadPolicy
///
/// Per-endpoint upload rules. Type is checked before size, and both before any
/// storage write.
#[derive(Debug, Clone, Copy)]
pub struct UploadPolicy {
    pub folder: &'static str,
    pub allowed_types: &'static [&'static str],
    pub max_bytes: usize,
}

pub const IMAGE_UPLOAD: UploadPolicy = UploadPolicy {
    folder: "blog-images",
    allowed_types: &["image/jpeg", "image/png", "image/webp", "image/gif"],
    max_bytes: 5 * MB,
};

pub const PUBLICATION_UPLOAD: UploadPolicy = UploadPolicy {
    folder: "publications",
    allowed_types: &["application/pdf"],
    max_bytes: 50 * MB,
};

pub const APPLICATION_UPLOAD: UploadPolicy = UploadPolicy {
    folder: "competition-applications",
    allowed_types: &[
        "application/pdf",
        "image/jpeg",
        "image/png",
        "application/msword",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ],
    max_bytes: 2 * MB,
};

/// Folders an editor may browse.
pub const KNOWN_FOLDERS: &[&str] = &[
    IMAGE_UPLOAD.folder,
    PUBLICATION_UPLOAD.folder,
    APPLICATION_UPLOAD.folder,
];

/// Why an upload was refused before reaching storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadRejection {
    MissingFile,
    InvalidType,
    TooLarge,
}

impl UploadPolicy {
    pub fn check(&self, content_type: &str, size: usize) -> Result<(), UploadRejection> {
        if !self.allowed_types.contains(&content_type) {
            return Err(UploadRejection::InvalidType);
        }
        if size > self.max_bytes {
            return Err(UploadRejection::TooLarge);
        }
        Ok(())
    }

    /// Client-facing message naming the violated limit.
    pub fn rejection_message(&self, rejection: &UploadRejection) -> String {
        match rejection {
            UploadRejection::MissingFile => "No file provided".to_string(),
            UploadRejection::InvalidType => format!(
                "Invalid file type. Allowed types: {}",
                self.allowed_types.join(", ")
            ),
            UploadRejection::TooLarge => format!(
                "File too large. Maximum size is {}MB.",
                self.max_bytes / MB
            ),
        }
    }

    /// Object path for a new upload: timestamp plus random suffix, so concurrent
    /// uploads of the same filename never collide.
    pub fn object_path(&self, original_filename: Option<&str>) -> String {
        let extension = original_filename
            .and_then(|name| std::path::Path::new(name).extension())
            .and_then(std::ffi::OsStr::to_str)
            .map(|ext| {
                ext.chars()
                    .filter(char::is_ascii_alphanumeric)
                    .collect::<String>()
                    .to_ascii_lowercase()
            })
            .filter(|ext| !ext.is_empty())
            .unwrap_or_else(|| "bin".to_string());

        let random = Uuid::new_v4().simple().to_string();
        format!(
            "{}/{}-{}.{}",
            self.folder,
            Utc::now().timestamp_millis(),
            &random[..12],
            extension
        )
    }
}

/// StorageService
///
/// Contract for the object storage layer, addressed by path inside the configured
/// bucket. Swappable between the real S3 gateway and the in-memory mock.
#[async_trait]
pub trait StorageService: Send + Sync {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError>;

    /// Lists objects under `folder`, newest listing order as returned by the backend.
    async fn list(&self, folder: &str, limit: usize, offset: usize) -> Result<Vec<StoredFile>, StorageError>;

    fn public_url(&self, path: &str) -> String;
}

/// StorageState
///
/// The concrete type used to share storage access across the application state.
pub type StorageState = Arc<dyn StorageService>;

/// S3StorageClient
///
/// `StorageService` over the AWS SDK, pointed at Supabase Storage's S3 gateway.
/// `force_path_style(true)` is required by the gateway.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
    public_base: String,
}

impl S3StorageClient {
    pub fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
        public_base: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            bucket_name: bucket.to_string(),
            public_base: public_base.trim_end_matches('/').to_string(),
        }
    }
}

impl S3StorageClient {
    fn stored_file(&self, object: &s3::types::Object) -> Option<StoredFile> {
        let key = object.key()?.to_string();
        let last_modified = object
            .last_modified()
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts.secs(), ts.subsec_nanos()));
        Some(StoredFile {
            public_url: self.public_url(&key),
            size: object.size().unwrap_or_default(),
            path: key,
            last_modified,
        })
    }
}

// S3 never returns more than this per ListObjectsV2 call.
const S3_PAGE_SIZE: i32 = 1000;

/// collect_window
///
/// Follows continuation tokens until `offset + limit` items are in hand or the
/// listing ends, then returns the requested window.
async fn collect_window<T, F, Fut>(
    offset: usize,
    limit: usize,
    mut fetch_page: F,
) -> Result<Vec<T>, StorageError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<(Vec<T>, Option<String>), StorageError>>,
{
    let wanted = offset.saturating_add(limit);
    let mut items = Vec::new();
    let mut continuation = None;
    loop {
        let (page, next) = fetch_page(continuation.take()).await?;
        items.extend(page);
        match next {
            Some(token) if items.len() < wanted => continuation = Some(token),
            _ => break,
        }
    }
    Ok(items.into_iter().skip(offset).take(limit).collect())
}

#[async_trait]
impl StorageService for S3StorageClient {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(path)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;
        Ok(())
    }

    /// S3 has no offset, so keys are paged through until `offset + limit` are
    /// collected and the head is skipped.
    async fn list(&self, folder: &str, limit: usize, offset: usize) -> Result<Vec<StoredFile>, StorageError> {
        let prefix = format!("{}/", folder.trim_end_matches('/'));
        collect_window(offset, limit, |continuation| {
            let request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket_name)
                .prefix(&prefix)
                .max_keys(S3_PAGE_SIZE)
                .set_continuation_token(continuation);
            async move {
                let output = request
                    .send()
                    .await
                    .map_err(|e| StorageError::Request(e.to_string()))?;
                let next = if output.is_truncated().unwrap_or(false) {
                    output.next_continuation_token().map(str::to_owned)
                } else {
                    None
                };
                let files = output
                    .contents()
                    .iter()
                    .filter_map(|object| self.stored_file(object))
                    .collect();
                Ok((files, next))
            }
        })
        .await
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base, path)
    }
}

/// sanitize_key
///
/// Drops empty, `.` and `..` segments so a key cannot climb out of its folder.
fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// MockStorageService
///
/// In-memory `StorageService` for tests. Records every stored object so tests can
/// assert that rejected uploads never wrote anything.
#[derive(Default)]
pub struct MockStorageService {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
    objects: Mutex<Vec<(String, usize, String)>>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Paths stored so far, in upload order.
    pub fn stored_paths(&self) -> Vec<String> {
        locked(&self.objects)
            .iter()
            .map(|(path, _, _)| path.clone())
            .collect()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        if self.should_fail {
            return Err(StorageError::Request(
                "Mock Storage Error: Simulation requested".to_string(),
            ));
        }
        locked(&self.objects).push((sanitize_key(path), bytes.len(), content_type.to_string()));
        Ok(())
    }

    async fn list(&self, folder: &str, limit: usize, offset: usize) -> Result<Vec<StoredFile>, StorageError> {
        if self.should_fail {
            return Err(StorageError::Request(
                "Mock Storage Error: Simulation requested".to_string(),
            ));
        }
        let prefix = format!("{}/", sanitize_key(folder));
        Ok(locked(&self.objects)
            .iter()
            .filter(|(path, _, _)| path.starts_with(&prefix))
            .skip(offset)
            .take(limit)
            .map(|(path, size, _)| StoredFile {
                path: path.clone(),
                size: i64::try_from(*size).unwrap_or(i64::MAX),
                public_url: self.public_url(path),
                last_modified: None,
            })
            .collect())
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "http://localhost:54321/storage/v1/object/public/mock-bucket/{}",
            sanitize_key(path)
        )
    }
}
