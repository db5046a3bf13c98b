//! Object storage: the out-of-scope collaborator named in spec §1
//! ("presigned-URL generation, multipart upload"), needed here as ambient
//! plumbing so the rest of the crate has something concrete to call.
//!
//! The teacher talks to GCS via `google-cloud-storage`/`cloud-storage`; the
//! spec is explicit about an S3-compatible store (`S3_ENDPOINT_URL`,
//! `AWS_ACCESS_KEY_ID`/`AWS_SECRET_ACCESS_KEY`), so this crate reaches for
//! `aws-sdk-s3` instead — the idiomatic choice for that contract, and one
//! that, like the teacher's GCS client, supports presigned GET/PUT URLs
//! without the caller ever holding credentials (see DESIGN.md).

use std::time::Duration;

use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;

use crate::error::{CoreError, CoreResult};

#[derive(Clone)]
pub struct ObjectStore {
    client: Client,
    bucket: String,
}

impl ObjectStore {
    pub async fn connect(endpoint_url: &str, access_key_id: &str, secret_access_key: &str, bucket: &str) -> Self {
        let credentials = aws_sdk_s3::config::Credentials::new(access_key_id, secret_access_key, None, None, "transcode-core");
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .endpoint_url(endpoint_url)
            .credentials_provider(credentials)
            .load()
            .await;
        let s3_config = aws_sdk_s3::config::Builder::from(&config).force_path_style(true).build();
        Self { client: Client::from_conf(s3_config), bucket: bucket.to_string() }
    }

    /// Streams `bytes` to `key`, preserving `content_type` as object
    /// metadata (spec §6: "Content-type metadata preserved on uploads").
    pub async fn upload(&self, key: &str, bytes: bytes::Bytes, content_type: &str) -> CoreResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(bytes.into())
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| CoreError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Uploads a local file by path (the Encoder Driver's temp output, always
    /// an `encoded/<uuid>.mp4` key — spec §6: "Content-type metadata
    /// preserved on uploads").
    pub async fn upload_file(&self, key: &str, path: &std::path::Path) -> CoreResult<()> {
        let body = aws_sdk_s3::primitives::ByteStream::from_path(path)
            .await
            .map_err(|e| CoreError::Storage(e.to_string()))?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type("video/mp4")
            .send()
            .await
            .map_err(|e| CoreError::Storage(e.to_string()))?;
        Ok(())
    }

    /// A time-limited signed GET URL for `key`, allowing the encoder
    /// subprocess or an API client to fetch the object directly without
    /// credentials (spec's "Presigned URL" glossary entry).
    pub async fn presigned_download_url(&self, key: &str, expires_in: Duration) -> CoreResult<String> {
        let presigning = PresigningConfig::expires_in(expires_in).map_err(|e| CoreError::Storage(e.to_string()))?;
        let req = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| CoreError::Storage(e.to_string()))?;
        Ok(req.uri().to_string())
    }
}

/// The source-video URL the worker hands to `ffmpeg` is read twice per task
/// (once by Analyze, once by Transcode); spec §5 calls for 24h expiry here
/// specifically so it outlives either invocation, distinct from the API's
/// configurable `download_url` expiry (see DESIGN.md).
pub const SOURCE_READ_EXPIRY: Duration = Duration::from_secs(60 * 60 * 24);
