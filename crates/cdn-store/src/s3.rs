//! S3 object store

use crate::{ByteStream, ObjectStore, Result, StoreError};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use tracing::{debug, info, instrument, warn};

/// Default part size for streamed uploads (8 MB).
///
/// Bodies that fit in one part go out as a single PutObject; anything larger
/// switches to a multipart upload so at most one part is held in memory.
pub const DEFAULT_PART_SIZE: usize = 8 * 1024 * 1024;

/// Configuration for the S3 object store
#[derive(Clone, Debug)]
pub struct S3Config {
    /// Bucket holding every file
    pub bucket: String,
    /// Region override; the SDK default chain is used when unset
    pub region: Option<String>,
}

impl S3Config {
    /// Create a config for the given bucket
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: None,
        }
    }

    /// Set the region
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

/// Object store backed by a single S3 bucket
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    part_size: usize,
}

impl S3ObjectStore {
    /// Create a store, loading credentials from the AWS default chain and
    /// verifying the bucket is reachable.
    pub async fn new(config: S3Config) -> Result<Self> {
        if config.bucket.is_empty() {
            return Err(StoreError::Configuration("bucket cannot be empty".to_string()));
        }

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = config.region {
            loader = loader.region(Region::new(region));
        }
        let sdk_config = loader.load().await;

        let store = Self::from_client(Client::new(&sdk_config), config.bucket);
        store.verify_bucket().await?;

        info!(bucket = %store.bucket, "Connected to S3 bucket");
        Ok(store)
    }

    /// Create from an existing client without probing the bucket
    pub fn from_client(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            part_size: DEFAULT_PART_SIZE,
        }
    }

    /// Set the part size for streamed uploads. Zero is treated as one byte.
    pub fn with_part_size(mut self, part_size: usize) -> Self {
        self.part_size = part_size.max(1);
        self
    }

    /// Part size for streamed uploads
    pub fn part_size(&self) -> usize {
        self.part_size
    }

    /// Bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Probe the bucket with HeadBucket
    pub async fn verify_bucket(&self) -> Result<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StoreError::backend("HeadBucket", DisplayErrorContext(&e)))?;
        Ok(())
    }

    async fn put_single(
        &self,
        key: &str,
        content_type: &str,
        content_disposition: &str,
        data: Bytes,
    ) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .content_disposition(content_disposition)
            .body(data.into())
            .send()
            .await
            .map_err(|e| StoreError::backend("PutObject", DisplayErrorContext(&e)))?;
        Ok(())
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Bytes,
    ) -> Result<CompletedPart> {
        let resp = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(data.into())
            .send()
            .await
            .map_err(|e| StoreError::backend("UploadPart", DisplayErrorContext(&e)))?;

        Ok(CompletedPart::builder()
            .e_tag(resp.e_tag().unwrap_or_default())
            .part_number(part_number)
            .build())
    }

    /// Upload the first full part plus the rest of `body` as a multipart upload
    async fn put_multipart(
        &self,
        key: &str,
        content_type: &str,
        content_disposition: &str,
        first_part: Bytes,
        body: ByteStream<'_>,
    ) -> Result<()> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .content_disposition(content_disposition)
            .send()
            .await
            .map_err(|e| StoreError::backend("CreateMultipartUpload", DisplayErrorContext(&e)))?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| {
                StoreError::backend("CreateMultipartUpload", "response carried no upload id")
            })?
            .to_string();

        match self.put_parts(key, &upload_id, first_part, body).await {
            Ok(parts) => {
                let completed = CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build();
                self.client
                    .complete_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .multipart_upload(completed)
                    .send()
                    .await
                    .map_err(|e| {
                        StoreError::backend("CompleteMultipartUpload", DisplayErrorContext(&e))
                    })?;
                debug!(key, upload_id, "Completed multipart upload");
                Ok(())
            }
            Err(e) => {
                if let Err(abort_err) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    warn!(
                        key,
                        upload_id,
                        error = %DisplayErrorContext(&abort_err),
                        "Failed to abort multipart upload"
                    );
                }
                Err(e)
            }
        }
    }

    async fn put_parts(
        &self,
        key: &str,
        upload_id: &str,
        first_part: Bytes,
        mut body: ByteStream<'_>,
    ) -> Result<Vec<CompletedPart>> {
        let mut parts = vec![self.upload_part(key, upload_id, 1, first_part).await?];
        let mut part_number = 2;
        let mut buffer = BytesMut::with_capacity(self.part_size);

        while let Some(chunk) = body.next().await {
            buffer.extend_from_slice(&chunk?);
            if buffer.len() >= self.part_size {
                let part = buffer.split().freeze();
                parts.push(self.upload_part(key, upload_id, part_number, part).await?);
                part_number += 1;
            }
        }

        if !buffer.is_empty() {
            let part = buffer.split().freeze();
            parts.push(self.upload_part(key, upload_id, part_number, part).await?);
        }

        Ok(parts)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn exists(&self, key: &str) -> bool {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %DisplayErrorContext(&e), "HeadObject failed, treating key as absent");
                false
            }
        }
    }

    #[instrument(skip(self, body), fields(bucket = %self.bucket))]
    async fn put(
        &self,
        key: &str,
        content_type: &str,
        content_disposition: &str,
        mut body: ByteStream<'_>,
    ) -> Result<()> {
        let mut buffer = BytesMut::with_capacity(self.part_size);

        while let Some(chunk) = body.next().await {
            buffer.extend_from_slice(&chunk?);
            if buffer.len() >= self.part_size {
                let first_part = buffer.split().freeze();
                return self
                    .put_multipart(key, content_type, content_disposition, first_part, body)
                    .await;
            }
        }

        self.put_single(key, content_type, content_disposition, buffer.freeze())
            .await
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StoreError::backend("DeleteObject", DisplayErrorContext(&e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::config::{retry::RetryConfig, BehaviorVersion, Credentials, Region};
    use futures::stream;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const OCTET: &str = "application/octet-stream";

    const INITIATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<InitiateMultipartUploadResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/"><Bucket>assets</Bucket><Key>big.bin</Key><UploadId>upload-1</UploadId></InitiateMultipartUploadResult>"#;

    const COMPLETE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<CompleteMultipartUploadResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/"><Location>http://localhost/assets/big.bin</Location><Bucket>assets</Bucket><Key>big.bin</Key><ETag>"final"</ETag></CompleteMultipartUploadResult>"#;

    const UPLOAD_ERROR: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>InvalidRequest</Code><Message>part rejected</Message><RequestId>req-1</RequestId></Error>"#;

    /// Store whose S3 calls go to `server`, uploading in 16-byte parts
    fn store_for(server: &MockServer) -> S3ObjectStore {
        let conf = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .endpoint_url(server.uri())
            .force_path_style(true)
            .credentials_provider(Credentials::new("AKIDTEST", "secret", None, None, "test"))
            .retry_config(RetryConfig::disabled())
            .build();
        S3ObjectStore::from_client(Client::from_conf(conf), "assets").with_part_size(16)
    }

    fn body(data: &[u8], chunk: usize) -> ByteStream<'static> {
        let chunks: Vec<std::io::Result<Bytes>> = data
            .chunks(chunk)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        stream::iter(chunks).boxed()
    }

    fn xml(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "application/xml")
    }

    async fn mount_initiate(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/assets/big.bin"))
            .and(query_param("uploads", ""))
            .respond_with(xml(INITIATE))
            .expect(1)
            .mount(server)
            .await;
    }

    async fn mount_complete(server: &MockServer, times: u64) {
        Mock::given(method("POST"))
            .and(path("/assets/big.bin"))
            .and(query_param("uploadId", "upload-1"))
            .respond_with(xml(COMPLETE))
            .expect(times)
            .mount(server)
            .await;
    }

    async fn mount_abort(server: &MockServer, times: u64) {
        Mock::given(method("DELETE"))
            .and(path("/assets/big.bin"))
            .and(query_param("uploadId", "upload-1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(times)
            .mount(server)
            .await;
    }

    #[test]
    fn test_s3_config_builder() {
        let config = S3Config::new("assets").with_region("eu-west-1");
        assert_eq!(config.bucket, "assets");
        assert_eq!(config.region.as_deref(), Some("eu-west-1"));
    }

    #[tokio::test]
    async fn test_empty_bucket_rejected() {
        let result = S3ObjectStore::new(S3Config::new("")).await;
        assert!(matches!(result, Err(StoreError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_part_size() {
        let server = MockServer::start().await;
        let store = store_for(&server);
        assert_eq!(store.part_size(), 16);
        assert_eq!(store.with_part_size(0).part_size(), 1);
    }

    #[tokio::test]
    async fn test_small_body_is_single_put() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/assets/small.txt"))
            .and(header("content-type", "text/plain; charset=utf-8"))
            .and(header("content-disposition", "inline"))
            .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"small\""))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let store = store_for(&server);
        store
            .put(
                "small.txt",
                "text/plain; charset=utf-8",
                "inline",
                body(b"ten bytes!", 3),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_large_body_uses_multipart() {
        let server = MockServer::start().await;
        mount_initiate(&server).await;
        for part in ["1", "2"] {
            Mock::given(method("PUT"))
                .and(path("/assets/big.bin"))
                .and(query_param("uploadId", "upload-1"))
                .and(query_param("partNumber", part))
                .respond_with(
                    ResponseTemplate::new(200).insert_header("ETag", format!("\"etag-{}\"", part)),
                )
                .expect(1)
                .mount(&server)
                .await;
        }
        mount_complete(&server, 1).await;
        mount_abort(&server, 0).await;

        // 40 bytes in 7-byte chunks: parts close at 21 and 19 bytes
        let data = [7u8; 40];
        let store = store_for(&server);
        store
            .put("big.bin", OCTET, "inline", body(&data, 7))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_failed_part_aborts_upload() {
        let server = MockServer::start().await;
        mount_initiate(&server).await;
        Mock::given(method("PUT"))
            .and(path("/assets/big.bin"))
            .and(query_param("uploadId", "upload-1"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_raw(UPLOAD_ERROR.as_bytes().to_vec(), "application/xml"),
            )
            .expect(1)
            .mount(&server)
            .await;
        mount_complete(&server, 0).await;
        mount_abort(&server, 1).await;

        let data = [7u8; 40];
        let result = store_for(&server)
            .put("big.bin", OCTET, "inline", body(&data, 7))
            .await;

        assert!(matches!(
            result,
            Err(StoreError::Backend {
                operation: "UploadPart",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_body_error_mid_upload_aborts() {
        let server = MockServer::start().await;
        mount_initiate(&server).await;
        Mock::given(method("PUT"))
            .and(path("/assets/big.bin"))
            .and(query_param("uploadId", "upload-1"))
            .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"etag-1\""))
            .expect(1)
            .mount(&server)
            .await;
        mount_complete(&server, 0).await;
        mount_abort(&server, 1).await;

        let chunks: Vec<std::io::Result<Bytes>> = vec![
            Ok(Bytes::from_static(&[1u8; 24])),
            Err(std::io::Error::other("client went away")),
        ];
        let result = store_for(&server)
            .put("big.bin", OCTET, "inline", stream::iter(chunks).boxed())
            .await;

        assert!(matches!(result, Err(StoreError::Io(_))));
    }

    #[tokio::test]
    async fn test_exists_maps_head_object() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/assets/present.txt"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/assets/absent.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = store_for(&server);
        assert!(store.exists("present.txt").await);
        assert!(!store.exists("absent.txt").await);
    }

    #[tokio::test]
    async fn test_delete_object() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/assets/doc.pdf"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        store_for(&server).delete("doc.pdf").await.unwrap();
    }
}
