//! Management API client
//!
//! Thin reqwest wrapper over the storage platform's HTTP API. Every response
//! goes through [`classify_response`] once, so callers get typed errors and
//! never look at message text.

use crate::domain::model::{
    BlockImage, Filesystem, FilesystemRequest, Node, ObjectBucket, ObjectStoreConnectInfo,
    ObjectUser, Pool, StatusDetails,
};
use crate::domain::ports::RestApiOperator;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

// =============================================================================
// Response Classification
// =============================================================================

/// Resource a request is about, used to build typed errors
#[derive(Debug, Clone, Copy)]
pub struct Subject<'a> {
    pub kind: &'a str,
    pub name: &'a str,
    pub scope: &'a str,
}

impl<'a> Subject<'a> {
    pub fn new(kind: &'a str, name: &'a str, scope: &'a str) -> Self {
        Self { kind, name, scope }
    }
}

/// True when the backend reports an existing object
///
/// Some endpoints surface the storage backend's EEXIST as a 500 instead of a
/// 409.
fn reports_existing(body: &str) -> bool {
    body.contains("EEXIST") || body.contains("File exists")
}

/// Map an HTTP status and body to the success body or a typed error
pub fn classify_response(status: u16, body: String, subject: Subject<'_>) -> Result<String> {
    match status {
        200..=299 => Ok(body),
        409 => Err(duplicate(subject)),
        404 => Err(Error::ResourceNotFound {
            kind: subject.kind.to_string(),
            name: subject.name.to_string(),
        }),
        400..=599 if reports_existing(&body) => Err(duplicate(subject)),
        _ => Err(Error::ApiStatus {
            status,
            message: body.trim().to_string(),
        }),
    }
}

fn duplicate(subject: Subject<'_>) -> Error {
    Error::DuplicateResource {
        kind: subject.kind.to_string(),
        name: subject.name.to_string(),
        scope: subject.scope.to_string(),
    }
}

// =============================================================================
// Client
// =============================================================================

/// reqwest-backed [`RestApiOperator`]
#[derive(Debug, Clone)]
pub struct RestApiClient {
    http: Client,
    base_url: String,
}

impl RestApiClient {
    /// Create a client for `base_url` (e.g. `http://10.0.0.5:8124`)
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and return the classified body
    async fn send(&self, request: RequestBuilder, subject: Subject<'_>) -> Result<String> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!("{} {} -> {}", subject.kind, subject.name, status.as_u16());
        classify_response(status.as_u16(), body, subject)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, subject: Subject<'_>) -> Result<T> {
        let body = self.send(self.http.get(self.url(path)), subject).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Lists come back as `null` when empty
    async fn get_list<T: DeserializeOwned>(&self, path: &str, kind: &str) -> Result<Vec<T>> {
        let items: Option<Vec<T>> = self.get_json(path, Subject::new(kind, "*", path)).await?;
        Ok(items.unwrap_or_default())
    }
}

#[async_trait]
impl RestApiOperator for RestApiClient {
    async fn get_nodes(&self) -> Result<Vec<Node>> {
        self.get_list("/node", "Node").await
    }

    async fn get_status_details(&self) -> Result<StatusDetails> {
        self.get_json("/status", Subject::new("Status", "cluster", "/status"))
            .await
    }

    async fn get_block_images(&self) -> Result<Vec<BlockImage>> {
        self.get_list("/image", "BlockImage").await
    }

    async fn create_block_image(&self, image: &BlockImage) -> Result<String> {
        let request = self.http.post(self.url("/image")).json(image);
        self.send(
            request,
            Subject::new("BlockImage", &image.name, &image.pool_name),
        )
        .await
    }

    async fn delete_block_image(&self, image: &BlockImage) -> Result<()> {
        let path = format!(
            "/image?name={}&pool={}",
            urlencoding::encode(&image.name),
            urlencoding::encode(&image.pool_name)
        );
        self.send(
            self.http.delete(self.url(&path)),
            Subject::new("BlockImage", &image.name, &image.pool_name),
        )
        .await?;
        Ok(())
    }

    async fn get_pools(&self) -> Result<Vec<Pool>> {
        self.get_list("/pool", "Pool").await
    }

    async fn create_pool(&self, pool: &Pool) -> Result<String> {
        let request = self.http.post(self.url("/pool")).json(pool);
        self.send(request, Subject::new("Pool", &pool.name, "cluster"))
            .await
    }

    async fn get_filesystems(&self) -> Result<Vec<Filesystem>> {
        self.get_list("/filesystem", "Filesystem").await
    }

    async fn create_filesystem(&self, request: &FilesystemRequest) -> Result<String> {
        let builder = self.http.post(self.url("/filesystem")).json(request);
        self.send(builder, Subject::new("Filesystem", &request.name, "cluster"))
            .await
    }

    async fn delete_filesystem(&self, name: &str) -> Result<String> {
        let path = format!("/filesystem?name={}", urlencoding::encode(name));
        self.send(
            self.http.delete(self.url(&path)),
            Subject::new("Filesystem", name, "cluster"),
        )
        .await
    }

    async fn create_object_store(&self) -> Result<String> {
        self.send(
            self.http.post(self.url("/objectstore")),
            Subject::new("ObjectStore", "default", "cluster"),
        )
        .await
    }

    async fn get_object_users(&self) -> Result<Vec<ObjectUser>> {
        self.get_list("/objectstore/users", "ObjectUser").await
    }

    async fn get_object_user(&self, user_id: &str) -> Result<ObjectUser> {
        let path = format!("/objectstore/users/{}", urlencoding::encode(user_id));
        self.get_json(&path, Subject::new("ObjectUser", user_id, "object store"))
            .await
    }

    async fn create_object_user(&self, user: &ObjectUser) -> Result<ObjectUser> {
        let request = self.http.post(self.url("/objectstore/users")).json(user);
        let body = self
            .send(
                request,
                Subject::new("ObjectUser", &user.user_id, "object store"),
            )
            .await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn delete_object_user(&self, user_id: &str) -> Result<()> {
        let path = format!("/objectstore/users/{}", urlencoding::encode(user_id));
        self.send(
            self.http.delete(self.url(&path)),
            Subject::new("ObjectUser", user_id, "object store"),
        )
        .await?;
        Ok(())
    }

    async fn get_object_store_connection_info(&self) -> Result<ObjectStoreConnectInfo> {
        self.get_json(
            "/objectstore/connectioninfo",
            Subject::new("ObjectStore", "default", "cluster"),
        )
        .await
    }

    async fn get_buckets(&self) -> Result<Vec<ObjectBucket>> {
        self.get_list("/objectstore/buckets", "ObjectBucket").await
    }
}
