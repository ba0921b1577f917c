//! reqwest-backed implementations of the collaborator capabilities.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use shared::{
    domain::{BucketItem, Identity, ItemId, NewItem},
    error::{BackendError, ErrorBody},
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::{BlobStore, IdentityProvider, RecordStore};

/// Backend connection settings, constructed once at startup and passed to
/// [`RemoteSession::connect`].
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub api_url: String,
}

impl BackendConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        let api_url: String = api_url.into();
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }
}

struct SessionState {
    identity: Identity,
    access_token: String,
}

/// Authenticated session against the managed backend.
///
/// Implements [`IdentityProvider`]; the other remote capabilities borrow
/// their bearer token from here, so signing out revokes all of them at once.
pub struct RemoteSession {
    http: Client,
    api_url: String,
    state: Mutex<Option<SessionState>>,
}

#[derive(Debug, Serialize)]
struct SignInRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct SignInResponse {
    identity_id: String,
    access_token: String,
}

impl RemoteSession {
    pub fn connect(config: &BackendConfig) -> Arc<Self> {
        Arc::new(Self {
            http: Client::new(),
            api_url: config.api_url.clone(),
            state: Mutex::new(None),
        })
    }

    pub async fn sign_in(&self, username: &str, password: &str) -> Result<Identity> {
        let response = self
            .http
            .post(format!("{}/auth/sign_in", self.api_url))
            .json(&SignInRequest { username, password })
            .send()
            .await
            .context("sign-in request failed")?;
        let body: SignInResponse = decode_response(response).await?.json().await?;
        let identity = Identity::new(body.identity_id);
        info!(identity = %identity, "signed in");
        *self.state.lock().await = Some(SessionState {
            identity: identity.clone(),
            access_token: body.access_token,
        });
        Ok(identity)
    }

    /// Best-effort remote sign-out; the local session is cleared regardless.
    pub async fn sign_out(&self) {
        let Some(state) = self.state.lock().await.take() else {
            return;
        };
        if let Err(err) = self
            .http
            .post(format!("{}/auth/sign_out", self.api_url))
            .bearer_auth(&state.access_token)
            .send()
            .await
            .and_then(|response| response.error_for_status())
        {
            warn!("remote sign-out failed: {err}");
        }
    }

    async fn session(&self) -> Result<(Identity, String)> {
        let guard = self.state.lock().await;
        let state = guard
            .as_ref()
            .ok_or_else(|| anyhow!("not signed in: no active session"))?;
        Ok((state.identity.clone(), state.access_token.clone()))
    }
}

#[async_trait]
impl IdentityProvider for RemoteSession {
    async fn current_identity(&self) -> Result<Identity> {
        let (identity, _) = self.session().await?;
        Ok(identity)
    }
}

/// Record-store capability over the backend's `items` resource.
pub struct RemoteRecordStore {
    session: Arc<RemoteSession>,
}

impl RemoteRecordStore {
    pub fn new(session: Arc<RemoteSession>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl RecordStore for RemoteRecordStore {
    async fn list_items(&self) -> Result<Vec<BucketItem>> {
        let (_, token) = self.session.session().await?;
        let response = self
            .session
            .http
            .get(format!("{}/items", self.session.api_url))
            .bearer_auth(&token)
            .send()
            .await
            .context("list request failed")?;
        let items = decode_response(response).await?.json().await?;
        Ok(items)
    }

    async fn create_item(&self, fields: NewItem) -> Result<BucketItem> {
        let (_, token) = self.session.session().await?;
        let response = self
            .session
            .http
            .post(format!("{}/items", self.session.api_url))
            .bearer_auth(&token)
            .json(&fields)
            .send()
            .await
            .context("create request failed")?;
        let record = decode_response(response).await?.json().await?;
        Ok(record)
    }

    async fn delete_item(&self, id: &ItemId) -> Result<()> {
        let (_, token) = self.session.session().await?;
        let response = self
            .session
            .http
            .delete(format!("{}/items/{id}", self.session.api_url))
            .bearer_auth(&token)
            .send()
            .await
            .context("delete request failed")?;
        decode_response(response).await?;
        Ok(())
    }
}

/// Blob-store capability over the backend's `storage` resource.
pub struct RemoteBlobStore {
    session: Arc<RemoteSession>,
}

impl RemoteBlobStore {
    pub fn new(session: Arc<RemoteSession>) -> Self {
        Self { session }
    }
}

#[derive(Debug, Deserialize)]
struct ResolveUrlResponse {
    url: String,
    expires_at: DateTime<Utc>,
}

#[async_trait]
impl BlobStore for RemoteBlobStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<()> {
        let (_, token) = self.session.session().await?;
        let response = self
            .session
            .http
            .put(format!("{}/storage/{path}", self.session.api_url))
            .bearer_auth(&token)
            .body(bytes)
            .send()
            .await
            .context("upload request failed")?;
        decode_response(response).await?;
        Ok(())
    }

    async fn resolve_url(&self, path: &str) -> Result<Url> {
        let (_, token) = self.session.session().await?;
        let response = self
            .session
            .http
            .get(format!("{}/storage/url", self.session.api_url))
            .query(&[("path", path)])
            .bearer_auth(&token)
            .send()
            .await
            .context("resolve-url request failed")?;
        let body: ResolveUrlResponse = decode_response(response).await?.json().await?;
        debug!(path, expires_at = %body.expires_at, "resolved storage url");
        Url::parse(&body.url).with_context(|| format!("backend returned invalid url for {path}"))
    }
}

/// Maps non-2xx responses to errors, preferring the backend's typed
/// [`ErrorBody`] when one decodes.
async fn decode_response(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    match response.json::<ErrorBody>().await {
        Ok(body) => Err(BackendError::from(body).into()),
        Err(_) => Err(anyhow!("backend returned {status}")),
    }
}

#[cfg(test)]
#[path = "tests/remote_tests.rs"]
mod tests;
