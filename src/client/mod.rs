//! Authenticated HTTP client for the TenderHub REST API.
//!
//! Every backend call goes through [`ApiClient::execute`]:
//! - the access token from the [`TokenStore`] is attached as a bearer token
//! - a 401 triggers at most one refresh of the access token, after which
//!   the original request is sent again
//! - a failed refresh clears the stored session and notifies the
//!   [`SessionObserver`]

mod auth;
mod request;

pub use auth::{Registration, MIN_PASSWORD_LENGTH};
pub use request::{ApiRequest, Attachment, MultipartForm, RequestBody};

use reqwest::{header, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::session::{Session, TokenStore};

/// Refresh-and-resend cycles allowed for one original request.
pub const MAX_REFRESH_RETRIES: u8 = 1;

/// Receives session lifecycle events from the client.
pub trait SessionObserver: Send + Sync {
    /// The refresh token was rejected and the stored session has been cleared.
    fn session_expired(&self, error: &ApiError);
}

/// Observer that ignores every event.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {
    fn session_expired(&self, _error: &ApiError) {}
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(alias = "access_token")]
    access: Option<String>,
    #[serde(default, alias = "refresh_token")]
    refresh: Option<String>,
}

struct ClientInner {
    http: reqwest::Client,
    base_url: String,
    token_path: String,
    refresh_path: String,
    store: Arc<TokenStore>,
    observer: Arc<dyn SessionObserver>,
    refresh_lock: tokio::sync::Mutex<()>,
}

/// Cheap to clone; clones share the HTTP connection pool and token store.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, store: Arc<TokenStore>) -> Result<Self, ApiError> {
        Self::with_observer(config, store, Arc::new(NoopObserver))
    }

    pub fn with_observer(
        config: &ApiConfig,
        store: Arc<TokenStore>,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<Self, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(ApiError::Transport)?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base_url: config.base_url.trim_end_matches('/').to_string(),
                token_path: config.token_path.clone(),
                refresh_path: config.refresh_path.clone(),
                store,
                observer,
                refresh_lock: tokio::sync::Mutex::new(()),
            }),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn store(&self) -> &TokenStore {
        &self.inner.store
    }

    pub fn session(&self) -> Session {
        self.inner.store.load()
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.inner.base_url, path.trim_start_matches('/'))
        }
    }

    /// Send a request and return the successful response.
    ///
    /// Non-2xx responses become [`ApiError::Http`]. Authenticated requests
    /// that receive a 401 go through one refresh-and-resend cycle.
    pub async fn execute(&self, request: &ApiRequest) -> Result<reqwest::Response, ApiError> {
        let budget = if request.authenticated {
            MAX_REFRESH_RETRIES
        } else {
            0
        };
        self.dispatch(request, budget).await
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        mut refreshes_left: u8,
    ) -> Result<reqwest::Response, ApiError> {
        loop {
            let token = if request.authenticated {
                self.inner.store.access_token()
            } else {
                None
            };

            let response = self.transmit(request, token.as_deref()).await?;
            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            let error = ApiError::from_response(response).await;
            if status != StatusCode::UNAUTHORIZED || !request.authenticated {
                return Err(error);
            }
            if refreshes_left == 0 {
                debug!(path = %request.path, "Still unauthorized after refresh");
                return Err(error);
            }

            refreshes_left -= 1;
            self.refresh_session(token.as_deref(), error).await?;
            debug!(path = %request.path, "Resending request with refreshed token");
        }
    }

    async fn transmit(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> Result<reqwest::Response, ApiError> {
        let url = self.url(&request.path);
        let mut builder = self.inner.http.request(request.method.clone(), &url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(body),
            RequestBody::Multipart(form) => builder.multipart(form.to_form()?),
        };

        debug!(
            method = %request.method,
            url = %url,
            authenticated = token.is_some(),
            "Sending request"
        );

        builder.send().await.map_err(ApiError::Transport)
    }

    /// Replace the access token after a 401.
    ///
    /// `stale` is the token the failed request carried. Refreshes are
    /// serialised; if another request already stored a different token
    /// while this one waited, that token is reused without a second refresh.
    async fn refresh_session(&self, stale: Option<&str>, original: ApiError) -> Result<(), ApiError> {
        let _guard = self.inner.refresh_lock.lock().await;

        let session = self.inner.store.load();
        if session.access_token.is_some() && session.access_token.as_deref() != stale {
            debug!("Access token was refreshed by a concurrent request");
            return Ok(());
        }

        let Some(refresh_token) = session.refresh_token else {
            debug!("No refresh token stored, propagating 401");
            return Err(original);
        };

        match self.request_refresh(&refresh_token).await {
            Ok(refreshed) => {
                self.inner.store.save(&refreshed)?;
                info!("Access token refreshed");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Token refresh failed, clearing session");
                if let Err(e) = self.inner.store.clear() {
                    error!(error = %e, "Failed to clear session after refresh failure");
                }
                self.inner.observer.session_expired(&err);
                Err(ApiError::SessionExpired(Box::new(err)))
            }
        }
    }

    async fn request_refresh(&self, refresh_token: &str) -> Result<Session, ApiError> {
        let request = ApiRequest::post(self.inner.refresh_path.clone())
            .anonymous()
            .json(&serde_json::json!({ "refresh": refresh_token }))?;

        // Bypasses dispatch: the refresh call never enters the 401 path.
        let response = self.transmit(&request, None).await?;
        if !response.status().is_success() {
            return Err(ApiError::from_response(response).await);
        }
        let body: RefreshResponse = decode_body(response).await?;
        let access = body
            .access
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::Decode("refresh response carried no access token".into()))?;

        Ok(Session {
            access_token: Some(access),
            // Rotated refresh tokens replace the old one; otherwise keep it.
            refresh_token: body.refresh.filter(|t| !t.is_empty()),
            user: None,
        })
    }

    /// Send a request and decode its JSON body.
    ///
    /// An empty body decodes as JSON `null`, so `()` and `Option<T>` work
    /// for endpoints that answer 204.
    pub async fn send_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, ApiError> {
        let response = self.execute(request).await?;
        decode_body(response).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send_json(&ApiRequest::get(path)).await
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send_json(&ApiRequest::post(path).json(body)?).await
    }

    pub async fn patch_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send_json(&ApiRequest::patch(path).json(body)?).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.execute(&ApiRequest::delete(path)).await?;
        Ok(())
    }
}

async fn decode_body<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let bytes = response.bytes().await.map_err(ApiError::Transport)?;
    let body: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
        b"null"
    } else {
        &bytes
    };
    serde_json::from_slice(body).map_err(|e| ApiError::Decode(e.to_string()))
}
