//! HTTP client core: one base URL, one bearer token, five verbs.
//!
//! # Design
//! `ApiClient` owns the fixed configuration, the transport and the token
//! store. Request descriptors are built as plain data (`build_request`,
//! `build_json`) and never carry credentials; the bearer header is attached
//! per attempt by the refresh interceptor, so a replay picks up a renewed
//! token without mutating the original descriptor.
//!
//! Every call goes through `send`, which runs the interceptor and then maps
//! non-2xx statuses onto `ApiError`.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::ClientConfig;
use crate::error::{ApiError, ApiResult};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, ReqwestTransport, Transport};
use crate::token_store::TokenStore;

/// Callback run when the interceptor ends a session. Hooks tied to an owner
/// are pruned once the owner is dropped.
pub(crate) struct ExpiryHook {
    alive: Box<dyn Fn() -> bool + Send + Sync>,
    fire: Box<dyn Fn() + Send + Sync>,
}

impl ExpiryHook {
    pub(crate) fn is_alive(&self) -> bool {
        (self.alive)()
    }

    pub(crate) fn fire(&self) {
        (self.fire)()
    }
}

/// Authenticated client for the task API.
pub struct ApiClient {
    pub(crate) config: ClientConfig,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) tokens: Arc<dyn TokenStore>,
    pub(crate) refresh_gate: tokio::sync::Mutex<()>,
    pub(crate) expiry_hooks: Mutex<Vec<ExpiryHook>>,
}

impl ApiClient {
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenStore>,
    ) -> Self {
        Self {
            config,
            transport,
            tokens,
            refresh_gate: tokio::sync::Mutex::new(()),
            expiry_hooks: Mutex::new(Vec::new()),
        }
    }

    /// Client over a fresh `reqwest` transport.
    pub fn with_reqwest(config: ClientConfig, tokens: Arc<dyn TokenStore>) -> Self {
        Self::new(config, Arc::new(ReqwestTransport::new()), tokens)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    /// Register a callback fired when a 401 could not be resolved by a
    /// refresh and both tokens were dropped. Hooks must not register
    /// further hooks.
    pub fn on_session_expired(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.push_hook(ExpiryHook {
            alive: Box::new(|| true),
            fire: Box::new(hook),
        });
    }

    /// Like `on_session_expired`, but the hook only lives as long as
    /// `owner` and receives it when fired.
    pub(crate) fn on_expiry_while_alive<T>(
        &self,
        owner: &Arc<T>,
        hook: impl Fn(&T) + Send + Sync + 'static,
    ) where
        T: Send + Sync + 'static,
    {
        let liveness = Arc::downgrade(owner);
        let target = Arc::downgrade(owner);
        self.push_hook(ExpiryHook {
            alive: Box::new(move || liveness.strong_count() > 0),
            fire: Box::new(move || {
                if let Some(owner) = target.upgrade() {
                    hook(owner.as_ref());
                }
            }),
        });
    }

    fn push_hook(&self, hook: ExpiryHook) {
        let mut hooks = self.expiry_hooks.lock();
        hooks.retain(ExpiryHook::is_alive);
        hooks.push(hook);
    }

    /// Request without a body.
    pub fn build_request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        HttpRequest {
            method,
            url: self.config.endpoint(path),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Request with a JSON body.
    pub fn build_json<B>(&self, method: HttpMethod, path: &str, body: &B) -> ApiResult<HttpRequest>
    where
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_string(body).map_err(|e| ApiError::Serialization(e.to_string()))?;
        Ok(HttpRequest {
            method,
            url: self.config.endpoint(path),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Some(body),
        })
    }

    /// Run `request` through the refresh interceptor and map the final
    /// status. Only 2xx responses come back as `Ok`.
    pub async fn send(&self, request: &HttpRequest) -> ApiResult<HttpResponse> {
        tracing::debug!(method = request.method.as_str(), url = %request.url, "sending request");
        let response = self.dispatch(request).await?;
        check_status(response)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let response = self.send(&self.build_request(HttpMethod::Get, path)).await?;
        parse_json(&response)
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(&self.build_json(HttpMethod::Post, path, body)?).await?;
        parse_json(&response)
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(&self.build_json(HttpMethod::Put, path, body)?).await?;
        parse_json(&response)
    }

    /// Body-less PATCH, the only shape the API uses.
    pub async fn patch<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let response = self.send(&self.build_request(HttpMethod::Patch, path)).await?;
        parse_json(&response)
    }

    pub async fn delete(&self, path: &str) -> ApiResult<()> {
        self.send(&self.build_request(HttpMethod::Delete, path)).await?;
        Ok(())
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("config", &self.config)
            .field("expiry_hooks", &self.expiry_hooks.lock().len())
            .finish_non_exhaustive()
    }
}

/// Map non-success status codes to the appropriate `ApiError` variant.
pub(crate) fn check_status(response: HttpResponse) -> ApiResult<HttpResponse> {
    match response.status {
        200..=299 => Ok(response),
        400 => Err(ApiError::Validation {
            body: serde_json::from_str(&response.body)
                .unwrap_or(serde_json::Value::String(response.body)),
        }),
        401 => Err(ApiError::Unauthorized {
            body: response.body,
        }),
        404 => Err(ApiError::NotFound),
        status => Err(ApiError::Http {
            status,
            body: response.body,
        }),
    }
}

/// Decode a JSON body into `T`.
pub fn parse_json<T: DeserializeOwned>(response: &HttpResponse) -> ApiResult<T> {
    serde_json::from_str(&response.body).map_err(|e| ApiError::Deserialization(e.to_string()))
}
