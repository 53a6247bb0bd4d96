//! Refresh-on-401 interception.
//!
//! Per logical request:
//!
//! ```text
//! SENT -(2xx)-------------------> DONE
//! SENT -(401, Original)---------> REFRESHING -(ok)---> REPLAYED (Retried)
//! SENT -(401, Original)---------> REFRESHING -(fail)-> tokens cleared, expiry hooks fired
//! SENT -(401, Retried)----------> tokens cleared, expiry hooks fired
//! ```
//!
//! Refreshes pass through a single-flight gate. A flow that reaches the gate
//! after another flow already renewed the access token replays with the new
//! token instead of refreshing again.

use crate::client::{check_status, parse_json, ApiClient, ExpiryHook};
use crate::error::ApiResult;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::token_store::TokenKind;
use crate::types::{AccessToken, RefreshRequest};

pub(crate) const REFRESH_PATH: &str = "token/refresh/";

/// Which send of a logical request this is. A request is replayed at most
/// once, so there are only two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Original,
    Retried,
}

/// Result of trying to renew the access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Renewal {
    /// A usable access token is stored; replay.
    Renewed,
    /// Nothing to refresh with; the 401 stands and nothing is cleared.
    NoRefreshToken,
    /// The refresh was rejected; the session has been expired.
    Failed,
}

impl ApiClient {
    /// Send `request`, replaying it once after a successful refresh if the
    /// first attempt is rejected with 401. Returns the last response seen,
    /// whatever its status.
    pub(crate) async fn dispatch(&self, request: &HttpRequest) -> ApiResult<HttpResponse> {
        let mut attempt = Attempt::Original;
        loop {
            let token = self.tokens.get(TokenKind::Access)?;
            let response = self
                .transport
                .execute(authorize(request, token.as_deref()))
                .await?;

            if response.status != 401 {
                return Ok(response);
            }

            match attempt {
                Attempt::Original => match self.renew_access(token.as_deref()).await? {
                    Renewal::Renewed => {
                        tracing::debug!(url = %request.url, "replaying request with renewed token");
                        attempt = Attempt::Retried;
                    }
                    Renewal::NoRefreshToken | Renewal::Failed => return Ok(response),
                },
                Attempt::Retried => {
                    tracing::warn!(url = %request.url, "request rejected after token refresh");
                    self.expire_session();
                    return Ok(response);
                }
            }
        }
    }

    /// Renew the access token that was rejected as `rejected`.
    async fn renew_access(&self, rejected: Option<&str>) -> ApiResult<Renewal> {
        let _gate = self.refresh_gate.lock().await;

        let current = self.tokens.get(TokenKind::Access)?;
        if current.is_some() && current.as_deref() != rejected {
            tracing::debug!("access token renewed by a concurrent request");
            return Ok(Renewal::Renewed);
        }

        let Some(refresh) = self.tokens.get(TokenKind::Refresh)? else {
            return Ok(Renewal::NoRefreshToken);
        };

        let request = self.build_json(HttpMethod::Post, REFRESH_PATH, &RefreshRequest { refresh })?;
        let renewed = match self.transport.execute(request).await {
            Ok(response) => check_status(response).and_then(|r| parse_json::<AccessToken>(&r)),
            Err(err) => Err(err),
        };

        match renewed {
            Ok(AccessToken { access }) => {
                self.tokens.set(TokenKind::Access, &access)?;
                tracing::info!("access token refreshed");
                Ok(Renewal::Renewed)
            }
            Err(err) => {
                tracing::warn!(error = %err, "token refresh failed, ending session");
                self.expire_session();
                Ok(Renewal::Failed)
            }
        }
    }

    /// Drop both tokens and tell every listener the session is gone.
    pub(crate) fn expire_session(&self) {
        if let Err(err) = self.tokens.clear_all() {
            tracing::error!(error = %err, "failed to clear stored tokens");
        }
        let mut hooks = self.expiry_hooks.lock();
        hooks.retain(ExpiryHook::is_alive);
        for hook in hooks.iter() {
            hook.fire();
        }
    }
}

/// Copy of `request` carrying the bearer credential, if any.
fn authorize(request: &HttpRequest, token: Option<&str>) -> HttpRequest {
    let mut authorized = request.clone();
    if let Some(token) = token {
        authorized
            .headers
            .push(("authorization".to_string(), format!("Bearer {token}")));
    }
    authorized
}
