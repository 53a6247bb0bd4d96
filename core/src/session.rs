//! Auth session manager.
//!
//! # Design
//! A `Session` is an explicitly owned value: front ends create one with
//! `Session::start` and pass it (or its `ApiClient`) to whatever needs it.
//! The signed-in user lives in a `watch` channel so consumers can observe
//! `Loading -> SignedOut | SignedIn` transitions; `start` resolves only once
//! the state has left `Loading`.
//!
//! Tokens live in the client's `TokenStore`. When the refresh interceptor
//! gives up on a session it clears the tokens and fires the expiry hook
//! registered here, which drops the user.

use std::sync::Arc;

use tokio::sync::watch;

use crate::client::ApiClient;
use crate::error::{AuthFailure, PROFILE_FALLBACK};
use crate::http::HttpMethod;
use crate::tasks::TaskClient;
use crate::token_store::TokenKind;
use crate::types::{Credentials, Registration, TokenPair, User};

const TOKEN_PATH: &str = "token/";
const REGISTER_PATH: &str = "register/";
const PROFILE_PATH: &str = "profile/";

/// Observable authentication state.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    /// A stored token is being checked against the profile endpoint.
    Loading,
    SignedOut,
    SignedIn(User),
}

impl AuthState {
    pub fn user(&self) -> Option<&User> {
        match self {
            AuthState::SignedIn(user) => Some(user),
            _ => None,
        }
    }
}

/// Owner of the current user and the login/logout lifecycle.
#[derive(Debug)]
pub struct Session {
    api: Arc<ApiClient>,
    state: Arc<watch::Sender<AuthState>>,
}

impl Session {
    /// Session in the `Loading` state. Call `init` (or use `start`) before
    /// trusting `current_user`.
    pub fn new(api: Arc<ApiClient>) -> Self {
        let (tx, _rx) = watch::channel(AuthState::Loading);
        let state = Arc::new(tx);

        api.on_expiry_while_alive(&state, |state| {
            state.send_replace(AuthState::SignedOut);
        });

        Self { api, state }
    }

    /// Create and initialize a session.
    pub async fn start(api: Arc<ApiClient>) -> Self {
        let session = Self::new(api);
        session.init().await;
        session
    }

    /// Load the profile if a token is stored; otherwise settle as signed out.
    pub async fn init(&self) {
        match self.api.tokens().get(TokenKind::Access) {
            Ok(Some(_)) => {
                self.state.send_replace(AuthState::Loading);
                self.load_profile().await;
            }
            Ok(None) => {
                self.state.send_replace(AuthState::SignedOut);
            }
            Err(err) => {
                tracing::warn!(error = %err, "could not read stored tokens");
                self.logout();
            }
        }
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    /// Task client sharing this session's credentials.
    pub fn tasks(&self) -> TaskClient {
        TaskClient::new(self.api.clone())
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(*self.state.borrow(), AuthState::SignedIn(_))
    }

    pub fn is_ready(&self) -> bool {
        !matches!(*self.state.borrow(), AuthState::Loading)
    }

    /// Wait until the state leaves `Loading`.
    pub async fn ready(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives as long as `self`, so this cannot observe a close.
        let _ = rx.wait_for(|state| !matches!(state, AuthState::Loading)).await;
    }

    /// Exchange credentials for tokens, persist them, then load the profile.
    /// The identifier is lowercased before it is sent.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<User, AuthFailure> {
        let credentials = Credentials {
            username: identifier.to_lowercase(),
            password: password.to_string(),
        };
        tracing::info!(username = %credentials.username, "signing in");

        let pair: TokenPair = match self.api.post(TOKEN_PATH, &credentials).await {
            Ok(pair) => pair,
            Err(err) => {
                tracing::warn!(error = %err, "login rejected");
                return Err(AuthFailure::from_login_error(&err));
            }
        };

        let tokens = self.api.tokens();
        if let Err(err) = tokens
            .set(TokenKind::Access, &pair.access)
            .and_then(|()| tokens.set(TokenKind::Refresh, &pair.refresh))
        {
            tracing::error!(error = %err, "could not persist tokens");
            self.logout();
            return Err(AuthFailure::new(err.to_string()));
        }

        self.load_profile()
            .await
            .ok_or_else(|| AuthFailure::new(PROFILE_FALLBACK))
    }

    /// Submit a registration. Username and email are lowercased; the rest,
    /// including the password confirmation, is sent as given.
    pub async fn register(&self, form: &Registration) -> Result<(), AuthFailure> {
        let form = form.normalized();
        tracing::info!(username = %form.username, "registering account");

        let sent = match self.api.build_json(HttpMethod::Post, REGISTER_PATH, &form) {
            Ok(request) => self.api.send(&request).await,
            Err(err) => Err(err),
        };
        // Any 2xx is success. The body, if any, is not read.
        match sent {
            Ok(_) => Ok(()),
            Err(err) => {
                tracing::warn!(error = %err, "registration rejected");
                Err(AuthFailure::from_registration_error(&err))
            }
        }
    }

    /// Fetch the current user. Any failure ends the session.
    pub async fn load_profile(&self) -> Option<User> {
        match self.api.get::<User>(PROFILE_PATH).await {
            Ok(user) => {
                tracing::info!(username = %user.username, "profile loaded");
                self.state.send_replace(AuthState::SignedIn(user.clone()));
                Some(user)
            }
            Err(err) => {
                tracing::warn!(error = %err, "could not load profile, signing out");
                self.logout();
                None
            }
        }
    }

    /// Forget both tokens and the user. No request is made.
    pub fn logout(&self) {
        if let Err(err) = self.api.tokens().clear_all() {
            tracing::error!(error = %err, "failed to clear stored tokens");
        }
        self.state.send_replace(AuthState::SignedOut);
        tracing::info!("signed out");
    }
}
