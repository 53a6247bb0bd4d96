//! Authenticated client core for the personal task-list service.
//!
//! # Overview
//! Talks to one JSON API rooted at a fixed base URL: bearer-token auth with
//! access/refresh tokens, a profile endpoint, and CRUD over the user's
//! tasks. Tokens persist through a pluggable `TokenStore`; a 401 triggers at
//! most one refresh and one replay per request.
//!
//! # Design
//! - Request descriptors are plain data (`HttpRequest`). Only a `Transport`
//!   performs I/O, so tests script the server without a socket.
//! - `ApiClient` owns config, transport and token store; the refresh
//!   interceptor lives on it and wraps every send.
//! - `Session` is an explicitly owned value holding the current user in a
//!   `watch` channel. There is no global state.
//! - `TaskClient` is stateless; `TaskBoard` layers the last-known list on
//!   top for front ends.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod board;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod interceptor;
pub mod session;
pub mod tasks;
pub mod token_store;
pub mod types;

#[cfg(test)]
mod testing;

pub use board::TaskBoard;
pub use client::{parse_json, ApiClient};
pub use config::{ClientConfig, BASE_URL_ENV, DEFAULT_BASE_URL};
pub use error::{ApiError, ApiResult, AuthFailure, StoreError, StoreResult};
pub use http::{HttpMethod, HttpRequest, HttpResponse, ReqwestTransport, Transport};
pub use interceptor::Attempt;
pub use session::{AuthState, Session};
pub use tasks::TaskClient;
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenKind, TokenStore};
pub use types::{Credentials, Registration, Task, TaskId, TaskInput, TokenPair, User};
