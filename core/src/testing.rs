//! In-memory transport for unit tests.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{ApiError, ApiResult};
use crate::http::{HttpRequest, HttpResponse, Transport};

type Router = Box<dyn Fn(&HttpRequest) -> (u16, String) + Send + Sync>;

/// Replies from a queue of scripted results, or from a routing closure once
/// one is installed. Records every request it sees.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    script: Mutex<VecDeque<ApiResult<HttpResponse>>>,
    router: Mutex<Option<Router>>,
    seen: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(&self, status: u16, body: &str) {
        self.script.lock().push_back(Ok(HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }));
    }

    pub(crate) fn fail(&self, reason: &str) {
        self.script
            .lock()
            .push_back(Err(ApiError::Transport(reason.to_string())));
    }

    pub(crate) fn route(&self, router: impl Fn(&HttpRequest) -> (u16, String) + Send + Sync + 'static) {
        *self.router.lock() = Some(Box::new(router));
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> ApiResult<HttpResponse> {
        self.seen.lock().push(request.clone());
        // Let other futures on the same task interleave, like a real socket.
        tokio::task::yield_now().await;

        if let Some(router) = self.router.lock().as_ref() {
            let (status, body) = router(&request);
            return Ok(HttpResponse {
                status,
                headers: Vec::new(),
                body,
            });
        }
        self.script.lock().pop_front().unwrap_or_else(|| {
            panic!("no scripted response for {} {}", request.method.as_str(), request.url)
        })
    }
}
