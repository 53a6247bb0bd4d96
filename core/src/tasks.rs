//! Task resource client.
//!
//! # Design
//! `TaskClient` holds only a handle to the shared `ApiClient`. Each operation
//! is split into a `build_*` method that produces an `HttpRequest` with no
//! I/O, and an async method that sends it through the client (refresh
//! interceptor included) and decodes the result. Errors are returned raw.

use std::sync::Arc;

use crate::client::{parse_json, ApiClient};
use crate::error::ApiResult;
use crate::http::{HttpMethod, HttpRequest};
use crate::types::{Task, TaskId, TaskInput};

const TASKS_PATH: &str = "tasks/";

fn task_path(id: TaskId) -> String {
    format!("{TASKS_PATH}{id}/")
}

/// Stateless CRUD over `/tasks/`.
#[derive(Debug, Clone)]
pub struct TaskClient {
    api: Arc<ApiClient>,
}

impl TaskClient {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    pub fn build_list_tasks(&self) -> HttpRequest {
        self.api.build_request(HttpMethod::Get, TASKS_PATH)
    }

    pub fn build_create_task(&self, input: &TaskInput) -> ApiResult<HttpRequest> {
        self.api.build_json(HttpMethod::Post, TASKS_PATH, input)
    }

    pub fn build_update_task(&self, id: TaskId, input: &TaskInput) -> ApiResult<HttpRequest> {
        self.api.build_json(HttpMethod::Put, &task_path(id), input)
    }

    pub fn build_delete_task(&self, id: TaskId) -> HttpRequest {
        self.api.build_request(HttpMethod::Delete, &task_path(id))
    }

    pub fn build_toggle_completed(&self, id: TaskId) -> HttpRequest {
        self.api
            .build_request(HttpMethod::Patch, &format!("{}toggle_completed/", task_path(id)))
    }

    pub async fn list_tasks(&self) -> ApiResult<Vec<Task>> {
        let response = self.api.send(&self.build_list_tasks()).await?;
        parse_json(&response)
    }

    pub async fn create_task(&self, input: &TaskInput) -> ApiResult<Task> {
        let response = self.api.send(&self.build_create_task(input)?).await?;
        parse_json(&response)
    }

    pub async fn update_task(&self, id: TaskId, input: &TaskInput) -> ApiResult<Task> {
        let response = self.api.send(&self.build_update_task(id, input)?).await?;
        parse_json(&response)
    }

    /// Any 2xx counts as deleted; the body is ignored.
    pub async fn delete_task(&self, id: TaskId) -> ApiResult<()> {
        self.api.send(&self.build_delete_task(id)).await?;
        Ok(())
    }

    pub async fn toggle_completed(&self, id: TaskId) -> ApiResult<Task> {
        let response = self.api.send(&self.build_toggle_completed(id)).await?;
        parse_json(&response)
    }
}
