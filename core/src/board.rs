//! Last-known task list, kept in step with the server.
//!
//! The board is what a front end renders. It only changes after the server
//! confirms a mutation, and a failed call is logged and leaves the list as
//! it was.

use crate::tasks::TaskClient;
use crate::types::{Task, TaskId, TaskInput};

/// Cached task list plus the client that keeps it current.
#[derive(Debug)]
pub struct TaskBoard {
    client: TaskClient,
    tasks: Vec<Task>,
}

impl TaskBoard {
    pub fn new(client: TaskClient) -> Self {
        Self {
            client,
            tasks: Vec::new(),
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn pending_count(&self) -> usize {
        self.tasks.iter().filter(|task| !task.completed).count()
    }

    /// Replace the list with the server's. Returns whether it succeeded.
    pub async fn load(&mut self) -> bool {
        match self.client.list_tasks().await {
            Ok(tasks) => {
                tracing::debug!(count = tasks.len(), "tasks loaded");
                self.tasks = tasks;
                true
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to load tasks");
                false
            }
        }
    }

    /// Create a task and put it first. Blank titles are ignored.
    pub async fn create(&mut self, input: TaskInput) -> Option<&Task> {
        if input.title.trim().is_empty() {
            return None;
        }
        match self.client.create_task(&input).await {
            Ok(task) => {
                self.tasks.insert(0, task);
                self.tasks.first()
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to create task");
                None
            }
        }
    }

    /// Replace a task's title and description. Blank titles are ignored.
    pub async fn update(&mut self, id: TaskId, input: TaskInput) -> Option<&Task> {
        if input.title.trim().is_empty() {
            return None;
        }
        match self.client.update_task(id, &input).await {
            Ok(task) => self.replace(task),
            Err(err) => {
                tracing::error!(error = %err, id, "failed to update task");
                None
            }
        }
    }

    pub async fn toggle(&mut self, id: TaskId) -> Option<&Task> {
        match self.client.toggle_completed(id).await {
            Ok(task) => self.replace(task),
            Err(err) => {
                tracing::error!(error = %err, id, "failed to toggle task");
                None
            }
        }
    }

    pub async fn delete(&mut self, id: TaskId) -> bool {
        match self.client.delete_task(id).await {
            Ok(()) => {
                self.tasks.retain(|task| task.id != id);
                true
            }
            Err(err) => {
                tracing::error!(error = %err, id, "failed to delete task");
                false
            }
        }
    }

    /// Swap in the server's copy of a task. A task not on the board is
    /// left off it.
    fn replace(&mut self, task: Task) -> Option<&Task> {
        let Some(index) = self.tasks.iter().position(|t| t.id == task.id) else {
            tracing::debug!(id = task.id, "server returned a task not on the board");
            return None;
        };
        self.tasks[index] = task;
        Some(&self.tasks[index])
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::client::ApiClient;
    use crate::config::ClientConfig;
    use crate::testing::ScriptedTransport;
    use crate::token_store::MemoryTokenStore;

    fn task_json(id: u64, title: &str, completed: bool) -> String {
        format!(
            r#"{{"id":{id},"title":"{title}","description":"","completed":{completed},"created_at":"2025-03-01T08:00:00Z"}}"#
        )
    }

    fn board() -> (TaskBoard, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport::new());
        let api = ApiClient::new(
            ClientConfig::new("http://api.test/api"),
            transport.clone(),
            Arc::new(MemoryTokenStore::new()),
        );
        (TaskBoard::new(TaskClient::new(Arc::new(api))), transport)
    }

    async fn loaded() -> (TaskBoard, Arc<ScriptedTransport>) {
        let (mut board, transport) = board();
        transport.respond(
            200,
            &format!("[{},{}]", task_json(1, "first", false), task_json(2, "second", true)),
        );
        assert!(board.load().await);
        (board, transport)
    }

    #[tokio::test]
    async fn create_prepends() {
        let (mut board, transport) = loaded().await;
        transport.respond(201, &task_json(3, "third", false));

        let created = board.create(TaskInput::new("third", "")).await.unwrap();
        assert_eq!(created.id, 3);
        let ids: Vec<_> = board.tasks().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn blank_title_makes_no_request() {
        let (mut board, transport) = loaded().await;
        assert!(board.create(TaskInput::new("   ", "x")).await.is_none());
        assert!(board.update(1, TaskInput::new("", "")).await.is_none());
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn toggle_replaces_in_place() {
        let (mut board, transport) = loaded().await;
        transport.respond(200, &task_json(1, "first", true));

        assert!(board.toggle(1).await.unwrap().completed);
        assert!(board.get(1).unwrap().completed);
        assert_eq!(board.tasks()[0].id, 1);
        assert_eq!(board.pending_count(), 0);
    }

    #[tokio::test]
    async fn failures_leave_the_list_unchanged() {
        let (mut board, transport) = loaded().await;
        let before = board.tasks().to_vec();
        transport.respond(500, "boom");
        transport.respond(404, "");
        transport.fail("connection refused");
        transport.respond(500, "boom");

        assert!(board.toggle(1).await.is_none());
        assert!(!board.delete(2).await);
        assert!(board.update(1, TaskInput::new("renamed", "")).await.is_none());
        assert!(!board.load().await);
        assert_eq!(board.tasks(), before.as_slice());
    }

    #[tokio::test]
    async fn unseen_task_is_not_added() {
        let (mut board, transport) = loaded().await;
        transport.respond(200, &task_json(9, "elsewhere", true));

        assert!(board.toggle(9).await.is_none());
        let ids: Vec<_> = board.tasks().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn delete_removes_after_ack() {
        let (mut board, transport) = loaded().await;
        transport.respond(204, "");
        assert!(board.delete(1).await);
        assert!(board.get(1).is_none());
        assert_eq!(board.tasks().len(), 1);
    }
}
