//! End-to-end tests against the live mock server.
//!
//! # Design
//! Each test starts the mock server on a random port with its own state
//! handle, then drives a `Session` over real HTTP through `ReqwestTransport`.
//! The state handle lets a test expire or revoke tokens server-side to
//! exercise the refresh path.

use std::sync::Arc;

use mock_server::Db;
use tasks_core::{
    ApiClient, ApiError, AuthState, ClientConfig, FileTokenStore, MemoryTokenStore, Registration,
    Session, TaskBoard, TaskInput, TokenKind, TokenStore,
};
use tempfile::TempDir;

/// Start the mock server and return its API base URL.
async fn serve(db: Db) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(mock_server::run_with_db(listener, db));
    format!("http://{addr}/api")
}

async fn seeded() -> (Db, String) {
    let db = Db::default();
    db.write().await.seed_user("alice", "alice@example.com", "pw");
    let base = serve(db.clone()).await;
    (db, base)
}

fn api(base: &str, tokens: Arc<dyn TokenStore>) -> Arc<ApiClient> {
    Arc::new(ApiClient::with_reqwest(ClientConfig::new(base), tokens))
}

#[tokio::test]
async fn login_and_task_lifecycle() {
    let (_db, base) = seeded().await;
    let tokens = Arc::new(MemoryTokenStore::new());
    let session = Session::start(api(&base, tokens.clone())).await;
    assert_eq!(session.state(), AuthState::SignedOut);

    // Step 1: login with mixed case; the server only knows "alice".
    let user = session.login("Alice", "pw").await.unwrap();
    assert_eq!(user.username, "alice");
    assert_eq!(session.current_user().unwrap().email, "alice@example.com");
    assert!(!tokens.get(TokenKind::Access).unwrap().unwrap().is_empty());
    assert!(!tokens.get(TokenKind::Refresh).unwrap().unwrap().is_empty());

    let tasks = session.tasks();

    // Step 2: list: should be empty.
    assert!(tasks.list_tasks().await.unwrap().is_empty());

    // Step 3: create.
    let created = tasks
        .create_task(&TaskInput::new("Buy milk", ""))
        .await
        .unwrap();
    assert_eq!(created.title, "Buy milk");
    assert!(!created.completed);
    assert!(created.id > 0);
    let id = created.id;

    // Step 4: toggle twice returns to the original value.
    let once = tasks.toggle_completed(id).await.unwrap();
    assert!(once.completed);
    let twice = tasks.toggle_completed(id).await.unwrap();
    assert_eq!(twice.completed, created.completed);

    // Step 5: update.
    let updated = tasks
        .update_task(id, &TaskInput::new("Buy oat milk", "the barista one"))
        .await
        .unwrap();
    assert_eq!(updated.title, "Buy oat milk");
    assert_eq!(updated.description.as_deref(), Some("the barista one"));
    assert_eq!(updated.created_at, created.created_at);

    // Step 6: delete, then delete again.
    tasks.delete_task(id).await.unwrap();
    let err = tasks.delete_task(id).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound));

    // Step 7: list: empty again.
    assert!(tasks.list_tasks().await.unwrap().is_empty());
}

#[tokio::test]
async fn expired_access_token_is_refreshed_transparently() {
    let (db, base) = seeded().await;
    let tokens = Arc::new(MemoryTokenStore::new());
    let session = Session::start(api(&base, tokens.clone())).await;
    session.login("alice", "pw").await.unwrap();
    let before = tokens.get(TokenKind::Access).unwrap();

    db.write().await.expire_access_tokens();

    let tasks = session.tasks().list_tasks().await.unwrap();
    assert!(tasks.is_empty());
    assert_eq!(db.read().await.refresh_calls, 1);
    assert_ne!(tokens.get(TokenKind::Access).unwrap(), before);
    assert!(session.is_authenticated());
}

#[tokio::test]
async fn revoked_refresh_token_ends_the_session() {
    let (db, base) = seeded().await;
    let tokens = Arc::new(MemoryTokenStore::new());
    let session = Session::start(api(&base, tokens.clone())).await;
    session.login("alice", "pw").await.unwrap();

    {
        let mut store = db.write().await;
        store.expire_access_tokens();
        store.revoke_refresh_tokens();
    }

    let err = session.tasks().list_tasks().await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized { .. }));
    assert_eq!(db.read().await.refresh_calls, 1);
    assert_eq!(tokens.get(TokenKind::Access).unwrap(), None);
    assert_eq!(tokens.get(TokenKind::Refresh).unwrap(), None);
    assert_eq!(session.state(), AuthState::SignedOut);
}

#[tokio::test]
async fn session_resumes_from_persisted_tokens() {
    let (_db, base) = seeded().await;
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tokens.json");

    {
        let store = Arc::new(FileTokenStore::open(&path).unwrap());
        let session = Session::start(api(&base, store)).await;
        session.login("alice", "pw").await.unwrap();
    }

    let store = Arc::new(FileTokenStore::open(&path).unwrap());
    let session = Session::start(api(&base, store)).await;
    assert!(session.is_ready());
    assert_eq!(session.current_user().unwrap().username, "alice");

    session.logout();
    let reopened = FileTokenStore::open(&path).unwrap();
    assert_eq!(reopened.get(TokenKind::Access).unwrap(), None);
    assert_eq!(reopened.get(TokenKind::Refresh).unwrap(), None);
}

#[tokio::test]
async fn register_then_login() {
    let base = serve(Db::default()).await;
    let session = Session::start(api(&base, Arc::new(MemoryTokenStore::new()))).await;

    let form = Registration {
        username: "Carol".into(),
        email: "Carol@Example.com".into(),
        password: "S3cret!".into(),
        password_confirm: "S3cret!".into(),
        first_name: "Carol".into(),
        last_name: "Danvers".into(),
    };
    session.register(&form).await.unwrap();

    let failure = session.register(&form).await.unwrap_err();
    assert!(failure.details.unwrap()["username"].is_array());

    let user = session.login("carol@example.com", "S3cret!").await.unwrap();
    assert_eq!(user.username, "carol");
    assert_eq!(user.display_name(), "Carol");
}

#[tokio::test]
async fn bad_credentials_report_server_detail() {
    let (_db, base) = seeded().await;
    let session = Session::start(api(&base, Arc::new(MemoryTokenStore::new()))).await;

    let failure = session.login("alice", "wrong").await.unwrap_err();
    assert_eq!(
        failure.message,
        "No active account found with the given credentials"
    );
    assert_eq!(session.state(), AuthState::SignedOut);
}

#[tokio::test]
async fn unreachable_server_uses_fallback_message() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let base = format!("http://{addr}/api");
    let session = Session::start(api(&base, Arc::new(MemoryTokenStore::new()))).await;
    let failure = session.login("alice", "pw").await.unwrap_err();
    assert_eq!(failure.message, "Login failed");
    assert!(failure.details.is_none());
}

#[tokio::test]
async fn board_tracks_server_state() {
    let (_db, base) = seeded().await;
    let session = Session::start(api(&base, Arc::new(MemoryTokenStore::new()))).await;
    session.login("alice", "pw").await.unwrap();

    let mut board = TaskBoard::new(session.tasks());
    assert!(board.load().await);
    let first = board.create(TaskInput::new("first", "")).await.unwrap().id;
    let second = board.create(TaskInput::new("second", "")).await.unwrap().id;
    assert_eq!(board.tasks()[0].id, second);

    board.toggle(first).await.unwrap();
    assert_eq!(board.pending_count(), 1);

    assert!(board.delete(second).await);
    assert!(board.load().await);
    assert_eq!(board.tasks().len(), 1);
    assert!(board.get(first).unwrap().completed);
}
