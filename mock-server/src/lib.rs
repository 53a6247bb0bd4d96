use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub owner: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub date_joined: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct TaskInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshInput {
    pub refresh: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub first_name: String,
    pub last_name: String,
}

struct Account {
    user: User,
    password: String,
}

/// In-memory server state. Tokens map to the id of the user they belong to.
#[derive(Default)]
pub struct Store {
    accounts: Vec<Account>,
    access_tokens: HashMap<String, u64>,
    refresh_tokens: HashMap<String, u64>,
    tasks: HashMap<u64, Task>,
    next_id: u64,
    /// Counts `POST /token/refresh/` calls, accepted or not.
    pub refresh_calls: usize,
}

impl Store {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn account(&self, identifier: &str) -> Option<&Account> {
        self.accounts
            .iter()
            .find(|a| a.user.username == identifier || a.user.email == identifier)
    }

    fn user(&self, id: u64) -> Option<&User> {
        self.accounts.iter().map(|a| &a.user).find(|u| u.id == id)
    }

    /// Invalidate every issued access token, as if they all expired.
    pub fn expire_access_tokens(&mut self) {
        self.access_tokens.clear();
    }

    /// Invalidate every issued refresh token.
    pub fn revoke_refresh_tokens(&mut self) {
        self.refresh_tokens.clear();
    }

    /// Create an account directly, bypassing registration validation.
    pub fn seed_user(&mut self, username: &str, email: &str, password: &str) -> u64 {
        let id = self.next_id();
        self.accounts.push(Account {
            user: User {
                id,
                username: username.to_string(),
                email: email.to_string(),
                first_name: String::new(),
                last_name: String::new(),
                date_joined: Utc::now(),
            },
            password: password.to_string(),
        });
        id
    }
}

pub type Db = Arc<RwLock<Store>>;

/// Error reply: a status plus a JSON payload.
pub struct Failure(StatusCode, Value);

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        (self.0, Json(self.1)).into_response()
    }
}

fn blank(field: &str) -> Failure {
    let mut errors = serde_json::Map::new();
    errors.insert(field.to_string(), json!(["This field may not be blank."]));
    Failure(StatusCode::BAD_REQUEST, Value::Object(errors))
}

fn not_found() -> Failure {
    Failure(StatusCode::NOT_FOUND, json!({"detail": "Not found."}))
}

pub fn app() -> Router {
    app_with_db(Db::default())
}

pub fn app_with_db(db: Db) -> Router {
    let api = Router::new()
        .route("/token/", post(obtain_token))
        .route("/token/refresh/", post(refresh_token))
        .route("/register/", post(register))
        .route("/profile/", get(profile))
        .route("/tasks/", get(list_tasks).post(create_task))
        .route("/tasks/{id}/", put(update_task).delete(delete_task))
        .route("/tasks/{id}/toggle_completed/", patch(toggle_completed));
    Router::new().nest("/api", api).with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with_db(listener, Db::default()).await
}

pub async fn run_with_db(listener: TcpListener, db: Db) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_db(db)).await
}

/// Resolve the bearer token in `headers` to a user id.
fn authenticate(headers: &HeaderMap, store: &Store) -> Result<u64, Failure> {
    let Some(value) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
        return Err(Failure(
            StatusCode::UNAUTHORIZED,
            json!({"detail": "Authentication credentials were not provided."}),
        ));
    };
    value
        .strip_prefix("Bearer ")
        .and_then(|token| store.access_tokens.get(token))
        .copied()
        .ok_or_else(|| {
            Failure(
                StatusCode::UNAUTHORIZED,
                json!({
                    "detail": "Given token not valid for any token type",
                    "code": "token_not_valid"
                }),
            )
        })
}

async fn obtain_token(
    State(db): State<Db>,
    Json(input): Json<Credentials>,
) -> Result<Json<Value>, Failure> {
    let mut store = db.write().await;
    let user_id = store
        .account(&input.username)
        .filter(|a| a.password == input.password)
        .map(|a| a.user.id)
        .ok_or_else(|| {
            Failure(
                StatusCode::UNAUTHORIZED,
                json!({"detail": "No active account found with the given credentials"}),
            )
        })?;

    let access = Uuid::new_v4().simple().to_string();
    let refresh = Uuid::new_v4().simple().to_string();
    store.access_tokens.insert(access.clone(), user_id);
    store.refresh_tokens.insert(refresh.clone(), user_id);
    Ok(Json(json!({ "access": access, "refresh": refresh })))
}

async fn refresh_token(
    State(db): State<Db>,
    Json(input): Json<RefreshInput>,
) -> Result<Json<Value>, Failure> {
    let mut store = db.write().await;
    store.refresh_calls += 1;
    let user_id = store
        .refresh_tokens
        .get(&input.refresh)
        .copied()
        .ok_or_else(|| {
            Failure(
                StatusCode::UNAUTHORIZED,
                json!({"detail": "Token is invalid or expired", "code": "token_not_valid"}),
            )
        })?;

    let access = Uuid::new_v4().simple().to_string();
    store.access_tokens.insert(access.clone(), user_id);
    Ok(Json(json!({ "access": access })))
}

async fn register(
    State(db): State<Db>,
    Json(input): Json<RegisterInput>,
) -> Result<(StatusCode, Json<User>), Failure> {
    for (field, value) in [
        ("username", &input.username),
        ("email", &input.email),
        ("password", &input.password),
        ("password_confirm", &input.password_confirm),
    ] {
        if value.trim().is_empty() {
            return Err(blank(field));
        }
    }
    if input.password != input.password_confirm {
        return Err(Failure(
            StatusCode::BAD_REQUEST,
            json!({"password": ["Password fields didn't match."]}),
        ));
    }

    let mut store = db.write().await;
    if store.accounts.iter().any(|a| a.user.username == input.username) {
        return Err(Failure(
            StatusCode::BAD_REQUEST,
            json!({"username": ["A user with that username already exists."]}),
        ));
    }

    let id = store.seed_user(&input.username, &input.email, &input.password);
    let account = store
        .accounts
        .iter_mut()
        .find(|a| a.user.id == id)
        .ok_or_else(not_found)?;
    account.user.first_name = input.first_name;
    account.user.last_name = input.last_name;
    Ok((StatusCode::CREATED, Json(account.user.clone())))
}

async fn profile(State(db): State<Db>, headers: HeaderMap) -> Result<Json<User>, Failure> {
    let store = db.read().await;
    let user_id = authenticate(&headers, &store)?;
    store.user(user_id).cloned().map(Json).ok_or_else(not_found)
}

async fn list_tasks(State(db): State<Db>, headers: HeaderMap) -> Result<Json<Vec<Task>>, Failure> {
    let store = db.read().await;
    let user_id = authenticate(&headers, &store)?;
    let mut tasks: Vec<Task> = store
        .tasks
        .values()
        .filter(|t| t.owner == user_id)
        .cloned()
        .collect();
    tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    Ok(Json(tasks))
}

async fn create_task(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<TaskInput>,
) -> Result<(StatusCode, Json<Task>), Failure> {
    let mut store = db.write().await;
    let user_id = authenticate(&headers, &store)?;
    if input.title.trim().is_empty() {
        return Err(blank("title"));
    }
    let now = Utc::now();
    let task = Task {
        id: store.next_id(),
        title: input.title,
        description: input.description,
        completed: false,
        created_at: now,
        updated_at: now,
        owner: user_id,
    };
    store.tasks.insert(task.id, task.clone());
    Ok((StatusCode::CREATED, Json(task)))
}

/// Look up a task owned by `user_id`. Other users' tasks are invisible.
fn owned_task(store: &mut Store, id: u64, user_id: u64) -> Result<&mut Task, Failure> {
    store
        .tasks
        .get_mut(&id)
        .filter(|t| t.owner == user_id)
        .ok_or_else(not_found)
}

async fn update_task(
    State(db): State<Db>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(input): Json<TaskInput>,
) -> Result<Json<Task>, Failure> {
    let mut store = db.write().await;
    let user_id = authenticate(&headers, &store)?;
    if input.title.trim().is_empty() {
        return Err(blank("title"));
    }
    let task = owned_task(&mut store, id, user_id)?;
    task.title = input.title;
    task.description = input.description;
    task.updated_at = Utc::now();
    Ok(Json(task.clone()))
}

async fn delete_task(
    State(db): State<Db>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Result<StatusCode, Failure> {
    let mut store = db.write().await;
    let user_id = authenticate(&headers, &store)?;
    owned_task(&mut store, id, user_id)?;
    store.tasks.remove(&id);
    Ok(StatusCode::NO_CONTENT)
}

async fn toggle_completed(
    State(db): State<Db>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Result<Json<Task>, Failure> {
    let mut store = db.write().await;
    let user_id = authenticate(&headers, &store)?;
    let task = owned_task(&mut store, id, user_id)?;
    task.completed = !task.completed;
    task.updated_at = Utc::now();
    Ok(Json(task.clone()))
}
