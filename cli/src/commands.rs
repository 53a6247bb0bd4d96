//! Command handlers.
//!
//! Task commands go through a `TaskBoard`, so a failed call is logged by
//! the board and reported here as a non-zero exit without touching anything
//! else.

use std::io::BufRead;

use anyhow::{bail, Context};
use tasks_core::{Registration, Session, Task, TaskBoard, TaskInput};

use crate::Command;

pub async fn run(session: &Session, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Login {
            identifier,
            password,
        } => {
            let password = match password {
                Some(password) => password,
                None => read_password(std::io::stdin().lock())?,
            };
            let user = session.login(&identifier, &password).await?;
            println!("Signed in as {}.", user.display_name());
        }
        Command::Register {
            username,
            email,
            password,
            password_confirm,
            first_name,
            last_name,
        } => {
            let form = registration_form(Registration {
                username,
                email,
                password,
                password_confirm,
                first_name,
                last_name,
            })?;
            session.register(&form).await?;
            println!("Account created. Run `tasks login` to sign in.");
        }
        Command::Logout => {
            session.logout();
            println!("Signed out.");
        }
        Command::Whoami => {
            let user = signed_in(session)?;
            println!("{} <{}>", user.username, user.email);
        }
        Command::List => {
            let board = board(session).await?;
            if board.tasks().is_empty() {
                println!("No tasks yet. Add one with `tasks add <title>`.");
                return Ok(());
            }
            for task in board.tasks() {
                println!("{}", render_task(task));
            }
            let pending = board.pending_count();
            println!("{pending} pending, {} done", board.tasks().len() - pending);
        }
        Command::Add { title, description } => {
            if title.trim().is_empty() {
                bail!("A task needs a title.");
            }
            let mut board = board(session).await?;
            let task = board
                .create(TaskInput::new(title, description))
                .await
                .context("could not create the task")?;
            println!("{}", render_task(task));
        }
        Command::Edit {
            id,
            title,
            description,
        } => {
            if title.trim().is_empty() {
                bail!("A task needs a title.");
            }
            let mut board = board(session).await?;
            let task = board
                .update(id, TaskInput::new(title, description))
                .await
                .context("could not update the task")?;
            println!("{}", render_task(task));
        }
        Command::Toggle { id } => {
            let mut board = board(session).await?;
            let task = board
                .toggle(id)
                .await
                .context("could not toggle the task")?;
            println!("{}", render_task(task));
        }
        Command::Rm { id } => {
            let mut board = board(session).await?;
            if !board.delete(id).await {
                bail!("could not delete task {id}");
            }
            println!("Deleted task {id}.");
        }
    }
    Ok(())
}

fn signed_in(session: &Session) -> anyhow::Result<tasks_core::User> {
    session
        .current_user()
        .context("Not signed in. Run `tasks login` first.")
}

/// Board loaded with the signed-in user's tasks.
async fn board(session: &Session) -> anyhow::Result<TaskBoard> {
    signed_in(session)?;
    let mut board = TaskBoard::new(session.tasks());
    if !board.load().await {
        bail!("could not load tasks");
    }
    Ok(board)
}

/// Rejects a form whose password and confirmation differ.
fn registration_form(form: Registration) -> anyhow::Result<Registration> {
    if !form.passwords_match() {
        bail!("Passwords do not match.");
    }
    Ok(form)
}

fn read_password(mut input: impl BufRead) -> anyhow::Result<String> {
    eprint!("Password: ");
    let mut line = String::new();
    input.read_line(&mut line).context("could not read password")?;
    let password = line.trim_end_matches(|c| c == '\r' || c == '\n').to_string();
    if password.is_empty() {
        bail!("A password is required.");
    }
    Ok(password)
}

fn render_task(task: &Task) -> String {
    let mark = if task.completed { "x" } else { " " };
    let mut line = format!("[{mark}] {:>4}  {}", task.id, task.title);
    if let Some(description) = task.description.as_deref().filter(|d| !d.is_empty()) {
        line.push_str(&format!(" - {description}"));
    }
    line.push_str(&format!("  (created {})", task.created_at.format("%Y-%m-%d")));
    line
}
