use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::error::AppError;
use crate::ws::AppState;

const HELP: &str = "Commands: approve <username>, approve list, ban <username>, list, help";

/// Operator command loop: read stdin lines until EOF, one command per line.
pub async fn run(state: AppState) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt();
    while let Ok(Some(line)) = lines.next_line().await {
        let reply = handle_command(&state, &line).await;
        if !reply.is_empty() {
            println!("{reply}");
        }
        prompt();
    }
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

/// Execute one operator command and return the reply text to print.
pub async fn handle_command(state: &AppState, line: &str) -> String {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some(&command) = parts.first() else {
        return String::new();
    };

    match command {
        "approve" => match parts.get(1).copied() {
            None => "Usage: approve <username>".to_string(),
            Some("list") => {
                let joins = state.joins.lock().await;
                let pending = joins.pending();
                if pending.is_empty() {
                    "No pending requests".to_string()
                } else {
                    pending
                        .iter()
                        .map(|request| request.identity.username.as_str())
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }
            Some(username) => {
                let mut joins = state.joins.lock().await;
                match joins.approve(username).await {
                    Ok(()) => format!("Approving user: {username}"),
                    Err(AppError::PendingNotFound(_)) => {
                        format!("User \"{username}\" not found")
                    }
                    // The in-memory promotion stands; only the disk copy is
                    // stale until the next successful save.
                    Err(e) => format!(
                        "Approving user: {username}\nError writing saved user list: {e}"
                    ),
                }
            }
        },
        "ban" => match parts.get(1) {
            None => "Usage: ban <username>".to_string(),
            Some(_) => "ban is not implemented yet".to_string(),
        },
        "list" => "list is not implemented yet".to_string(),
        "help" => HELP.to_string(),
        other => format!("Unknown command: {other}"),
    }
}
