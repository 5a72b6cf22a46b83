//! Interactive chat over stdin.

use std::io::Write;

use anyhow::{Context, Result};
use cartchat_core::{ChatSession, Notification, TurnOutcome};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::Connection;
use crate::render::{TextStream, render_message};

const QUIT_COMMANDS: [&str; 3] = ["/quit", "/exit", "exit"];

pub async fn run(connection: &Connection) -> Result<()> {
    let client = connection.client()?;
    let mut session = ChatSession::new();

    if let Some(welcome) = session.last_message() {
        println!("[{}] {}", welcome.display_time(), render_message(welcome));
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();

        let Some(line) = lines.next_line().await.context("read stdin")? else {
            println!();
            break;
        };
        let line = line.trim();
        if QUIT_COMMANDS.contains(&line) {
            break;
        }
        if line.is_empty() {
            continue;
        }

        let mut stream = TextStream::default();
        let mut header_printed = false;
        let outcome = session
            .send(
                &client,
                line,
                &mut |n: Notification| eprintln!("{}: {}", n.title, n.description),
                |message| {
                    if !header_printed {
                        print!("[{}] ", message.display_time());
                        header_printed = true;
                    }
                    if let Some(delta) = stream.delta(&message.text) {
                        print!("{delta}");
                        let _ = std::io::stdout().flush();
                    }
                },
            )
            .await;

        if let TurnOutcome::Failed(err) = &outcome {
            tracing::debug!("turn failed: {err}");
        }
        if let Some(reply) = session.last_message().filter(|m| !m.is_user) {
            println!("{}", stream.finish(&render_message(reply)));
        }
    }

    Ok(())
}
