//! Ask command handler: one turn, printed to stdout.

use std::io::Write;

use anyhow::{Context, Result};
use cartchat_core::{Discard, ProgressUpdate};
use cartchat_types::ChatMessage;

use super::Connection;
use crate::render::{TextStream, render_message};

pub async fn run(connection: &Connection, message: &str, json: bool) -> Result<()> {
    let message = message.trim();
    if message.is_empty() {
        anyhow::bail!("Message must not be empty");
    }

    let client = connection.client()?;

    if json {
        let response = client
            .run_turn(message, &mut Discard)
            .await
            .context("send message")?;
        let rendered = serde_json::to_string_pretty(&response).context("serialize reply")?;
        println!("{rendered}");
        return Ok(());
    }

    let mut stream = TextStream::default();
    let response = client
        .run_turn(message, &mut |update: ProgressUpdate| {
            if let ProgressUpdate::Text(text) = update
                && let Some(delta) = stream.delta(&text)
            {
                print!("{delta}");
                let _ = std::io::stdout().flush();
            }
        })
        .await
        .context("send message")?;

    let mut reply = ChatMessage::bot("");
    reply.apply_response(&response);
    println!("{}", stream.finish(&render_message(&reply)));
    Ok(())
}
