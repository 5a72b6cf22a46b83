//! Chat session: the message list and the send-a-message flow.

use cartchat_types::{BotResponse, ChatMessage};
use tracing::warn;

use crate::client::AgentClient;
use crate::error::{ClientError, ClientResult};
use crate::interpret::ProgressUpdate;
use crate::turn::ProgressSink;

/// Bot text shown when a turn fails.
pub const FAILURE_TEXT: &str = "Sorry, I couldn't get a response. Please try again.";

/// User-facing alert, shown once per failed turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub description: String,
}

impl Notification {
    pub fn send_failed() -> Self {
        Self {
            title: "Error".to_string(),
            description: "Failed to send message. Please try again.".to_string(),
        }
    }
}

/// Receives user-facing alerts.
pub trait Notifier {
    fn notify(&mut self, notification: Notification);
}

impl<F> Notifier for F
where
    F: FnMut(Notification),
{
    fn notify(&mut self, notification: Notification) {
        self(notification);
    }
}

/// Something that can run one agent turn.
pub trait AgentBackend {
    fn run_turn(
        &self,
        text: &str,
        sink: &mut dyn ProgressSink,
    ) -> impl Future<Output = ClientResult<BotResponse>>;
}

impl AgentBackend for AgentClient {
    fn run_turn(
        &self,
        text: &str,
        sink: &mut dyn ProgressSink,
    ) -> impl Future<Output = ClientResult<BotResponse>> {
        AgentClient::run_turn(self, text, sink)
    }
}

/// Result of [`ChatSession::send`].
#[derive(Debug)]
pub enum TurnOutcome {
    /// Blank input, nothing sent
    Ignored,
    /// Reply received and applied to the bot message
    Completed(BotResponse),
    /// Turn failed; the bot message holds [`FAILURE_TEXT`]
    Failed(ClientError),
}

/// Insertion-ordered conversation plus the in-flight flag.
#[derive(Debug, Clone)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
    loading: bool,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    /// Starts a conversation with the welcome message.
    pub fn new() -> Self {
        Self {
            messages: vec![ChatMessage::welcome()],
            loading: false,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_message(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Sends `text` as a user turn.
    ///
    /// The bot message is created on the first progress update and kept up
    /// to date through `on_change`. Failures never escape: they are turned
    /// into the failure message plus one notification.
    pub async fn send<B, N, F>(
        &mut self,
        backend: &B,
        text: &str,
        notifier: &mut N,
        mut on_change: F,
    ) -> TurnOutcome
    where
        B: AgentBackend,
        N: Notifier + ?Sized,
        F: FnMut(&ChatMessage),
    {
        let text = text.trim();
        if text.is_empty() {
            return TurnOutcome::Ignored;
        }

        self.messages.push(ChatMessage::user(text));
        self.loading = true;

        let mut bot_id: Option<String> = None;
        let result = {
            let messages = &mut self.messages;
            let bot_id = &mut bot_id;
            let mut sink = |update: ProgressUpdate| {
                let message = bot_message(messages, bot_id);
                apply_update(message, update);
                on_change(message);
            };
            backend.run_turn(text, &mut sink).await
        };

        let outcome = match result {
            Ok(response) => {
                let message = bot_message(&mut self.messages, &mut bot_id);
                message.apply_response(&response);
                on_change(message);
                TurnOutcome::Completed(response)
            }
            Err(err) => {
                warn!(kind = %err.kind, "turn failed: {err}");
                let message = bot_message(&mut self.messages, &mut bot_id);
                *message = ChatMessage {
                    id: message.id.clone(),
                    timestamp: message.timestamp,
                    ..ChatMessage::bot(FAILURE_TEXT)
                };
                on_change(message);
                notifier.notify(Notification::send_failed());
                TurnOutcome::Failed(err)
            }
        };

        self.loading = false;
        outcome
    }
}

/// The turn's bot message, appended on first use.
fn bot_message<'a>(
    messages: &'a mut Vec<ChatMessage>,
    bot_id: &mut Option<String>,
) -> &'a mut ChatMessage {
    if let Some(id) = bot_id.as_deref()
        && let Some(index) = messages.iter().position(|m| m.id == id)
    {
        return &mut messages[index];
    }

    let message = ChatMessage::bot("");
    *bot_id = Some(message.id.clone());
    messages.push(message);
    let last = messages.len() - 1;
    &mut messages[last]
}

/// Applies a progress update to the bot message being streamed.
pub fn apply_update(message: &mut ChatMessage, update: ProgressUpdate) {
    match update {
        ProgressUpdate::Text(text) => message.text = text,
        ProgressUpdate::Categories(categories) => {
            message.categories = Some(categories);
            message.products = None;
        }
        ProgressUpdate::Products(products) => message.products = Some(products),
        ProgressUpdate::List { heading, items } => {
            message.text.clear();
            message.heading = Some(heading);
            message.list_items = Some(items);
        }
        ProgressUpdate::Table(table) => {
            message.text.clear();
            message.table_data = Some(table);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use cartchat_types::{CategoryGroup, Product, WELCOME_TEXT};

    use super::*;
    use crate::error::ClientErrorKind;

    /// Replays scripted updates, then returns the scripted result.
    struct ScriptedBackend {
        updates: Vec<ProgressUpdate>,
        result: RefCell<Option<ClientResult<BotResponse>>>,
    }

    impl ScriptedBackend {
        fn new(updates: Vec<ProgressUpdate>, result: ClientResult<BotResponse>) -> Self {
            Self {
                updates,
                result: RefCell::new(Some(result)),
            }
        }
    }

    impl AgentBackend for ScriptedBackend {
        async fn run_turn(
            &self,
            _text: &str,
            sink: &mut dyn ProgressSink,
        ) -> ClientResult<BotResponse> {
            for update in &self.updates {
                sink.on_update(update.clone());
            }
            self.result.borrow_mut().take().unwrap()
        }
    }

    #[test]
    fn test_new_session_has_welcome() {
        let session = ChatSession::new();
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].id, "welcome");
        assert_eq!(session.messages()[0].text, WELCOME_TEXT);
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        let mut session = ChatSession::new();
        let backend = ScriptedBackend::new(vec![], Ok(BotResponse::text("never")));
        let mut notes = Vec::new();
        let outcome = session
            .send(&backend, "   ", &mut |n: Notification| notes.push(n), |_| {})
            .await;
        assert!(matches!(outcome, TurnOutcome::Ignored));
        assert_eq!(session.messages().len(), 1);
        assert!(notes.is_empty());
    }

    #[tokio::test]
    async fn test_streamed_turn_updates_one_bot_message() {
        let mut session = ChatSession::new();
        let categories = vec![CategoryGroup::with_products(
            "Shoes",
            vec![Product::new("Red Shoe", 20.0)],
        )];
        let backend = ScriptedBackend::new(
            vec![
                ProgressUpdate::Text("Here".into()),
                ProgressUpdate::Text("Here you go".into()),
                ProgressUpdate::Categories(categories.clone()),
            ],
            Ok(BotResponse {
                text: "Here you go".into(),
                categories: Some(categories.clone()),
                ..BotResponse::default()
            }),
        );

        let mut seen_ids = Vec::new();
        let mut notes = Vec::new();
        let outcome = session
            .send(&backend, "shoes", &mut |n: Notification| notes.push(n), |m| {
                seen_ids.push(m.id.clone());
            })
            .await;

        assert!(matches!(outcome, TurnOutcome::Completed(_)));
        assert!(!session.is_loading());
        assert!(notes.is_empty());

        let messages = session.messages();
        assert_eq!(messages.len(), 3);
        assert!(messages[1].is_user);
        assert_eq!(messages[1].text, "shoes");

        let bot = &messages[2];
        assert!(!bot.is_user);
        assert!(bot.id.starts_with("bot-"));
        assert_eq!(bot.text, "Here you go");
        assert_eq!(bot.categories, Some(categories));

        // Every update and the final apply touched the same message
        assert_eq!(seen_ids.len(), 4);
        assert!(seen_ids.iter().all(|id| id == &bot.id));
    }

    #[tokio::test]
    async fn test_failure_overwrites_partial_message_and_notifies_once() {
        let mut session = ChatSession::new();
        let backend = ScriptedBackend::new(
            vec![ProgressUpdate::Text("partial answer".into())],
            Err(ClientError::protocol("boom")),
        );

        let mut notes = Vec::new();
        let outcome = session
            .send(&backend, "hi", &mut |n: Notification| notes.push(n), |_| {})
            .await;

        let TurnOutcome::Failed(err) = outcome else {
            panic!("expected failure");
        };
        assert_eq!(err.kind, ClientErrorKind::Protocol);
        assert!(!session.is_loading());

        let messages = session.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2].text, FAILURE_TEXT);
        assert!(messages[2].categories.is_none());
        assert_eq!(notes, vec![Notification::send_failed()]);
    }

    #[tokio::test]
    async fn test_failure_without_progress_appends_message() {
        let mut session = ChatSession::new();
        let backend = ScriptedBackend::new(
            vec![],
            Err(ClientError::http_status(500, "")),
        );

        let mut notes = Vec::new();
        session
            .send(&backend, "hi", &mut |n: Notification| notes.push(n), |_| {})
            .await;

        let last = session.last_message().unwrap();
        assert!(!last.is_user);
        assert_eq!(last.text, FAILURE_TEXT);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "Error");
        assert_eq!(notes[0].description, "Failed to send message. Please try again.");
    }

    #[test]
    fn test_apply_update_list_clears_text() {
        let mut message = ChatMessage::bot("heading: \"H\"");
        apply_update(
            &mut message,
            ProgressUpdate::List {
                heading: "H".into(),
                items: vec!["a".into()],
            },
        );
        assert_eq!(message.text, "");
        assert_eq!(message.heading.as_deref(), Some("H"));
    }
}
