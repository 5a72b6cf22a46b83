//! Chat messages and the structured bot reply they are built from.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::product::{CategoryGroup, Product};

/// Greeting shown before the user has sent anything.
pub const WELCOME_TEXT: &str = "Hello! I'm your AI assistant. How can I help you today?";

/// A table parsed from `#Categories:` markup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableData {
    /// A table is only usable once it has at least one header and one row.
    pub fn is_valid(&self) -> bool {
        !self.headers.is_empty() && !self.rows.is_empty()
    }
}

/// Final structured result of one bot turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BotResponse {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub products: Option<Vec<Product>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<CategoryGroup>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_items: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_data: Option<TableData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up_questions: Option<Vec<String>>,
}

impl BotResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn table(table: TableData) -> Self {
        Self {
            table_data: Some(table),
            ..Self::default()
        }
    }

    pub fn list(heading: impl Into<String>, items: Vec<String>) -> Self {
        Self {
            heading: Some(heading.into()),
            list_items: Some(items),
            ..Self::default()
        }
    }

    /// True when the reply carries product cards (grouped or flat).
    pub fn has_products(&self) -> bool {
        self.categories.as_ref().is_some_and(|c| !c.is_empty())
            || self.products.as_ref().is_some_and(|p| !p.is_empty())
    }

    /// Enforces the display invariants: categories win over flat products,
    /// and raw text is dropped when a list or table replaces it.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.categories.is_some() {
            self.products = None;
        }
        let has_list = self.heading.is_some() && self.list_items.is_some();
        if has_list || self.table_data.is_some() {
            self.text.clear();
        }
        self
    }
}

/// One entry in the conversation transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub is_user: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub products: Option<Vec<Product>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<CategoryGroup>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_items: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_data: Option<TableData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up_questions: Option<Vec<String>>,
}

impl ChatMessage {
    fn new(id: String, text: String, is_user: bool) -> Self {
        Self {
            id,
            text,
            is_user,
            timestamp: Utc::now(),
            products: None,
            categories: None,
            heading: None,
            list_items: None,
            table_data: None,
            follow_up_questions: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(format!("user-{}", Uuid::new_v4()), text.into(), true)
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self::new(format!("bot-{}", Uuid::new_v4()), text.into(), false)
    }

    pub fn welcome() -> Self {
        Self::new("welcome".to_string(), WELCOME_TEXT.to_string(), false)
    }

    /// Replaces every content field with the final reply.
    pub fn apply_response(&mut self, response: &BotResponse) {
        let response = response.clone().normalized();
        self.text = response.text;
        self.products = response.products;
        self.categories = response.categories;
        self.heading = response.heading;
        self.list_items = response.list_items;
        self.table_data = response.table_data;
        self.follow_up_questions = response.follow_up_questions;
    }

    /// Local wall-clock time of the message as `HH:MM`.
    pub fn display_time(&self) -> String {
        self.timestamp.with_timezone(&Local).format("%H:%M").to_string()
    }
}
