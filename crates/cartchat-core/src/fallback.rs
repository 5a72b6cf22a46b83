//! Whole-payload interpretation for replies that did not stream.
//!
//! Also used to reconcile a stream that ended without a parsed `categories`
//! document, so both paths agree on the final shape.

use cartchat_types::{BotResponse, CategoryGroup, Product};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::markup::{parse_heading_list, parse_table};

/// Structured fields recovered from a complete agent document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentParts {
    pub summary: Option<String>,
    pub categories: Option<Vec<CategoryGroup>>,
    pub products: Option<Vec<Product>>,
    pub follow_up_questions: Option<Vec<String>>,
}

impl DocumentParts {
    /// Reads `summary`, `categories`, `products` and `follow_up_questions`
    /// from a parsed document. Malformed entries are skipped.
    pub fn from_object(map: &Map<String, Value>) -> Self {
        Self {
            summary: map.get("summary").and_then(Value::as_str).map(str::to_string),
            categories: map
                .get("categories")
                .and_then(Value::as_array)
                .map(|items| parse_entries(items)),
            products: map
                .get("products")
                .and_then(Value::as_array)
                .map(|items| parse_entries(items)),
            follow_up_questions: map
                .get("follow_up_questions")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                }),
        }
    }

    pub fn has_structure(&self) -> bool {
        self.categories.is_some() || self.products.is_some() || self.follow_up_questions.is_some()
    }

    pub fn into_response(self) -> BotResponse {
        BotResponse {
            text: self.summary.unwrap_or_default(),
            categories: self.categories,
            products: self.products,
            follow_up_questions: self.follow_up_questions,
            ..BotResponse::default()
        }
        .normalized()
    }
}

/// Interprets one complete content value from the agent.
///
/// Priority: a document with `categories`/`products`, then a bare product
/// array, then text markup (table, heading list, embedded JSON), then the
/// raw value as plain text.
pub fn parse_response_content(content: &Value) -> BotResponse {
    match content {
        Value::Object(map) => {
            let parts = DocumentParts::from_object(map);
            if parts.categories.is_some() || parts.products.is_some() {
                return parts.into_response();
            }
        }
        Value::Array(items) if is_product_list(items) => {
            return BotResponse {
                products: Some(parse_entries(items)),
                ..BotResponse::default()
            };
        }
        Value::String(text) => return parse_text_content(text),
        _ => {}
    }

    BotResponse::text(match content {
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Interprets a non-streamed run result `{output: [{parts: [{content}]}]}`.
///
/// A body without content yields an empty text reply.
pub fn parse_run_output(body: &Value) -> BotResponse {
    match body.pointer("/output/0/parts/0/content") {
        Some(content) => parse_response_content(content),
        None => {
            warn!("run result has no output content");
            BotResponse::text("")
        }
    }
}

fn parse_text_content(text: &str) -> BotResponse {
    if let Some(table) = parse_table(text) {
        return BotResponse::table(table);
    }

    if let Some(list) = parse_heading_list(text) {
        return BotResponse::list(list.heading, list.items);
    }

    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => {
            let parts = DocumentParts::from_object(&map);
            if parts.has_structure() {
                return parts.into_response();
            }
        }
        Ok(_) => {}
        Err(err) => debug!("content is not JSON, treating as text: {err}"),
    }

    BotResponse::text(text)
}

fn is_product_list(items: &[Value]) -> bool {
    items
        .first()
        .and_then(|first| first.get("title"))
        .is_some_and(|title| !title.is_null())
}

fn parse_entries<T: serde::de::DeserializeOwned>(items: &[Value]) -> Vec<T> {
    items
        .iter()
        .filter_map(|item| serde_json::from_value(item.clone()).ok())
        .collect()
}
