//! Incremental interpretation of a streamed agent reply.
//!
//! A fresh [`ResponseInterpreter`] is created for every user turn. It is fed
//! decoded SSE events one at a time, returns the progress updates each event
//! produced, and finally resolves the reply into a [`BotResponse`].
//!
//! `content` events carry either narrative text or a fragment of a JSON
//! document (`metadata.is_json`). Text fragments are merged into a text
//! accumulator and checked for table/list markup; JSON fragments go into a
//! separate buffer that is mined for a partial summary and complete product
//! literals until the whole document parses.

pub mod partial_json;

use std::collections::HashSet;

use cartchat_types::{BotResponse, CategoryGroup, DEFAULT_CATEGORY_NAME, Product, TableData};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ClientError, ClientResult};
use crate::fallback::{DocumentParts, parse_response_content};
use crate::markup::{
    contains_heading_markup, contains_table_markup, parse_heading_list, parse_table,
};
use crate::sse::SseEvent;

use self::partial_json::{category_before, extract_summary, scan_products};

/// Something new the UI can show before the turn completes.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressUpdate {
    /// Best plain text so far (JSON summary, or the merged narrative text)
    Text(String),
    /// Every product discovered so far, grouped by category
    Categories(Vec<CategoryGroup>),
    /// Flat product list from a document without categories
    Products(Vec<Product>),
    /// Heading plus bullet items parsed from text markup
    List { heading: String, items: Vec<String> },
    /// Table parsed from `#Categories:` markup
    Table(TableData),
}

/// Kind of the most recent `content` fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentMode {
    Text,
    Json,
}

/// Lifecycle of one turn as seen by the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    /// Request sent, nothing received yet
    Sent,
    Streaming(FragmentMode),
    /// `complete` received (or stream ended), final reconciliation pending
    Completing,
    Done,
    Failed,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Clone)]
enum ResolvedDocument {
    Categories(Vec<CategoryGroup>),
    Products(Vec<Product>),
    /// Parsed, but carried neither categories nor products
    Other,
}

/// Per-turn accumulator state.
#[derive(Debug)]
pub struct ResponseInterpreter {
    phase: TurnPhase,
    text: String,
    last_text_fragment: Option<String>,
    json_buffer: String,
    summary: String,
    discovered: Vec<CategoryGroup>,
    seen_products: HashSet<String>,
    resolved: Option<ResolvedDocument>,
    follow_up_questions: Option<Vec<String>>,
    final_content: Option<Value>,
    error: Option<String>,
    final_extraction_done: bool,
}

impl Default for ResponseInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseInterpreter {
    pub fn new() -> Self {
        Self {
            phase: TurnPhase::Sent,
            text: String::new(),
            last_text_fragment: None,
            json_buffer: String::new(),
            summary: String::new(),
            discovered: Vec::new(),
            seen_products: HashSet::new(),
            resolved: None,
            follow_up_questions: None,
            final_content: None,
            error: None,
            final_extraction_done: false,
        }
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// Message of the `error` event, if one arrived.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Merged narrative text received so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Handles one decoded SSE frame.
    ///
    /// The envelope's `type` decides the handling; the SSE `event:` name is
    /// used when the envelope has none. Frames whose data is not JSON are
    /// logged and skipped, except `error` frames whose raw data becomes the
    /// failure message.
    pub fn handle_event(&mut self, event: &SseEvent) -> Vec<ProgressUpdate> {
        if event.data.trim().is_empty() {
            return Vec::new();
        }

        match serde_json::from_str::<Envelope>(&event.data) {
            Ok(envelope) => {
                let kind = envelope.kind.as_deref().unwrap_or(&event.event_type);
                self.handle_envelope(kind, &envelope.data)
            }
            Err(err) => {
                if event.event_type == "error" {
                    self.fail(event.data.trim().to_string());
                } else {
                    warn!(event_type = %event.event_type, "skipping malformed event data: {err}");
                }
                Vec::new()
            }
        }
    }

    /// Handles one envelope `{type, data}` that has already been decoded.
    pub fn handle_envelope(&mut self, kind: &str, data: &Value) -> Vec<ProgressUpdate> {
        if self.phase == TurnPhase::Failed {
            debug!(kind, "draining event after failure");
            return Vec::new();
        }
        if self.phase == TurnPhase::Sent {
            self.phase = TurnPhase::Streaming(FragmentMode::Text);
        }

        match kind {
            "content" => self.on_content(data),
            "complete" => self.on_complete(data),
            "error" => {
                let message = error_message(data);
                self.fail(message);
                Vec::new()
            }
            other => {
                debug!(kind = other, "ignoring unknown event type");
                Vec::new()
            }
        }
    }

    /// Resolves the final reply once the stream has ended.
    ///
    /// # Errors
    /// Returns a protocol error carrying the message of an `error` event.
    pub fn finish(mut self) -> ClientResult<BotResponse> {
        if let Some(message) = self.error.take() {
            self.phase = TurnPhase::Failed;
            return Err(ClientError::protocol(message));
        }

        self.run_final_extraction();
        self.phase = TurnPhase::Done;

        let final_text = self.final_text();
        let mut response = match self.resolved.take() {
            Some(ResolvedDocument::Categories(categories)) => BotResponse {
                text: final_text,
                categories: Some(categories),
                ..BotResponse::default()
            },
            Some(ResolvedDocument::Products(products)) => BotResponse {
                text: final_text,
                products: Some(products),
                ..BotResponse::default()
            },
            Some(ResolvedDocument::Other) | None => self.reconcile(final_text),
        };

        if response.follow_up_questions.is_none() {
            response.follow_up_questions = self.follow_up_questions.take();
        }
        Ok(response.normalized())
    }

    fn fail(&mut self, message: String) {
        warn!("agent reported an error: {message}");
        if self.error.is_none() {
            self.error = Some(message);
        }
        self.phase = TurnPhase::Failed;
    }

    fn on_content(&mut self, data: &Value) -> Vec<ProgressUpdate> {
        let (fragment, structured) = match data.get("content") {
            Some(Value::String(s)) => (s.clone(), false),
            Some(Value::Null) | None => return Vec::new(),
            Some(other) => (other.to_string(), true),
        };

        if structured || is_json_fragment(data) {
            self.phase = TurnPhase::Streaming(FragmentMode::Json);
            self.on_json_fragment(&fragment)
        } else {
            self.phase = TurnPhase::Streaming(FragmentMode::Text);
            self.on_text_fragment(&fragment)
        }
    }

    fn on_text_fragment(&mut self, fragment: &str) -> Vec<ProgressUpdate> {
        if !self.merge_text(fragment) {
            return Vec::new();
        }

        if contains_table_markup(&self.text) {
            return parse_table(&self.text)
                .map(ProgressUpdate::Table)
                .into_iter()
                .collect();
        }

        if contains_heading_markup(&self.text)
            && let Some(list) = parse_heading_list(&self.text)
        {
            return vec![ProgressUpdate::List {
                heading: list.heading,
                items: list.items,
            }];
        }

        vec![ProgressUpdate::Text(self.best_text().to_string())]
    }

    /// Longest-prefix merge. Returns false when nothing changed.
    ///
    /// A fragment identical to the previous one is a redelivery and is
    /// dropped.
    fn merge_text(&mut self, fragment: &str) -> bool {
        if fragment.is_empty()
            || fragment == self.text
            || self.last_text_fragment.as_deref() == Some(fragment)
        {
            return false;
        }
        self.last_text_fragment = Some(fragment.to_string());
        if fragment.starts_with(self.text.as_str()) {
            // Cumulative resend: the fragment already contains everything so far
            self.text = fragment.to_string();
        } else {
            self.text.push_str(fragment);
        }
        true
    }

    fn on_json_fragment(&mut self, fragment: &str) -> Vec<ProgressUpdate> {
        if self.resolved.is_some() {
            debug!("document already parsed, ignoring JSON fragment");
            return Vec::new();
        }
        self.json_buffer.push_str(fragment);
        self.extract_from_buffer()
    }

    fn extract_from_buffer(&mut self) -> Vec<ProgressUpdate> {
        let mut updates = Vec::new();

        if let Some(summary) = extract_summary(&self.json_buffer)
            && summary.chars().count() > self.summary.chars().count()
        {
            self.summary = summary;
            updates.push(ProgressUpdate::Text(self.summary.clone()));
        }

        match serde_json::from_str::<Value>(&self.json_buffer) {
            Ok(Value::Object(map)) => {
                updates.extend(self.resolve_document(DocumentParts::from_object(&map)));
            }
            Ok(_) => debug!("JSON buffer parsed to a non-object, waiting for more"),
            Err(_) => updates.extend(self.scan_partial_products()),
        }

        updates
    }

    /// Accepts the fully parsed document as authoritative.
    fn resolve_document(&mut self, parts: DocumentParts) -> Option<ProgressUpdate> {
        if let Some(summary) = parts.summary {
            self.summary = summary;
        }
        if parts.follow_up_questions.is_some() {
            self.follow_up_questions = parts.follow_up_questions;
        }

        let (resolved, update) = match (parts.categories, parts.products) {
            (Some(categories), _) => (
                ResolvedDocument::Categories(categories.clone()),
                Some(ProgressUpdate::Categories(categories)),
            ),
            (None, Some(products)) => (
                ResolvedDocument::Products(products.clone()),
                Some(ProgressUpdate::Products(products)),
            ),
            (None, None) => (ResolvedDocument::Other, None),
        };
        debug!("JSON document fully parsed");
        self.resolved = Some(resolved);
        update
    }

    /// Adds newly completed product literals to the category accumulator.
    fn scan_partial_products(&mut self) -> Option<ProgressUpdate> {
        let mut added = false;

        for scanned in scan_products(&self.json_buffer) {
            if !self.seen_products.insert(scanned.product.dedup_key()) {
                continue;
            }
            let category = category_before(&self.json_buffer, scanned.offset)
                .unwrap_or_else(|| DEFAULT_CATEGORY_NAME.to_string());

            match self
                .discovered
                .iter_mut()
                .find(|group| group.category_name == category)
            {
                Some(group) => group.products.push(scanned.product),
                None => self
                    .discovered
                    .push(CategoryGroup::with_products(category, vec![scanned.product])),
            }
            added = true;
        }

        added.then(|| ProgressUpdate::Categories(self.discovered.clone()))
    }

    fn on_complete(&mut self, data: &Value) -> Vec<ProgressUpdate> {
        self.phase = TurnPhase::Completing;

        if let Some(content) = complete_content(data) {
            self.final_content = Some(content.clone());
        }

        self.run_final_extraction()
    }

    fn run_final_extraction(&mut self) -> Vec<ProgressUpdate> {
        if self.final_extraction_done || self.json_buffer.is_empty() || self.resolved.is_some() {
            return Vec::new();
        }
        self.final_extraction_done = true;
        self.extract_from_buffer()
    }

    fn best_text(&self) -> &str {
        if self.summary.is_empty() {
            &self.text
        } else {
            &self.summary
        }
    }

    /// Summary, else text carried by `complete`, else the merged text.
    fn final_text(&self) -> String {
        if !self.summary.is_empty() {
            return self.summary.clone();
        }
        if let Some(Value::String(content)) = &self.final_content
            && !content.is_empty()
        {
            return content.clone();
        }
        self.text.clone()
    }

    /// Final reconciliation for a stream that never produced a parsed
    /// product document.
    fn reconcile(&mut self, final_text: String) -> BotResponse {
        let candidate = match self.final_content.take() {
            Some(content) if self.summary.is_empty() && !is_empty_content(&content) => content,
            _ => Value::String(final_text),
        };

        let mut response = parse_response_content(&candidate);
        if !response.has_products() && !self.discovered.is_empty() {
            response.categories = Some(std::mem::take(&mut self.discovered));
        }
        response
    }
}

fn is_json_fragment(data: &Value) -> bool {
    let Some(metadata) = data.get("metadata") else {
        return false;
    };
    metadata.get("is_json").and_then(Value::as_bool) == Some(true)
        || metadata.get("content_type").and_then(Value::as_str) == Some("application/json")
}

fn complete_content(data: &Value) -> Option<&Value> {
    data.get("content")
        .filter(|content| !is_empty_content(content))
        .or_else(|| {
            data.pointer("/metadata/response/output/0/parts/0/content")
                .filter(|content| !is_empty_content(content))
        })
}

fn is_empty_content(content: &Value) -> bool {
    match content {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn error_message(data: &Value) -> String {
    let message = data
        .get("error")
        .and_then(|e| e.as_str().or_else(|| e.get("message").and_then(Value::as_str)))
        .or_else(|| data.get("content").and_then(Value::as_str))
        .or_else(|| data.as_str());
    message.unwrap_or("Unknown error").to_string()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn text_event(content: &str) -> Value {
        json!({"content": content})
    }

    fn json_event(content: &str) -> Value {
        json!({"content": content, "metadata": {"is_json": true}})
    }

    fn feed_text(interpreter: &mut ResponseInterpreter, parts: &[&str]) -> Vec<ProgressUpdate> {
        parts
            .iter()
            .flat_map(|part| interpreter.handle_envelope("content", &text_event(part)))
            .collect()
    }

    fn feed_json(interpreter: &mut ResponseInterpreter, parts: &[&str]) -> Vec<ProgressUpdate> {
        parts
            .iter()
            .flat_map(|part| interpreter.handle_envelope("content", &json_event(part)))
            .collect()
    }

    const DOCUMENT: &str = r#"{"summary":"s","categories":[{"category_name":"c","products":[{"title":"t","price":5}]}]}"#;

    fn expected_document_response() -> BotResponse {
        BotResponse {
            text: "s".into(),
            categories: Some(vec![CategoryGroup::with_products(
                "c",
                vec![Product::new("t", 5.0)],
            )]),
            ..BotResponse::default()
        }
    }

    #[test]
    fn test_plain_text_deltas_concatenate() {
        let mut interpreter = ResponseInterpreter::new();
        let updates = feed_text(&mut interpreter, &["Hello", ", ", "world"]);
        assert_eq!(
            updates.last(),
            Some(&ProgressUpdate::Text("Hello, world".into()))
        );
        let response = interpreter.finish().unwrap();
        assert_eq!(response, BotResponse::text("Hello, world"));
    }

    #[test]
    fn test_cumulative_resend_replaces() {
        let mut interpreter = ResponseInterpreter::new();
        feed_text(&mut interpreter, &["Hel", "Hello", "Hello there"]);
        assert_eq!(interpreter.finish().unwrap().text, "Hello there");
    }

    #[test]
    fn test_duplicate_fragment_is_ignored() {
        let mut interpreter = ResponseInterpreter::new();
        feed_text(&mut interpreter, &["same chunk"]);
        let updates = feed_text(&mut interpreter, &["same chunk"]);
        assert!(updates.is_empty());
        assert_eq!(interpreter.text(), "same chunk");
        assert_eq!(interpreter.finish().unwrap().text, "same chunk");
    }

    #[test]
    fn test_repeated_delta_is_not_appended_twice() {
        let mut interpreter = ResponseInterpreter::new();
        let updates = feed_text(&mut interpreter, &["Hello", " world", " world"]);
        assert_eq!(updates.len(), 2);
        assert_eq!(interpreter.text(), "Hello world");

        // Same text again later, after another fragment, is appended
        feed_text(&mut interpreter, &["!", " world"]);
        assert_eq!(interpreter.finish().unwrap().text, "Hello world! world");
    }

    #[test]
    fn test_json_document_in_one_fragment() {
        let mut interpreter = ResponseInterpreter::new();
        let updates = feed_json(&mut interpreter, &[DOCUMENT]);
        assert!(updates.contains(&ProgressUpdate::Text("s".into())));
        interpreter.handle_envelope("complete", &json!({}));
        assert_eq!(interpreter.finish().unwrap(), expected_document_response());
    }

    #[test]
    fn test_json_document_split_arbitrarily_matches_single_fragment() {
        for parts in [2usize, 3, 7, 19] {
            let size = DOCUMENT.len().div_ceil(parts);
            let fragments: Vec<&str> = DOCUMENT
                .as_bytes()
                .chunks(size)
                .map(|chunk| std::str::from_utf8(chunk).unwrap())
                .collect();

            let mut interpreter = ResponseInterpreter::new();
            feed_json(&mut interpreter, &fragments);
            interpreter.handle_envelope("complete", &json!({}));
            assert_eq!(
                interpreter.finish().unwrap(),
                expected_document_response(),
                "split into {parts} fragments"
            );
        }
    }

    #[test]
    fn test_summary_streams_before_document_completes() {
        let mut interpreter = ResponseInterpreter::new();
        let updates = feed_json(&mut interpreter, &[r#"{"summary":"Here are"#, r#" some"#]);
        assert_eq!(
            updates,
            vec![
                ProgressUpdate::Text("Here are".into()),
                ProgressUpdate::Text("Here are some".into()),
            ]
        );
    }

    #[test]
    fn test_partial_products_grouped_and_deduplicated() {
        let mut interpreter = ResponseInterpreter::new();
        let first = feed_json(
            &mut interpreter,
            &[r#"{"categories":[{"category_name":"Snacks","products":[{"title":"X","price":10},"#],
        );
        assert_eq!(
            first,
            vec![ProgressUpdate::Categories(vec![CategoryGroup::with_products(
                "Snacks",
                vec![Product::new("X", 10.0)]
            )])]
        );

        // Re-scan of the same buffer finds X again; only Y is new
        let second = feed_json(&mut interpreter, &[r#"{"title":"Y","price":4}"#]);
        let Some(ProgressUpdate::Categories(groups)) = second.last() else {
            panic!("expected categories update, got {second:?}");
        };
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].products.len(), 2);

        // Nothing new: no update
        assert!(feed_json(&mut interpreter, &[" "]).is_empty());
    }

    #[test]
    fn test_repeated_product_across_fragments_kept_once() {
        let mut interpreter = ResponseInterpreter::new();
        feed_json(
            &mut interpreter,
            &[
                r#"{"categories":[{"category_name":"c","products":[{"title":"X","price":10}"#,
                r#",{"title":"X","price":10}"#,
            ],
        );
        interpreter.handle_envelope("complete", &json!({}));
        let response = interpreter.finish().unwrap();
        let categories = response.categories.unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].products, vec![Product::new("X", 10.0)]);
    }

    #[test]
    fn test_products_without_category_use_default_group() {
        let mut interpreter = ResponseInterpreter::new();
        let updates = feed_json(&mut interpreter, &[r#"{"items":[{"title":"A","price":1}"#]);
        assert_eq!(
            updates,
            vec![ProgressUpdate::Categories(vec![CategoryGroup::with_products(
                "Products",
                vec![Product::new("A", 1.0)]
            )])]
        );
    }

    #[test]
    fn test_full_parse_supersedes_partial_scan() {
        let mut interpreter = ResponseInterpreter::new();
        feed_json(
            &mut interpreter,
            &[r#"{"categories":[{"category_name":"c","products":[{"title":"A","price":1}"#],
        );
        let updates = feed_json(
            &mut interpreter,
            &[r#",{"title":"B","price":2,"product_image":"i"}]}],"follow_up_questions":["Q?"]}"#],
        );
        let expected = vec![CategoryGroup::with_products(
            "c",
            vec![Product::new("A", 1.0), Product::new("B", 2.0).with_image("i")],
        )];
        assert_eq!(updates, vec![ProgressUpdate::Categories(expected.clone())]);

        // Fragments after full resolution are not re-parsed
        assert!(feed_json(&mut interpreter, &["garbage"]).is_empty());

        let response = interpreter.finish().unwrap();
        assert_eq!(response.categories, Some(expected));
        assert_eq!(response.follow_up_questions, Some(vec!["Q?".to_string()]));
    }

    #[test]
    fn test_json_categories_without_summary_and_complete() {
        let mut interpreter = ResponseInterpreter::new();
        interpreter.handle_event(&SseEvent::new(
            "content",
            json!({
                "type": "content",
                "data": {
                    "content": r#"{"categories":[{"category_name":"Shoes","products":[{"title":"Red Shoe","price":20}]}]}"#,
                    "metadata": {"is_json": true}
                }
            })
            .to_string(),
        ));
        interpreter.handle_event(&SseEvent::new(
            "complete",
            json!({"type": "complete", "data": {}}).to_string(),
        ));

        let response = interpreter.finish().unwrap();
        assert_eq!(response.text, "");
        let categories = response.categories.unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].category_name, "Shoes");
        assert_eq!(categories[0].products, vec![Product::new("Red Shoe", 20.0)]);
    }

    #[test]
    fn test_content_type_metadata_selects_json_mode() {
        let mut interpreter = ResponseInterpreter::new();
        interpreter.handle_envelope(
            "content",
            &json!({"content": "{\"summary\":\"x", "metadata": {"content_type": "application/json"}}),
        );
        assert_eq!(
            interpreter.phase(),
            TurnPhase::Streaming(FragmentMode::Json)
        );
        assert_eq!(interpreter.text(), "");
    }

    #[test]
    fn test_table_markup_suppresses_text() {
        let mut interpreter = ResponseInterpreter::new();
        let updates = feed_text(&mut interpreter, &["#Categories: *A* | *B*\n"]);
        assert!(updates.is_empty());

        let updates = feed_text(&mut interpreter, &["#Use Case: val1 | val2"]);
        assert_eq!(
            updates,
            vec![ProgressUpdate::Table(TableData {
                headers: vec![String::new(), "A".into(), "B".into()],
                rows: vec![vec!["Use Case".into(), "val1".into(), "val2".into()]],
            })]
        );

        let response = interpreter.finish().unwrap();
        assert_eq!(response.text, "");
        assert!(response.table_data.is_some());
    }

    #[test]
    fn test_heading_list_markup() {
        let mut interpreter = ResponseInterpreter::new();
        let updates = feed_text(
            &mut interpreter,
            &["heading: \"Top Picks\"\n", "[\"item one\"]\n", "[\"item two\"]\n[\"item one\"]"],
        );
        assert_eq!(
            updates.last(),
            Some(&ProgressUpdate::List {
                heading: "Top Picks".into(),
                items: vec!["item one".into(), "item two".into()],
            })
        );

        let response = interpreter.finish().unwrap();
        assert_eq!(response.heading.as_deref(), Some("Top Picks"));
        assert_eq!(
            response.list_items,
            Some(vec!["item one".to_string(), "item two".to_string()])
        );
        assert_eq!(response.text, "");
    }

    #[test]
    fn test_incomplete_heading_markup_streams_text() {
        let mut interpreter = ResponseInterpreter::new();
        let updates = feed_text(&mut interpreter, &["heading: \"Top"]);
        assert_eq!(updates, vec![ProgressUpdate::Text("heading: \"Top".into())]);

        let updates = feed_text(&mut interpreter, &[" Picks\"\n[\"a\"]"]);
        assert_eq!(
            updates,
            vec![ProgressUpdate::List {
                heading: "Top Picks".into(),
                items: vec!["a".into()],
            }]
        );
    }

    #[test]
    fn test_error_event_fails_after_partial_output() {
        let mut interpreter = ResponseInterpreter::new();
        assert!(!feed_text(&mut interpreter, &["partial"]).is_empty());
        interpreter.handle_envelope("error", &json!({"error": "model overloaded"}));
        assert_eq!(interpreter.phase(), TurnPhase::Failed);

        // Drained, not processed
        assert!(feed_text(&mut interpreter, &[" more"]).is_empty());

        let err = interpreter.finish().unwrap_err();
        assert_eq!(err.kind, crate::error::ClientErrorKind::Protocol);
        assert_eq!(err.message, "model overloaded");
    }

    #[test]
    fn test_error_message_sources() {
        assert_eq!(error_message(&json!({"content": "boom"})), "boom");
        assert_eq!(error_message(&json!({"error": {"message": "deep"}})), "deep");
        assert_eq!(error_message(&json!({})), "Unknown error");
    }

    #[test]
    fn test_malformed_error_frame_uses_raw_data() {
        let mut interpreter = ResponseInterpreter::new();
        interpreter.handle_event(&SseEvent::new("error", "upstream timeout"));
        assert_eq!(interpreter.error(), Some("upstream timeout"));
    }

    #[test]
    fn test_malformed_content_frame_is_skipped() {
        let mut interpreter = ResponseInterpreter::new();
        assert!(interpreter.handle_event(&SseEvent::new("content", "{not json")).is_empty());
        feed_text(&mut interpreter, &["ok"]);
        assert_eq!(interpreter.finish().unwrap().text, "ok");
    }

    #[test]
    fn test_unknown_event_types_are_ignored() {
        let mut interpreter = ResponseInterpreter::new();
        assert!(interpreter.handle_envelope("ping", &json!({"content": "x"})).is_empty());
        assert_eq!(interpreter.finish().unwrap().text, "");
    }

    #[test]
    fn test_complete_content_used_when_nothing_streamed() {
        let mut interpreter = ResponseInterpreter::new();
        interpreter.handle_envelope("complete", &json!({"content": "final words"}));
        assert_eq!(interpreter.phase(), TurnPhase::Completing);
        assert_eq!(interpreter.finish().unwrap().text, "final words");
    }

    #[test]
    fn test_complete_metadata_response_is_reconciled() {
        let mut interpreter = ResponseInterpreter::new();
        feed_text(&mut interpreter, &["Looking..."]);
        interpreter.handle_envelope(
            "complete",
            &json!({"metadata": {"response": {"output": [{"parts": [{"content": {
                "summary": "Found one",
                "products": [{"title": "Bar", "price": 99}]
            }}]}]}}}),
        );
        let response = interpreter.finish().unwrap();
        assert_eq!(response.text, "Found one");
        assert_eq!(response.products, Some(vec![Product::new("Bar", 99.0)]));
    }

    #[test]
    fn test_unparseable_json_falls_back_to_discovered_products() {
        let mut interpreter = ResponseInterpreter::new();
        feed_json(
            &mut interpreter,
            &[r#"{"summary":"Partial","categories":[{"category_name":"c","products":[{"title":"A","price":1},{"tit"#],
        );
        interpreter.handle_envelope("complete", &json!({}));
        let response = interpreter.finish().unwrap();
        assert_eq!(response.text, "Partial");
        assert_eq!(
            response.categories,
            Some(vec![CategoryGroup::with_products(
                "c",
                vec![Product::new("A", 1.0)]
            )])
        );
    }

    #[test]
    fn test_stream_end_without_complete_still_extracts() {
        let mut interpreter = ResponseInterpreter::new();
        feed_json(&mut interpreter, &[r#"{"products":[{"title":"A","price":1}]}"#]);
        let response = interpreter.finish().unwrap();
        assert_eq!(response.products, Some(vec![Product::new("A", 1.0)]));
    }

    #[test]
    fn test_text_mode_json_string_reconciled_at_end() {
        let mut interpreter = ResponseInterpreter::new();
        feed_text(&mut interpreter, &[DOCUMENT]);
        assert_eq!(interpreter.finish().unwrap(), expected_document_response());
    }

    #[test]
    fn test_summary_preferred_over_text_in_progress() {
        let mut interpreter = ResponseInterpreter::new();
        feed_json(&mut interpreter, &[r#"{"summary":"From JSON""#]);
        let updates = feed_text(&mut interpreter, &["narrative"]);
        assert_eq!(updates, vec![ProgressUpdate::Text("From JSON".into())]);
    }
}
