//! Best-effort extraction from a JSON document that is still being streamed.
//!
//! The agent streams `{"summary": "...", "categories": [...]}` token by token,
//! so the buffer is usually not valid JSON yet. These helpers pull out the
//! pieces that are already complete: the (possibly unterminated) summary
//! string and every fully-closed product object literal.

use std::sync::OnceLock;

use cartchat_types::Product;
use regex::Regex;

/// A product literal found in the buffer, with the byte offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedProduct {
    pub offset: usize,
    pub product: Product,
}

fn summary_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""summary"\s*:\s*""#).expect("summary regex is valid"))
}

fn product_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r#"\{\s*"title"\s*:\s*"((?:[^"\\]|\\.)*)""#,
            r#"\s*,\s*"price"\s*:\s*(-?\d+(?:\.\d+)?)"#,
            r#"(?:\s*,\s*"source_url"\s*:\s*(?:"((?:[^"\\]|\\.)*)"|null))?"#,
            r#"(?:\s*,\s*"product_image"\s*:\s*(?:"((?:[^"\\]|\\.)*)"|null))?"#,
            r#"\s*\}"#,
        ))
        .expect("product regex is valid")
    })
}

fn category_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#""category_name"\s*:\s*"((?:[^"\\]|\\.)*)""#)
            .expect("category regex is valid")
    })
}

/// Returns the decoded value of the first `"summary"` key, even when the
/// string has not been closed yet.
pub fn extract_summary(buffer: &str) -> Option<String> {
    let key = summary_key_re().find(buffer)?;
    Some(decode_string_prefix(&buffer[key.end()..]))
}

/// Decodes JSON string content up to the first unescaped `"` or the end of
/// input, whichever comes first.
///
/// An escape sequence cut off by the end of input is dropped; it will be
/// decoded on a later call once more of the buffer has arrived.
pub fn decode_string_prefix(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => break,
            '\\' => {
                let Some(escaped) = chars.next() else { break };
                match escaped {
                    'n' => out.push('\n'),
                    'r' => out.push('\r'),
                    't' => out.push('\t'),
                    'b' => out.push('\u{8}'),
                    'f' => out.push('\u{c}'),
                    'u' => {
                        let hex: String = chars.by_ref().take(4).collect();
                        if hex.len() < 4 {
                            break;
                        }
                        match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                            Some(decoded) => out.push(decoded),
                            None => out.push(char::REPLACEMENT_CHARACTER),
                        }
                    }
                    // \" \\ \/ and anything unknown decode to the character itself
                    other => out.push(other),
                }
            }
            other => out.push(other),
        }
    }

    out
}

/// Finds every complete `{"title": ..., "price": ...}` literal in the buffer.
pub fn scan_products(buffer: &str) -> Vec<ScannedProduct> {
    product_re()
        .captures_iter(buffer)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let title = decode_string_prefix(caps.get(1)?.as_str());
            let price: f64 = caps.get(2)?.as_str().parse().ok()?;
            let source_url = caps
                .get(3)
                .map(|m| decode_string_prefix(m.as_str()))
                .unwrap_or_default();
            let product_image = caps
                .get(4)
                .map(|m| decode_string_prefix(m.as_str()))
                .unwrap_or_default();

            Some(ScannedProduct {
                offset: whole.start(),
                product: Product {
                    title,
                    price,
                    source_url,
                    product_image,
                },
            })
        })
        .collect()
}

/// Name of the nearest `"category_name"` that starts before `offset`.
pub fn category_before(buffer: &str, offset: usize) -> Option<String> {
    let head = buffer.get(..offset)?;
    category_name_re()
        .captures_iter(head)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| decode_string_prefix(m.as_str()))
}
