//! Plain-text rendering of chat messages for the terminal.

use std::fmt::Write as _;

use cartchat_types::{ChatMessage, Product, TableData};
use comfy_table::{ContentArrangement, Table};

/// Caption shown above products when the agent sent no text.
pub const PRODUCTS_CAPTION: &str = "Here are the products I found:";

const TABLE_WIDTH: u16 = 100;

/// Renders a bot message body (text, list, table, products, follow-ups).
pub fn render_message(message: &ChatMessage) -> String {
    let mut out = String::new();

    let has_products = message.categories.as_ref().is_some_and(|c| !c.is_empty())
        || message.products.as_ref().is_some_and(|p| !p.is_empty());

    if !message.text.is_empty() {
        push_block(&mut out, &message.text);
    } else if has_products {
        push_block(&mut out, PRODUCTS_CAPTION);
    }

    if let (Some(heading), Some(items)) = (&message.heading, &message.list_items) {
        let mut block = heading.clone();
        for item in items {
            let _ = write!(block, "\n• {item}");
        }
        push_block(&mut out, &block);
    }

    if let Some(table) = &message.table_data
        && table.is_valid()
    {
        push_block(&mut out, &render_table(table));
    }

    if let Some(categories) = &message.categories {
        for group in categories {
            let mut block = group.category_name.clone();
            for product in &group.products {
                let _ = write!(block, "\n  - {}", product_line(product));
            }
            push_block(&mut out, &block);
        }
    } else if let Some(products) = &message.products {
        let lines: Vec<String> = products
            .iter()
            .map(|p| format!("  - {}", product_line(p)))
            .collect();
        push_block(&mut out, &lines.join("\n"));
    }

    if let Some(questions) = message.follow_up_questions.as_ref().filter(|q| !q.is_empty()) {
        let mut block = String::from("You could also ask:");
        for question in questions {
            let _ = write!(block, "\n  > {question}");
        }
        push_block(&mut out, &block);
    }

    out
}

/// `title — ₹ price — link`, omitting the link when there is none.
pub fn product_line(product: &Product) -> String {
    let mut line = format!("{} — {}", product.title, product.price_label());
    if let Some(link) = product.link() {
        let _ = write!(line, " — {link}");
    }
    line
}

pub fn render_table(table: &TableData) -> String {
    let mut rendered = Table::new();
    rendered.set_width(TABLE_WIDTH);
    rendered.set_content_arrangement(ContentArrangement::Dynamic);
    rendered.set_header(&table.headers);
    for row in &table.rows {
        rendered.add_row(row);
    }
    rendered.to_string()
}

/// Tracks streamed text so only the new suffix is printed.
#[derive(Debug, Default)]
pub struct TextStream {
    printed: String,
}

impl TextStream {
    /// Returns the part of `text` not printed yet, or `None` when `text` no
    /// longer extends what was printed (e.g. markup replaced the text).
    pub fn delta(&mut self, text: &str) -> Option<String> {
        let rest = text.strip_prefix(self.printed.as_str())?;
        if rest.is_empty() {
            return None;
        }
        let rest = rest.to_string();
        self.printed = text.to_string();
        Some(rest)
    }

    /// What to print once the reply is final, given everything streamed so far.
    pub fn finish(self, rendered: &str) -> String {
        if self.printed.is_empty() {
            return rendered.to_string();
        }
        match rendered.strip_prefix(self.printed.as_str()) {
            Some(rest) => rest.to_string(),
            None => format!("\n\n{rendered}"),
        }
    }
}

fn push_block(out: &mut String, block: &str) {
    if !out.is_empty() {
        out.push_str("\n\n");
    }
    out.push_str(block);
}
