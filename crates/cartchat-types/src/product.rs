//! Product records and the category groups they are listed under.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Category used for products that appear before any `category_name`.
pub const DEFAULT_CATEGORY_NAME: &str = "Products";

/// A single product card returned by the shopping agent.
///
/// Backends are inconsistent about nulls and number encodings, so every
/// field deserializes leniently: missing or null strings become `""` and
/// prices may arrive as numbers or numeric strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(default, deserialize_with = "string_or_empty")]
    pub title: String,
    #[serde(
        default,
        deserialize_with = "lenient_price",
        serialize_with = "whole_price_as_integer"
    )]
    pub price: f64,
    #[serde(default, deserialize_with = "string_or_empty")]
    pub source_url: String,
    #[serde(default, deserialize_with = "string_or_empty")]
    pub product_image: String,
}

impl Product {
    pub fn new(title: impl Into<String>, price: f64) -> Self {
        Self {
            title: title.into(),
            price,
            source_url: String::new(),
            product_image: String::new(),
        }
    }

    #[must_use]
    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = url.into();
        self
    }

    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.product_image = image.into();
        self
    }

    /// Identity used to deduplicate partially streamed records: `title_price`.
    pub fn dedup_key(&self) -> String {
        format!("{}_{}", self.title, self.price)
    }

    /// Price formatted for display (`₹ 1299`).
    pub fn price_label(&self) -> String {
        format!("₹ {}", self.price)
    }

    /// Image URL suitable for display, or `None` when the backend sent a
    /// blank or `null`-ish placeholder.
    pub fn image_url(&self) -> Option<&str> {
        let image = self.product_image.trim();
        if image.is_empty() || image.to_lowercase().contains("null") {
            None
        } else {
            Some(image)
        }
    }

    /// Link to the product page, with a scheme added when the backend sent a
    /// bare host/path.
    pub fn link(&self) -> Option<String> {
        let url = self.source_url.trim();
        if url.is_empty() {
            None
        } else if url.starts_with("http") {
            Some(url.to_string())
        } else {
            Some(format!("https://{url}"))
        }
    }
}

/// Products grouped under a named category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryGroup {
    #[serde(default, deserialize_with = "string_or_empty")]
    pub category_name: String,
    #[serde(default)]
    pub products: Vec<Product>,
}

impl CategoryGroup {
    pub fn new(category_name: impl Into<String>) -> Self {
        Self {
            category_name: category_name.into(),
            products: Vec::new(),
        }
    }

    pub fn with_products(category_name: impl Into<String>, products: Vec<Product>) -> Self {
        Self {
            category_name: category_name.into(),
            products,
        }
    }
}

fn string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    })
}

fn lenient_price<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or_default(),
        Some(Value::String(s)) => s.trim().parse().unwrap_or_default(),
        _ => 0.0,
    })
}

/// Whole prices serialize as integers (`20`, not `20.0`).
#[allow(
    clippy::trivially_copy_pass_by_ref,
    clippy::cast_possible_truncation,
    clippy::float_cmp
)]
fn whole_price_as_integer<S>(price: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    if price.fract() == 0.0 && price.abs() < MAX_EXACT {
        serializer.serialize_i64(*price as i64)
    } else {
        serializer.serialize_f64(*price)
    }
}
