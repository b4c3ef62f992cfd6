//! The book record and its character persona, serialized with the field
//! names of the original shelf document so existing collections keep loading.

use serde::{Deserialize, Deserializer, Serialize};

use crate::core::progress::calculate_progress;

/// A persona attached to a book. Values come from the character catalog,
/// never from user input.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Character {
    /// Display label of the persona (e.g. 熱血系).
    #[serde(rename = "type")]
    pub kind: String,
    pub emoji: String,
    /// Flavor tag fed into the dialogue instruction.
    pub personality: String,
}

/// One book on the shelf.
///
/// `current_page` stays within `0..=total_page` and `total_page` is at least
/// 1 after every mutation; [`Book::repair`] restores the invariant for
/// records read back from disk.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: String,
    pub title: String,
    pub genre: String,
    #[serde(default = "default_total_page", deserialize_with = "de_total_page")]
    pub total_page: u32,
    #[serde(default, deserialize_with = "de_current_page")]
    pub current_page: u32,
    /// Why the reader bought this book, captured at creation.
    pub reason: String,
    pub latest_dialogue: String,
    pub cover_image: String,
    pub character: Character,
    /// Creation time in milliseconds since the Unix epoch.
    pub created_at: u64,
}

impl Book {
    /// Integer percentage read, `0..=100`.
    pub fn progress(&self) -> u8 {
        calculate_progress(self.current_page, self.total_page)
    }

    /// Whether the last page has been reached. Completion is a sub-state,
    /// not a terminal one: the page can still be corrected downward.
    pub fn is_completed(&self) -> bool {
        self.current_page == self.total_page
    }

    /// Restores the page invariant on a record of unknown provenance.
    pub fn repair(&mut self) {
        if self.total_page < 1 {
            self.total_page = 1;
        }
        if self.current_page > self.total_page {
            self.current_page = self.total_page;
        }
    }
}

/// Cover URI used when none was supplied at creation, derived from the title
/// alone so the same title always yields the same cover.
pub fn placeholder_cover(title: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(title.as_bytes()).collect();
    format!("https://placehold.co/150x200/4f46e5/ffffff?text={}", encoded)
}

fn default_total_page() -> u32 {
    1
}

/// Numeric coercion for page fields: stored documents may carry numbers or
/// numeric strings. Unparseable, non-finite, or negative values yield `None`.
fn coerce_page(value: &serde_json::Value) -> Option<u32> {
    let number = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    if !number.is_finite() || number < 0.0 {
        return None;
    }
    Some(number.round() as u32)
}

fn de_total_page<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(coerce_page(&value).filter(|page| *page >= 1).unwrap_or(1))
}

fn de_current_page<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(coerce_page(&value).unwrap_or(0))
}
