//! The genre-to-persona catalog. A book's character is resolved from its
//! genre exactly once, at creation; the catalog is read-only configuration
//! passed into the operations layer, never a mutable global.

use crate::core::book::Character;

pub const GENRE_STUDY: &str = "study";
pub const GENRE_NOVEL: &str = "novel";
pub const GENRE_PHILOSOPHY: &str = "philosophy";
pub const GENRE_MAGAZINE: &str = "magazine";

#[derive(Debug, Clone)]
pub struct CharacterCatalog {
    entries: Vec<(String, Character)>,
    fallback: Character,
}

impl CharacterCatalog {
    /// A catalog with explicit entries and a designated fallback persona.
    pub fn new(entries: Vec<(String, Character)>, fallback: Character) -> Self {
        Self { entries, fallback }
    }

    /// The built-in four personas. The friendly magazine persona doubles as
    /// the fallback for unknown genres.
    pub fn builtin() -> Self {
        let friendly = character("フレンドリー", "😊", "friendly");
        Self::new(
            vec![
                (GENRE_STUDY.to_string(), character("熱血系", "💪", "passionate")),
                (GENRE_NOVEL.to_string(), character("ロマンチスト", "🌸", "romantic")),
                (GENRE_PHILOSOPHY.to_string(), character("達観系", "🧘", "zen")),
                (GENRE_MAGAZINE.to_string(), friendly.clone()),
            ],
            friendly,
        )
    }

    /// Total lookup: unknown genres resolve to the fallback persona rather
    /// than failing.
    pub fn resolve(&self, genre: &str) -> &Character {
        self.entries
            .iter()
            .find(|(key, _)| key == genre)
            .map(|(_, character)| character)
            .unwrap_or(&self.fallback)
    }

    /// Genre keys in catalog order, for pickers.
    pub fn genres(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }
}

fn character(kind: &str, emoji: &str, personality: &str) -> Character {
    Character {
        kind: kind.to_string(),
        emoji: emoji.to_string(),
        personality: personality.to_string(),
    }
}
