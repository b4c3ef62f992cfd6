//! In-character message generation. The book's "soul" speaks to the reader
//! in a short first-person line reflecting how far they have read and why
//! they bought the book in the first place.

use log::{debug, warn};
use rand::Rng;

use crate::core::book::Character;
use crate::core::progress::calculate_progress;
use crate::services::llm::LlmClient;

/// Everything the generator needs to know about one book.
pub struct DialogueRequest<'a> {
    pub title: &'a str,
    pub total_page: u32,
    pub current_page: u32,
    pub reason: &'a str,
    pub character: &'a Character,
}

pub struct DialogueGenerator {
    client: Option<Box<dyn LlmClient>>,
}

impl DialogueGenerator {
    pub fn new(client: Option<Box<dyn LlmClient>>) -> Self {
        Self { client }
    }

    /// Produces the next message for a book. Never fails and never returns
    /// an empty string: an absent client, a failed call, or an unusable
    /// response all end in a locally templated fallback line.
    pub async fn generate(&self, request: &DialogueRequest<'_>) -> String {
        let progress = calculate_progress(request.current_page, request.total_page);

        if let Some(client) = &self.client {
            let instruction = build_instruction(request, progress);
            match client.complete(&instruction).await {
                Ok(text) if !text.trim().is_empty() => return text.trim().to_string(),
                Ok(_) => warn!("LLM returned an empty message, using a fallback line"),
                Err(e) => warn!("dialogue generation failed, using a fallback line: {e:#}"),
            }
        } else {
            debug!("no LLM client configured, using a fallback line");
        }

        fallback_line(request, progress)
    }
}

fn build_instruction(request: &DialogueRequest<'_>, progress: u8) -> String {
    let character_prompt = format!(
        "あなたは「{}」（人格:{})です",
        request.character.kind, request.character.personality
    );
    let info_prompt = format!(
        "本「{}」の現在の進捗は{}%です。この本を買った理由は「{}」です。",
        request.title, progress, request.reason
    );
    format!(
        "{} {}あなたがこの本の魂として、購入理由と現在の進捗を踏まえて、\
         読者を励まし、読み進めるのを思い出させるための、一言メッセージ（50字以内)を生成してください。",
        character_prompt, info_prompt
    )
}

/// Locally templated lines used whenever the external service is unusable.
fn fallback_line(request: &DialogueRequest<'_>, progress: u8) -> String {
    let lines = [
        format!("進捗{progress}%…？ おい、俺たちの約束、忘れちまったのか？"),
        format!(
            "{}「{}」って言ってたよね。続き、読もう？",
            request.character.emoji, request.reason
        ),
        format!(
            "{}のわたしは{}ページ目で待ってるよ。{}",
            request.character.kind, request.current_page, request.character.emoji
        ),
        format!("「{}」はここまで{progress}%。今日も1ページどう？", request.title),
    ];
    let index = rand::rng().random_range(0..lines.len());
    lines[index].clone()
}
