//! The operations layer: the only path through which books are created,
//! progressed, or deleted.
//!
//! Each mutation holds the collection lock as one indivisible step, and the
//! lock is never held across the dialogue-generation call. Progress updates
//! take a sequence token when issued and commit only if no later update for
//! the same book was issued meanwhile, so overlapped commits resolve to the
//! last writer's whole page/dialogue pair rather than an interleaved mix.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use log::info;
use tokio::sync::Mutex;

use crate::core::book::{placeholder_cover, Book};
use crate::core::catalog::{CharacterCatalog, GENRE_NOVEL, GENRE_STUDY};
use crate::core::progress::clamp_page;
use crate::core::store::BookStore;
use crate::services::dialogue::{DialogueGenerator, DialogueRequest};
use crate::{Error, Result};

/// Input to [`Library::add`].
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub genre: String,
    pub total_page: u32,
    /// Cover URI; synthesized from the title when `None`.
    pub cover_image: Option<String>,
    pub reason: String,
}

pub struct Library {
    catalog: CharacterCatalog,
    dialogue: DialogueGenerator,
    inner: Mutex<Inner>,
}

struct Inner {
    store: BookStore,
    /// Token of the most recently issued update per book id. A commit whose
    /// token is no longer the latest has been superseded.
    in_flight: HashMap<String, u64>,
    next_token: u64,
}

impl Library {
    /// Opens the shelf at `path`, seeding the sample books when no usable
    /// prior document exists.
    pub async fn open(
        path: impl Into<PathBuf>,
        catalog: CharacterCatalog,
        dialogue: DialogueGenerator,
    ) -> Self {
        let mut store = BookStore::new(path);
        if !store.load().await {
            info!("no prior shelf found, seeding sample books");
            store.set_books(sample_books(&catalog));
            store.save().await;
        }
        Self {
            catalog,
            dialogue,
            inner: Mutex::new(Inner {
                store,
                in_flight: HashMap::new(),
                next_token: 0,
            }),
        }
    }

    /// Snapshot of the whole shelf.
    pub async fn books(&self) -> Vec<Book> {
        self.inner.lock().await.store.books().to_vec()
    }

    pub async fn get(&self, book_id: &str) -> Option<Book> {
        self.inner.lock().await.store.get(book_id).cloned()
    }

    /// Creates a book: resolve the persona, generate the opening line, then
    /// append and persist. Validation happens before any side effect.
    pub async fn add(&self, new_book: NewBook) -> Result<Book> {
        if new_book.title.trim().is_empty() {
            return Err(Error::Validation("title must not be empty".to_string()));
        }
        if new_book.reason.trim().is_empty() {
            return Err(Error::Validation("reason must not be empty".to_string()));
        }
        if new_book.total_page < 1 {
            return Err(Error::Validation(
                "total pages must be at least 1".to_string(),
            ));
        }

        let character = self.catalog.resolve(&new_book.genre).clone();
        let latest_dialogue = self
            .dialogue
            .generate(&DialogueRequest {
                title: &new_book.title,
                total_page: new_book.total_page,
                current_page: 0,
                reason: &new_book.reason,
                character: &character,
            })
            .await;

        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let created_at = epoch_millis();
        let id = fresh_id(created_at, inner.store.books());
        let cover_image = new_book
            .cover_image
            .filter(|cover| !cover.is_empty())
            .unwrap_or_else(|| placeholder_cover(&new_book.title));
        let book = Book {
            id,
            title: new_book.title,
            genre: new_book.genre,
            total_page: new_book.total_page,
            current_page: 0,
            reason: new_book.reason,
            latest_dialogue,
            cover_image,
            character,
            created_at,
        };
        inner.store.books_mut().push(book.clone());
        inner.store.save().await;
        Ok(book)
    }

    /// Moves a book to `new_page` (clamped to `0..=total_page`) and replaces
    /// its dialogue; the two fields change together or not at all. Returns
    /// the record now stored for the id, which under overlapped updates is
    /// the last issued writer's.
    pub async fn update_progress(&self, book_id: &str, new_page: u32) -> Result<Book> {
        // Issue phase: look the book up and take an update token, then drop
        // the lock for the generation call.
        let (title, total_page, reason, character, token) = {
            let mut guard = self.inner.lock().await;
            let inner = &mut *guard;
            let book = inner
                .store
                .get(book_id)
                .ok_or_else(|| Error::NotFound(book_id.to_string()))?;
            let title = book.title.clone();
            let total_page = book.total_page;
            let reason = book.reason.clone();
            let character = book.character.clone();
            let token = inner.next_token;
            inner.next_token += 1;
            inner.in_flight.insert(book_id.to_string(), token);
            (title, total_page, reason, character, token)
        };

        let page = clamp_page(new_page, 0, total_page);
        let dialogue = self
            .dialogue
            .generate(&DialogueRequest {
                title: &title,
                total_page,
                current_page: page,
                reason: &reason,
                character: &character,
            })
            .await;

        // Commit phase: apply only if this is still the latest issued update.
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        if inner.in_flight.get(book_id) != Some(&token) {
            // Superseded by a later update, or deleted mid-flight.
            return inner
                .store
                .get(book_id)
                .cloned()
                .ok_or_else(|| Error::NotFound(book_id.to_string()));
        }
        inner.in_flight.remove(book_id);

        let updated = inner
            .store
            .books_mut()
            .iter_mut()
            .find(|book| book.id == book_id)
            .map(|book| {
                book.current_page = page;
                book.latest_dialogue = dialogue;
                book.clone()
            });
        match updated {
            Some(book) => {
                inner.store.save().await;
                Ok(book)
            }
            None => Err(Error::NotFound(book_id.to_string())),
        }
    }

    /// Removes a book and persists. Deleting an unknown id is a no-op.
    pub async fn delete(&self, book_id: &str) {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let before = inner.store.books().len();
        inner.store.books_mut().retain(|book| book.id != book_id);
        if inner.store.books().len() == before {
            return;
        }
        inner.in_flight.remove(book_id);
        inner.store.save().await;
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}

/// Epoch-millisecond id, bumped past any collision with an existing record.
fn fresh_id(now: u64, books: &[Book]) -> String {
    let mut candidate = now;
    loop {
        let id = candidate.to_string();
        if !books.iter().any(|book| book.id == id) {
            return id;
        }
        candidate += 1;
    }
}

/// The two starter records shown on a fresh shelf.
fn sample_books(catalog: &CharacterCatalog) -> Vec<Book> {
    let now = epoch_millis();
    vec![
        Book {
            id: "1".to_string(),
            title: "Next.jsとReactの教科書".to_string(),
            genre: GENRE_STUDY.to_string(),
            total_page: 350,
            current_page: 120,
            reason: "この技術をマスターして、ウェブ開発のプロになりたい！".to_string(),
            latest_dialogue: "進捗34%！目標達成のために、熱血パワーで進むぞ！".to_string(),
            cover_image: "https://placehold.co/150x200/505050/ffffff?text=Next.js+React"
                .to_string(),
            character: catalog.resolve(GENRE_STUDY).clone(),
            created_at: now,
        },
        Book {
            id: "2".to_string(),
            title: "海辺の静かな物語".to_string(),
            genre: GENRE_NOVEL.to_string(),
            total_page: 280,
            current_page: 50,
            reason: "忙しい日常から離れて、心が洗われるような感動を得たい。".to_string(),
            latest_dialogue: "🌸素敵な物語が、あなたを待っています...".to_string(),
            cover_image: "https://placehold.co/150x200/1e40af/ffffff?text=Novel".to_string(),
            character: catalog.resolve(GENRE_NOVEL).clone(),
            created_at: now,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::llm::LlmClient;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;
    use tokio::sync::Notify;

    #[derive(Debug)]
    struct EchoClient;

    /// Replies with the instruction itself, so tests can read the embedded
    /// progress back out of the stored dialogue.
    #[async_trait]
    impl LlmClient for EchoClient {
        async fn complete(&self, instruction: &str) -> anyhow::Result<String> {
            Ok(instruction.to_string())
        }
    }

    #[derive(Debug, Default)]
    struct FailingClient {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl LlmClient for FailingClient {
        async fn complete(&self, _instruction: &str) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(anyhow!("network down"))
        }
    }

    /// Blocks its first call until released; later calls answer immediately.
    /// Lets a test hold one update in flight while a second one overtakes it.
    #[derive(Debug, Default)]
    struct BlockFirstCallClient {
        calls: AtomicUsize,
        started: Notify,
        release: Notify,
    }

    #[async_trait]
    impl LlmClient for Arc<BlockFirstCallClient> {
        async fn complete(&self, _instruction: &str) -> anyhow::Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                self.started.notify_one();
                self.release.notified().await;
            }
            Ok(format!("reply {call}"))
        }
    }

    async fn open_library(path: &Path, client: Option<Box<dyn LlmClient>>) -> Library {
        Library::open(
            path,
            CharacterCatalog::builtin(),
            DialogueGenerator::new(client),
        )
        .await
    }

    fn new_book() -> NewBook {
        NewBook {
            title: "X".to_string(),
            genre: "novel".to_string(),
            total_page: 100,
            cover_image: None,
            reason: "because".to_string(),
        }
    }

    #[tokio::test]
    async fn test_first_open_seeds_and_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("books.json");

        let library = open_library(&path, None).await;
        let books = library.books().await;
        assert_eq!(books.len(), 2);
        assert!(path.exists());

        // Deleting one and reopening must load, not reseed.
        library.delete("1").await;
        drop(library);
        let reopened = open_library(&path, None).await;
        assert_eq!(reopened.books().await.len(), 1);
    }

    #[tokio::test]
    async fn test_add_assigns_persona_and_initial_state() {
        let dir = tempdir().unwrap();
        let library = open_library(&dir.path().join("books.json"), None).await;

        let book = library.add(new_book()).await.unwrap();
        assert_eq!(book.current_page, 0);
        assert_eq!(book.character.kind, "ロマンチスト");
        assert!(!book.latest_dialogue.is_empty());
        assert!(!book.id.is_empty());
        assert!(book.cover_image.starts_with("https://placehold.co/"));
        assert_eq!(library.get(&book.id).await.unwrap(), book);
    }

    #[tokio::test]
    async fn test_add_keeps_supplied_cover() {
        let dir = tempdir().unwrap();
        let library = open_library(&dir.path().join("books.json"), None).await;

        let mut request = new_book();
        request.cover_image = Some("https://example.com/x.png".to_string());
        let book = library.add(request).await.unwrap();
        assert_eq!(book.cover_image, "https://example.com/x.png");
    }

    #[tokio::test]
    async fn test_add_rejects_invalid_input_without_side_effects() {
        let dir = tempdir().unwrap();
        let library = open_library(&dir.path().join("books.json"), None).await;
        let before = library.books().await;

        let mut request = new_book();
        request.title = "   ".to_string();
        assert!(matches!(
            library.add(request).await,
            Err(Error::Validation(_))
        ));

        let mut request = new_book();
        request.reason = String::new();
        assert!(matches!(
            library.add(request).await,
            Err(Error::Validation(_))
        ));

        let mut request = new_book();
        request.total_page = 0;
        assert!(matches!(
            library.add(request).await,
            Err(Error::Validation(_))
        ));

        assert_eq!(library.books().await, before);
    }

    #[tokio::test]
    async fn test_add_unknown_genre_falls_back_to_friendly() {
        let dir = tempdir().unwrap();
        let library = open_library(&dir.path().join("books.json"), None).await;

        let mut request = new_book();
        request.genre = "cookbook".to_string();
        let book = library.add(request).await.unwrap();
        assert_eq!(book.character.kind, "フレンドリー");
        assert_eq!(book.character.emoji, "😊");
    }

    #[tokio::test]
    async fn test_update_clamps_to_total_page() {
        let dir = tempdir().unwrap();
        let library = open_library(&dir.path().join("books.json"), None).await;

        let mut request = new_book();
        request.total_page = 200;
        let book = library.add(request).await.unwrap();

        let updated = library.update_progress(&book.id, 250).await.unwrap();
        assert_eq!(updated.current_page, 200);
        assert!(updated.is_completed());
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_not_found() {
        let dir = tempdir().unwrap();
        let library = open_library(&dir.path().join("books.json"), None).await;
        let before = library.books().await;

        let result = library.update_progress("nope", 10).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(library.books().await, before);
    }

    #[tokio::test]
    async fn test_update_commits_page_and_dialogue_as_a_pair() {
        let dir = tempdir().unwrap();
        let library = open_library(&dir.path().join("books.json"), Some(Box::new(EchoClient))).await;

        let book = library.add(new_book()).await.unwrap();
        let updated = library.update_progress(&book.id, 50).await.unwrap();
        assert_eq!(updated.current_page, 50);
        // The echoed instruction carries the progress the dialogue was
        // generated for; it must match the committed page.
        assert!(updated.latest_dialogue.contains("50%"));

        let stored = library.get(&book.id).await.unwrap();
        assert_eq!(stored.current_page, updated.current_page);
        assert_eq!(stored.latest_dialogue, updated.latest_dialogue);
    }

    #[tokio::test]
    async fn test_operations_survive_failing_client() {
        let dir = tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let client = FailingClient {
            calls: calls.clone(),
        };
        let library = open_library(&dir.path().join("books.json"), Some(Box::new(client))).await;

        let book = library.add(new_book()).await.unwrap();
        assert!(!book.latest_dialogue.is_empty());

        let updated = library.update_progress(&book.id, 30).await.unwrap();
        assert_eq!(updated.current_page, 30);
        assert!(!updated.latest_dialogue.is_empty());
        assert!(calls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_overlapped_updates_resolve_to_last_writer() {
        let dir = tempdir().unwrap();
        let gate = Arc::new(BlockFirstCallClient::default());
        let library = Arc::new(
            open_library(&dir.path().join("books.json"), Some(Box::new(gate.clone()))).await,
        );

        // Sample book "1" has 350 pages.
        let first = tokio::spawn({
            let library = library.clone();
            async move { library.update_progress("1", 130).await }
        });
        gate.started.notified().await;

        // While the first update's generation call is blocked, a later
        // update commits.
        let second = library.update_progress("1", 140).await.unwrap();
        assert_eq!(second.current_page, 140);
        assert_eq!(second.latest_dialogue, "reply 1");

        gate.release.notify_one();
        let first = first.await.unwrap().unwrap();
        // The superseded update returns the record the last writer left.
        assert_eq!(first.current_page, 140);
        assert_eq!(first.latest_dialogue, "reply 1");

        let stored = library.get("1").await.unwrap();
        assert_eq!(stored.current_page, 140);
        assert_eq!(stored.latest_dialogue, "reply 1");
    }

    #[tokio::test]
    async fn test_delete_mid_flight_update_is_not_found() {
        let dir = tempdir().unwrap();
        let gate = Arc::new(BlockFirstCallClient::default());
        let library = Arc::new(
            open_library(&dir.path().join("books.json"), Some(Box::new(gate.clone()))).await,
        );

        let update = tokio::spawn({
            let library = library.clone();
            async move { library.update_progress("1", 130).await }
        });
        gate.started.notified().await;

        library.delete("1").await;
        gate.release.notify_one();

        let result = update.await.unwrap();
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert!(library.get("1").await.is_none());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let library = open_library(&dir.path().join("books.json"), None).await;

        library.delete("1").await;
        let after_first = library.books().await;
        assert_eq!(after_first.len(), 1);

        library.delete("1").await;
        assert_eq!(library.books().await, after_first);
    }

    #[tokio::test]
    async fn test_shelf_round_trips_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("books.json");

        let library = open_library(&path, None).await;
        let book = library.add(new_book()).await.unwrap();
        drop(library);

        let reopened = open_library(&path, None).await;
        assert_eq!(reopened.get(&book.id).await.unwrap(), book);
    }
}
