//! Durable storage for the shelf: one JSON document holding every book.
//!
//! The store owns the in-memory collection; only the operations layer
//! mutates it. Reads repair invariant violations instead of rejecting the
//! whole document, and writes go through a temp file plus rename so a failed
//! save never leaves a truncated document where a valid one used to be.

use std::io::ErrorKind;
use std::path::PathBuf;

use log::warn;
use tokio::fs;

use crate::core::book::Book;
use crate::Result;

pub struct BookStore {
    path: PathBuf,
    books: Vec<Book>,
}

impl BookStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            books: Vec::new(),
        }
    }

    /// Reads the persisted collection into memory. Returns `false` when no
    /// usable prior document exists (missing or unparseable file); the
    /// caller seeds fresh data in that case.
    pub async fn load(&mut self) -> bool {
        match self.try_load().await {
            Ok(Some(books)) => {
                self.books = books;
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!("discarding unreadable shelf document {:?}: {e}", self.path);
                false
            }
        }
    }

    pub(crate) async fn try_load(&self) -> Result<Option<Vec<Book>>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut books: Vec<Book> = serde_json::from_str(&content)?;
        for book in &mut books {
            book.repair();
        }
        Ok(Some(books))
    }

    /// Best-effort write of the whole collection. Failures are logged and
    /// the in-memory state stays authoritative until a later save succeeds.
    pub async fn save(&self) {
        if let Err(e) = self.try_save().await {
            warn!("failed to persist shelf to {:?}: {e}", self.path);
        }
    }

    pub(crate) async fn try_save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let temp_path = self.path.with_extension("json.tmp");
        let content = serde_json::to_vec_pretty(&self.books)?;
        fs::write(&temp_path, content).await?;
        fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn get(&self, id: &str) -> Option<&Book> {
        self.books.iter().find(|book| book.id == id)
    }

    pub(crate) fn books_mut(&mut self) -> &mut Vec<Book> {
        &mut self.books
    }

    pub(crate) fn set_books(&mut self, books: Vec<Book>) {
        self.books = books;
    }
}
