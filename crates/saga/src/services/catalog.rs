//! Catalog RPC client trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::BookId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by the remote catalog service.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The book does not exist on the catalog side.
    #[error("Book not found with ID: {0}")]
    NotFound(BookId),

    /// The catalog rejected the call for a business reason
    /// (e.g. no available copies).
    #[error("Book not available: {0}")]
    Unavailable(String),

    /// The call did not reach the catalog, or failed in transit.
    /// Transient; eligible for bounded retry.
    #[error("Catalog transport error: {0}")]
    Transport(String),
}

/// Availability snapshot returned by the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSummary {
    pub id: BookId,
    pub title: String,
    pub isbn: String,
    pub total_copies: u32,
    pub available_copies: u32,
}

/// Synchronous request/response interface to the remote catalog service.
///
/// `borrow_book` and `return_book` adjust the available-copy count
/// atomically on the catalog side; that decrement is the authoritative
/// gate for concurrent reservations, not `check_availability`.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Reads the current availability of a book.
    async fn check_availability(&self, book_id: BookId) -> Result<BookSummary, CatalogError>;

    /// Decrements the book's available copies by one.
    async fn borrow_book(&self, book_id: BookId) -> Result<(), CatalogError>;

    /// Increments the book's available copies by one.
    async fn return_book(&self, book_id: BookId) -> Result<(), CatalogError>;
}

#[derive(Debug, Clone)]
struct BookRecord {
    title: String,
    isbn: String,
    total_copies: u32,
    available_copies: u32,
}

#[derive(Debug, Default)]
struct CatalogState {
    books: HashMap<BookId, BookRecord>,
    fail_on_borrow: bool,
    fail_on_return: bool,
    borrow_transport_failures: u32,
    return_transport_failures: u32,
}

/// In-memory catalog for testing.
///
/// Check-and-decrement happens under one write lock, mirroring the real
/// catalog's atomic copy-count update.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalogService {
    state: Arc<RwLock<CatalogState>>,
}

impl InMemoryCatalogService {
    /// Creates a new empty in-memory catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a book with the given number of copies, all available.
    pub fn add_book(&self, book_id: BookId, title: &str, isbn: &str, copies: u32) {
        self.state.write().unwrap().books.insert(
            book_id,
            BookRecord {
                title: title.to_string(),
                isbn: isbn.to_string(),
                total_copies: copies,
                available_copies: copies,
            },
        );
    }

    /// Configures borrow calls to fail with a business error.
    pub fn set_fail_on_borrow(&self, fail: bool) {
        self.state.write().unwrap().fail_on_borrow = fail;
    }

    /// Configures return calls to fail with a business error.
    pub fn set_fail_on_return(&self, fail: bool) {
        self.state.write().unwrap().fail_on_return = fail;
    }

    /// Makes the next `count` borrow calls fail with a transport error.
    pub fn set_borrow_transport_failures(&self, count: u32) {
        self.state.write().unwrap().borrow_transport_failures = count;
    }

    /// Makes the next `count` return calls fail with a transport error.
    pub fn set_return_transport_failures(&self, count: u32) {
        self.state.write().unwrap().return_transport_failures = count;
    }

    /// Returns the available-copy count for a book.
    pub fn available_copies(&self, book_id: BookId) -> Option<u32> {
        self.state
            .read()
            .unwrap()
            .books
            .get(&book_id)
            .map(|b| b.available_copies)
    }
}

#[async_trait]
impl CatalogClient for InMemoryCatalogService {
    async fn check_availability(&self, book_id: BookId) -> Result<BookSummary, CatalogError> {
        let state = self.state.read().unwrap();
        let book = state
            .books
            .get(&book_id)
            .ok_or(CatalogError::NotFound(book_id))?;
        Ok(BookSummary {
            id: book_id,
            title: book.title.clone(),
            isbn: book.isbn.clone(),
            total_copies: book.total_copies,
            available_copies: book.available_copies,
        })
    }

    async fn borrow_book(&self, book_id: BookId) -> Result<(), CatalogError> {
        let mut state = self.state.write().unwrap();

        if state.borrow_transport_failures > 0 {
            state.borrow_transport_failures -= 1;
            return Err(CatalogError::Transport("connection refused".to_string()));
        }
        if state.fail_on_borrow {
            return Err(CatalogError::Unavailable("borrow rejected".to_string()));
        }

        let book = state
            .books
            .get_mut(&book_id)
            .ok_or(CatalogError::NotFound(book_id))?;
        if book.available_copies == 0 {
            return Err(CatalogError::Unavailable(
                "no available copies".to_string(),
            ));
        }
        book.available_copies -= 1;
        Ok(())
    }

    async fn return_book(&self, book_id: BookId) -> Result<(), CatalogError> {
        let mut state = self.state.write().unwrap();

        if state.return_transport_failures > 0 {
            state.return_transport_failures -= 1;
            return Err(CatalogError::Transport("connection refused".to_string()));
        }
        if state.fail_on_return {
            return Err(CatalogError::Unavailable("return rejected".to_string()));
        }

        let book = state
            .books
            .get_mut(&book_id)
            .ok_or(CatalogError::NotFound(book_id))?;
        book.available_copies = (book.available_copies + 1).min(book.total_copies);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_borrow_decrements_and_return_increments() {
        let catalog = InMemoryCatalogService::new();
        let book = BookId::new(1);
        catalog.add_book(book, "Dune", "978-0441172719", 3);

        catalog.borrow_book(book).await.unwrap();
        assert_eq!(catalog.available_copies(book), Some(2));

        catalog.return_book(book).await.unwrap();
        assert_eq!(catalog.available_copies(book), Some(3));
    }

    #[tokio::test]
    async fn test_return_never_exceeds_total_copies() {
        let catalog = InMemoryCatalogService::new();
        let book = BookId::new(1);
        catalog.add_book(book, "Dune", "978-0441172719", 1);

        catalog.return_book(book).await.unwrap();
        assert_eq!(catalog.available_copies(book), Some(1));
    }

    #[tokio::test]
    async fn test_borrow_exhausted_copies_is_unavailable() {
        let catalog = InMemoryCatalogService::new();
        let book = BookId::new(1);
        catalog.add_book(book, "Dune", "978-0441172719", 1);

        catalog.borrow_book(book).await.unwrap();
        let err = catalog.borrow_book(book).await.unwrap_err();
        assert!(matches!(err, CatalogError::Unavailable(_)));
        assert_eq!(catalog.available_copies(book), Some(0));
    }

    #[tokio::test]
    async fn test_unknown_book_is_not_found() {
        let catalog = InMemoryCatalogService::new();
        let err = catalog.borrow_book(BookId::new(404)).await.unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(_)));
        let err = catalog
            .check_availability(BookId::new(404))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_transport_failures_are_consumed() {
        let catalog = InMemoryCatalogService::new();
        let book = BookId::new(1);
        catalog.add_book(book, "Dune", "978-0441172719", 2);
        catalog.set_borrow_transport_failures(2);

        assert!(matches!(
            catalog.borrow_book(book).await.unwrap_err(),
            CatalogError::Transport(_)
        ));
        assert!(matches!(
            catalog.borrow_book(book).await.unwrap_err(),
            CatalogError::Transport(_)
        ));
        catalog.borrow_book(book).await.unwrap();
        assert_eq!(catalog.available_copies(book), Some(1));
    }
}
