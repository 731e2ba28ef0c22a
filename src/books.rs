use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::AppError;
use crate::sql;
use crate::store::BookStore;
use crate::types::{Bid, Book, BookForm, BookListItem, BookView, PageParams, AUTHOR_MAX_LEN, TITLE_MAX_LEN};

#[derive(Debug, Clone)]
pub struct BookService {
	store: BookStore,
}

impl BookService {
	pub fn new(db: SqlitePool) -> Self {
		BookService{ store: BookStore::new(db) }
	}

	/// Offset pagination, page numbers start at 1. Out of range values are
	/// passed through to the store untouched.
	pub async fn list(&self, params: PageParams) -> Result<Vec<BookListItem>, AppError> {
		let offset = params.page.saturating_sub(1).saturating_mul(params.page_size);
		let books = self.store.list(offset, params.page_size).await?;
		Ok(books.iter().map(Book::list_item).collect())
	}

	/// Counts as a view: the returned count and score are post-increment.
	pub async fn get(&self, bid: Bid) -> Result<BookView, AppError> {
		let book = self.store.increment_views(bid).await?
			.ok_or(AppError::NotFound)?;
		Ok(book.view())
	}

	pub async fn exists(&self, title: &str) -> Result<bool, AppError> {
		Ok(self.store.exists(title).await?)
	}

	pub async fn create(&self, form: BookForm) -> Result<BookView, AppError> {
		validate(&form)?;
		if self.exists(&form.title).await? {
			tracing::debug!(title = %form.title, "create rejected, title taken");
			return Err(title_taken(&form.title));
		}

		let book = self.store.insert(&form, Utc::now()).await
			.map_err(|e| conflict_or(e, &form.title))?;
		tracing::info!(bid = book.bid, title = %book.title, "book created");
		Ok(book.view())
	}

	/// All-or-nothing against stored titles: every title is checked before
	/// anything is written.
	pub async fn create_bulk(&self, forms: Vec<BookForm>) -> Result<Vec<BookView>, AppError> {
		for form in &forms {
			validate(form)?;
		}
		for form in &forms {
			if self.exists(&form.title).await? {
				tracing::debug!(title = %form.title, "bulk create rejected, title taken");
				return Err(title_taken(&form.title));
			}
		}
		if forms.is_empty() {
			return Ok(Vec::new());
		}

		// titles repeated inside the batch are left to the unique index,
		// which rolls back the whole transaction
		let books = self.store.insert_many(&forms, Utc::now()).await
			.map_err(|e| if sql::is_unique_violation(&e) {
				AppError::Conflict("A book in the batch duplicates another title".to_string())
			} else {
				AppError::from(e)
			})?;
		tracing::info!(count = books.len(), "books created");
		Ok(books.iter().map(Book::view).collect())
	}

	pub async fn update(&self, bid: Bid, form: BookForm) -> Result<(), AppError> {
		validate(&form)?;
		let current = self.store.find(bid).await?
			.ok_or(AppError::NotFound)?;

		if current.title != form.title && self.store.exists_other(&form.title, bid).await? {
			tracing::debug!(bid, title = %form.title, "update rejected, title taken");
			return Err(title_taken(&form.title));
		}

		let changed = self.store.update(bid, &form, Utc::now()).await
			.map_err(|e| conflict_or(e, &form.title))?;
		// deleted between the lookup and the write
		if !changed {
			return Err(AppError::NotFound);
		}
		tracing::info!(bid, "book updated");
		Ok(())
	}

	pub async fn delete(&self, bid: Bid) -> Result<(), AppError> {
		if !self.store.soft_delete(bid, Utc::now()).await? {
			return Err(AppError::NotFound);
		}
		tracing::info!(bid, "book deleted");
		Ok(())
	}

	/// Unknown or already deleted ids are skipped silently.
	pub async fn delete_bulk(&self, bids: &[Bid]) -> Result<(), AppError> {
		let deleted = self.store.soft_delete_many(bids, Utc::now()).await?;
		tracing::info!(requested = bids.len(), deleted, "books deleted");
		Ok(())
	}
}

fn validate(form: &BookForm) -> Result<(), AppError> {
	if form.title.is_empty() || form.author_name.is_empty() {
		return Err(AppError::Validation("Title and author name are required".to_string()));
	}
	if form.title.chars().count() > TITLE_MAX_LEN {
		return Err(AppError::Validation(format!("Title must be at most {TITLE_MAX_LEN} characters long")));
	}
	if form.author_name.chars().count() > AUTHOR_MAX_LEN {
		return Err(AppError::Validation(format!("Author name must be at most {AUTHOR_MAX_LEN} characters long")));
	}
	Ok(())
}

fn title_taken(title: &str) -> AppError {
	AppError::Conflict(format!("A book with title '{title}' already exists"))
}

fn conflict_or(err: sqlx::Error, title: &str) -> AppError {
	if sql::is_unique_violation(&err) {
		title_taken(title)
	} else {
		AppError::from(err)
	}
}
