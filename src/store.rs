use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::sql;
use crate::types::{Account, Bid, Book, BookForm, BookQuery};

// Every read goes through `is_deleted = 0`; deleted rows stay on disk but are
// invisible to the rest of the crate.

#[derive(Debug, Clone)]
pub struct BookStore {
	db: SqlitePool,
}

impl BookStore {
	pub fn new(db: SqlitePool) -> Self {
		BookStore{ db }
	}

	/// Live books by descending view count; ties keep insertion order.
	pub async fn list(&self, offset: i64, limit: i64) -> Result<Vec<Book>, sqlx::Error> {
		let rows = sqlx::query_as::<_, BookQuery>(r#"
SELECT id, title, publication_year, author_name, views_count, is_deleted, created_at, updated_at
FROM books
WHERE is_deleted = 0
ORDER BY views_count DESC, id ASC
LIMIT ? OFFSET ?
		"#)
			.bind(limit)
			.bind(offset)
			.fetch_all(&self.db).await?;

		Ok(rows.into_iter().map(Book::from_query).collect())
	}

	pub async fn find(&self, bid: Bid) -> Result<Option<Book>, sqlx::Error> {
		let row = sqlx::query_as::<_, BookQuery>(r#"
SELECT id, title, publication_year, author_name, views_count, is_deleted, created_at, updated_at
FROM books
WHERE id = ? AND is_deleted = 0
		"#)
			.bind(bid)
			.fetch_optional(&self.db).await?;

		Ok(row.map(Book::from_query))
	}

	pub async fn exists(&self, title: &str) -> Result<bool, sqlx::Error> {
		sqlx::query_scalar::<_, bool>(
			"SELECT EXISTS(SELECT 1 FROM books WHERE title_key = ? AND is_deleted = 0)"
		)
			.bind(sql::fold_key(title))
			.fetch_one(&self.db).await
	}

	/// Like `exists`, but a match on `except` itself does not count.
	pub async fn exists_other(&self, title: &str, except: Bid) -> Result<bool, sqlx::Error> {
		sqlx::query_scalar::<_, bool>(
			"SELECT EXISTS(SELECT 1 FROM books WHERE title_key = ? AND is_deleted = 0 AND id != ?)"
		)
			.bind(sql::fold_key(title))
			.bind(except)
			.fetch_one(&self.db).await
	}

	pub async fn insert(&self, form: &BookForm, now: DateTime<Utc>) -> Result<Book, sqlx::Error> {
		let row = sqlx::query_as::<_, BookQuery>(INSERT_BOOK)
			.bind(&form.title)
			.bind(sql::fold_key(&form.title))
			.bind(form.publication_year)
			.bind(&form.author_name)
			.bind(now)
			.fetch_one(&self.db).await?;

		Ok(Book::from_query(row))
	}

	/// Inserts all rows in one transaction; any failure leaves nothing behind.
	pub async fn insert_many(&self, forms: &[BookForm], now: DateTime<Utc>) -> Result<Vec<Book>, sqlx::Error> {
		let mut tx = self.db.begin().await?;
		let mut books = Vec::with_capacity(forms.len());
		for form in forms {
			let row = sqlx::query_as::<_, BookQuery>(INSERT_BOOK)
				.bind(&form.title)
				.bind(sql::fold_key(&form.title))
				.bind(form.publication_year)
				.bind(&form.author_name)
				.bind(now)
				.fetch_one(&mut *tx).await?;
			books.push(Book::from_query(row));
		}
		tx.commit().await?;
		Ok(books)
	}

	// on Ok returns whether a live row was changed
	pub async fn update(&self, bid: Bid, form: &BookForm, now: DateTime<Utc>) -> Result<bool, sqlx::Error> {
		let done = sqlx::query(r#"
UPDATE books SET
	title = ?, title_key = ?, publication_year = ?, author_name = ?, updated_at = ?
WHERE
	id = ? AND is_deleted = 0
		"#)
			.bind(&form.title)
			.bind(sql::fold_key(&form.title))
			.bind(form.publication_year)
			.bind(&form.author_name)
			.bind(now)
			.bind(bid)
			.execute(&self.db).await?;

		Ok(done.rows_affected() == 1)
	}

	pub async fn soft_delete(&self, bid: Bid, now: DateTime<Utc>) -> Result<bool, sqlx::Error> {
		let done = sqlx::query("UPDATE books SET is_deleted = true, updated_at = ? WHERE id = ? AND is_deleted = 0")
			.bind(now)
			.bind(bid)
			.execute(&self.db).await?;

		Ok(done.rows_affected() == 1)
	}

	// on Ok returns number of rows deleted
	pub async fn soft_delete_many(&self, bids: &[Bid], now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
		if bids.is_empty() {
			return Ok(0);
		}

		let mut query = QueryBuilder::<Sqlite>::new("UPDATE books SET is_deleted = true, updated_at = ");
		query.push_bind(now);
		query.push(" WHERE is_deleted = 0 AND id IN (");
		let mut ids = query.separated(", ");
		for bid in bids {
			ids.push_bind(*bid);
		}
		ids.push_unseparated(")");

		let done = query.build().execute(&self.db).await?;
		Ok(done.rows_affected())
	}

	/// Atomically bumps the view count and returns the updated row.
	/// `updated_at` is left alone; only edits and deletes touch it.
	pub async fn increment_views(&self, bid: Bid) -> Result<Option<Book>, sqlx::Error> {
		let row = sqlx::query_as::<_, BookQuery>(r#"
UPDATE books SET
	views_count = views_count + 1
WHERE
	id = ? AND is_deleted = 0
RETURNING id, title, publication_year, author_name, views_count, is_deleted, created_at, updated_at
		"#)
			.bind(bid)
			.fetch_optional(&self.db).await?;

		Ok(row.map(Book::from_query))
	}
}

const INSERT_BOOK: &str = r#"
INSERT INTO books
	(title, title_key, publication_year, author_name, views_count, is_deleted, created_at)
VALUES
	(?, ?, ?, ?, 0, false, ?)
RETURNING id, title, publication_year, author_name, views_count, is_deleted, created_at, updated_at
"#;

#[derive(Debug, Clone)]
pub struct UserStore {
	db: SqlitePool,
}

impl UserStore {
	pub fn new(db: SqlitePool) -> Self {
		UserStore{ db }
	}

	pub async fn find_by_username(&self, username: &str) -> Result<Option<Account>, sqlx::Error> {
		sqlx::query_as::<_, Account>(
			"SELECT id, username, password_hash FROM users WHERE username_key = ?"
		)
			.bind(sql::fold_key(username))
			.fetch_optional(&self.db).await
	}

	pub async fn exists(&self, username: &str) -> Result<bool, sqlx::Error> {
		sqlx::query_scalar::<_, bool>(
			"SELECT EXISTS(SELECT 1 FROM users WHERE username_key = ?)"
		)
			.bind(sql::fold_key(username))
			.fetch_one(&self.db).await
	}

	pub async fn insert(&self, username: &str, pass_hash: &str) -> Result<Account, sqlx::Error> {
		sqlx::query_as::<_, Account>(r#"
INSERT INTO users
	(username, username_key, password_hash)
VALUES
	(?, ?, ?)
RETURNING id, username, password_hash
		"#)
			.bind(username)
			.bind(sql::fold_key(username))
			.bind(pass_hash)
			.fetch_one(&self.db).await
	}
}
