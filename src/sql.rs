use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

pub const TABLE_SCHEMA: &[&str] = &[
r#"
CREATE TABLE IF NOT EXISTS users (
	id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
	username TEXT NOT NULL CHECK(length(username) BETWEEN 1 AND 50),
	username_key TEXT NOT NULL,
	password_hash TEXT NOT NULL
)"#,
r#"
CREATE UNIQUE INDEX IF NOT EXISTS users_username_key
	ON users (username_key)"#,
r#"
CREATE TABLE IF NOT EXISTS books (
	id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
	title TEXT NOT NULL CHECK(length(title) BETWEEN 1 AND 200),
	title_key TEXT NOT NULL,
	publication_year INTEGER NOT NULL,
	author_name TEXT NOT NULL CHECK(length(author_name) BETWEEN 1 AND 100),
	views_count INTEGER NOT NULL DEFAULT 0 CHECK(views_count >= 0),
	is_deleted BOOL NOT NULL DEFAULT false,
	created_at DATETIME NOT NULL,
	updated_at DATETIME DEFAULT NULL
)"#,
// only live rows compete for a title
r#"
CREATE UNIQUE INDEX IF NOT EXISTS books_title_live
	ON books (title_key)
	WHERE is_deleted = 0"#,
r#"
CREATE INDEX IF NOT EXISTS books_views_live
	ON books (views_count DESC, id)
	WHERE is_deleted = 0"#,
];

pub async fn open(url: &str) -> Result<SqlitePool, sqlx::Error> {
	let options = SqliteConnectOptions::from_str(url)?
		.create_if_missing(true);

	SqlitePoolOptions::new()
		.max_connections(5)
		.acquire_timeout(Duration::from_secs(3))
		.connect_with(options).await
}

/// Every connection to `sqlite::memory:` is its own database, so the pool
/// keeps exactly one connection open for as long as it lives.
pub async fn open_memory() -> Result<SqlitePool, sqlx::Error> {
	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.min_connections(1)
		.idle_timeout(None)
		.max_lifetime(None)
		.connect("sqlite::memory:").await?;
	schema(&pool).await?;
	Ok(pool)
}

pub async fn schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
	for statement in TABLE_SCHEMA {
		sqlx::query(statement).execute(pool).await?;
	}
	Ok(())
}

/// Unicode lowercase key stored next to titles and usernames; the unique
/// indexes are on the key, not the value.
pub fn fold_key(value: &str) -> String {
	value.to_lowercase()
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
	match err {
		sqlx::Error::Database(db) => db.is_unique_violation(),
		_ => false,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn schema_is_idempotent() {
		let pool = open_memory().await.unwrap();
		schema(&pool).await.unwrap();

		let tables: Vec<(String,)> = sqlx::query_as(
			"SELECT name FROM sqlite_master WHERE type = 'table' AND name IN ('users', 'books') ORDER BY name"
		).fetch_all(&pool).await.unwrap();
		let names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();
		assert_eq!(names, ["books", "users"]);
	}

	#[tokio::test]
	async fn live_title_index_ignores_deleted_rows() {
		let pool = open_memory().await.unwrap();
		let insert = "INSERT INTO books (title, title_key, publication_year, author_name, is_deleted, created_at) \
			VALUES (?, ?, 1965, 'Frank Herbert', ?, CURRENT_TIMESTAMP)";

		for (title, deleted) in [("Dune", true), ("Dune", false)] {
			sqlx::query(insert).bind(title).bind(fold_key(title)).bind(deleted)
				.execute(&pool).await.unwrap();
		}

		let err = sqlx::query(insert).bind("DUNE").bind(fold_key("DUNE")).bind(false)
			.execute(&pool).await.unwrap_err();
		assert!(is_unique_violation(&err));
	}

	#[test]
	fn fold_key_handles_non_ascii() {
		assert_eq!(fold_key("ВОЙНА И МИР"), fold_key("Война и мир"));
		assert_eq!(fold_key("Ärger"), "ärger");
	}
}
