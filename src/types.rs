use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

pub type Bid = i64;
pub type Uid = i64;

pub const TITLE_MAX_LEN: usize = 200;
pub const AUTHOR_MAX_LEN: usize = 100;
pub const USERNAME_MAX_LEN: usize = 50;
pub const PASSWORD_MIN_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookState {
	Active,
	Deleted,
}

impl BookState {
	pub fn from_flag(is_deleted: bool) -> Self {
		if is_deleted {
			BookState::Deleted
		} else {
			BookState::Active
		}
	}
	pub fn is_active(self) -> bool {
		matches!(self, BookState::Active)
	}
}

/// Row as stored in `books`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BookQuery {
	pub id: Bid,
	pub title: String,
	pub publication_year: i32,
	pub author_name: String,
	pub views_count: i64,
	pub is_deleted: bool,
	pub created_at: DateTime<Utc>,
	pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Book {
	pub bid: Bid,
	pub title: String,
	pub publication_year: i32,
	pub author_name: String,
	pub views_count: i64,
	pub state: BookState,
	pub created_at: DateTime<Utc>,
	pub updated_at: Option<DateTime<Utc>>,
}

impl Book {
	pub fn from_query(info: BookQuery) -> Self {
		Book{
			bid: info.id,
			title: info.title,
			publication_year: info.publication_year,
			author_name: info.author_name,
			views_count: info.views_count,
			state: BookState::from_flag(info.is_deleted),
			created_at: info.created_at,
			updated_at: info.updated_at,
		}
	}

	/// Score against the current UTC year; drifts as calendar years pass.
	pub fn popularity_score(&self) -> f64 {
		popularity_score(self.views_count, self.publication_year, Utc::now().year())
	}

	pub fn view(&self) -> BookView {
		BookView{
			id: self.bid,
			title: self.title.clone(),
			publication_year: self.publication_year,
			author_name: self.author_name.clone(),
			views_count: self.views_count,
			popularity_score: self.popularity_score(),
		}
	}

	pub fn list_item(&self) -> BookListItem {
		BookListItem{
			id: self.bid,
			title: self.title.clone(),
			views_count: self.views_count,
		}
	}
}

pub fn popularity_score(views_count: i64, publication_year: i32, current_year: i32) -> f64 {
	let age = i64::from(current_year) - i64::from(publication_year);
	views_count as f64 * 0.5 + (age * 2) as f64
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Account {
	#[sqlx(rename = "id")]
	pub uid: Uid,
	pub username: String,
	#[sqlx(rename = "password_hash")]
	pub pass_hash: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookForm {
	pub title: String,
	pub publication_year: i32,
	pub author_name: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageParams {
	#[serde(default = "default_page")]
	pub page: i64,
	#[serde(default = "default_page_size")]
	pub page_size: i64,
}

fn default_page() -> i64 { 1 }
fn default_page_size() -> i64 { 10 }

impl Default for PageParams {
	fn default() -> Self {
		PageParams{ page: default_page(), page_size: default_page_size() }
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookListItem {
	pub id: Bid,
	pub title: String,
	pub views_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookView {
	pub id: Bid,
	pub title: String,
	pub publication_year: i32,
	pub author_name: String,
	pub views_count: i64,
	pub popularity_score: f64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Credentials {
	#[serde(default)]
	pub username: String,
	#[serde(default)]
	pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
	pub token: String,
	pub username: String,
}
