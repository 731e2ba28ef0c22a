// book catalog

pub mod auth;
pub mod books;
pub mod config;
pub mod error;
pub mod routes;
pub mod sql;
pub mod store;
pub mod types;

use axum::{extract::{FromRef, Request}, Router};
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use auth::AuthService;
use books::BookService;
use config::Config;

#[derive(Clone, FromRef)]
pub struct AppState {
	pub auth: AuthService,
	pub books: BookService,
}

impl AppState {
	pub fn new(db: SqlitePool, config: &Config) -> Self {
		AppState{
			auth: AuthService::new(db.clone(), &config.token_secret, config.bcrypt_cost),
			books: BookService::new(db),
		}
	}
}

pub fn app(state: AppState) -> Router {
	routes::routes()
		.layer(TraceLayer::new_for_http().make_span_with(|req: &Request| {
			tracing::info_span!(
				"request",
				id = %Uuid::new_v4(),
				method = %req.method(),
				path = %req.uri().path(),
			)
		}))
		.with_state(state)
}
