use axum::{
	extract::rejection::{JsonRejection, PathRejection, QueryRejection},
	http::StatusCode,
	response::{IntoResponse, Response},
	Json,
};
use serde::Serialize;
use thiserror::Error;

pub const INTERNAL_MESSAGE: &str = "An internal error occurred";

#[derive(Debug, Error)]
pub enum AppError {
	#[error("{0}")]
	Validation(String),

	#[error("{0}")]
	Conflict(String),

	#[error("{0}")]
	Auth(String),

	#[error("not found")]
	NotFound,

	#[error("configuration error: {0}")]
	Config(String),

	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),

	#[error("password hashing error: {0}")]
	Hash(#[from] bcrypt::BcryptError),

	#[error("token error: {0}")]
	Token(#[from] jsonwebtoken::errors::Error),

	#[error("background task failed: {0}")]
	Task(#[from] tokio::task::JoinError),
}

impl AppError {
	pub fn status(&self) -> StatusCode {
		match self {
			AppError::Validation(_) => StatusCode::BAD_REQUEST,
			AppError::Conflict(_) => StatusCode::CONFLICT,
			AppError::Auth(_) => StatusCode::UNAUTHORIZED,
			AppError::NotFound => StatusCode::NOT_FOUND,
			AppError::Config(_)
			| AppError::Database(_)
			| AppError::Hash(_)
			| AppError::Token(_)
			| AppError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// Message safe to hand to a caller; internals are never included.
	pub fn public_message(&self) -> String {
		if self.status() == StatusCode::INTERNAL_SERVER_ERROR {
			INTERNAL_MESSAGE.to_string()
		} else {
			self.to_string()
		}
	}
}

// malformed bodies, query strings and path segments are client input errors

impl From<JsonRejection> for AppError {
	fn from(rejection: JsonRejection) -> Self {
		AppError::Validation(rejection.body_text())
	}
}

impl From<QueryRejection> for AppError {
	fn from(rejection: QueryRejection) -> Self {
		AppError::Validation(rejection.body_text())
	}
}

impl From<PathRejection> for AppError {
	fn from(rejection: PathRejection) -> Self {
		AppError::Validation(rejection.body_text())
	}
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
	pub error: String,
}

impl IntoResponse for AppError {
	fn into_response(self) -> Response {
		let status = self.status();
		if status == StatusCode::INTERNAL_SERVER_ERROR {
			tracing::error!(error = %self, "request failed");
		}
		(status, Json(ErrorBody{ error: self.public_message() })).into_response()
	}
}
