use std::sync::{Arc, OnceLock};

use axum::{
	async_trait,
	extract::{FromRef, FromRequestParts},
	http::{header::AUTHORIZATION, request::Parts},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::AppError;
use crate::sql;
use crate::store::UserStore;
use crate::types::{Account, AuthResponse, Credentials, Uid, PASSWORD_MIN_LEN, USERNAME_MAX_LEN};

/// Same text for unknown users and bad passwords.
pub const INVALID_CREDENTIALS: &str = "Invalid username or password";
pub const INVALID_TOKEN: &str = "Invalid or expired token";

pub fn token_ttl() -> Duration {
	Duration::hours(24)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
	pub sub: String,
	pub name: String,
	pub uid: Uid,
	pub iat: i64,
	pub exp: i64,
}

struct TokenKeys {
	encoding: EncodingKey,
	decoding: DecodingKey,
}

/// Identity proven by a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
	pub uid: Uid,
	pub username: String,
}

#[derive(Clone)]
pub struct AuthService {
	users: UserStore,
	keys: Arc<TokenKeys>,
	bcrypt_cost: u32,
	// verified against when the username is unknown, so both failures cost a bcrypt check
	decoy_hash: Arc<OnceLock<String>>,
}

impl AuthService {
	pub fn new(db: SqlitePool, token_secret: &str, bcrypt_cost: u32) -> Self {
		AuthService{
			users: UserStore::new(db),
			keys: Arc::new(TokenKeys{
				encoding: EncodingKey::from_secret(token_secret.as_bytes()),
				decoding: DecodingKey::from_secret(token_secret.as_bytes()),
			}),
			bcrypt_cost,
			decoy_hash: Arc::new(OnceLock::new()),
		}
	}

	pub async fn register(&self, creds: Credentials) -> Result<AuthResponse, AppError> {
		if creds.username.is_empty() || creds.password.is_empty() {
			return Err(AppError::Validation("Username and password are required".to_string()));
		}
		if creds.password.chars().count() < PASSWORD_MIN_LEN {
			return Err(AppError::Validation(
				format!("Password must be at least {PASSWORD_MIN_LEN} characters long")
			));
		}
		if creds.username.chars().count() > USERNAME_MAX_LEN {
			return Err(AppError::Validation(
				format!("Username must be at most {USERNAME_MAX_LEN} characters long")
			));
		}

		if self.users.exists(&creds.username).await? {
			tracing::debug!(username = %creds.username, "registration rejected, username taken");
			return Err(username_taken());
		}

		let cost = self.bcrypt_cost;
		let password = creds.password;
		let pass_hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;

		// the unique index is the real guard against a concurrent registration
		let account = self.users.insert(&creds.username, &pass_hash).await
			.map_err(|e| if sql::is_unique_violation(&e) { username_taken() } else { AppError::from(e) })?;

		tracing::info!(uid = account.uid, username = %account.username, "user registered");
		self.respond(&account)
	}

	pub async fn login(&self, creds: Credentials) -> Result<AuthResponse, AppError> {
		if creds.username.is_empty() || creds.password.is_empty() {
			return Err(AppError::Validation("Username and password are required".to_string()));
		}

		let Some(account) = self.users.find_by_username(&creds.username).await? else {
			self.decoy_verify(creds.password).await?;
			tracing::debug!(username = %creds.username, "login failed");
			return Err(AppError::Auth(INVALID_CREDENTIALS.to_string()));
		};

		let password = creds.password;
		let pass_hash = account.pass_hash.clone();
		let valid = tokio::task::spawn_blocking(move || bcrypt::verify(password, &pass_hash)).await??;
		if !valid {
			tracing::debug!(username = %creds.username, "login failed");
			return Err(AppError::Auth(INVALID_CREDENTIALS.to_string()));
		}

		tracing::info!(uid = account.uid, "user logged in");
		self.respond(&account)
	}

	async fn decoy_verify(&self, password: String) -> Result<(), AppError> {
		let decoy = Arc::clone(&self.decoy_hash);
		let cost = self.bcrypt_cost;
		tokio::task::spawn_blocking(move || -> Result<bool, bcrypt::BcryptError> {
			let hash = match decoy.get() {
				Some(hash) => hash,
				None => {
					let fresh = bcrypt::hash("decoy-password", cost)?;
					decoy.get_or_init(|| fresh)
				},
			};
			bcrypt::verify(password, hash)
		}).await??;
		Ok(())
	}

	fn respond(&self, account: &Account) -> Result<AuthResponse, AppError> {
		Ok(AuthResponse{
			token: self.issue_token(account, Utc::now())?,
			username: account.username.clone(),
		})
	}

	pub fn issue_token(&self, account: &Account, issued_at: DateTime<Utc>) -> Result<String, AppError> {
		let claims = Claims{
			sub: account.uid.to_string(),
			name: account.username.clone(),
			uid: account.uid,
			iat: issued_at.timestamp(),
			exp: (issued_at + token_ttl()).timestamp(),
		};
		Ok(jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.keys.encoding)?)
	}

	/// Rejects bad signatures, any algorithm but HS256, and expired tokens.
	pub fn verify_token(&self, token: &str) -> Result<AuthUser, AppError> {
		let mut validation = Validation::new(Algorithm::HS256);
		validation.leeway = 0;
		validation.set_required_spec_claims(&["exp", "sub"]);

		let data = jsonwebtoken::decode::<Claims>(token, &self.keys.decoding, &validation)
			.map_err(|e| {
				tracing::debug!(error = %e, "token rejected");
				AppError::Auth(INVALID_TOKEN.to_string())
			})?;

		let uid: Uid = data.claims.sub.parse()
			.map_err(|_| AppError::Auth(INVALID_TOKEN.to_string()))?;
		Ok(AuthUser{ uid, username: data.claims.name })
	}
}

/// Token from an `Authorization` value; the scheme name is case-insensitive.
fn bearer_token(value: &str) -> Option<&str> {
	let (scheme, token) = value.trim().split_once(' ')?;
	if scheme.eq_ignore_ascii_case("bearer") {
		Some(token.trim())
	} else {
		None
	}
}

fn username_taken() -> AppError {
	AppError::Conflict("Username already exists".to_string())
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
	S: Send + Sync,
	AuthService: FromRef<S>,
{
	type Rejection = AppError;

	async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
		let token = parts.headers.get(AUTHORIZATION)
			.and_then(|value| value.to_str().ok())
			.and_then(bearer_token)
			.filter(|token| !token.is_empty())
			.ok_or_else(|| AppError::Auth("Missing bearer token".to_string()))?;

		AuthService::from_ref(state).verify_token(token)
	}
}
