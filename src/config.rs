use std::env;

use crate::error::AppError;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://catalog.db";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone)]
pub struct Config {
	pub database_url: String,
	pub bind_addr: String,
	pub token_secret: String,
	pub bcrypt_cost: u32,
}

impl Config {
	/// Reads `.env` (if any) and the process environment.
	pub fn from_env() -> Result<Self, AppError> {
		// a missing .env is fine, the variables may come from the environment
		let _ = dotenvy::dotenv();
		Self::from_lookup(|key| env::var(key).ok())
	}

	pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let token_secret = lookup("TOKEN_SECRET")
			.filter(|secret| !secret.is_empty())
			.ok_or_else(|| AppError::Config("TOKEN_SECRET not set".to_string()))?;

		let bcrypt_cost = match lookup("BCRYPT_COST") {
			Some(raw) => {
				let cost: u32 = raw.parse()
					.map_err(|_| AppError::Config(format!("BCRYPT_COST is not a number: {raw}")))?;
				if !(4..=31).contains(&cost) {
					return Err(AppError::Config(format!("BCRYPT_COST out of range 4..=31: {cost}")));
				}
				cost
			},
			None => bcrypt::DEFAULT_COST,
		};

		Ok(Config{
			database_url: lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
			bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
			token_secret,
			bcrypt_cost,
		})
	}
}
