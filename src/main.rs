// book catalog server

use anyhow::Context;
use book_catalog::{app, config::Config, sql, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let config = Config::from_env()?;

	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| EnvFilter::new("book_catalog=info,tower_http=info")),
		)
		.init();

	// set up connection pool
	let pool = sql::open(&config.database_url).await
		.with_context(|| format!("can't connect to database {}", config.database_url))?;
	sql::schema(&pool).await.context("can't create tables")?;

	let app = app(AppState::new(pool, &config));

	let listener = tokio::net::TcpListener::bind(&config.bind_addr).await
		.with_context(|| format!("can't bind {}", config.bind_addr))?;
	tracing::info!(addr = %config.bind_addr, "listening");
	axum::serve(listener, app).await?;
	Ok(())
}
