// bookshelf server

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bookshelf::{config::Config, sql, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| "bookshelf=info,tower_http=info".into()),
		)
		.with(tracing_subscriber::fmt::layer())
		.init();

	let config = Config::from_env()?;

	// set up connection pool
	let db = sql::connect(&config.database_url).await
		.with_context(|| format!("can't open database {}", config.database_url))?;

	tokio::fs::create_dir_all(&config.media_dir).await
		.with_context(|| format!("can't create media dir {}", config.media_dir.display()))?;

	let app = bookshelf::router(AppState::new(db, config.media_dir.clone()));

	let listener = tokio::net::TcpListener::bind(config.bind_addr).await
		.with_context(|| format!("can't bind {}", config.bind_addr))?;
	tracing::info!(addr = %config.bind_addr, "listening");
	axum::serve(listener, app).await?;

	Ok(())
}
