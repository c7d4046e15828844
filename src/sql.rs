use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Executor, Pool, Sqlite};

pub type DB = Pool<Sqlite>;

/// Opens (creating if needed) the database behind `url` and applies the schema.
pub async fn connect(url: &str) -> Result<DB, sqlx::Error> {
	let options = SqliteConnectOptions::from_str(url)?
		.create_if_missing(true)
		.foreign_keys(true)
		.busy_timeout(Duration::from_secs(5));

	let pool = SqlitePoolOptions::new()
		.max_connections(5)
		.acquire_timeout(Duration::from_secs(3))
		.connect_with(options).await?;

	init(&pool).await?;
	Ok(pool)
}

/// A private in-memory database. Every connection to `:memory:` is its own
/// database, so the pool holds exactly one connection and never recycles it.
pub async fn open_in_memory() -> Result<DB, sqlx::Error> {
	let options = SqliteConnectOptions::from_str("sqlite::memory:")?
		.foreign_keys(true);

	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.min_connections(1)
		.idle_timeout(None)
		.max_lifetime(None)
		.connect_with(options).await?;

	init(&pool).await?;
	Ok(pool)
}

pub async fn init(db: &DB) -> Result<(), sqlx::Error> {
	db.execute(TABLE_SCHEMA).await?;
	tracing::debug!("schema applied");
	Ok(())
}

// Foreign keys cascade as a backstop; deletes that matter cascade explicitly
// inside a transaction (see catalog::delete and accounts::delete_user).
pub const TABLE_SCHEMA: &str = r#"

CREATE TABLE IF NOT EXISTS users (
	id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
	username TEXT NOT NULL UNIQUE,
	pass_hash TEXT NOT NULL,
	created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
	token TEXT NOT NULL PRIMARY KEY,
	user_id INTEGER NOT NULL,
	created_at TEXT NOT NULL,
	FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS books (
	id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
	title TEXT NOT NULL,
	author TEXT NOT NULL,
	description TEXT NOT NULL DEFAULT '',
	cover_url TEXT DEFAULT NULL,
	cover_image TEXT DEFAULT NULL,
	isbn TEXT NOT NULL DEFAULT '',
	published_year INTEGER DEFAULT NULL,
	created_at TEXT NOT NULL,
	CHECK(title != '' AND author != ''),
	CHECK(length(isbn) <= 13)
);

CREATE INDEX IF NOT EXISTS books_created_at ON books(created_at);

CREATE TABLE IF NOT EXISTS shelves (
	id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
	user_id INTEGER NOT NULL,
	book_id INTEGER NOT NULL,
	shelf_type TEXT NOT NULL,
	added_at TEXT NOT NULL,
	date_finished DATE DEFAULT NULL,
	UNIQUE(user_id, book_id),
	CHECK(shelf_type IN ('want_to_read', 'currently_reading', 'read')),
	FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE,
	FOREIGN KEY(book_id) REFERENCES books(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS shelves_user_added ON shelves(user_id, added_at);

CREATE TABLE IF NOT EXISTS reviews (
	id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
	user_id INTEGER NOT NULL,
	book_id INTEGER NOT NULL,
	content TEXT NOT NULL,
	created_at TEXT NOT NULL,
	updated_at TEXT NOT NULL,
	UNIQUE(user_id, book_id),
	CHECK(content != ''),
	FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE,
	FOREIGN KEY(book_id) REFERENCES books(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS reviews_book_created ON reviews(book_id, created_at);

"#;

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn schema_is_idempotent() {
		let db = open_in_memory().await.unwrap();
		init(&db).await.unwrap();

		let tables: Vec<(String,)> = sqlx::query_as(
			"SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name"
		).fetch_all(&db).await.unwrap();
		let tables: Vec<&str> = tables.iter().map(|(name,)| name.as_str()).collect();
		assert_eq!(tables, ["books", "reviews", "sessions", "shelves", "users"]);
	}

	#[tokio::test]
	async fn shelf_type_is_constrained() {
		let db = open_in_memory().await.unwrap();
		sqlx::query("INSERT INTO users (username, pass_hash, created_at) VALUES ('a', '', '2024-01-01T00:00:00Z')")
			.execute(&db).await.unwrap();
		sqlx::query("INSERT INTO books (title, author, created_at) VALUES ('t', 'a', '2024-01-01T00:00:00Z')")
			.execute(&db).await.unwrap();

		let bad = sqlx::query("INSERT INTO shelves (user_id, book_id, shelf_type, added_at) VALUES (1, 1, 'lost', '2024-01-01T00:00:00Z')")
			.execute(&db).await;
		assert!(bad.is_err());
	}

	#[tokio::test]
	async fn one_shelf_entry_and_review_per_pair() {
		let db = open_in_memory().await.unwrap();
		sqlx::query("INSERT INTO users (username, pass_hash, created_at) VALUES ('a', '', '2024-01-01T00:00:00Z')")
			.execute(&db).await.unwrap();
		sqlx::query("INSERT INTO books (title, author, created_at) VALUES ('t', 'a', '2024-01-01T00:00:00Z')")
			.execute(&db).await.unwrap();

		for (statement, again) in [
			(
				"INSERT INTO shelves (user_id, book_id, shelf_type, added_at) VALUES (1, 1, 'read', '2024-01-01T00:00:00Z')",
				"INSERT INTO shelves (user_id, book_id, shelf_type, added_at) VALUES (1, 1, 'reading', '2024-01-02T00:00:00Z')",
			),
			(
				"INSERT INTO reviews (user_id, book_id, content, created_at, updated_at) VALUES (1, 1, 'x', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
				"INSERT INTO reviews (user_id, book_id, content, created_at, updated_at) VALUES (1, 1, 'y', '2024-01-02T00:00:00Z', '2024-01-02T00:00:00Z')",
			),
		] {
			sqlx::query(statement).execute(&db).await.unwrap();
			assert!(sqlx::query(again).execute(&db).await.is_err());
		}
	}
}
