//! Per-user shelves: at most one classification per (user, book).

use chrono::{NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

use crate::catalog;
use crate::error::AppResult;
use crate::pagination::{Page, Window, PAGE_SIZE};
use crate::sql::DB;
use crate::types::{Bid, Book, ShelfCounts, ShelfEntry, ShelfType, ShelvedBook, Uid};

const ENTRY_COLUMNS: &str = "id, user_id, book_id, shelf_type, added_at, date_finished";

impl<'r> FromRow<'r, SqliteRow> for ShelvedBook {
	fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
		Ok(ShelvedBook {
			entry: ShelfEntry::from_row(row)?,
			book: Book {
				id: row.try_get("book_id")?,
				title: row.try_get("title")?,
				author: row.try_get("author")?,
				description: row.try_get("description")?,
				cover_url: row.try_get("cover_url")?,
				cover_image: row.try_get("cover_image")?,
				isbn: row.try_get("isbn")?,
				published_year: row.try_get("published_year")?,
				created_at: row.try_get("created_at")?,
			},
		})
	}
}

/// Puts the book on `raw_type` (leniently parsed), moving it if it is already
/// shelved. The flag is true when the entry was created by this call.
pub async fn set_shelf(db: &DB, user: Uid, book: Bid, raw_type: Option<&str>) -> AppResult<(ShelfEntry, bool)> {
	let shelf_type = ShelfType::lenient(raw_type);
	catalog::ensure_exists(db, book).await?;

	// The insert only lands if (user, book) is free; the update then applies
	// the shelf type either way. Both run under one write lock.
	let mut tx = db.begin().await?;
	let created = sqlx::query(
		"INSERT INTO shelves (user_id, book_id, shelf_type, added_at) VALUES (?, ?, ?, ?)
		ON CONFLICT(user_id, book_id) DO NOTHING"
	)
		.bind(user)
		.bind(book)
		.bind(shelf_type)
		.bind(Utc::now())
		.execute(&mut *tx).await?
		.rows_affected() == 1;

	let entry = sqlx::query_as::<_, ShelfEntry>(&format!(
		"UPDATE shelves SET shelf_type = ? WHERE user_id = ? AND book_id = ? RETURNING {ENTRY_COLUMNS}"
	))
		.bind(shelf_type)
		.bind(user)
		.bind(book)
		.fetch_one(&mut *tx).await?;
	tx.commit().await?;

	tracing::info!(user, book, shelf = shelf_type.as_str(), created, "shelf set");
	Ok((entry, created))
}

/// Takes the book off the user's shelves. Absent entries are fine.
pub async fn remove_shelf(db: &DB, user: Uid, book: Bid) -> AppResult<bool> {
	catalog::ensure_exists(db, book).await?;
	let removed = sqlx::query("DELETE FROM shelves WHERE user_id = ? AND book_id = ?")
		.bind(user)
		.bind(book)
		.execute(db).await?
		.rows_affected() > 0;

	tracing::info!(user, book, removed, "shelf removed");
	Ok(removed)
}

/// Sets or clears the finish date, but only on a "read" entry. Returns false
/// when there is no such entry.
pub async fn set_date_finished(db: &DB, user: Uid, book: Bid, date: Option<NaiveDate>) -> AppResult<bool> {
	let updated = sqlx::query(
		"UPDATE shelves SET date_finished = ? WHERE user_id = ? AND book_id = ? AND shelf_type = ?"
	)
		.bind(date)
		.bind(user)
		.bind(book)
		.bind(ShelfType::Read)
		.execute(db).await?
		.rows_affected() > 0;

	tracing::debug!(user, book, ?date, updated, "date finished");
	Ok(updated)
}

pub async fn entry_for(db: &DB, user: Uid, book: Bid) -> AppResult<Option<ShelfEntry>> {
	let entry = sqlx::query_as::<_, ShelfEntry>(&format!(
		"SELECT {ENTRY_COLUMNS} FROM shelves WHERE user_id = ? AND book_id = ?"
	))
		.bind(user)
		.bind(book)
		.fetch_optional(db).await?;
	Ok(entry)
}

pub async fn counts(db: &DB, user: Uid) -> AppResult<ShelfCounts> {
	let counts = sqlx::query_as::<_, ShelfCounts>(
		"SELECT
			COUNT(*) AS all_count,
			COALESCE(SUM(shelf_type = 'want_to_read'), 0) AS want_to_read,
			COALESCE(SUM(shelf_type = 'currently_reading'), 0) AS currently_reading,
			COALESCE(SUM(shelf_type = 'read'), 0) AS read
		FROM shelves WHERE user_id = ?"
	)
		.bind(user)
		.fetch_one(db).await?;
	Ok(counts)
}

/// The user's shelved books, most recently shelved first, plus the size of
/// every shelf regardless of `filter`.
pub async fn list_for_user(
	db: &DB,
	user: Uid,
	filter: Option<ShelfType>,
	page: i64,
) -> AppResult<(Page<ShelvedBook>, ShelfCounts)> {
	let counts = counts(db, user).await?;
	let total = counts.get(filter);

	let window = Window::resolve(page, total, PAGE_SIZE);
	let entries = sqlx::query_as::<_, ShelvedBook>(
		"SELECT s.id, s.user_id, s.book_id, s.shelf_type, s.added_at, s.date_finished,
			b.title, b.author, b.description, b.cover_url, b.cover_image,
			b.isbn, b.published_year, b.created_at
		FROM shelves s JOIN books b ON b.id = s.book_id
		WHERE s.user_id = ? AND (? IS NULL OR s.shelf_type = ?)
		ORDER BY s.added_at DESC, s.id DESC
		LIMIT ? OFFSET ?"
	)
		.bind(user)
		.bind(filter)
		.bind(filter)
		.bind(window.limit)
		.bind(window.offset)
		.fetch_all(db).await?;

	Ok((window.page(entries, total), counts))
}
