use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

use crate::catalog;
use crate::error::{AppError, AppResult, ValidationErrors};
use crate::sql::DB;
use crate::types::{Bid, BookReview, Review, Rid, Uid};

const REVIEW_COLUMNS: &str = "id, user_id, book_id, content, created_at, updated_at";

impl<'r> FromRow<'r, SqliteRow> for BookReview {
	fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
		Ok(BookReview {
			review: Review::from_row(row)?,
			username: row.try_get("username")?,
		})
	}
}

/// Writes the user's review of `book`, replacing any earlier one.
pub async fn upsert(db: &DB, user: Uid, book: Bid, content: &str) -> AppResult<Review> {
	let content = content.trim();
	if content.is_empty() {
		return Err(ValidationErrors::single("content", "This field is required.").into());
	}
	catalog::ensure_exists(db, book).await?;

	let now = Utc::now();
	let review = sqlx::query_as::<_, Review>(&format!(
		"INSERT INTO reviews (user_id, book_id, content, created_at, updated_at) VALUES (?, ?, ?, ?, ?)
		ON CONFLICT(user_id, book_id) DO UPDATE SET
			content = excluded.content,
			updated_at = excluded.updated_at
		RETURNING {REVIEW_COLUMNS}"
	))
		.bind(user)
		.bind(book)
		.bind(content)
		.bind(now)
		.bind(now)
		.fetch_one(db).await?;

	tracing::info!(user, book, review = review.id, "review saved");
	Ok(review)
}

pub async fn get_for_user_book(db: &DB, user: Uid, book: Bid) -> AppResult<Option<Review>> {
	let review = sqlx::query_as::<_, Review>(&format!(
		"SELECT {REVIEW_COLUMNS} FROM reviews WHERE user_id = ? AND book_id = ?"
	))
		.bind(user)
		.bind(book)
		.fetch_optional(db).await?;
	Ok(review)
}

/// Deletes a review owned by `user` and returns the book it was about.
/// Someone else's review is reported exactly like a missing one.
pub async fn delete(db: &DB, review: Rid, user: Uid) -> AppResult<Bid> {
	let book = sqlx::query_scalar::<_, Bid>(
		"DELETE FROM reviews WHERE id = ? AND user_id = ? RETURNING book_id"
	)
		.bind(review)
		.bind(user)
		.fetch_optional(db).await?
		.ok_or(AppError::NotFound)?;

	tracing::info!(user, review, book, "review deleted");
	Ok(book)
}

/// Every review of `book` with its author's name, newest first.
pub async fn list_for_book(db: &DB, book: Bid) -> AppResult<Vec<BookReview>> {
	let reviews = sqlx::query_as::<_, BookReview>(
		"SELECT r.id, r.user_id, r.book_id, r.content, r.created_at, r.updated_at, u.username
		FROM reviews r JOIN users u ON u.id = r.user_id
		WHERE r.book_id = ?
		ORDER BY r.created_at DESC, r.id DESC"
	)
		.bind(book)
		.fetch_all(db).await?;
	Ok(reviews)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::accounts::tests::user;
	use crate::catalog::tests::fields;
	use crate::{accounts, sql};

	#[tokio::test]
	async fn upsert_replaces_content_in_place() {
		let db = sql::open_in_memory().await.unwrap();
		let alice = user(&db, "alice").await;
		let book = catalog::add(&db, &fields("Dune", "Herbert"), None).await.unwrap();

		let first = upsert(&db, alice.id, book.id, "x").await.unwrap();
		assert_eq!(first.created_at, first.updated_at);
		assert_eq!(get_for_user_book(&db, alice.id, book.id).await.unwrap().unwrap().content, "x");

		let second = upsert(&db, alice.id, book.id, "  y  ").await.unwrap();
		assert_eq!(second.id, first.id);
		assert_eq!(second.content, "y");
		assert_eq!(second.created_at, first.created_at);
		assert!(second.updated_at >= first.updated_at);
		assert_eq!(get_for_user_book(&db, alice.id, book.id).await.unwrap().unwrap().content, "y");

		let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE user_id = ? AND book_id = ?")
			.bind(alice.id)
			.bind(book.id)
			.fetch_one(&db).await.unwrap();
		assert_eq!(rows, 1);
	}

	#[tokio::test]
	async fn blank_review_is_rejected() {
		let db = sql::open_in_memory().await.unwrap();
		let alice = user(&db, "alice").await;
		let book = catalog::add(&db, &fields("Dune", "Herbert"), None).await.unwrap();

		let Err(AppError::Validation(errors)) = upsert(&db, alice.id, book.id, " \n ").await else {
			panic!("blank review accepted");
		};
		assert!(errors.has("content"));
		assert_eq!(get_for_user_book(&db, alice.id, book.id).await.unwrap(), None);
	}

	#[tokio::test]
	async fn reviewing_a_missing_book_is_not_found() {
		let db = sql::open_in_memory().await.unwrap();
		let alice = user(&db, "alice").await;
		assert!(matches!(upsert(&db, alice.id, 3, "great").await, Err(AppError::NotFound)));
	}

	#[tokio::test]
	async fn only_the_author_can_delete() {
		let db = sql::open_in_memory().await.unwrap();
		let alice = user(&db, "alice").await;
		let bob = user(&db, "bob").await;
		let book = catalog::add(&db, &fields("Dune", "Herbert"), None).await.unwrap();
		let review = upsert(&db, alice.id, book.id, "Spice must flow").await.unwrap();

		assert!(matches!(delete(&db, review.id, bob.id).await, Err(AppError::NotFound)));
		assert!(get_for_user_book(&db, alice.id, book.id).await.unwrap().is_some());

		assert_eq!(delete(&db, review.id, alice.id).await.unwrap(), book.id);
		assert!(matches!(delete(&db, review.id, alice.id).await, Err(AppError::NotFound)));
	}

	#[tokio::test]
	async fn listed_newest_first_with_usernames() {
		let db = sql::open_in_memory().await.unwrap();
		let alice = user(&db, "alice").await;
		let bob = user(&db, "bob").await;
		let book = catalog::add(&db, &fields("Dune", "Herbert"), None).await.unwrap();
		let other = catalog::add(&db, &fields("Emma", "Austen"), None).await.unwrap();

		upsert(&db, alice.id, book.id, "first").await.unwrap();
		upsert(&db, bob.id, book.id, "second").await.unwrap();
		upsert(&db, bob.id, other.id, "elsewhere").await.unwrap();

		let listed = list_for_book(&db, book.id).await.unwrap();
		let shown: Vec<_> = listed.iter()
			.map(|r| (r.username.as_str(), r.review.content.as_str()))
			.collect();
		assert_eq!(shown, [("bob", "second"), ("alice", "first")]);
	}

	#[tokio::test]
	async fn deleting_the_user_removes_their_reviews() {
		let db = sql::open_in_memory().await.unwrap();
		let alice = user(&db, "alice").await;
		let book = catalog::add(&db, &fields("Dune", "Herbert"), None).await.unwrap();
		upsert(&db, alice.id, book.id, "gone soon").await.unwrap();

		accounts::delete_user(&db, alice.id).await.unwrap();
		assert!(list_for_book(&db, book.id).await.unwrap().is_empty());
	}
}
