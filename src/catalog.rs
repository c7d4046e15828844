//! The shared book catalog.

use chrono::Utc;

use crate::error::{AppError, AppResult, ValidationErrors};
use crate::pagination::{Page, Window};
use crate::sql::DB;
use crate::types::{Bid, Book};

const BOOK_COLUMNS: &str =
	"id, title, author, description, cover_url, cover_image, isbn, published_year, created_at";

const MAX_NAME_LEN: usize = 255;
const MAX_ISBN_LEN: usize = 13;

/// Raw book fields as submitted by the add/edit forms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookFields {
	pub title: String,
	pub author: String,
	pub description: String,
	pub cover_url: String,
	pub isbn: String,
	pub published_year: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidBook {
	pub title: String,
	pub author: String,
	pub description: String,
	pub cover_url: Option<String>,
	pub isbn: String,
	pub published_year: Option<i32>,
}

impl BookFields {
	pub fn validate(&self) -> Result<ValidBook, ValidationErrors> {
		let mut errors = ValidationErrors::new();

		let title = required(&mut errors, "title", &self.title);
		let author = required(&mut errors, "author", &self.author);

		let isbn = self.isbn.trim().to_string();
		if isbn.chars().count() > MAX_ISBN_LEN {
			errors.add("isbn", format!(
				"Ensure this value has at most {MAX_ISBN_LEN} characters (it has {}).",
				isbn.chars().count(),
			));
		}

		let published_year = match self.published_year.trim() {
			"" => None,
			year => match year.parse::<i32>() {
				Ok(year) => Some(year),
				Err(_) => {
					errors.add("published_year", "Enter a whole number.");
					None
				},
			},
		};

		let cover_url = match self.cover_url.trim() {
			"" => None,
			url if is_web_url(url) => Some(url.to_string()),
			_ => {
				errors.add("cover_url", "Enter a valid URL.");
				None
			},
		};

		errors.into_result(ValidBook {
			title,
			author,
			description: self.description.trim().to_string(),
			cover_url,
			isbn,
			published_year,
		})
	}
}

impl From<&Book> for BookFields {
	fn from(book: &Book) -> Self {
		BookFields {
			title: book.title.clone(),
			author: book.author.clone(),
			description: book.description.clone(),
			cover_url: book.cover_url.clone().unwrap_or_default(),
			isbn: book.isbn.clone(),
			published_year: book.published_year.map(|year| year.to_string()).unwrap_or_default(),
		}
	}
}

fn required(errors: &mut ValidationErrors, field: &'static str, value: &str) -> String {
	let value = value.trim();
	if value.is_empty() {
		errors.add(field, "This field is required.");
	} else if value.chars().count() > MAX_NAME_LEN {
		errors.add(field, format!("Ensure this value has at most {MAX_NAME_LEN} characters."));
	}
	value.to_string()
}

fn is_web_url(url: &str) -> bool {
	let rest = url.strip_prefix("https://")
		.or_else(|| url.strip_prefix("http://"));
	match rest {
		Some(rest) => {
			let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
			!host.is_empty() && !url.chars().any(char::is_whitespace)
		},
		None => false,
	}
}

/// Newest books first, optionally narrowed to titles or authors containing
/// `query` (case-insensitive).
pub async fn list(db: &DB, query: Option<&str>, page: i64, page_size: i64) -> AppResult<Page<Book>> {
	let query = query.filter(|query| !query.is_empty());
	const FILTER: &str =
		"(? IS NULL OR instr(lower(title), lower(?)) > 0 OR instr(lower(author), lower(?)) > 0)";

	let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM books WHERE {FILTER}"))
		.bind(query).bind(query).bind(query)
		.fetch_one(db).await?;

	let window = Window::resolve(page, total, page_size);
	let books = sqlx::query_as::<_, Book>(&format!(
		"SELECT {BOOK_COLUMNS} FROM books WHERE {FILTER} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
	))
		.bind(query).bind(query).bind(query)
		.bind(window.limit).bind(window.offset)
		.fetch_all(db).await?;

	Ok(window.page(books, total))
}

pub async fn recent(db: &DB, limit: i64) -> AppResult<Vec<Book>> {
	let books = sqlx::query_as::<_, Book>(&format!(
		"SELECT {BOOK_COLUMNS} FROM books ORDER BY created_at DESC, id DESC LIMIT ?"
	))
		.bind(limit)
		.fetch_all(db).await?;
	Ok(books)
}

pub async fn get(db: &DB, id: Bid) -> AppResult<Book> {
	sqlx::query_as::<_, Book>(&format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?"))
		.bind(id)
		.fetch_optional(db).await?
		.ok_or(AppError::NotFound)
}

pub async fn ensure_exists(db: &DB, id: Bid) -> AppResult<()> {
	let exists: i64 = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE id = ?)")
		.bind(id)
		.fetch_one(db).await?;
	if exists != 0 { Ok(()) } else { Err(AppError::NotFound) }
}

pub async fn add(db: &DB, fields: &BookFields, cover_image: Option<String>) -> AppResult<Book> {
	let valid = fields.validate()?;
	let book = sqlx::query_as::<_, Book>(&format!(
		"INSERT INTO books (title, author, description, cover_url, cover_image, isbn, published_year, created_at)
		VALUES (?, ?, ?, ?, ?, ?, ?, ?)
		RETURNING {BOOK_COLUMNS}"
	))
		.bind(&valid.title)
		.bind(&valid.author)
		.bind(&valid.description)
		.bind(&valid.cover_url)
		.bind(&cover_image)
		.bind(&valid.isbn)
		.bind(valid.published_year)
		.bind(Utc::now())
		.fetch_one(db).await?;

	tracing::info!(book = book.id, title = %book.title, "book added");
	Ok(book)
}

/// Replaces every field. `cover_image: None` keeps the image already on file.
pub async fn edit(db: &DB, id: Bid, fields: &BookFields, cover_image: Option<String>) -> AppResult<Book> {
	let valid = fields.validate()?;
	let book = sqlx::query_as::<_, Book>(&format!(
		"UPDATE books SET
			title = ?, author = ?, description = ?, cover_url = ?,
			cover_image = COALESCE(?, cover_image), isbn = ?, published_year = ?
		WHERE id = ?
		RETURNING {BOOK_COLUMNS}"
	))
		.bind(&valid.title)
		.bind(&valid.author)
		.bind(&valid.description)
		.bind(&valid.cover_url)
		.bind(&cover_image)
		.bind(&valid.isbn)
		.bind(valid.published_year)
		.bind(id)
		.fetch_optional(db).await?
		.ok_or(AppError::NotFound)?;

	tracing::info!(book = book.id, "book updated");
	Ok(book)
}

/// Removes the book together with every shelf entry and review pointing at it.
/// Deletes the book with its shelf entries and reviews. Returns the path of
/// its uploaded cover, which the caller owns from then on.
pub async fn delete(db: &DB, id: Bid) -> AppResult<Option<String>> {
	let mut tx = db.begin().await?;

	let shelves = sqlx::query("DELETE FROM shelves WHERE book_id = ?")
		.bind(id)
		.execute(&mut *tx).await?
		.rows_affected();
	let reviews = sqlx::query("DELETE FROM reviews WHERE book_id = ?")
		.bind(id)
		.execute(&mut *tx).await?
		.rows_affected();
	let cover_image = sqlx::query_scalar::<_, Option<String>>("DELETE FROM books WHERE id = ? RETURNING cover_image")
		.bind(id)
		.fetch_optional(&mut *tx).await?
		.ok_or(AppError::NotFound)?;
	tx.commit().await?;

	tracing::info!(book = id, shelves, reviews, "book deleted");
	Ok(cover_image)
}
