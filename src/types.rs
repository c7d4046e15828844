use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

pub type Uid = i64;
pub type Bid = i64;
pub type Rid = i64;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Book {
	pub id: Bid,
	pub title: String,
	pub author: String,
	pub description: String,
	pub cover_url: Option<String>,
	/// path relative to the media directory
	pub cover_image: Option<String>,
	pub isbn: String,
	pub published_year: Option<i32>,
	pub created_at: DateTime<Utc>,
}

impl Book {
	/// Where to load the cover from. An uploaded image wins over a url.
	pub fn cover_src(&self) -> Option<String> {
		match (&self.cover_image, &self.cover_url) {
			(Some(image), _) => Some(format!("/media/{image}")),
			(None, Some(url)) => Some(url.clone()),
			(None, None) => None,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
pub enum ShelfType {
	WantToRead,
	CurrentlyReading,
	Read,
}

impl ShelfType {
	pub const ALL: [ShelfType; 3] = [
		ShelfType::WantToRead,
		ShelfType::CurrentlyReading,
		ShelfType::Read,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			ShelfType::WantToRead => "want_to_read",
			ShelfType::CurrentlyReading => "currently_reading",
			ShelfType::Read => "read",
		}
	}

	pub fn label(self) -> &'static str {
		match self {
			ShelfType::WantToRead => "Want to Read",
			ShelfType::CurrentlyReading => "Currently Reading",
			ShelfType::Read => "Read",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		ShelfType::ALL.into_iter().find(|shelf| shelf.as_str() == raw)
	}

	/// Missing or unknown values land on "want to read" instead of being rejected.
	pub fn lenient(raw: Option<&str>) -> Self {
		raw.and_then(ShelfType::parse).unwrap_or(ShelfType::WantToRead)
	}
}

impl std::fmt::Display for ShelfType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.label())
	}
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ShelfEntry {
	pub id: i64,
	pub user_id: Uid,
	pub book_id: Bid,
	pub shelf_type: ShelfType,
	pub added_at: DateTime<Utc>,
	pub date_finished: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct ShelvedBook {
	pub entry: ShelfEntry,
	pub book: Book,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, sqlx::FromRow)]
pub struct ShelfCounts {
	#[sqlx(rename = "all_count")]
	pub all: i64,
	pub want_to_read: i64,
	pub currently_reading: i64,
	pub read: i64,
}

impl ShelfCounts {
	pub fn get(&self, shelf: Option<ShelfType>) -> i64 {
		match shelf {
			None => self.all,
			Some(ShelfType::WantToRead) => self.want_to_read,
			Some(ShelfType::CurrentlyReading) => self.currently_reading,
			Some(ShelfType::Read) => self.read,
		}
	}
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Review {
	pub id: Rid,
	pub user_id: Uid,
	pub book_id: Bid,
	pub content: String,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct BookReview {
	pub review: Review,
	pub username: String,
}

/// Presentation hint carried by every listing page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViewMode {
	#[default]
	Grid,
	List,
}

impl ViewMode {
	pub fn parse(raw: Option<&str>) -> Self {
		match raw {
			Some("list") => ViewMode::List,
			_ => ViewMode::Grid,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			ViewMode::Grid => "grid",
			ViewMode::List => "list",
		}
	}
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
	pub q: Option<String>,
	pub page: Option<String>,
	pub view: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ShelfParams {
	pub shelf: Option<String>,
	pub page: Option<String>,
	pub view: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ViewParams {
	pub view: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ShelfForm {
	pub shelf_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DateFinishedForm {
	pub date_finished: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewForm {
	#[serde(default)]
	pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct NextParam {
	pub next: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct FormLogin {
	#[serde(default)]
	pub username: String,
	#[serde(default)]
	pub pass: String,
	pub next: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct FormRegister {
	#[serde(default)]
	pub username: String,
	#[serde(default)]
	pub pass: String,
	#[serde(default)]
	pub pass_confirm: String,
}
