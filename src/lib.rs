//! Bookshelf: a shared book catalog with personal shelves and reviews.

pub mod accounts;
pub mod catalog;
pub mod config;
pub mod context;
pub mod covers;
pub mod error;
pub mod handlers;
pub mod pagination;
pub mod reviews;
pub mod shelves;
pub mod sql;
pub mod templates;
pub mod types;

use std::path::PathBuf;

use axum::{
	extract::DefaultBodyLimit,
	routing::{get, post},
	Router,
};
use tower_cookies::CookieManagerLayer;
use tower_http::{services::ServeDir, trace::TraceLayer};

const MAX_UPLOAD_BYTES: usize = 8 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
	pub db: sql::DB,
	pub media_dir: PathBuf,
}

impl AppState {
	pub fn new(db: sql::DB, media_dir: impl Into<PathBuf>) -> Self {
		AppState { db, media_dir: media_dir.into() }
	}
}

pub fn router(state: AppState) -> Router {
	let media = ServeDir::new(&state.media_dir);

	Router::new()
		.route("/", get(handlers::home))
		.route("/books/", get(handlers::book_list))
		.route("/books/add/", get(handlers::add_book_form).post(handlers::add_book))
		.route("/books/:id/", get(handlers::book_detail))
		.route("/books/:id/edit/", get(handlers::edit_book_form).post(handlers::edit_book))
		.route("/books/:id/delete/", get(handlers::delete_book_confirm).post(handlers::delete_book))
		.route("/books/:id/add-to-shelf/", post(handlers::add_to_shelf))
		.route("/books/:id/remove-from-shelf/", post(handlers::remove_from_shelf))
		.route("/books/:id/update-date-finished/", post(handlers::update_date_finished))
		.route("/books/:id/review/", get(handlers::review_form).post(handlers::save_review))
		.route("/reviews/:id/delete/", post(handlers::delete_review))
		.route("/my-shelves/", get(handlers::my_shelves))
		.route("/accounts/login/", get(handlers::login_form).post(handlers::login))
		.route("/accounts/register/", get(handlers::register_form).post(handlers::register))
		.route("/accounts/logout/", post(handlers::logout))
		.route("/accounts/delete/", post(handlers::delete_account))
		.nest_service("/media", media)
		.fallback(handlers::not_found)
		.layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
		.layer(CookieManagerLayer::new())
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}
