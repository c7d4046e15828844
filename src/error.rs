use axum::{
	http::StatusCode,
	response::{IntoResponse, Redirect, Response},
};
use thiserror::Error;

use crate::templates;

/// Key for messages that belong to the whole form rather than one field.
pub const NON_FIELD: &str = "__all__";

/// Per-field messages collected before anything is written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("{} invalid field(s)", .errors.len())]
pub struct ValidationErrors {
	errors: Vec<(&'static str, String)>,
}

impl ValidationErrors {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn single(field: &'static str, message: impl Into<String>) -> Self {
		let mut errors = Self::new();
		errors.add(field, message);
		errors
	}

	pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
		self.errors.push((field, message.into()));
	}

	pub fn is_empty(&self) -> bool {
		self.errors.is_empty()
	}

	pub fn field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a str> + 'a {
		self.errors.iter()
			.filter(move |(name, _)| *name == field)
			.map(|(_, message)| message.as_str())
	}

	pub fn has(&self, field: &str) -> bool {
		self.errors.iter().any(|(name, _)| *name == field)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
		self.errors.iter().map(|(name, message)| (*name, message.as_str()))
	}

	/// `Ok(value)` when nothing was collected.
	pub fn into_result<T>(self, value: T) -> Result<T, Self> {
		if self.is_empty() { Ok(value) } else { Err(self) }
	}
}

#[derive(Debug, Error)]
pub enum AppError {
	#[error("not found")]
	NotFound,
	#[error("validation failed: {0}")]
	Validation(#[from] ValidationErrors),
	/// `next` is the page to come back to after logging in, if there is one.
	#[error("authentication required")]
	Unauthenticated { next: Option<String> },
	#[error("malformed upload: {0}")]
	Multipart(#[from] axum::extract::multipart::MultipartError),
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),
	#[error("password hashing failed: {0}")]
	PasswordHash(argon2::password_hash::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
	fn into_response(self) -> Response {
		match self {
			AppError::NotFound => (
				StatusCode::NOT_FOUND,
				templates::error_page("Not found", "The page you asked for does not exist."),
			).into_response(),
			AppError::Unauthenticated { next } => {
				let target = match next {
					Some(next) => format!("/accounts/login/?next={}", urlencoding::encode(&next)),
					None => "/accounts/login/".to_string(),
				};
				Redirect::to(&target).into_response()
			},
			AppError::Validation(errors) => {
				let detail = errors.iter()
					.map(|(field, message)| format!("{field}: {message}"))
					.collect::<Vec<_>>()
					.join("; ");
				(StatusCode::BAD_REQUEST, templates::error_page("Invalid submission", &detail)).into_response()
			},
			AppError::Multipart(err) => {
				tracing::warn!(error = %err, "rejected upload");
				(StatusCode::BAD_REQUEST, templates::error_page("Invalid submission", "The upload could not be read.")).into_response()
			},
			AppError::Database(err) => {
				tracing::error!(error = %err, "database failure");
				internal_error()
			},
			AppError::Io(err) => {
				tracing::error!(error = %err, "io failure");
				internal_error()
			},
			AppError::PasswordHash(err) => {
				tracing::error!(error = %err, "password hash failure");
				internal_error()
			},
		}
	}
}

fn internal_error() -> Response {
	(
		StatusCode::INTERNAL_SERVER_ERROR,
		templates::error_page("Server error", "Something went wrong on our side."),
	).into_response()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn collects_messages_per_field() {
		let mut errors = ValidationErrors::new();
		assert!(errors.clone().into_result(()).is_ok());

		errors.add("title", "This field is required.");
		errors.add("isbn", "Too long.");
		errors.add("title", "Too short.");

		assert!(errors.has("title"));
		assert!(!errors.has("author"));
		assert_eq!(errors.field("title").collect::<Vec<_>>(), ["This field is required.", "Too short."]);
		assert_eq!(errors.to_string(), "3 invalid field(s)");
		assert!(errors.into_result(()).is_err());
	}

	#[test]
	fn unauthenticated_redirects_to_login_with_next() {
		let response = AppError::Unauthenticated { next: Some("/my-shelves/?shelf=read".into()) }.into_response();
		assert_eq!(response.status(), StatusCode::SEE_OTHER);
		let location = response.headers()["location"].to_str().unwrap();
		assert_eq!(location, "/accounts/login/?next=%2Fmy-shelves%2F%3Fshelf%3Dread");
	}

	#[test]
	fn not_found_is_a_404() {
		assert_eq!(AppError::NotFound.into_response().status(), StatusCode::NOT_FOUND);
	}
}
