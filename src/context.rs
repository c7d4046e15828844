//! Per-request context: who is asking, plus the cookie-backed flash notice.

use axum::{
	async_trait,
	extract::FromRequestParts,
	http::{request::Parts, Method},
};
use tower_cookies::{cookie::{time::Duration, SameSite}, Cookie, Cookies};

use crate::accounts::{self, User, SESSION_COOKIE, SESSION_DAYS};
use crate::error::{AppError, AppResult};
use crate::AppState;

const FLASH_COOKIE: &str = "flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
	Success,
	Error,
}

impl Level {
	pub fn as_str(self) -> &'static str {
		match self {
			Level::Success => "success",
			Level::Error => "error",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
	pub level: Level,
	pub message: String,
}

impl Flash {
	fn encode(&self) -> String {
		let tag = match self.level {
			Level::Success => 's',
			Level::Error => 'e',
		};
		format!("{tag}{}", urlencoding::encode(&self.message))
	}

	fn decode(raw: &str) -> Option<Self> {
		let mut chars = raw.chars();
		let level = match chars.next()? {
			's' => Level::Success,
			'e' => Level::Error,
			_ => return None,
		};
		let message = urlencoding::decode(chars.as_str()).ok()?.into_owned();
		Some(Flash { level, message })
	}
}

pub struct RequestContext {
	pub user: Option<User>,
	next: Option<String>,
	cookies: Option<Cookies>,
}

#[async_trait]
impl FromRequestParts<AppState> for RequestContext {
	type Rejection = AppError;

	async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
		let cookies = parts.extensions.get::<Cookies>().cloned();
		let token = cookies.as_ref()
			.and_then(|cookies| cookies.get(SESSION_COOKIE))
			.map(|cookie| cookie.value().to_string());

		let user = match token {
			Some(token) => accounts::user_for_session(&state.db, &token).await?,
			None => None,
		};

		// only pages that can be fetched again are worth returning to
		let next = (parts.method == Method::GET).then(|| {
			parts.uri.path_and_query()
				.map(|path| path.as_str().to_string())
				.unwrap_or_else(|| parts.uri.path().to_string())
		});

		Ok(RequestContext { user, next, cookies })
	}
}

impl RequestContext {
	pub fn anonymous() -> Self {
		RequestContext { user: None, next: None, cookies: None }
	}

	pub fn require_user(&self) -> AppResult<&User> {
		self.user.as_ref().ok_or_else(|| AppError::Unauthenticated { next: self.next.clone() })
	}

	/// Leaves a notice for the next rendered page.
	pub fn flash(&self, level: Level, message: impl Into<String>) {
		let Some(cookies) = &self.cookies else { return };
		let flash = Flash { level, message: message.into() };
		cookies.add(
			Cookie::build((FLASH_COOKIE, flash.encode()))
				.path("/")
				.http_only(true)
				.same_site(SameSite::Lax)
				.build()
		);
	}

	pub fn take_flash(&self) -> Option<Flash> {
		let cookies = self.cookies.as_ref()?;
		let raw = cookies.get(FLASH_COOKIE)?;
		cookies.remove(Cookie::build((FLASH_COOKIE, "")).path("/").build());
		Flash::decode(raw.value())
	}

	pub fn start_session(&self, token: String) {
		if let Some(cookies) = &self.cookies {
			cookies.add(
				Cookie::build((SESSION_COOKIE, token))
					.path("/")
					.max_age(Duration::days(SESSION_DAYS))
					.http_only(true)
					.same_site(SameSite::Lax)
					.build()
			);
		}
	}

	/// Forgets the session cookie, returning the token it held.
	pub fn end_session(&self) -> Option<String> {
		let cookies = self.cookies.as_ref()?;
		let token = cookies.get(SESSION_COOKIE)?.value().to_string();
		cookies.remove(Cookie::build((SESSION_COOKIE, "")).path("/").build());
		Some(token)
	}
}
