//! Users and login sessions.
//!
//! Passwords are stored as argon2id PHC strings; a login hands out a random
//! session token that the browser carries in the `session` cookie for
//! [`SESSION_DAYS`].

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::{AppError, AppResult, ValidationErrors, NON_FIELD};
use crate::sql::DB;
use crate::types::Uid;

pub const SESSION_COOKIE: &str = "session";
pub const SESSION_DAYS: i64 = 14;

const MAX_USERNAME_LEN: usize = 150;
const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct User {
	pub id: Uid,
	pub username: String,
	pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct Credentials {
	id: Uid,
	pass_hash: String,
}

fn hash_password(password: &str) -> AppResult<String> {
	let salt = SaltString::generate(&mut OsRng);
	let hash = Argon2::default()
		.hash_password(password.as_bytes(), &salt)
		.map_err(AppError::PasswordHash)?;
	Ok(hash.to_string())
}

fn verify_password(password: &str, pass_hash: &str) -> AppResult<bool> {
	let parsed = PasswordHash::new(pass_hash).map_err(AppError::PasswordHash)?;
	Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}

/// Oldest session start that is still honoured.
fn session_cutoff() -> DateTime<Utc> {
	Utc::now() - Duration::days(SESSION_DAYS)
}

fn valid_username(username: &str) -> bool {
	username.chars().count() <= MAX_USERNAME_LEN
		&& username.chars().all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
}

/// Field checks for a new account, without touching the database.
pub fn check_registration(username: &str, password: &str) -> Result<(), ValidationErrors> {
	let username = username.trim();
	let mut errors = ValidationErrors::new();
	if username.is_empty() {
		errors.add("username", "This field is required.");
	} else if !valid_username(username) {
		errors.add("username", "Enter a valid username. Use at most 150 letters, digits and @/./+/-/_ characters.");
	}
	if password.chars().count() < MIN_PASSWORD_LEN {
		errors.add("pass", format!("This password is too short. It must contain at least {MIN_PASSWORD_LEN} characters."));
	}
	errors.into_result(())
}

pub async fn register(db: &DB, username: &str, password: &str) -> AppResult<User> {
	check_registration(username, password)?;
	let username = username.trim();

	let user = sqlx::query_as::<_, User>(
		"INSERT INTO users (username, pass_hash, created_at) VALUES (?, ?, ?)
		ON CONFLICT(username) DO NOTHING
		RETURNING id, username, created_at"
	)
		.bind(username)
		.bind(hash_password(password)?)
		.bind(Utc::now())
		.fetch_optional(db).await?
		.ok_or_else(|| ValidationErrors::single("username", "A user with that username already exists."))?;

	tracing::info!(user = user.id, username = %user.username, "user registered");
	Ok(user)
}

/// Checks the password and opens a new session, returning its token.
pub async fn login(db: &DB, username: &str, password: &str) -> AppResult<String> {
	let credentials = sqlx::query_as::<_, Credentials>(
		"SELECT id, pass_hash FROM users WHERE username = ?"
	)
		.bind(username.trim())
		.fetch_optional(db).await?;

	let uid = match credentials {
		Some(c) if verify_password(password, &c.pass_hash)? => c.id,
		_ => {
			tracing::info!(username = %username.trim(), "login refused");
			return Err(ValidationErrors::single(
				NON_FIELD,
				"Please enter a correct username and password.",
			).into());
		},
	};

	let expired = sqlx::query("DELETE FROM sessions WHERE created_at <= ?")
		.bind(session_cutoff())
		.execute(db).await?
		.rows_affected();
	if expired > 0 {
		tracing::debug!(expired, "expired sessions pruned");
	}

	let token = Uuid::new_v4().to_string();
	sqlx::query("INSERT INTO sessions (token, user_id, created_at) VALUES (?, ?, ?)")
		.bind(&token)
		.bind(uid)
		.bind(Utc::now())
		.execute(db).await?;

	tracing::debug!(user = uid, "session opened");
	Ok(token)
}

pub async fn logout(db: &DB, token: &str) -> AppResult<()> {
	sqlx::query("DELETE FROM sessions WHERE token = ?")
		.bind(token)
		.execute(db).await?;
	Ok(())
}

pub async fn user_for_session(db: &DB, token: &str) -> AppResult<Option<User>> {
	let user = sqlx::query_as::<_, User>(
		"SELECT u.id, u.username, u.created_at
		FROM sessions s JOIN users u ON u.id = s.user_id
		WHERE s.token = ? AND s.created_at > ?"
	)
		.bind(token)
		.bind(session_cutoff())
		.fetch_optional(db).await?;
	Ok(user)
}

/// Deletes the user along with their sessions, shelf entries and reviews.
pub async fn delete_user(db: &DB, uid: Uid) -> AppResult<()> {
	let mut tx = db.begin().await?;
	for statement in [
		"DELETE FROM sessions WHERE user_id = ?",
		"DELETE FROM shelves WHERE user_id = ?",
		"DELETE FROM reviews WHERE user_id = ?",
		"DELETE FROM users WHERE id = ?",
	] {
		sqlx::query(statement).bind(uid).execute(&mut *tx).await?;
	}
	tx.commit().await?;

	tracing::info!(user = uid, "user deleted");
	Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use crate::error::AppError;
	use crate::sql;

	pub(crate) async fn user(db: &DB, username: &str) -> User {
		register(db, username, "correct horse").await.unwrap()
	}

	#[tokio::test]
	async fn register_then_login() {
		let db = sql::open_in_memory().await.unwrap();
		let alice = register(&db, " alice ", "correct horse").await.unwrap();
		assert_eq!(alice.username, "alice");

		let token = login(&db, "alice", "correct horse").await.unwrap();
		assert_eq!(user_for_session(&db, &token).await.unwrap(), Some(alice));

		logout(&db, &token).await.unwrap();
		assert_eq!(user_for_session(&db, &token).await.unwrap(), None);
	}

	#[tokio::test]
	async fn wrong_password_or_unknown_user_is_refused() {
		let db = sql::open_in_memory().await.unwrap();
		user(&db, "alice").await;

		for (username, password) in [("alice", "battery staple"), ("bob", "correct horse")] {
			let Err(AppError::Validation(errors)) = login(&db, username, password).await else {
				panic!("login as {username} should fail");
			};
			assert!(errors.has(NON_FIELD));
		}
	}

	#[tokio::test]
	async fn usernames_are_unique_and_checked() {
		let db = sql::open_in_memory().await.unwrap();
		user(&db, "alice").await;

		let Err(AppError::Validation(errors)) = register(&db, "alice", "another password").await else {
			panic!("duplicate username accepted");
		};
		assert!(errors.has("username"));

		let Err(AppError::Validation(errors)) = register(&db, "bad name!", "short").await else {
			panic!("bad registration accepted");
		};
		assert!(errors.has("username"));
		assert!(errors.has("pass"));
	}

	#[tokio::test]
	async fn passwords_are_stored_as_salted_argon2() {
		let db = sql::open_in_memory().await.unwrap();
		user(&db, "alice").await;
		user(&db, "bob").await;

		let hashes: Vec<String> = sqlx::query_scalar("SELECT pass_hash FROM users")
			.fetch_all(&db).await.unwrap();
		assert!(hashes.iter().all(|hash| hash.starts_with("$argon2id$")));
		assert!(hashes.iter().all(|hash| !hash.contains("correct horse")));
		assert_ne!(hashes[0], hashes[1]);
	}

	#[test]
	fn registration_checks_need_no_database() {
		let errors = check_registration("bad name!", "short").unwrap_err();
		assert!(errors.has("username"));
		assert!(errors.has("pass"));
		assert!(check_registration(" alice ", "correct horse").is_ok());
	}

	async fn backdate_sessions(db: &DB, days: i64) {
		sqlx::query("UPDATE sessions SET created_at = ?")
			.bind(Utc::now() - Duration::days(days))
			.execute(db).await.unwrap();
	}

	#[tokio::test]
	async fn sessions_expire() {
		let db = sql::open_in_memory().await.unwrap();
		let alice = user(&db, "alice").await;
		let token = login(&db, "alice", "correct horse").await.unwrap();

		backdate_sessions(&db, SESSION_DAYS - 1).await;
		assert_eq!(user_for_session(&db, &token).await.unwrap(), Some(alice));

		backdate_sessions(&db, SESSION_DAYS + 1).await;
		assert_eq!(user_for_session(&db, &token).await.unwrap(), None);
	}

	#[tokio::test]
	async fn login_prunes_expired_sessions() {
		let db = sql::open_in_memory().await.unwrap();
		user(&db, "alice").await;
		let stale = login(&db, "alice", "correct horse").await.unwrap();
		backdate_sessions(&db, SESSION_DAYS + 1).await;

		let fresh = login(&db, "alice", "correct horse").await.unwrap();
		let tokens: Vec<String> = sqlx::query_scalar("SELECT token FROM sessions")
			.fetch_all(&db).await.unwrap();
		assert_eq!(tokens, vec![fresh]);
		assert_ne!(tokens[0], stale);
	}

	#[tokio::test]
	async fn deleting_a_user_drops_their_sessions() {
		let db = sql::open_in_memory().await.unwrap();
		let alice = user(&db, "alice").await;
		let token = login(&db, "alice", "correct horse").await.unwrap();

		delete_user(&db, alice.id).await.unwrap();
		assert_eq!(user_for_session(&db, &token).await.unwrap(), None);
		assert!(login(&db, "alice", "correct horse").await.is_err());
	}
}
