use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:bookshelf.db";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_MEDIA_DIR: &str = "media";

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to load .env: {0}")]
	Dotenv(#[from] dotenvy::Error),

	#[error("invalid {name}: {value:?}")]
	Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
	pub database_url: String,
	pub bind_addr: SocketAddr,
	/// uploaded covers live under `<media_dir>/covers`
	pub media_dir: PathBuf,
}

impl Config {
	/// Reads `DATABASE_URL`, `BIND_ADDR` and `MEDIA_DIR`, after loading a
	/// `.env` file if there is one.
	pub fn from_env() -> Result<Self, ConfigError> {
		match dotenvy::dotenv() {
			Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
			Err(err) if err.not_found() => {},
			Err(err) => return Err(err.into()),
		}
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
		let get = |name: &str, default: &str| {
			lookup(name)
				.filter(|value| !value.trim().is_empty())
				.unwrap_or_else(|| default.to_string())
		};

		let bind_addr = get("BIND_ADDR", DEFAULT_BIND_ADDR);
		let bind_addr = bind_addr.parse::<SocketAddr>()
			.map_err(|_| ConfigError::Invalid { name: "BIND_ADDR", value: bind_addr.clone() })?;

		Ok(Config {
			database_url: get("DATABASE_URL", DEFAULT_DATABASE_URL),
			bind_addr,
			media_dir: PathBuf::from(get("MEDIA_DIR", DEFAULT_MEDIA_DIR)),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let vars: HashMap<String, String> = vars.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		move |name: &str| vars.get(name).cloned()
	}

	#[test]
	fn defaults_apply_when_unset() {
		let config = Config::from_lookup(lookup(&[])).unwrap();
		assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
		assert_eq!(config.bind_addr, "0.0.0.0:8080".parse().unwrap());
		assert_eq!(config.media_dir, PathBuf::from("media"));
	}

	#[test]
	fn values_override_defaults() {
		let config = Config::from_lookup(lookup(&[
			("DATABASE_URL", "sqlite::memory:"),
			("BIND_ADDR", "127.0.0.1:3000"),
			("MEDIA_DIR", "/var/lib/bookshelf"),
			("UNRELATED", "x"),
		])).unwrap();
		assert_eq!(config.database_url, "sqlite::memory:");
		assert_eq!(config.bind_addr.port(), 3000);
		assert_eq!(config.media_dir, PathBuf::from("/var/lib/bookshelf"));
	}

	#[test]
	fn bad_bind_addr_is_reported() {
		let err = Config::from_lookup(lookup(&[("BIND_ADDR", "localhost")])).unwrap_err();
		assert!(matches!(err, ConfigError::Invalid { name: "BIND_ADDR", .. }));
		assert_eq!(err.to_string(), "invalid BIND_ADDR: \"localhost\"");
	}
}
