//! Uploaded cover images, stored under `<media_dir>/covers` and served from `/media`.

use std::io;
use std::path::Path;

use axum::body::Bytes;
use image::ImageFormat;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CoverUpload {
	pub file_name: Option<String>,
	pub content_type: Option<String>,
	pub data: Bytes,
}

impl CoverUpload {
	pub fn is_image(&self) -> bool {
		self.extension().is_some()
	}

	/// File extension for the format the bytes actually carry. The client's
	/// file name and content type play no part; anything outside the raster
	/// formats browsers render inline (SVG included) gives `None`.
	fn extension(&self) -> Option<&'static str> {
		match image::guess_format(&self.data).ok()? {
			ImageFormat::Png => Some("png"),
			ImageFormat::Jpeg => Some("jpg"),
			ImageFormat::Gif => Some("gif"),
			ImageFormat::WebP => Some("webp"),
			_ => None,
		}
	}
}

/// Writes the upload under a fresh name and returns its path relative to
/// `media_dir`.
pub async fn store(media_dir: &Path, upload: &CoverUpload) -> io::Result<String> {
	let extension = upload.extension()
		.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "cover is not a supported image"))?;

	let dir = media_dir.join("covers");
	tokio::fs::create_dir_all(&dir).await?;

	let name = format!("{}.{extension}", Uuid::new_v4().simple());
	tokio::fs::write(dir.join(&name), &upload.data).await?;

	tracing::info!(file = %name, bytes = upload.data.len(), "cover stored");
	Ok(format!("covers/{name}"))
}

/// Removes a stored cover. A file that is already gone is not an error.
pub async fn remove(media_dir: &Path, path: &str) -> io::Result<()> {
	match tokio::fs::remove_file(media_dir.join(path)).await {
		Ok(()) => {
			tracing::info!(file = %path, "cover removed");
			Ok(())
		},
		Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
		Err(err) => Err(err),
	}
}
