pub const PAGE_SIZE: i64 = 12;

#[derive(Debug, Clone)]
pub struct Page<T> {
	pub items: Vec<T>,
	pub number: i64,
	pub num_pages: i64,
	pub total: i64,
}

impl<T> Page<T> {
	pub fn has_previous(&self) -> bool {
		self.number > 1
	}

	pub fn has_next(&self) -> bool {
		self.number < self.num_pages
	}
}

/// Page number and row offset to actually serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
	pub number: i64,
	pub num_pages: i64,
	pub offset: i64,
	pub limit: i64,
}

impl Window {
	/// Anything outside `1..=num_pages` is served as the last page. An empty
	/// listing still has one (empty) page.
	pub fn resolve(requested: i64, total: i64, page_size: i64) -> Self {
		let page_size = page_size.max(1);
		let num_pages = ((total + page_size - 1) / page_size).max(1);
		let number = if (1..=num_pages).contains(&requested) { requested } else { num_pages };
		Window {
			number,
			num_pages,
			offset: (number - 1) * page_size,
			limit: page_size,
		}
	}

	pub fn page<T>(self, items: Vec<T>, total: i64) -> Page<T> {
		Page {
			items,
			number: self.number,
			num_pages: self.num_pages,
			total,
		}
	}
}

/// The `page` query parameter; anything that isn't a number means page 1.
pub fn page_param(raw: Option<&str>) -> i64 {
	raw.and_then(|raw| raw.trim().parse().ok()).unwrap_or(1)
}
