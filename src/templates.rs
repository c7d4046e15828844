use maud::{html, Markup, DOCTYPE};

use crate::catalog::BookFields;
use crate::context::RequestContext;
use crate::error::{ValidationErrors, NON_FIELD};
use crate::pagination::Page;
use crate::types::{Book, BookReview, Review, ShelfCounts, ShelfEntry, ShelfType, ShelvedBook, ViewMode};

const STYLE: &str = r#"
body { font-family: sans-serif; max-width: 60rem; margin: 0 auto; padding: 1rem; }
nav a, nav form { margin-right: 1rem; display: inline; }
.flash { padding: .5rem; margin: 1rem 0; }
.flash.success { background: #e6f4ea; }
.flash.error, .errors { background: #fdecea; }
.grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(10rem, 1fr)); gap: 1rem; }
.list .book { display: flex; gap: 1rem; }
.book img { max-width: 8rem; }
.pager a, .pager span { margin-right: .5rem; }
"#;

fn query_string(params: &[(&str, &str)]) -> String {
	let pairs: Vec<String> = params.iter()
		.filter(|(_, value)| !value.is_empty())
		.map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
		.collect();
	if pairs.is_empty() { String::new() } else { format!("?{}", pairs.join("&")) }
}

pub fn layout(ctx: &RequestContext, title: &str, content: Markup) -> Markup {
	html! {
		(DOCTYPE)
		html {
			head {
				meta charset="utf-8";
				title { (title) " · Bookshelf" }
				style { (STYLE) }
			}
			body {
				nav {
					a href="/" { "Bookshelf" }
					a href="/books/" { "Browse" }
					@if let Some(user) = &ctx.user {
						a href="/my-shelves/" { "My Shelves" }
						a href="/books/add/" { "Add Book" }
						span { (user.username) }
						form method="post" action="/accounts/logout/" {
							button { "Log out" }
						}
					} @else {
						a href="/accounts/login/" { "Log in" }
						a href="/accounts/register/" { "Register" }
					}
				}
				@if let Some(flash) = ctx.take_flash() {
					div class={ "flash " (flash.level.as_str()) } { (flash.message) }
				}
				h1 { (title) }
				(content)
			}
		}
	}
}

pub fn error_page(title: &str, detail: &str) -> Markup {
	layout(&RequestContext::anonymous(), title, html! {
		p { (detail) }
		p { a href="/books/" { "Back to the catalog" } }
	})
}

fn field_errors(errors: &ValidationErrors, field: &str) -> Markup {
	html! {
		@if errors.has(field) {
			ul.errors {
				@for message in errors.field(field) {
					li { (message) }
				}
			}
		}
	}
}

fn view_toggle(params: &[(&str, &str)]) -> Markup {
	let with_view = |view: &str| {
		let mut params = params.to_vec();
		params.push(("view", view));
		query_string(&params)
	};
	html! {
		p.view-toggle {
			a href=(with_view("grid")) { "Grid" }
			" | "
			a href=(with_view("list")) { "List" }
		}
	}
}

fn pager<T>(page: &Page<T>, params: &[(&str, &str)]) -> Markup {
	let link = |number: i64| {
		let number = number.to_string();
		let mut params = params.to_vec();
		params.push(("page", number.as_str()));
		query_string(&params)
	};
	html! {
		@if page.num_pages > 1 {
			div.pager {
				@if page.has_previous() {
					a href=(link(1)) { "« first" }
					a href=(link(page.number - 1)) { "previous" }
				}
				span { "Page " (page.number) " of " (page.num_pages) }
				@if page.has_next() {
					a href=(link(page.number + 1)) { "next" }
					a href=(link(page.num_pages)) { "last »" }
				}
			}
		}
	}
}

fn book_card(book: &Book, extra: Markup) -> Markup {
	html! {
		div.book {
			@if let Some(src) = book.cover_src() {
				a href={ "/books/" (book.id) "/" } { img src=(src) alt=(book.title); }
			}
			div {
				a href={ "/books/" (book.id) "/" } { strong { (book.title) } }
				div { "by " (book.author) }
				@if let Some(year) = book.published_year {
					div { (year) }
				}
				(extra)
			}
		}
	}
}

fn books(books: &[Book], view: ViewMode) -> Markup {
	html! {
		@if books.is_empty() {
			p { "No books found." }
		} @else {
			div class=(view.as_str()) {
				@for book in books {
					(book_card(book, html! {}))
				}
			}
		}
	}
}

pub fn home(ctx: &RequestContext, recent: &[Book], view: ViewMode) -> Markup {
	layout(ctx, "Recently added", html! {
		(view_toggle(&[]))
		(books(recent, view))
		p { a href="/books/" { "Browse the whole catalog" } }
	})
}

pub fn book_list(ctx: &RequestContext, page: &Page<Book>, query: Option<&str>, view: ViewMode) -> Markup {
	let query = query.unwrap_or_default();
	layout(ctx, "Books", html! {
		form method="get" action="/books/" {
			input type="search" name="q" value=(query) placeholder="Title or author";
			input type="hidden" name="view" value=(view.as_str());
			button { "Search" }
		}
		@if !query.is_empty() {
			p { (page.total) " result(s) for “" (query) "”" }
		}
		(view_toggle(&[("q", query)]))
		(books(&page.items, view))
		(pager(page, &[("q", query), ("view", view.as_str())]))
	})
}

pub fn book_detail(
	ctx: &RequestContext,
	book: &Book,
	reviews: &[BookReview],
	shelf: Option<&ShelfEntry>,
	own_review: Option<&Review>,
) -> Markup {
	let base = format!("/books/{}/", book.id);
	layout(ctx, &book.title, html! {
		@if let Some(src) = book.cover_src() {
			img src=(src) alt=(book.title);
		}
		p { "by " strong { (book.author) } }
		@if let Some(year) = book.published_year {
			p { "Published " (year) }
		}
		@if !book.isbn.is_empty() {
			p { "ISBN " (book.isbn) }
		}
		@if !book.description.is_empty() {
			p { (book.description) }
		}

		@if ctx.user.is_some() {
			section.shelf {
				h2 { "Your shelf" }
				form method="post" action={ (base) "add-to-shelf/" } {
					select name="shelf_type" {
						@for shelf_type in ShelfType::ALL {
							option value=(shelf_type.as_str())
								selected[shelf.is_some_and(|entry| entry.shelf_type == shelf_type)] {
								(shelf_type.label())
							}
						}
					}
					button { @if shelf.is_some() { "Move" } @else { "Add to shelf" } }
				}
				@if let Some(entry) = shelf {
					p { "On your " (entry.shelf_type.label()) " shelf since " (entry.added_at.format("%Y-%m-%d")) }
					@if entry.shelf_type == ShelfType::Read {
						form method="post" action={ (base) "update-date-finished/" } {
							label {
								"Finished on "
								input type="date" name="date_finished"
									value=(entry.date_finished.map(|date| date.to_string()).unwrap_or_default());
							}
							button { "Save" }
						}
					}
					form method="post" action={ (base) "remove-from-shelf/" } {
						button { "Remove from shelves" }
					}
				}
				p {
					a href={ (base) "review/" } { @if own_review.is_some() { "Edit your review" } @else { "Write a review" } }
					" · "
					a href={ (base) "edit/" } { "Edit book" }
					" · "
					a href={ (base) "delete/" } { "Delete book" }
				}
			}
		}

		section.reviews {
			h2 { "Reviews" }
			@if reviews.is_empty() {
				p { "No reviews yet." }
			}
			@for entry in reviews {
				article.review {
					p { strong { (entry.username) } " · " (entry.review.updated_at.format("%Y-%m-%d")) }
					p { (entry.review.content) }
					@if ctx.user.as_ref().is_some_and(|user| user.id == entry.review.user_id) {
						form method="post" action={ "/reviews/" (entry.review.id) "/delete/" } {
							button { "Delete" }
						}
					}
				}
			}
		}
	})
}

pub fn book_form(
	ctx: &RequestContext,
	title: &str,
	action: &str,
	fields: &BookFields,
	errors: &ValidationErrors,
	existing: Option<&Book>,
) -> Markup {
	layout(ctx, title, html! {
		form method="post" action=(action) enctype="multipart/form-data" {
			p {
				label for="title" { "Title" }
				input id="title" type="text" name="title" value=(fields.title) required maxlength="255";
				(field_errors(errors, "title"))
			}
			p {
				label for="author" { "Author" }
				input id="author" type="text" name="author" value=(fields.author) required maxlength="255";
				(field_errors(errors, "author"))
			}
			p {
				label for="description" { "Description" }
				textarea id="description" name="description" rows="4" { (fields.description) }
				(field_errors(errors, "description"))
			}
			p {
				label for="cover_url" { "Cover Image URL (optional)" }
				input id="cover_url" type="url" name="cover_url" value=(fields.cover_url) placeholder="https://...";
				small { "Provide a URL to a cover image" }
				(field_errors(errors, "cover_url"))
			}
			p {
				label for="cover_image" { "Or Upload Cover Image (optional)" }
				input id="cover_image" type="file" name="cover_image" accept="image/*";
				@if let Some(image) = existing.and_then(|book| book.cover_image.as_deref()) {
					small { "Currently: " (image) }
				}
				(field_errors(errors, "cover_image"))
			}
			p {
				label for="isbn" { "ISBN" }
				input id="isbn" type="text" name="isbn" value=(fields.isbn) maxlength="13";
				(field_errors(errors, "isbn"))
			}
			p {
				label for="published_year" { "Published year" }
				input id="published_year" type="number" name="published_year" value=(fields.published_year);
				(field_errors(errors, "published_year"))
			}
			button { "Save" }
		}
	})
}

pub fn delete_book(ctx: &RequestContext, book: &Book) -> Markup {
	layout(ctx, "Delete book", html! {
		p { "Delete “" (book.title) "” by " (book.author) "? Everyone's shelf entries and reviews for it go too." }
		form method="post" action={ "/books/" (book.id) "/delete/" } {
			button { "Delete" }
			" "
			a href={ "/books/" (book.id) "/" } { "Cancel" }
		}
	})
}

pub fn review_form(ctx: &RequestContext, book: &Book, content: &str, errors: &ValidationErrors) -> Markup {
	layout(ctx, &format!("Review of {}", book.title), html! {
		form method="post" action={ "/books/" (book.id) "/review/" } {
			p {
				label for="content" { "Your Review" }
				textarea id="content" name="content" rows="6" placeholder="Write your review..." { (content) }
				(field_errors(errors, "content"))
			}
			button { "Save review" }
		}
	})
}

pub fn my_shelves(
	ctx: &RequestContext,
	page: &Page<ShelvedBook>,
	counts: &ShelfCounts,
	current: Option<ShelfType>,
	view: ViewMode,
) -> Markup {
	let current_name = current.map(ShelfType::as_str).unwrap_or("all");
	layout(ctx, "My Shelves", html! {
		ul.shelf-tabs {
			li {
				a href=(query_string(&[("shelf", "all"), ("view", view.as_str())])) {
					"All (" (counts.all) ")"
				}
			}
			@for shelf_type in ShelfType::ALL {
				li {
					a href=(query_string(&[("shelf", shelf_type.as_str()), ("view", view.as_str())])) {
						(shelf_type.label()) " (" (counts.get(Some(shelf_type))) ")"
					}
				}
			}
		}
		(view_toggle(&[("shelf", current_name)]))
		@if page.items.is_empty() {
			p { "Nothing on this shelf yet." }
		} @else {
			div class=(view.as_str()) {
				@for shelved in &page.items {
					(book_card(&shelved.book, html! {
						div { (shelved.entry.shelf_type.label()) }
						@if let Some(date) = shelved.entry.date_finished {
							div { "Finished " (date) }
						}
					}))
				}
			}
		}
		(pager(page, &[("shelf", current_name), ("view", view.as_str())]))
		form method="post" action="/accounts/delete/" {
			button { "Delete my account" }
		}
	})
}

fn non_field_errors(errors: &ValidationErrors) -> Markup {
	field_errors(errors, NON_FIELD)
}

pub fn login(ctx: &RequestContext, username: &str, next: Option<&str>, errors: &ValidationErrors) -> Markup {
	layout(ctx, "Log in", html! {
		(non_field_errors(errors))
		form method="post" action="/accounts/login/" {
			@if let Some(next) = next {
				input type="hidden" name="next" value=(next);
			}
			p {
				label for="username" { "Username" }
				input id="username" name="username" type="text" value=(username) autofocus;
			}
			p {
				label for="pass" { "Password" }
				input id="pass" name="pass" type="password";
			}
			button { "Log in" }
		}
		p { "No account? " a href="/accounts/register/" { "Register" } }
	})
}

pub fn register(ctx: &RequestContext, username: &str, errors: &ValidationErrors) -> Markup {
	layout(ctx, "Register", html! {
		(non_field_errors(errors))
		form method="post" action="/accounts/register/" {
			p {
				label for="username" { "Username" }
				input id="username" name="username" type="text" value=(username) autofocus;
				(field_errors(errors, "username"))
			}
			p {
				label for="pass" { "Password" }
				input id="pass" name="pass" type="password";
				(field_errors(errors, "pass"))
			}
			p {
				label for="pass_confirm" { "Password confirmation" }
				input id="pass_confirm" name="pass_confirm" type="password";
				(field_errors(errors, "pass_confirm"))
			}
			button { "Register" }
		}
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;

	fn dune() -> Book {
		Book {
			id: 7,
			title: "Dune".into(),
			author: "Herbert".into(),
			description: "<script>spice</script>".into(),
			cover_url: None,
			cover_image: None,
			isbn: String::new(),
			published_year: None,
			created_at: Utc::now(),
		}
	}

	#[test]
	fn query_strings_skip_empty_values() {
		assert_eq!(query_string(&[]), "");
		assert_eq!(query_string(&[("q", ""), ("page", "2")]), "?page=2");
		assert_eq!(query_string(&[("q", "le guin"), ("view", "list")]), "?q=le%20guin&view=list");
	}

	#[test]
	fn book_text_is_escaped() {
		let page = book_detail(&RequestContext::anonymous(), &dune(), &[], None, None).into_string();
		assert!(page.contains("&lt;script&gt;spice&lt;/script&gt;"));
		assert!(!page.contains("add-to-shelf"));
	}

	#[test]
	fn pager_only_when_needed() {
		let single = Page { items: vec![dune()], number: 1, num_pages: 1, total: 1 };
		assert!(!pager(&single, &[]).into_string().contains("pager"));

		let middle = Page { items: vec![dune()], number: 2, num_pages: 3, total: 25 };
		let html = pager(&middle, &[("q", "dune")]).into_string();
		assert!(html.contains("?q=dune&amp;page=1"));
		assert!(html.contains("?q=dune&amp;page=3"));
		assert!(html.contains("Page 2 of 3"));
	}

	#[test]
	fn form_shows_field_errors() {
		let errors = ValidationErrors::single("title", "This field is required.");
		let html = book_form(
			&RequestContext::anonymous(), "Add book", "/books/add/",
			&BookFields::default(), &errors, None,
		).into_string();
		assert!(html.contains("This field is required."));
		assert!(html.contains("multipart/form-data"));
	}
}
