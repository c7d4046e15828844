//! Route handlers: one service call each, then a page or a redirect.

use axum::{
	extract::{Multipart, Path, Query, State},
	response::{IntoResponse, Redirect, Response},
	Form,
};
use chrono::NaiveDate;
use maud::Markup;

use crate::catalog::{self, BookFields};
use crate::context::{Level, RequestContext};
use crate::covers::{self, CoverUpload};
use crate::error::{AppError, AppResult, ValidationErrors};
use crate::pagination::{page_param, PAGE_SIZE};
use crate::types::{
	Bid, DateFinishedForm, FormLogin, FormRegister, ListParams, NextParam, ReviewForm, Rid,
	ShelfForm, ShelfParams, ShelfType, ViewMode, ViewParams,
};
use crate::{accounts, reviews, shelves, templates, AppState};

fn book_url(id: Bid) -> String {
	format!("/books/{id}/")
}

/// Only same-site paths are followed after logging in.
fn safe_next(next: Option<&str>) -> Option<&str> {
	next.filter(|next| next.starts_with('/') && !next.starts_with("//") && !next.starts_with("/\\"))
}

pub async fn home(
	State(state): State<AppState>,
	ctx: RequestContext,
	Query(params): Query<ViewParams>,
) -> AppResult<Markup> {
	let recent = catalog::recent(&state.db, PAGE_SIZE).await?;
	Ok(templates::home(&ctx, &recent, ViewMode::parse(params.view.as_deref())))
}

pub async fn book_list(
	State(state): State<AppState>,
	ctx: RequestContext,
	Query(params): Query<ListParams>,
) -> AppResult<Markup> {
	let query = params.q.as_deref().filter(|q| !q.is_empty());
	let page = catalog::list(&state.db, query, page_param(params.page.as_deref()), PAGE_SIZE).await?;
	Ok(templates::book_list(&ctx, &page, query, ViewMode::parse(params.view.as_deref())))
}

pub async fn book_detail(
	State(state): State<AppState>,
	ctx: RequestContext,
	Path(id): Path<Bid>,
) -> AppResult<Markup> {
	let book = catalog::get(&state.db, id).await?;
	let reviews = reviews::list_for_book(&state.db, id).await?;
	let (shelf, own_review) = match &ctx.user {
		Some(user) => (
			shelves::entry_for(&state.db, user.id, id).await?,
			reviews::get_for_user_book(&state.db, user.id, id).await?,
		),
		None => (None, None),
	};
	Ok(templates::book_detail(&ctx, &book, &reviews, shelf.as_ref(), own_review.as_ref()))
}

struct BookSubmission {
	fields: BookFields,
	cover: Option<CoverUpload>,
}

async fn read_book_submission(mut multipart: Multipart) -> AppResult<BookSubmission> {
	let mut fields = BookFields::default();
	let mut cover = None;

	while let Some(field) = multipart.next_field().await? {
		let name = field.name().unwrap_or_default().to_string();
		match name.as_str() {
			"cover_image" => {
				let file_name = field.file_name().map(str::to_string);
				let content_type = field.content_type().map(str::to_string);
				let data = field.bytes().await?;
				// browsers send an empty part when no file was picked
				if !data.is_empty() {
					cover = Some(CoverUpload { file_name, content_type, data });
				}
			},
			"title" => fields.title = field.text().await?,
			"author" => fields.author = field.text().await?,
			"description" => fields.description = field.text().await?,
			"cover_url" => fields.cover_url = field.text().await?,
			"isbn" => fields.isbn = field.text().await?,
			"published_year" => fields.published_year = field.text().await?,
			_ => {},
		}
	}

	Ok(BookSubmission { fields, cover })
}

/// Validates the whole submission and, only if it is clean, stores the
/// uploaded cover. Returns the stored path (if any) or the form errors.
async fn accept_submission(
	state: &AppState,
	submission: &BookSubmission,
) -> AppResult<Result<Option<String>, ValidationErrors>> {
	let mut errors = submission.fields.validate().err().unwrap_or_default();
	if let Some(cover) = &submission.cover {
		if !cover.is_image() {
			errors.add("cover_image", "Upload a valid image. The file you uploaded was either not an image or a corrupted image.");
		}
	}
	if !errors.is_empty() {
		return Ok(Err(errors));
	}

	let stored = match &submission.cover {
		Some(cover) => Some(covers::store(&state.media_dir, cover).await?),
		None => None,
	};
	Ok(Ok(stored))
}

/// Drops a stored cover that no book refers to any more.
async fn discard_cover(state: &AppState, cover_image: Option<String>) {
	let Some(path) = cover_image else { return };
	if let Err(err) = covers::remove(&state.media_dir, &path).await {
		tracing::warn!(file = %path, error = %err, "can't remove cover");
	}
}

pub async fn add_book_form(ctx: RequestContext) -> AppResult<Markup> {
	ctx.require_user()?;
	Ok(templates::book_form(&ctx, "Add book", "/books/add/", &BookFields::default(), &ValidationErrors::new(), None))
}

pub async fn add_book(
	State(state): State<AppState>,
	ctx: RequestContext,
	multipart: Multipart,
) -> AppResult<Response> {
	ctx.require_user()?;
	let submission = read_book_submission(multipart).await?;

	let cover_image = match accept_submission(&state, &submission).await? {
		Ok(cover_image) => cover_image,
		Err(errors) => {
			return Ok(templates::book_form(&ctx, "Add book", "/books/add/", &submission.fields, &errors, None).into_response());
		},
	};

	match catalog::add(&state.db, &submission.fields, cover_image.clone()).await {
		Ok(book) => {
			ctx.flash(Level::Success, format!("Added \"{}\"!", book.title));
			Ok(Redirect::to(&book_url(book.id)).into_response())
		},
		Err(err) => {
			discard_cover(&state, cover_image).await;
			match err {
				AppError::Validation(errors) => {
					Ok(templates::book_form(&ctx, "Add book", "/books/add/", &submission.fields, &errors, None).into_response())
				},
				err => Err(err),
			}
		},
	}
}

pub async fn edit_book_form(
	State(state): State<AppState>,
	ctx: RequestContext,
	Path(id): Path<Bid>,
) -> AppResult<Markup> {
	ctx.require_user()?;
	let book = catalog::get(&state.db, id).await?;
	let action = format!("{}edit/", book_url(id));
	Ok(templates::book_form(&ctx, &format!("Edit {}", book.title), &action, &BookFields::from(&book), &ValidationErrors::new(), Some(&book)))
}

pub async fn edit_book(
	State(state): State<AppState>,
	ctx: RequestContext,
	Path(id): Path<Bid>,
	multipart: Multipart,
) -> AppResult<Response> {
	ctx.require_user()?;
	let book = catalog::get(&state.db, id).await?;
	let submission = read_book_submission(multipart).await?;
	let action = format!("{}edit/", book_url(id));
	let title = format!("Edit {}", book.title);

	let cover_image = match accept_submission(&state, &submission).await? {
		Ok(cover_image) => cover_image,
		Err(errors) => {
			return Ok(templates::book_form(&ctx, &title, &action, &submission.fields, &errors, Some(&book)).into_response());
		},
	};

	let replaced = cover_image.is_some();
	match catalog::edit(&state.db, id, &submission.fields, cover_image.clone()).await {
		Ok(updated) => {
			if replaced {
				discard_cover(&state, book.cover_image).await;
			}
			ctx.flash(Level::Success, format!("Updated \"{}\"!", updated.title));
			Ok(Redirect::to(&book_url(updated.id)).into_response())
		},
		Err(err) => {
			discard_cover(&state, cover_image).await;
			match err {
				AppError::Validation(errors) => {
					Ok(templates::book_form(&ctx, &title, &action, &submission.fields, &errors, Some(&book)).into_response())
				},
				err => Err(err),
			}
		},
	}
}

pub async fn delete_book_confirm(
	State(state): State<AppState>,
	ctx: RequestContext,
	Path(id): Path<Bid>,
) -> AppResult<Markup> {
	ctx.require_user()?;
	let book = catalog::get(&state.db, id).await?;
	Ok(templates::delete_book(&ctx, &book))
}

pub async fn delete_book(
	State(state): State<AppState>,
	ctx: RequestContext,
	Path(id): Path<Bid>,
) -> AppResult<Redirect> {
	ctx.require_user()?;
	let book = catalog::get(&state.db, id).await?;
	let cover_image = catalog::delete(&state.db, id).await?;
	discard_cover(&state, cover_image).await;
	ctx.flash(Level::Success, format!("Deleted \"{}\"", book.title));
	Ok(Redirect::to("/books/"))
}

pub async fn add_to_shelf(
	State(state): State<AppState>,
	ctx: RequestContext,
	Path(id): Path<Bid>,
	Form(form): Form<ShelfForm>,
) -> AppResult<Redirect> {
	let user = ctx.require_user()?;
	let book = catalog::get(&state.db, id).await?;
	let (entry, created) = shelves::set_shelf(&state.db, user.id, id, form.shelf_type.as_deref()).await?;

	let verb = if created { "Added" } else { "Moved" };
	ctx.flash(Level::Success, format!("{verb} \"{}\" to {}", book.title, entry.shelf_type.label()));
	Ok(Redirect::to(&book_url(id)))
}

pub async fn remove_from_shelf(
	State(state): State<AppState>,
	ctx: RequestContext,
	Path(id): Path<Bid>,
) -> AppResult<Redirect> {
	let user = ctx.require_user()?;
	let book = catalog::get(&state.db, id).await?;
	shelves::remove_shelf(&state.db, user.id, id).await?;
	ctx.flash(Level::Success, format!("Removed \"{}\" from your shelves", book.title));
	Ok(Redirect::to(&book_url(id)))
}

pub async fn update_date_finished(
	State(state): State<AppState>,
	ctx: RequestContext,
	Path(id): Path<Bid>,
	Form(form): Form<DateFinishedForm>,
) -> AppResult<Redirect> {
	let user = ctx.require_user()?;
	catalog::ensure_exists(&state.db, id).await?;

	let date = match form.date_finished.as_deref().map(str::trim) {
		None | Some("") => None,
		Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
			Ok(date) => Some(date),
			Err(_) => {
				ctx.flash(Level::Error, "Enter a valid date.");
				return Ok(Redirect::to(&book_url(id)));
			},
		},
	};

	if shelves::set_date_finished(&state.db, user.id, id, date).await? {
		let message = if date.is_some() { "Date finished updated!" } else { "Date finished cleared!" };
		ctx.flash(Level::Success, message);
	}
	Ok(Redirect::to(&book_url(id)))
}

pub async fn my_shelves(
	State(state): State<AppState>,
	ctx: RequestContext,
	Query(params): Query<ShelfParams>,
) -> AppResult<Markup> {
	let user = ctx.require_user()?;
	let filter = params.shelf.as_deref().and_then(ShelfType::parse);
	let (page, counts) = shelves::list_for_user(&state.db, user.id, filter, page_param(params.page.as_deref())).await?;
	Ok(templates::my_shelves(&ctx, &page, &counts, filter, ViewMode::parse(params.view.as_deref())))
}

pub async fn review_form(
	State(state): State<AppState>,
	ctx: RequestContext,
	Path(id): Path<Bid>,
) -> AppResult<Markup> {
	let user = ctx.require_user()?;
	let book = catalog::get(&state.db, id).await?;
	let existing = reviews::get_for_user_book(&state.db, user.id, id).await?;
	let content = existing.map(|review| review.content).unwrap_or_default();
	Ok(templates::review_form(&ctx, &book, &content, &ValidationErrors::new()))
}

pub async fn save_review(
	State(state): State<AppState>,
	ctx: RequestContext,
	Path(id): Path<Bid>,
	Form(form): Form<ReviewForm>,
) -> AppResult<Response> {
	let user = ctx.require_user()?;
	let book = catalog::get(&state.db, id).await?;

	match reviews::upsert(&state.db, user.id, id, &form.content).await {
		Ok(_) => {
			ctx.flash(Level::Success, "Review saved!");
			Ok(Redirect::to(&book_url(id)).into_response())
		},
		Err(AppError::Validation(errors)) => {
			Ok(templates::review_form(&ctx, &book, &form.content, &errors).into_response())
		},
		Err(err) => Err(err),
	}
}

pub async fn delete_review(
	State(state): State<AppState>,
	ctx: RequestContext,
	Path(id): Path<Rid>,
) -> AppResult<Redirect> {
	let user = ctx.require_user()?;
	let book = reviews::delete(&state.db, id, user.id).await?;
	ctx.flash(Level::Success, "Review deleted");
	Ok(Redirect::to(&book_url(book)))
}

pub async fn login_form(ctx: RequestContext, Query(params): Query<NextParam>) -> Markup {
	templates::login(&ctx, "", safe_next(params.next.as_deref()), &ValidationErrors::new())
}

pub async fn login(
	State(state): State<AppState>,
	ctx: RequestContext,
	Form(form): Form<FormLogin>,
) -> AppResult<Response> {
	let next = safe_next(form.next.as_deref());
	match accounts::login(&state.db, &form.username, &form.pass).await {
		Ok(token) => {
			ctx.start_session(token);
			Ok(Redirect::to(next.unwrap_or("/")).into_response())
		},
		Err(AppError::Validation(errors)) => {
			Ok(templates::login(&ctx, &form.username, next, &errors).into_response())
		},
		Err(err) => Err(err),
	}
}

pub async fn register_form(ctx: RequestContext) -> Markup {
	templates::register(&ctx, "", &ValidationErrors::new())
}

pub async fn register(
	State(state): State<AppState>,
	ctx: RequestContext,
	Form(form): Form<FormRegister>,
) -> AppResult<Response> {
	let mismatch = form.pass != form.pass_confirm;
	let registered = if mismatch {
		// report the other field errors alongside the mismatch
		let mut errors = accounts::check_registration(&form.username, &form.pass).err().unwrap_or_default();
		errors.add("pass_confirm", "The two password fields didn't match.");
		Err(AppError::Validation(errors))
	} else {
		accounts::register(&state.db, &form.username, &form.pass).await
	};

	match registered {
		Ok(user) => {
			let token = accounts::login(&state.db, &user.username, &form.pass).await?;
			ctx.start_session(token);
			ctx.flash(Level::Success, format!("Welcome, {}!", user.username));
			Ok(Redirect::to("/").into_response())
		},
		Err(AppError::Validation(errors)) => {
			Ok(templates::register(&ctx, &form.username, &errors).into_response())
		},
		Err(err) => Err(err),
	}
}

pub async fn logout(State(state): State<AppState>, ctx: RequestContext) -> AppResult<Redirect> {
	if let Some(token) = ctx.end_session() {
		accounts::logout(&state.db, &token).await?;
	}
	Ok(Redirect::to("/"))
}

pub async fn delete_account(State(state): State<AppState>, ctx: RequestContext) -> AppResult<Redirect> {
	let user = ctx.require_user()?;
	accounts::delete_user(&state.db, user.id).await?;
	ctx.end_session();
	Ok(Redirect::to("/"))
}

pub async fn not_found() -> AppError {
	AppError::NotFound
}
