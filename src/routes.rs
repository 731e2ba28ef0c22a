use axum::{
	extract::{FromRequest, FromRequestParts, Path, Query, State},
	http::{header::LOCATION, StatusCode},
	routing::{get, post},
	Json, Router,
};

use crate::auth::{AuthService, AuthUser};
use crate::books::BookService;
use crate::error::AppError;
use crate::types::{AuthResponse, Bid, BookForm, BookListItem, BookView, Credentials, PageParams};
use crate::AppState;

/// `Json` body whose rejection is reported as an `AppError`.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(AppError))]
pub struct QueryParams<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(Path), rejection(AppError))]
pub struct PathParam<T>(pub T);

pub fn routes() -> Router<AppState> {
	Router::new()
		.route("/auth/register", post(register))
		.route("/auth/login", post(login))
		.route("/book", get(list_books).post(create_book))
		.route("/book/bulk", post(create_books).delete(delete_books))
		.route("/book/:id", get(get_book).put(update_book).delete(delete_book))
}

async fn register(
	State(auth): State<AuthService>,
	JsonBody(creds): JsonBody<Credentials>,
) -> Result<Json<AuthResponse>, AppError> {
	Ok(Json(auth.register(creds).await?))
}

async fn login(
	State(auth): State<AuthService>,
	JsonBody(creds): JsonBody<Credentials>,
) -> Result<Json<AuthResponse>, AppError> {
	Ok(Json(auth.login(creds).await?))
}

async fn list_books(
	_user: AuthUser,
	State(books): State<BookService>,
	QueryParams(params): QueryParams<PageParams>,
) -> Result<Json<Vec<BookListItem>>, AppError> {
	Ok(Json(books.list(params).await?))
}

async fn get_book(
	_user: AuthUser,
	State(books): State<BookService>,
	PathParam(bid): PathParam<Bid>,
) -> Result<Json<BookView>, AppError> {
	Ok(Json(books.get(bid).await?))
}

async fn create_book(
	user: AuthUser,
	State(books): State<BookService>,
	JsonBody(form): JsonBody<BookForm>,
) -> Result<(StatusCode, [(axum::http::HeaderName, String); 1], Json<BookView>), AppError> {
	let view = books.create(form).await?;
	tracing::debug!(uid = user.uid, bid = view.id, "create requested");
	Ok((
		StatusCode::CREATED,
		[(LOCATION, format!("/book/{}", view.id))],
		Json(view),
	))
}

async fn create_books(
	_user: AuthUser,
	State(books): State<BookService>,
	JsonBody(forms): JsonBody<Vec<BookForm>>,
) -> Result<Json<Vec<BookView>>, AppError> {
	Ok(Json(books.create_bulk(forms).await?))
}

async fn update_book(
	_user: AuthUser,
	State(books): State<BookService>,
	PathParam(bid): PathParam<Bid>,
	JsonBody(form): JsonBody<BookForm>,
) -> Result<StatusCode, AppError> {
	books.update(bid, form).await?;
	Ok(StatusCode::NO_CONTENT)
}

async fn delete_book(
	_user: AuthUser,
	State(books): State<BookService>,
	PathParam(bid): PathParam<Bid>,
) -> Result<StatusCode, AppError> {
	books.delete(bid).await?;
	Ok(StatusCode::NO_CONTENT)
}

async fn delete_books(
	_user: AuthUser,
	State(books): State<BookService>,
	JsonBody(bids): JsonBody<Vec<Bid>>,
) -> Result<StatusCode, AppError> {
	books.delete_bulk(&bids).await?;
	Ok(StatusCode::NO_CONTENT)
}
