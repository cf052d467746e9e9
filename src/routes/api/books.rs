use axum::{
    Router,
    extract::{Path, State},
    response::{IntoResponse, Json},
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use serde_json::json;

use crate::auth::Role;
use crate::error::Result;
use crate::repositories::{BookCreateRequest, BookUpdateRequest};
use crate::routes::api::authenticate;
use crate::routes::api::responses::BookResponse;
use crate::server::AppState;

pub fn create_book_routes() -> Router<AppState> {
    Router::new()
        .route("/books", post(handle_create_book).get(handle_get_books))
        .route(
            "/books/{book_id}",
            get(handle_get_book)
                .patch(handle_update_book)
                .delete(handle_delete_book),
        )
}

async fn handle_create_book(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<BookCreateRequest>,
) -> Result<impl IntoResponse> {
    let user_id = authenticate(&jar, &state, Role::EditBook)?;
    let book = state.book_service.create(&user_id, req).await?;

    Ok(Json(BookResponse::from(book)))
}

async fn handle_get_books(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse> {
    let user_id = authenticate(&jar, &state, Role::EditBook)?;
    let books = state.book_service.find_by_user(&user_id).await?;

    let books: Vec<BookResponse> = books.into_iter().map(BookResponse::from).collect();
    Ok(Json(json!({ "books": books })))
}

async fn handle_get_book(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(book_id): Path<String>,
) -> Result<impl IntoResponse> {
    let user_id = authenticate(&jar, &state, Role::EditBook)?;
    let book = state.book_service.find_by_id(&user_id, &book_id).await?;

    Ok(Json(BookResponse::from(book)))
}

async fn handle_update_book(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(book_id): Path<String>,
    Json(req): Json<BookUpdateRequest>,
) -> Result<impl IntoResponse> {
    let user_id = authenticate(&jar, &state, Role::EditBook)?;
    let book = state.book_service.update(&user_id, &book_id, req).await?;

    Ok(Json(BookResponse::from(book)))
}

async fn handle_delete_book(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(book_id): Path<String>,
) -> Result<impl IntoResponse> {
    let user_id = authenticate(&jar, &state, Role::EditBook)?;
    state.book_service.delete(&user_id, &book_id).await?;

    Ok(Json(json!({ "message": "Book deleted successfully" })))
}
