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
use crate::repositories::{EventCreateRequest, EventUpdateRequest};
use crate::routes::api::authenticate;
use crate::routes::api::responses::EventResponse;
use crate::server::AppState;

pub fn create_event_routes() -> Router<AppState> {
    Router::new()
        .route("/events", post(handle_create_event).get(handle_get_events))
        .route(
            "/events/{event_id}",
            get(handle_get_event)
                .patch(handle_update_event)
                .delete(handle_delete_event),
        )
}

async fn handle_create_event(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<EventCreateRequest>,
) -> Result<impl IntoResponse> {
    let user_id = authenticate(&jar, &state, Role::EditEvent)?;
    let event = state.event_service.create(&user_id, req).await?;

    Ok(Json(EventResponse::from(event)))
}

async fn handle_get_events(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse> {
    let user_id = authenticate(&jar, &state, Role::EditEvent)?;
    let events = state.event_service.find_upcoming(&user_id).await?;

    let events: Vec<EventResponse> = events.into_iter().map(EventResponse::from).collect();
    Ok(Json(json!({ "events": events })))
}

async fn handle_get_event(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(event_id): Path<String>,
) -> Result<impl IntoResponse> {
    let user_id = authenticate(&jar, &state, Role::EditEvent)?;
    let event = state.event_service.find_by_id(&user_id, &event_id).await?;

    Ok(Json(EventResponse::from(event)))
}

async fn handle_update_event(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(event_id): Path<String>,
    Json(req): Json<EventUpdateRequest>,
) -> Result<impl IntoResponse> {
    let user_id = authenticate(&jar, &state, Role::EditEvent)?;
    let event = state
        .event_service
        .update(&user_id, &event_id, req)
        .await?;

    Ok(Json(EventResponse::from(event)))
}

async fn handle_delete_event(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(event_id): Path<String>,
) -> Result<impl IntoResponse> {
    let user_id = authenticate(&jar, &state, Role::EditEvent)?;
    state.event_service.delete(&user_id, &event_id).await?;

    Ok(Json(json!({ "message": "Event deleted successfully" })))
}
