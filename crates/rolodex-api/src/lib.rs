pub mod auth;
pub mod channels;
pub mod contact_channels;
pub mod contacts;
pub mod error;
pub mod middleware;

use std::sync::Arc;

use axum::{
    Json, Router,
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post},
};
use tracing::error;

use rolodex_db::{Database, StoreError};

use crate::auth::AppState;
use crate::middleware::require_auth;

/// All routes, with the bearer-token guard on everything except the
/// session endpoints and `/health`.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/users", post(auth::signup))
        .route("/auth/access_token", post(auth::login))
        .route("/auth/refresh_token", get(auth::refresh_token))
        .route("/auth/confirmed_email/{token}", get(auth::confirm_email))
        .route("/health", get(health));

    let protected_routes = Router::new()
        .route("/auth/users/{email}", delete(auth::delete_user))
        .route("/auth/avatar", patch(auth::update_avatar))
        .route(
            "/contacts",
            get(contacts::list_contacts).post(contacts::create_contact),
        )
        .route("/contacts/birthdays", get(contacts::upcoming_birthdays))
        .route(
            "/contacts/{contact_id}",
            get(contacts::get_contact)
                .put(contacts::update_contact)
                .delete(contacts::delete_contact),
        )
        .route(
            "/channels",
            get(channels::list_channels).post(channels::create_channel),
        )
        .route(
            "/channels/{channel_id}",
            get(channels::get_channel)
                .put(channels::update_channel)
                .delete(channels::delete_channel),
        )
        .route(
            "/contactsChannels",
            get(contact_channels::list_contact_channels)
                .post(contact_channels::create_contact_channel),
        )
        .route(
            "/contactsChannels/{link_id}",
            get(contact_channels::get_contact_channel)
                .put(contact_channels::update_contact_channel)
                .delete(contact_channels::delete_contact_channel),
        )
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Run a blocking store call off the async runtime.
pub(crate) async fn with_db<T, F>(state: &AppState, f: F) -> Result<T, StoreError>
where
    F: FnOnce(&Database) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let db = Arc::clone(&state.db);
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StoreError::Database(anyhow::anyhow!("spawn_blocking join error: {}", e))
        })?
}
