use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use rolodex_db::StoreError;
use rolodex_db::models::LinkFields;
use rolodex_types::api::ContactChannelRequest;
use rolodex_types::models::{ContactChannel, User};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::with_db;

#[derive(Debug, Deserialize)]
pub struct LinkQuery {
    #[serde(default)]
    pub skip: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    100
}

pub async fn list_contact_channels(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<LinkQuery>,
) -> Result<Json<Vec<ContactChannel>>, ApiError> {
    let limit = query.limit.min(1000);
    let links = with_db(&state, move |db| {
        db.list_contact_channels(user.id, query.skip, limit)
    })
    .await?;
    Ok(Json(links))
}

pub async fn get_contact_channel(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(link_id): Path<i64>,
) -> Result<Json<ContactChannel>, ApiError> {
    let link = with_db(&state, move |db| db.get_contact_channel(user.id, link_id))
        .await?
        .ok_or_else(|| link_not_found(link_id))?;
    Ok(Json(link))
}

pub async fn create_contact_channel(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<ContactChannelRequest>,
) -> Result<(StatusCode, Json<ContactChannel>), ApiError> {
    let fields = link_fields(req)?;
    let link = with_db(&state, move |db| db.create_contact_channel(user.id, &fields))
        .await
        .map_err(link_error)?;
    Ok((StatusCode::CREATED, Json(link)))
}

pub async fn update_contact_channel(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(link_id): Path<i64>,
    Json(req): Json<ContactChannelRequest>,
) -> Result<Json<ContactChannel>, ApiError> {
    let fields = link_fields(req)?;
    let link = with_db(&state, move |db| {
        db.update_contact_channel(user.id, link_id, &fields)
    })
    .await
    .map_err(link_error)?
    .ok_or_else(|| link_not_found(link_id))?;
    Ok(Json(link))
}

pub async fn delete_contact_channel(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(link_id): Path<i64>,
) -> Result<Json<ContactChannel>, ApiError> {
    let link = with_db(&state, move |db| db.delete_contact_channel(user.id, link_id))
        .await?
        .ok_or_else(|| link_not_found(link_id))?;
    Ok(Json(link))
}

fn link_fields(req: ContactChannelRequest) -> Result<LinkFields, ApiError> {
    let value = req.channel_value.trim();
    if value.is_empty() {
        return Err(ApiError::bad_request("channel_value must not be empty"));
    }
    Ok(LinkFields {
        contact_id: req.contact_id,
        channel_id: req.channel_id,
        channel_value: value.to_string(),
    })
}

fn link_error(err: StoreError) -> ApiError {
    match err {
        StoreError::Conflict(_) => ApiError::conflict("Such channel value already exists in the DB"),
        StoreError::NotFound => ApiError::not_found("Contact or channel is not found"),
        other => other.into(),
    }
}

fn link_not_found(id: i64) -> ApiError {
    ApiError::not_found(format!("Contact channel {} is not found", id))
}
