use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::info;

use rolodex_db::StoreError;
use rolodex_types::api::ChannelRequest;
use rolodex_types::models::Channel;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::with_db;

// Channels are a shared taxonomy: any authenticated user may manage them.

pub async fn list_channels(State(state): State<AppState>) -> Result<Json<Vec<Channel>>, ApiError> {
    let channels = with_db(&state, |db| db.list_channels()).await?;
    Ok(Json(channels))
}

pub async fn get_channel(
    State(state): State<AppState>,
    Path(channel_id): Path<i64>,
) -> Result<Json<Channel>, ApiError> {
    let channel = with_db(&state, move |db| db.get_channel(channel_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Channel not found"))?;
    Ok(Json(channel))
}

pub async fn create_channel(
    State(state): State<AppState>,
    Json(req): Json<ChannelRequest>,
) -> Result<(StatusCode, Json<Channel>), ApiError> {
    let name = channel_name(&req)?;

    let lookup = name.clone();
    if with_db(&state, move |db| db.get_channel_by_name(&lookup)).await?.is_some() {
        return Err(name_taken(&name));
    }

    let create = name.clone();
    let channel = with_db(&state, move |db| db.create_channel(&create))
        .await
        .map_err(|e| match e {
            StoreError::Conflict(_) => name_taken(&name),
            other => other.into(),
        })?;

    info!("Created channel {} ({})", channel.id, channel.name);
    Ok((StatusCode::CREATED, Json(channel)))
}

pub async fn update_channel(
    State(state): State<AppState>,
    Path(channel_id): Path<i64>,
    Json(req): Json<ChannelRequest>,
) -> Result<Json<Channel>, ApiError> {
    let name = channel_name(&req)?;

    let rename = name.clone();
    let channel = with_db(&state, move |db| db.update_channel(channel_id, &rename))
        .await
        .map_err(|e| match e {
            StoreError::Conflict(_) => name_taken(&name),
            other => other.into(),
        })?
        .ok_or_else(|| ApiError::not_found("Channel not found"))?;
    Ok(Json(channel))
}

pub async fn delete_channel(
    State(state): State<AppState>,
    Path(channel_id): Path<i64>,
) -> Result<Json<Channel>, ApiError> {
    let channel = with_db(&state, move |db| db.delete_channel(channel_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Channel not found"))?;

    info!("Deleted channel {} ({})", channel.id, channel.name);
    Ok(Json(channel))
}

fn channel_name(req: &ChannelRequest) -> Result<String, ApiError> {
    let name = req.name.trim();
    if name.is_empty() || name.chars().count() > 50 {
        return Err(ApiError::bad_request("Channel name must be 1 to 50 characters"));
    }
    Ok(name.to_string())
}

fn name_taken(name: &str) -> ApiError {
    ApiError::conflict(format!("Channel with the name '{}' already exists", name))
}
