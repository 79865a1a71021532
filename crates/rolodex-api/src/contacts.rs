use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::info;

use rolodex_db::StoreError;
use rolodex_db::models::{ChannelValue, ContactFields, ContactFilter};
use rolodex_types::api::ContactRequest;
use rolodex_types::models::{Contact, User};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::with_db;

const MAX_NAME_LEN: usize = 50;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactQuery {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Matches any channel value, not only email addresses.
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BirthdayQuery {
    #[serde(rename = "daysForward")]
    pub days_forward: u32,
}

pub async fn list_contacts(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<ContactQuery>,
) -> Result<Json<Vec<Contact>>, ApiError> {
    // Empty parameters mean "no constraint", same as absent ones.
    let filter = ContactFilter {
        first_name: query.first_name.filter(|s| !s.is_empty()),
        last_name: query.last_name.filter(|s| !s.is_empty()),
        channel_value: query.email.filter(|s| !s.is_empty()),
    };

    let contacts = with_db(&state, move |db| db.list_contacts(user.id, &filter)).await?;
    Ok(Json(contacts))
}

pub async fn upcoming_birthdays(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<BirthdayQuery>,
) -> Result<Json<Vec<Contact>>, ApiError> {
    let today = chrono::Local::now().date_naive();
    let days = query.days_forward;

    let contacts = with_db(&state, move |db| {
        db.list_contacts_by_birthday(user.id, today, days)
    })
    .await?;
    Ok(Json(contacts))
}

pub async fn get_contact(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(contact_id): Path<i64>,
) -> Result<Json<Contact>, ApiError> {
    let contact = with_db(&state, move |db| db.get_contact(user.id, contact_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Contact not found"))?;
    Ok(Json(contact))
}

pub async fn create_contact(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<ContactRequest>,
) -> Result<(StatusCode, Json<Contact>), ApiError> {
    let fields = contact_fields(req)?;
    let owner = user.id;

    let contact = with_db(&state, move |db| db.create_contact(owner, &fields))
        .await
        .map_err(channel_error)?;

    info!("User {} created contact {}", owner, contact.id);
    Ok((StatusCode::CREATED, Json(contact)))
}

pub async fn update_contact(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(contact_id): Path<i64>,
    Json(req): Json<ContactRequest>,
) -> Result<Json<Contact>, ApiError> {
    let fields = contact_fields(req)?;

    let contact = with_db(&state, move |db| db.update_contact(user.id, contact_id, &fields))
        .await
        .map_err(channel_error)?
        .ok_or_else(|| ApiError::not_found("Contact not found"))?;
    Ok(Json(contact))
}

pub async fn delete_contact(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(contact_id): Path<i64>,
) -> Result<Json<Contact>, ApiError> {
    let owner = user.id;
    let contact = with_db(&state, move |db| db.delete_contact(owner, contact_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Contact not found"))?;

    info!("User {} deleted contact {}", owner, contact.id);
    Ok(Json(contact))
}

fn contact_fields(req: ContactRequest) -> Result<ContactFields, ApiError> {
    for (field, value) in [("first_name", &req.first_name), ("last_name", &req.last_name)] {
        if value.trim().is_empty() || value.chars().count() > MAX_NAME_LEN {
            return Err(ApiError::bad_request(format!(
                "{} must be 1 to {} characters",
                field, MAX_NAME_LEN
            )));
        }
    }
    if req.channels.iter().any(|c| c.channel_value.trim().is_empty()) {
        return Err(ApiError::bad_request("channel_value must not be empty"));
    }

    Ok(ContactFields {
        first_name: req.first_name,
        last_name: req.last_name,
        birthdate: req.birthdate,
        gender: req.gender,
        persuasion: req.persuasion,
        channels: req
            .channels
            .into_iter()
            .map(|c| ChannelValue {
                channel_id: c.channel_id,
                channel_value: c.channel_value.trim().to_string(),
            })
            .collect(),
    })
}

fn channel_error(err: StoreError) -> ApiError {
    match err {
        StoreError::NotFound => ApiError::not_found("Channel not found"),
        StoreError::Conflict(_) => ApiError::conflict("Such channel value already exists in the DB"),
        other => other.into(),
    }
}
