use anyhow::{anyhow, Context};
use axum::{extract::State, http::StatusCode, Extension, Json};
use tracing::warn;
use uuid::Uuid;

use parley_db::models::ChannelRow;
use parley_db::{violated_constraint, Constraint, Database};
use parley_types::api::{Claims, CreateChannelRequest, CreateChannelResponse};
use parley_types::models::Channel;
use parley_types::validate;

use crate::auth::AppState;
use crate::error::ApiError;

pub async fn create_channel(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateChannelRequest>,
) -> Result<(StatusCode, Json<CreateChannelResponse>), ApiError> {
    validate::create_channel(&req).map_err(ApiError::validation)?;

    let channel_id = Uuid::new_v4();

    let db = state.clone();
    let cid = channel_id.to_string();
    let name = req.name.clone();
    let description = req.description.clone();
    let creator = claims.sub.to_string();
    tokio::task::spawn_blocking(move || {
        create_channel_blocking(&db.db, &cid, &name, description.as_deref(), &creator)
    })
    .await
    .map_err(|e| ApiError::Internal(anyhow!("channel create task join error: {e}")))??;

    let now = chrono::Utc::now();

    Ok((
        StatusCode::CREATED,
        Json(CreateChannelResponse {
            ok: true,
            channel: Channel {
                id: channel_id,
                name: req.name,
                description: req.description,
                created_by: claims.sub,
                created_at: now,
            },
        }),
    ))
}

/// Channel creation core: advisory pre-check for the friendly conflict
/// message, then the transactional insert. The per-creator UNIQUE constraint
/// decides races the pre-check cannot see.
fn create_channel_blocking(
    db: &Database,
    channel_id: &str,
    name: &str,
    description: Option<&str>,
    created_by: &str,
) -> Result<(), ApiError> {
    if db
        .channel_exists(name, created_by)
        .context("channel uniqueness check failed")?
    {
        return Err(ApiError::conflict("Channel with name already exists"));
    }

    match db.create_channel(channel_id, name, description, created_by) {
        Ok(()) => Ok(()),
        Err(err) => match violated_constraint(&err) {
            Some(Constraint::ChannelNameOwner) => {
                Err(ApiError::conflict("Channel with name already exists"))
            }
            _ => Err(ApiError::Internal(err)),
        },
    }
}

/// Channels the caller holds a membership in.
pub async fn get_channels(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Channel>>, ApiError> {
    let db = state.clone();
    let member = claims.sub.to_string();
    let rows = tokio::task::spawn_blocking(move || db.db.channels_for_member(&member))
        .await
        .map_err(|e| ApiError::Internal(anyhow!("channel list task join error: {e}")))?
        .context("channel listing failed")?;

    Ok(Json(rows.into_iter().map(channel_from_row).collect()))
}

/// Map a storage row to the API shape. Corrupt rows are logged and surfaced
/// with defaulted fields rather than failing the whole listing.
fn channel_from_row(row: ChannelRow) -> Channel {
    Channel {
        id: row.id.parse().unwrap_or_else(|e| {
            warn!("Corrupt channel id '{}': {}", row.id, e);
            Uuid::default()
        }),
        name: row.name,
        description: row.description,
        created_by: row.created_by.parse().unwrap_or_else(|e| {
            warn!("Corrupt created_by '{}' on channel '{}': {}", row.created_by, row.id, e);
            Uuid::default()
        }),
        created_at: row
            .created_at
            .parse::<chrono::DateTime<chrono::Utc>>()
            .or_else(|_| {
                // SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
                // Parse as naive UTC and convert.
                chrono::NaiveDateTime::parse_from_str(&row.created_at, "%Y-%m-%d %H:%M:%S")
                    .map(|ndt| ndt.and_utc())
            })
            .unwrap_or_else(|e| {
                warn!("Corrupt created_at '{}' on channel '{}': {}", row.created_at, row.id, e);
                chrono::DateTime::default()
            }),
    }
}
