//! Persistence for the team-membership snapshot.
//!
//! Single-row pattern (id = 1): the engine only ever keeps the latest
//! timestamped snapshot, replacing it wholesale on recomputation.

use crate::db::pool::DbPool;
use crate::error::AppError;
use crate::models::{Density, TimedSnapshot, User};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// JSON row shape for one persisted team member.
#[derive(Debug, Serialize, Deserialize)]
struct StoredMember {
    user: User,
    density: Density,
}

/// Load the persisted snapshot, or `None` if never computed.
pub async fn get_snapshot(
    pool: &DbPool,
) -> Result<Option<TimedSnapshot<BTreeMap<User, Density>>>, AppError> {
    let row: Option<(String, i64)> =
        sqlx::query_as("SELECT members, timestamp_ms FROM team_snapshot WHERE id = 1")
            .fetch_optional(pool)
            .await?;

    let Some((members_json, timestamp_ms)) = row else {
        return Ok(None);
    };

    let stored: Vec<StoredMember> = serde_json::from_str(&members_json)?;
    let members = stored
        .into_iter()
        .map(|entry| (entry.user, entry.density))
        .collect();

    Ok(Some(TimedSnapshot::new(members, timestamp_ms)))
}

/// Replace the persisted snapshot.
pub async fn put_snapshot(
    pool: &DbPool,
    snapshot: &TimedSnapshot<BTreeMap<User, Density>>,
) -> Result<(), AppError> {
    let stored: Vec<StoredMember> = snapshot
        .value
        .iter()
        .map(|(user, density)| StoredMember {
            user: user.clone(),
            density: *density,
        })
        .collect();
    let members_json = serde_json::to_string(&stored)?;

    sqlx::query(
        "INSERT OR REPLACE INTO team_snapshot (id, members, timestamp_ms) VALUES (1, ?, ?)",
    )
    .bind(&members_json)
    .bind(snapshot.timestamp_ms)
    .execute(pool)
    .await?;

    Ok(())
}
