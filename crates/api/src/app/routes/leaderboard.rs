use axum::{Json, extract::Extension};
use serde::Serialize;

use arena_core::{ParticipantScore, Snapshot};
use arena_infra::snapshot::SnapshotStore;

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub entries: Vec<ParticipantScore>,
}

/// Latest snapshot as stored. Never fails: an absent or unreadable file reads as empty.
pub async fn get_leaderboard(Extension(store): Extension<SnapshotStore>) -> Json<LeaderboardResponse> {
    let snapshot: Snapshot = store.load_or_empty().await;
    Json(LeaderboardResponse {
        entries: snapshot.into_entries(),
    })
}
