// ABOUTME: Query cache inspection endpoint, mounted only when devtools are enabled.
// ABOUTME: Returns the same snapshot the in-page devtools panel shows, as JSON.

use axum::Json;
use axum::extract::State;
use seeuthere_core::QuerySnapshot;

use crate::app_state::SharedState;

/// GET /__devtools/queries - Snapshot of every query cache entry.
pub async fn queries(State(state): State<SharedState>) -> Json<Vec<QuerySnapshot>> {
    Json(state.queries.snapshot().await)
}
