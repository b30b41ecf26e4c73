//! E-mail identity registration.

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use radmem_core::PatientProfile;

use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    #[serde(default)]
    pub metadata: JsonValue,
}

/// Register an e-mail and return its stable patient id.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<PatientProfile>, ApiError> {
    let profile = state.db.patients.register(&req.email, req.metadata).await?;
    Ok(Json(profile))
}
