//! Authentication-related handlers

use std::sync::Arc;

use axum::extract::Request;
use axum::{extract::State, Json};
use serde::Serialize;

use crate::{current_user_id, AppState, LOCAL_DEV_USER};

/// Response for the /api/me endpoint
#[derive(Serialize)]
pub struct MeResponse {
    /// The authenticated user's email or identifier
    pub user: String,
    /// How the user was authenticated
    pub auth_method: String,
}

/// Get the currently authenticated user
pub async fn get_me(State(state): State<Arc<AppState>>, request: Request) -> Json<MeResponse> {
    let user = current_user_id(request.headers());

    let auth_method = if user == LOCAL_DEV_USER && !state.config.require_auth {
        "none"
    } else {
        "cloudflare_header"
    };

    Json(MeResponse {
        user,
        auth_method: auth_method.to_string(),
    })
}
