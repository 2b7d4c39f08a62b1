use axum::{extract::State, Extension, Json};
use log::info;
use nestegg_shared::models::{now_str, PushToken};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::state::AppState;

const EXPO_TOKEN_PREFIX: &str = "ExponentPushToken[";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPushTokenRequest {
    pub push_token: String,
    pub platform: String,
}

/// PUT /users/push-token
/// Register or replace the caller's push notification token
pub async fn register_push_token(
    State(state): State<AppState>,
    Extension(user_id): Extension<String>,
    Json(request): Json<RegisterPushTokenRequest>,
) -> Result<Json<serde_json::Value>> {
    let platform = request.platform.to_lowercase();
    if platform != "ios" && platform != "android" {
        return Err(AppError::bad_request(format!(
            "Invalid platform: {}. Must be 'ios' or 'android'",
            request.platform
        )));
    }

    if !request.push_token.starts_with(EXPO_TOKEN_PREFIX) || !request.push_token.ends_with(']') {
        return Err(AppError::bad_request(
            "Invalid push token format. Expected Expo push token.".to_string(),
        ));
    }

    let token = PushToken {
        user_id: user_id.clone(),
        push_token: request.push_token,
        platform,
        updated_at: now_str(),
    };
    state.push_tokens.save_push_token(token).await?;

    info!("Registered push token for user: {}", user_id);

    Ok(Json(serde_json::json!({
        "message": "Push token registered successfully"
    })))
}
