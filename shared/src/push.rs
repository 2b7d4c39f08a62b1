use log::{error, info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;

use crate::models::PushToken;

const DEFAULT_EXPO_PUSH_URL: &str = "https://exp.host/--/api/v2/push/send";

#[derive(Debug, Serialize)]
pub struct ExpoPushMessage {
    pub to: String,
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExpoPushResponse {
    pub data: Vec<ExpoPushTicket>,
}

#[derive(Debug, Deserialize)]
pub struct ExpoPushTicket {
    pub status: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ExpoPushTicket {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

fn push_url() -> String {
    env::var("EXPO_PUSH_URL").unwrap_or_else(|_| DEFAULT_EXPO_PUSH_URL.to_string())
}

fn build_messages(
    tokens: &[PushToken],
    title: &str,
    body: &str,
    data: Option<serde_json::Value>,
) -> Vec<ExpoPushMessage> {
    tokens
        .iter()
        .map(|token| ExpoPushMessage {
            to: token.push_token.clone(),
            title: title.to_string(),
            body: body.to_string(),
            data: data.clone(),
            sound: Some("default".to_string()),
        })
        .collect()
}

/// Sends one push message per token through the Expo push API
pub async fn send_push_notifications(
    tokens: &[PushToken],
    title: &str,
    body: &str,
    data: Option<serde_json::Value>,
) -> Result<Vec<ExpoPushTicket>, String> {
    if tokens.is_empty() {
        info!("No push tokens provided, skipping push notification");
        return Ok(Vec::new());
    }

    let messages = build_messages(tokens, title, body, data);
    info!("Sending {} push notifications", messages.len());

    let response = Client::new()
        .post(push_url())
        .header("Accept", "application/json")
        .json(&messages)
        .send()
        .await
        .map_err(|e| format!("Failed to send push notifications: {}", e))?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        error!("Push API returned {}: {}", status, error_text);
        return Err(format!("Push API error: {} - {}", status, error_text));
    }

    let push_response: ExpoPushResponse = response
        .json()
        .await
        .map_err(|e| format!("Failed to parse push response: {}", e))?;

    let failed = push_response.data.iter().filter(|t| !t.is_ok()).count();
    if failed > 0 {
        for ticket in push_response.data.iter().filter(|t| !t.is_ok()) {
            warn!(
                "Push ticket rejected: status={}, message={:?}",
                ticket.status, ticket.message
            );
        }
    }
    info!(
        "Push delivery finished: {} tickets, {} rejected",
        push_response.data.len(),
        failed
    );

    Ok(push_response.data)
}

/// Tells the inviter that someone answered their savings goal invitation
pub async fn send_invitation_response_notification(
    tokens: &[PushToken],
    goal_title: &str,
    invitation_id: &str,
    savings_goal_id: Option<&str>,
    accepted: bool,
) -> Result<Vec<ExpoPushTicket>, String> {
    let (title, body) = invitation_response_message(goal_title, accepted);

    let data = serde_json::json!({
        "type": "invitation_responded",
        "invitationId": invitation_id,
        "savingsGoalId": savings_goal_id,
        "accepted": accepted
    });

    send_push_notifications(tokens, &title, &body, Some(data)).await
}

/// Periodic nudge to contribute towards a savings goal
pub async fn send_goal_reminder_notification(
    tokens: &[PushToken],
    goal_title: &str,
    goal_id: &str,
    percent_complete: f64,
) -> Result<Vec<ExpoPushTicket>, String> {
    let (title, body) = goal_reminder_message(goal_title, percent_complete);

    let data = serde_json::json!({
        "type": "goal_reminder",
        "savingsGoalId": goal_id,
        "percentComplete": percent_complete
    });

    send_push_notifications(tokens, &title, &body, Some(data)).await
}

fn invitation_response_message(goal_title: &str, accepted: bool) -> (String, String) {
    if accepted {
        (
            "Invitation Accepted".to_string(),
            format!("Someone joined your savings goal \"{}\".", goal_title),
        )
    } else {
        (
            "Invitation Declined".to_string(),
            format!("Your invitation to \"{}\" was declined.", goal_title),
        )
    }
}

fn goal_reminder_message(goal_title: &str, percent_complete: f64) -> (String, String) {
    (
        "Savings Reminder".to_string(),
        format!(
            "\"{}\" is {:.0}% funded. Time to add a contribution?",
            goal_title, percent_complete
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_push_notifications_skips_empty_tokens() {
        let tickets = send_push_notifications(&[], "title", "body", None)
            .await
            .unwrap();
        assert!(tickets.is_empty());
    }

    #[test]
    fn test_build_messages_one_per_token() {
        let tokens = vec![
            PushToken {
                user_id: "a".into(),
                push_token: "ExponentPushToken[a]".into(),
                platform: "ios".into(),
                updated_at: "t".into(),
            },
            PushToken {
                user_id: "b".into(),
                push_token: "ExponentPushToken[b]".into(),
                platform: "android".into(),
                updated_at: "t".into(),
            },
        ];
        let messages = build_messages(&tokens, "Hi", "There", None);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].to, "ExponentPushToken[b]");
        let json = serde_json::to_value(&messages[0]).unwrap();
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_invitation_response_message() {
        let (title, body) = invitation_response_message("Trip to Lisbon", true);
        assert_eq!(title, "Invitation Accepted");
        assert!(body.contains("Trip to Lisbon"));

        let (title, _) = invitation_response_message("Trip to Lisbon", false);
        assert_eq!(title, "Invitation Declined");
    }

    #[test]
    fn test_goal_reminder_message_rounds_percent() {
        let (_, body) = goal_reminder_message("New bike", 42.6);
        assert!(body.contains("43%"), "{}", body);
    }
}
