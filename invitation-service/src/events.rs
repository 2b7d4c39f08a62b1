use aws_sdk_sns::types::MessageAttributeValue;
use aws_sdk_sns::Client as SnsClient;
use log::{debug, info};
use nestegg_shared::config::flag_enabled;
use nestegg_shared::models::events::INVITATION_RESPONDED;
use nestegg_shared::models::{now_str, InvitationEvent};
use std::collections::HashMap;
use std::env;
use tokio::sync::OnceCell;

use crate::coordinator::Resolved;
use crate::error::{AppError, Result};

static SNS_CLIENT: OnceCell<SnsClient> = OnceCell::const_new();

pub fn invitation_responded_event(resolved: &Resolved, invitee_id: &str) -> InvitationEvent {
    InvitationEvent {
        event_type: INVITATION_RESPONDED.to_string(),
        invitation_id: resolved.invitation_id.clone(),
        savings_goal_id: resolved.savings_goal_id.clone(),
        savings_goal_title: resolved.savings_goal_title.clone(),
        inviter_id: resolved.inviter_id.clone(),
        invitee_id: invitee_id.to_string(),
        decision: resolved.decision.to_string(),
        timestamp: now_str(),
    }
}

/// Publishes an invitation event to the SNS topic named by `SNS_TOPIC_ARN`.
/// Skipped entirely when `TEST_SNS=true`.
pub async fn publish_invitation_event(event: &InvitationEvent) -> Result<()> {
    if flag_enabled("TEST_SNS") {
        debug!(
            "Test mode: skipping SNS publish of {} for invitation {}",
            event.event_type, event.invitation_id
        );
        return Ok(());
    }

    let topic_arn = env::var("SNS_TOPIC_ARN").map_err(|_| {
        AppError::internal_server_error("SNS_TOPIC_ARN environment variable not set".into())
    })?;

    let client = SNS_CLIENT
        .get_or_init(|| async {
            let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
                .load()
                .await;
            SnsClient::new(&config)
        })
        .await;

    let message = serde_json::to_string(event).map_err(|e| {
        AppError::internal_server_error(format!("Failed to serialize event payload: {}", e))
    })?;

    let event_type_attr = MessageAttributeValue::builder()
        .data_type("String")
        .string_value(&event.event_type)
        .build()
        .map_err(|e| {
            AppError::internal_server_error(format!("Failed to build message attribute: {}", e))
        })?;

    let mut message_attributes = HashMap::new();
    message_attributes.insert("eventType".to_string(), event_type_attr);

    client
        .publish()
        .topic_arn(topic_arn)
        .message(message)
        .subject("Invitation Responded")
        .set_message_attributes(Some(message_attributes))
        .send()
        .await
        .map_err(|e| AppError::internal_server_error(format!("Failed to publish to SNS: {}", e)))?;

    info!(
        "Published {} event for invitation {}",
        event.event_type, event.invitation_id
    );
    Ok(())
}
