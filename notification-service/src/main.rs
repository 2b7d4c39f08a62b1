use aws_lambda_events::event::sns::SnsEvent;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use log::{error, info, warn};
use nestegg_shared::models::events::{InvitationEvent, INVITATION_RESPONDED};
use nestegg_shared::push::send_invitation_response_notification;
use nestegg_shared::store::dynamo::DynamoPushTokenStore;
use nestegg_shared::store::PushTokenStore;
use std::sync::Arc;

mod errors;

use errors::NotificationError;

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting Notification Service Lambda");

    let push_store = Arc::new(DynamoPushTokenStore::new().await);

    lambda_runtime::run(service_fn(|event| handler(event, push_store.clone()))).await?;
    Ok(())
}

async fn handler<P: PushTokenStore>(
    event: LambdaEvent<SnsEvent>,
    push_store: Arc<P>,
) -> Result<(), Error> {
    let messages: Vec<String> = event
        .payload
        .records
        .into_iter()
        .map(|record| {
            info!("Processing SNS message: {:?}", record.sns.message_id);
            record.sns.message
        })
        .collect();

    let handled = process_messages(push_store.as_ref(), &messages).await;
    info!("Handled {} of {} SNS messages", handled, messages.len());

    Ok(())
}

/// Handles every message in a batch, returning how many were invitation
/// responses delivered without error. A bad message never fails the batch.
async fn process_messages<P: PushTokenStore + ?Sized>(push_store: &P, messages: &[String]) -> usize {
    let mut handled = 0;

    for message in messages {
        let event = match parse_invitation_event(message) {
            Some(event) => event,
            None => continue,
        };

        match handle_invitation_responded(push_store, &event).await {
            Ok(sent) => {
                info!(
                    "Notified inviter {} on {} device(s) about invitation {}",
                    event.inviter_id, sent, event.invitation_id
                );
                handled += 1;
            }
            Err(e) => error!(
                "Failed to handle invitation_responded for invitation {}: {}",
                event.invitation_id, e
            ),
        }
    }

    handled
}

fn parse_invitation_event(message: &str) -> Option<InvitationEvent> {
    match serde_json::from_str::<InvitationEvent>(message) {
        Ok(event) if event.event_type == INVITATION_RESPONDED => Some(event),
        Ok(event) => {
            warn!("Unexpected event type: {}", event.event_type);
            None
        }
        Err(e) => {
            error!("Failed to parse SNS message: {}, error: {}", message, e);
            None
        }
    }
}

/// Pushes the invitee's answer to the inviter's devices.
/// Returns the number of devices messaged.
async fn handle_invitation_responded<P: PushTokenStore + ?Sized>(
    push_store: &P,
    event: &InvitationEvent,
) -> Result<usize, NotificationError> {
    let accepted = match event.decision.as_str() {
        "accepted" => true,
        "declined" => false,
        other => return Err(NotificationError::UnknownDecision(other.to_string())),
    };

    let tokens = push_store
        .get_push_tokens(&[event.inviter_id.clone()])
        .await?;

    if tokens.is_empty() {
        info!(
            "No push tokens for inviter {}, skipping invitation {}",
            event.inviter_id, event.invitation_id
        );
        return Ok(0);
    }

    send_invitation_response_notification(
        &tokens,
        &event.savings_goal_title,
        &event.invitation_id,
        event.savings_goal_id.as_deref(),
        accepted,
    )
    .await
    .map_err(NotificationError::SendFailed)?;

    Ok(tokens.len())
}
