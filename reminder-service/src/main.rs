use aws_lambda_events::event::cloudwatch_events::CloudWatchEvent;
use chrono::{DateTime, Duration, Utc};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use log::{error, info, warn};
use nestegg_shared::models::{parse_timestamp, SavingsGoal};
use nestegg_shared::progress::{goal_status, percent_complete, GoalStatus};
use nestegg_shared::push::send_goal_reminder_notification;
use nestegg_shared::store::dynamo::{DynamoPushTokenStore, DynamoSavingsGoalStore};
use nestegg_shared::store::{PushTokenStore, SavingsGoalStore};
use std::sync::Arc;

/// Grace period before a goal's first reminder
const GRACE_PERIOD_HOURS: i64 = 1;

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting Reminder Service Lambda");

    let goal_store = Arc::new(DynamoSavingsGoalStore::new().await);
    let push_store = Arc::new(DynamoPushTokenStore::new().await);

    lambda_runtime::run(service_fn(|event| {
        handler(event, goal_store.clone(), push_store.clone())
    }))
    .await?;

    Ok(())
}

async fn handler<G: SavingsGoalStore, P: PushTokenStore>(
    _event: LambdaEvent<CloudWatchEvent>,
    goal_store: Arc<G>,
    push_store: Arc<P>,
) -> Result<(), Error> {
    info!("Reminder service triggered");
    run_reminders(goal_store.as_ref(), push_store.as_ref(), Utc::now())
        .await
        .map_err(Error::from)?;
    Ok(())
}

/// Sends every due reminder and returns how many goals were reminded.
async fn run_reminders<G: SavingsGoalStore, P: PushTokenStore>(
    goal_store: &G,
    push_store: &P,
    now: DateTime<Utc>,
) -> Result<usize, String> {
    let goals = goal_store
        .scan_goals_with_reminders()
        .await
        .map_err(|e| format!("Failed to scan goals with reminders: {}", e))?;

    let goal_count = goals.len();
    info!("Found {} goals with reminders to check", goal_count);

    let mut reminded = 0;
    for goal in goals.iter().filter(|g| is_reminder_due(g, now)) {
        match process_goal(goal, goal_store, push_store, now).await {
            Ok(()) => reminded += 1,
            // Left unstamped so the next run retries it.
            Err(e) => error!("Failed to send reminder for goal {}: {}", goal.id, e),
        }
    }

    info!(
        "Reminder service completed. Checked {} goals, reminded {}",
        goal_count, reminded
    );

    Ok(reminded)
}

async fn process_goal<G: SavingsGoalStore, P: PushTokenStore>(
    goal: &SavingsGoal,
    goal_store: &G,
    push_store: &P,
    now: DateTime<Utc>,
) -> Result<(), String> {
    let participants = goal.participants();
    let tokens = push_store
        .get_push_tokens(&participants)
        .await
        .map_err(|e| format!("Failed to get push tokens: {}", e))?;

    if tokens.is_empty() {
        warn!(
            "No push tokens for any of the {} participants of goal {}",
            participants.len(),
            goal.id
        );
    } else {
        let percent = percent_complete(goal.current_amount, goal.target_amount);
        send_goal_reminder_notification(&tokens, &goal.title, &goal.id, percent).await?;
        info!(
            "Sent reminder for goal {} to {} device(s)",
            goal.id,
            tokens.len()
        );
    }

    stamp_last_sent(goal_store, &goal.id, now).await
}

/// Re-reads the goal and writes it back guarded on `updatedAt`, so a
/// concurrent edit fails the stamp instead of being overwritten.
async fn stamp_last_sent<G: SavingsGoalStore>(
    goal_store: &G,
    goal_id: &str,
    now: DateTime<Utc>,
) -> Result<(), String> {
    let mut goal = goal_store
        .get_goal(goal_id)
        .await
        .map_err(|e| format!("Failed to reload goal: {}", e))?;

    match goal.reminder.as_mut() {
        Some(reminder) => reminder.last_sent_at = Some(now.to_rfc3339()),
        None => {
            info!("Reminder for goal {} was switched off meanwhile", goal_id);
            return Ok(());
        }
    }
    let previous = std::mem::replace(&mut goal.updated_at, now.to_rfc3339());

    goal_store
        .update_goal(goal, &previous)
        .await
        .map(|_| ())
        .map_err(|e| format!("Failed to record reminder time: {}", e))
}

/// Whether a goal's reminder should go out at `now`.
///
/// Achieved goals never get reminders. A reminder that has been sent before
/// is due once its frequency interval has elapsed; one that has never been
/// sent is due after the grace period following goal creation.
fn is_reminder_due(goal: &SavingsGoal, now: DateTime<Utc>) -> bool {
    let reminder = match &goal.reminder {
        Some(reminder) => reminder,
        None => return false,
    };

    if goal_status(goal, now) == GoalStatus::Achieved {
        return false;
    }

    match reminder.last_sent_at.as_deref().and_then(parse_timestamp) {
        Some(last_sent) => now - last_sent >= Duration::hours(reminder.frequency.interval_hours()),
        None => match parse_timestamp(&goal.created_at) {
            Some(created) => now - created >= Duration::hours(GRACE_PERIOD_HOURS),
            None => {
                warn!("Goal {} has an unreadable createdAt timestamp", goal.id);
                false
            }
        },
    }
}
