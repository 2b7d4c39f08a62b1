use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use log::info;
use nestegg_shared::models::{now_str, round_cents, ReminderFrequency, ReminderSettings, SavingsGoal};
use nestegg_shared::progress::{progress_report, ProgressReport};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::filters::filter_goals;
use crate::models::{
    validate_deadline, validate_non_negative, validate_positive, validate_title,
    ContributionRequest, CreateGoalRequest, GoalListQuery, GoalResponse, OptionalField,
    ReminderRequest, UpdateGoalRequest,
};
use crate::state::AppState;

fn to_response(goal: SavingsGoal) -> GoalResponse {
    let progress = progress_report(&goal, Utc::now());
    GoalResponse::new(goal, &progress)
}

/// Loads a goal the caller may read (owner or member).
async fn load_visible_goal(state: &AppState, id: &str, user_id: &str) -> Result<SavingsGoal> {
    let goal = state.goals.get_goal(id).await?;
    if !goal.is_visible_to(user_id) {
        return Err(AppError::forbidden(
            "You don't have permission to view this goal".into(),
        ));
    }
    Ok(goal)
}

/// Loads a goal the caller owns.
async fn load_owned_goal(state: &AppState, id: &str, user_id: &str) -> Result<SavingsGoal> {
    let goal = state.goals.get_goal(id).await?;
    if goal.owner_id != user_id {
        return Err(AppError::forbidden(
            "Only the goal owner can change this goal".into(),
        ));
    }
    Ok(goal)
}

// GET /goals
pub async fn get_goals(
    State(state): State<AppState>,
    Extension(user_id): Extension<String>,
    Query(query): Query<GoalListQuery>,
) -> Result<Json<serde_json::Value>> {
    let goals = state.goals.get_goals_for_user(&user_id).await?;
    let goals: Vec<GoalResponse> = filter_goals(goals, &query, Utc::now())
        .into_iter()
        .map(to_response)
        .collect();

    Ok(Json(serde_json::json!({ "goals": goals })))
}

// POST /goals
pub async fn create_goal(
    State(state): State<AppState>,
    Extension(user_id): Extension<String>,
    Json(payload): Json<CreateGoalRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    let title = validate_title(&payload.title).map_err(AppError::bad_request)?;
    let target = validate_positive("Target amount", payload.target_amount)
        .map_err(AppError::bad_request)?;
    let current = validate_non_negative("Current amount", payload.current_amount)
        .map_err(AppError::bad_request)?;
    let monthly = payload
        .monthly_contribution
        .map(|m| validate_non_negative("Monthly contribution", m))
        .transpose()
        .map_err(AppError::bad_request)?;
    let deadline = payload
        .deadline
        .as_deref()
        .map(validate_deadline)
        .transpose()
        .map_err(AppError::bad_request)?;

    let now = now_str();
    let goal = SavingsGoal {
        id: Uuid::new_v4().to_string(),
        owner_id: user_id,
        title,
        description: payload.description,
        target_amount: round_cents(target),
        current_amount: round_cents(current),
        monthly_contribution: monthly.map(round_cents),
        deadline,
        members: BTreeSet::new(),
        last_invitation_id: None,
        reminder: None,
        created_at: now.clone(),
        updated_at: now,
    };

    let created = state.goals.create_goal(goal).await?;
    info!("Created savings goal {} for {}", created.id, created.owner_id);

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "goal": to_response(created) })),
    ))
}

// GET /goals/:id
pub async fn get_goal(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user_id): Extension<String>,
) -> Result<Json<serde_json::Value>> {
    let goal = load_visible_goal(&state, &id, &user_id).await?;
    Ok(Json(serde_json::json!({ "goal": to_response(goal) })))
}

// PATCH /goals/:id
pub async fn update_goal(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user_id): Extension<String>,
    Json(payload): Json<UpdateGoalRequest>,
) -> Result<Json<serde_json::Value>> {
    let mut goal = load_owned_goal(&state, &id, &user_id).await?;
    let previous = goal.updated_at.clone();

    if let Some(title) = payload.title {
        goal.title = validate_title(&title).map_err(AppError::bad_request)?;
    }

    if let Some(field) = payload.description {
        goal.description = match field {
            OptionalField::Value(val) => Some(val),
            OptionalField::Null => None,
        };
    }

    if let Some(target) = payload.target_amount {
        let target =
            validate_positive("Target amount", target).map_err(AppError::bad_request)?;
        goal.target_amount = round_cents(target);
    }

    if let Some(field) = payload.monthly_contribution {
        goal.monthly_contribution = match field {
            OptionalField::Value(val) => Some(round_cents(
                validate_non_negative("Monthly contribution", val)
                    .map_err(AppError::bad_request)?,
            )),
            OptionalField::Null => None,
        };
    }

    if let Some(field) = payload.deadline {
        goal.deadline = match field {
            OptionalField::Value(val) => {
                Some(validate_deadline(&val).map_err(AppError::bad_request)?)
            }
            OptionalField::Null => None,
        };
    }

    goal.updated_at = now_str();
    let updated = state.goals.update_goal(goal, &previous).await?;

    Ok(Json(serde_json::json!({ "goal": to_response(updated) })))
}

// DELETE /goals/:id
pub async fn delete_goal(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user_id): Extension<String>,
) -> Result<Json<serde_json::Value>> {
    load_owned_goal(&state, &id, &user_id).await?;
    state.goals.delete_goal(&id).await?;

    Ok(Json(
        serde_json::json!({ "message": "Goal deleted successfully." }),
    ))
}

// POST /goals/:id/contributions
pub async fn add_contribution(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user_id): Extension<String>,
    Json(payload): Json<ContributionRequest>,
) -> Result<Json<serde_json::Value>> {
    let amount = validate_positive("Contribution", payload.amount)
        .map(round_cents)
        .map_err(AppError::bad_request)?;
    if amount <= 0.0 {
        return Err(AppError::bad_request(
            "Contribution must be at least one cent".into(),
        ));
    }

    let mut goal = load_visible_goal(&state, &id, &user_id).await?;
    let previous = goal.updated_at.clone();
    goal.current_amount = round_cents(goal.current_amount + amount);
    goal.updated_at = now_str();

    // A concurrent write (another contribution, a new member) surfaces as 409.
    let updated = state.goals.update_goal(goal, &previous).await?;
    info!(
        "User {} contributed {:.2} to goal {}",
        user_id, amount, updated.id
    );

    Ok(Json(serde_json::json!({ "goal": to_response(updated) })))
}

// GET /goals/:id/progress
pub async fn get_goal_progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user_id): Extension<String>,
) -> Result<Json<ProgressReport>> {
    let goal = load_visible_goal(&state, &id, &user_id).await?;
    Ok(Json(progress_report(&goal, Utc::now())))
}

// PUT /goals/:id/reminder
pub async fn set_goal_reminder(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user_id): Extension<String>,
    Json(payload): Json<ReminderRequest>,
) -> Result<Json<serde_json::Value>> {
    let frequency = match payload.frequency.trim().to_lowercase().as_str() {
        "daily" => Some(ReminderFrequency::Daily),
        "weekly" => Some(ReminderFrequency::Weekly),
        "monthly" => Some(ReminderFrequency::Monthly),
        "off" | "none" => None,
        other => {
            return Err(AppError::bad_request(format!(
                "Invalid reminder frequency: {}. Must be daily, weekly, monthly or off",
                other
            )))
        }
    };

    let mut goal = load_owned_goal(&state, &id, &user_id).await?;
    let previous = goal.updated_at.clone();

    goal.reminder = match (frequency, goal.reminder.take()) {
        (None, _) => None,
        // Keep the last send time so switching frequency doesn't re-send at once.
        (Some(frequency), Some(existing)) => Some(ReminderSettings {
            frequency,
            last_sent_at: existing.last_sent_at,
        }),
        (Some(frequency), None) => Some(ReminderSettings {
            frequency,
            last_sent_at: None,
        }),
    };
    goal.updated_at = now_str();

    let updated = state.goals.update_goal(goal, &previous).await?;
    Ok(Json(serde_json::json!({ "goal": to_response(updated) })))
}
