use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use log::{debug, error, info, warn};
use nestegg_shared::auth::CallerEmail;
use nestegg_shared::models::{now_str, Invitation, InvitationEvent, InvitationStatus};
use nestegg_shared::store::{InvitationStore, SavingsGoalStore};
use uuid::Uuid;

use crate::coordinator::{Caller, FailureCode, Outcome};
use crate::error::{AppError, Result};
use crate::events::{invitation_responded_event, publish_invitation_event};
use crate::models::{
    is_plausible_email, normalize_email, CreateInvitationRequest, InvitationResponse,
    RespondToInvitationRequest,
};
use crate::state::AppState;

// POST /invitations
pub async fn create_invitation<I, G>(
    State(state): State<AppState<I, G>>,
    Extension(user_id): Extension<String>,
    Json(payload): Json<CreateInvitationRequest>,
) -> Result<(StatusCode, Json<InvitationResponse>)>
where
    I: InvitationStore,
    G: SavingsGoalStore,
{
    if !is_plausible_email(&payload.invitee_email) {
        return Err(AppError::bad_request(format!(
            "Invalid email address: {}",
            payload.invitee_email
        )));
    }

    let goal = state.goals.get_goal(&payload.savings_goal_id).await?;
    if goal.owner_id != user_id {
        return Err(AppError::forbidden(
            "Only the goal owner can invite members".into(),
        ));
    }

    let invitation = Invitation {
        id: Uuid::new_v4().to_string(),
        savings_goal_id: Some(goal.id.clone()),
        savings_goal_title: goal.title.clone(),
        inviter_id: user_id,
        inviter_name: payload.inviter_name,
        invitee_email: normalize_email(&payload.invitee_email),
        invitee_id: None,
        status: InvitationStatus::Pending,
        created_at: now_str(),
        updated_at: None,
    };

    let created = state.invitations.create_invitation(invitation).await?;
    info!(
        "Created invitation {} for goal {} to {}",
        created.id, goal.id, created.invitee_email
    );

    Ok((StatusCode::CREATED, Json(InvitationResponse::from(created))))
}

// GET /invitations/sent
pub async fn get_sent_invitations<I, G>(
    State(state): State<AppState<I, G>>,
    Extension(user_id): Extension<String>,
) -> Result<Json<Vec<InvitationResponse>>>
where
    I: InvitationStore,
    G: SavingsGoalStore,
{
    let invitations = state.invitations.get_invitations_by_inviter(&user_id).await?;
    Ok(Json(
        invitations.into_iter().map(InvitationResponse::from).collect(),
    ))
}

// GET /invitations/received
// Only ever lists invitations addressed to the caller's own email claim.
pub async fn get_received_invitations<I, G>(
    State(state): State<AppState<I, G>>,
    Extension(user_id): Extension<String>,
    Extension(email): Extension<CallerEmail>,
) -> Result<Json<Vec<InvitationResponse>>>
where
    I: InvitationStore,
    G: SavingsGoalStore,
{
    let email = match email.as_deref() {
        Some(email) => normalize_email(email),
        None => {
            warn!("User {} has no email claim, can't list received invitations", user_id);
            return Err(AppError::forbidden(
                "Your account has no email address to receive invitations".into(),
            ));
        }
    };

    let invitations = state
        .invitations
        .get_pending_invitations_for_email(&email)
        .await?;
    Ok(Json(
        invitations.into_iter().map(InvitationResponse::from).collect(),
    ))
}

// PATCH /invitations/:id/respond
pub async fn respond_to_invitation<I, G>(
    State(state): State<AppState<I, G>>,
    Path(id): Path<String>,
    Extension(user_id): Extension<String>,
    Extension(email): Extension<CallerEmail>,
    Json(payload): Json<RespondToInvitationRequest>,
) -> (StatusCode, Json<Outcome>)
where
    I: InvitationStore,
    G: SavingsGoalStore,
{
    let caller = Caller::new(user_id, email.as_deref());
    let outcome = state
        .coordinator
        .respond(&id, &caller, payload.decision)
        .await;

    match responded_event(&outcome, &caller.user_id) {
        Some(event) => notify_inviter(&event).await,
        None if outcome.is_success() => debug!(
            "Decision on invitation {} was not recorded, no event published",
            id
        ),
        None => {}
    }

    (status_for(&outcome), Json(outcome))
}

fn status_for(outcome: &Outcome) -> StatusCode {
    match outcome.code() {
        None => StatusCode::OK,
        Some(FailureCode::Unauthenticated) => StatusCode::UNAUTHORIZED,
        Some(FailureCode::NotFound) => StatusCode::NOT_FOUND,
        Some(FailureCode::AlreadyResolved) => StatusCode::CONFLICT,
        Some(FailureCode::PermissionDenied) => StatusCode::FORBIDDEN,
        Some(FailureCode::GoalUpdateError) | Some(FailureCode::Unknown) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// The event for an answer that was actually recorded on the invitation.
fn responded_event(outcome: &Outcome, invitee_id: &str) -> Option<InvitationEvent> {
    match outcome {
        Outcome::Success(resolved) if resolved.status_recorded => {
            Some(invitation_responded_event(resolved, invitee_id))
        }
        _ => None,
    }
}

/// Best effort: the response is already recorded, so failures are only logged.
async fn notify_inviter(event: &InvitationEvent) {
    if let Err(e) = publish_invitation_event(event).await {
        error!(
            "Failed to publish invitation_responded for {}: {}",
            event.invitation_id, e
        );
    }
}
