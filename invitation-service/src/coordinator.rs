//! Processes an invitee's answer to a savings goal invitation.
//!
//! The flow is a single linear pass: load the invitation, record the
//! decision on it, and on acceptance add the invitee to the goal's members.
//! Every path ends in an [`Outcome`]; nothing is returned as an error.

use log::{debug, info, warn};
use nestegg_shared::error::StoreError;
use nestegg_shared::models::{
    now_str, Invitation, InvitationDecision, InvitationResolution, InvitationStatus,
};
use nestegg_shared::store::{InvitationStore, SavingsGoalStore};
use serde::ser::{Serialize, Serializer};
use std::sync::Arc;

#[derive(serde::Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCode {
    Unauthenticated,
    NotFound,
    AlreadyResolved,
    PermissionDenied,
    GoalUpdateError,
    Unknown,
}

/// The authenticated user answering an invitation.
#[derive(Debug, Clone, PartialEq)]
pub struct Caller {
    pub user_id: String,
    /// Email claim from the token; must match the invitation's invitee.
    pub email: Option<String>,
}

impl Caller {
    pub fn new(user_id: impl Into<String>, email: Option<&str>) -> Self {
        Caller {
            user_id: user_id.into(),
            email: email.map(str::to_string),
        }
    }

    fn is_invitee_of(&self, invitation: &Invitation) -> bool {
        match self.email.as_deref() {
            Some(email) => {
                email.trim().eq_ignore_ascii_case(invitation.invitee_email.trim())
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub invitation_id: String,
    pub savings_goal_id: Option<String>,
    pub warning: Option<String>,
    /// False when the status write on the invitation was rejected and only logged.
    pub status_recorded: bool,
    // Carried for the invitation_responded event; not part of the response body.
    pub inviter_id: String,
    pub savings_goal_title: String,
    pub decision: InvitationDecision,
}

impl Resolved {
    fn new(
        invitation: &Invitation,
        savings_goal_id: Option<&str>,
        decision: InvitationDecision,
        status_recorded: bool,
    ) -> Self {
        Resolved {
            invitation_id: invitation.id.clone(),
            savings_goal_id: savings_goal_id.map(str::to_string),
            warning: None,
            status_recorded,
            inviter_id: invitation.inviter_id.clone(),
            savings_goal_title: invitation.savings_goal_title.clone(),
            decision,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rejected {
    pub code: FailureCode,
    pub message: String,
    pub invitation_id: Option<String>,
    pub savings_goal_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Resolved),
    Failure(Rejected),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn code(&self) -> Option<FailureCode> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(rejected) => Some(rejected.code),
        }
    }

    fn failure(
        code: FailureCode,
        message: impl Into<String>,
        invitation_id: Option<&str>,
        savings_goal_id: Option<&str>,
    ) -> Self {
        Outcome::Failure(Rejected {
            code,
            message: message.into(),
            invitation_id: invitation_id.map(str::to_string),
            savings_goal_id: savings_goal_id.map(str::to_string),
        })
    }
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct OutcomeBody<'a> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    invitation_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    savings_goal_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status_recorded: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<FailureCode>,
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let body = match self {
            Outcome::Success(r) => OutcomeBody {
                success: true,
                invitation_id: Some(&r.invitation_id),
                savings_goal_id: r.savings_goal_id.as_deref(),
                warning: r.warning.as_deref(),
                status_recorded: Some(r.status_recorded),
                message: None,
                code: None,
            },
            Outcome::Failure(r) => OutcomeBody {
                success: false,
                invitation_id: r.invitation_id.as_deref(),
                savings_goal_id: r.savings_goal_id.as_deref(),
                warning: None,
                status_recorded: None,
                message: Some(&r.message),
                code: Some(r.code),
            },
        };
        body.serialize(serializer)
    }
}

enum StatusWrite {
    Recorded,
    /// The write failed for a reason other than a lost race; logged only.
    Skipped,
    /// Someone else resolved the invitation between our read and write.
    AlreadyResolved,
}

pub struct InvitationCoordinator<I, G> {
    invitations: Arc<I>,
    goals: Arc<G>,
}

impl<I, G> Clone for InvitationCoordinator<I, G> {
    fn clone(&self) -> Self {
        Self {
            invitations: Arc::clone(&self.invitations),
            goals: Arc::clone(&self.goals),
        }
    }
}

impl<I, G> InvitationCoordinator<I, G>
where
    I: InvitationStore,
    G: SavingsGoalStore,
{
    pub fn new(invitations: Arc<I>, goals: Arc<G>) -> Self {
        Self { invitations, goals }
    }

    pub async fn respond(
        &self,
        invitation_id: &str,
        caller: &Caller,
        decision: InvitationDecision,
    ) -> Outcome {
        let user_id = caller.user_id.as_str();
        if user_id.trim().is_empty() {
            warn!("Rejecting response to invitation {}: no user", invitation_id);
            return Outcome::failure(
                FailureCode::Unauthenticated,
                "You must be signed in to respond to an invitation.",
                None,
                None,
            );
        }

        if invitation_id.trim().is_empty() {
            return Outcome::failure(
                FailureCode::NotFound,
                "Invitation not found.",
                None,
                None,
            );
        }

        info!(
            "User {} responding '{}' to invitation {}",
            user_id, decision, invitation_id
        );

        match self.run(invitation_id, caller, decision).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(
                    "Unexpected failure responding to invitation {}: {}",
                    invitation_id, err
                );
                if err.is_access_denied() {
                    Outcome::failure(
                        FailureCode::PermissionDenied,
                        "You don't have permission to respond to this invitation.",
                        Some(invitation_id),
                        None,
                    )
                } else {
                    Outcome::failure(
                        FailureCode::Unknown,
                        err.to_string(),
                        Some(invitation_id),
                        None,
                    )
                }
            }
        }
    }

    async fn run(
        &self,
        invitation_id: &str,
        caller: &Caller,
        decision: InvitationDecision,
    ) -> Result<Outcome, StoreError> {
        let user_id = caller.user_id.as_str();
        let invitation = match self.invitations.get_invitation(invitation_id).await {
            Ok(invitation) => invitation,
            Err(StoreError::NotFound(_)) => {
                info!("Invitation {} does not exist", invitation_id);
                return Ok(Outcome::failure(
                    FailureCode::NotFound,
                    "Invitation not found.",
                    Some(invitation_id),
                    None,
                ));
            }
            Err(err) => return Err(err),
        };

        let goal_id = invitation
            .savings_goal_id
            .as_deref()
            .filter(|id| !id.is_empty());

        if !caller.is_invitee_of(&invitation) {
            warn!(
                "User {} tried to answer invitation {} addressed to someone else",
                user_id, invitation_id
            );
            return Ok(Outcome::failure(
                FailureCode::PermissionDenied,
                "This invitation was sent to a different email address.",
                Some(invitation_id),
                None,
            ));
        }

        if !invitation.is_pending() {
            info!(
                "Invitation {} was already {}, ignoring '{}'",
                invitation_id, invitation.status, decision
            );
            return Ok(already_resolved(&invitation, goal_id));
        }

        let status_recorded = match self.record_decision(&invitation, user_id, decision).await {
            StatusWrite::Recorded => true,
            StatusWrite::Skipped => false,
            StatusWrite::AlreadyResolved => return Ok(already_resolved(&invitation, goal_id)),
        };

        let goal_id = match (decision, goal_id) {
            (InvitationDecision::Accepted, Some(goal_id)) => goal_id,
            _ => {
                return Ok(Outcome::Success(Resolved::new(
                    &invitation,
                    goal_id,
                    decision,
                    status_recorded,
                )))
            }
        };

        match self.goals.get_goal(goal_id).await {
            Ok(_) => {}
            Err(StoreError::NotFound(_)) => {
                warn!(
                    "Invitation {} accepted but savings goal {} no longer exists",
                    invitation.id, goal_id
                );
                return Ok(Outcome::Success(Resolved {
                    warning: Some(
                        "The savings goal for this invitation could not be found. \
                         The invitation was still accepted."
                            .to_string(),
                    ),
                    ..Resolved::new(&invitation, Some(goal_id), decision, status_recorded)
                }));
            }
            Err(err) => return Err(err),
        }

        match self
            .goals
            .add_member(goal_id, user_id, &invitation.id, &now_str())
            .await
        {
            Ok(goal) => {
                info!(
                    "User {} joined savings goal {} ({} members)",
                    user_id,
                    goal.id,
                    goal.members.len()
                );
                Ok(Outcome::Success(Resolved::new(
                    &invitation,
                    Some(goal_id),
                    decision,
                    status_recorded,
                )))
            }
            Err(err) if err.is_access_denied() => {
                warn!(
                    "Access denied adding user {} to savings goal {}: {}",
                    user_id, goal_id, err
                );
                Ok(Outcome::failure(
                    FailureCode::PermissionDenied,
                    "You don't have permission to join this savings goal. \
                     The goal owner must adjust its sharing settings.",
                    Some(&invitation.id),
                    Some(goal_id),
                ))
            }
            Err(err) => {
                warn!(
                    "Failed to add user {} to savings goal {}: {}",
                    user_id, goal_id, err
                );
                Ok(Outcome::failure(
                    FailureCode::GoalUpdateError,
                    "Your response was saved, but we couldn't add you to the savings goal. \
                     Please try again later.",
                    Some(&invitation.id),
                    Some(goal_id),
                ))
            }
        }
    }

    async fn record_decision(
        &self,
        invitation: &Invitation,
        user_id: &str,
        decision: InvitationDecision,
    ) -> StatusWrite {
        let resolution = InvitationResolution {
            status: decision.status(),
            invitee_id: user_id.to_string(),
            updated_at: now_str(),
        };

        match self
            .invitations
            .resolve_invitation(&invitation.id, InvitationStatus::Pending, &resolution)
            .await
        {
            Ok(_) => {
                debug!("Invitation {} marked {}", invitation.id, resolution.status);
                StatusWrite::Recorded
            }
            Err(StoreError::ConditionFailed(detail)) => {
                info!(
                    "Invitation {} was resolved concurrently: {}",
                    invitation.id, detail
                );
                StatusWrite::AlreadyResolved
            }
            Err(err) => {
                warn!(
                    "Could not record '{}' on invitation {}, continuing: {}",
                    decision, invitation.id, err
                );
                StatusWrite::Skipped
            }
        }
    }
}

fn already_resolved(invitation: &Invitation, goal_id: Option<&str>) -> Outcome {
    Outcome::failure(
        FailureCode::AlreadyResolved,
        "This invitation has already been answered.",
        Some(&invitation.id),
        goal_id,
    )
}
