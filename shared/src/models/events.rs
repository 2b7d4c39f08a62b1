use serde::{Deserialize, Serialize};

pub const INVITATION_RESPONDED: &str = "invitation_responded";

/// Event published when an invitee answers a savings goal invitation
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct InvitationEvent {
    pub event_type: String,
    pub invitation_id: String,
    pub savings_goal_id: Option<String>,
    pub savings_goal_title: String,
    pub inviter_id: String,
    pub invitee_id: String,
    pub decision: String,
    pub timestamp: String,
}
