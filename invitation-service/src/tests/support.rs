use chrono::Utc;
use nestegg_shared::models::{Invitation, InvitationStatus, SavingsGoal};
use std::collections::BTreeSet;

use crate::coordinator::Caller;

pub const INVITEE_EMAIL: &str = "friend@example.com";

/// A caller signed in with the address the test invitations are sent to.
pub fn invitee(user_id: &str) -> Caller {
    Caller::new(user_id, Some(INVITEE_EMAIL))
}

pub fn pending_invitation(id: &str, goal_id: Option<&str>) -> Invitation {
    Invitation {
        id: id.to_string(),
        savings_goal_id: goal_id.map(str::to_string),
        savings_goal_title: "Summer trip".to_string(),
        inviter_id: "owner-1".to_string(),
        inviter_name: Some("Owner".to_string()),
        invitee_email: INVITEE_EMAIL.to_string(),
        invitee_id: None,
        status: InvitationStatus::Pending,
        created_at: Utc::now().to_rfc3339(),
        updated_at: None,
    }
}

pub fn goal(id: &str, members: &[&str]) -> SavingsGoal {
    let now = Utc::now().to_rfc3339();
    SavingsGoal {
        id: id.to_string(),
        owner_id: "owner-1".to_string(),
        title: "Summer trip".to_string(),
        description: None,
        target_amount: 2000.0,
        current_amount: 150.0,
        monthly_contribution: Some(200.0),
        deadline: None,
        members: members.iter().map(|m| m.to_string()).collect::<BTreeSet<_>>(),
        last_invitation_id: None,
        reminder: None,
        created_at: now.clone(),
        updated_at: now,
    }
}
