use nestegg_shared::models::{Invitation, InvitationDecision, InvitationStatus};
use serde::{Deserialize, Serialize};

// Request DTOs
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvitationRequest {
    pub savings_goal_id: String,
    pub invitee_email: String,
    #[serde(default)]
    pub inviter_name: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct RespondToInvitationRequest {
    pub decision: InvitationDecision,
}

// Response DTOs
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct InvitationResponse {
    pub id: String,
    pub savings_goal_id: Option<String>,
    pub savings_goal_title: String,
    pub inviter_id: String,
    pub inviter_name: Option<String>,
    pub invitee_email: String,
    pub invitee_id: Option<String>,
    pub status: InvitationStatus,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl From<Invitation> for InvitationResponse {
    fn from(inv: Invitation) -> Self {
        Self {
            id: inv.id,
            savings_goal_id: inv.savings_goal_id,
            savings_goal_title: inv.savings_goal_title,
            inviter_id: inv.inviter_id,
            inviter_name: inv.inviter_name,
            invitee_email: inv.invitee_email,
            invitee_id: inv.invitee_id,
            status: inv.status,
            created_at: inv.created_at,
            updated_at: inv.updated_at,
        }
    }
}

/// Loose shape check; the auth provider owns real address verification.
pub fn is_plausible_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
                && !domain.contains('@')
        }
        None => false,
    }
}

/// Emails are matched case-insensitively, so they are stored lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_plausible_email() {
        assert!(is_plausible_email("friend@example.com"));
        assert!(is_plausible_email(" Friend@Example.co.uk "));
        assert!(!is_plausible_email("friend"));
        assert!(!is_plausible_email("@example.com"));
        assert!(!is_plausible_email("friend@example"));
        assert!(!is_plausible_email("friend@.com"));
        assert!(!is_plausible_email("fr iend@example.com"));
        assert!(!is_plausible_email("a@b@example.com"));
    }

    #[test]
    fn test_respond_request_parses_decision() {
        let req: RespondToInvitationRequest =
            serde_json::from_str(r#"{"decision":"accepted"}"#).unwrap();
        assert_eq!(req.decision, InvitationDecision::Accepted);
        assert!(serde_json::from_str::<RespondToInvitationRequest>(r#"{"decision":"maybe"}"#).is_err());
    }
}
