use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

pub mod events;

pub use events::InvitationEvent;

/// Current time as an RFC 3339 string, the format every stored timestamp uses.
pub fn now_str() -> String {
    Utc::now().to_rfc3339()
}

/// Parses a stored timestamp, returning None for anything that isn't RFC 3339.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Rounds a currency amount to whole cents.
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Invitations
// ---------------------------------------------------------------------------

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
}

impl fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvitationStatus::Pending => write!(f, "pending"),
            InvitationStatus::Accepted => write!(f, "accepted"),
            InvitationStatus::Declined => write!(f, "declined"),
        }
    }
}

/// The answer an invitee gives to an invitation.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InvitationDecision {
    Accepted,
    Declined,
}

impl InvitationDecision {
    pub fn status(self) -> InvitationStatus {
        match self {
            InvitationDecision::Accepted => InvitationStatus::Accepted,
            InvitationDecision::Declined => InvitationStatus::Declined,
        }
    }
}

impl fmt::Display for InvitationDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.status().fmt(f)
    }
}

/// A request for someone (addressed by email) to join a shared savings goal.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub savings_goal_id: Option<String>,
    pub savings_goal_title: String,
    pub inviter_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inviter_name: Option<String>,
    pub invitee_email: String,
    #[serde(default)]
    pub invitee_id: Option<String>,
    pub status: InvitationStatus,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Invitation {
    pub fn is_pending(&self) -> bool {
        self.status == InvitationStatus::Pending
    }
}

/// Fields written when an invitation leaves the pending state.
#[derive(Debug, Clone, PartialEq)]
pub struct InvitationResolution {
    pub status: InvitationStatus,
    pub invitee_id: String,
    pub updated_at: String,
}

// ---------------------------------------------------------------------------
// Savings goals
// ---------------------------------------------------------------------------

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReminderFrequency {
    Daily,
    Weekly,
    Monthly,
}

impl ReminderFrequency {
    pub fn interval_hours(self) -> i64 {
        match self {
            ReminderFrequency::Daily => 24,
            ReminderFrequency::Weekly => 24 * 7,
            ReminderFrequency::Monthly => 24 * 30,
        }
    }
}

impl fmt::Display for ReminderFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReminderFrequency::Daily => write!(f, "daily"),
            ReminderFrequency::Weekly => write!(f, "weekly"),
            ReminderFrequency::Monthly => write!(f, "monthly"),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReminderSettings {
    pub frequency: ReminderFrequency,
    #[serde(default)]
    pub last_sent_at: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SavingsGoal {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub target_amount: f64,
    #[serde(default)]
    pub current_amount: f64,
    #[serde(default)]
    pub monthly_contribution: Option<f64>,
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default)]
    pub members: BTreeSet<String>,
    #[serde(default)]
    pub last_invitation_id: Option<String>,
    #[serde(default)]
    pub reminder: Option<ReminderSettings>,
    pub created_at: String,
    pub updated_at: String,
}

impl SavingsGoal {
    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.contains(user_id)
    }

    /// Owners and members may read a goal and contribute to it.
    pub fn is_visible_to(&self, user_id: &str) -> bool {
        self.owner_id == user_id || self.is_member(user_id)
    }

    /// Everyone who should hear about the goal: owner first, then members.
    pub fn participants(&self) -> Vec<String> {
        let mut ids = vec![self.owner_id.clone()];
        ids.extend(
            self.members
                .iter()
                .filter(|m| **m != self.owner_id)
                .cloned(),
        );
        ids
    }
}

// ---------------------------------------------------------------------------
// Loans
// ---------------------------------------------------------------------------

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum LoanStatus {
    Active,
    PaidOff,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoanPayment {
    pub id: String,
    pub amount: f64,
    pub paid_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    pub id: String,
    pub owner_id: String,
    pub lender: String,
    pub principal: f64,
    pub balance: f64,
    #[serde(default)]
    pub interest_rate: Option<f64>,
    #[serde(default)]
    pub payments: Vec<LoanPayment>,
    pub status: LoanStatus,
    pub created_at: String,
    pub updated_at: String,
}

// ---------------------------------------------------------------------------
// Push tokens
// ---------------------------------------------------------------------------

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PushToken {
    pub user_id: String,
    pub push_token: String,
    pub platform: String,
    pub updated_at: String,
}

/// Generic message body shared by the HTTP services.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invitation_serializes_camel_case() {
        let invitation = Invitation {
            id: "inv-1".into(),
            savings_goal_id: Some("goal-1".into()),
            savings_goal_title: "Holiday".into(),
            inviter_id: "owner".into(),
            inviter_name: None,
            invitee_email: "friend@example.com".into(),
            invitee_id: None,
            status: InvitationStatus::Pending,
            created_at: now_str(),
            updated_at: None,
        };

        let json = serde_json::to_value(&invitation).unwrap();
        assert_eq!(json["savingsGoalId"], "goal-1");
        assert_eq!(json["status"], "pending");
        assert!(json.get("inviterName").is_none());
        assert!(json["inviteeId"].is_null());
    }

    #[test]
    fn test_participants_lists_owner_once() {
        let mut goal = SavingsGoal {
            id: "goal-1".into(),
            owner_id: "owner".into(),
            title: "Car".into(),
            description: None,
            target_amount: 1000.0,
            current_amount: 0.0,
            monthly_contribution: None,
            deadline: None,
            members: BTreeSet::new(),
            last_invitation_id: None,
            reminder: None,
            created_at: now_str(),
            updated_at: now_str(),
        };
        goal.members.insert("owner".into());
        goal.members.insert("friend".into());

        assert_eq!(goal.participants(), vec!["owner".to_string(), "friend".to_string()]);
        assert!(goal.is_visible_to("friend"));
        assert!(!goal.is_visible_to("stranger"));
    }

    #[test]
    fn test_round_cents() {
        assert_eq!(round_cents(10.005_1), 10.01);
        assert_eq!(round_cents(0.1 + 0.2), 0.3);
    }
}
