use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{
    Invitation, InvitationResolution, InvitationStatus, Loan, PushToken, SavingsGoal,
};

pub mod dynamo;

pub type Result<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait InvitationStore: Send + Sync {
    async fn create_invitation(&self, invitation: Invitation) -> Result<Invitation>;

    async fn get_invitation(&self, id: &str) -> Result<Invitation>;

    async fn get_invitations_by_inviter(&self, inviter_id: &str) -> Result<Vec<Invitation>>;

    async fn get_pending_invitations_for_email(&self, email: &str) -> Result<Vec<Invitation>>;

    /// Writes the resolution only if the stored status still equals `expected`.
    /// A mismatch is reported as `StoreError::ConditionFailed`.
    async fn resolve_invitation(
        &self,
        id: &str,
        expected: InvitationStatus,
        resolution: &InvitationResolution,
    ) -> Result<Invitation>;
}

#[async_trait]
pub trait SavingsGoalStore: Send + Sync {
    async fn create_goal(&self, goal: SavingsGoal) -> Result<SavingsGoal>;

    async fn get_goal(&self, id: &str) -> Result<SavingsGoal>;

    /// Goals the user owns or is a member of.
    async fn get_goals_for_user(&self, user_id: &str) -> Result<Vec<SavingsGoal>>;

    /// Replaces the stored goal, but only while its `updatedAt` still equals
    /// `previous_updated_at`. A concurrent change yields `ConditionFailed`.
    async fn update_goal(
        &self,
        goal: SavingsGoal,
        previous_updated_at: &str,
    ) -> Result<SavingsGoal>;

    async fn delete_goal(&self, id: &str) -> Result<()>;

    /// Set-union of `user_id` into the goal's members, stamping the invitation
    /// that caused it. Adding an existing member leaves the set unchanged.
    async fn add_member(
        &self,
        goal_id: &str,
        user_id: &str,
        invitation_id: &str,
        updated_at: &str,
    ) -> Result<SavingsGoal>;

    async fn scan_goals_with_reminders(&self) -> Result<Vec<SavingsGoal>>;
}

#[async_trait]
pub trait LoanStore: Send + Sync {
    async fn create_loan(&self, loan: Loan) -> Result<Loan>;

    async fn get_loan(&self, id: &str) -> Result<Loan>;

    async fn get_loans_by_owner(&self, owner_id: &str) -> Result<Vec<Loan>>;

    /// Same `updatedAt` guard as [`SavingsGoalStore::update_goal`].
    async fn update_loan(&self, loan: Loan, previous_updated_at: &str) -> Result<Loan>;
}

#[async_trait]
pub trait PushTokenStore: Send + Sync {
    async fn save_push_token(&self, token: PushToken) -> Result<PushToken>;

    async fn get_push_tokens(&self, user_ids: &[String]) -> Result<Vec<PushToken>>;
}
