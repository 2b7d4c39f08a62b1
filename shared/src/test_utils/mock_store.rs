use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::models::{
    Invitation, InvitationResolution, InvitationStatus, Loan, PushToken, SavingsGoal,
};
use crate::store::{InvitationStore, LoanStore, PushTokenStore, Result, SavingsGoalStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Table {
    Invitations,
    Goals,
    Loans,
    PushTokens,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Access {
    Read,
    Write,
}

/// In-memory implementation of every store trait, with switches to make
/// individual operations fail the way the real backend can.
#[derive(Default)]
pub struct MockStore {
    invitations: Mutex<HashMap<String, Invitation>>,
    goals: Mutex<HashMap<String, SavingsGoal>>,
    loans: Mutex<HashMap<String, Loan>>,
    push_tokens: Mutex<HashMap<String, PushToken>>,
    failures: Mutex<HashMap<(Table, Access), StoreError>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_invitation(&self, invitation: Invitation) {
        self.invitations
            .lock()
            .await
            .insert(invitation.id.clone(), invitation);
    }

    pub async fn insert_goal(&self, goal: SavingsGoal) {
        self.goals.lock().await.insert(goal.id.clone(), goal);
    }

    pub async fn insert_loan(&self, loan: Loan) {
        self.loans.lock().await.insert(loan.id.clone(), loan);
    }

    async fn inject(&self, table: Table, access: Access, err: StoreError) {
        self.failures.lock().await.insert((table, access), err);
    }

    pub async fn fail_invitation_reads(&self, err: StoreError) {
        self.inject(Table::Invitations, Access::Read, err).await;
    }

    pub async fn fail_invitation_writes(&self, err: StoreError) {
        self.inject(Table::Invitations, Access::Write, err).await;
    }

    pub async fn fail_goal_reads(&self, err: StoreError) {
        self.inject(Table::Goals, Access::Read, err).await;
    }

    pub async fn fail_goal_writes(&self, err: StoreError) {
        self.inject(Table::Goals, Access::Write, err).await;
    }

    pub async fn fail_loan_reads(&self, err: StoreError) {
        self.inject(Table::Loans, Access::Read, err).await;
    }

    pub async fn fail_loan_writes(&self, err: StoreError) {
        self.inject(Table::Loans, Access::Write, err).await;
    }

    pub async fn fail_push_token_reads(&self, err: StoreError) {
        self.inject(Table::PushTokens, Access::Read, err).await;
    }

    pub async fn fail_push_token_writes(&self, err: StoreError) {
        self.inject(Table::PushTokens, Access::Write, err).await;
    }

    /// Number of store reads issued through the traits.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of store writes issued through the traits, failed ones included.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    async fn check(&self, table: Table, access: Access) -> Result<()> {
        let counter = match access {
            Access::Read => &self.reads,
            Access::Write => &self.writes,
        };
        counter.fetch_add(1, Ordering::SeqCst);
        match self.failures.lock().await.get(&(table, access)) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

fn stale(kind: &str, id: &str, stored: &str, previous: &str) -> StoreError {
    StoreError::ConditionFailed(format!(
        "{} {} was updated at {}, expected {}",
        kind, id, stored, previous
    ))
}

#[async_trait]
impl InvitationStore for MockStore {
    async fn create_invitation(&self, invitation: Invitation) -> Result<Invitation> {
        self.check(Table::Invitations, Access::Write).await?;
        let mut invitations = self.invitations.lock().await;
        if invitations.contains_key(&invitation.id) {
            return Err(StoreError::ConditionFailed(format!(
                "Invitation {} already exists",
                invitation.id
            )));
        }
        invitations.insert(invitation.id.clone(), invitation.clone());
        Ok(invitation)
    }

    async fn get_invitation(&self, id: &str) -> Result<Invitation> {
        self.check(Table::Invitations, Access::Read).await?;
        self.invitations
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Invitation {} not found", id)))
    }

    async fn get_invitations_by_inviter(&self, inviter_id: &str) -> Result<Vec<Invitation>> {
        self.check(Table::Invitations, Access::Read).await?;
        let mut found: Vec<Invitation> = self
            .invitations
            .lock()
            .await
            .values()
            .filter(|i| i.inviter_id == inviter_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }

    async fn get_pending_invitations_for_email(&self, email: &str) -> Result<Vec<Invitation>> {
        self.check(Table::Invitations, Access::Read).await?;
        let mut found: Vec<Invitation> = self
            .invitations
            .lock()
            .await
            .values()
            .filter(|i| i.invitee_email == email && i.is_pending())
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }

    async fn resolve_invitation(
        &self,
        id: &str,
        expected: InvitationStatus,
        resolution: &InvitationResolution,
    ) -> Result<Invitation> {
        self.check(Table::Invitations, Access::Write).await?;
        // Check and write under one lock, like a conditional update.
        let mut invitations = self.invitations.lock().await;
        let invitation = invitations
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("Invitation {} not found", id)))?;

        if invitation.status != expected {
            return Err(StoreError::ConditionFailed(format!(
                "Invitation {} is {}, expected {}",
                id, invitation.status, expected
            )));
        }

        invitation.status = resolution.status;
        invitation.invitee_id = Some(resolution.invitee_id.clone());
        invitation.updated_at = Some(resolution.updated_at.clone());
        Ok(invitation.clone())
    }
}

#[async_trait]
impl SavingsGoalStore for MockStore {
    async fn create_goal(&self, goal: SavingsGoal) -> Result<SavingsGoal> {
        self.check(Table::Goals, Access::Write).await?;
        self.goals.lock().await.insert(goal.id.clone(), goal.clone());
        Ok(goal)
    }

    async fn get_goal(&self, id: &str) -> Result<SavingsGoal> {
        self.check(Table::Goals, Access::Read).await?;
        self.goals
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Savings goal {} not found", id)))
    }

    async fn get_goals_for_user(&self, user_id: &str) -> Result<Vec<SavingsGoal>> {
        self.check(Table::Goals, Access::Read).await?;
        let mut found: Vec<SavingsGoal> = self
            .goals
            .lock()
            .await
            .values()
            .filter(|g| g.is_visible_to(user_id))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn update_goal(
        &self,
        goal: SavingsGoal,
        previous_updated_at: &str,
    ) -> Result<SavingsGoal> {
        self.check(Table::Goals, Access::Write).await?;
        let mut goals = self.goals.lock().await;
        let stored = goals
            .get(&goal.id)
            .ok_or_else(|| StoreError::NotFound(format!("Savings goal {} not found", goal.id)))?;
        if stored.updated_at != previous_updated_at {
            return Err(stale(
                "Savings goal",
                &goal.id,
                &stored.updated_at,
                previous_updated_at,
            ));
        }
        goals.insert(goal.id.clone(), goal.clone());
        Ok(goal)
    }

    async fn delete_goal(&self, id: &str) -> Result<()> {
        self.check(Table::Goals, Access::Write).await?;
        self.goals
            .lock()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("Savings goal {} not found", id)))
    }

    async fn add_member(
        &self,
        goal_id: &str,
        user_id: &str,
        invitation_id: &str,
        updated_at: &str,
    ) -> Result<SavingsGoal> {
        self.check(Table::Goals, Access::Write).await?;
        let mut goals = self.goals.lock().await;
        let goal = goals
            .get_mut(goal_id)
            .ok_or_else(|| StoreError::NotFound(format!("Savings goal {} not found", goal_id)))?;

        goal.members.insert(user_id.to_string());
        goal.last_invitation_id = Some(invitation_id.to_string());
        goal.updated_at = updated_at.to_string();
        Ok(goal.clone())
    }

    async fn scan_goals_with_reminders(&self) -> Result<Vec<SavingsGoal>> {
        self.check(Table::Goals, Access::Read).await?;
        let mut found: Vec<SavingsGoal> = self
            .goals
            .lock()
            .await
            .values()
            .filter(|g| g.reminder.is_some())
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }
}

#[async_trait]
impl LoanStore for MockStore {
    async fn create_loan(&self, loan: Loan) -> Result<Loan> {
        self.check(Table::Loans, Access::Write).await?;
        let mut loans = self.loans.lock().await;
        if loans.contains_key(&loan.id) {
            return Err(StoreError::ConditionFailed(format!(
                "Loan {} already exists",
                loan.id
            )));
        }
        loans.insert(loan.id.clone(), loan.clone());
        Ok(loan)
    }

    async fn get_loan(&self, id: &str) -> Result<Loan> {
        self.check(Table::Loans, Access::Read).await?;
        self.loans
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Loan {} not found", id)))
    }

    async fn get_loans_by_owner(&self, owner_id: &str) -> Result<Vec<Loan>> {
        self.check(Table::Loans, Access::Read).await?;
        let mut found: Vec<Loan> = self
            .loans
            .lock()
            .await
            .values()
            .filter(|l| l.owner_id == owner_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn update_loan(&self, loan: Loan, previous_updated_at: &str) -> Result<Loan> {
        self.check(Table::Loans, Access::Write).await?;
        let mut loans = self.loans.lock().await;
        let stored = loans
            .get(&loan.id)
            .ok_or_else(|| StoreError::NotFound(format!("Loan {} not found", loan.id)))?;
        if stored.updated_at != previous_updated_at {
            return Err(stale("Loan", &loan.id, &stored.updated_at, previous_updated_at));
        }
        loans.insert(loan.id.clone(), loan.clone());
        Ok(loan)
    }
}

#[async_trait]
impl PushTokenStore for MockStore {
    async fn save_push_token(&self, token: PushToken) -> Result<PushToken> {
        self.check(Table::PushTokens, Access::Write).await?;
        self.push_tokens
            .lock()
            .await
            .insert(token.user_id.clone(), token.clone());
        Ok(token)
    }

    async fn get_push_tokens(&self, user_ids: &[String]) -> Result<Vec<PushToken>> {
        self.check(Table::PushTokens, Access::Read).await?;
        let tokens = self.push_tokens.lock().await;
        Ok(user_ids
            .iter()
            .filter_map(|id| tokens.get(id).cloned())
            .collect())
    }
}
