use nestegg_shared::store::{InvitationStore, SavingsGoalStore};
use std::sync::Arc;

use crate::coordinator::InvitationCoordinator;

/// Shared handler state: the two stores and the coordinator built on them.
pub struct AppState<I, G> {
    pub invitations: Arc<I>,
    pub goals: Arc<G>,
    pub coordinator: InvitationCoordinator<I, G>,
}

impl<I, G> AppState<I, G>
where
    I: InvitationStore,
    G: SavingsGoalStore,
{
    pub fn new(invitations: Arc<I>, goals: Arc<G>) -> Self {
        let coordinator = InvitationCoordinator::new(invitations.clone(), goals.clone());
        Self {
            invitations,
            goals,
            coordinator,
        }
    }
}

impl<I, G> Clone for AppState<I, G> {
    fn clone(&self) -> Self {
        Self {
            invitations: Arc::clone(&self.invitations),
            goals: Arc::clone(&self.goals),
            coordinator: self.coordinator.clone(),
        }
    }
}
