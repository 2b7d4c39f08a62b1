use nestegg_shared::store::{LoanStore, PushTokenStore, SavingsGoalStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub goals: Arc<dyn SavingsGoalStore>,
    pub loans: Arc<dyn LoanStore>,
    pub push_tokens: Arc<dyn PushTokenStore>,
}
