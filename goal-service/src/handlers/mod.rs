pub mod goal_handlers;
pub mod loan_handlers;
pub mod user_handlers;
