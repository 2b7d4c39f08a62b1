//! Savings progress and time-to-goal arithmetic.
//!
//! Everything here is pure: callers pass the goal and the reference time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{parse_timestamp, round_cents, SavingsGoal};

/// Average month length used for deadline projections.
const DAYS_PER_MONTH: f64 = 30.44;

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GoalStatus {
    Active,
    Achieved,
    Overdue,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressReport {
    pub goal_id: String,
    pub percent: f64,
    pub remaining: f64,
    pub status: GoalStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub months_to_goal: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_until_deadline: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_monthly: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_track: Option<bool>,
}

/// Percentage of the target saved, clamped to 0..=100.
pub fn percent_complete(current: f64, target: f64) -> f64 {
    if target <= 0.0 || !target.is_finite() || !current.is_finite() {
        return 0.0;
    }
    let pct = (current / target * 100.0).clamp(0.0, 100.0);
    (pct * 10.0).round() / 10.0
}

pub fn remaining_amount(current: f64, target: f64) -> f64 {
    round_cents((target - current).max(0.0))
}

/// Whole months of contributions still needed. None when there is no
/// positive contribution to project with.
pub fn months_to_goal(remaining: f64, monthly_contribution: Option<f64>) -> Option<u32> {
    if remaining <= 0.0 {
        return Some(0);
    }
    match monthly_contribution {
        Some(c) if c > 0.0 && c.is_finite() => Some((remaining / c).ceil() as u32),
        _ => None,
    }
}

/// Whole days until the deadline; negative once it has passed.
pub fn days_until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (deadline - now).num_days()
}

pub fn goal_status(goal: &SavingsGoal, now: DateTime<Utc>) -> GoalStatus {
    if goal.target_amount > 0.0 && goal.current_amount >= goal.target_amount {
        return GoalStatus::Achieved;
    }
    match goal.deadline.as_deref().and_then(parse_timestamp) {
        Some(deadline) if deadline < now => GoalStatus::Overdue,
        _ => GoalStatus::Active,
    }
}

pub fn progress_report(goal: &SavingsGoal, now: DateTime<Utc>) -> ProgressReport {
    let remaining = remaining_amount(goal.current_amount, goal.target_amount);
    let months = months_to_goal(remaining, goal.monthly_contribution);
    let deadline = goal.deadline.as_deref().and_then(parse_timestamp);

    let days_until_deadline = deadline.map(|d| days_until(d, now));

    let required_monthly = match (deadline, remaining > 0.0) {
        (Some(d), true) => {
            let months_left = ((d - now).num_days() as f64 / DAYS_PER_MONTH).max(1.0);
            Some(round_cents(remaining / months_left))
        }
        _ => None,
    };

    let on_track = match (days_until_deadline, months) {
        (Some(_), Some(0)) => Some(true),
        (Some(days), Some(m)) => Some(days >= 0 && (m as f64) * DAYS_PER_MONTH <= days as f64),
        _ => None,
    };

    ProgressReport {
        goal_id: goal.id.clone(),
        percent: percent_complete(goal.current_amount, goal.target_amount),
        remaining,
        status: goal_status(goal, now),
        months_to_goal: months,
        days_until_deadline,
        required_monthly,
        on_track,
    }
}
