use chrono::{DateTime, Utc};
use nestegg_shared::models::{parse_timestamp, SavingsGoal};
use nestegg_shared::progress::{goal_status, percent_complete};
use std::cmp::Ordering;

use crate::models::{GoalListQuery, GoalSort};

/// Applies the list query's status/search filters and ordering.
pub fn filter_goals(
    goals: Vec<SavingsGoal>,
    query: &GoalListQuery,
    now: DateTime<Utc>,
) -> Vec<SavingsGoal> {
    let needle = query
        .search
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());

    let mut goals: Vec<SavingsGoal> = goals
        .into_iter()
        .filter(|g| match query.status {
            Some(status) => goal_status(g, now) == status,
            None => true,
        })
        .filter(|g| match &needle {
            Some(needle) => g.title.to_lowercase().contains(needle.as_str()),
            None => true,
        })
        .collect();

    if let Some(sort) = query.sort {
        goals.sort_by(|a, b| compare(a, b, sort));
    }
    goals
}

fn compare(a: &SavingsGoal, b: &SavingsGoal, sort: GoalSort) -> Ordering {
    match sort {
        // Soonest deadline first, goals without one last.
        GoalSort::Deadline => {
            let da = a.deadline.as_deref().and_then(parse_timestamp);
            let db = b.deadline.as_deref().and_then(parse_timestamp);
            match (da, db) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        }
        // Most progressed first.
        GoalSort::Progress => {
            let pa = percent_complete(a.current_amount, a.target_amount);
            let pb = percent_complete(b.current_amount, b.target_amount);
            pb.partial_cmp(&pa).unwrap_or(Ordering::Equal)
        }
        GoalSort::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
    }
    .then_with(|| a.id.cmp(&b.id))
}
