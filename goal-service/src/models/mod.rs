use chrono::{NaiveDate, Utc};
use nestegg_shared::models::{Loan, LoanPayment, LoanStatus, ReminderSettings, SavingsGoal};
use nestegg_shared::progress::{GoalStatus, ProgressReport};
use serde::{Deserialize, Deserializer, Serialize};

const MAX_TITLE_LEN: usize = 100;

/// Distinguishes "field absent" (None) from "field set to null" (Some(Null)).
#[derive(Debug, Clone, PartialEq)]
pub enum OptionalField<T> {
    Value(T),
    Null,
}

impl<'de, T> Deserialize<'de> for OptionalField<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => OptionalField::Value(value),
            None => OptionalField::Null,
        })
    }
}

fn optional_field<'de, D, T>(deserializer: D) -> Result<Option<OptionalField<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    OptionalField::deserialize(deserializer).map(Some)
}

// Request DTOs
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateGoalRequest {
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
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGoalRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "optional_field")]
    pub description: Option<OptionalField<String>>,
    pub target_amount: Option<f64>,
    #[serde(default, deserialize_with = "optional_field")]
    pub monthly_contribution: Option<OptionalField<f64>>,
    #[serde(default, deserialize_with = "optional_field")]
    pub deadline: Option<OptionalField<String>>,
}

#[derive(Deserialize, Debug)]
pub struct ContributionRequest {
    pub amount: f64,
}

#[derive(Deserialize, Debug)]
pub struct ReminderRequest {
    /// daily, weekly, monthly or off
    pub frequency: String,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GoalSort {
    Deadline,
    Progress,
    Title,
}

#[derive(Deserialize, Debug, Default)]
pub struct GoalListQuery {
    pub status: Option<GoalStatus>,
    pub search: Option<String>,
    pub sort: Option<GoalSort>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateLoanRequest {
    pub lender: String,
    pub principal: f64,
    #[serde(default)]
    pub balance: Option<f64>,
    #[serde(default)]
    pub interest_rate: Option<f64>,
}

#[derive(Deserialize, Debug)]
pub struct LoanPaymentRequest {
    pub amount: f64,
    #[serde(default)]
    pub note: Option<String>,
}

// Response DTOs
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GoalResponse {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub target_amount: f64,
    pub current_amount: f64,
    pub monthly_contribution: Option<f64>,
    pub deadline: Option<String>,
    pub members: Vec<String>,
    pub reminder: Option<ReminderSettings>,
    pub percent: f64,
    pub status: GoalStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl GoalResponse {
    pub fn new(goal: SavingsGoal, progress: &ProgressReport) -> Self {
        Self {
            id: goal.id,
            owner_id: goal.owner_id,
            title: goal.title,
            description: goal.description,
            target_amount: goal.target_amount,
            current_amount: goal.current_amount,
            monthly_contribution: goal.monthly_contribution,
            deadline: goal.deadline,
            members: goal.members.into_iter().collect(),
            reminder: goal.reminder,
            percent: progress.percent,
            status: progress.status,
            created_at: goal.created_at,
            updated_at: goal.updated_at,
        }
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LoanResponse {
    pub id: String,
    pub lender: String,
    pub principal: f64,
    pub balance: f64,
    pub interest_rate: Option<f64>,
    pub total_paid: f64,
    pub status: LoanStatus,
    pub payments: Vec<LoanPayment>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Loan> for LoanResponse {
    fn from(loan: Loan) -> Self {
        Self {
            total_paid: nestegg_shared::loans::total_paid(&loan),
            id: loan.id,
            lender: loan.lender,
            principal: loan.principal,
            balance: loan.balance,
            interest_rate: loan.interest_rate,
            status: loan.status,
            payments: loan.payments,
            created_at: loan.created_at,
            updated_at: loan.updated_at,
        }
    }
}

// Validation helpers

pub fn validate_title(title: &str) -> Result<String, String> {
    let title = title.trim();
    if title.is_empty() {
        return Err("Title must not be empty".to_string());
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(format!("Title must be at most {} characters", MAX_TITLE_LEN));
    }
    Ok(title.to_string())
}

pub fn validate_positive(name: &str, value: f64) -> Result<f64, String> {
    if !value.is_finite() || value <= 0.0 {
        return Err(format!("{} must be greater than zero", name));
    }
    Ok(value)
}

pub fn validate_non_negative(name: &str, value: f64) -> Result<f64, String> {
    if !value.is_finite() || value < 0.0 {
        return Err(format!("{} must not be negative", name));
    }
    Ok(value)
}

/// Accepts an RFC 3339 timestamp or a plain `YYYY-MM-DD` date (midnight UTC)
/// and returns the stored RFC 3339 form.
pub fn normalize_deadline(value: &str) -> Result<String, String> {
    let value = value.trim();
    if let Some(ts) = nestegg_shared::models::parse_timestamp(value) {
        return Ok(ts.to_rfc3339());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().to_rfc3339())
        .ok_or_else(|| format!("Invalid deadline: {}", value))
}

/// Deadlines must lie in the future when they are set.
pub fn validate_deadline(value: &str) -> Result<String, String> {
    let normalized = normalize_deadline(value)?;
    match nestegg_shared::models::parse_timestamp(&normalized) {
        Some(ts) if ts > Utc::now() => Ok(normalized),
        _ => Err("Deadline must be in the future".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_distinguishes_null_from_missing() {
        let req: UpdateGoalRequest =
            serde_json::from_str(r#"{"deadline": null, "title": "New"}"#).unwrap();
        assert_eq!(req.deadline, Some(OptionalField::Null));
        assert!(req.description.is_none());
        assert_eq!(req.title.as_deref(), Some("New"));

        let req: UpdateGoalRequest =
            serde_json::from_str(r#"{"monthlyContribution": 50.5}"#).unwrap();
        assert_eq!(req.monthly_contribution, Some(OptionalField::Value(50.5)));
    }

    #[test]
    fn test_normalize_deadline() {
        assert_eq!(
            normalize_deadline("2030-06-01").unwrap(),
            "2030-06-01T00:00:00+00:00"
        );
        assert_eq!(
            normalize_deadline("2030-06-01T12:30:00+02:00").unwrap(),
            "2030-06-01T10:30:00+00:00"
        );
        assert!(normalize_deadline("next june").is_err());
        assert!(validate_deadline("2001-01-01").is_err());
        assert!(validate_deadline("2999-01-01").is_ok());
    }

    #[test]
    fn test_validate_title() {
        assert_eq!(validate_title("  House  ").unwrap(), "House");
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"x".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_amounts() {
        assert!(validate_positive("Target", 0.0).is_err());
        assert!(validate_positive("Target", f64::INFINITY).is_err());
        assert!(validate_non_negative("Current", 0.0).is_ok());
        assert!(validate_non_negative("Current", -0.5).is_err());
    }
}
