use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use log::info;
use nestegg_shared::loans::record_payment;
use nestegg_shared::models::{now_str, round_cents, Loan, LoanStatus};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{
    validate_non_negative, validate_positive, CreateLoanRequest, LoanPaymentRequest,
    LoanResponse,
};
use crate::state::AppState;

async fn load_owned_loan(state: &AppState, id: &str, user_id: &str) -> Result<Loan> {
    let loan = state.loans.get_loan(id).await?;
    if loan.owner_id != user_id {
        return Err(AppError::forbidden(
            "You don't have permission to access this loan".into(),
        ));
    }
    Ok(loan)
}

// GET /loans
pub async fn get_loans(
    State(state): State<AppState>,
    Extension(user_id): Extension<String>,
) -> Result<Json<serde_json::Value>> {
    let loans: Vec<LoanResponse> = state
        .loans
        .get_loans_by_owner(&user_id)
        .await?
        .into_iter()
        .map(LoanResponse::from)
        .collect();

    Ok(Json(serde_json::json!({ "loans": loans })))
}

// POST /loans
pub async fn create_loan(
    State(state): State<AppState>,
    Extension(user_id): Extension<String>,
    Json(payload): Json<CreateLoanRequest>,
) -> Result<(StatusCode, Json<LoanResponse>)> {
    let lender = payload.lender.trim().to_string();
    if lender.is_empty() {
        return Err(AppError::bad_request("Lender must not be empty".into()));
    }
    let principal =
        validate_positive("Principal", payload.principal).map_err(AppError::bad_request)?;
    let balance = validate_non_negative("Balance", payload.balance.unwrap_or(principal))
        .map_err(AppError::bad_request)?;
    if balance > principal {
        return Err(AppError::bad_request(
            "Balance cannot exceed the principal".into(),
        ));
    }
    let interest_rate = payload
        .interest_rate
        .map(|r| validate_non_negative("Interest rate", r))
        .transpose()
        .map_err(AppError::bad_request)?;

    let now = now_str();
    let balance = round_cents(balance);
    let loan = Loan {
        id: Uuid::new_v4().to_string(),
        owner_id: user_id,
        lender,
        principal: round_cents(principal),
        balance,
        interest_rate,
        payments: vec![],
        status: if balance > 0.0 {
            LoanStatus::Active
        } else {
            LoanStatus::PaidOff
        },
        created_at: now.clone(),
        updated_at: now,
    };

    let created = state.loans.create_loan(loan).await?;
    info!("Created loan {} for {}", created.id, created.owner_id);

    Ok((StatusCode::CREATED, Json(LoanResponse::from(created))))
}

// GET /loans/:id
pub async fn get_loan(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user_id): Extension<String>,
) -> Result<Json<LoanResponse>> {
    let loan = load_owned_loan(&state, &id, &user_id).await?;
    Ok(Json(LoanResponse::from(loan)))
}

// POST /loans/:id/payments
pub async fn record_loan_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user_id): Extension<String>,
    Json(payload): Json<LoanPaymentRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    let mut loan = load_owned_loan(&state, &id, &user_id).await?;
    let previous = loan.updated_at.clone();

    let payment = record_payment(&mut loan, payload.amount, payload.note, &now_str())?;
    // Guarded so two concurrent payments can't both pass the balance check.
    let updated = state.loans.update_loan(loan, &previous).await?;

    info!(
        "Recorded payment {} of {:.2} on loan {} (balance {:.2})",
        payment.id, payment.amount, updated.id, updated.balance
    );

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "payment": payment,
            "loan": LoanResponse::from(updated)
        })),
    ))
}
