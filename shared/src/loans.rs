use thiserror::Error;
use uuid::Uuid;

use crate::models::{round_cents, Loan, LoanPayment, LoanStatus};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PaymentError {
    #[error("Payment amount must be a positive number")]
    InvalidAmount,

    #[error("Loan is already paid off")]
    AlreadyPaidOff,

    #[error("Payment of {amount:.2} exceeds the outstanding balance of {balance:.2}")]
    ExceedsBalance { amount: f64, balance: f64 },
}

/// Applies a payment to a loan in place and returns the recorded payment.
///
/// The balance never goes negative; a loan whose balance reaches zero is
/// marked paid off and accepts no further payments.
pub fn record_payment(
    loan: &mut Loan,
    amount: f64,
    note: Option<String>,
    now: &str,
) -> Result<LoanPayment, PaymentError> {
    if loan.status == LoanStatus::PaidOff {
        return Err(PaymentError::AlreadyPaidOff);
    }
    if !amount.is_finite() || amount <= 0.0 {
        return Err(PaymentError::InvalidAmount);
    }

    let amount = round_cents(amount);
    if amount <= 0.0 {
        return Err(PaymentError::InvalidAmount);
    }
    if amount > round_cents(loan.balance) {
        return Err(PaymentError::ExceedsBalance {
            amount,
            balance: loan.balance,
        });
    }

    let payment = LoanPayment {
        id: Uuid::new_v4().to_string(),
        amount,
        paid_at: now.to_string(),
        note,
    };

    loan.balance = round_cents(loan.balance - amount);
    if loan.balance <= 0.0 {
        loan.balance = 0.0;
        loan.status = LoanStatus::PaidOff;
    }
    loan.payments.push(payment.clone());
    loan.updated_at = now.to_string();

    Ok(payment)
}

/// Sum of recorded payments, in cents precision.
pub fn total_paid(loan: &Loan) -> f64 {
    round_cents(loan.payments.iter().map(|p| p.amount).sum())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loan(balance: f64) -> Loan {
        Loan {
            id: "loan-1".into(),
            owner_id: "owner".into(),
            lender: "Bank".into(),
            principal: balance,
            balance,
            interest_rate: None,
            payments: vec![],
            status: LoanStatus::Active,
            created_at: "2026-01-01T00:00:00+00:00".into(),
            updated_at: "2026-01-01T00:00:00+00:00".into(),
        }
    }

    #[test]
    fn test_partial_payment_reduces_balance() {
        let mut l = loan(1000.0);
        let payment = record_payment(&mut l, 250.456, Some("march".into()), "now").unwrap();

        assert_eq!(payment.amount, 250.46);
        assert_eq!(l.balance, 749.54);
        assert_eq!(l.status, LoanStatus::Active);
        assert_eq!(l.payments.len(), 1);
        assert_eq!(l.updated_at, "now");
    }

    #[test]
    fn test_final_payment_marks_paid_off() {
        let mut l = loan(100.0);
        record_payment(&mut l, 60.0, None, "t1").unwrap();
        record_payment(&mut l, 40.0, None, "t2").unwrap();

        assert_eq!(l.balance, 0.0);
        assert_eq!(l.status, LoanStatus::PaidOff);
        assert_eq!(total_paid(&l), 100.0);
        assert_eq!(
            record_payment(&mut l, 1.0, None, "t3"),
            Err(PaymentError::AlreadyPaidOff)
        );
    }

    #[test]
    fn test_rejects_invalid_amounts() {
        let mut l = loan(100.0);
        assert_eq!(record_payment(&mut l, 0.0, None, "t"), Err(PaymentError::InvalidAmount));
        assert_eq!(record_payment(&mut l, -5.0, None, "t"), Err(PaymentError::InvalidAmount));
        assert_eq!(
            record_payment(&mut l, f64::NAN, None, "t"),
            Err(PaymentError::InvalidAmount)
        );
        assert_eq!(
            record_payment(&mut l, 0.001, None, "t"),
            Err(PaymentError::InvalidAmount)
        );
        assert!(matches!(
            record_payment(&mut l, 100.01, None, "t"),
            Err(PaymentError::ExceedsBalance { .. })
        ));
        assert!(l.payments.is_empty());
        assert_eq!(l.balance, 100.0);
    }
}
