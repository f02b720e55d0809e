//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Core commands (init, status) and shared utilities (open_db)
//! - `accounts` - Bank account commands
//! - `categories` - Transaction category commands
//! - `records` - Ledger record commands (add, amend, retract, list)
//! - `members` - Member commands (add, dues, plan, purge)
//! - `subscriptions` - Monthly subscription commands
//! - `installments` - Installment lifecycle commands
//! - `loans` - Loan and repayment commands
//! - `rank_fees` - Expected-fee table commands

pub mod accounts;
pub mod categories;
pub mod core;
pub mod installments;
pub mod loans;
pub mod members;
pub mod rank_fees;
pub mod records;
pub mod subscriptions;

// Re-export command functions for main.rs
pub use self::accounts::*;
pub use self::categories::*;
pub use self::core::*;
pub use self::installments::*;
pub use self::loans::*;
pub use self::members::*;
pub use self::rank_fees::*;
pub use self::records::*;
pub use self::subscriptions::*;

use anyhow::{Context, Result};
use bursar_core::models::{ObligationPayment, PaymentMethod};
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::cli::PaymentArgs;

/// Parse a YYYY-MM-DD command argument
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))
}

/// Parse a decimal amount argument
pub fn parse_amount(s: &str) -> Result<Decimal> {
    s.parse::<Decimal>()
        .with_context(|| format!("Invalid amount '{}'", s))
}

/// Parse a payment method argument
pub fn parse_method(s: &str) -> Result<PaymentMethod> {
    s.parse::<PaymentMethod>().map_err(anyhow::Error::msg)
}

/// Turn shared payment flags into an engine payment
pub fn parse_payment(args: &PaymentArgs) -> Result<ObligationPayment> {
    Ok(ObligationPayment {
        amount: parse_amount(&args.amount)?,
        paid_at: parse_date(&args.date)?,
        payment_method: parse_method(&args.method)?,
        bank_account_id: args.bank_account,
        receipt_number: args.receipt.clone(),
        notes: args.notes.clone(),
        actor: args.actor.clone(),
    })
}
