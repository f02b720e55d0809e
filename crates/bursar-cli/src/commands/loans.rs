//! Loan and repayment command implementations

use std::path::Path;

use anyhow::Result;
use bursar_core::models::NewLoan;

use super::{open_db, parse_amount, parse_date, parse_method, parse_payment};
use crate::cli::LoansAction;

pub fn cmd_loans(db_path: &Path, action: LoansAction, no_encrypt: bool) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;

    match action {
        LoansAction::List { member } => {
            println!(
                "{:<6} {:>12} {:<12} {}",
                "ID", "Principal", "Issued", "Progress"
            );
            for loan in db.list_member_loans(member)? {
                let status = db.loan_status(loan.id)?;
                println!(
                    "{:<6} {:>12} {:<12} {}/{}{}",
                    loan.id,
                    loan.amount,
                    loan.issued_date,
                    status.paid,
                    status.total,
                    if status.is_completed { " ✓" } else { "" }
                );
            }
        }
        LoansAction::Create {
            member,
            amount,
            issued,
            count,
            start_date,
            method,
            bank_account,
            receipt,
            notes,
            actor,
        } => {
            let (loan, repayments) = db.create_loan(&NewLoan {
                member_id: member,
                amount: parse_amount(&amount)?,
                issued_date: parse_date(&issued)?,
                repayments_count: count,
                start_date: parse_date(&start_date)?,
                payment_method: parse_method(&method)?,
                bank_account_id: bank_account,
                receipt_number: receipt,
                notes,
                actor,
            })?;
            println!(
                "Issued loan {} of {} with {} repayment(s)",
                loan.id,
                loan.amount,
                repayments.len()
            );
        }
        LoansAction::Status { id } => {
            let status = db.loan_status(id)?;
            println!(
                "Loan {}: {} paid, {} unpaid of {}, {}",
                id,
                status.paid,
                status.unpaid,
                status.total,
                if status.is_completed {
                    "completed"
                } else {
                    "open"
                }
            );
        }
        LoansAction::Repayments { id } => {
            println!(
                "{:<6} {:<4} {:<12} {:>10} {:<8} {}",
                "ID", "#", "Due", "Amount", "Status", "Paid at"
            );
            for repayment in db.list_loan_repayments(id)? {
                println!(
                    "{:<6} {:<4} {:<12} {:>10} {:<8} {}",
                    repayment.id,
                    repayment.sequence_number,
                    repayment.due_date,
                    repayment.amount,
                    repayment.status,
                    repayment
                        .paid_at
                        .map(|d| d.to_string())
                        .unwrap_or_default(),
                );
            }
        }
        LoansAction::Pay { id, payment } => {
            let repayment = db.pay_repayment(id, &parse_payment(&payment)?)?;
            println!(
                "Paid repayment {} (#{}) amount {}",
                repayment.id, repayment.sequence_number, repayment.amount
            );
        }
        LoansAction::Revoke { id } => {
            db.revoke_repayment(id)?;
            println!("Revoked repayment {}", id);
        }
        LoansAction::Delete { id } => {
            db.delete_loan(id)?;
            println!("Deleted loan {} and its repayments", id);
        }
    }
    Ok(())
}
