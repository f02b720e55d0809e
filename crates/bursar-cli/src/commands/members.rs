//! Member command implementations

use std::path::Path;

use anyhow::Result;
use bursar_core::models::{NewMember, ObligationPayment, PaymentPlan};
use rust_decimal::Decimal;

use super::{open_db, parse_amount, parse_date, parse_method};
use crate::cli::MembersAction;

pub fn cmd_members(db_path: &Path, action: Option<MembersAction>, no_encrypt: bool) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;

    match action.unwrap_or(MembersAction::List { json: false }) {
        MembersAction::List { json } => {
            let members = db.list_members()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&members)?);
                return Ok(());
            }
            println!(
                "{:<6} {:<10} {:<28} {:<14} {:<12} {}",
                "ID", "Number", "Name", "Rank", "Since", "Active"
            );
            for member in members {
                println!(
                    "{:<6} {:<10} {:<28} {:<14} {:<12} {}",
                    member.id,
                    member.membership_number,
                    member.name,
                    member.rank,
                    member.subscription_date,
                    if member.is_active { "yes" } else { "no" }
                );
            }
        }
        MembersAction::Add {
            name,
            rank,
            number,
            subscription_date,
            actor,
        } => {
            let member = db.create_member(&NewMember {
                name,
                rank,
                membership_number: number,
                subscription_date: parse_date(&subscription_date)?,
                created_by: actor,
            })?;
            println!("Created member '{}' (id {})", member.name, member.id);
        }
        MembersAction::Dues { id, as_of, json } => {
            let as_of = match as_of {
                Some(s) => parse_date(&s)?,
                None => chrono::Local::now().date_naive(),
            };
            let dues = db.member_dues(id, as_of)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&dues)?);
                return Ok(());
            }
            println!("Dues as of {}:", as_of);
            println!(
                "  Subscriptions: {} owed of {} due months ({} recorded)",
                dues.unpaid_subscriptions, dues.due_months, dues.paid_subscriptions
            );
            println!("  Unpaid installments: {}", dues.unpaid_installments);
            println!("  Unpaid repayments: {}", dues.unpaid_repayments);
            println!("  Expected monthly fee: {}", dues.expected_monthly_fee);
        }
        MembersAction::Plan {
            id,
            fee,
            prepaid,
            count,
            start_date,
            date,
            method,
            bank_account,
            receipt,
            actor,
        } => {
            let prepaid = parse_amount(&prepaid)?;
            let prepaid_payment = if prepaid > Decimal::ZERO {
                let paid_at = date
                    .as_deref()
                    .map(parse_date)
                    .transpose()?
                    .unwrap_or_else(|| chrono::Local::now().date_naive());
                Some(ObligationPayment {
                    amount: prepaid,
                    paid_at,
                    payment_method: parse_method(&method)?,
                    bank_account_id: bank_account,
                    receipt_number: receipt,
                    notes: None,
                    actor: actor.clone(),
                })
            } else {
                None
            };

            let installments = db.create_payment_plan(&PaymentPlan {
                member_id: id,
                subscription_fee: parse_amount(&fee)?,
                prepaid,
                installments_count: count,
                start_date: start_date.as_deref().map(parse_date).transpose()?,
                prepaid_payment,
                actor,
            })?;

            println!(
                "Created payment plan for member {}: {} installment(s)",
                id,
                installments.len()
            );
            for installment in installments {
                println!(
                    "  #{} due {} amount {}",
                    installment.sequence_number, installment.due_date, installment.amount
                );
            }
        }
        MembersAction::SwitchActive { id } => {
            let member = db.get_member(id)?;
            db.set_member_active(id, !member.is_active)?;
            println!(
                "Member {} is now {}",
                id,
                if member.is_active { "retired" } else { "active" }
            );
        }
        MembersAction::Purge { id } => {
            db.purge_member_financials(id)?;
            println!("Purged financial history of member {}", id);
        }
    }
    Ok(())
}
