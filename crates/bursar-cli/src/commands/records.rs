//! Ledger record command implementations

use std::path::Path;

use anyhow::Result;
use bursar_core::models::{LedgerAmendment, NewLedgerRecord};

use super::{open_db, parse_amount, parse_date, parse_method};
use crate::cli::RecordsAction;

pub fn cmd_records(db_path: &Path, action: Option<RecordsAction>, no_encrypt: bool) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;

    match action.unwrap_or(RecordsAction::List {
        month: None,
        json: false,
    }) {
        RecordsAction::List { month, json } => {
            let records = db.list_records(month.as_deref())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
                return Ok(());
            }
            println!(
                "{:<6} {:<12} {:<8} {:>12} {:<14} {:<8} {}",
                "ID", "Date", "Kind", "Amount", "Method", "Account", "Receipt"
            );
            for record in records {
                println!(
                    "{:<6} {:<12} {:<8} {:>12} {:<14} {:<8} {}",
                    record.id,
                    record.date,
                    record.kind,
                    record.amount,
                    record.payment_method,
                    record
                        .bank_account_id
                        .map(|id| id.to_string())
                        .unwrap_or_default(),
                    record.receipt_number.unwrap_or_default(),
                );
            }
        }
        RecordsAction::Add {
            amount,
            category,
            date,
            method,
            bank_account,
            receipt,
            notes,
            actor,
        } => {
            let record = db.append_record(&NewLedgerRecord {
                amount: parse_amount(&amount)?,
                transaction_type_id: category,
                date: parse_date(&date)?,
                payment_method: parse_method(&method)?,
                bank_account_id: bank_account,
                receipt_number: receipt,
                notes,
                created_by: actor,
            })?;
            println!(
                "Appended {} record {} of {} on {}",
                record.kind, record.id, record.amount, record.date
            );
        }
        RecordsAction::Amend {
            id,
            amount,
            method,
            bank_account,
            clear_bank_account,
            receipt,
            clear_receipt,
        } => {
            let amendment = LedgerAmendment {
                amount: amount.as_deref().map(parse_amount).transpose()?,
                payment_method: method.as_deref().map(parse_method).transpose()?,
                bank_account_id: if clear_bank_account {
                    Some(None)
                } else {
                    bank_account.map(Some)
                },
                receipt_number: if clear_receipt {
                    Some(None)
                } else {
                    receipt.map(Some)
                },
            };
            let record = db.amend_record(id, &amendment)?;
            println!("Amended record {}: amount {}", record.id, record.amount);
        }
        RecordsAction::Retract { id } => {
            db.retract_record(id)?;
            println!("Retracted record {}", id);
        }
    }
    Ok(())
}
