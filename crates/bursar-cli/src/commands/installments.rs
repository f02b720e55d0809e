//! Installment command implementations

use std::path::Path;

use anyhow::Result;

use super::{open_db, parse_payment};
use crate::cli::InstallmentsAction;

pub fn cmd_installments(db_path: &Path, action: InstallmentsAction, no_encrypt: bool) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;

    match action {
        InstallmentsAction::List { member } => {
            println!(
                "{:<6} {:<4} {:<12} {:>10} {:<8} {}",
                "ID", "#", "Due", "Amount", "Status", "Paid at"
            );
            for installment in db.list_member_installments(member)? {
                println!(
                    "{:<6} {:<4} {:<12} {:>10} {:<8} {}",
                    installment.id,
                    installment.sequence_number,
                    installment.due_date,
                    installment.amount,
                    installment.status,
                    installment
                        .paid_at
                        .map(|d| d.to_string())
                        .unwrap_or_default(),
                );
            }
        }
        InstallmentsAction::Pay { id, payment } => {
            let installment = db.pay_installment(id, &parse_payment(&payment)?)?;
            println!(
                "Paid installment {} (#{}) amount {}",
                installment.id, installment.sequence_number, installment.amount
            );
        }
        InstallmentsAction::Revoke { id } => {
            db.revoke_installment(id)?;
            println!("Revoked installment {}", id);
        }
        InstallmentsAction::Delete { id } => {
            db.delete_installment(id)?;
            println!("Deleted installment {}", id);
        }
    }
    Ok(())
}
