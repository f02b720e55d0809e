//! Bank account command implementations

use std::path::Path;

use anyhow::Result;

use super::open_db;
use crate::cli::AccountsAction;

pub fn cmd_accounts(db_path: &Path, action: Option<AccountsAction>, no_encrypt: bool) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;

    match action.unwrap_or(AccountsAction::List) {
        AccountsAction::List => {
            let accounts = db.list_bank_accounts()?;
            if accounts.is_empty() {
                println!("No bank accounts yet. Create one: bursar accounts add \"Treasury\"");
                return Ok(());
            }
            println!("{:<6} {:<30} {:>14}", "ID", "Name", "Balance");
            for account in accounts {
                println!(
                    "{:<6} {:<30} {:>14}",
                    account.id, account.name, account.balance
                );
            }
        }
        AccountsAction::Add { name } => {
            let account = db.create_bank_account(&name)?;
            println!("Created bank account '{}' (id {})", account.name, account.id);
        }
        AccountsAction::Balance { id } => {
            println!("{}", db.bank_balance(id)?);
        }
        AccountsAction::Delete { id } => {
            db.delete_bank_account(id)?;
            println!("Deleted bank account {}", id);
        }
    }
    Ok(())
}
