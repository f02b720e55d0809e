//! Transaction category command implementations

use std::path::Path;

use anyhow::Result;
use bursar_core::models::TransactionKind;

use super::open_db;
use crate::cli::CategoriesAction;

pub fn cmd_categories(
    db_path: &Path,
    action: Option<CategoriesAction>,
    no_encrypt: bool,
) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;

    match action.unwrap_or(CategoriesAction::List) {
        CategoriesAction::List => {
            println!("{:<6} {:<24} {:<8} {}", "ID", "Name", "Kind", "System");
            for category in db.list_transaction_types()? {
                println!(
                    "{:<6} {:<24} {:<8} {}",
                    category.id,
                    category.name,
                    category.kind,
                    if category.system_related { "yes" } else { "" }
                );
            }
        }
        CategoriesAction::Add { name, kind } => {
            let kind: TransactionKind = kind.parse().map_err(anyhow::Error::msg)?;
            let category = db.create_transaction_type(&name, kind)?;
            println!(
                "Created category '{}' ({}) with id {}",
                category.name, category.kind, category.id
            );
        }
        CategoriesAction::Delete { id } => {
            db.delete_transaction_type(id)?;
            println!("Deleted category {}", id);
        }
    }
    Ok(())
}
