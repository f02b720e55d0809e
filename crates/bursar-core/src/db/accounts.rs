//! Bank account operations

use rusqlite::{params, OptionalExtension};
use rust_decimal::Decimal;

use super::{parse_amount, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::BankAccount;

fn account_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BankAccount> {
    let balance: String = row.get(2)?;
    let created_at: String = row.get(3)?;
    Ok(BankAccount {
        id: row.get(0)?,
        name: row.get(1)?,
        balance: parse_amount(&balance),
        created_at: parse_datetime(&created_at),
    })
}

impl Database {
    /// Create a bank account with a zero balance
    pub fn create_bank_account(&self, name: &str) -> Result<BankAccount> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("name", "account name must not be empty"));
        }

        let conn = self.conn()?;
        let exists: Option<i64> = conn
            .query_row(
                "SELECT id FROM bank_accounts WHERE name = ?",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(Error::validation(
                "name",
                format!("a bank account named '{}' already exists", name),
            ));
        }

        conn.execute(
            "INSERT INTO bank_accounts (name) VALUES (?)",
            params![name],
        )?;
        self.get_bank_account(conn.last_insert_rowid())
    }

    /// Get an account by ID
    pub fn get_bank_account(&self, id: i64) -> Result<BankAccount> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, name, balance, created_at FROM bank_accounts WHERE id = ?",
            params![id],
            account_from_row,
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("bank account {}", id)))
    }

    /// List all accounts
    pub fn list_bank_accounts(&self) -> Result<Vec<BankAccount>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT id, name, balance, created_at FROM bank_accounts ORDER BY name")?;
        let accounts = stmt
            .query_map([], account_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    /// Read the projected balance. This is the cached value maintained by
    /// the balance projector; it never re-scans the ledger.
    pub fn bank_balance(&self, id: i64) -> Result<Decimal> {
        let conn = self.conn()?;
        let balance: Option<String> = conn
            .query_row(
                "SELECT balance FROM bank_accounts WHERE id = ?",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        balance
            .map(|s| parse_amount(&s))
            .ok_or_else(|| Error::NotFound(format!("bank account {}", id)))
    }

    /// Delete an account. Fails while any ledger record still references it.
    pub fn delete_bank_account(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let referenced: i64 = conn.query_row(
            "SELECT COUNT(*) FROM ledger_records WHERE bank_account_id = ?",
            params![id],
            |row| row.get(0),
        )?;
        if referenced > 0 {
            return Err(Error::Integrity(format!(
                "bank account {} is still referenced by {} ledger record(s)",
                id, referenced
            )));
        }

        let deleted = conn.execute("DELETE FROM bank_accounts WHERE id = ?", params![id])?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("bank account {}", id)));
        }
        Ok(())
    }
}
