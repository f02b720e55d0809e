//! Transaction category operations
//!
//! System categories are seeded during migration and looked up by key;
//! user categories are managed here. Deleting a category that ledger
//! records still point at is refused, mirroring a RESTRICT foreign key.

use rusqlite::{params, OptionalExtension};

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{SystemCategory, TransactionKind, TransactionType};

fn category_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TransactionType> {
    let kind: String = row.get(2)?;
    let created_at: String = row.get(4)?;
    Ok(TransactionType {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: kind.parse().unwrap_or(TransactionKind::Income),
        system_related: row.get(3)?,
        created_at: parse_datetime(&created_at),
    })
}

impl Database {
    /// Create a user-defined category. Unique on (name, kind).
    pub fn create_transaction_type(
        &self,
        name: &str,
        kind: TransactionKind,
    ) -> Result<TransactionType> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("name", "category name must not be empty"));
        }

        let conn = self.conn()?;
        let exists: Option<i64> = conn
            .query_row(
                "SELECT id FROM transaction_types WHERE name = ? AND kind = ?",
                params![name, kind.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(Error::validation(
                "name",
                format!("category '{}' ({}) already exists", name, kind),
            ));
        }

        conn.execute(
            "INSERT INTO transaction_types (name, kind, system_related) VALUES (?, ?, 0)",
            params![name, kind.as_str()],
        )?;
        self.get_transaction_type(conn.last_insert_rowid())
    }

    /// Get a category by ID
    pub fn get_transaction_type(&self, id: i64) -> Result<TransactionType> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, name, kind, system_related, created_at FROM transaction_types WHERE id = ?",
            params![id],
            category_from_row,
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("transaction type {}", id)))
    }

    /// List all categories, system ones first within each kind
    pub fn list_transaction_types(&self) -> Result<Vec<TransactionType>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, kind, system_related, created_at FROM transaction_types
             ORDER BY kind, system_related DESC, name",
        )?;
        let types = stmt
            .query_map([], category_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(types)
    }

    /// Delete a user-defined category. System categories and categories
    /// still referenced by ledger records cannot be deleted.
    pub fn delete_transaction_type(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;

        let category = self.get_transaction_type(id)?;
        if category.system_related {
            return Err(Error::Integrity(format!(
                "'{}' is a system category and cannot be deleted",
                category.name
            )));
        }

        let referenced: i64 = conn.query_row(
            "SELECT COUNT(*) FROM ledger_records WHERE transaction_type_id = ?",
            params![id],
            |row| row.get(0),
        )?;
        if referenced > 0 {
            return Err(Error::Integrity(format!(
                "category '{}' is still referenced by {} ledger record(s)",
                category.name, referenced
            )));
        }

        conn.execute("DELETE FROM transaction_types WHERE id = ?", params![id])?;
        Ok(())
    }

    /// Resolve a seeded system category to its row ID
    pub fn system_category_id(&self, category: SystemCategory) -> Result<i64> {
        let conn = self.conn()?;
        Self::system_category_id_on(&conn, category)
    }

    pub(crate) fn system_category_id_on(
        conn: &rusqlite::Connection,
        category: SystemCategory,
    ) -> Result<i64> {
        conn.query_row(
            "SELECT id FROM transaction_types WHERE name = ? AND kind = ? AND system_related = 1",
            params![category.name(), category.kind().as_str()],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("system category '{}'", category.name())))
    }
}
