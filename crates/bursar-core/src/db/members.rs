//! Member collaborator data and rank fees
//!
//! The engine consumes members read-only apart from the prepaid-record
//! link set by payment-plan creation. Rank fees back the dues
//! calculator's expected monthly amount.

use rusqlite::{params, OptionalExtension, TransactionBehavior};
use rust_decimal::Decimal;
use tracing::info;

use super::ledger::delete_record_tx;
use super::{parse_amount, parse_date, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Member, NewMember, RankFee};

/// Fee assigned to ranks created by `ensure_default_rank_fees`
const DEFAULT_RANK_FEE: &str = "100.00";

fn member_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Member> {
    let subscription_date: String = row.get(4)?;
    let created_at: String = row.get(8)?;
    Ok(Member {
        id: row.get(0)?,
        name: row.get(1)?,
        rank: row.get(2)?,
        membership_number: row.get(3)?,
        subscription_date: parse_date(&subscription_date),
        is_active: row.get(5)?,
        ledger_record_id: row.get(6)?,
        created_by: row.get(7)?,
        created_at: parse_datetime(&created_at),
    })
}

const MEMBER_COLUMNS: &str = "id, name, rank, membership_number, subscription_date, \
     is_active, ledger_record_id, created_by, created_at";

impl Database {
    /// Create a member
    pub fn create_member(&self, new: &NewMember) -> Result<Member> {
        if new.name.trim().is_empty() {
            return Err(Error::validation("name", "member name must not be empty"));
        }
        if new.membership_number.trim().is_empty() {
            return Err(Error::validation(
                "membership_number",
                "membership number must not be empty",
            ));
        }

        let conn = self.conn()?;
        let exists: Option<i64> = conn
            .query_row(
                "SELECT id FROM members WHERE membership_number = ?",
                params![new.membership_number],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(Error::validation(
                "membership_number",
                format!(
                    "membership number '{}' is already in use",
                    new.membership_number
                ),
            ));
        }

        conn.execute(
            "INSERT INTO members (name, rank, membership_number, subscription_date, created_by)
             VALUES (?, ?, ?, ?, ?)",
            params![
                new.name.trim(),
                new.rank,
                new.membership_number.trim(),
                new.subscription_date.to_string(),
                new.created_by,
            ],
        )?;
        self.get_member(conn.last_insert_rowid())
    }

    /// Get a member by ID
    pub fn get_member(&self, id: i64) -> Result<Member> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM members WHERE id = ?", MEMBER_COLUMNS),
            params![id],
            member_from_row,
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("member {}", id)))
    }

    /// List all members ordered by membership number
    pub fn list_members(&self) -> Result<Vec<Member>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM members ORDER BY membership_number",
            MEMBER_COLUMNS
        ))?;
        let members = stmt
            .query_map([], member_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(members)
    }

    /// Flip a member between active and retired
    pub fn set_member_active(&self, id: i64, is_active: bool) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE members SET is_active = ? WHERE id = ?",
            params![is_active, id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("member {}", id)));
        }
        Ok(())
    }

    /// Set (or update) the expected monthly fee for a rank
    pub fn set_rank_fee(&self, rank: &str, monthly_fee: Decimal) -> Result<RankFee> {
        if monthly_fee < Decimal::ZERO {
            return Err(Error::validation(
                "monthly_fee",
                "monthly fee must not be negative",
            ));
        }

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO rank_fees (rank, monthly_fee) VALUES (?1, ?2)
             ON CONFLICT(rank) DO UPDATE SET monthly_fee = ?2",
            params![rank, monthly_fee.to_string()],
        )?;
        let row = conn.query_row(
            "SELECT id, rank, monthly_fee FROM rank_fees WHERE rank = ?",
            params![rank],
            |row| {
                let fee: String = row.get(2)?;
                Ok(RankFee {
                    id: row.get(0)?,
                    rank: row.get(1)?,
                    monthly_fee: parse_amount(&fee),
                })
            },
        )?;
        Ok(row)
    }

    /// Expected monthly fee for a rank; 0 when no row exists, never an error.
    pub fn rank_fee(&self, rank: &str) -> Result<Decimal> {
        let conn = self.conn()?;
        let fee: Option<String> = conn
            .query_row(
                "SELECT monthly_fee FROM rank_fees WHERE rank = ?",
                params![rank],
                |row| row.get(0),
            )
            .optional()?;
        Ok(fee.map(|s| parse_amount(&s)).unwrap_or(Decimal::ZERO))
    }

    /// List all rank fees
    pub fn list_rank_fees(&self) -> Result<Vec<RankFee>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, rank, monthly_fee FROM rank_fees ORDER BY rank")?;
        let fees = stmt
            .query_map([], |row| {
                let fee: String = row.get(2)?;
                Ok(RankFee {
                    id: row.get(0)?,
                    rank: row.get(1)?,
                    monthly_fee: parse_amount(&fee),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(fees)
    }

    /// Create missing rank-fee rows at the default fee. Existing rows are
    /// left untouched. Returns how many rows were created.
    pub fn ensure_default_rank_fees<'a, I>(&self, ranks: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let conn = self.conn()?;
        let mut created = 0;
        for rank in ranks {
            created += conn.execute(
                "INSERT OR IGNORE INTO rank_fees (rank, monthly_fee) VALUES (?, ?)",
                params![rank, DEFAULT_RANK_FEE],
            )?;
        }
        if created > 0 {
            info!(created, "seeded missing rank fees");
        }
        Ok(created)
    }

    /// Delete every financial trace of a member: installments,
    /// subscriptions, loans with their repayments, and the prepaid record,
    /// all cascading to their ledger records with balance reversal. The
    /// member row itself survives. One transaction.
    pub fn purge_member_financials(&self, member_id: i64) -> Result<()> {
        self.get_member(member_id)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // Obligations first, each cascading to its ledger record
        let record_ids: Vec<i64> = {
            let mut stmt = tx.prepare(
                "SELECT ledger_record_id FROM installments
                 WHERE member_id = ? AND ledger_record_id IS NOT NULL",
            )?;
            let ids = stmt
                .query_map(params![member_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<i64>, _>>()?;
            ids
        };
        tx.execute(
            "DELETE FROM installments WHERE member_id = ?",
            params![member_id],
        )?;
        for record_id in record_ids {
            delete_record_tx(&tx, record_id)?;
        }

        let record_ids: Vec<i64> = {
            let mut stmt = tx.prepare(
                "SELECT ledger_record_id FROM subscriptions
                 WHERE member_id = ? AND ledger_record_id IS NOT NULL",
            )?;
            let ids = stmt
                .query_map(params![member_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<i64>, _>>()?;
            ids
        };
        tx.execute(
            "DELETE FROM subscriptions WHERE member_id = ?",
            params![member_id],
        )?;
        for record_id in record_ids {
            delete_record_tx(&tx, record_id)?;
        }

        let loan_ids: Vec<i64> = {
            let mut stmt = tx.prepare("SELECT id FROM loans WHERE member_id = ?")?;
            let ids = stmt
                .query_map(params![member_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<i64>, _>>()?;
            ids
        };
        for loan_id in loan_ids {
            super::loans::delete_loan_tx(&tx, loan_id)?;
        }

        // Finally the prepaid joining-fee record
        let prepaid: Option<i64> = tx.query_row(
            "SELECT ledger_record_id FROM members WHERE id = ?",
            params![member_id],
            |row| row.get(0),
        )?;
        if let Some(record_id) = prepaid {
            tx.execute(
                "UPDATE members SET ledger_record_id = NULL WHERE id = ?",
                params![member_id],
            )?;
            delete_record_tx(&tx, record_id)?;
        }

        tx.commit()?;

        info!(member_id, "member financials purged");
        Ok(())
    }
}
