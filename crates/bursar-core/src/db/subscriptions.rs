//! Monthly membership subscriptions
//!
//! Subscription rows are materialized lazily: paying a month creates the
//! row already settled. The month is normalized to its first day and at
//! most one row exists per member-month. Revoking flips the row to
//! unpaid and deletes its ledger record; the month stays claimed until
//! the row is deleted.

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use tracing::info;

use super::ledger::{append_record_tx, delete_record_tx};
use super::{parse_amount, parse_date, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{
    NewLedgerRecord, ObligationPayment, ObligationStatus, Subscription, SystemCategory,
};
use crate::schedule::month_start;

const SUBSCRIPTION_COLUMNS: &str =
    "id, member_id, amount, date, status, paid_at, notes, ledger_record_id, created_at";

fn subscription_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Subscription> {
    let amount: String = row.get(2)?;
    let date: String = row.get(3)?;
    let status: String = row.get(4)?;
    let paid_at: Option<String> = row.get(5)?;
    let created_at: String = row.get(8)?;
    Ok(Subscription {
        id: row.get(0)?,
        member_id: row.get(1)?,
        amount: parse_amount(&amount),
        date: parse_date(&date),
        status: status.parse().unwrap_or(ObligationStatus::Unpaid),
        paid_at: paid_at.map(|s| parse_date(&s)),
        notes: row.get(6)?,
        ledger_record_id: row.get(7)?,
        created_at: parse_datetime(&created_at),
    })
}

impl Database {
    /// Pay a member's subscription for the month containing `month`.
    /// Creates the row already paid, with its ledger record, in one
    /// transaction. A second payment for the same month is rejected.
    pub fn pay_subscription(
        &self,
        member_id: i64,
        month: NaiveDate,
        payment: &ObligationPayment,
    ) -> Result<Subscription> {
        self.get_member(member_id)?;
        let month = month_start(month);

        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let taken: Option<i64> = tx
            .query_row(
                "SELECT id FROM subscriptions WHERE member_id = ? AND date = ?",
                params![member_id, month.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        if taken.is_some() {
            return Err(Error::validation(
                "date",
                "the subscription for this month is already recorded",
            ));
        }

        let category_id = Self::system_category_id_on(&tx, SystemCategory::SubscriptionFee)?;
        let record = append_record_tx(
            &tx,
            &NewLedgerRecord {
                amount: payment.amount,
                transaction_type_id: category_id,
                date: payment.paid_at,
                payment_method: payment.payment_method,
                bank_account_id: payment.bank_account_id,
                receipt_number: payment.receipt_number.clone(),
                notes: payment.notes.clone(),
                created_by: payment.actor.clone(),
            },
        )?;

        tx.execute(
            "INSERT INTO subscriptions
                 (member_id, amount, date, status, paid_at, notes, ledger_record_id)
             VALUES (?, ?, ?, 'paid', ?, ?, ?)",
            params![
                member_id,
                payment.amount.to_string(),
                month.to_string(),
                payment.paid_at.to_string(),
                payment.notes,
                record.id,
            ],
        )?;
        let subscription = get_subscription_on(&tx, tx.last_insert_rowid())?;
        tx.commit()?;

        info!(member_id, month = %month, "subscription paid");
        Ok(subscription)
    }

    /// Revoke a paid subscription: back to unpaid, ledger record deleted
    /// with its balance reversed. The month remains claimed by the row.
    pub fn revoke_subscription(&self, id: i64) -> Result<Subscription> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let subscription = get_subscription_on(&tx, id)?;
        let changed = tx.execute(
            "UPDATE subscriptions
             SET status = 'unpaid', paid_at = NULL, notes = NULL, ledger_record_id = NULL
             WHERE id = ? AND status = 'paid'",
            params![id],
        )?;
        if changed == 0 {
            return Err(Error::InvalidTransition(format!(
                "subscription {} is not paid",
                id
            )));
        }
        if let Some(record_id) = subscription.ledger_record_id {
            delete_record_tx(&tx, record_id)?;
        }

        let subscription = get_subscription_on(&tx, id)?;
        tx.commit()?;

        info!(subscription_id = id, "subscription revoked");
        Ok(subscription)
    }

    /// Delete a subscription row, cascading to its ledger record. Frees
    /// the month for a new payment.
    pub fn delete_subscription(&self, id: i64) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let subscription = get_subscription_on(&tx, id)?;
        tx.execute(
            "UPDATE subscriptions SET ledger_record_id = NULL WHERE id = ?",
            params![id],
        )?;
        tx.execute("DELETE FROM subscriptions WHERE id = ?", params![id])?;
        if let Some(record_id) = subscription.ledger_record_id {
            delete_record_tx(&tx, record_id)?;
        }
        tx.commit()?;

        info!(subscription_id = id, "subscription deleted");
        Ok(())
    }

    /// Get a subscription by ID
    pub fn get_subscription(&self, id: i64) -> Result<Subscription> {
        let conn = self.conn()?;
        get_subscription_on(&conn, id)
    }

    /// List a member's subscriptions, newest month first
    pub fn list_member_subscriptions(&self, member_id: i64) -> Result<Vec<Subscription>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM subscriptions WHERE member_id = ? ORDER BY date DESC",
            SUBSCRIPTION_COLUMNS
        ))?;
        let subscriptions = stmt
            .query_map(params![member_id], subscription_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(subscriptions)
    }
}

fn get_subscription_on(conn: &rusqlite::Connection, id: i64) -> Result<Subscription> {
    conn.query_row(
        &format!(
            "SELECT {} FROM subscriptions WHERE id = ?",
            SUBSCRIPTION_COLUMNS
        ),
        params![id],
        subscription_from_row,
    )
    .optional()?
    .ok_or_else(|| Error::NotFound(format!("subscription {}", id)))
}
