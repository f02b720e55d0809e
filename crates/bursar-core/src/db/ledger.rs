//! Ledger record operations
//!
//! Every mutation runs inside a single BEGIN IMMEDIATE transaction: the
//! write lock is taken up front, the record write and its balance
//! projection commit together or not at all.

use rusqlite::{params, OptionalExtension, Transaction, TransactionBehavior};
use rust_decimal::Decimal;
use tracing::info;

use super::{parse_amount, parse_date, parse_datetime, Database};
use crate::balance::{self, BalanceChange, RecordState};
use crate::error::{Error, Result};
use crate::models::{
    LedgerAmendment, LedgerRecord, NewLedgerRecord, PaymentMethod, TransactionKind,
};

pub(crate) const RECORD_COLUMNS: &str = "id, amount, kind, transaction_type_id, date, \
     payment_method, bank_account_id, receipt_number, notes, created_by, created_at";

pub(crate) fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LedgerRecord> {
    let amount: String = row.get(1)?;
    let kind: String = row.get(2)?;
    let date: String = row.get(4)?;
    let method: String = row.get(5)?;
    let created_at: String = row.get(10)?;
    Ok(LedgerRecord {
        id: row.get(0)?,
        amount: parse_amount(&amount),
        kind: kind.parse().unwrap_or(TransactionKind::Income),
        transaction_type_id: row.get(3)?,
        date: parse_date(&date),
        payment_method: method.parse().unwrap_or(PaymentMethod::Cash),
        bank_account_id: row.get(6)?,
        receipt_number: row.get(7)?,
        notes: row.get(8)?,
        created_by: row.get(9)?,
        created_at: parse_datetime(&created_at),
    })
}

/// Enforce the payment-method constraints: cash records carry neither a
/// bank account nor a receipt number; bank records carry both; deposits
/// are income-only and bank expenses expense-only.
fn validate_state(
    amount: Decimal,
    kind: TransactionKind,
    payment_method: PaymentMethod,
    bank_account_id: Option<i64>,
    receipt_number: Option<&str>,
) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(Error::validation("amount", "amount must be positive"));
    }
    if !payment_method.allowed_for(kind) {
        return Err(Error::validation(
            "payment_method",
            format!("'{}' is not allowed for {} records", payment_method, kind),
        ));
    }
    if payment_method == PaymentMethod::Cash {
        if bank_account_id.is_some() {
            return Err(Error::validation(
                "bank_account",
                "a bank account cannot be set on a cash record",
            ));
        }
        if receipt_number.is_some() {
            return Err(Error::validation(
                "receipt_number",
                "a receipt number cannot be set on a cash record",
            ));
        }
    } else {
        if bank_account_id.is_none() {
            return Err(Error::validation(
                "bank_account",
                format!("a bank account is required for {} records", payment_method),
            ));
        }
        if receipt_number.map(str::trim).unwrap_or("").is_empty() {
            return Err(Error::validation(
                "receipt_number",
                format!("a receipt number is required for {} records", payment_method),
            ));
        }
    }
    Ok(())
}

/// Apply one projector delta to its account's cached balance.
pub(crate) fn apply_change(conn: &rusqlite::Connection, change: &BalanceChange) -> Result<()> {
    let balance: Option<String> = conn
        .query_row(
            "SELECT balance FROM bank_accounts WHERE id = ?",
            params![change.bank_account_id],
            |row| row.get(0),
        )
        .optional()?;
    let balance = balance
        .ok_or_else(|| Error::NotFound(format!("bank account {}", change.bank_account_id)))?;

    let updated = parse_amount(&balance) + change.delta;
    conn.execute(
        "UPDATE bank_accounts SET balance = ? WHERE id = ?",
        params![updated.to_string(), change.bank_account_id],
    )?;
    Ok(())
}

fn get_record_on(conn: &rusqlite::Connection, id: i64) -> Result<LedgerRecord> {
    conn.query_row(
        &format!("SELECT {} FROM ledger_records WHERE id = ?", RECORD_COLUMNS),
        params![id],
        record_from_row,
    )
    .optional()?
    .ok_or_else(|| Error::NotFound(format!("ledger record {}", id)))
}

fn record_state(record: &LedgerRecord) -> RecordState {
    RecordState {
        amount: record.amount,
        kind: record.kind,
        payment_method: record.payment_method,
        bank_account_id: record.bank_account_id,
    }
}

/// Insert a record and project its balance delta, inside the caller's
/// transaction. The kind is derived from the category.
pub(crate) fn append_record_tx(tx: &Transaction<'_>, new: &NewLedgerRecord) -> Result<LedgerRecord> {
    let category: Option<(String, bool)> = tx
        .query_row(
            "SELECT kind, system_related FROM transaction_types WHERE id = ?",
            params![new.transaction_type_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let (kind_str, _) = category
        .ok_or_else(|| Error::NotFound(format!("transaction type {}", new.transaction_type_id)))?;
    let kind: TransactionKind = kind_str
        .parse()
        .map_err(|_| Error::NotFound(format!("transaction type {}", new.transaction_type_id)))?;

    validate_state(
        new.amount,
        kind,
        new.payment_method,
        new.bank_account_id,
        new.receipt_number.as_deref(),
    )?;

    if let Some(account_id) = new.bank_account_id {
        let exists: Option<i64> = tx
            .query_row(
                "SELECT id FROM bank_accounts WHERE id = ?",
                params![account_id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(Error::NotFound(format!("bank account {}", account_id)));
        }
    }

    tx.execute(
        "INSERT INTO ledger_records
             (amount, kind, transaction_type_id, date, payment_method,
              bank_account_id, receipt_number, notes, created_by)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            new.amount.to_string(),
            kind.as_str(),
            new.transaction_type_id,
            new.date.to_string(),
            new.payment_method.as_str(),
            new.bank_account_id,
            new.receipt_number,
            new.notes,
            new.created_by,
        ],
    )?;
    let record = get_record_on(tx, tx.last_insert_rowid())?;

    if let Some(change) = balance::on_append(&record_state(&record)) {
        apply_change(tx, &change)?;
    }

    Ok(record)
}

/// Reverse a record's balance contribution and delete it, inside the
/// caller's transaction. Ownership checks are the caller's concern.
pub(crate) fn delete_record_tx(tx: &Transaction<'_>, id: i64) -> Result<()> {
    let record = get_record_on(tx, id)?;
    if let Some(change) = balance::on_retract(&record_state(&record)) {
        apply_change(tx, &change)?;
    }
    tx.execute("DELETE FROM ledger_records WHERE id = ?", params![id])?;
    Ok(())
}

/// Number of obligations, loans and members that own the record.
fn owner_count(conn: &rusqlite::Connection, id: i64) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT (SELECT COUNT(*) FROM subscriptions WHERE ledger_record_id = ?1)
              + (SELECT COUNT(*) FROM installments WHERE ledger_record_id = ?1)
              + (SELECT COUNT(*) FROM repayments WHERE ledger_record_id = ?1)
              + (SELECT COUNT(*) FROM loans WHERE ledger_record_id = ?1)
              + (SELECT COUNT(*) FROM members WHERE ledger_record_id = ?1)",
        params![id],
        |row| row.get(0),
    )?;
    Ok(count)
}

impl Database {
    /// Append a ledger record. Validates the payment-method constraints
    /// and projects the balance delta in the same transaction.
    pub fn append_record(&self, new: &NewLedgerRecord) -> Result<LedgerRecord> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let record = append_record_tx(&tx, new)?;
        tx.commit()?;

        info!(
            record_id = record.id,
            amount = %record.amount,
            kind = %record.kind,
            "ledger record appended"
        );
        Ok(record)
    }

    /// Amend a record's amount and/or settlement details. The old and new
    /// states are handed to the projector as one operation; when the bank
    /// account changes, the old account is unwound with the new amount.
    pub fn amend_record(&self, id: i64, amendment: &LedgerAmendment) -> Result<LedgerRecord> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let old = get_record_on(&tx, id)?;

        let amount = amendment.amount.unwrap_or(old.amount);
        let payment_method = amendment.payment_method.unwrap_or(old.payment_method);
        let bank_account_id = amendment.bank_account_id.unwrap_or(old.bank_account_id);
        let receipt_number = amendment
            .receipt_number
            .clone()
            .unwrap_or_else(|| old.receipt_number.clone());

        validate_state(
            amount,
            old.kind,
            payment_method,
            bank_account_id,
            receipt_number.as_deref(),
        )?;

        if let Some(account_id) = bank_account_id {
            let exists: Option<i64> = tx
                .query_row(
                    "SELECT id FROM bank_accounts WHERE id = ?",
                    params![account_id],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_none() {
                return Err(Error::NotFound(format!("bank account {}", account_id)));
            }
        }

        let new_state = RecordState {
            amount,
            kind: old.kind,
            payment_method,
            bank_account_id,
        };
        for change in balance::on_amend(&record_state(&old), &new_state) {
            apply_change(&tx, &change)?;
        }

        tx.execute(
            "UPDATE ledger_records
             SET amount = ?, payment_method = ?, bank_account_id = ?, receipt_number = ?
             WHERE id = ?",
            params![
                amount.to_string(),
                payment_method.as_str(),
                bank_account_id,
                receipt_number,
                id
            ],
        )?;

        let record = get_record_on(&tx, id)?;
        tx.commit()?;

        info!(record_id = id, amount = %record.amount, "ledger record amended");
        Ok(record)
    }

    /// Retract (delete) a record, reversing its balance contribution.
    /// Refused while an obligation, loan or member still owns the record;
    /// owned records only disappear through their owner's lifecycle.
    pub fn retract_record(&self, id: i64) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        get_record_on(&tx, id)?;
        let owners = owner_count(&tx, id)?;
        if owners > 0 {
            return Err(Error::Integrity(format!(
                "ledger record {} is still owned by an obligation, loan or member",
                id
            )));
        }

        delete_record_tx(&tx, id)?;
        tx.commit()?;

        info!(record_id = id, "ledger record retracted");
        Ok(())
    }

    /// Get a record by ID
    pub fn get_record(&self, id: i64) -> Result<LedgerRecord> {
        let conn = self.conn()?;
        get_record_on(&conn, id)
    }

    /// List records, newest first, optionally restricted to one month
    /// (`YYYY-MM`).
    pub fn list_records(&self, month: Option<&str>) -> Result<Vec<LedgerRecord>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM ledger_records {} ORDER BY date DESC, created_at DESC",
            RECORD_COLUMNS,
            if month.is_some() {
                "WHERE substr(date, 1, 7) = ?"
            } else {
                ""
            }
        );
        let mut stmt = conn.prepare(&sql)?;
        let records = match month {
            Some(m) => stmt
                .query_map(params![m], record_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?,
            None => stmt
                .query_map([], record_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?,
        };
        Ok(records)
    }
}
