//! Loans, repayment schedules and cascade deletion
//!
//! Issuing a loan is itself a ledger event: the disbursement record is
//! created with the loan and required for its lifetime. Deleting a loan
//! unwinds everything it owns (repayments, their ledger records, the
//! disbursement) in one transaction.

use rusqlite::{params, OptionalExtension, Transaction, TransactionBehavior};
use rust_decimal::Decimal;
use tracing::info;

use super::ledger::{append_record_tx, delete_record_tx};
use super::{parse_amount, parse_date, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{
    Loan, NewLedgerRecord, NewLoan, ObligationPayment, ObligationStatus, Repayment, SystemCategory,
};
use crate::schedule::build_schedule;

const LOAN_COLUMNS: &str =
    "id, member_id, amount, issued_date, notes, ledger_record_id, created_by, created_at";

const REPAYMENT_COLUMNS: &str = "id, loan_id, sequence_number, amount, due_date, \
     status, paid_at, notes, ledger_record_id, created_at";

fn loan_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Loan> {
    let amount: String = row.get(2)?;
    let issued_date: String = row.get(3)?;
    let created_at: String = row.get(7)?;
    Ok(Loan {
        id: row.get(0)?,
        member_id: row.get(1)?,
        amount: parse_amount(&amount),
        issued_date: parse_date(&issued_date),
        notes: row.get(4)?,
        ledger_record_id: row.get(5)?,
        created_by: row.get(6)?,
        created_at: parse_datetime(&created_at),
    })
}

fn repayment_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Repayment> {
    let amount: String = row.get(3)?;
    let due_date: String = row.get(4)?;
    let status: String = row.get(5)?;
    let paid_at: Option<String> = row.get(6)?;
    let created_at: String = row.get(9)?;
    Ok(Repayment {
        id: row.get(0)?,
        loan_id: row.get(1)?,
        sequence_number: row.get(2)?,
        amount: parse_amount(&amount),
        due_date: parse_date(&due_date),
        status: status.parse().unwrap_or(ObligationStatus::Unpaid),
        paid_at: paid_at.map(|s| parse_date(&s)),
        notes: row.get(7)?,
        ledger_record_id: row.get(8)?,
        created_at: parse_datetime(&created_at),
    })
}

/// Delete a loan with everything it owns, inside the caller's
/// transaction: repayment ledger records, repayment rows, the
/// disbursement record, the loan row.
pub(crate) fn delete_loan_tx(tx: &Transaction<'_>, loan_id: i64) -> Result<()> {
    let loan = get_loan_on(tx, loan_id)?;

    let record_ids: Vec<i64> = {
        let mut stmt = tx.prepare(
            "SELECT ledger_record_id FROM repayments
             WHERE loan_id = ? AND ledger_record_id IS NOT NULL",
        )?;
        let ids = stmt
            .query_map(params![loan_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;
        ids
    };
    tx.execute("DELETE FROM repayments WHERE loan_id = ?", params![loan_id])?;
    for record_id in record_ids {
        delete_record_tx(tx, record_id)?;
    }

    tx.execute("DELETE FROM loans WHERE id = ?", params![loan_id])?;
    delete_record_tx(tx, loan.ledger_record_id)?;
    Ok(())
}

impl Database {
    /// Issue a loan: disbursement record (expense), loan row and its
    /// repayment schedule, all in one transaction.
    pub fn create_loan(&self, new: &NewLoan) -> Result<(Loan, Vec<Repayment>)> {
        self.get_member(new.member_id)?;

        if new.amount <= Decimal::ZERO {
            return Err(Error::validation("amount", "principal must be positive"));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let schedule = build_schedule(new.amount, new.repayments_count, new.start_date)?;

        let category_id = Self::system_category_id_on(&tx, SystemCategory::LoanDisbursement)?;
        let record = append_record_tx(
            &tx,
            &NewLedgerRecord {
                amount: new.amount,
                transaction_type_id: category_id,
                date: new.issued_date,
                payment_method: new.payment_method,
                bank_account_id: new.bank_account_id,
                receipt_number: new.receipt_number.clone(),
                notes: new.notes.clone(),
                created_by: new.actor.clone(),
            },
        )?;

        tx.execute(
            "INSERT INTO loans (member_id, amount, issued_date, notes, ledger_record_id, created_by)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                new.member_id,
                new.amount.to_string(),
                new.issued_date.to_string(),
                new.notes,
                record.id,
                new.actor,
            ],
        )?;
        let loan = get_loan_on(&tx, tx.last_insert_rowid())?;

        let mut repayments = Vec::new();
        for row in schedule {
            tx.execute(
                "INSERT INTO repayments (loan_id, sequence_number, amount, due_date)
                 VALUES (?, ?, ?, ?)",
                params![
                    loan.id,
                    row.sequence_number,
                    row.amount.to_string(),
                    row.due_date.to_string(),
                ],
            )?;
            repayments.push(get_repayment_on(&tx, tx.last_insert_rowid())?);
        }

        tx.commit()?;

        info!(
            loan_id = loan.id,
            member_id = new.member_id,
            principal = %new.amount,
            repayments = repayments.len(),
            "loan issued"
        );
        Ok((loan, repayments))
    }

    /// Pay a repayment: unpaid to paid only; the payment amount overwrites
    /// the scheduled amount. A concurrent second payment loses on the
    /// status-qualified update.
    pub fn pay_repayment(&self, id: i64, payment: &ObligationPayment) -> Result<Repayment> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let claimed = tx.execute(
            "UPDATE repayments SET status = 'paid' WHERE id = ? AND status = 'unpaid'",
            params![id],
        )?;
        if claimed == 0 {
            get_repayment_on(&tx, id)?;
            return Err(Error::InvalidTransition(format!(
                "repayment {} is already paid",
                id
            )));
        }

        let category_id = Self::system_category_id_on(&tx, SystemCategory::LoanRepayment)?;
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
            "UPDATE repayments
             SET amount = ?, paid_at = ?, notes = ?, ledger_record_id = ?
             WHERE id = ?",
            params![
                payment.amount.to_string(),
                payment.paid_at.to_string(),
                payment.notes,
                record.id,
                id
            ],
        )?;

        let repayment = get_repayment_on(&tx, id)?;
        tx.commit()?;

        info!(repayment_id = id, amount = %payment.amount, "repayment paid");
        Ok(repayment)
    }

    /// Revoke a paid repayment: back to unpaid, ledger record deleted with
    /// its balance reversed. The amount stays as last recorded.
    pub fn revoke_repayment(&self, id: i64) -> Result<Repayment> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let repayment = get_repayment_on(&tx, id)?;
        let changed = tx.execute(
            "UPDATE repayments
             SET status = 'unpaid', paid_at = NULL, notes = NULL, ledger_record_id = NULL
             WHERE id = ? AND status = 'paid'",
            params![id],
        )?;
        if changed == 0 {
            return Err(Error::InvalidTransition(format!(
                "repayment {} is not paid",
                id
            )));
        }
        if let Some(record_id) = repayment.ledger_record_id {
            delete_record_tx(&tx, record_id)?;
        }

        let repayment = get_repayment_on(&tx, id)?;
        tx.commit()?;

        info!(repayment_id = id, "repayment revoked");
        Ok(repayment)
    }

    /// Delete a repayment row, cascading to its ledger record
    pub fn delete_repayment(&self, id: i64) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let repayment = get_repayment_on(&tx, id)?;
        tx.execute(
            "UPDATE repayments SET ledger_record_id = NULL WHERE id = ?",
            params![id],
        )?;
        tx.execute("DELETE FROM repayments WHERE id = ?", params![id])?;
        if let Some(record_id) = repayment.ledger_record_id {
            delete_record_tx(&tx, record_id)?;
        }
        tx.commit()?;

        info!(repayment_id = id, "repayment deleted");
        Ok(())
    }

    /// Delete a loan, cascading to its repayments and ledger records
    pub fn delete_loan(&self, id: i64) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        delete_loan_tx(&tx, id)?;
        tx.commit()?;

        info!(loan_id = id, "loan deleted");
        Ok(())
    }

    /// Get a loan by ID
    pub fn get_loan(&self, id: i64) -> Result<Loan> {
        let conn = self.conn()?;
        get_loan_on(&conn, id)
    }

    /// List a member's loans, newest first
    pub fn list_member_loans(&self, member_id: i64) -> Result<Vec<Loan>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM loans WHERE member_id = ? ORDER BY issued_date DESC, id DESC",
            LOAN_COLUMNS
        ))?;
        let loans = stmt
            .query_map(params![member_id], loan_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(loans)
    }

    /// Get a repayment by ID
    pub fn get_repayment(&self, id: i64) -> Result<Repayment> {
        let conn = self.conn()?;
        get_repayment_on(&conn, id)
    }

    /// List a loan's repayments in schedule order
    pub fn list_loan_repayments(&self, loan_id: i64) -> Result<Vec<Repayment>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM repayments WHERE loan_id = ? ORDER BY sequence_number",
            REPAYMENT_COLUMNS
        ))?;
        let repayments = stmt
            .query_map(params![loan_id], repayment_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(repayments)
    }
}

fn get_loan_on(conn: &rusqlite::Connection, id: i64) -> Result<Loan> {
    conn.query_row(
        &format!("SELECT {} FROM loans WHERE id = ?", LOAN_COLUMNS),
        params![id],
        loan_from_row,
    )
    .optional()?
    .ok_or_else(|| Error::NotFound(format!("loan {}", id)))
}

fn get_repayment_on(conn: &rusqlite::Connection, id: i64) -> Result<Repayment> {
    conn.query_row(
        &format!("SELECT {} FROM repayments WHERE id = ?", REPAYMENT_COLUMNS),
        params![id],
        repayment_from_row,
    )
    .optional()?
    .ok_or_else(|| Error::NotFound(format!("repayment {}", id)))
}
