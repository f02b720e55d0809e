//! Joining-fee payment plans and installment lifecycle

use rusqlite::{params, OptionalExtension, TransactionBehavior};
use rust_decimal::Decimal;
use tracing::info;

use super::ledger::{append_record_tx, delete_record_tx};
use super::{parse_amount, parse_date, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{
    Installment, NewLedgerRecord, ObligationPayment, ObligationStatus, PaymentPlan, SystemCategory,
};
use crate::schedule::build_schedule;

const INSTALLMENT_COLUMNS: &str = "id, member_id, sequence_number, amount, due_date, \
     status, paid_at, notes, ledger_record_id, created_at";

fn installment_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Installment> {
    let amount: String = row.get(3)?;
    let due_date: String = row.get(4)?;
    let status: String = row.get(5)?;
    let paid_at: Option<String> = row.get(6)?;
    let created_at: String = row.get(9)?;
    Ok(Installment {
        id: row.get(0)?,
        member_id: row.get(1)?,
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

impl Database {
    /// Create a member's payment plan: the prepaid portion becomes a
    /// ledger record linked to the member, the remainder is split into
    /// monthly installments. All rows and the record commit together.
    pub fn create_payment_plan(&self, plan: &PaymentPlan) -> Result<Vec<Installment>> {
        let member = self.get_member(plan.member_id)?;

        if plan.subscription_fee <= Decimal::ZERO {
            return Err(Error::validation(
                "subscription_fee",
                "subscription fee must be positive",
            ));
        }
        if plan.prepaid < Decimal::ZERO {
            return Err(Error::validation(
                "prepaid",
                "prepaid amount must not be negative",
            ));
        }
        if plan.prepaid > plan.subscription_fee {
            return Err(Error::validation(
                "prepaid",
                "prepaid amount cannot exceed the subscription fee",
            ));
        }

        let remaining = plan.subscription_fee - plan.prepaid;
        if remaining > Decimal::ZERO && plan.installments_count.is_none() {
            return Err(Error::validation(
                "installments_count",
                "an installment count is required for the remaining amount",
            ));
        }
        if remaining > Decimal::ZERO && plan.start_date.is_none() {
            return Err(Error::validation(
                "start_date",
                "a start date is required for the remaining amount",
            ));
        }
        if plan.prepaid > Decimal::ZERO && plan.prepaid_payment.is_none() {
            return Err(Error::validation(
                "prepaid_payment",
                "payment details are required for the prepaid amount",
            ));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing: i64 = tx.query_row(
            "SELECT COUNT(*) FROM installments WHERE member_id = ?",
            params![plan.member_id],
            |row| row.get(0),
        )?;
        if existing > 0 || member.ledger_record_id.is_some() {
            return Err(Error::validation(
                "member_id",
                format!("member {} already has a payment plan", plan.member_id),
            ));
        }

        if plan.prepaid > Decimal::ZERO {
            let payment = plan.prepaid_payment.as_ref().ok_or_else(|| {
                Error::validation("prepaid_payment", "payment details are required")
            })?;
            let category_id = Self::system_category_id_on(&tx, SystemCategory::MembershipFee)?;
            let record = append_record_tx(
                &tx,
                &NewLedgerRecord {
                    amount: plan.prepaid,
                    transaction_type_id: category_id,
                    date: payment.paid_at,
                    payment_method: payment.payment_method,
                    bank_account_id: payment.bank_account_id,
                    receipt_number: payment.receipt_number.clone(),
                    notes: payment.notes.clone(),
                    created_by: plan.actor.clone(),
                },
            )?;
            tx.execute(
                "UPDATE members SET ledger_record_id = ? WHERE id = ?",
                params![record.id, plan.member_id],
            )?;
        }

        let mut installments = Vec::new();
        if remaining > Decimal::ZERO {
            let count = plan.installments_count.unwrap_or(0);
            let start_date = plan.start_date.unwrap_or(member.subscription_date);
            for row in build_schedule(remaining, count, start_date)? {
                tx.execute(
                    "INSERT INTO installments (member_id, sequence_number, amount, due_date)
                     VALUES (?, ?, ?, ?)",
                    params![
                        plan.member_id,
                        row.sequence_number,
                        row.amount.to_string(),
                        row.due_date.to_string(),
                    ],
                )?;
                installments.push(get_installment_on(&tx, tx.last_insert_rowid())?);
            }
        }

        tx.commit()?;

        info!(
            member_id = plan.member_id,
            installments = installments.len(),
            prepaid = %plan.prepaid,
            "payment plan created"
        );
        Ok(installments)
    }

    /// Pay an installment: unpaid to paid only. The payment amount
    /// overwrites the scheduled amount; the ledger record and balance
    /// projection commit in the same transaction. A concurrent second
    /// payment loses on the status-qualified update.
    pub fn pay_installment(&self, id: i64, payment: &ObligationPayment) -> Result<Installment> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let claimed = tx.execute(
            "UPDATE installments SET status = 'paid' WHERE id = ? AND status = 'unpaid'",
            params![id],
        )?;
        if claimed == 0 {
            get_installment_on(&tx, id)?;
            return Err(Error::InvalidTransition(format!(
                "installment {} is already paid",
                id
            )));
        }

        let category_id = Self::system_category_id_on(&tx, SystemCategory::InstallmentFee)?;
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
            "UPDATE installments
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

        let installment = get_installment_on(&tx, id)?;
        tx.commit()?;

        info!(installment_id = id, amount = %payment.amount, "installment paid");
        Ok(installment)
    }

    /// Revoke a paid installment: back to unpaid, paid_at and notes
    /// cleared, ledger record deleted with its balance reversed. The
    /// amount stays as last recorded.
    pub fn revoke_installment(&self, id: i64) -> Result<Installment> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let installment = get_installment_on(&tx, id)?;
        let changed = tx.execute(
            "UPDATE installments
             SET status = 'unpaid', paid_at = NULL, notes = NULL, ledger_record_id = NULL
             WHERE id = ? AND status = 'paid'",
            params![id],
        )?;
        if changed == 0 {
            return Err(Error::InvalidTransition(format!(
                "installment {} is not paid",
                id
            )));
        }
        if let Some(record_id) = installment.ledger_record_id {
            delete_record_tx(&tx, record_id)?;
        }

        let installment = get_installment_on(&tx, id)?;
        tx.commit()?;

        info!(installment_id = id, "installment revoked");
        Ok(installment)
    }

    /// Delete an installment, cascading to its ledger record
    pub fn delete_installment(&self, id: i64) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let installment = get_installment_on(&tx, id)?;
        tx.execute(
            "UPDATE installments SET ledger_record_id = NULL WHERE id = ?",
            params![id],
        )?;
        tx.execute("DELETE FROM installments WHERE id = ?", params![id])?;
        if let Some(record_id) = installment.ledger_record_id {
            delete_record_tx(&tx, record_id)?;
        }
        tx.commit()?;

        info!(installment_id = id, "installment deleted");
        Ok(())
    }

    /// Get an installment by ID
    pub fn get_installment(&self, id: i64) -> Result<Installment> {
        let conn = self.conn()?;
        get_installment_on(&conn, id)
    }

    /// List a member's installments in plan order
    pub fn list_member_installments(&self, member_id: i64) -> Result<Vec<Installment>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM installments WHERE member_id = ? ORDER BY sequence_number",
            INSTALLMENT_COLUMNS
        ))?;
        let installments = stmt
            .query_map(params![member_id], installment_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(installments)
    }
}

fn get_installment_on(conn: &rusqlite::Connection, id: i64) -> Result<Installment> {
    conn.query_row(
        &format!(
            "SELECT {} FROM installments WHERE id = ?",
            INSTALLMENT_COLUMNS
        ),
        params![id],
        installment_from_row,
    )
    .optional()?
    .ok_or_else(|| Error::NotFound(format!("installment {}", id)))
}
