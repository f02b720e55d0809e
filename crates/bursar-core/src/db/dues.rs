//! Read-side dues and loan-status queries
//!
//! Pure queries over obligations and the rank-fee table; independent of
//! the write path.

use chrono::NaiveDate;
use rusqlite::params;

use super::Database;
use crate::models::{DuesSummary, LoanStatus};
use crate::schedule::months_between;

impl Database {
    /// What a member owes as of `as_of`.
    ///
    /// Subscription dues are counted, not stored: every whole calendar
    /// month since the subscription date is owed, minus one per recorded
    /// subscription row, floored at zero. Installment and repayment dues
    /// are direct counts of unpaid rows.
    pub fn member_dues(&self, member_id: i64, as_of: NaiveDate) -> crate::error::Result<DuesSummary> {
        let member = self.get_member(member_id)?;

        let conn = self.conn()?;
        let paid_subscriptions: i64 = conn.query_row(
            "SELECT COUNT(*) FROM subscriptions WHERE member_id = ?",
            params![member_id],
            |row| row.get(0),
        )?;
        let unpaid_installments: i64 = conn.query_row(
            "SELECT COUNT(*) FROM installments WHERE member_id = ? AND status = 'unpaid'",
            params![member_id],
            |row| row.get(0),
        )?;
        let unpaid_repayments: i64 = conn.query_row(
            "SELECT COUNT(*) FROM repayments r
             JOIN loans l ON l.id = r.loan_id
             WHERE l.member_id = ? AND r.status = 'unpaid'",
            params![member_id],
            |row| row.get(0),
        )?;

        let due_months = months_between(member.subscription_date, as_of);
        let unpaid_subscriptions = (due_months as i64 - paid_subscriptions).max(0);

        Ok(DuesSummary {
            due_months,
            paid_subscriptions,
            unpaid_subscriptions,
            unpaid_installments,
            unpaid_repayments,
            expected_monthly_fee: self.rank_fee(&member.rank)?,
        })
    }

    /// Repayment progress of a loan; completed when nothing is unpaid.
    pub fn loan_status(&self, loan_id: i64) -> crate::error::Result<LoanStatus> {
        self.get_loan(loan_id)?;

        let conn = self.conn()?;
        let (total, unpaid): (i64, i64) = conn.query_row(
            "SELECT COUNT(*),
                    COUNT(CASE WHEN status = 'unpaid' THEN 1 END)
             FROM repayments WHERE loan_id = ?",
            params![loan_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(LoanStatus {
            paid: total - unpaid,
            unpaid,
            total,
            is_completed: unpaid == 0,
        })
    }
}
