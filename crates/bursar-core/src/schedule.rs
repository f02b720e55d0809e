//! Obligation scheduler and calendar helpers
//!
//! Splits a principal into N equal monthly obligations anchored to the
//! first day of the start month. Used for both joining-fee installments
//! and loan repayment schedules.

use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;

use crate::error::{Error, Result};

/// One row of a generated schedule, before DB insertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledObligation {
    /// 1-based position in the schedule
    pub sequence_number: u32,
    pub due_date: NaiveDate,
    pub amount: Decimal,
}

/// First day of the month containing `date`
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Whole calendar-month difference, ignoring days: Jan→Mar = 2.
/// Negative when `to` is before `from`.
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i32 {
    (to.year() - from.year()) * 12 + to.month() as i32 - from.month() as i32
}

/// Split `principal` into `count` equal monthly obligations.
///
/// The per-unit amount is `principal / count` computed once with full
/// decimal precision; no remainder is redistributed across the rows, so
/// the schedule total may differ from the principal by a sub-cent
/// amount. Callers relying on an exact total must pick a count that
/// divides the principal evenly.
pub fn build_schedule(
    principal: Decimal,
    count: u32,
    start_date: NaiveDate,
) -> Result<Vec<ScheduledObligation>> {
    if principal <= Decimal::ZERO {
        return Err(Error::InvalidSchedule(format!(
            "principal must be positive, got {}",
            principal
        )));
    }
    if count < 1 {
        return Err(Error::InvalidSchedule(
            "count must be at least 1".to_string(),
        ));
    }

    let per_unit = principal / Decimal::from(count);
    let anchor = month_start(start_date);

    (0..count)
        .map(|i| {
            let due_date = anchor
                .checked_add_months(Months::new(i))
                .ok_or_else(|| Error::InvalidSchedule("due date out of range".to_string()))?;
            Ok(ScheduledObligation {
                sequence_number: i + 1,
                due_date,
                amount: per_unit,
            })
        })
        .collect()
}
