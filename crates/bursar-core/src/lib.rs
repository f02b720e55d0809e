//! Bursar Core Library
//!
//! The ledger and obligation-scheduling engine of the Bursar membership
//! treasury:
//! - Immutable, typed ledger records with payment-method constraints
//! - Incrementally projected bank-account balances
//! - Payment plans and loan repayment schedules with generated due dates
//! - Pay/revoke obligation lifecycle with 1:1 ledger-record links
//! - Dues queries for members and loans at an arbitrary reference date
//!
//! HTTP routing, export and presentation live in thin collaborator
//! crates; everything in here commits atomically per mutation.

pub mod balance;
pub mod db;
pub mod error;
pub mod models;
pub mod schedule;

pub use db::Database;
pub use error::{Error, Result};
pub use schedule::{build_schedule, month_start, months_between, ScheduledObligation};
