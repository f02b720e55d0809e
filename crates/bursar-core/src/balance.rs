//! Balance projector
//!
//! Pure functions that turn a ledger mutation into signed balance deltas.
//! The database layer applies the deltas inside the same transaction as
//! the ledger write, so a rolled-back write can never leave a stale
//! balance behind. Old and new record states are explicit parameters;
//! there is no hidden "previous value" anywhere.

use rust_decimal::Decimal;

use crate::models::{PaymentMethod, TransactionKind};

/// The balance-relevant slice of a ledger record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordState {
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub payment_method: PaymentMethod,
    pub bank_account_id: Option<i64>,
}

/// A signed delta to apply to one bank account's balance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceChange {
    pub bank_account_id: i64,
    pub delta: Decimal,
}

/// Convert a positive stored amount into a signed delta: income adds,
/// expense subtracts.
pub fn normalize(amount: Decimal, kind: TransactionKind) -> Decimal {
    match kind {
        TransactionKind::Income => amount,
        TransactionKind::Expense => -amount,
    }
}

/// Delta for a freshly appended record. Cash and unattached records never
/// contribute.
pub fn on_append(state: &RecordState) -> Option<BalanceChange> {
    if state.payment_method == PaymentMethod::Cash {
        return None;
    }
    state.bank_account_id.map(|id| BalanceChange {
        bank_account_id: id,
        delta: normalize(state.amount, state.kind),
    })
}

/// Deltas for an amended record, given both states of the same operation.
///
/// When the account is unchanged the difference of the normalized amounts
/// is applied. When the account changed, the normalized *new* amount is
/// credited to the new account (unless the new method is cash) and
/// debited from the old one: the old account's prior contribution is
/// undone using the new amount, not the old one.
pub fn on_amend(old: &RecordState, new: &RecordState) -> Vec<BalanceChange> {
    if old.bank_account_id == new.bank_account_id {
        match new.bank_account_id {
            Some(id) if new.payment_method != PaymentMethod::Cash => vec![BalanceChange {
                bank_account_id: id,
                delta: normalize(new.amount, new.kind) - normalize(old.amount, old.kind),
            }],
            _ => Vec::new(),
        }
    } else {
        let delta = normalize(new.amount, new.kind);
        let mut changes = Vec::new();
        if let Some(id) = new.bank_account_id {
            if new.payment_method != PaymentMethod::Cash {
                changes.push(BalanceChange {
                    bank_account_id: id,
                    delta,
                });
            }
        }
        if let Some(id) = old.bank_account_id {
            changes.push(BalanceChange {
                bank_account_id: id,
                delta: -delta,
            });
        }
        changes
    }
}

/// Reversal for a retracted record: undo its contribution whenever a bank
/// account is attached.
pub fn on_retract(state: &RecordState) -> Option<BalanceChange> {
    state.bank_account_id.map(|id| BalanceChange {
        bank_account_id: id,
        delta: -normalize(state.amount, state.kind),
    })
}
