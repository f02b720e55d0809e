//! Database tests

use super::*;
use crate::models::*;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Months, NaiveDate};
    use rusqlite::params;
    use rust_decimal::Decimal;

    use crate::balance::normalize;
    use crate::error::Error;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn cash_payment(amount: &str, paid_at: NaiveDate) -> ObligationPayment {
        ObligationPayment {
            amount: dec(amount),
            paid_at,
            payment_method: PaymentMethod::Cash,
            bank_account_id: None,
            receipt_number: None,
            notes: None,
            actor: Some("treasurer".to_string()),
        }
    }

    fn bank_payment(
        amount: &str,
        paid_at: NaiveDate,
        account_id: i64,
        receipt: &str,
    ) -> ObligationPayment {
        ObligationPayment {
            amount: dec(amount),
            paid_at,
            payment_method: PaymentMethod::BankDeposit,
            bank_account_id: Some(account_id),
            receipt_number: Some(receipt.to_string()),
            notes: None,
            actor: Some("treasurer".to_string()),
        }
    }

    fn sample_member(db: &Database, number: &str, subscription_date: NaiveDate) -> i64 {
        db.create_member(&NewMember {
            name: format!("Member {}", number),
            rank: "captain".to_string(),
            membership_number: number.to_string(),
            subscription_date,
            created_by: Some("treasurer".to_string()),
        })
        .unwrap()
        .id
    }

    /// User-defined income category for manual ledger entries
    fn donations_category(db: &Database) -> i64 {
        db.create_transaction_type("donations", TransactionKind::Income)
            .unwrap()
            .id
    }

    fn expenses_category(db: &Database) -> i64 {
        db.create_transaction_type("maintenance", TransactionKind::Expense)
            .unwrap()
            .id
    }

    fn bank_record(
        amount: &str,
        category_id: i64,
        kind: TransactionKind,
        account_id: i64,
        receipt: &str,
    ) -> NewLedgerRecord {
        NewLedgerRecord {
            amount: dec(amount),
            transaction_type_id: category_id,
            date: date(2025, 6, 1),
            payment_method: match kind {
                TransactionKind::Income => PaymentMethod::BankDeposit,
                TransactionKind::Expense => PaymentMethod::BankExpense,
            },
            bank_account_id: Some(account_id),
            receipt_number: Some(receipt.to_string()),
            notes: None,
            created_by: Some("treasurer".to_string()),
        }
    }

    /// From-scratch sum over the account's non-cash records, for checking
    /// the projected balance against the defining invariant.
    fn recomputed_balance(db: &Database, account_id: i64) -> Decimal {
        let conn = db.conn().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT amount, kind FROM ledger_records
                 WHERE bank_account_id = ? AND payment_method != 'cash'",
            )
            .unwrap();
        let rows = stmt
            .query_map(params![account_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .unwrap();
        rows.map(|r| {
            let (amount, kind) = r.unwrap();
            normalize(dec(&amount), kind.parse().unwrap())
        })
        .sum()
    }

    fn record_count(db: &Database) -> i64 {
        let conn = db.conn().unwrap();
        conn.query_row("SELECT COUNT(*) FROM ledger_records", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_in_memory_db() {
        let db = Database::in_memory().unwrap();
        assert!(db.list_bank_accounts().unwrap().is_empty());

        // System categories are seeded once, idempotently
        let types = db.list_transaction_types().unwrap();
        let system: Vec<_> = types.iter().filter(|t| t.system_related).collect();
        assert_eq!(system.len(), SystemCategory::ALL.len());
        for category in SystemCategory::ALL {
            assert!(db.system_category_id(category).is_ok());
        }
    }

    #[test]
    fn test_bank_account_crud() {
        let db = Database::in_memory().unwrap();

        let account = db.create_bank_account("Main").unwrap();
        assert_eq!(account.balance, Decimal::ZERO);

        assert!(matches!(
            db.create_bank_account("Main"),
            Err(Error::Validation { field: "name", .. })
        ));

        assert_eq!(db.list_bank_accounts().unwrap().len(), 1);
        assert_eq!(db.bank_balance(account.id).unwrap(), Decimal::ZERO);

        db.delete_bank_account(account.id).unwrap();
        assert!(matches!(
            db.bank_balance(account.id),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_cash_record_rejects_bank_account() {
        let db = Database::in_memory().unwrap();
        let account = db.create_bank_account("Main").unwrap();
        let category = donations_category(&db);

        let result = db.append_record(&NewLedgerRecord {
            amount: dec("100"),
            transaction_type_id: category,
            date: date(2025, 6, 1),
            payment_method: PaymentMethod::Cash,
            bank_account_id: Some(account.id),
            receipt_number: None,
            notes: None,
            created_by: None,
        });
        assert!(matches!(
            result,
            Err(Error::Validation {
                field: "bank_account",
                ..
            })
        ));
        assert_eq!(record_count(&db), 0);
    }

    #[test]
    fn test_bank_record_requires_account_and_receipt() {
        let db = Database::in_memory().unwrap();
        let account = db.create_bank_account("Main").unwrap();
        let category = donations_category(&db);

        let mut record = bank_record("100", category, TransactionKind::Income, account.id, "R-1");
        record.bank_account_id = None;
        assert!(matches!(
            db.append_record(&record),
            Err(Error::Validation {
                field: "bank_account",
                ..
            })
        ));

        let mut record = bank_record("100", category, TransactionKind::Income, account.id, "R-1");
        record.receipt_number = None;
        assert!(matches!(
            db.append_record(&record),
            Err(Error::Validation {
                field: "receipt_number",
                ..
            })
        ));
    }

    #[test]
    fn test_payment_method_kind_compatibility() {
        let db = Database::in_memory().unwrap();
        let account = db.create_bank_account("Main").unwrap();
        let income = donations_category(&db);
        let expense = expenses_category(&db);

        // A deposit cannot settle an expense record
        let mut record = bank_record("100", expense, TransactionKind::Expense, account.id, "R-1");
        record.payment_method = PaymentMethod::BankDeposit;
        assert!(matches!(
            db.append_record(&record),
            Err(Error::Validation {
                field: "payment_method",
                ..
            })
        ));

        // And a bank expense cannot settle an income record
        let mut record = bank_record("100", income, TransactionKind::Income, account.id, "R-2");
        record.payment_method = PaymentMethod::BankExpense;
        assert!(matches!(
            db.append_record(&record),
            Err(Error::Validation {
                field: "payment_method",
                ..
            })
        ));
    }

    #[test]
    fn test_append_rejects_nonpositive_amount() {
        let db = Database::in_memory().unwrap();
        let category = donations_category(&db);

        let result = db.append_record(&NewLedgerRecord {
            amount: dec("0"),
            transaction_type_id: category,
            date: date(2025, 6, 1),
            payment_method: PaymentMethod::Cash,
            bank_account_id: None,
            receipt_number: None,
            notes: None,
            created_by: None,
        });
        assert!(matches!(
            result,
            Err(Error::Validation { field: "amount", .. })
        ));
    }

    #[test]
    fn test_balance_arithmetic_scenario() {
        let db = Database::in_memory().unwrap();
        let account = db.create_bank_account("Main").unwrap();
        let income = donations_category(&db);
        let expense = expenses_category(&db);

        let first = db
            .append_record(&bank_record(
                "500",
                income,
                TransactionKind::Income,
                account.id,
                "R-1",
            ))
            .unwrap();
        assert_eq!(db.bank_balance(account.id).unwrap(), dec("500"));

        db.append_record(&bank_record(
            "200",
            expense,
            TransactionKind::Expense,
            account.id,
            "R-2",
        ))
        .unwrap();
        assert_eq!(db.bank_balance(account.id).unwrap(), dec("300"));

        db.retract_record(first.id).unwrap();
        assert_eq!(db.bank_balance(account.id).unwrap(), dec("-200"));
    }

    #[test]
    fn test_balance_invariant_after_mixed_operations() {
        let db = Database::in_memory().unwrap();
        let main = db.create_bank_account("Main").unwrap();
        let reserve = db.create_bank_account("Reserve").unwrap();
        let income = donations_category(&db);
        let expense = expenses_category(&db);

        let a = db
            .append_record(&bank_record(
                "1000.50",
                income,
                TransactionKind::Income,
                main.id,
                "R-1",
            ))
            .unwrap();
        let b = db
            .append_record(&bank_record(
                "250.25",
                expense,
                TransactionKind::Expense,
                main.id,
                "R-2",
            ))
            .unwrap();
        db.append_record(&bank_record(
            "75",
            income,
            TransactionKind::Income,
            reserve.id,
            "R-3",
        ))
        .unwrap();

        // Amount correction on the same account
        db.amend_record(
            a.id,
            &LedgerAmendment {
                amount: Some(dec("900.50")),
                ..Default::default()
            },
        )
        .unwrap();

        // Move a record to another account
        db.amend_record(
            b.id,
            &LedgerAmendment {
                bank_account_id: Some(Some(reserve.id)),
                ..Default::default()
            },
        )
        .unwrap();

        db.retract_record(a.id).unwrap();

        for account in [&main, &reserve] {
            assert_eq!(
                db.bank_balance(account.id).unwrap(),
                recomputed_balance(&db, account.id),
                "projected balance must match the from-scratch sum"
            );
        }
    }

    #[test]
    fn test_cash_amend_touches_no_balances() {
        let db = Database::in_memory().unwrap();
        let account = db.create_bank_account("Main").unwrap();
        let category = donations_category(&db);

        let record = db
            .append_record(&NewLedgerRecord {
                amount: dec("100"),
                transaction_type_id: category,
                date: date(2025, 6, 1),
                payment_method: PaymentMethod::Cash,
                bank_account_id: None,
                receipt_number: None,
                notes: None,
                created_by: None,
            })
            .unwrap();

        db.amend_record(
            record.id,
            &LedgerAmendment {
                amount: Some(dec("999")),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(db.bank_balance(account.id).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_amend_account_change_reverses_with_new_amount() {
        let db = Database::in_memory().unwrap();
        let main = db.create_bank_account("Main").unwrap();
        let reserve = db.create_bank_account("Reserve").unwrap();
        let category = donations_category(&db);

        let record = db
            .append_record(&bank_record(
                "500",
                category,
                TransactionKind::Income,
                main.id,
                "R-1",
            ))
            .unwrap();

        db.amend_record(
            record.id,
            &LedgerAmendment {
                amount: Some(dec("350")),
                bank_account_id: Some(Some(reserve.id)),
                ..Default::default()
            },
        )
        .unwrap();

        // The old account is unwound with the new amount: 500 - 350 = 150
        assert_eq!(db.bank_balance(main.id).unwrap(), dec("150"));
        assert_eq!(db.bank_balance(reserve.id).unwrap(), dec("350"));
    }

    #[test]
    fn test_retract_owned_record_refused() {
        let db = Database::in_memory().unwrap();
        let member = sample_member(&db, "1001", date(2024, 1, 1));
        db.create_payment_plan(&PaymentPlan {
            member_id: member,
            subscription_fee: dec("600"),
            prepaid: Decimal::ZERO,
            installments_count: Some(3),
            start_date: Some(date(2025, 1, 1)),
            prepaid_payment: None,
            actor: None,
        })
        .unwrap();

        let installment = db.list_member_installments(member).unwrap()[0].clone();
        let paid = db
            .pay_installment(installment.id, &cash_payment("200", date(2025, 1, 5)))
            .unwrap();

        let record_id = paid.ledger_record_id.unwrap();
        assert!(matches!(
            db.retract_record(record_id),
            Err(Error::Integrity(_))
        ));
        // Still there
        assert!(db.get_record(record_id).is_ok());
    }

    #[test]
    fn test_delete_category_integrity() {
        let db = Database::in_memory().unwrap();
        let category = donations_category(&db);

        db.append_record(&NewLedgerRecord {
            amount: dec("10"),
            transaction_type_id: category,
            date: date(2025, 6, 1),
            payment_method: PaymentMethod::Cash,
            bank_account_id: None,
            receipt_number: None,
            notes: None,
            created_by: None,
        })
        .unwrap();

        assert!(matches!(
            db.delete_transaction_type(category),
            Err(Error::Integrity(_))
        ));

        // System categories can never be deleted
        let system = db
            .system_category_id(SystemCategory::SubscriptionFee)
            .unwrap();
        assert!(matches!(
            db.delete_transaction_type(system),
            Err(Error::Integrity(_))
        ));

        // An unused user category can
        let unused = db
            .create_transaction_type("events", TransactionKind::Income)
            .unwrap();
        db.delete_transaction_type(unused.id).unwrap();
    }

    #[test]
    fn test_create_payment_plan() {
        let db = Database::in_memory().unwrap();
        let account = db.create_bank_account("Main").unwrap();
        let member = sample_member(&db, "1001", date(2024, 1, 1));

        let installments = db
            .create_payment_plan(&PaymentPlan {
                member_id: member,
                subscription_fee: dec("6000"),
                prepaid: dec("1200"),
                installments_count: Some(4),
                start_date: Some(date(2025, 3, 10)),
                prepaid_payment: Some(bank_payment("1200", date(2025, 2, 20), account.id, "R-77")),
                actor: Some("treasurer".to_string()),
            })
            .unwrap();

        assert_eq!(installments.len(), 4);
        for (i, installment) in installments.iter().enumerate() {
            assert_eq!(installment.sequence_number, i as u32 + 1);
            assert_eq!(installment.amount, dec("1200"));
            assert_eq!(installment.due_date, date(2025, 3 + i as u32, 1));
            assert_eq!(installment.status, ObligationStatus::Unpaid);
        }

        // Prepaid record linked to the member and projected to the account
        let member = db.get_member(member).unwrap();
        let record = db.get_record(member.ledger_record_id.unwrap()).unwrap();
        assert_eq!(record.amount, dec("1200"));
        assert_eq!(record.kind, TransactionKind::Income);
        assert_eq!(db.bank_balance(account.id).unwrap(), dec("1200"));
    }

    #[test]
    fn test_payment_plan_validation() {
        let db = Database::in_memory().unwrap();
        let member = sample_member(&db, "1001", date(2024, 1, 1));

        let plan = |prepaid: &str, count: Option<u32>, start: Option<NaiveDate>| PaymentPlan {
            member_id: member,
            subscription_fee: dec("1000"),
            prepaid: dec(prepaid),
            installments_count: count,
            start_date: start,
            prepaid_payment: None,
            actor: None,
        };

        assert!(matches!(
            db.create_payment_plan(&plan("2000", Some(4), Some(date(2025, 1, 1)))),
            Err(Error::Validation { field: "prepaid", .. })
        ));
        assert!(matches!(
            db.create_payment_plan(&plan("0", None, Some(date(2025, 1, 1)))),
            Err(Error::Validation {
                field: "installments_count",
                ..
            })
        ));
        assert!(matches!(
            db.create_payment_plan(&plan("0", Some(4), None)),
            Err(Error::Validation {
                field: "start_date",
                ..
            })
        ));
        assert!(matches!(
            db.create_payment_plan(&plan("500", Some(2), Some(date(2025, 1, 1)))),
            Err(Error::Validation {
                field: "prepaid_payment",
                ..
            })
        ));

        // Nothing was written by the failed attempts
        assert!(db.list_member_installments(member).unwrap().is_empty());
        assert_eq!(record_count(&db), 0);

        // A second plan for the same member is rejected
        db.create_payment_plan(&plan("0", Some(2), Some(date(2025, 1, 1))))
            .unwrap();
        assert!(matches!(
            db.create_payment_plan(&plan("0", Some(2), Some(date(2025, 1, 1)))),
            Err(Error::Validation {
                field: "member_id",
                ..
            })
        ));
    }

    #[test]
    fn test_pay_installment_overwrites_amount() {
        let db = Database::in_memory().unwrap();
        let account = db.create_bank_account("Main").unwrap();
        let member = sample_member(&db, "1001", date(2024, 1, 1));
        db.create_payment_plan(&PaymentPlan {
            member_id: member,
            subscription_fee: dec("600"),
            prepaid: Decimal::ZERO,
            installments_count: Some(3),
            start_date: Some(date(2025, 1, 1)),
            prepaid_payment: None,
            actor: None,
        })
        .unwrap();

        let installment = db.list_member_installments(member).unwrap()[0].clone();
        assert_eq!(installment.amount, dec("200"));

        // Paying more than scheduled overwrites the scheduled amount
        let paid = db
            .pay_installment(
                installment.id,
                &bank_payment("250", date(2025, 1, 7), account.id, "R-10"),
            )
            .unwrap();
        assert_eq!(paid.status, ObligationStatus::Paid);
        assert_eq!(paid.amount, dec("250"));
        assert_eq!(paid.paid_at, Some(date(2025, 1, 7)));
        assert!(paid.ledger_record_id.is_some());
        assert_eq!(db.bank_balance(account.id).unwrap(), dec("250"));

        assert!(matches!(
            db.pay_installment(installment.id, &cash_payment("250", date(2025, 1, 8))),
            Err(Error::InvalidTransition(_))
        ));
    }

    #[test]
    fn test_pay_revoke_round_trip() {
        let db = Database::in_memory().unwrap();
        let account = db.create_bank_account("Main").unwrap();
        let member = sample_member(&db, "1001", date(2024, 1, 1));
        db.create_payment_plan(&PaymentPlan {
            member_id: member,
            subscription_fee: dec("600"),
            prepaid: Decimal::ZERO,
            installments_count: Some(3),
            start_date: Some(date(2025, 1, 1)),
            prepaid_payment: None,
            actor: None,
        })
        .unwrap();
        let installment = db.list_member_installments(member).unwrap()[0].clone();

        let balance_before = db.bank_balance(account.id).unwrap();
        let records_before = record_count(&db);

        let paid = db
            .pay_installment(
                installment.id,
                &bank_payment("250", date(2025, 1, 7), account.id, "R-10"),
            )
            .unwrap();
        let record_id = paid.ledger_record_id.unwrap();

        let revoked = db.revoke_installment(installment.id).unwrap();
        assert_eq!(revoked.status, ObligationStatus::Unpaid);
        assert_eq!(revoked.paid_at, None);
        assert_eq!(revoked.notes, None);
        assert_eq!(revoked.ledger_record_id, None);
        // The amount stays as last recorded, not the scheduled 200
        assert_eq!(revoked.amount, dec("250"));

        assert!(matches!(db.get_record(record_id), Err(Error::NotFound(_))));
        assert_eq!(db.bank_balance(account.id).unwrap(), balance_before);
        assert_eq!(record_count(&db), records_before);

        assert!(matches!(
            db.revoke_installment(installment.id),
            Err(Error::InvalidTransition(_))
        ));
    }

    #[test]
    fn test_delete_installment_cascades_record() {
        let db = Database::in_memory().unwrap();
        let account = db.create_bank_account("Main").unwrap();
        let member = sample_member(&db, "1001", date(2024, 1, 1));
        db.create_payment_plan(&PaymentPlan {
            member_id: member,
            subscription_fee: dec("400"),
            prepaid: Decimal::ZERO,
            installments_count: Some(2),
            start_date: Some(date(2025, 1, 1)),
            prepaid_payment: None,
            actor: None,
        })
        .unwrap();
        let installment = db.list_member_installments(member).unwrap()[0].clone();

        let paid = db
            .pay_installment(
                installment.id,
                &bank_payment("200", date(2025, 1, 7), account.id, "R-10"),
            )
            .unwrap();
        let record_id = paid.ledger_record_id.unwrap();

        db.delete_installment(installment.id).unwrap();
        assert!(matches!(
            db.get_installment(installment.id),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(db.get_record(record_id), Err(Error::NotFound(_))));
        assert_eq!(db.bank_balance(account.id).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_pay_subscription_normalizes_and_claims_month() {
        let db = Database::in_memory().unwrap();
        let member = sample_member(&db, "1001", date(2024, 1, 1));

        let subscription = db
            .pay_subscription(member, date(2025, 6, 18), &cash_payment("100", date(2025, 6, 18)))
            .unwrap();
        assert_eq!(subscription.date, date(2025, 6, 1));
        assert_eq!(subscription.status, ObligationStatus::Paid);
        assert!(subscription.ledger_record_id.is_some());

        // Any day in the same month collides
        assert!(matches!(
            db.pay_subscription(member, date(2025, 6, 2), &cash_payment("100", date(2025, 6, 2))),
            Err(Error::Validation { field: "date", .. })
        ));

        // The next month is fine
        db.pay_subscription(member, date(2025, 7, 1), &cash_payment("100", date(2025, 7, 1)))
            .unwrap();
        assert_eq!(db.list_member_subscriptions(member).unwrap().len(), 2);
    }

    #[test]
    fn test_revoke_subscription_keeps_month_claimed() {
        let db = Database::in_memory().unwrap();
        let member = sample_member(&db, "1001", date(2024, 1, 1));

        let subscription = db
            .pay_subscription(member, date(2025, 6, 1), &cash_payment("100", date(2025, 6, 5)))
            .unwrap();

        let revoked = db.revoke_subscription(subscription.id).unwrap();
        assert_eq!(revoked.status, ObligationStatus::Unpaid);
        assert_eq!(revoked.ledger_record_id, None);
        assert_eq!(record_count(&db), 0);

        // The unpaid row still claims the month
        assert!(matches!(
            db.pay_subscription(member, date(2025, 6, 1), &cash_payment("100", date(2025, 6, 6))),
            Err(Error::Validation { field: "date", .. })
        ));

        // Deleting it frees the month again
        db.delete_subscription(subscription.id).unwrap();
        db.pay_subscription(member, date(2025, 6, 1), &cash_payment("100", date(2025, 6, 7)))
            .unwrap();
    }

    #[test]
    fn test_create_loan_with_schedule() {
        let db = Database::in_memory().unwrap();
        let account = db.create_bank_account("Main").unwrap();
        let member = sample_member(&db, "1001", date(2024, 1, 1));

        let (loan, repayments) = db
            .create_loan(&NewLoan {
                member_id: member,
                amount: dec("3000"),
                issued_date: date(2025, 1, 10),
                repayments_count: 3,
                start_date: date(2025, 2, 1),
                payment_method: PaymentMethod::BankExpense,
                bank_account_id: Some(account.id),
                receipt_number: Some("R-50".to_string()),
                notes: None,
                actor: Some("treasurer".to_string()),
            })
            .unwrap();

        // The disbursement left the account
        assert_eq!(db.bank_balance(account.id).unwrap(), dec("-3000"));
        let disbursement = db.get_record(loan.ledger_record_id).unwrap();
        assert_eq!(disbursement.kind, TransactionKind::Expense);

        assert_eq!(repayments.len(), 3);
        for (i, repayment) in repayments.iter().enumerate() {
            assert_eq!(repayment.sequence_number, i as u32 + 1);
            assert_eq!(repayment.amount, dec("1000"));
            assert_eq!(repayment.due_date, date(2025, 2 + i as u32, 1));
        }
    }

    #[test]
    fn test_loan_status_progression() {
        let db = Database::in_memory().unwrap();
        let member = sample_member(&db, "1001", date(2024, 1, 1));
        let (loan, repayments) = db
            .create_loan(&NewLoan {
                member_id: member,
                amount: dec("200"),
                issued_date: date(2025, 1, 10),
                repayments_count: 2,
                start_date: date(2025, 2, 1),
                payment_method: PaymentMethod::Cash,
                bank_account_id: None,
                receipt_number: None,
                notes: None,
                actor: None,
            })
            .unwrap();

        let status = db.loan_status(loan.id).unwrap();
        assert_eq!((status.paid, status.unpaid, status.total), (0, 2, 2));
        assert!(!status.is_completed);

        for repayment in &repayments {
            db.pay_repayment(repayment.id, &cash_payment("100", date(2025, 3, 1)))
                .unwrap();
        }
        let status = db.loan_status(loan.id).unwrap();
        assert_eq!((status.paid, status.unpaid, status.total), (2, 0, 2));
        assert!(status.is_completed);

        db.revoke_repayment(repayments[0].id).unwrap();
        assert!(!db.loan_status(loan.id).unwrap().is_completed);
    }

    #[test]
    fn test_delete_loan_restores_balances() {
        let db = Database::in_memory().unwrap();
        let account = db.create_bank_account("Main").unwrap();
        let member = sample_member(&db, "1001", date(2024, 1, 1));

        let (loan, repayments) = db
            .create_loan(&NewLoan {
                member_id: member,
                amount: dec("1000"),
                issued_date: date(2025, 1, 10),
                repayments_count: 2,
                start_date: date(2025, 2, 1),
                payment_method: PaymentMethod::BankExpense,
                bank_account_id: Some(account.id),
                receipt_number: Some("R-50".to_string()),
                notes: None,
                actor: None,
            })
            .unwrap();

        db.pay_repayment(
            repayments[0].id,
            &bank_payment("500", date(2025, 2, 3), account.id, "R-51"),
        )
        .unwrap();
        assert_eq!(db.bank_balance(account.id).unwrap(), dec("-500"));

        db.delete_loan(loan.id).unwrap();
        assert!(matches!(db.get_loan(loan.id), Err(Error::NotFound(_))));
        assert_eq!(record_count(&db), 0);
        assert_eq!(db.bank_balance(account.id).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_member_dues() {
        let db = Database::in_memory().unwrap();
        let member = sample_member(&db, "1001", date(2023, 1, 1));

        // 25 paid months starting January 2023
        for i in 0..25u32 {
            let month = date(2023, 1, 1).checked_add_months(Months::new(i)).unwrap();
            db.pay_subscription(member, month, &cash_payment("100", month))
                .unwrap();
        }

        let dues = db.member_dues(member, date(2025, 7, 1)).unwrap();
        assert_eq!(dues.due_months, 30);
        assert_eq!(dues.paid_subscriptions, 25);
        assert_eq!(dues.unpaid_subscriptions, 5);
    }

    #[test]
    fn test_member_dues_counts_and_expected_fee() {
        let db = Database::in_memory().unwrap();
        let member = sample_member(&db, "1001", date(2025, 1, 1));
        db.create_payment_plan(&PaymentPlan {
            member_id: member,
            subscription_fee: dec("600"),
            prepaid: Decimal::ZERO,
            installments_count: Some(3),
            start_date: Some(date(2025, 1, 1)),
            prepaid_payment: None,
            actor: None,
        })
        .unwrap();
        let (_, repayments) = db
            .create_loan(&NewLoan {
                member_id: member,
                amount: dec("400"),
                issued_date: date(2025, 1, 10),
                repayments_count: 4,
                start_date: date(2025, 2, 1),
                payment_method: PaymentMethod::Cash,
                bank_account_id: None,
                receipt_number: None,
                notes: None,
                actor: None,
            })
            .unwrap();
        db.pay_repayment(repayments[0].id, &cash_payment("100", date(2025, 2, 1)))
            .unwrap();

        // No fee row for the rank: expected amount defaults to zero
        let dues = db.member_dues(member, date(2025, 3, 1)).unwrap();
        assert_eq!(dues.unpaid_installments, 3);
        assert_eq!(dues.unpaid_repayments, 3);
        assert_eq!(dues.expected_monthly_fee, Decimal::ZERO);

        db.set_rank_fee("captain", dec("150")).unwrap();
        let dues = db.member_dues(member, date(2025, 3, 1)).unwrap();
        assert_eq!(dues.expected_monthly_fee, dec("150"));

        // A member ahead of schedule owes nothing, never a negative count
        let eager = sample_member(&db, "1002", date(2025, 2, 1));
        db.pay_subscription(eager, date(2025, 2, 1), &cash_payment("150", date(2025, 2, 1)))
            .unwrap();
        db.pay_subscription(eager, date(2025, 3, 1), &cash_payment("150", date(2025, 3, 1)))
            .unwrap();
        let dues = db.member_dues(eager, date(2025, 3, 1)).unwrap();
        assert_eq!(dues.due_months, 1);
        assert_eq!(dues.unpaid_subscriptions, 0);
    }

    #[test]
    fn test_ensure_default_rank_fees() {
        let db = Database::in_memory().unwrap();
        db.set_rank_fee("major", dec("175")).unwrap();

        let created = db
            .ensure_default_rank_fees(["captain", "major", "colonel"])
            .unwrap();
        assert_eq!(created, 2);

        // Existing rows are not overwritten
        assert_eq!(db.rank_fee("major").unwrap(), dec("175"));
        assert_eq!(db.rank_fee("captain").unwrap(), dec("100.00"));
        assert_eq!(db.ensure_default_rank_fees(["captain"]).unwrap(), 0);
    }

    #[test]
    fn test_double_pay_race() {
        let db = Database::in_memory().unwrap();
        let member = sample_member(&db, "1001", date(2024, 1, 1));
        db.create_payment_plan(&PaymentPlan {
            member_id: member,
            subscription_fee: dec("600"),
            prepaid: Decimal::ZERO,
            installments_count: Some(3),
            start_date: Some(date(2025, 1, 1)),
            prepaid_payment: None,
            actor: None,
        })
        .unwrap();
        let installment_id = db.list_member_installments(member).unwrap()[0].id;

        let barrier = std::sync::Arc::new(std::sync::Barrier::new(2));
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let db = db.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    db.pay_installment(
                        installment_id,
                        &cash_payment("200", date(2025, 1, 5)),
                    )
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let ok = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(Error::InvalidTransition(_))))
            .count();

        assert_eq!(ok, 1, "exactly one payment must win");
        assert_eq!(conflicts, 1, "the loser must see an InvalidTransition");
        assert_eq!(record_count(&db), 1, "exactly one ledger record exists");
    }

    #[test]
    fn test_purge_member_financials() {
        let db = Database::in_memory().unwrap();
        let account = db.create_bank_account("Main").unwrap();
        let member = sample_member(&db, "1001", date(2024, 1, 1));

        db.create_payment_plan(&PaymentPlan {
            member_id: member,
            subscription_fee: dec("1000"),
            prepaid: dec("400"),
            installments_count: Some(3),
            start_date: Some(date(2025, 1, 1)),
            prepaid_payment: Some(bank_payment("400", date(2024, 12, 20), account.id, "R-1")),
            actor: None,
        })
        .unwrap();
        let installment = db.list_member_installments(member).unwrap()[0].clone();
        db.pay_installment(
            installment.id,
            &bank_payment("200", date(2025, 1, 5), account.id, "R-2"),
        )
        .unwrap();
        db.pay_subscription(
            member,
            date(2025, 1, 1),
            &bank_payment("100", date(2025, 1, 5), account.id, "R-3"),
        )
        .unwrap();
        db.create_loan(&NewLoan {
            member_id: member,
            amount: dec("500"),
            issued_date: date(2025, 2, 1),
            repayments_count: 2,
            start_date: date(2025, 3, 1),
            payment_method: PaymentMethod::BankExpense,
            bank_account_id: Some(account.id),
            receipt_number: Some("R-4".to_string()),
            notes: None,
            actor: None,
        })
        .unwrap();

        db.purge_member_financials(member).unwrap();

        assert!(db.list_member_installments(member).unwrap().is_empty());
        assert!(db.list_member_subscriptions(member).unwrap().is_empty());
        assert!(db.list_member_loans(member).unwrap().is_empty());
        assert_eq!(db.get_member(member).unwrap().ledger_record_id, None);
        assert_eq!(record_count(&db), 0);
        assert_eq!(db.bank_balance(account.id).unwrap(), Decimal::ZERO);
    }
}
