//! End-to-end scenario: a member joins with a payment plan, pays dues,
//! takes a loan, and every balance stays consistent throughout.

use bursar_core::models::*;
use bursar_core::Database;
use chrono::NaiveDate;
use rust_decimal::Decimal;

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn bank_payment(amount: &str, paid_at: NaiveDate, account_id: i64, receipt: &str) -> ObligationPayment {
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

#[test]
fn member_lifecycle() {
    let db = Database::in_memory().unwrap();
    let account = db.create_bank_account("Treasury").unwrap();
    db.set_rank_fee("captain", dec("150")).unwrap();

    let member = db
        .create_member(&NewMember {
            name: "A. Example".to_string(),
            rank: "captain".to_string(),
            membership_number: "2040".to_string(),
            subscription_date: date(2025, 1, 1),
            created_by: Some("treasurer".to_string()),
        })
        .unwrap();

    // Joining fee 6000: 2000 up front, the rest over 4 months
    let installments = db
        .create_payment_plan(&PaymentPlan {
            member_id: member.id,
            subscription_fee: dec("6000"),
            prepaid: dec("2000"),
            installments_count: Some(4),
            start_date: Some(date(2025, 2, 1)),
            prepaid_payment: Some(bank_payment("2000", date(2025, 1, 4), account.id, "J-1")),
            actor: Some("treasurer".to_string()),
        })
        .unwrap();
    assert_eq!(installments.len(), 4);
    assert_eq!(db.bank_balance(account.id).unwrap(), dec("2000"));

    // First two installments settled
    for (i, installment) in installments.iter().take(2).enumerate() {
        db.pay_installment(
            installment.id,
            &bank_payment("1000", date(2025, 2 + i as u32, 5), account.id, &format!("I-{}", i)),
        )
        .unwrap();
    }
    assert_eq!(db.bank_balance(account.id).unwrap(), dec("4000"));

    // Monthly dues for January through March
    for m in 1..=3u32 {
        db.pay_subscription(
            member.id,
            date(2025, m, 1),
            &bank_payment("150", date(2025, m, 6), account.id, &format!("S-{}", m)),
        )
        .unwrap();
    }
    assert_eq!(db.bank_balance(account.id).unwrap(), dec("4450"));

    // A loan goes out of the same account
    let (loan, repayments) = db
        .create_loan(&NewLoan {
            member_id: member.id,
            amount: dec("1200"),
            issued_date: date(2025, 3, 15),
            repayments_count: 6,
            start_date: date(2025, 4, 1),
            payment_method: PaymentMethod::BankExpense,
            bank_account_id: Some(account.id),
            receipt_number: Some("L-1".to_string()),
            notes: None,
            actor: Some("treasurer".to_string()),
        })
        .unwrap();
    assert_eq!(db.bank_balance(account.id).unwrap(), dec("3250"));

    db.pay_repayment(
        repayments[0].id,
        &bank_payment("200", date(2025, 4, 3), account.id, "L-2"),
    )
    .unwrap();

    // Dues as of May 2025: four months owed (Jan..May), three paid
    let dues = db.member_dues(member.id, date(2025, 5, 1)).unwrap();
    assert_eq!(dues.due_months, 4);
    assert_eq!(dues.paid_subscriptions, 3);
    assert_eq!(dues.unpaid_subscriptions, 1);
    assert_eq!(dues.unpaid_installments, 2);
    assert_eq!(dues.unpaid_repayments, 5);
    assert_eq!(dues.expected_monthly_fee, dec("150"));

    let status = db.loan_status(loan.id).unwrap();
    assert_eq!((status.paid, status.unpaid, status.total), (1, 5, 6));
    assert!(!status.is_completed);

    // A bookkeeping slip: the second installment was actually 900
    let second = db.list_member_installments(member.id).unwrap()[1].clone();
    let record_id = second.ledger_record_id.unwrap();
    db.amend_record(
        record_id,
        &LedgerAmendment {
            amount: Some(dec("900")),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(db.bank_balance(account.id).unwrap(), dec("3350"));

    // The balance always equals the from-scratch sum over the ledger
    let conn = db.conn().unwrap();
    let mut stmt = conn
        .prepare(
            "SELECT amount, kind FROM ledger_records
             WHERE bank_account_id = ?1 AND payment_method != 'cash'",
        )
        .unwrap();
    let total: Decimal = stmt
        .query_map([account.id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .unwrap()
        .map(|r| {
            let (amount, kind) = r.unwrap();
            let amount: Decimal = amount.parse().unwrap();
            if kind == "expense" {
                -amount
            } else {
                amount
            }
        })
        .sum();
    assert_eq!(db.bank_balance(account.id).unwrap(), total);
}
