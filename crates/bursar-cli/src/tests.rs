//! CLI command tests
//!
//! This module contains tests for argument parsing and the CLI commands
//! run against a temp database.

use clap::Parser;

use crate::cli::{AccountsAction, Cli, Commands, MembersAction};
use crate::commands::{self, parse_amount, parse_date, parse_method, parse_payment};

fn temp_db_path() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bursar.db");
    (dir, path)
}

#[test]
fn test_cli_structure() {
    use clap::CommandFactory;
    Cli::command().debug_assert();
}

#[test]
fn test_parse_helpers() {
    assert_eq!(parse_amount("120.50").unwrap().to_string(), "120.50");
    assert!(parse_amount("abc").is_err());

    let date = parse_date("2025-03-01").unwrap();
    assert_eq!(date.to_string(), "2025-03-01");
    assert!(parse_date("03/01/2025").is_err());

    assert!(parse_method("bank_deposit").is_ok());
    assert!(parse_method("credit_card").is_err());
}

#[test]
fn test_parse_payment_args() {
    let cli = Cli::parse_from([
        "bursar",
        "installments",
        "pay",
        "7",
        "--amount",
        "250",
        "--date",
        "2025-01-07",
        "--method",
        "bank_deposit",
        "--bank-account",
        "3",
        "--receipt",
        "R-10",
    ]);
    let Commands::Installments { action } = cli.command else {
        panic!("expected installments command");
    };
    let crate::cli::InstallmentsAction::Pay { id, payment } = action else {
        panic!("expected pay action");
    };
    assert_eq!(id, 7);

    let payment = parse_payment(&payment).unwrap();
    assert_eq!(payment.amount.to_string(), "250");
    assert_eq!(payment.bank_account_id, Some(3));
    assert_eq!(payment.receipt_number.as_deref(), Some("R-10"));
}

#[test]
fn test_cmd_init_and_accounts() {
    let (_dir, path) = temp_db_path();

    commands::cmd_init(&path, true).unwrap();
    commands::cmd_accounts(
        &path,
        Some(AccountsAction::Add {
            name: "Treasury".to_string(),
        }),
        true,
    )
    .unwrap();
    commands::cmd_accounts(&path, Some(AccountsAction::List), true).unwrap();

    let db = commands::open_db(&path, true).unwrap();
    let accounts = db.list_bank_accounts().unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].name, "Treasury");
}

#[test]
fn test_cmd_member_plan_flow() {
    let (_dir, path) = temp_db_path();
    commands::cmd_init(&path, true).unwrap();

    commands::cmd_members(
        &path,
        Some(MembersAction::Add {
            name: "A. Example".to_string(),
            rank: "captain".to_string(),
            number: "1001".to_string(),
            subscription_date: "2025-01-01".to_string(),
            actor: None,
        }),
        true,
    )
    .unwrap();

    commands::cmd_members(
        &path,
        Some(MembersAction::Plan {
            id: 1,
            fee: "600".to_string(),
            prepaid: "0".to_string(),
            count: Some(3),
            start_date: Some("2025-02-01".to_string()),
            date: None,
            method: "cash".to_string(),
            bank_account: None,
            receipt: None,
            actor: None,
        }),
        true,
    )
    .unwrap();

    let db = commands::open_db(&path, true).unwrap();
    let installments = db.list_member_installments(1).unwrap();
    assert_eq!(installments.len(), 3);
    assert_eq!(installments[0].amount.to_string(), "200");
}
