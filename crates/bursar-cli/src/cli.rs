//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI
//! arguments. The actual command implementations are in the `commands`
//! module.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Bursar - membership ledger and obligation tracking
#[derive(Parser)]
#[command(name = "bursar")]
#[command(about = "Self-hosted membership treasury: ledger, dues and loans", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "bursar.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set BURSAR_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Payment details shared by every pay-style command
#[derive(Args, Debug)]
pub struct PaymentArgs {
    /// Amount paid (overwrites the scheduled amount)
    #[arg(long)]
    pub amount: String,

    /// Payment date (YYYY-MM-DD)
    #[arg(long)]
    pub date: String,

    /// Payment method: cash, bank_deposit, bank_expense, cheque, bank_transfer
    #[arg(long, default_value = "cash")]
    pub method: String,

    /// Bank account ID (required for non-cash methods)
    #[arg(long)]
    pub bank_account: Option<i64>,

    /// Receipt number (required for non-cash methods)
    #[arg(long)]
    pub receipt: Option<String>,

    /// Free-form notes
    #[arg(long)]
    pub notes: Option<String>,

    /// Acting user recorded for audit
    #[arg(long)]
    pub actor: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Show database status (encryption, size, counts)
    Status,

    /// Manage bank accounts
    Accounts {
        #[command(subcommand)]
        action: Option<AccountsAction>,
    },

    /// Manage transaction categories
    Categories {
        #[command(subcommand)]
        action: Option<CategoriesAction>,
    },

    /// Manage ledger records
    Records {
        #[command(subcommand)]
        action: Option<RecordsAction>,
    },

    /// Manage members and their dues
    Members {
        #[command(subcommand)]
        action: Option<MembersAction>,
    },

    /// Manage monthly subscriptions
    Subscriptions {
        #[command(subcommand)]
        action: SubscriptionsAction,
    },

    /// Manage joining-fee installments
    Installments {
        #[command(subcommand)]
        action: InstallmentsAction,
    },

    /// Manage loans and repayments
    Loans {
        #[command(subcommand)]
        action: LoansAction,
    },

    /// Manage expected monthly fees per rank
    RankFees {
        #[command(subcommand)]
        action: Option<RankFeesAction>,
    },
}

#[derive(Subcommand)]
pub enum AccountsAction {
    /// List accounts with their projected balances
    List,

    /// Create a bank account
    Add {
        /// Account name (unique)
        name: String,
    },

    /// Show one account's projected balance
    Balance {
        /// Account ID
        id: i64,
    },

    /// Delete an account with no ledger records
    Delete {
        /// Account ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum CategoriesAction {
    /// List categories
    List,

    /// Create a user-defined category
    Add {
        /// Category name
        name: String,

        /// income or expense
        #[arg(long, default_value = "income")]
        kind: String,
    },

    /// Delete an unused user-defined category
    Delete {
        /// Category ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum RecordsAction {
    /// List ledger records
    List {
        /// Restrict to one month (YYYY-MM)
        #[arg(long)]
        month: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Append a ledger record
    Add {
        /// Amount (positive decimal)
        #[arg(long)]
        amount: String,

        /// Category ID
        #[arg(long)]
        category: i64,

        /// Record date (YYYY-MM-DD)
        #[arg(long)]
        date: String,

        /// Payment method: cash, bank_deposit, bank_expense, cheque, bank_transfer
        #[arg(long, default_value = "cash")]
        method: String,

        /// Bank account ID (required for non-cash methods)
        #[arg(long)]
        bank_account: Option<i64>,

        /// Receipt number (required for non-cash methods)
        #[arg(long)]
        receipt: Option<String>,

        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,

        /// Acting user recorded for audit
        #[arg(long)]
        actor: Option<String>,
    },

    /// Correct a record's amount or settlement details
    Amend {
        /// Record ID
        id: i64,

        /// New amount
        #[arg(long)]
        amount: Option<String>,

        /// New payment method
        #[arg(long)]
        method: Option<String>,

        /// Move to this bank account
        #[arg(long, conflicts_with = "clear_bank_account")]
        bank_account: Option<i64>,

        /// Detach from its bank account (for a move to cash)
        #[arg(long)]
        clear_bank_account: bool,

        /// New receipt number
        #[arg(long, conflicts_with = "clear_receipt")]
        receipt: Option<String>,

        /// Drop the receipt number (for a move to cash)
        #[arg(long)]
        clear_receipt: bool,
    },

    /// Retract (delete) an unowned record, reversing its balance
    Retract {
        /// Record ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum MembersAction {
    /// List members
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a member
    Add {
        /// Member name
        name: String,

        /// Rank key (used for the expected monthly fee)
        #[arg(long)]
        rank: String,

        /// Membership number (unique)
        #[arg(long)]
        number: String,

        /// Subscription start date (YYYY-MM-DD)
        #[arg(long)]
        subscription_date: String,

        /// Acting user recorded for audit
        #[arg(long)]
        actor: Option<String>,
    },

    /// Show what a member owes as of a date
    Dues {
        /// Member ID
        id: i64,

        /// Reference date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        as_of: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a member's joining-fee payment plan
    Plan {
        /// Member ID
        id: i64,

        /// Total joining fee
        #[arg(long)]
        fee: String,

        /// Amount paid up front
        #[arg(long, default_value = "0")]
        prepaid: String,

        /// Number of monthly installments for the remainder
        #[arg(long)]
        count: Option<u32>,

        /// First installment month (YYYY-MM-DD)
        #[arg(long)]
        start_date: Option<String>,

        /// Prepaid payment date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,

        /// Prepaid payment method
        #[arg(long, default_value = "cash")]
        method: String,

        /// Bank account ID for the prepaid payment
        #[arg(long)]
        bank_account: Option<i64>,

        /// Receipt number for the prepaid payment
        #[arg(long)]
        receipt: Option<String>,

        /// Acting user recorded for audit
        #[arg(long)]
        actor: Option<String>,
    },

    /// Toggle a member between active and retired
    SwitchActive {
        /// Member ID
        id: i64,
    },

    /// Delete every financial trace of a member
    Purge {
        /// Member ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum SubscriptionsAction {
    /// List a member's subscriptions
    List {
        /// Member ID
        member: i64,
    },

    /// Pay a member's subscription for a month
    Pay {
        /// Member ID
        member: i64,

        /// Billed month (YYYY-MM-DD, normalized to the first)
        #[arg(long)]
        month: String,

        #[command(flatten)]
        payment: PaymentArgs,
    },

    /// Revoke a paid subscription (the month stays claimed)
    Revoke {
        /// Subscription ID
        id: i64,
    },

    /// Delete a subscription row, freeing its month
    Delete {
        /// Subscription ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum InstallmentsAction {
    /// List a member's installments
    List {
        /// Member ID
        member: i64,
    },

    /// Pay an installment
    Pay {
        /// Installment ID
        id: i64,

        #[command(flatten)]
        payment: PaymentArgs,
    },

    /// Revoke a paid installment
    Revoke {
        /// Installment ID
        id: i64,
    },

    /// Delete an installment and its ledger record
    Delete {
        /// Installment ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum LoansAction {
    /// List a member's loans
    List {
        /// Member ID
        member: i64,
    },

    /// Issue a loan with its repayment schedule
    Create {
        /// Member ID
        member: i64,

        /// Principal
        #[arg(long)]
        amount: String,

        /// Disbursement date (YYYY-MM-DD)
        #[arg(long)]
        issued: String,

        /// Number of monthly repayments
        #[arg(long)]
        count: u32,

        /// First repayment month (YYYY-MM-DD)
        #[arg(long)]
        start_date: String,

        /// Disbursement method: cash, bank_expense, cheque, bank_transfer
        #[arg(long, default_value = "cash")]
        method: String,

        /// Bank account the principal left
        #[arg(long)]
        bank_account: Option<i64>,

        /// Receipt number for the disbursement
        #[arg(long)]
        receipt: Option<String>,

        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,

        /// Acting user recorded for audit
        #[arg(long)]
        actor: Option<String>,
    },

    /// Show a loan's repayment progress
    Status {
        /// Loan ID
        id: i64,
    },

    /// List a loan's repayment schedule
    Repayments {
        /// Loan ID
        id: i64,
    },

    /// Pay a repayment
    Pay {
        /// Repayment ID
        id: i64,

        #[command(flatten)]
        payment: PaymentArgs,
    },

    /// Revoke a paid repayment
    Revoke {
        /// Repayment ID
        id: i64,
    },

    /// Delete a loan, its repayments and their ledger records
    Delete {
        /// Loan ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum RankFeesAction {
    /// List rank fees
    List,

    /// Set the expected monthly fee for a rank
    Set {
        /// Rank key
        rank: String,

        /// Monthly fee
        #[arg(long)]
        fee: String,
    },

    /// Create missing rank-fee rows at the default fee
    Seed {
        /// Rank keys to ensure
        ranks: Vec<String>,
    },
}
