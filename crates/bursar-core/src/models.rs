//! Domain models for Bursar

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of a monetary event. Amounts are stored positive; the kind
/// decides the sign when a balance is projected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            _ => Err(format!("Unknown transaction kind: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a ledger record was settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash in hand; never touches a bank account
    Cash,
    /// Deposit into a bank account (income only)
    BankDeposit,
    /// Payment out of a bank account (expense only)
    BankExpense,
    Cheque,
    BankTransfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::BankDeposit => "bank_deposit",
            Self::BankExpense => "bank_expense",
            Self::Cheque => "cheque",
            Self::BankTransfer => "bank_transfer",
        }
    }

    /// Every method except cash settles through a bank account.
    pub fn is_bank(&self) -> bool {
        !matches!(self, Self::Cash)
    }

    /// Deposits are income-only, bank expenses are expense-only; cash,
    /// cheque and transfer work in both directions.
    pub fn allowed_for(&self, kind: TransactionKind) -> bool {
        match self {
            Self::BankDeposit => kind == TransactionKind::Income,
            Self::BankExpense => kind == TransactionKind::Expense,
            _ => true,
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cash" => Ok(Self::Cash),
            "bank_deposit" => Ok(Self::BankDeposit),
            "bank_expense" => Ok(Self::BankExpense),
            "cheque" => Ok(Self::Cheque),
            "bank_transfer" => Ok(Self::BankTransfer),
            _ => Err(format!("Unknown payment method: {}", s)),
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Engine-generated transaction categories. Seeded into `transaction_types`
/// during migration and looked up by key; never created mid-transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemCategory {
    /// Prepaid portion of a new member's joining fee
    MembershipFee,
    /// Monthly membership subscription payment
    SubscriptionFee,
    /// Payment of a joining-fee installment
    InstallmentFee,
    /// Payment of a loan repayment
    LoanRepayment,
    /// Loan principal paid out to a member
    LoanDisbursement,
}

impl SystemCategory {
    pub const ALL: [SystemCategory; 5] = [
        Self::MembershipFee,
        Self::SubscriptionFee,
        Self::InstallmentFee,
        Self::LoanRepayment,
        Self::LoanDisbursement,
    ];

    /// Category name as stored in `transaction_types.name`
    pub fn name(&self) -> &'static str {
        match self {
            Self::MembershipFee => "membership fee",
            Self::SubscriptionFee => "subscription fee",
            Self::InstallmentFee => "installment fee",
            Self::LoanRepayment => "loan repayment",
            Self::LoanDisbursement => "loan",
        }
    }

    pub fn kind(&self) -> TransactionKind {
        match self {
            Self::LoanDisbursement => TransactionKind::Expense,
            _ => TransactionKind::Income,
        }
    }
}

/// Obligation settlement state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObligationStatus {
    Unpaid,
    Paid,
}

impl ObligationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unpaid => "unpaid",
            Self::Paid => "paid",
        }
    }
}

impl std::str::FromStr for ObligationStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unpaid" => Ok(Self::Unpaid),
            "paid" => Ok(Self::Paid),
            _ => Err(format!("Unknown obligation status: {}", s)),
        }
    }
}

impl std::fmt::Display for ObligationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A bank account with its projected balance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankAccount {
    pub id: i64,
    pub name: String,
    /// Cached projection over the account's non-cash ledger records.
    /// Maintained incrementally by the balance projector; reads never
    /// re-scan the ledger.
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}

/// A transaction category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionType {
    pub id: i64,
    pub name: String,
    pub kind: TransactionKind,
    /// True for engine-generated categories (subscription fee, loan, ...)
    pub system_related: bool,
    pub created_at: DateTime<Utc>,
}

/// An immutable monetary event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub id: i64,
    /// Always positive; sign is derived from `kind`, never persisted
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub transaction_type_id: i64,
    pub date: NaiveDate,
    pub payment_method: PaymentMethod,
    pub bank_account_id: Option<i64>,
    pub receipt_number: Option<String>,
    pub notes: Option<String>,
    /// Actor identity for audit
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A ledger record to be appended (before DB insertion)
#[derive(Debug, Clone)]
pub struct NewLedgerRecord {
    pub amount: Decimal,
    pub transaction_type_id: i64,
    pub date: NaiveDate,
    pub payment_method: PaymentMethod,
    pub bank_account_id: Option<i64>,
    pub receipt_number: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
}

/// A correction to an existing ledger record. `None` leaves a field
/// untouched; the double `Option` distinguishes "don't change" from
/// "clear".
#[derive(Debug, Clone, Default)]
pub struct LedgerAmendment {
    pub amount: Option<Decimal>,
    pub payment_method: Option<PaymentMethod>,
    pub bank_account_id: Option<Option<i64>>,
    pub receipt_number: Option<Option<String>>,
}

/// A member of the association (consumed read-only by the engine apart
/// from the prepaid record link)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: i64,
    pub name: String,
    /// Rank key into the rank-fee table
    pub rank: String,
    pub membership_number: String,
    pub subscription_date: NaiveDate,
    pub is_active: bool,
    /// The prepaid joining-fee record, set by payment-plan creation
    pub ledger_record_id: Option<i64>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A new member for creation
#[derive(Debug, Clone)]
pub struct NewMember {
    pub name: String,
    pub rank: String,
    pub membership_number: String,
    pub subscription_date: NaiveDate,
    pub created_by: Option<String>,
}

/// Expected monthly subscription fee per rank
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankFee {
    pub id: i64,
    pub rank: String,
    pub monthly_fee: Decimal,
}

/// A monthly membership due, materialized on payment. `date` is always
/// the first day of the billed month; at most one row per member-month.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub member_id: i64,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub status: ObligationStatus,
    pub paid_at: Option<NaiveDate>,
    pub notes: Option<String>,
    pub ledger_record_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// One piece of a member's joining-fee payment plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Installment {
    pub id: i64,
    pub member_id: i64,
    /// 1-based position in the plan, unique per member
    pub sequence_number: u32,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub status: ObligationStatus,
    pub paid_at: Option<NaiveDate>,
    pub notes: Option<String>,
    pub ledger_record_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// A loan issued to a member. The disbursement is itself a ledger event,
/// so `ledger_record_id` is required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loan {
    pub id: i64,
    pub member_id: i64,
    /// Principal
    pub amount: Decimal,
    pub issued_date: NaiveDate,
    pub notes: Option<String>,
    pub ledger_record_id: i64,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One piece of a loan's repayment schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repayment {
    pub id: i64,
    pub loan_id: i64,
    /// 1-based position in the schedule, unique per loan
    pub sequence_number: u32,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub status: ObligationStatus,
    pub paid_at: Option<NaiveDate>,
    pub notes: Option<String>,
    pub ledger_record_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Payment details for settling an obligation. The payment amount may
/// differ from the scheduled amount; it overwrites it.
#[derive(Debug, Clone)]
pub struct ObligationPayment {
    pub amount: Decimal,
    pub paid_at: NaiveDate,
    pub payment_method: PaymentMethod,
    pub bank_account_id: Option<i64>,
    pub receipt_number: Option<String>,
    pub notes: Option<String>,
    pub actor: Option<String>,
}

/// Parameters for a new member payment plan
#[derive(Debug, Clone)]
pub struct PaymentPlan {
    pub member_id: i64,
    /// Total joining fee owed by the member
    pub subscription_fee: Decimal,
    /// Amount paid up front; the remainder is split into installments
    pub prepaid: Decimal,
    /// Required when a remainder exists
    pub installments_count: Option<u32>,
    /// First installment month; required when a remainder exists
    pub start_date: Option<NaiveDate>,
    /// How the prepaid portion was received; required when prepaid > 0
    pub prepaid_payment: Option<ObligationPayment>,
    pub actor: Option<String>,
}

/// Parameters for a new loan
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub member_id: i64,
    /// Principal
    pub amount: Decimal,
    pub issued_date: NaiveDate,
    pub repayments_count: u32,
    /// First repayment month
    pub start_date: NaiveDate,
    /// How the principal was paid out
    pub payment_method: PaymentMethod,
    pub bank_account_id: Option<i64>,
    pub receipt_number: Option<String>,
    pub notes: Option<String>,
    pub actor: Option<String>,
}

/// What a member owes as of a reference date
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuesSummary {
    /// Whole calendar months elapsed since the subscription date
    pub due_months: i32,
    /// Subscription rows recorded for the member (a revoked row still
    /// claims its month until it is deleted)
    pub paid_subscriptions: i64,
    pub unpaid_subscriptions: i64,
    pub unpaid_installments: i64,
    pub unpaid_repayments: i64,
    /// Expected monthly amount from the rank-fee table; 0 when the rank
    /// has no fee row. Display value, not part of the counts.
    pub expected_monthly_fee: Decimal,
}

/// Repayment progress of a loan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanStatus {
    pub paid: i64,
    pub unpaid: i64,
    pub total: i64,
    pub is_completed: bool,
}
