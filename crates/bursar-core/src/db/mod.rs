//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `accounts` - Bank account operations and the projected balance read
//! - `categories` - Transaction types (user-defined and system-seeded)
//! - `ledger` - Append/amend/retract of ledger records
//! - `members` - Member collaborator data, rank fees, financial purge
//! - `subscriptions` - Monthly membership dues
//! - `installments` - Payment plans and installment lifecycle
//! - `loans` - Loans, repayment schedules and cascade deletion
//! - `dues` - Read-side dues and loan-status queries

use chrono::{DateTime, NaiveDate, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rust_decimal::Decimal;
use tracing::info;

use crate::error::{Error, Result};
use crate::models::SystemCategory;

mod accounts;
mod categories;
mod dues;
mod installments;
mod ledger;
mod loans;
mod members;
mod subscriptions;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Environment variable for database encryption key
pub const DB_KEY_ENV: &str = "BURSAR_DB_KEY";

/// Per-connection pragmas. Foreign keys and the busy timeout are
/// connection-scoped in SQLite, so they must be set on every pooled
/// connection, not once in the migrations.
const CONN_PRAGMAS: &str = "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;";

/// Derive an encryption key from a passphrase using Argon2
///
/// Uses a fixed application salt so the same passphrase always produces the same key,
/// regardless of database path. This allows moving/renaming/restoring the database freely.
fn derive_key(passphrase: &str) -> Result<String> {
    use argon2::{password_hash::SaltString, Argon2, PasswordHasher};

    // Fixed application salt - changing this would invalidate all existing encrypted databases
    const APP_SALT: &[u8; 16] = b"bursar-salt-v1.0";

    let salt = SaltString::encode_b64(APP_SALT)
        .map_err(|e| Error::Encryption(format!("Failed to create salt: {}", e)))?;

    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| Error::Encryption(format!("Failed to derive key: {}", e)))?;

    // Extract the hash portion for use as SQLCipher key (hex encoded)
    let hash_str = hash
        .hash
        .ok_or_else(|| Error::Encryption("No hash output".to_string()))?;
    Ok(hex::encode(hash_str.as_bytes()))
}

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // SQLite stores as "YYYY-MM-DD HH:MM:SS" format
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Parse a SQLite date column
pub(crate) fn parse_date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap_or_default()
}

/// Parse a TEXT amount column into a Decimal
pub(crate) fn parse_amount(s: &str) -> Decimal {
    s.parse().unwrap_or_default()
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Create a new database connection pool with encryption
    ///
    /// Requires `BURSAR_DB_KEY` environment variable to be set.
    /// The database will be encrypted using SQLCipher with a key derived
    /// from the passphrase via Argon2.
    ///
    /// Returns an error if `BURSAR_DB_KEY` is not set. Use `new_unencrypted()`
    /// for development/testing without encryption.
    pub fn new(path: &str) -> Result<Self> {
        let encryption_key = std::env::var(DB_KEY_ENV).ok();
        match encryption_key {
            Some(key) => Self::new_with_key(path, Some(&key)),
            None => Err(Error::Encryption(format!(
                "Database encryption required. Set {} environment variable with your passphrase, \
                or use --no-encrypt for unencrypted databases (not recommended for production).",
                DB_KEY_ENV
            ))),
        }
    }

    /// Create a new unencrypted database connection pool
    ///
    /// WARNING: This creates an unencrypted database. Only use for development
    /// or testing. For production, use `new()` with `BURSAR_DB_KEY` set.
    pub fn new_unencrypted(path: &str) -> Result<Self> {
        Self::new_with_key(path, None)
    }

    /// Create a new database with an explicit encryption key
    pub fn new_with_key(path: &str, passphrase: Option<&str>) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);

        let pool = if let Some(pass) = passphrase {
            let key = derive_key(pass)?;
            let key_pragma = format!("PRAGMA key = 'x\"{}\"';", key);

            // The key pragma must run before anything else on each new connection
            let manager = manager.with_init(move |conn| {
                conn.execute_batch(&key_pragma)?;
                conn.execute_batch(CONN_PRAGMAS)?;
                Ok(())
            });

            Pool::builder().max_size(10).build(manager)?
        } else {
            let manager = manager.with_init(|conn| conn.execute_batch(CONN_PRAGMAS));
            Pool::builder().max_size(10).build(manager)?
        };

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create an in-memory database (for testing)
    ///
    /// Note: Uses a temporary file rather than `:memory:` because SQLCipher
    /// has issues with in-memory databases in the connection pool.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = format!("/tmp/bursar_test_{}_{}.db", std::process::id(), id);

        // Remove any existing file
        let _ = std::fs::remove_file(&path);

        Self::new_unencrypted(&path)
    }

    /// Check if the database is encrypted
    pub fn is_encrypted(&self) -> Result<bool> {
        let conn = self.conn()?;
        // SQLCipher sets cipher_version if encryption is active
        let result: rusqlite::Result<String> =
            conn.query_row("PRAGMA cipher_version;", [], |row| row.get(0));
        Ok(result.is_ok() && std::env::var(DB_KEY_ENV).is_ok())
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Performance pragmas for local storage
            -- WAL mode: better concurrency, readers don't block writers
            -- Note: creates -wal and -shm sidecar files alongside the database
            PRAGMA journal_mode = WAL;

            -- Synchronous NORMAL: good balance of safety and performance
            PRAGMA synchronous = NORMAL;

            -- Bank accounts with their projected balance.
            -- balance is a cached projection over the account's non-cash
            -- ledger records; amounts and balances are TEXT decimals.
            CREATE TABLE IF NOT EXISTS bank_accounts (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                balance TEXT NOT NULL DEFAULT '0',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Transaction categories. System categories are seeded below and
            -- looked up by key; user categories are CRUD-managed.
            CREATE TABLE IF NOT EXISTS transaction_types (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                kind TEXT NOT NULL,                        -- income, expense
                system_related BOOLEAN NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(name, kind)
            );

            -- Ledger records (immutable monetary events)
            CREATE TABLE IF NOT EXISTS ledger_records (
                id INTEGER PRIMARY KEY,
                amount TEXT NOT NULL,                      -- positive decimal
                kind TEXT NOT NULL,                        -- derived from the category
                transaction_type_id INTEGER NOT NULL REFERENCES transaction_types(id),
                date DATE NOT NULL,
                payment_method TEXT NOT NULL,
                bank_account_id INTEGER REFERENCES bank_accounts(id),
                receipt_number TEXT,
                notes TEXT,
                created_by TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_ledger_records_date ON ledger_records(date);
            CREATE INDEX IF NOT EXISTS idx_ledger_records_account ON ledger_records(bank_account_id);
            CREATE INDEX IF NOT EXISTS idx_ledger_records_type ON ledger_records(transaction_type_id);

            -- Members (collaborator data consumed by the engine)
            CREATE TABLE IF NOT EXISTS members (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                rank TEXT NOT NULL,
                membership_number TEXT NOT NULL UNIQUE,
                subscription_date DATE NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT 1,
                ledger_record_id INTEGER REFERENCES ledger_records(id),  -- prepaid joining fee
                created_by TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Expected monthly fee per rank
            CREATE TABLE IF NOT EXISTS rank_fees (
                id INTEGER PRIMARY KEY,
                rank TEXT NOT NULL UNIQUE,
                monthly_fee TEXT NOT NULL
            );

            -- Monthly membership dues, materialized on payment.
            -- date is always the first of the billed month.
            CREATE TABLE IF NOT EXISTS subscriptions (
                id INTEGER PRIMARY KEY,
                member_id INTEGER NOT NULL REFERENCES members(id),
                amount TEXT NOT NULL,
                date DATE NOT NULL,
                status TEXT NOT NULL DEFAULT 'unpaid',
                paid_at DATE,
                notes TEXT,
                ledger_record_id INTEGER REFERENCES ledger_records(id),
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(member_id, date)
            );

            CREATE INDEX IF NOT EXISTS idx_subscriptions_member ON subscriptions(member_id);

            -- Joining-fee installments
            CREATE TABLE IF NOT EXISTS installments (
                id INTEGER PRIMARY KEY,
                member_id INTEGER NOT NULL REFERENCES members(id),
                sequence_number INTEGER NOT NULL,
                amount TEXT NOT NULL,
                due_date DATE NOT NULL,
                status TEXT NOT NULL DEFAULT 'unpaid',
                paid_at DATE,
                notes TEXT,
                ledger_record_id INTEGER REFERENCES ledger_records(id),
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(member_id, sequence_number)
            );

            CREATE INDEX IF NOT EXISTS idx_installments_member ON installments(member_id);
            CREATE INDEX IF NOT EXISTS idx_installments_status ON installments(status);

            -- Loans; the disbursement record is required
            CREATE TABLE IF NOT EXISTS loans (
                id INTEGER PRIMARY KEY,
                member_id INTEGER NOT NULL REFERENCES members(id),
                amount TEXT NOT NULL,                      -- principal
                issued_date DATE NOT NULL,
                notes TEXT,
                ledger_record_id INTEGER NOT NULL REFERENCES ledger_records(id),
                created_by TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_loans_member ON loans(member_id);

            -- Loan repayment schedule rows
            CREATE TABLE IF NOT EXISTS repayments (
                id INTEGER PRIMARY KEY,
                loan_id INTEGER NOT NULL REFERENCES loans(id),
                sequence_number INTEGER NOT NULL,
                amount TEXT NOT NULL,
                due_date DATE NOT NULL,
                status TEXT NOT NULL DEFAULT 'unpaid',
                paid_at DATE,
                notes TEXT,
                ledger_record_id INTEGER REFERENCES ledger_records(id),
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(loan_id, sequence_number)
            );

            CREATE INDEX IF NOT EXISTS idx_repayments_loan ON repayments(loan_id);
            CREATE INDEX IF NOT EXISTS idx_repayments_status ON repayments(status);
            "#,
        )?;

        self.seed_system_categories(&conn)?;

        info!("Database schema initialized");
        Ok(())
    }

    /// Seed the fixed system transaction categories. Idempotent.
    fn seed_system_categories(&self, conn: &rusqlite::Connection) -> Result<()> {
        for category in SystemCategory::ALL {
            conn.execute(
                "INSERT OR IGNORE INTO transaction_types (name, kind, system_related) VALUES (?, ?, 1)",
                rusqlite::params![category.name(), category.kind().as_str()],
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
