// src/core/database.rs
//! SQLite connection handling and the per-identity credit ledger

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{debug, info};

// ===== Core Database Connection Management =====

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database file and run migrations
    pub async fn new(database_path: &Path) -> Result<Self> {
        if let Some(parent) = database_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("Failed to create database directory")?;
            }
        }

        let database_url = format!("sqlite:{}?mode=rwc", database_path.display());
        let pool = SqlitePool::connect(&database_url).await.with_context(|| {
            format!("Failed to connect to database: {}", database_path.display())
        })?;

        info!(
            "Database connection established: {}",
            database_path.display()
        );

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_credits (
                identity TEXT PRIMARY KEY NOT NULL,
                credits_used INTEGER NOT NULL DEFAULT 0 CHECK (credits_used >= 0),
                credit_limit INTEGER NOT NULL CHECK (credit_limit >= 0),
                last_seen TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create user_credits table")?;

        info!("Database migrations completed");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Database health check failed")?;
        Ok(())
    }
}

// ===== Credit Models =====

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CreditConfig {
    /// Limit given to an identity the first time it is seen.
    pub default_limit: i64,
    /// Most jobs one analysis batch may contain.
    pub max_batch: usize,
}

impl Default for CreditConfig {
    fn default() -> Self {
        Self {
            default_limit: 50,
            max_batch: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserCreditAccount {
    pub identity: String,
    pub credits_used: i64,
    pub credit_limit: i64,
    pub last_seen: DateTime<Utc>,
}

impl UserCreditAccount {
    /// Never negative, even after an admin lowers the limit below usage.
    pub fn credits_left(&self) -> i64 {
        (self.credit_limit - self.credits_used).max(0)
    }
}

/// One row of an administrative bulk edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditUpdate {
    pub identity: String,
    pub credits_used: i64,
    pub credit_limit: i64,
}

// ===== Credit Repository =====

pub struct CreditRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CreditRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, identity: &str) -> Result<Option<UserCreditAccount>> {
        let account = sqlx::query_as::<_, UserCreditAccount>(
            r#"
            SELECT identity, credits_used, credit_limit, last_seen
            FROM user_credits
            WHERE identity = ?
            "#,
        )
        .bind(identity)
        .fetch_optional(self.pool)
        .await?;

        Ok(account)
    }

    /// Point read that writes the default record on first access
    pub async fn get_or_create(
        &self,
        identity: &str,
        default_limit: i64,
    ) -> Result<UserCreditAccount> {
        sqlx::query(
            r#"
            INSERT INTO user_credits (identity, credits_used, credit_limit, last_seen)
            VALUES (?, 0, ?, ?)
            ON CONFLICT(identity) DO NOTHING
            "#,
        )
        .bind(identity)
        .bind(default_limit)
        .bind(Utc::now())
        .execute(self.pool)
        .await?;

        self.find(identity)
            .await?
            .with_context(|| format!("Credit account vanished for identity: {}", identity))
    }

    /// Adds `amount` to `credits_used` and stamps `last_seen` in one statement.
    ///
    /// The read-modify-write happens inside SQLite, so concurrent increments for
    /// the same identity cannot lose updates.
    pub async fn increment(
        &self,
        identity: &str,
        amount: i64,
        default_limit: i64,
    ) -> Result<UserCreditAccount> {
        anyhow::ensure!(amount >= 0, "Credit increment must not be negative");

        let account = sqlx::query_as::<_, UserCreditAccount>(
            r#"
            INSERT INTO user_credits (identity, credits_used, credit_limit, last_seen)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(identity) DO UPDATE SET
                credits_used = user_credits.credits_used + excluded.credits_used,
                last_seen = excluded.last_seen
            RETURNING identity, credits_used, credit_limit, last_seen
            "#,
        )
        .bind(identity)
        .bind(amount)
        .bind(default_limit)
        .bind(Utc::now())
        .fetch_one(self.pool)
        .await
        .with_context(|| format!("Failed to update credits for identity: {}", identity))?;

        debug!(
            identity,
            amount,
            credits_used = account.credits_used,
            "Credits incremented"
        );
        Ok(account)
    }

    pub async fn list_all(&self) -> Result<Vec<UserCreditAccount>> {
        let accounts = sqlx::query_as::<_, UserCreditAccount>(
            r#"
            SELECT identity, credits_used, credit_limit, last_seen
            FROM user_credits
            ORDER BY last_seen DESC, identity ASC
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(accounts)
    }

    /// Applies every edit or none of them
    pub async fn batch_update(&self, updates: &[CreditUpdate]) -> Result<usize> {
        for update in updates {
            anyhow::ensure!(
                !update.identity.trim().is_empty(),
                "Identity must not be empty"
            );
            anyhow::ensure!(
                update.credits_used >= 0 && update.credit_limit >= 0,
                "Credits for {} must not be negative",
                update.identity
            );
        }

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        for update in updates {
            sqlx::query(
                r#"
                INSERT INTO user_credits (identity, credits_used, credit_limit, last_seen)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(identity) DO UPDATE SET
                    credits_used = excluded.credits_used,
                    credit_limit = excluded.credit_limit
                "#,
            )
            .bind(&update.identity)
            .bind(update.credits_used)
            .bind(update.credit_limit)
            .bind(now)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to save credits for {}", update.identity))?;
        }

        tx.commit().await.context("Failed to commit credit changes")?;

        info!(count = updates.len(), "Saved administrative credit changes");
        Ok(updates.len())
    }
}

// ===== Credit Service =====

pub struct CreditService<'a> {
    repo: CreditRepository<'a>,
    config: &'a CreditConfig,
}

impl<'a> CreditService<'a> {
    pub fn new(pool: &'a SqlitePool, config: &'a CreditConfig) -> Self {
        Self {
            repo: CreditRepository::new(pool),
            config,
        }
    }

    pub async fn account_for(&self, identity: &str) -> Result<UserCreditAccount> {
        self.repo
            .get_or_create(identity, self.config.default_limit)
            .await
    }

    /// Charges one credit per successful analysis. Nothing is written for zero.
    pub async fn record_successes(
        &self,
        identity: &str,
        successes: usize,
    ) -> Result<Option<UserCreditAccount>> {
        if successes == 0 {
            return Ok(None);
        }

        let amount = i64::try_from(successes).context("Success count out of range")?;
        let account = self
            .repo
            .increment(identity, amount, self.config.default_limit)
            .await?;

        info!(
            identity,
            charged = amount,
            credits_left = account.credits_left(),
            "Recorded analysis credits"
        );
        Ok(Some(account))
    }
}
