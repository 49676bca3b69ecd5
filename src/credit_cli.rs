// src/credit_cli.rs
use crate::core::database::{CreditConfig, CreditRepository, CreditUpdate, Database};
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Args)]
pub struct CreditArgs {
    #[command(subcommand)]
    pub command: CreditCommand,
}

#[derive(Subcommand)]
pub enum CreditCommand {
    /// List every known identity with its usage
    List,
    /// Show one identity, creating it with the default limit if unseen
    Show { identity: String },
    /// Overwrite usage and/or limit for one identity
    Set {
        identity: String,
        #[arg(long)]
        used: Option<i64>,
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Bulk update from a CSV file with identity,credits_used,credit_limit columns
    Import { csv_file: PathBuf },
    /// Write all accounts as CSV (stdout when no file is given)
    Export {
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

pub async fn handle_credit_command(
    args: CreditArgs,
    database_path: &Path,
    credits: &CreditConfig,
) -> Result<()> {
    let database = Database::new(database_path).await?;
    let repo = CreditRepository::new(database.pool());

    match args.command {
        CreditCommand::List => {
            let accounts = repo.list_all().await?;
            if accounts.is_empty() {
                println!("No credit accounts found.");
                return Ok(());
            }

            println!(
                "{:<40} {:>8} {:>8} {:>8}  {:<20}",
                "Identity", "Used", "Limit", "Left", "Last seen"
            );
            println!("{}", "-".repeat(90));
            for account in accounts {
                println!(
                    "{:<40} {:>8} {:>8} {:>8}  {:<20}",
                    account.identity,
                    account.credits_used,
                    account.credit_limit,
                    account.credits_left(),
                    account.last_seen.format("%Y-%m-%d %H:%M")
                );
            }
        }

        CreditCommand::Show { identity } => {
            let account = repo.get_or_create(&identity, credits.default_limit).await?;
            println!("Identity:  {}", account.identity);
            println!(
                "Credits:   {} / {} ({} left)",
                account.credits_used,
                account.credit_limit,
                account.credits_left()
            );
            println!(
                "Last seen: {}",
                account.last_seen.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }

        CreditCommand::Set {
            identity,
            used,
            limit,
        } => {
            if used.is_none() && limit.is_none() {
                anyhow::bail!("Nothing to change: pass --used and/or --limit");
            }

            let current = repo.get_or_create(&identity, credits.default_limit).await?;
            let update = CreditUpdate {
                identity: identity.clone(),
                credits_used: used.unwrap_or(current.credits_used),
                credit_limit: limit.unwrap_or(current.credit_limit),
            };
            repo.batch_update(std::slice::from_ref(&update)).await?;

            println!(
                "✅ {}: {} / {}",
                identity, update.credits_used, update.credit_limit
            );
        }

        CreditCommand::Import { csv_file } => {
            let content = tokio::fs::read_to_string(&csv_file)
                .await
                .with_context(|| format!("CSV file not found: {}", csv_file.display()))?;

            let (updates, error_count) = parse_credit_csv(&content);
            if updates.is_empty() {
                anyhow::bail!("No valid rows in {}", csv_file.display());
            }

            let saved = repo.batch_update(&updates).await?;
            info!(saved, skipped = error_count, "Credit import finished");

            println!("Import completed:");
            println!("  ✅ Saved:   {}", saved);
            println!("  ❌ Skipped: {}", error_count);
        }

        CreditCommand::Export { output } => {
            let accounts = repo.list_all().await?;
            let mut writer = csv::Writer::from_writer(Vec::new());
            for account in &accounts {
                writer.serialize(account)?;
            }
            let bytes = writer
                .into_inner()
                .map_err(|e| anyhow::anyhow!("Failed to finish CSV: {}", e))?;

            match output {
                Some(path) => {
                    tokio::fs::write(&path, &bytes)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("✅ Exported {} accounts to {}", accounts.len(), path.display());
                }
                None => std::io::stdout().write_all(&bytes)?,
            }
        }
    }

    Ok(())
}

/// Rows that fail to parse are skipped and counted.
fn parse_credit_csv(content: &str) -> (Vec<CreditUpdate>, usize) {
    let mut reader = csv::Reader::from_reader(content.as_bytes());
    let mut updates = Vec::new();
    let mut error_count = 0;

    for (index, row) in reader.deserialize::<CreditUpdate>().enumerate() {
        match row {
            Ok(update) if update.identity.trim().is_empty() => {
                error_count += 1;
                warn!(row = index + 1, "Skipping row with empty identity");
            }
            Ok(update) if update.credits_used < 0 || update.credit_limit < 0 => {
                error_count += 1;
                warn!(row = index + 1, identity = %update.identity, "Skipping negative credits");
            }
            Ok(update) => updates.push(CreditUpdate {
                identity: update.identity.trim().to_string(),
                ..update
            }),
            Err(e) => {
                error_count += 1;
                error!(row = index + 1, "CSV parsing error: {}", e);
            }
        }
    }

    (updates, error_count)
}
