use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use liblnpos::types::{TransactionStatus, TransactionType};
use liblnpos::{Database, Transaction, TransactionQuery};

#[derive(Parser, Debug)]
#[command(name = "lnpos-history")]
#[command(version, about = "Query the local transaction ledger")]
#[command(long_about = r#"Query the local transaction ledger with filtering and formatting options.

EXAMPLES:
    # Show last 20 transactions (default)
    lnpos-history

    # Show more transactions
    lnpos-history --limit 50

    # Filter by transaction type
    lnpos-history --type lightning
    lnpos-history --type rewards-only
    lnpos-history --type standalone

    # Filter by status
    lnpos-history --status completed
    lnpos-history --status failed

    # Filter by date range
    lnpos-history --since "2025-10-01" --until "2025-10-05"
    lnpos-history --since "2025-10-01T09:00:00Z"

    # Search memos
    lnpos-history --search "americano"

    # Combine filters
    lnpos-history --type lightning --since "2025-10-01" --limit 10

    # JSON output for scripting
    lnpos-history --format json
    lnpos-history --format json | jq '.[] | .sat_amount'
    lnpos-history --format json | jq '.[] | select(.reward_sats != null)'

    # JSONL output (one JSON object per line)
    lnpos-history --format jsonl

    # Export to CSV for analysis
    lnpos-history --format csv > sales.csv
    lnpos-history --format csv | cut -d, -f3 | sort | uniq -c

OUTPUT FORMATS:
    text  - Human-readable text with timestamps and reward details (default)
    json  - JSON array (complete data structure)
    jsonl - JSON lines, one object per line (streaming-friendly)
    csv   - CSV with headers (spreadsheet-compatible)

EXIT CODES:
    0 - Success (including empty results)
    1 - Error (ledger not found, query failed, etc.)
"#)]
struct Args {
    /// Filter by transaction type
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    #[arg(help = "Filter results to one transaction type (lightning, rewards-only, or standalone)")]
    #[arg(value_parser = ["lightning", "rewards-only", "standalone"])]
    transaction_type: Option<String>,

    /// Filter by status
    #[arg(long, value_name = "STATUS")]
    #[arg(help = "Filter results to one status (pending, completed, or failed)")]
    #[arg(value_parser = ["pending", "completed", "failed"])]
    status: Option<String>,

    /// Filter transactions since this date (Unix timestamp or ISO 8601 format)
    #[arg(long, value_name = "DATE")]
    #[arg(help = "Show transactions since this date (Unix timestamp, YYYY-MM-DD, or ISO 8601 format)")]
    since: Option<String>,

    /// Filter transactions until this date (Unix timestamp or ISO 8601 format)
    #[arg(long, value_name = "DATE")]
    #[arg(help = "Show transactions until this date (Unix timestamp, YYYY-MM-DD, or ISO 8601 format)")]
    until: Option<String>,

    /// Search transactions by memo
    #[arg(short, long, value_name = "TERM")]
    #[arg(help = "Search transactions whose memo contains this text (case-insensitive substring match)")]
    search: Option<String>,

    /// Maximum number of transactions to return
    #[arg(short, long, default_value = "20", value_name = "N")]
    #[arg(help = "Maximum number of transactions to return (default: 20)")]
    limit: usize,

    /// Output format
    #[arg(short, long, default_value = "text", value_name = "FORMAT")]
    #[arg(help = "Output format: text (human-readable), json (array), jsonl (streaming), or csv (spreadsheet)")]
    #[arg(value_parser = ["text", "json", "jsonl", "csv"])]
    format: String,
}

/// One ledger line in machine-readable output
///
/// The full transaction record carries invoice internals that scripts have
/// no business seeing; this is the flat view the CLI exposes.
#[derive(Debug, Serialize)]
struct LedgerRow {
    id: String,
    timestamp: i64,
    #[serde(rename = "type")]
    transaction_type: String,
    payment_method: Option<String>,
    status: String,
    sat_amount: i64,
    display_amount: String,
    currency: String,
    merchant: String,
    reward_sats: Option<i64>,
    memo: Option<String>,
}

impl From<&Transaction> for LedgerRow {
    fn from(transaction: &Transaction) -> Self {
        Self {
            id: transaction.id.clone(),
            timestamp: transaction.timestamp.timestamp(),
            transaction_type: transaction.transaction_type.to_string(),
            payment_method: transaction.payment_method.map(|m| m.to_string()),
            status: transaction.status.to_string(),
            sat_amount: transaction.amount.sat_amount,
            display_amount: transaction.amount.display_amount.clone(),
            currency: transaction.amount.currency.id.clone(),
            merchant: transaction.merchant.username.clone(),
            reward_sats: transaction.reward.as_ref().map(|r| r.reward_amount),
            memo: transaction.memo.clone(),
        }
    }
}

/// Parse date string to Unix timestamp
fn parse_date(date_str: &str) -> Result<i64> {
    // Try parsing as Unix timestamp first
    if let Ok(timestamp) = date_str.parse::<i64>() {
        return Ok(timestamp);
    }

    // Try parsing as ISO 8601
    let dt = chrono::DateTime::parse_from_rfc3339(date_str)
        .or_else(|_| {
            // Try parsing as date only (YYYY-MM-DD)
            chrono::NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
                .map(|d| d.and_hms_opt(0, 0, 0).unwrap().and_utc().fixed_offset())
        })
        .context(format!("Invalid date format: {}. Use Unix timestamp or ISO 8601 (YYYY-MM-DD or YYYY-MM-DDTHH:MM:SSZ)", date_str))?;

    Ok(dt.timestamp())
}

fn print_text(transactions: &[Transaction]) {
    for transaction in transactions {
        let dt = chrono::DateTime::from_timestamp(transaction.timestamp.timestamp(), 0)
            .unwrap_or_else(chrono::Utc::now);
        let timestamp = dt.format("%Y-%m-%d %H:%M:%S");

        let symbol = match transaction.status {
            TransactionStatus::Completed => "✓",
            TransactionStatus::Failed => "✗",
            TransactionStatus::Pending => "…",
        };

        println!(
            "{} {} | {} | {} sats | {}",
            symbol,
            timestamp,
            transaction.transaction_type,
            transaction.amount.sat_amount,
            transaction.id
        );

        if let Some(ref memo) = transaction.memo {
            println!("  memo: {}", memo);
        }
        if let Some(ref reward) = transaction.reward {
            if reward.is_standalone {
                println!("  reward: {} sats (standalone)", reward.reward_amount);
            } else {
                println!(
                    "  reward: {} sats ({:.1}%)",
                    reward.reward_amount,
                    reward.reward_rate * 100.0
                );
            }
        }
        println!(); // Blank line between entries
    }
}

fn print_csv(rows: &[LedgerRow]) {
    println!("id,timestamp,type,payment_method,status,sat_amount,display_amount,currency,merchant,reward_sats,memo");
    for row in rows {
        let payment_method = row.payment_method.as_deref().unwrap_or("");
        let reward_sats = row
            .reward_sats
            .map(|r| r.to_string())
            .unwrap_or_default();
        let memo = row.memo.as_deref().unwrap_or("").replace('"', "\"\""); // Escape quotes

        println!(
            "{},{},{},{},{},{},{},{},{},{},\"{}\"",
            row.id,
            row.timestamp,
            row.transaction_type,
            payment_method,
            row.status,
            row.sat_amount,
            row.display_amount,
            row.currency,
            row.merchant,
            reward_sats,
            memo
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    liblnpos::logging::init_default();

    let args = Args::parse();

    tracing::debug!("lnpos-history started with args: {:?}", args);

    // Get database path from config or use default
    let config = liblnpos::config::Config::load().context("Failed to load configuration")?;

    let db_path = shellexpand::tilde(&config.database.path).to_string();

    // Check if the ledger exists
    if !std::path::Path::new(&db_path).exists() {
        eprintln!("Error: Transaction ledger not found at {}", db_path);
        eprintln!("Have you recorded any sales yet? Try: lnpos-setup");
        std::process::exit(1);
    }

    let db = Database::new(&db_path)
        .await
        .context("Failed to open the transaction ledger")?;

    // Parse date arguments
    let since = if let Some(ref since_str) = args.since {
        Some(parse_date(since_str)?)
    } else {
        None
    };

    let until = if let Some(ref until_str) = args.until {
        Some(parse_date(until_str)?)
    } else {
        None
    };

    // Build query; the value parsers only let valid names through
    let query = TransactionQuery {
        transaction_type: args
            .transaction_type
            .as_deref()
            .and_then(TransactionType::parse),
        status: args.status.as_deref().and_then(TransactionStatus::parse),
        since,
        until,
        search: args.search,
        limit: Some(args.limit),
        offset: None,
    };

    // Execute query
    let transactions = db
        .query_transactions(&query)
        .await
        .context("Failed to query the ledger")?;

    // Output results based on format
    match args.format.as_str() {
        "json" => {
            let rows: Vec<LedgerRow> = transactions.iter().map(LedgerRow::from).collect();
            let json = serde_json::to_string_pretty(&rows)?;
            println!("{}", json);
        }
        "jsonl" => {
            for transaction in &transactions {
                let json = serde_json::to_string(&LedgerRow::from(transaction))?;
                println!("{}", json);
            }
        }
        "csv" => {
            let rows: Vec<LedgerRow> = transactions.iter().map(LedgerRow::from).collect();
            print_csv(&rows);
        }
        "text" => {
            // Empty results print nothing and still exit 0
            print_text(&transactions);
        }
        _ => {
            eprintln!(
                "Error: Invalid format '{}'. Valid formats: text, json, jsonl, csv",
                args.format
            );
            std::process::exit(1);
        }
    }

    Ok(())
}
