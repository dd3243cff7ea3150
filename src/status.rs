//! Index status overview.
//!
//! `repochat status` reports what the last `index` run left behind: record
//! count, embedding models and dimensions, and when the table was last
//! written. Needs no credentials and makes no network calls.

use anyhow::Result;

use crate::config::Config;
use crate::db;
use crate::store::sqlite;

/// Run the status command: read the table and print a summary.
pub async fn run_status(config: &Config) -> Result<()> {
    if !config.db.path.exists() {
        println!("No index at {}", config.db.path.display());
        println!("Run 'repochat index' to build one.");
        return Ok(());
    }

    let pool = db::connect(&config.db.path).await?;
    let stats = sqlite::table_stats(&pool).await?;
    pool.close().await;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("repochat index status");
    println!("=====================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Records:     {}", stats.records);
    println!(
        "  Last index:  {}",
        stats
            .last_indexed_at
            .map(format_ts_relative)
            .unwrap_or_else(|| "never".to_string())
    );

    if !stats.models.is_empty() {
        println!();
        println!("  {:<28} {:>6} {:>8}", "MODEL", "DIMS", "RECORDS");
        println!("  {}", "-".repeat(44));
        for (model, dims, n) in &stats.models {
            println!("  {:<28} {:>6} {:>8}", model, dims, n);
        }
        if stats
            .models
            .iter()
            .any(|(m, d, _)| m != &config.embedding.model || *d as usize != config.embedding.dims)
        {
            println!();
            println!(
                "  Note: configured model is {} ({} dims); rows from other models are not searched.",
                config.embedding.model, config.embedding.dims
            );
        }
    }

    println!();
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp relative to now (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;
    match delta {
        d if d < 0 => format_ts_iso(ts),
        d if d < 60 => "just now".to_string(),
        d if d < 3600 => plural(d / 60, "min"),
        d if d < 86400 => plural(d / 3600, "hour"),
        d if d < 86400 * 30 => plural(d / 86400, "day"),
        _ => format_ts_iso(ts),
    }
}

fn plural(n: i64, unit: &str) -> String {
    format!("{} {}{} ago", n, unit, if n == 1 { "" } else { "s" })
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_human_readable() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn relative_timestamps() {
        let now = chrono::Utc::now().timestamp();
        assert_eq!(format_ts_relative(now), "just now");
        assert_eq!(format_ts_relative(now - 120), "2 mins ago");
        assert_eq!(format_ts_relative(now - 3600), "1 hour ago");
        assert_eq!(format_ts_relative(0), "1970-01-01 00:00");
    }
}
