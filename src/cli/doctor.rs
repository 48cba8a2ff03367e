//! CLI `doctor` command — run database diagnostics and print a health report.

use anyhow::{Context, Result};

use segmentator::config::SegmentatorConfig;
use segmentator::db;

/// Run database diagnostics and print a health report.
pub fn doctor(config: &SegmentatorConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run `segmentator segment create <slug>` to initialize.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path)
        .map(|m| m.len())
        .unwrap_or(0);

    let conn = db::open_database(&db_path)
        .context("failed to open database (may be corrupt)")?;

    let report = db::check_database_health(&conn)
        .context("failed to run health check")?;

    let report_dir = config.report.resolved_storage_dir();

    println!("Segmentator Health Report");
    println!("=========================");
    println!();
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!("Report directory:  {}", report_dir.display());
    if !report_dir.is_dir() {
        println!("  (not created yet; the first export will create it)");
    }
    println!();
    println!("Row counts:");
    println!("  Segments:        {} ({} active)", report.segment_count, report.active_segment_count);
    println!("  Users:           {}", report.user_count);
    println!("  Relations:       {} ({} active)", report.relation_count, report.active_relation_count);
    println!();
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
        println!();
        println!("Recovery steps:");
        println!("  1. Restore from a backup: cp backup.db {}", db_path.display());
        println!("  2. Or rebuild with `sqlite3 {} .recover`", db_path.display());
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
