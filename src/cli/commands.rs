use std::sync::Arc;

use crate::app::{AppContext, Result};
use crate::domain::{NewsRecord, RecordFilter};
use crate::ingest::RunReport;
use crate::scheduler::{WatchConfig, Watcher};
use crate::store::Store;

/// Run ingestion once and print the report.
pub async fn run_ingestion(ctx: &AppContext, json: bool) -> Result<RunReport> {
    if !json {
        println!("Ingesting {} sources...", ctx.registry().len());
    }

    let report = ctx.run_ingestion().await;
    print_report(&report, json)?;
    Ok(report)
}

pub fn print_report(report: &RunReport, json: bool) -> Result<()> {
    if json {
        println!("{}", report.to_json()?);
    } else if let Some(ref message) = report.message {
        println!("{}", message);
    } else if let Some(ref error) = report.error {
        eprintln!("Ingestion failed: {}", error);
    }
    Ok(())
}

pub fn list_sources(ctx: &AppContext) -> Result<()> {
    if ctx.registry().is_empty() {
        println!("No sources configured");
        return Ok(());
    }

    for source in ctx.registry().iter() {
        println!("[{}] {}\n  {}", source.category, source.label, source.endpoint);
    }

    Ok(())
}

/// Build the listing filter; `for_you` resolves to the user's followed categories.
pub fn record_filter<S: Store>(
    store: &S,
    category: Option<String>,
    source: Option<String>,
    for_you: Option<&str>,
    limit: usize,
) -> Result<RecordFilter> {
    let categories = match for_you {
        Some(user) => Some(store.get_interests(user)?),
        None => None,
    };

    Ok(RecordFilter {
        category,
        source,
        categories,
        limit,
    })
}

pub fn list_records(
    ctx: &AppContext,
    category: Option<String>,
    source: Option<String>,
    for_you: Option<&str>,
    limit: usize,
) -> Result<()> {
    let filter = record_filter(ctx.store.as_ref(), category, source, for_you, limit)?;

    if let (Some(user), Some(categories)) = (for_you, filter.categories.as_ref()) {
        if categories.is_empty() {
            println!("{} follows no categories; use `newsdesk interests set`", user);
            return Ok(());
        }
    }

    let records = ctx.store.list_records(&filter)?;
    if records.is_empty() {
        println!("No records");
        return Ok(());
    }

    for record in &records {
        println!("{}", format_record(record));
    }

    Ok(())
}

fn format_record(record: &NewsRecord) -> String {
    let image = if record.image_url.is_some() { " 🖼" } else { "" };
    format!(
        "{} [{}] {}{} ({})\n  {}",
        record.created_at.format("%Y-%m-%d %H:%M"),
        record.category,
        record.title,
        image,
        record.source,
        record.link
    )
}

pub fn set_interests(ctx: &AppContext, user: &str, categories: &[String]) -> Result<()> {
    let mut selected: Vec<String> = Vec::with_capacity(categories.len());
    for category in categories.iter().map(|c| c.trim()) {
        if !category.is_empty() && !selected.iter().any(|c| c == category) {
            selected.push(category.to_string());
        }
    }

    let known: Vec<&str> = ctx.registry().iter().map(|s| s.category.as_str()).collect();
    for category in &selected {
        if !known.contains(&category.as_str()) {
            eprintln!("Warning: no configured source publishes {:?}", category);
        }
    }

    ctx.store.set_interests(user, &selected)?;
    println!("{} now follows: {}", user, selected.join(", "));
    Ok(())
}

pub fn show_interests(ctx: &AppContext, user: &str) -> Result<()> {
    let categories = ctx.store.get_interests(user)?;
    if categories.is_empty() {
        println!("{} follows no categories", user);
    } else {
        println!("{}", categories.join("\n"));
    }
    Ok(())
}

pub async fn watch(ctx: AppContext, interval: &str, no_initial_run: bool) -> Result<()> {
    let interval_secs = WatchConfig::parse_interval(interval)
        .map_err(crate::app::NewsdeskError::Config)?;

    let watcher = Watcher::new(
        Arc::new(ctx),
        WatchConfig {
            interval_secs,
            run_on_start: !no_initial_run,
        },
    );
    watcher.run().await
}
