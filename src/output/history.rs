//! Inspection reports over stored runs and items

use crate::storage::{ItemRecord, RunRecord, StorageResult};

/// Formats the run history table
///
/// Runs are listed in the order given, newest first as returned by
/// `Storage::recent_runs`.
pub fn format_run_history(runs: &[RunRecord], total_items: u64) -> String {
    let rule = "-".repeat(100);
    let mut out = String::new();

    out.push_str("\nScrape Run History:\n");
    out.push_str(&format!("{}\n", rule));
    out.push_str(&format!(
        "{:<5} {:<12} {:<8} {:<8} {:<8} {:<8} {:<8} {:<8} {}\n",
        "ID", "Status", "Zip", "Radius", "Found", "Added", "Updated", "Errors", "Started"
    ));
    out.push_str(&format!("{}\n", rule));

    for run in runs {
        out.push_str(&format!(
            "{:<5} {:<12} {:<8} {:<8} {:<8} {:<8} {:<8} {:<8} {}\n",
            run.id,
            run.status.to_string(),
            run.params.zip_code,
            run.params.radius_miles,
            run.counters.items_found,
            run.counters.items_added,
            run.counters.items_updated,
            run.counters.errors,
            run.started_at.format("%Y-%m-%d %H:%M:%S")
        ));
    }
    if runs.is_empty() {
        out.push_str("No runs recorded\n");
    }

    out.push_str(&format!("{}\n", rule));
    out.push_str(&format!("Total Items:     {}\n", total_items));
    out
}

/// Formats one stored item with its pretty-printed payload
pub fn format_item(item: &ItemRecord) -> StorageResult<String> {
    let mut out = String::new();
    out.push_str(&format!("\nItem: {}\n", item.item_id));
    out.push_str(&format!("Scraped:  {}\n", item.scraped_at.to_rfc3339()));
    out.push_str(&format!("First Seen: {}\n", item.first_created_at.to_rfc3339()));
    out.push_str(&format!(
        "Zip: {}, Radius: {}\n",
        item.zip_code, item.radius_miles
    ));
    out.push_str(&format!(
        "Category: {}\n",
        item.category.as_deref().unwrap_or("all")
    ));
    out.push_str(&format!("{}\n", "-".repeat(50)));
    out.push_str("Raw JSON:\n");
    out.push_str(&serde_json::to_string_pretty(&item.raw_payload)?);
    out.push('\n');
    Ok(out)
}
