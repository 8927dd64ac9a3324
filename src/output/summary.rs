//! Plain-text run summary

use crate::state::RunSummary;

const RULE_WIDTH: usize = 60;

/// Formats a run summary as an aligned text block
///
/// # Arguments
///
/// * `summary` - The closed run to report
///
/// # Returns
///
/// The report text, ending with a newline
pub fn format_summary(summary: &RunSummary) -> String {
    let heavy = "=".repeat(RULE_WIDTH);
    let light = "-".repeat(RULE_WIDTH);
    let params = &summary.params;

    let duration = summary
        .duration()
        .map(|d| format!("{:.2} seconds", d.num_milliseconds() as f64 / 1000.0))
        .unwrap_or_else(|| "unknown".to_string());
    let categories = if params.categories.is_empty() {
        "all".to_string()
    } else {
        params.categories.join(", ")
    };

    let mut out = String::new();
    out.push_str(&format!("\n{}\n", heavy));
    out.push_str("SCRAPE RUN SUMMARY\n");
    out.push_str(&format!("{}\n", heavy));
    out.push_str(&format!("Run ID:          {}\n", summary.run_id));
    out.push_str(&format!("Status:          {}\n", summary.status));
    out.push_str(&format!("Duration:        {}\n", duration));
    out.push_str(&format!("{}\n", light));
    out.push_str(&format!("Zip Code:        {}\n", params.zip_code));
    out.push_str(&format!("Radius:          {} miles\n", params.radius_miles));
    out.push_str(&format!(
        "Test Mode:       {}\n",
        if params.test_mode { "Yes" } else { "No" }
    ));
    out.push_str(&format!("Categories:      {}\n", categories));
    if let Some(term) = &params.search_term {
        out.push_str(&format!("Search Term:     {}\n", term));
    }
    out.push_str(&format!("{}\n", light));
    out.push_str(&format!("Pages Scraped:   {}\n", summary.pages_scraped));
    out.push_str(&format!("Items Found:     {}\n", summary.items_found));
    out.push_str(&format!("Items Added:     {}\n", summary.items_added));
    out.push_str(&format!("Items Updated:   {}\n", summary.items_updated));
    out.push_str(&format!("Errors:          {}\n", summary.errors));
    out.push_str(&format!("{}\n", heavy));
    out
}

/// Prints the run summary to stdout
pub fn print_summary(summary: &RunSummary) {
    print!("{}", format_summary(summary));
}
