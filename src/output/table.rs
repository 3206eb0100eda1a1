use std::collections::BTreeMap;

use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::listings::{Listing, SourceId};
use crate::notify::render::format_price;
use crate::pipeline::CycleReport;
use crate::quota::QuotaStatus;

pub fn render_listings_table(listings: &[Listing]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Address", "Zip", "Price", "Beds", "Baths", "Sqft", "Lot", "Type", "Status", "Source",
    ]);

    for listing in listings {
        table.add_row(Row::from(vec![
            Cell::new(&listing.address),
            Cell::new(&listing.zipcode),
            Cell::new(format!("${}", format_price(listing.price))),
            Cell::new(opt_num(listing.bedrooms)),
            Cell::new(
                listing
                    .bathrooms
                    .map(|b| format!("{b}"))
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(opt_num(listing.sqft)),
            Cell::new(opt_num(listing.lot_size_sqft)),
            Cell::new(listing.property_type.as_deref().unwrap_or("-")),
            status_cell(&listing.status),
            Cell::new(listing.source_api.to_string()),
        ]));
    }
    table.to_string()
}

pub fn render_quota_table(status: &BTreeMap<SourceId, QuotaStatus>) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Provider", "Used", "Limit", "Remaining", "Used %", "Resets"]);

    for (source, quota) in status {
        let used_pct = format!("{:.1}%", quota.percentage);
        let pct_cell = if quota.percentage >= 90.0 {
            Cell::new(used_pct).fg(Color::Red)
        } else if quota.percentage >= 70.0 {
            Cell::new(used_pct).fg(Color::Yellow)
        } else {
            Cell::new(used_pct).fg(Color::Green)
        };
        table.add_row(Row::from(vec![
            Cell::new(source.to_string()),
            Cell::new(quota.used.to_string()),
            Cell::new(quota.limit.to_string()),
            Cell::new(quota.remaining.to_string()),
            pct_cell,
            Cell::new(quota.reset_date.format("%Y-%m-%d").to_string()),
        ]));
    }
    table.to_string()
}

pub fn render_cycle_table(report: &CycleReport) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Metric", "Value"]);

    let rows = [
        ("Started at", report.started_at.format("%Y-%m-%d %H:%M:%S").to_string()),
        ("Fetched", report.fetched_total.to_string()),
        ("Duplicates removed", report.duplicates_removed.to_string()),
        ("After filters", report.filtered_count.to_string()),
        ("New", report.stats.new_count.to_string()),
        ("Removed", report.stats.removed_count.to_string()),
        ("Price changes", report.stats.price_changes_count.to_string()),
        ("Status changes", report.stats.status_changes_count.to_string()),
        ("Notified", report.notified_count.to_string()),
    ];
    for (metric, value) in rows {
        table.add_row(Row::from(vec![Cell::new(metric), Cell::new(value)]));
    }
    table.to_string()
}

fn opt_num(value: Option<u32>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn status_cell(status: &str) -> Cell {
    match status {
        "active" => Cell::new(status).fg(Color::Green),
        "pending" => Cell::new(status).fg(Color::Yellow),
        "sold" => Cell::new(status).fg(Color::Red),
        other => Cell::new(other),
    }
}
