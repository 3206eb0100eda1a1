use std::collections::BTreeMap;

use anyhow::Result;

use crate::listings::{Listing, SourceId};
use crate::quota::QuotaStatus;

pub fn listings_to_csv(listings: &[Listing]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "id",
        "address",
        "city",
        "zipcode",
        "price",
        "bedrooms",
        "bathrooms",
        "sqft",
        "lot_size_sqft",
        "property_type",
        "status",
        "mls_number",
        "source",
        "first_seen",
        "last_updated",
    ])?;
    for listing in listings {
        writer.write_record([
            listing.id.clone(),
            listing.address.clone(),
            listing.city.clone().unwrap_or_default(),
            listing.zipcode.clone(),
            listing.price.to_string(),
            listing.bedrooms.map(|v| v.to_string()).unwrap_or_default(),
            listing.bathrooms.map(|v| v.to_string()).unwrap_or_default(),
            listing.sqft.map(|v| v.to_string()).unwrap_or_default(),
            listing
                .lot_size_sqft
                .map(|v| v.to_string())
                .unwrap_or_default(),
            listing.property_type.clone().unwrap_or_default(),
            listing.status.clone(),
            listing.mls_number.clone().unwrap_or_default(),
            listing.source_api.to_string(),
            listing.first_seen.to_rfc3339(),
            listing.last_updated.to_rfc3339(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn quotas_to_csv(status: &BTreeMap<SourceId, QuotaStatus>) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["provider", "used", "limit", "remaining", "percentage", "reset_date"])?;
    for (source, quota) in status {
        writer.write_record([
            source.as_slug().to_string(),
            quota.used.to_string(),
            quota.limit.to_string(),
            quota.remaining.to_string(),
            format!("{:.1}", quota.percentage),
            quota.reset_date.to_rfc3339(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listings::SourceId;

    #[test]
    fn listings_csv_has_a_row_per_listing() {
        let listing = Listing::new("1", "123 Main St", "92037", 1_500_000, SourceId::Homesage);
        let csv = listings_to_csv(&[listing]).expect("csv failed");
        let lines: Vec<&str> = csv.trim().lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("id,address"));
        assert!(lines[1].contains("123 Main St"));
    }
}
