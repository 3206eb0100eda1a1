use crate::listings::Listing;

pub fn new_listings_subject(listings: &[Listing]) -> String {
    if listings.len() == 1 {
        let listing = &listings[0];
        return format!(
            "New Listing Alert: {} - ${}",
            listing.address,
            format_price(listing.price)
        );
    }

    let total: i64 = listings.iter().map(|l| l.price).sum();
    let average = total / listings.len() as i64;
    format!(
        "{} New Listings in San Diego Coastal Areas (avg ${})",
        listings.len(),
        format_price(average)
    )
}

/// Compact HTML digest, cheapest listing first.
pub fn new_listings_html(listings: &[Listing]) -> String {
    let mut sorted: Vec<&Listing> = listings.iter().collect();
    sorted.sort_by_key(|l| l.price);

    let cards: String = sorted.iter().map(|listing| listing_card(listing)).collect();
    format!(
        "<html><body style=\"font-family: sans-serif; color: #333;\">\
         <h2>{} new listing{}</h2>{cards}</body></html>",
        listings.len(),
        if listings.len() == 1 { "" } else { "s" }
    )
}

fn listing_card(listing: &Listing) -> String {
    let mut details = Vec::new();
    if let Some(bedrooms) = listing.bedrooms {
        details.push(format!("{bedrooms} bd"));
    }
    if let Some(bathrooms) = listing.bathrooms {
        details.push(format!("{bathrooms} ba"));
    }
    if let Some(sqft) = listing.sqft {
        details.push(format!("{sqft} sqft"));
    }
    if let Some(lot) = listing.lot_size_sqft {
        details.push(format!("{lot} sqft lot"));
    }
    let details = details.join(" | ");

    let location = listing
        .city
        .as_deref()
        .map(|city| format!("{city}, {}", listing.zipcode))
        .unwrap_or_else(|| listing.zipcode.clone());

    let link = listing
        .listing_url
        .as_deref()
        .map(|url| format!("<p><a href=\"{url}\">View listing</a></p>"))
        .unwrap_or_default();

    format!(
        "<div style=\"border: 1px solid #ddd; border-radius: 6px; padding: 12px; margin: 12px 0;\">\
         <h3 style=\"margin: 0;\">${}</h3>\
         <p style=\"margin: 4px 0;\">{} ({location})</p>\
         <p style=\"margin: 4px 0; color: #666;\">{details}</p>{link}</div>",
        format_price(listing.price),
        listing.address
    )
}

pub fn error_subject() -> String {
    "Listing check failed".to_string()
}

pub fn error_html(message: &str) -> String {
    format!(
        "<html><body style=\"font-family: sans-serif;\">\
         <h2>Listing check failed</h2><pre>{message}</pre></body></html>"
    )
}

pub fn format_price(value: i64) -> String {
    let digits = value.abs().to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if value < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listings::SourceId;

    fn listing(id: &str, price: i64) -> Listing {
        Listing::new(id, format!("{id} Shore Dr"), "92037", price, SourceId::Homesage)
    }

    #[test]
    fn prices_group_thousands() {
        assert_eq!(format_price(950), "950");
        assert_eq!(format_price(1_500_000), "1,500,000");
        assert_eq!(format_price(-42_000), "-42,000");
    }

    #[test]
    fn single_listing_subject_names_the_address() {
        let subject = new_listings_subject(&[listing("123", 1_500_000)]);
        assert!(subject.contains("123 Shore Dr"));
        assert!(subject.contains("1,500,000"));
    }

    #[test]
    fn multi_listing_subject_reports_count_and_average() {
        let subject = new_listings_subject(&[listing("1", 1_000_000), listing("2", 2_000_000)]);
        assert!(subject.starts_with("2 New Listings"));
        assert!(subject.contains("1,500,000"));
    }

    #[test]
    fn body_orders_cheapest_first() {
        let html = new_listings_html(&[listing("pricey", 3_000_000), listing("cheap", 1_000_000)]);
        let cheap_at = html.find("cheap Shore Dr").expect("cheap card missing");
        let pricey_at = html.find("pricey Shore Dr").expect("pricey card missing");
        assert!(cheap_at < pricey_at);
    }
}
