use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::listings::{derive_listing_id, normalize_property_type, Listing, SourceId};
use crate::providers::http::{f64_at, get_json, i64_at, items_at, string_at, u32_at};
use crate::providers::ListingProvider;

const BASE_URL: &str = "https://api.homesage.ai/v1";
const PAGE_LIMIT: &str = "50";

/// Homesage.ai search API, 500 credits/month free tier.
#[derive(Debug, Clone)]
pub struct HomesageProvider {
    api_key: String,
}

impl HomesageProvider {
    pub fn new(api_key: String) -> Self {
        Self { api_key }
    }

    fn parse_item(&self, item: &Value, zipcode: &str) -> Option<Listing> {
        let object = item.as_object()?;
        let address = string_at(object, "address.full_address")?;
        let price = i64_at(object, "price")?;

        let id = string_at(object, "property_id")
            .unwrap_or_else(|| derive_listing_id(&address, zipcode));
        let mut listing = Listing::new(id, address, zipcode, price, SourceId::Homesage);
        listing.city = string_at(object, "address.city");
        listing.state = string_at(object, "address.state").or_else(|| Some("CA".to_string()));
        listing.bedrooms = u32_at(object, "property_details.bedrooms");
        listing.bathrooms = f64_at(object, "property_details.bathrooms");
        listing.sqft = u32_at(object, "property_details.square_feet");
        listing.lot_size_sqft = u32_at(object, "property_details.lot_size_sqft");
        listing.year_built = u32_at(object, "property_details.year_built");
        listing.property_type = string_at(object, "property_details.property_type")
            .map(|raw| normalize_property_type(&raw));
        listing.listing_url = string_at(object, "listing_url");
        listing.photo_url = first_image(item);
        listing.mls_number = string_at(object, "mls_number");
        listing.description = string_at(object, "description");
        listing.hoa_fee = i64_at(object, "hoa_fee");
        listing.latitude = f64_at(object, "address.latitude");
        listing.longitude = f64_at(object, "address.longitude");
        Some(listing)
    }
}

fn first_image(item: &Value) -> Option<String> {
    let images = items_at(item, "images");
    images
        .first()
        .and_then(|image| image.as_object())
        .and_then(|image| string_at(image, "url"))
}

#[async_trait]
impl ListingProvider for HomesageProvider {
    fn id(&self) -> SourceId {
        SourceId::Homesage
    }

    fn name(&self) -> &str {
        "Homesage"
    }

    async fn fetch_listings(
        &self,
        zipcode: &str,
        _property_types: &[String],
        min_price: Option<i64>,
        max_price: Option<i64>,
    ) -> Result<Vec<Listing>> {
        info!("fetching Homesage listings for zipcode {zipcode}");

        let headers = [
            ("Authorization", format!("Bearer {}", self.api_key)),
            ("Content-Type", "application/json".to_string()),
        ];
        let mut query = vec![
            ("zip_code", zipcode.to_string()),
            ("status", "for_sale".to_string()),
            ("limit", PAGE_LIMIT.to_string()),
        ];
        if let Some(min_price) = min_price {
            query.push(("min_price", min_price.to_string()));
        }
        if let Some(max_price) = max_price {
            query.push(("max_price", max_price.to_string()));
        }

        let response =
            get_json(&format!("{BASE_URL}/properties/search"), &headers, &query).await?;

        let items = items_at(&response, "properties");
        let mut listings = Vec::new();
        for item in &items {
            match self.parse_item(item, zipcode) {
                Some(listing) => listings.push(listing),
                None => debug!("skipping malformed Homesage record for {zipcode}"),
            }
        }

        info!("parsed {} listings from Homesage for {zipcode}", listings.len());
        Ok(listings)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn records_map_and_malformed_ones_drop() {
        let provider = HomesageProvider::new("key".to_string());
        let good = json!({
            "property_id": "hs-3",
            "price": 1_850_000,
            "address": {
                "full_address": "789 Ocean Blvd, San Diego, CA 92107",
                "city": "San Diego",
                "longitude": -117.25
            },
            "property_details": {
                "bedrooms": 3,
                "lot_size_sqft": 9200,
                "property_type": "Detached"
            },
            "mls_number": "MLS789",
            "images": [{"url": "https://example.com/hs.jpg"}]
        });
        let listing = provider.parse_item(&good, "92107").expect("record dropped");
        assert_eq!(listing.id, "hs-3");
        assert_eq!(listing.lot_size_sqft, Some(9_200));
        assert_eq!(listing.property_type.as_deref(), Some("single_family"));
        assert_eq!(listing.photo_url.as_deref(), Some("https://example.com/hs.jpg"));

        let no_price = json!({
            "address": {"full_address": "1 Somewhere Ln"}
        });
        assert!(provider.parse_item(&no_price, "92107").is_none());
    }
}
