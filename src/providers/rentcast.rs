use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::listings::{derive_listing_id, normalize_property_type, Listing, SourceId};
use crate::providers::http::{f64_at, get_json, i64_at, items_at, string_at, u32_at};
use crate::providers::ListingProvider;

const BASE_URL: &str = "https://api.rentcast.io/v1";
const PAGE_LIMIT: &str = "50";

/// RentCast property database, 50 calls/month on the free tier.
///
/// The free tier returns property records rather than active MLS listings;
/// records that carry no asking price are skipped since the pipeline is
/// price-driven.
#[derive(Debug, Clone)]
pub struct RentCastProvider {
    api_key: String,
}

impl RentCastProvider {
    pub fn new(api_key: String) -> Self {
        Self { api_key }
    }

    fn parse_item(&self, item: &Value, zipcode: &str) -> Option<Listing> {
        let object = item.as_object()?;
        let address = string_at(object, "formattedAddress")?;
        let Some(price) = i64_at(object, "price") else {
            debug!("skipping RentCast record {address}: no listing price");
            return None;
        };

        let id = string_at(object, "id").unwrap_or_else(|| derive_listing_id(&address, zipcode));
        let mut listing = Listing::new(id, address, zipcode, price, SourceId::RentCast);
        listing.city = string_at(object, "city");
        listing.state = string_at(object, "state").or_else(|| Some("CA".to_string()));
        listing.bedrooms = u32_at(object, "bedrooms");
        listing.bathrooms = f64_at(object, "bathrooms");
        listing.sqft = u32_at(object, "squareFootage");
        listing.lot_size_sqft = u32_at(object, "lotSize");
        listing.year_built = u32_at(object, "yearBuilt");
        listing.property_type = string_at(object, "propertyType")
            .map(|raw| normalize_property_type(&raw));
        listing.latitude = f64_at(object, "latitude");
        listing.longitude = f64_at(object, "longitude");
        Some(listing)
    }
}

#[async_trait]
impl ListingProvider for RentCastProvider {
    fn id(&self) -> SourceId {
        SourceId::RentCast
    }

    fn name(&self) -> &str {
        "RentCast"
    }

    async fn fetch_listings(
        &self,
        zipcode: &str,
        _property_types: &[String],
        _min_price: Option<i64>,
        _max_price: Option<i64>,
    ) -> Result<Vec<Listing>> {
        info!("fetching RentCast property data for zipcode {zipcode}");

        let headers = [("X-Api-Key", self.api_key.clone())];
        let query = [
            ("zipCode", zipcode.to_string()),
            ("limit", PAGE_LIMIT.to_string()),
        ];
        let response = get_json(&format!("{BASE_URL}/properties"), &headers, &query).await?;

        // The endpoint answers with a bare array; tolerate a wrapped shape.
        let items = items_at(&response, "properties");
        let listings: Vec<Listing> = items
            .iter()
            .filter_map(|item| self.parse_item(item, zipcode))
            .collect();

        info!(
            "RentCast returned {} records for {zipcode}, {} usable listings",
            items.len(),
            listings.len()
        );
        Ok(listings)
    }
}
