use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::listings::{derive_listing_id, normalize_property_type, Listing, SourceId};
use crate::providers::http::{f64_at, get_json, i64_at, items_at, string_at, u32_at};
use crate::providers::ListingProvider;

const BASE_URL: &str = "https://us-real-estate.p.rapidapi.com";
const RAPIDAPI_HOST: &str = "us-real-estate.p.rapidapi.com";
const PAGE_LIMIT: &str = "50";

/// RapidAPI "US Real Estate" for-sale feed, 100 calls/month free tier.
#[derive(Debug, Clone)]
pub struct RapidApiProvider {
    api_key: String,
}

impl RapidApiProvider {
    pub fn new(api_key: String) -> Self {
        Self { api_key }
    }

    fn parse_item(&self, item: &Value, zipcode: &str) -> Option<Listing> {
        let object = item.as_object()?;
        let address = string_at(object, "location.address.line")?;
        let price = i64_at(object, "list_price")?;

        let id = string_at(object, "property_id")
            .unwrap_or_else(|| derive_listing_id(&address, zipcode));
        let mut listing = Listing::new(id, address, zipcode, price, SourceId::RapidApi);
        listing.city = string_at(object, "location.address.city");
        listing.state =
            string_at(object, "location.address.state").or_else(|| Some("CA".to_string()));
        listing.bedrooms = u32_at(object, "description.beds");
        listing.bathrooms = f64_at(object, "description.baths");
        listing.sqft = u32_at(object, "description.sqft");
        listing.lot_size_sqft = u32_at(object, "description.lot_sqft");
        listing.year_built = u32_at(object, "description.year_built");
        listing.property_type = string_at(object, "description.type")
            .map(|raw| normalize_property_type(&raw));
        listing.listing_url = string_at(object, "href");
        listing.photo_url = first_photo(item);
        listing.mls_number = string_at(object, "mls.id");
        listing.description = string_at(object, "description.text");
        listing.hoa_fee = i64_at(object, "hoa.fee");
        listing.latitude = f64_at(object, "location.address.coordinate.lat");
        listing.longitude = f64_at(object, "location.address.coordinate.lon");
        Some(listing)
    }

    fn map_property_types(&self, property_types: &[String]) -> String {
        let known = ["single_family", "multi_family", "condo", "townhouse"];
        let mapped: Vec<&str> = property_types
            .iter()
            .map(String::as_str)
            .filter(|pt| known.contains(pt))
            .collect();
        if mapped.is_empty() {
            "single_family,multi_family".to_string()
        } else {
            mapped.join(",")
        }
    }
}

fn first_photo(item: &Value) -> Option<String> {
    let photos = items_at(item, "photos");
    photos
        .first()
        .and_then(|photo| photo.as_object())
        .and_then(|photo| string_at(photo, "href"))
}

#[async_trait]
impl ListingProvider for RapidApiProvider {
    fn id(&self) -> SourceId {
        SourceId::RapidApi
    }

    fn name(&self) -> &str {
        "RapidAPI"
    }

    async fn fetch_listings(
        &self,
        zipcode: &str,
        property_types: &[String],
        min_price: Option<i64>,
        max_price: Option<i64>,
    ) -> Result<Vec<Listing>> {
        info!("fetching RapidAPI listings for zipcode {zipcode}");

        let headers = [
            ("X-RapidAPI-Key", self.api_key.clone()),
            ("X-RapidAPI-Host", RAPIDAPI_HOST.to_string()),
        ];
        let mut query = vec![
            ("postal_code", zipcode.to_string()),
            ("status", "for_sale".to_string()),
            ("limit", PAGE_LIMIT.to_string()),
            ("offset", "0".to_string()),
            ("property_type", self.map_property_types(property_types)),
        ];
        if let Some(min_price) = min_price {
            query.push(("price_min", min_price.to_string()));
        }
        if let Some(max_price) = max_price {
            query.push(("price_max", max_price.to_string()));
        }

        let response = get_json(&format!("{BASE_URL}/v2/for-sale"), &headers, &query).await?;

        let items = items_at(&response, "data.results");
        let mut listings = Vec::new();
        for item in &items {
            match self.parse_item(item, zipcode) {
                Some(listing) => listings.push(listing),
                None => debug!("skipping malformed RapidAPI record for {zipcode}"),
            }
        }

        info!("parsed {} listings from RapidAPI for {zipcode}", listings.len());
        Ok(listings)
    }
}
