use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Two records describing the same property may carry slightly different
/// asking prices depending on when each source scraped the MLS feed.
pub const PRICE_TOLERANCE: i64 = 1000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceId {
    #[serde(rename = "rentcast")]
    RentCast,
    #[serde(rename = "rapidapi")]
    RapidApi,
    #[serde(rename = "homesage")]
    Homesage,
}

impl SourceId {
    pub const ALL: [SourceId; 3] = [SourceId::RentCast, SourceId::RapidApi, SourceId::Homesage];

    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::RentCast => "rentcast",
            Self::RapidApi => "rapidapi",
            Self::Homesage => "homesage",
        }
    }
}

impl Display for SourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let display = match self {
            Self::RentCast => "RentCast",
            Self::RapidApi => "RapidAPI",
            Self::Homesage => "Homesage",
        };
        write!(f, "{display}")
    }
}

#[derive(Debug, Error)]
#[error("unknown listing source: {0}")]
pub struct SourceParseError(pub String);

impl FromStr for SourceId {
    type Err = SourceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "rentcast" => Ok(Self::RentCast),
            "rapidapi" | "rapid_api" | "us-real-estate" => Ok(Self::RapidApi),
            "homesage" => Ok(Self::Homesage),
            _ => Err(SourceParseError(s.to_string())),
        }
    }
}

/// One property record as reported by a single upstream source.
///
/// `id` is the storage key and never changes after creation; neither does
/// `first_seen`. Every optional field is genuinely optional upstream, and
/// absence is distinct from zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub address: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zipcode: String,
    pub price: i64,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<f64>,
    pub sqft: Option<u32>,
    pub lot_size_sqft: Option<u32>,
    pub year_built: Option<u32>,
    pub hoa_fee: Option<i64>,
    pub parking_spaces: Option<u32>,
    pub property_type: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
    pub listing_url: Option<String>,
    pub photo_url: Option<String>,
    pub mls_number: Option<String>,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub source_api: SourceId,
    pub first_seen: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

fn default_status() -> String {
    "active".to_string()
}

impl Listing {
    pub fn new(
        id: impl Into<String>,
        address: impl Into<String>,
        zipcode: impl Into<String>,
        price: i64,
        source_api: SourceId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            address: address.into(),
            city: None,
            state: None,
            zipcode: zipcode.into(),
            price,
            bedrooms: None,
            bathrooms: None,
            sqft: None,
            lot_size_sqft: None,
            year_built: None,
            hoa_fee: None,
            parking_spaces: None,
            property_type: None,
            status: default_status(),
            listing_url: None,
            photo_url: None,
            mls_number: None,
            description: None,
            latitude: None,
            longitude: None,
            source_api,
            first_seen: now,
            last_updated: now,
        }
    }
}

/// Real-world-property identity: do two records describe the same physical
/// property? Looser than storage identity (exact `id` equality) and used
/// only for aggregation-time diagnostics, never as the map key.
pub fn same_property(a: &Listing, b: &Listing) -> bool {
    a.address.trim().to_lowercase() == b.address.trim().to_lowercase()
        && a.zipcode == b.zipcode
        && (a.price - b.price).abs() < PRICE_TOLERANCE
}

/// Maps free-text property type strings from the upstream APIs onto the
/// closed category set. Unrecognized text passes through unchanged.
pub fn normalize_property_type(raw: &str) -> String {
    let lower = raw.to_lowercase();
    if ["single", "detached", "sfr"].iter().any(|x| lower.contains(x)) {
        "single_family".to_string()
    } else if ["multi", "duplex", "triplex", "fourplex"]
        .iter()
        .any(|x| lower.contains(x))
    {
        "multi_family".to_string()
    } else if lower.contains("condo") || lower.contains("townhouse") {
        "condo".to_string()
    } else if lower.contains("apartment") {
        "apartment".to_string()
    } else {
        raw.to_string()
    }
}

/// Stable fallback id for sources that do not supply their own property id.
pub fn derive_listing_id(address: &str, zipcode: &str) -> String {
    let key = format!("{}_{}", address.trim().to_lowercase(), zipcode);
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..12].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_types_collapse_to_known_categories() {
        assert_eq!(normalize_property_type("Single Family Residence"), "single_family");
        assert_eq!(normalize_property_type("SFR"), "single_family");
        assert_eq!(normalize_property_type("Duplex"), "multi_family");
        assert_eq!(normalize_property_type("Townhouse"), "condo");
        assert_eq!(normalize_property_type("Apartment Building"), "apartment");
        assert_eq!(normalize_property_type("Houseboat"), "Houseboat");
    }

    #[test]
    fn same_property_tolerates_small_price_differences() {
        let a = Listing::new("a", "123 Main St", "92037", 1_500_000, SourceId::RentCast);
        let mut b = Listing::new("b", "123 MAIN ST", "92037", 1_500_500, SourceId::RapidApi);
        assert!(same_property(&a, &b));

        b.price = 1_502_000;
        assert!(!same_property(&a, &b));

        b.price = a.price;
        b.zipcode = "92109".to_string();
        assert!(!same_property(&a, &b));
    }

    #[test]
    fn derived_ids_are_stable_and_case_insensitive() {
        let a = derive_listing_id("123 Main St", "92037");
        let b = derive_listing_id("  123 MAIN ST ", "92037");
        assert_eq!(a, b);
        assert_eq!(a.len(), 12);
        assert_ne!(a, derive_listing_id("123 Main St", "92109"));
    }

    #[test]
    fn source_slugs_round_trip() {
        for source in SourceId::ALL {
            assert_eq!(source.as_slug().parse::<SourceId>().unwrap(), source);
        }
        assert!("zillow".parse::<SourceId>().is_err());
    }
}
