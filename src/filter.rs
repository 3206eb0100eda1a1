use tracing::{debug, info};

use crate::config::FiltersConfig;
use crate::listings::Listing;

/// Applies the configured predicates in sequence: price range, minimum lot
/// size, ocean proximity (when a longitude bound is configured), then the
/// property-type allow-list.
///
/// A listing missing the field an active filter needs (lot size,
/// longitude) is excluded, not defaulted.
pub fn apply_filters(
    listings: Vec<Listing>,
    filters: &FiltersConfig,
    property_types: &[String],
) -> Vec<Listing> {
    let input_count = listings.len();
    info!("filtering {input_count} listings ({})", filter_summary(filters));

    let filtered = by_price(listings, filters);
    let filtered = by_lot_size(filtered, filters);
    let filtered = by_ocean_proximity(filtered, filters);
    let filtered = by_property_type(filtered, property_types);

    info!(
        "filtered {input_count} listings -> {} ({} excluded)",
        filtered.len(),
        input_count - filtered.len()
    );
    filtered
}

pub fn filter_summary(filters: &FiltersConfig) -> String {
    let mut summary = format!(
        "price ${} - ${}, lot >= {} sqft",
        filters.min_price, filters.max_price, filters.min_lot_size_sqft
    );
    if let Some(max_longitude) = filters.max_longitude {
        summary.push_str(&format!(", lon <= {max_longitude}"));
    }
    summary
}

fn by_price(listings: Vec<Listing>, filters: &FiltersConfig) -> Vec<Listing> {
    let before = listings.len();
    let kept: Vec<Listing> = listings
        .into_iter()
        .filter(|listing| {
            let inside = listing.price >= filters.min_price && listing.price <= filters.max_price;
            if !inside {
                debug!(
                    "excluded {}: price ${} outside [{}, {}]",
                    listing.address, listing.price, filters.min_price, filters.max_price
                );
            }
            inside
        })
        .collect();
    info!("price filter: {before} -> {}", kept.len());
    kept
}

fn by_lot_size(listings: Vec<Listing>, filters: &FiltersConfig) -> Vec<Listing> {
    let before = listings.len();
    let mut missing_data = 0;
    let kept: Vec<Listing> = listings
        .into_iter()
        .filter(|listing| match listing.lot_size_sqft {
            None => {
                debug!("excluded {}: no lot size data", listing.address);
                missing_data += 1;
                false
            }
            Some(lot) => {
                let large_enough = lot >= filters.min_lot_size_sqft;
                if !large_enough {
                    debug!(
                        "excluded {}: lot {} sqft < min {} sqft",
                        listing.address, lot, filters.min_lot_size_sqft
                    );
                }
                large_enough
            }
        })
        .collect();
    info!(
        "lot size filter (>= {} sqft): {before} -> {} ({missing_data} missing data)",
        filters.min_lot_size_sqft,
        kept.len()
    );
    kept
}

fn by_ocean_proximity(listings: Vec<Listing>, filters: &FiltersConfig) -> Vec<Listing> {
    let Some(max_longitude) = filters.max_longitude else {
        info!("ocean proximity filter: skipped (max_longitude not configured)");
        return listings;
    };

    let before = listings.len();
    let mut missing_data = 0;
    // Properties west of the threshold (more negative longitude) are
    // closer to the ocean.
    let kept: Vec<Listing> = listings
        .into_iter()
        .filter(|listing| match listing.longitude {
            None => {
                debug!("excluded {}: no longitude data", listing.address);
                missing_data += 1;
                false
            }
            Some(longitude) => {
                let west_enough = longitude <= max_longitude;
                if !west_enough {
                    debug!(
                        "excluded {}: longitude {longitude} east of {max_longitude}",
                        listing.address
                    );
                }
                west_enough
            }
        })
        .collect();
    info!(
        "ocean proximity filter (<= {max_longitude} lon): {before} -> {} ({missing_data} missing coordinates)",
        kept.len()
    );
    kept
}

fn by_property_type(listings: Vec<Listing>, property_types: &[String]) -> Vec<Listing> {
    if property_types.is_empty() {
        return listings;
    }

    let before = listings.len();
    let kept: Vec<Listing> = listings
        .into_iter()
        .filter(|listing| {
            let allowed = listing
                .property_type
                .as_deref()
                .is_some_and(|pt| property_types.iter().any(|allowed| allowed == pt));
            if !allowed {
                debug!(
                    "excluded {}: property type {:?} not allowed",
                    listing.address, listing.property_type
                );
            }
            allowed
        })
        .collect();
    info!("property type filter: {before} -> {}", kept.len());
    kept
}
