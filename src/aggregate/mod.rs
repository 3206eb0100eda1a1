pub mod normalize;
pub mod score;

use std::collections::BTreeMap;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::aggregate::normalize::normalize_key;
use crate::aggregate::score::completeness_score;
use crate::listings::{same_property, Listing};

/// Result of one aggregation pass. `duplicates_removed` is an observability
/// counter only; the listings carry all the semantics.
#[derive(Debug, Clone)]
pub struct AggregateOutcome {
    pub listings: Vec<Listing>,
    pub duplicates_removed: usize,
}

/// Flattens per-source batches, groups records by normalized address+zip
/// key, and resolves each group to a single winner.
///
/// Singleton groups pass through untouched. Larger groups keep the member
/// with the highest completeness score; on a tie the first-encountered
/// record wins, so the output is deterministic for a given input.
pub fn aggregate_and_deduplicate(
    listings_by_source: &BTreeMap<String, Vec<Listing>>,
) -> AggregateOutcome {
    let mut all_listings = Vec::new();
    for batch in listings_by_source.values() {
        all_listings.extend(batch.iter().cloned());
    }
    info!("aggregating {} listings from all sources", all_listings.len());

    let mut grouped: BTreeMap<String, Vec<Listing>> = BTreeMap::new();
    for listing in all_listings {
        grouped.entry(normalize_key(&listing)).or_default().push(listing);
    }

    let mut deduplicated = Vec::new();
    let mut duplicates_removed = 0;
    for (key, group) in grouped {
        if group.len() == 1 {
            deduplicated.extend(group);
            continue;
        }

        duplicates_removed += group.len() - 1;
        let winner = select_best_listing(group);
        debug!(
            address = %winner.address,
            source = %winner.source_api,
            "resolved duplicate group {key}"
        );
        deduplicated.push(winner);
    }

    info!(
        "deduplicated to {} unique listings ({} duplicates removed)",
        deduplicated.len(),
        duplicates_removed
    );

    AggregateOutcome {
        listings: deduplicated,
        duplicates_removed,
    }
}

fn select_best_listing(group: Vec<Listing>) -> Listing {
    let mut iter = group.into_iter();
    let mut winner = iter.next().expect("duplicate group cannot be empty");
    let mut winner_score = completeness_score(&winner);
    for candidate in iter {
        // Same grouping key but a price spread beyond the tolerance means
        // the key collided across genuinely different records.
        if !same_property(&winner, &candidate) {
            warn!(
                address = %candidate.address,
                zipcode = %candidate.zipcode,
                "grouped records disagree on price beyond tolerance"
            );
        }
        let candidate_score = completeness_score(&candidate);
        if candidate_score > winner_score {
            winner = candidate;
            winner_score = candidate_score;
        }
    }
    winner
}

/// Merges freshly fetched listings into the persisted set.
///
/// Unknown ids are inserted as-is. For known ids the stored record is
/// enriched field by field: `id` and `first_seen` never change,
/// `last_updated` always advances, and every other field accepts the
/// incoming value only while the stored value is still empty. Populated
/// fields are never erased or replaced by an update.
pub fn merge_with_existing(
    new_listings: &[Listing],
    mut existing: BTreeMap<String, Listing>,
) -> BTreeMap<String, Listing> {
    for incoming in new_listings {
        match existing.get_mut(&incoming.id) {
            Some(stored) => merge_listing(stored, incoming),
            None => {
                existing.insert(incoming.id.clone(), incoming.clone());
            }
        }
    }
    existing
}

fn merge_listing(stored: &mut Listing, incoming: &Listing) {
    stored.city = stored.city.take().or_else(|| incoming.city.clone());
    stored.state = stored.state.take().or_else(|| incoming.state.clone());
    stored.bedrooms = stored.bedrooms.or(incoming.bedrooms);
    stored.bathrooms = stored.bathrooms.or(incoming.bathrooms);
    stored.sqft = stored.sqft.or(incoming.sqft);
    stored.lot_size_sqft = stored.lot_size_sqft.or(incoming.lot_size_sqft);
    stored.year_built = stored.year_built.or(incoming.year_built);
    stored.hoa_fee = stored.hoa_fee.or(incoming.hoa_fee);
    stored.parking_spaces = stored.parking_spaces.or(incoming.parking_spaces);
    stored.property_type = stored
        .property_type
        .take()
        .or_else(|| incoming.property_type.clone());
    stored.listing_url = stored
        .listing_url
        .take()
        .or_else(|| incoming.listing_url.clone());
    stored.photo_url = stored.photo_url.take().or_else(|| incoming.photo_url.clone());
    stored.mls_number = stored
        .mls_number
        .take()
        .or_else(|| incoming.mls_number.clone());
    stored.description = stored
        .description
        .take()
        .or_else(|| incoming.description.clone());
    stored.latitude = stored.latitude.or(incoming.latitude);
    stored.longitude = stored.longitude.or(incoming.longitude);
    stored.last_updated = Utc::now();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::apply_filters;
    use crate::listings::differ::find_new;
    use crate::listings::SourceId;

    fn listing(id: &str, address: &str, zipcode: &str, price: i64, source: SourceId) -> Listing {
        Listing::new(id, address, zipcode, price, source)
    }

    #[test]
    fn duplicate_group_resolves_to_most_complete_record() {
        let mut complete = listing("rc1", "123 Main Street", "92037", 1_500_000, SourceId::RentCast);
        complete.lot_size_sqft = Some(10_000);
        complete.mls_number = Some("MLS123".to_string());

        let sparse = listing("ra1", "123 Main St", "92037", 1_500_500, SourceId::RapidApi);
        let other = listing("ra2", "789 Ocean Blvd", "92107", 3_000_000, SourceId::RapidApi);

        let mut by_source = BTreeMap::new();
        by_source.insert("rentcast".to_string(), vec![complete]);
        by_source.insert("rapidapi".to_string(), vec![sparse, other]);

        let outcome = aggregate_and_deduplicate(&by_source);
        assert_eq!(outcome.listings.len(), 2);
        assert_eq!(outcome.duplicates_removed, 1);

        let main = outcome
            .listings
            .iter()
            .find(|l| l.address.to_lowercase().contains("main"))
            .expect("main street listing missing");
        assert_eq!(main.lot_size_sqft, Some(10_000));
        assert_eq!(main.mls_number.as_deref(), Some("MLS123"));
    }

    #[test]
    fn equally_scored_duplicates_keep_the_first_encountered() {
        let first = listing("a1", "123 Main St", "92037", 1_000_000, SourceId::RentCast);
        let second = listing("b1", "123 Main Street", "92037", 1_000_200, SourceId::Homesage);

        let mut by_source = BTreeMap::new();
        by_source.insert("1".to_string(), vec![first]);
        by_source.insert("2".to_string(), vec![second]);

        let outcome = aggregate_and_deduplicate(&by_source);
        assert_eq!(outcome.listings.len(), 1);
        assert_eq!(outcome.listings[0].id, "a1");
    }

    #[test]
    fn aggregation_is_idempotent_over_its_own_output() {
        let mut rich = listing("rc1", "123 Main Street", "92037", 1_500_000, SourceId::RentCast);
        rich.lot_size_sqft = Some(9_000);
        let sparse = listing("ra1", "123 Main St", "92037", 1_500_400, SourceId::RapidApi);

        let mut by_source = BTreeMap::new();
        by_source.insert("all".to_string(), vec![rich, sparse]);
        let first_pass = aggregate_and_deduplicate(&by_source);

        let mut again = BTreeMap::new();
        again.insert("all".to_string(), first_pass.listings.clone());
        let second_pass = aggregate_and_deduplicate(&again);

        assert_eq!(second_pass.listings.len(), 1);
        assert_eq!(second_pass.duplicates_removed, 0);
        assert_eq!(second_pass.listings[0].id, first_pass.listings[0].id);
    }

    #[test]
    fn merge_enriches_without_clobbering() {
        let mut stored = listing("1", "123 Main St", "92037", 1_000_000, SourceId::RentCast);
        stored.lot_size_sqft = Some(10_000);
        stored.city = Some("La Jolla".to_string());
        let original_first_seen = stored.first_seen;
        let original_last_updated = stored.last_updated;

        let mut existing = BTreeMap::new();
        existing.insert(stored.id.clone(), stored);

        let mut incoming = listing("1", "123 Main St", "92037", 1_050_000, SourceId::Homesage);
        incoming.bedrooms = Some(3);
        incoming.city = Some("San Diego".to_string());
        let brand_new = listing("2", "456 Beach Ave", "92109", 2_000_000, SourceId::Homesage);

        let merged = merge_with_existing(&[incoming, brand_new], existing);
        assert_eq!(merged.len(), 2);

        let updated = &merged["1"];
        assert_eq!(updated.bedrooms, Some(3));
        assert_eq!(updated.city.as_deref(), Some("La Jolla"));
        assert_eq!(updated.lot_size_sqft, Some(10_000));
        assert_eq!(updated.price, 1_000_000);
        assert_eq!(updated.first_seen, original_first_seen);
        assert!(updated.last_updated >= original_last_updated);
        assert!(merged.contains_key("2"));
    }

    #[test]
    fn two_sources_one_property_flows_through_filter_and_diff_as_new() {
        let mut rich = listing("rc1", "123 Main Street", "92037", 1_500_000, SourceId::RentCast);
        rich.lot_size_sqft = Some(10_000);
        rich.mls_number = Some("MLS123".to_string());
        let sparse = listing("ra1", "123 Main St", "92037", 1_500_500, SourceId::RapidApi);

        let mut by_source = BTreeMap::new();
        by_source.insert("rentcast".to_string(), vec![rich]);
        by_source.insert("rapidapi".to_string(), vec![sparse]);

        let outcome = aggregate_and_deduplicate(&by_source);
        assert_eq!(outcome.listings.len(), 1);

        let filters = crate::config::FiltersConfig {
            min_price: 400_000,
            max_price: 5_000_000,
            min_lot_size_sqft: 8_000,
            max_longitude: None,
        };
        let kept = apply_filters(outcome.listings, &filters, &[]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].lot_size_sqft, Some(10_000));
        assert_eq!(kept[0].mls_number.as_deref(), Some("MLS123"));

        let current: BTreeMap<String, Listing> =
            kept.into_iter().map(|l| (l.id.clone(), l)).collect();
        let new = find_new(&current, &BTreeMap::new());
        assert_eq!(new.len(), 1);
        assert_eq!(new[0].id, "rc1");
    }
}
