use crate::listings::Listing;

/// Data-completeness score used to rank duplicate records of the same
/// property. Only relative order matters; the absolute value carries no
/// meaning outside a duplicate group.
///
/// Lot size is weighted highest because it drives the primary downstream
/// filter, followed by the MLS number as the most authoritative reference.
pub fn completeness_score(listing: &Listing) -> u32 {
    let mut score = 0;

    if listing.lot_size_sqft.is_some() {
        score += 10;
    }
    if present(&listing.mls_number) {
        score += 8;
    }
    if present(&listing.listing_url) {
        score += 5;
    }
    if present(&listing.photo_url) {
        score += 3;
    }

    if listing.bedrooms.is_some() {
        score += 2;
    }
    if listing.bathrooms.is_some() {
        score += 2;
    }
    if listing.sqft.is_some() {
        score += 2;
    }
    if listing.year_built.is_some() {
        score += 1;
    }
    if present(&listing.description) {
        score += 1;
    }
    if present(&listing.city) {
        score += 1;
    }

    score
}

fn present(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listings::SourceId;

    fn bare() -> Listing {
        Listing::new("1", "123 Main St", "92037", 1_000_000, SourceId::RentCast)
    }

    #[test]
    fn richer_records_score_strictly_higher() {
        let sparse = bare();

        let mut partial = bare();
        partial.bedrooms = Some(3);
        partial.bathrooms = Some(2.5);

        let mut rich = partial.clone();
        rich.lot_size_sqft = Some(10_000);
        rich.mls_number = Some("MLS123".to_string());
        rich.listing_url = Some("https://example.com/1".to_string());
        rich.photo_url = Some("https://example.com/1.jpg".to_string());
        rich.sqft = Some(2_000);
        rich.year_built = Some(1978);
        rich.description = Some("Nice house".to_string());
        rich.city = Some("San Diego".to_string());

        assert!(completeness_score(&partial) > completeness_score(&sparse));
        assert!(completeness_score(&rich) > completeness_score(&partial));
        assert!(completeness_score(&rich) > 20);
    }

    #[test]
    fn empty_strings_do_not_count_as_present() {
        let mut listing = bare();
        listing.mls_number = Some(String::new());
        listing.description = Some(String::new());
        assert_eq!(completeness_score(&listing), completeness_score(&bare()));
    }

    #[test]
    fn lot_size_outweighs_every_secondary_field() {
        let mut with_lot = bare();
        with_lot.lot_size_sqft = Some(8_000);

        let mut secondaries = bare();
        secondaries.bedrooms = Some(4);
        secondaries.bathrooms = Some(3.0);
        secondaries.sqft = Some(2_400);
        secondaries.year_built = Some(1990);
        secondaries.description = Some("desc".to_string());
        secondaries.city = Some("La Jolla".to_string());

        assert!(completeness_score(&with_lot) > completeness_score(&secondaries));
    }
}
