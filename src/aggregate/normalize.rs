use crate::listings::Listing;

/// Street-suffix synonyms collapsed before grouping. Order matters: longer
/// spellings are rewritten to the abbreviation every source agrees on.
const SUFFIX_REPLACEMENTS: [(&str, &str); 5] = [
    (" street", " st"),
    (" avenue", " ave"),
    (" road", " rd"),
    (" drive", " dr"),
    (" boulevard", " blvd"),
];

/// Canonical grouping key for a listing: case-folded, suffix-normalized,
/// punctuation-stripped address joined with the zipcode.
///
/// Two addresses that normalize identically are grouped as the same
/// property regardless of capitalization, suffix spelling, or punctuation.
pub fn normalize_key(listing: &Listing) -> String {
    let mut address = listing.address.to_lowercase().trim().to_string();
    for (from, to) in SUFFIX_REPLACEMENTS {
        address = address.replace(from, to);
    }
    address = address.replace([',', '.'], "");
    format!("{}_{}", address, listing.zipcode)
}
