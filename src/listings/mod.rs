pub mod differ;
pub mod schema;
pub mod store;

pub use schema::{
    derive_listing_id, normalize_property_type, same_property, Listing, SourceId,
    SourceParseError, PRICE_TOLERANCE,
};
pub use store::ListingStore;
