pub mod homesage;
pub mod http;
pub mod rapidapi;
pub mod rentcast;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::ProvidersConfig;
use crate::listings::{Listing, SourceId};
use crate::providers::homesage::HomesageProvider;
use crate::providers::rapidapi::RapidApiProvider;
use crate::providers::rentcast::RentCastProvider;

/// One upstream listing API: a thin request/response mapper from the
/// provider's wire shape onto [`Listing`].
#[async_trait]
pub trait ListingProvider: Send + Sync {
    fn id(&self) -> SourceId;
    fn name(&self) -> &str;
    async fn fetch_listings(
        &self,
        zipcode: &str,
        property_types: &[String],
        min_price: Option<i64>,
        max_price: Option<i64>,
    ) -> Result<Vec<Listing>>;
}

#[derive(Clone)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn ListingProvider>>,
}

impl ProviderRegistry {
    /// Builds the registry from configured API keys; providers without a
    /// key are left out entirely.
    pub fn from_config(config: &ProvidersConfig) -> Self {
        let mut providers: Vec<Arc<dyn ListingProvider>> = Vec::new();
        if !config.rentcast.api_key.trim().is_empty() {
            providers.push(Arc::new(RentCastProvider::new(config.rentcast.api_key.clone())));
        }
        if !config.rapidapi.api_key.trim().is_empty() {
            providers.push(Arc::new(RapidApiProvider::new(config.rapidapi.api_key.clone())));
        }
        if !config.homesage.api_key.trim().is_empty() {
            providers.push(Arc::new(HomesageProvider::new(config.homesage.api_key.clone())));
        }
        Self { providers }
    }

    pub fn providers(&self) -> &[Arc<dyn ListingProvider>] {
        &self.providers
    }

    pub fn by_id(&self, id: SourceId) -> Option<Arc<dyn ListingProvider>> {
        self.providers.iter().find(|p| p.id() == id).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }
}
