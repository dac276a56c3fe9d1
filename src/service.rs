//! Shorten and resolve flows
//!
//! Combines the key allocator with the mapping store. All logging here runs
//! inside the per-request span opened by the request-id middleware.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::keys::KeyAllocator;
use crate::model::{NewMapping, ShortenRequest, UrlMapping};
use crate::store::{MappingStore, StoreError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid short key")]
    NotFound,

    /// `custom` tells whether the caller chose the colliding key.
    #[error("duplicate short key error")]
    DuplicateKey { short_key: String, custom: bool },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a shorten request.
#[derive(Debug, Clone, PartialEq)]
pub enum ShortenOutcome {
    /// A new mapping was inserted.
    Created(UrlMapping),
    /// An active mapping for the target URL already existed.
    Existing(UrlMapping),
}

impl ShortenOutcome {
    pub fn into_mapping(self) -> UrlMapping {
        match self {
            ShortenOutcome::Created(m) | ShortenOutcome::Existing(m) => m,
        }
    }
}

pub struct ShortenService {
    store: Arc<dyn MappingStore>,
    allocator: KeyAllocator,
    app_version: String,
}

impl ShortenService {
    pub fn new(store: Arc<dyn MappingStore>, app_version: impl Into<String>) -> Self {
        Self {
            store,
            allocator: KeyAllocator::new(),
            app_version: app_version.into(),
        }
    }

    pub fn store(&self) -> &Arc<dyn MappingStore> {
        &self.store
    }

    /// Returns the active mapping for the request's target URL, creating it
    /// if none exists.
    ///
    /// # Arguments
    ///
    /// * `request` - validated shorten request (system-generated or custom key)
    ///
    /// # Returns
    ///
    /// * `ShortenOutcome::Created` - a new mapping was inserted
    /// * `ShortenOutcome::Existing` - the target URL was already mapped
    ///
    /// A concurrent request that inserts the same target first wins; this
    /// request then gets the winner's mapping back as [`ShortenOutcome::Existing`].
    ///
    /// # Errors
    ///
    /// [`ServiceError::DuplicateKey`] when the chosen or generated key is
    /// already taken. Generated-key collisions are not retried.
    pub async fn shorten(&self, request: &ShortenRequest) -> Result<ShortenOutcome, ServiceError> {
        let target_url = request.target_url();

        // Reuse the active mapping for this target if there is one
        info!(target_url, "query target url in mappings");
        if let Some(existing) = self.store.find_active_by_target(target_url).await? {
            info!(short_key = %existing.short_key, "mapping already exists");
            return Ok(ShortenOutcome::Existing(existing));
        }

        // Generate a random key, or take the caller's key as is
        let short_key = match request {
            ShortenRequest::System(req) => self.allocator.generate(req.short_key_length),
            ShortenRequest::Custom(req) => self.allocator.accept(req.custom_key.clone()),
        };
        let custom = request.is_custom();

        info!(%short_key, custom, "insert mapping");
        let new_mapping = NewMapping {
            target_url: target_url.to_string(),
            short_key,
            is_custom_key: custom,
            tags: request.tags(),
            app_version: self.app_version.clone(),
        };

        // The store re-checks both indexes atomically with the insert
        match self.store.insert_new(new_mapping).await {
            Ok(mapping) => Ok(ShortenOutcome::Created(mapping)),
            Err(StoreError::ActiveTargetExists(winner)) => {
                info!(short_key = %winner.short_key, "lost insert race, returning existing mapping");
                Ok(ShortenOutcome::Existing(*winner))
            }
            Err(StoreError::DuplicateKey { short_key }) => {
                warn!(%short_key, custom, "duplicate short key");
                Err(ServiceError::DuplicateKey { short_key, custom })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Looks up the active mapping for `short_key` and counts one hit.
    ///
    /// # Returns
    ///
    /// * `Ok(UrlMapping)` - the mapping as stored after the increment
    /// * `Err(ServiceError::NotFound)` - no active mapping for `short_key`
    pub async fn resolve(&self, short_key: &str) -> Result<UrlMapping, ServiceError> {
        info!(short_key, "query short key in mappings");
        let Some(mapping) = self.store.find_by_key(short_key).await? else {
            info!(short_key, "mapping not found");
            return Err(ServiceError::NotFound);
        };

        // Count the hit atomically in the store, not from the copy read above
        match self.store.record_hit(&mapping).await {
            Ok(updated) => {
                info!(short_key, hits = updated.hits, target_url = %updated.target_url, "redirecting");
                Ok(updated)
            }
            Err(StoreError::NotFound { .. }) => Err(ServiceError::NotFound),
            Err(e) => Err(e.into()),
        }
    }
}
