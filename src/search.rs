//! Search service: cache, compose, execute, degrade
//!
//! [`SearchService`] is the single entry point for both the HTTP handlers and
//! the CLI. It owns the injected store and cache; every listing write goes
//! through it so the response cache is cleared after the store commits.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CachedResponse, ResponseCache};
use crate::config::SearchConfig;
use crate::filter::Filter;
use crate::models::{
    Lease, Manager, ManagerStatus, NewLease, NewManager, NewProperty, Property, PropertyUpdate,
    StoreStats,
};
use crate::query::{ComposedQuery, LocationMatch, QueryComposer};
use crate::store::{ListingStore, StoreError};

/// A search response ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    /// Serialized JSON array of properties
    pub body: Vec<u8>,
    pub ttl: Duration,
    pub cache_hit: bool,
}

/// Rows plus the limit that actually produced them
#[derive(Debug, Clone)]
pub struct SearchResults {
    pub properties: Vec<Property>,
    pub limit: usize,
    /// True when a timeout forced the reduced limit
    pub degraded: bool,
}

pub struct SearchService {
    store: Arc<dyn ListingStore>,
    cache: Arc<dyn ResponseCache>,
    composer: QueryComposer,
    config: SearchConfig,
}

impl SearchService {
    pub fn new(store: Arc<dyn ListingStore>, cache: Arc<dyn ResponseCache>, config: SearchConfig) -> Self {
        Self {
            store,
            cache,
            composer: QueryComposer::new(config.radius_meters),
            config,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// TTL for a filter's cached response
    pub fn ttl_for(&self, filter: &Filter) -> Duration {
        if filter.is_targeted() {
            Duration::from_secs(self.config.filtered_ttl_secs)
        } else {
            Duration::from_secs(self.config.browse_ttl_secs)
        }
    }

    /// Cached search returning the serialized response
    pub fn search(&self, filter: &Filter) -> Result<SearchOutcome, StoreError> {
        let key = filter.cache_key();

        if let Some(hit) = self.cache.get(&key) {
            return Ok(SearchOutcome {
                body: hit.body,
                ttl: hit.ttl,
                cache_hit: true,
            });
        }

        // Read before querying so a write landing mid-search is detected
        let generation = self.cache.generation();
        let results = self.find(filter)?;
        let body = serde_json::to_vec(&results.properties)?;
        let ttl = self.ttl_for(filter);

        self.cache.set_at(
            key,
            CachedResponse {
                body: body.clone(),
                ttl,
            },
            ttl,
            generation,
        );

        Ok(SearchOutcome {
            body,
            ttl,
            cache_hit: false,
        })
    }

    /// Uncached search
    ///
    /// A text location is matched exactly first; if that finds nothing the
    /// substring form runs instead. A statement timeout with a limit above
    /// the degraded limit is retried once at the degraded limit, and the
    /// reduced limit carries over to the substring phase.
    pub fn find(&self, filter: &Filter) -> Result<SearchResults, StoreError> {
        let exact = self.composer.compose(filter, LocationMatch::Exact);
        let mut results = self.execute(&exact)?;

        if results.properties.is_empty() && exact.location_mode().is_some() {
            log::debug!("No exact location match, falling back to substring match");
            let substring = self
                .composer
                .compose(filter, LocationMatch::Substring)
                .with_limit(results.limit);

            let fallback = self.execute(&substring)?;
            results = SearchResults {
                degraded: results.degraded || fallback.degraded,
                ..fallback
            };
        }

        log::info!(
            "Search matched {} properties (limit {}{})",
            results.properties.len(),
            results.limit,
            if results.degraded { ", degraded" } else { "" }
        );
        Ok(results)
    }

    fn execute(&self, query: &ComposedQuery) -> Result<SearchResults, StoreError> {
        match self.store.search(query) {
            Ok(properties) => Ok(SearchResults {
                properties,
                limit: query.limit,
                degraded: false,
            }),
            Err(e) if e.is_timeout() && query.limit > self.config.degraded_limit => {
                log::warn!(
                    "{}; retrying with limit {} instead of {}",
                    e,
                    self.config.degraded_limit,
                    query.limit
                );
                let degraded = query.with_limit(self.config.degraded_limit);
                let properties = self.store.search(&degraded)?;
                Ok(SearchResults {
                    properties,
                    limit: degraded.limit,
                    degraded: true,
                })
            }
            Err(e) => {
                log::error!("Search failed: {}", e);
                Err(e)
            }
        }
    }

    pub fn get_property(&self, id: i64) -> Result<Option<Property>, StoreError> {
        self.store.get_property(id)
    }

    pub fn create_property(&self, property: &NewProperty) -> Result<Property, StoreError> {
        let created = self.store.create_property(property)?;
        self.cache.invalidate_all();
        Ok(created)
    }

    pub fn update_property(&self, id: i64, update: PropertyUpdate) -> Result<Option<Property>, StoreError> {
        let updated = self.store.update_property(id, update)?;
        if updated.is_some() {
            self.cache.invalidate_all();
        }
        Ok(updated)
    }

    pub fn disable_property(&self, id: i64, reason: Option<&str>) -> Result<bool, StoreError> {
        let disabled = self.store.disable_property(id, reason)?;
        if disabled {
            self.cache.invalidate_all();
        }
        Ok(disabled)
    }

    pub fn create_manager(&self, manager: &NewManager) -> Result<Manager, StoreError> {
        let created = self.store.create_manager(manager)?;
        self.cache.invalidate_all();
        Ok(created)
    }

    pub fn set_manager_status(&self, id: i64, status: ManagerStatus) -> Result<Option<Manager>, StoreError> {
        let manager = self.store.set_manager_status(id, status)?;
        if manager.is_some() {
            self.cache.invalidate_all();
        }
        Ok(manager)
    }

    pub fn create_lease(&self, lease: &NewLease) -> Result<Lease, StoreError> {
        let created = self.store.create_lease(lease)?;
        self.cache.invalidate_all();
        Ok(created)
    }

    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        self.store.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::models::{Coordinates, Location, PropertyType};
    use crate::query::Predicate;
    use chrono::Utc;
    use std::sync::Mutex;

    /// Scripted store: answers searches from a queue and records each query
    struct ScriptedStore {
        responses: Mutex<Vec<Result<Vec<Property>, StoreError>>>,
        queries: Mutex<Vec<ComposedQuery>>,
        writes: Mutex<usize>,
        /// Cache cleared while a search is running, as a concurrent write would
        interleaved: Mutex<Option<Arc<MemoryCache>>>,
    }

    impl ScriptedStore {
        fn new(mut responses: Vec<Result<Vec<Property>, StoreError>>) -> Arc<Self> {
            responses.reverse();
            Arc::new(Self {
                responses: Mutex::new(responses),
                queries: Mutex::new(Vec::new()),
                writes: Mutex::new(0),
                interleaved: Mutex::new(None),
            })
        }

        fn queries(&self) -> Vec<ComposedQuery> {
            self.queries.lock().unwrap().clone()
        }
    }

    impl ListingStore for ScriptedStore {
        fn search(&self, query: &ComposedQuery) -> Result<Vec<Property>, StoreError> {
            self.queries.lock().unwrap().push(query.clone());
            if let Some(cache) = self.interleaved.lock().unwrap().as_ref() {
                cache.invalidate_all();
            }
            self.responses.lock().unwrap().pop().unwrap_or_else(|| Ok(vec![]))
        }

        fn get_property(&self, _id: i64) -> Result<Option<Property>, StoreError> {
            Ok(None)
        }

        fn create_property(&self, _property: &NewProperty) -> Result<Property, StoreError> {
            *self.writes.lock().unwrap() += 1;
            Ok(property(99))
        }

        fn update_property(&self, id: i64, _update: PropertyUpdate) -> Result<Option<Property>, StoreError> {
            *self.writes.lock().unwrap() += 1;
            Ok((id == 1).then(|| property(1)))
        }

        fn disable_property(&self, id: i64, _reason: Option<&str>) -> Result<bool, StoreError> {
            *self.writes.lock().unwrap() += 1;
            Ok(id == 1)
        }

        fn create_manager(&self, _manager: &NewManager) -> Result<Manager, StoreError> {
            unimplemented!()
        }

        fn set_manager_status(&self, _id: i64, _status: ManagerStatus) -> Result<Option<Manager>, StoreError> {
            unimplemented!()
        }

        fn create_lease(&self, _lease: &NewLease) -> Result<Lease, StoreError> {
            unimplemented!()
        }

        fn stats(&self) -> Result<StoreStats, StoreError> {
            Ok(StoreStats::default())
        }
    }

    fn property(id: i64) -> Property {
        let now = Utc::now();
        Property {
            id,
            name: format!("Listing {}", id),
            description: String::new(),
            price_per_month: 3000.0,
            security_deposit: 0.0,
            application_fee: 0.0,
            photo_urls: vec![],
            amenities: vec![],
            highlights: vec![],
            is_pets_allowed: false,
            is_parking_included: false,
            beds: 2,
            baths: 1.0,
            kitchens: 1,
            square_feet: 500,
            property_type: PropertyType::Apartment,
            posted_date: now,
            created_at: now,
            updated_at: now,
            average_rating: None,
            number_of_reviews: 0,
            location_id: id,
            manager_id: 1,
            location: Location {
                id,
                address: "1 Main Rd".into(),
                city: "Cape Town".into(),
                suburb: "Gardens".into(),
                state: "Western Cape".into(),
                country: "South Africa".into(),
                postal_code: "8001".into(),
                coordinates: Coordinates::new(18.41, -33.93),
            },
        }
    }

    fn timeout() -> StoreError {
        StoreError::Timeout(Duration::from_secs(5))
    }

    fn service(store: Arc<ScriptedStore>) -> (SearchService, Arc<MemoryCache>) {
        let cache = Arc::new(MemoryCache::new(16));
        let service = SearchService::new(store, cache.clone(), SearchConfig::default());
        (service, cache)
    }

    #[test]
    fn test_timeout_retries_once_with_degraded_limit() {
        let store = ScriptedStore::new(vec![Err(timeout()), Ok(vec![property(1)])]);
        let (service, _) = service(store.clone());

        let results = service.find(&Filter::new(50)).unwrap();

        assert!(results.degraded);
        assert_eq!(results.limit, 10);
        assert_eq!(results.properties.len(), 1);
        let limits: Vec<usize> = store.queries().iter().map(|q| q.limit).collect();
        assert_eq!(limits, vec![50, 10]);
    }

    #[test]
    fn test_second_timeout_propagates() {
        let store = ScriptedStore::new(vec![Err(timeout()), Err(timeout())]);
        let (service, _) = service(store.clone());

        let err = service.find(&Filter::new(50)).unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(store.queries().len(), 2);
    }

    #[test]
    fn test_timeout_at_small_limit_not_retried() {
        let store = ScriptedStore::new(vec![Err(timeout())]);
        let (service, _) = service(store.clone());

        assert!(service.find(&Filter::new(10)).unwrap_err().is_timeout());
        assert_eq!(store.queries().len(), 1);
    }

    #[test]
    fn test_other_errors_not_retried() {
        let store = ScriptedStore::new(vec![Err(StoreError::Invalid("boom".into()))]);
        let (service, _) = service(store.clone());

        let err = service.find(&Filter::new(50)).unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert_eq!(store.queries().len(), 1);
    }

    #[test]
    fn test_exact_location_falls_back_to_substring() {
        let store = ScriptedStore::new(vec![Ok(vec![]), Ok(vec![property(3)])]);
        let (service, _) = service(store.clone());

        let filter = Filter {
            location: Some("cape".into()),
            ..Filter::new(50)
        };
        let results = service.find(&filter).unwrap();

        assert_eq!(results.properties.len(), 1);
        let modes: Vec<_> = store.queries().iter().map(|q| q.location_mode()).collect();
        assert_eq!(modes, vec![Some(LocationMatch::Exact), Some(LocationMatch::Substring)]);
    }

    #[test]
    fn test_exact_hit_skips_substring() {
        let store = ScriptedStore::new(vec![Ok(vec![property(3)])]);
        let (service, _) = service(store.clone());

        let filter = Filter {
            location: Some("cape town".into()),
            ..Filter::new(50)
        };
        service.find(&filter).unwrap();
        assert_eq!(store.queries().len(), 1);
    }

    #[test]
    fn test_empty_without_location_has_no_fallback() {
        let store = ScriptedStore::new(vec![Ok(vec![])]);
        let (service, _) = service(store.clone());

        let results = service.find(&Filter::new(50)).unwrap();
        assert!(results.properties.is_empty());
        assert_eq!(store.queries().len(), 1);
    }

    #[test]
    fn test_degraded_limit_carries_into_fallback() {
        let store = ScriptedStore::new(vec![Err(timeout()), Ok(vec![]), Ok(vec![])]);
        let (service, _) = service(store.clone());

        let filter = Filter {
            location: Some("cape".into()),
            ..Filter::new(50)
        };
        let results = service.find(&filter).unwrap();

        assert!(results.degraded);
        let limits: Vec<usize> = store.queries().iter().map(|q| q.limit).collect();
        assert_eq!(limits, vec![50, 10, 10]);
    }

    #[test]
    fn test_coordinates_never_use_text_location() {
        let store = ScriptedStore::new(vec![Ok(vec![])]);
        let (service, _) = service(store.clone());

        let filter = Filter {
            location: Some("cape town".into()),
            coordinates: Some(Coordinates::new(18.42, -33.92)),
            ..Filter::new(50)
        };
        service.find(&filter).unwrap();

        let queries = store.queries();
        assert_eq!(queries.len(), 1);
        assert!(matches!(queries[0].predicates[0], Predicate::WithinRadius { .. }));
        assert_eq!(queries[0].location_mode(), None);
    }

    #[test]
    fn test_second_search_is_cache_hit_with_identical_body() {
        let store = ScriptedStore::new(vec![Ok(vec![property(1), property(2)])]);
        let (service, _) = service(store.clone());
        let filter = Filter::new(50);

        let first = service.search(&filter).unwrap();
        let second = service.search(&filter).unwrap();

        assert!(!first.cache_hit);
        assert!(second.cache_hit);
        assert_eq!(first.body, second.body);
        assert_eq!(store.queries().len(), 1);
    }

    #[test]
    fn test_ttl_depends_on_targeting() {
        let store = ScriptedStore::new(vec![]);
        let (service, _) = service(store);

        assert_eq!(service.ttl_for(&Filter::new(50)), Duration::from_secs(180));

        let by_name = Filter {
            property_name: Some("loft".into()),
            ..Filter::new(50)
        };
        assert_eq!(service.ttl_for(&by_name), Duration::from_secs(60));

        let by_price = Filter {
            price_min: Some(1000.0),
            ..Filter::new(50)
        };
        assert_eq!(service.ttl_for(&by_price), Duration::from_secs(180));
    }

    #[test]
    fn test_failed_search_is_not_cached() {
        let store = ScriptedStore::new(vec![Err(StoreError::Invalid("boom".into()))]);
        let (service, cache) = service(store);

        assert!(service.search(&Filter::new(50)).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_write_during_search_is_not_cached() {
        let store = ScriptedStore::new(vec![Ok(vec![property(1)]), Ok(vec![property(2)])]);
        let (service, cache) = service(store.clone());
        *store.interleaved.lock().unwrap() = Some(cache.clone());

        let first = service.search(&Filter::new(10)).unwrap();
        assert!(!first.cache_hit);
        assert!(cache.is_empty());

        *store.interleaved.lock().unwrap() = None;
        let second = service.search(&Filter::new(10)).unwrap();
        assert!(!second.cache_hit);
        assert_ne!(first.body, second.body);
        assert_eq!(store.queries().len(), 2);

        assert!(service.search(&Filter::new(10)).unwrap().cache_hit);
    }

    #[test]
    fn test_writes_invalidate_cache() {
        let store = ScriptedStore::new(vec![]);
        let (service, cache) = service(store);
        let filter = Filter::new(50);

        service.search(&filter).unwrap();
        assert_eq!(cache.len(), 1);
        service.update_property(1, PropertyUpdate::default()).unwrap();
        assert!(cache.is_empty());

        service.search(&filter).unwrap();
        assert!(service.disable_property(1, None).unwrap());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_noop_writes_keep_cache() {
        let store = ScriptedStore::new(vec![]);
        let (service, cache) = service(store);

        service.search(&Filter::new(50)).unwrap();
        assert!(service.update_property(2, PropertyUpdate::default()).unwrap().is_none());
        assert!(!service.disable_property(2, None).unwrap());
        assert_eq!(cache.len(), 1);
    }
}
