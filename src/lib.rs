//! digs: search service for student-accommodation listings
//!
//! digs answers filtered listing searches (price, rooms, type, amenities,
//! availability, free-text location or a radius around coordinates) from a
//! SQLite database and caches the serialized responses in memory.
//!
//! # Architecture
//!
//! - **Filter**: Normalizes raw query parameters; malformed values are dropped
//! - **Query**: Composes typed predicates into one parameterized statement
//! - **Store**: Executes statements under a deadline and handles listing writes
//! - **Search**: Cache lookup, exact-then-substring location, timeout retry
//! - **Server**: axum routes over the search service
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use digs::{Filter, MemoryCache, SearchConfig, SearchService, SqliteStore};
//!
//! let store = SqliteStore::open("digs.db", None).unwrap();
//! let cache = MemoryCache::new(1024);
//! let service = SearchService::new(Arc::new(store), Arc::new(cache), SearchConfig::default());
//!
//! let filter = Filter {
//!     location: Some("cape town".into()),
//!     beds: Some(2),
//!     ..Filter::default()
//! };
//! let outcome = service.search(&filter).unwrap();
//! println!("{} bytes, cache hit: {}", outcome.body.len(), outcome.cache_hit);
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod filter;
pub mod geo;
pub mod models;
pub mod output;
pub mod query;
pub mod search;
pub mod server;
pub mod store;

// Re-export commonly used types
pub use cache::{CachedResponse, MemoryCache, ResponseCache};
pub use config::{AppConfig, SearchConfig};
pub use filter::{Filter, SearchParams};
pub use models::{Coordinates, Location, Manager, ManagerStatus, Property, PropertyType};
pub use query::{ComposedQuery, LocationMatch, Predicate, QueryComposer};
pub use search::{SearchOutcome, SearchResults, SearchService};
pub use store::{ListingStore, SqliteStore, StoreError};
