//! Shared fixtures for integration tests
//!
//! Every test gets its own throwaway database seeded with the same small
//! listing set around Cape Town.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use digs::models::{NewLease, NewLocation, NewManager, NewProperty, SeedData, SeedManager, SeedProperty};
use digs::{Filter, ManagerStatus, MemoryCache, Property, PropertyType, SearchConfig, SearchService, SqliteStore};
use tempfile::TempDir;

pub const ACTIVE_MANAGER: i64 = 1;
pub const PENDING_MANAGER: i64 = 2;

pub const RONDEBOSCH_LOFT: i64 = 1;
pub const GARDENS_FLAT: i64 = 2;
pub const STELLENBOSCH_COTTAGE: i64 = 3;
pub const SEA_POINT_VILLA: i64 = 4;
pub const HIDDEN_STUDIO: i64 = 5;

/// Cape Town city centre as (longitude, latitude)
pub const CAPE_TOWN: (f64, f64) = (18.4241, -33.9249);

/// A seeded database that lives as long as the returned `TempDir`
pub struct Fixture {
    pub dir: TempDir,
    pub store: Arc<SqliteStore>,
}

impl Fixture {
    pub fn service(&self) -> SearchService {
        SearchService::new(self.store.clone(), Arc::new(MemoryCache::new(64)), SearchConfig::default())
    }
}

pub fn location(city: &str, suburb: &str, longitude: f64, latitude: f64) -> NewLocation {
    NewLocation {
        address: format!("1 {} Road", suburb),
        city: city.into(),
        suburb: suburb.into(),
        state: "Western Cape".into(),
        country: "South Africa".into(),
        postal_code: "8001".into(),
        longitude,
        latitude,
    }
}

pub fn property(
    manager_id: i64,
    name: &str,
    price: f64,
    beds: i64,
    amenities: &[&str],
    location: NewLocation,
) -> NewProperty {
    NewProperty {
        name: name.into(),
        description: format!("{} near campus", name),
        price_per_month: price,
        security_deposit: price,
        application_fee: 250.0,
        photo_urls: vec![],
        amenities: amenities.iter().map(|a| a.to_string()).collect(),
        highlights: vec![],
        is_pets_allowed: false,
        is_parking_included: amenities.contains(&"Parking"),
        beds,
        baths: 1.0,
        kitchens: 1,
        square_feet: 300 * beds,
        property_type: PropertyType::Apartment,
        manager_id,
        location,
    }
}

/// Priced 1800, 3000, 4500, 6000 with beds 1, 2, 2, 3, plus one listing
/// owned by a manager that is not active
pub fn seed() -> SeedData {
    let manager = |id, name: &str, status| SeedManager {
        id,
        manager: NewManager {
            name: name.into(),
            email: format!("{}@digs.test", name.to_lowercase()),
            phone_number: "021 555 0100".into(),
            status,
        },
    };

    let mut cottage = property(
        ACTIVE_MANAGER,
        "Stellenbosch Cottage",
        4500.0,
        2,
        &["Pool", "WiFi"],
        location("Stellenbosch", "Die Boord", 18.8602, -33.9321),
    );
    cottage.property_type = PropertyType::Cottage;

    let mut villa = property(
        ACTIVE_MANAGER,
        "Sea Point Villa",
        6000.0,
        3,
        &["Parking", "Pool", "WiFi"],
        location("Cape Town", "Sea Point", 18.3845, -33.9158),
    );
    villa.property_type = PropertyType::Villa;

    SeedData {
        managers: vec![
            manager(ACTIVE_MANAGER, "Thandi", ManagerStatus::Active),
            manager(PENDING_MANAGER, "Pieter", ManagerStatus::Pending),
        ],
        properties: vec![
            SeedProperty {
                id: RONDEBOSCH_LOFT,
                property: property(
                    ACTIVE_MANAGER,
                    "Rondebosch Loft",
                    1800.0,
                    1,
                    &["WiFi"],
                    location("Cape Town", "Rondebosch", 18.4760, -33.9575),
                ),
            },
            SeedProperty {
                id: GARDENS_FLAT,
                property: property(
                    ACTIVE_MANAGER,
                    "Gardens Flat",
                    3000.0,
                    2,
                    &["Parking", "WiFi"],
                    location("Cape Town", "Gardens", 18.4113, -33.9346),
                ),
            },
            SeedProperty {
                id: STELLENBOSCH_COTTAGE,
                property: cottage,
            },
            SeedProperty {
                id: SEA_POINT_VILLA,
                property: villa,
            },
            SeedProperty {
                id: HIDDEN_STUDIO,
                property: property(
                    PENDING_MANAGER,
                    "Hidden Studio",
                    2500.0,
                    2,
                    &["WiFi"],
                    location("Cape Town", "Gardens", 18.4120, -33.9350),
                ),
            },
        ],
        leases: vec![
            NewLease {
                property_id: GARDENS_FLAT,
                start_date: date(2026, 1, 15),
                end_date: date(2026, 12, 15),
                rent: 3000.0,
            },
            NewLease {
                property_id: SEA_POINT_VILLA,
                start_date: date(2026, 6, 1),
                end_date: date(2027, 5, 31),
                rent: 6000.0,
            },
        ],
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// Open a fresh database and load `seed()` into it
pub fn seeded_store() -> Fixture {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = SqliteStore::open(dir.path().join("digs.db"), Some(std::time::Duration::from_secs(5)))
        .expect("Failed to open store");
    store.import(&seed()).expect("Failed to import seed");

    Fixture {
        dir,
        store: Arc::new(store),
    }
}

/// A default filter with the usual limit
pub fn filter() -> Filter {
    Filter::default()
}

pub fn ids(properties: &[Property]) -> Vec<i64> {
    properties.iter().map(|p| p.id).collect()
}
