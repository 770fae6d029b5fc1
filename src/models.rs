//! Core data models for Digs
//!
//! These structures are the JSON shapes served by the HTTP API and the
//! records persisted by the listings store. Field names serialize in
//! camelCase to match what the web client expects.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A geographic point (WGS84 degrees)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub longitude: f64,
    pub latitude: f64,
}

impl Coordinates {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self { longitude, latitude }
    }

    /// Both components finite and not the `[0, 0]` placeholder clients send
    /// when geocoding failed
    pub fn is_usable(&self) -> bool {
        self.longitude.is_finite()
            && self.latitude.is_finite()
            && !(self.longitude == 0.0 && self.latitude == 0.0)
    }
}

/// Kind of dwelling a listing offers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, EnumString, Display)]
#[strum(ascii_case_insensitive)]
pub enum PropertyType {
    Rooms,
    Tinyhouse,
    Apartment,
    Villa,
    Townhouse,
    Cottage,
    Studio,
    Residence,
    Flat,
}

/// Account status of a property manager
///
/// Only listings owned by `Active` managers are ever returned by search.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
#[strum(ascii_case_insensitive)]
pub enum ManagerStatus {
    Active,
    #[default]
    Pending,
    Disabled,
    Banned,
}

/// Where a property is
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: i64,
    pub address: String,
    pub city: String,
    pub suburb: String,
    pub state: String,
    pub country: String,
    pub postal_code: String,
    pub coordinates: Coordinates,
}

/// A rental listing with its joined location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price_per_month: f64,
    pub security_deposit: f64,
    pub application_fee: f64,
    pub photo_urls: Vec<String>,
    pub amenities: Vec<String>,
    pub highlights: Vec<String>,
    pub is_pets_allowed: bool,
    pub is_parking_included: bool,
    pub beds: i64,
    pub baths: f64,
    pub kitchens: i64,
    pub square_feet: i64,
    pub property_type: PropertyType,
    pub posted_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub average_rating: Option<f64>,
    pub number_of_reviews: i64,
    pub location_id: i64,
    pub manager_id: i64,
    pub location: Location,
}

/// A property manager account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Manager {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub status: ManagerStatus,
}

/// A lease signed against a property
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Lease {
    pub id: i64,
    pub property_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub rent: f64,
}

/// Payload for registering a manager
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewManager {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub status: ManagerStatus,
}

/// Location part of a create/update payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLocation {
    pub address: String,
    pub city: String,
    #[serde(default)]
    pub suburb: String,
    #[serde(default)]
    pub state: String,
    pub country: String,
    #[serde(default)]
    pub postal_code: String,
    pub longitude: f64,
    pub latitude: f64,
}

/// Payload for listing a new property
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProperty {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price_per_month: f64,
    #[serde(default)]
    pub security_deposit: f64,
    #[serde(default)]
    pub application_fee: f64,
    #[serde(default)]
    pub photo_urls: Vec<String>,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub is_pets_allowed: bool,
    #[serde(default)]
    pub is_parking_included: bool,
    pub beds: i64,
    pub baths: f64,
    #[serde(default = "default_kitchens")]
    pub kitchens: i64,
    #[serde(default)]
    pub square_feet: i64,
    pub property_type: PropertyType,
    pub manager_id: i64,
    pub location: NewLocation,
}

fn default_kitchens() -> i64 {
    1
}

/// Partial update for an existing property
///
/// Absent fields are left untouched. A present `location` replaces the
/// property's address and coordinates wholesale.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_per_month: Option<f64>,
    pub security_deposit: Option<f64>,
    pub application_fee: Option<f64>,
    pub photo_urls: Option<Vec<String>>,
    pub amenities: Option<Vec<String>>,
    pub highlights: Option<Vec<String>>,
    pub is_pets_allowed: Option<bool>,
    pub is_parking_included: Option<bool>,
    pub beds: Option<i64>,
    pub baths: Option<f64>,
    pub kitchens: Option<i64>,
    pub square_feet: Option<i64>,
    pub property_type: Option<PropertyType>,
    pub location: Option<NewLocation>,
}

impl PropertyUpdate {
    /// Apply the present fields onto `property`
    pub fn apply(self, property: &mut Property) {
        if let Some(v) = self.name {
            property.name = v;
        }
        if let Some(v) = self.description {
            property.description = v;
        }
        if let Some(v) = self.price_per_month {
            property.price_per_month = v;
        }
        if let Some(v) = self.security_deposit {
            property.security_deposit = v;
        }
        if let Some(v) = self.application_fee {
            property.application_fee = v;
        }
        if let Some(v) = self.photo_urls {
            property.photo_urls = v;
        }
        if let Some(v) = self.amenities {
            property.amenities = v;
        }
        if let Some(v) = self.highlights {
            property.highlights = v;
        }
        if let Some(v) = self.is_pets_allowed {
            property.is_pets_allowed = v;
        }
        if let Some(v) = self.is_parking_included {
            property.is_parking_included = v;
        }
        if let Some(v) = self.beds {
            property.beds = v;
        }
        if let Some(v) = self.baths {
            property.baths = v;
        }
        if let Some(v) = self.kitchens {
            property.kitchens = v;
        }
        if let Some(v) = self.square_feet {
            property.square_feet = v;
        }
        if let Some(v) = self.property_type {
            property.property_type = v;
        }
        if let Some(loc) = self.location {
            let location = &mut property.location;
            location.address = loc.address;
            location.city = loc.city;
            location.suburb = loc.suburb;
            location.state = loc.state;
            location.country = loc.country;
            location.postal_code = loc.postal_code;
            location.coordinates = Coordinates::new(loc.longitude, loc.latitude);
        }
    }
}

/// Payload for recording a lease
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLease {
    pub property_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub rent: f64,
}

/// Payload for changing a manager's status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: ManagerStatus,
}

/// Row counts reported by `digs stats`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub properties: u64,
    /// Properties that search can return (active manager, not disabled)
    pub searchable_properties: u64,
    pub disabled_properties: u64,
    pub managers: u64,
    pub leases: u64,
}

/// Manager entry in a seed document, with a fixed id for cross-references
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedManager {
    pub id: i64,
    #[serde(flatten)]
    pub manager: NewManager,
}

/// Property entry in a seed document, with a fixed id for cross-references
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedProperty {
    pub id: i64,
    #[serde(flatten)]
    pub property: NewProperty,
}

/// JSON document accepted by `digs import`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub managers: Vec<SeedManager>,
    #[serde(default)]
    pub properties: Vec<SeedProperty>,
    #[serde(default)]
    pub leases: Vec<NewLease>,
}

/// Result of an import
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub managers: usize,
    pub properties: usize,
    pub leases: usize,
}
