//! Query composer for property search
//!
//! A [`Filter`] is translated into an ordered list of typed [`Predicate`]s.
//! Each predicate renders its own SQL text with positional `?` placeholders
//! and carries the matching parameter values, so user input never reaches the
//! statement text. The predicates are joined with `AND` into a single
//! `SELECT` over properties, their location and their manager.

use chrono::NaiveDate;
use rusqlite::types::Value;

use crate::filter::{escape_like, Filter};
use crate::geo::DISTANCE_FN;
use crate::models::{Coordinates, ManagerStatus, PropertyType};

/// Columns selected for every property read, in row-mapping order
pub const PROPERTY_COLUMNS: &str = "p.id, p.name, p.description, p.price_per_month, \
     p.security_deposit, p.application_fee, p.photo_urls, p.amenities, p.highlights, \
     p.is_pets_allowed, p.is_parking_included, p.beds, p.baths, p.kitchens, p.square_feet, \
     p.property_type, p.posted_date, p.created_at, p.updated_at, p.average_rating, \
     p.number_of_reviews, p.location_id, p.manager_id, \
     l.id, l.address, l.city, l.suburb, l.state, l.country, l.postal_code, \
     l.longitude, l.latitude";

/// Join of a property with its location and manager
pub const PROPERTY_FROM: &str = "FROM properties p \
     JOIN locations l ON l.id = p.location_id \
     JOIN managers m ON m.id = p.manager_id";

/// Location columns the free-text location is matched against
/// SQL name of [`crate::filter::fold_text`], registered on every store connection
pub const FOLD_FN: &str = "fold_text";

const LOCATION_FIELDS: [&str; 4] = ["l.address", "l.city", "l.suburb", "l.state"];

/// SQL text plus its positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<Value>,
}

impl SqlFragment {
    fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self { sql: sql.into(), params }
    }
}

/// How the free-text location is compared against address fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationMatch {
    /// Whole-field equality, tried first
    Exact,
    /// Literal substring match, used when exact matching finds nothing
    Substring,
}

/// One boolean condition of a search
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    WithinRadius { center: Coordinates, meters: f64 },
    PriceAtLeast(f64),
    PriceAtMost(f64),
    BedsAtLeast(i64),
    BathsAtLeast(f64),
    SquareFeetAtLeast(i64),
    SquareFeetAtMost(i64),
    PropertyTypeIs(PropertyType),
    /// Property amenities are a superset of these
    HasAmenities(Vec<String>),
    /// A lease on the property starts on or before this date
    LeaseStartsBy(NaiveDate),
    IdIn(Vec<i64>),
    /// Lower-cased name substring
    NameContains(String),
    /// Lower-cased normalized location
    Location { text: String, mode: LocationMatch },
    ManagerActive,
    NotDisabled,
}

impl Predicate {
    /// Render this predicate with its bindings
    pub fn to_sql(&self) -> SqlFragment {
        match self {
            Predicate::WithinRadius { center, meters } => SqlFragment::new(
                format!("{}(l.latitude, l.longitude, ?, ?) <= ?", DISTANCE_FN),
                vec![
                    Value::Real(center.latitude),
                    Value::Real(center.longitude),
                    Value::Real(*meters),
                ],
            ),
            Predicate::PriceAtLeast(v) => {
                SqlFragment::new("p.price_per_month >= ?", vec![Value::Real(*v)])
            }
            Predicate::PriceAtMost(v) => {
                SqlFragment::new("p.price_per_month <= ?", vec![Value::Real(*v)])
            }
            Predicate::BedsAtLeast(v) => SqlFragment::new("p.beds >= ?", vec![Value::Integer(*v)]),
            Predicate::BathsAtLeast(v) => SqlFragment::new("p.baths >= ?", vec![Value::Real(*v)]),
            Predicate::SquareFeetAtLeast(v) => {
                SqlFragment::new("p.square_feet >= ?", vec![Value::Integer(*v)])
            }
            Predicate::SquareFeetAtMost(v) => {
                SqlFragment::new("p.square_feet <= ?", vec![Value::Integer(*v)])
            }
            Predicate::PropertyTypeIs(t) => {
                SqlFragment::new("p.property_type = ?", vec![Value::Text(t.to_string())])
            }
            Predicate::HasAmenities(amenities) => {
                let sql = amenities
                    .iter()
                    .map(|_| "EXISTS (SELECT 1 FROM json_each(p.amenities) a WHERE a.value = ?)")
                    .collect::<Vec<_>>()
                    .join(" AND ");
                let params = amenities.iter().map(|a| Value::Text(a.clone())).collect();
                SqlFragment::new(format!("({})", sql), params)
            }
            Predicate::LeaseStartsBy(date) => SqlFragment::new(
                "EXISTS (SELECT 1 FROM leases le WHERE le.property_id = p.id AND le.start_date <= ?)",
                vec![Value::Text(date.format("%Y-%m-%d").to_string())],
            ),
            Predicate::IdIn(ids) => {
                let placeholders = vec!["?"; ids.len()].join(", ");
                SqlFragment::new(
                    format!("p.id IN ({})", placeholders),
                    ids.iter().map(|id| Value::Integer(*id)).collect(),
                )
            }
            Predicate::NameContains(name) => SqlFragment::new(
                format!("{}(p.name) LIKE ? ESCAPE '\\'", FOLD_FN),
                vec![Value::Text(format!("%{}%", escape_like(name)))],
            ),
            Predicate::Location { text, mode } => {
                let (template, value) = match mode {
                    LocationMatch::Exact => ("= ?", text.clone()),
                    LocationMatch::Substring => {
                        ("LIKE ? ESCAPE '\\'", format!("%{}%", escape_like(text)))
                    }
                };
                let sql = LOCATION_FIELDS
                    .iter()
                    .map(|field| format!("{}({}) {}", FOLD_FN, field, template))
                    .collect::<Vec<_>>()
                    .join(" OR ");
                SqlFragment::new(
                    format!("({})", sql),
                    vec![Value::Text(value); LOCATION_FIELDS.len()],
                )
            }
            Predicate::ManagerActive => SqlFragment::new(
                "m.status = ?",
                vec![Value::Text(ManagerStatus::Active.to_string())],
            ),
            Predicate::NotDisabled => SqlFragment::new(
                "NOT EXISTS (SELECT 1 FROM disabled_properties d WHERE d.property_id = p.id)",
                vec![],
            ),
        }
    }
}

/// A fully composed search, ready for the store to execute
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedQuery {
    pub predicates: Vec<Predicate>,
    pub limit: usize,
}

impl ComposedQuery {
    /// Same predicates with a different row limit
    pub fn with_limit(&self, limit: usize) -> Self {
        Self {
            predicates: self.predicates.clone(),
            limit,
        }
    }

    /// How the text location is matched, if a text location is applied
    pub fn location_mode(&self) -> Option<LocationMatch> {
        self.predicates.iter().find_map(|p| match p {
            Predicate::Location { mode, .. } => Some(*mode),
            _ => None,
        })
    }

    pub fn has_radius(&self) -> bool {
        self.predicates
            .iter()
            .any(|p| matches!(p, Predicate::WithinRadius { .. }))
    }

    /// Conjunction of every predicate
    pub fn where_clause(&self) -> SqlFragment {
        let mut clauses = Vec::with_capacity(self.predicates.len());
        let mut params = Vec::new();

        for predicate in &self.predicates {
            let fragment = predicate.to_sql();
            clauses.push(fragment.sql);
            params.extend(fragment.params);
        }

        if clauses.is_empty() {
            return SqlFragment::new("1 = 1", params);
        }

        SqlFragment::new(clauses.join(" AND "), params)
    }

    /// The complete statement, newest listings first
    pub fn to_sql(&self) -> SqlFragment {
        let mut fragment = self.where_clause();
        fragment.sql = format!(
            "SELECT {} {} WHERE {} ORDER BY p.id DESC LIMIT ?",
            PROPERTY_COLUMNS, PROPERTY_FROM, fragment.sql
        );
        fragment.params.push(Value::Integer(self.limit as i64));
        fragment
    }
}

/// Turns filters into composed queries
#[derive(Debug, Clone)]
pub struct QueryComposer {
    radius_meters: f64,
}

impl QueryComposer {
    pub fn new(radius_meters: f64) -> Self {
        Self { radius_meters }
    }

    pub fn radius_meters(&self) -> f64 {
        self.radius_meters
    }

    /// Build the predicate list for `filter`
    ///
    /// Usable coordinates put the radius predicate first and suppress the
    /// text location; otherwise a text location (if any) goes last among the
    /// filter predicates using `mode`. The name predicate is independent of
    /// both. Manager status and the disabled marker always apply.
    pub fn compose(&self, filter: &Filter, mode: LocationMatch) -> ComposedQuery {
        let mut predicates = Vec::new();

        if let Some(center) = filter.coordinates.filter(Coordinates::is_usable) {
            predicates.push(Predicate::WithinRadius {
                center,
                meters: self.radius_meters,
            });
        }
        let has_radius = !predicates.is_empty();

        if let Some(v) = filter.price_min {
            predicates.push(Predicate::PriceAtLeast(v));
        }
        if let Some(v) = filter.price_max {
            predicates.push(Predicate::PriceAtMost(v));
        }
        if let Some(v) = filter.beds {
            predicates.push(Predicate::BedsAtLeast(v));
        }
        if let Some(v) = filter.baths {
            predicates.push(Predicate::BathsAtLeast(v));
        }
        if let Some(v) = filter.square_feet_min {
            predicates.push(Predicate::SquareFeetAtLeast(v));
        }
        if let Some(v) = filter.square_feet_max {
            predicates.push(Predicate::SquareFeetAtMost(v));
        }
        if let Some(t) = filter.property_type {
            predicates.push(Predicate::PropertyTypeIs(t));
        }
        if !filter.amenities.is_empty() {
            predicates.push(Predicate::HasAmenities(filter.amenities.clone()));
        }
        if let Some(date) = filter.available_from {
            predicates.push(Predicate::LeaseStartsBy(date));
        }
        if !filter.favorite_ids.is_empty() {
            predicates.push(Predicate::IdIn(filter.favorite_ids.clone()));
        }
        if let Some(name) = filter.property_name.as_deref().filter(|s| !s.is_empty()) {
            predicates.push(Predicate::NameContains(name.to_string()));
        }

        if !has_radius {
            if let Some(text) = filter.location.as_deref().filter(|s| !s.is_empty()) {
                predicates.push(Predicate::Location {
                    text: text.to_string(),
                    mode,
                });
            }
        }

        predicates.push(Predicate::ManagerActive);
        predicates.push(Predicate::NotDisabled);

        ComposedQuery {
            predicates,
            limit: filter.limit.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn composer() -> QueryComposer {
        QueryComposer::new(20_000.0)
    }

    fn placeholders(sql: &str) -> usize {
        sql.matches('?').count()
    }

    #[test]
    fn test_empty_filter_only_visibility_predicates() {
        let query = composer().compose(&Filter::default(), LocationMatch::Exact);
        assert_eq!(query.predicates, vec![Predicate::ManagerActive, Predicate::NotDisabled]);
        assert_eq!(query.limit, 50);
    }

    #[test]
    fn test_coordinates_prepend_radius_and_suppress_location() {
        let filter = Filter {
            coordinates: Some(Coordinates::new(18.42, -33.92)),
            location: Some("cape town".into()),
            price_min: Some(2000.0),
            ..Filter::default()
        };
        let query = composer().compose(&filter, LocationMatch::Exact);

        assert!(matches!(query.predicates[0], Predicate::WithinRadius { meters, .. } if meters == 20_000.0));
        assert_eq!(query.location_mode(), None);
        assert!(query.has_radius());
    }

    #[test]
    fn test_zero_coordinates_do_not_suppress_location() {
        let filter = Filter {
            coordinates: Some(Coordinates::new(0.0, 0.0)),
            location: Some("cape town".into()),
            ..Filter::default()
        };
        let query = composer().compose(&filter, LocationMatch::Exact);

        assert!(!query.has_radius());
        assert_eq!(query.location_mode(), Some(LocationMatch::Exact));
    }

    #[test]
    fn test_location_appended_after_filters() {
        let filter = Filter {
            location: Some("rondebosch".into()),
            beds: Some(2),
            ..Filter::default()
        };
        let query = composer().compose(&filter, LocationMatch::Substring);

        assert_eq!(query.predicates[0], Predicate::BedsAtLeast(2));
        assert_eq!(
            query.predicates[1],
            Predicate::Location {
                text: "rondebosch".into(),
                mode: LocationMatch::Substring
            }
        );
    }

    #[test]
    fn test_name_applies_alongside_coordinates() {
        let filter = Filter {
            coordinates: Some(Coordinates::new(18.42, -33.92)),
            property_name: Some("loft".into()),
            ..Filter::default()
        };
        let query = composer().compose(&filter, LocationMatch::Exact);

        assert!(query.predicates.contains(&Predicate::NameContains("loft".into())));
        assert!(query.has_radius());
    }

    #[test]
    fn test_every_filter_field_contributes() {
        let filter = Filter {
            price_min: Some(1.0),
            price_max: Some(2.0),
            beds: Some(1),
            baths: Some(1.0),
            square_feet_min: Some(10),
            square_feet_max: Some(20),
            property_type: Some(PropertyType::Studio),
            amenities: vec!["WiFi".into()],
            available_from: NaiveDate::from_ymd_opt(2026, 1, 1),
            favorite_ids: vec![1, 2],
            property_name: Some("x".into()),
            location: Some("y".into()),
            ..Filter::default()
        };
        let query = composer().compose(&filter, LocationMatch::Exact);

        // 12 filter predicates + manager + disabled
        assert_eq!(query.predicates.len(), 14);
    }

    #[test]
    fn test_placeholders_match_params() {
        let filter = Filter {
            coordinates: Some(Coordinates::new(18.42, -33.92)),
            amenities: vec!["Parking".into(), "WiFi".into()],
            favorite_ids: vec![3, 4, 5],
            property_name: Some("50%".into()),
            available_from: NaiveDate::from_ymd_opt(2026, 3, 1),
            ..Filter::default()
        };
        let sql = composer().compose(&filter, LocationMatch::Exact).to_sql();
        assert_eq!(placeholders(&sql.sql), sql.params.len());

        let filter = Filter {
            location: Some("sea point".into()),
            ..Filter::default()
        };
        for mode in [LocationMatch::Exact, LocationMatch::Substring] {
            let sql = composer().compose(&filter, mode).to_sql();
            assert_eq!(placeholders(&sql.sql), sql.params.len());
        }
    }

    #[test]
    fn test_statement_shape() {
        let sql = composer().compose(&Filter::new(7), LocationMatch::Exact).to_sql();
        assert!(sql.sql.starts_with("SELECT p.id, p.name"));
        assert!(sql.sql.ends_with("ORDER BY p.id DESC LIMIT ?"));
        assert_eq!(sql.params.last(), Some(&Value::Integer(7)));
        assert_eq!(sql.params[0], Value::Text("Active".into()));
    }

    #[test]
    fn test_location_modes_render() {
        let exact = Predicate::Location {
            text: "cape town".into(),
            mode: LocationMatch::Exact,
        }
        .to_sql();
        assert!(exact.sql.contains("fold_text(l.city) = ?"));
        assert_eq!(exact.params.len(), 4);
        assert_eq!(exact.params[0], Value::Text("cape town".into()));

        let substring = Predicate::Location {
            text: "100%".into(),
            mode: LocationMatch::Substring,
        }
        .to_sql();
        assert!(substring.sql.contains("fold_text(l.suburb) LIKE ? ESCAPE"));
        assert_eq!(substring.params[0], Value::Text("%100\\%%".into()));
    }

    #[test]
    fn test_with_limit_keeps_predicates() {
        let filter = Filter {
            beds: Some(3),
            ..Filter::new(80)
        };
        let query = composer().compose(&filter, LocationMatch::Exact);
        let degraded = query.with_limit(10);
        assert_eq!(degraded.limit, 10);
        assert_eq!(degraded.predicates, query.predicates);
    }
}
