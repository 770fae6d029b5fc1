//! Search filters: query-string parsing and normalization
//!
//! A [`Filter`] lives for one request. It is built from the raw
//! [`SearchParams`] with every malformed value clamped or dropped rather than
//! rejected, so a bad `beds=abc` narrows nothing instead of failing the page.

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::SearchConfig;
use crate::models::{Coordinates, PropertyType};

/// Raw query-string parameters of `GET /properties`
///
/// Every field stays a string so parsing failures can be ignored per field
/// instead of rejecting the whole request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub location: Option<String>,
    pub property_name: Option<String>,
    /// "lng,lat"
    pub coordinates: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub price_min: Option<String>,
    pub price_max: Option<String>,
    pub beds: Option<String>,
    pub baths: Option<String>,
    pub property_type: Option<String>,
    pub square_feet_min: Option<String>,
    pub square_feet_max: Option<String>,
    /// Comma-separated
    pub amenities: Option<String>,
    pub available_from: Option<String>,
    /// Comma-separated property ids
    pub favorite_ids: Option<String>,
    pub limit: Option<String>,
}

impl SearchParams {
    /// Build from raw query pairs, keeping the first value of a repeated key
    ///
    /// `beds=2&beds=3` searches for two beds; unknown keys are ignored.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            if let Some(slot) = params.slot(key.as_ref()) {
                if slot.is_none() {
                    *slot = Some(value.into());
                }
            }
        }
        params
    }

    fn slot(&mut self, key: &str) -> Option<&mut Option<String>> {
        let slot = match key {
            "location" => &mut self.location,
            "propertyName" => &mut self.property_name,
            "coordinates" => &mut self.coordinates,
            "latitude" => &mut self.latitude,
            "longitude" => &mut self.longitude,
            "priceMin" => &mut self.price_min,
            "priceMax" => &mut self.price_max,
            "beds" => &mut self.beds,
            "baths" => &mut self.baths,
            "propertyType" => &mut self.property_type,
            "squareFeetMin" => &mut self.square_feet_min,
            "squareFeetMax" => &mut self.square_feet_max,
            "amenities" => &mut self.amenities,
            "availableFrom" => &mut self.available_from,
            "favoriteIds" => &mut self.favorite_ids,
            "limit" => &mut self.limit,
            _ => return None,
        };
        Some(slot)
    }
}

/// Normalized, request-scoped search filter
///
/// List fields are sorted and de-duplicated, so two filters that select the
/// same rows compare equal and share a cache key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Filter {
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub beds: Option<i64>,
    pub baths: Option<f64>,
    pub square_feet_min: Option<i64>,
    pub square_feet_max: Option<i64>,
    pub property_type: Option<PropertyType>,
    pub amenities: Vec<String>,
    /// Lower-cased, suffix-stripped, whitespace-collapsed; never empty
    pub location: Option<String>,
    /// Only ever holds usable coordinates
    pub coordinates: Option<Coordinates>,
    /// Lower-cased; never empty
    pub property_name: Option<String>,
    pub available_from: Option<NaiveDate>,
    pub favorite_ids: Vec<i64>,
    pub limit: usize,
}

impl Default for Filter {
    fn default() -> Self {
        Self::new(SearchConfig::default().default_limit)
    }
}

impl Filter {
    /// A filter that matches everything, bounded by `limit`
    pub fn new(limit: usize) -> Self {
        Self {
            price_min: None,
            price_max: None,
            beds: None,
            baths: None,
            square_feet_min: None,
            square_feet_max: None,
            property_type: None,
            amenities: Vec::new(),
            location: None,
            coordinates: None,
            property_name: None,
            available_from: None,
            favorite_ids: Vec::new(),
            limit,
        }
    }

    /// Build a filter from raw query parameters
    pub fn from_params(params: &SearchParams, config: &SearchConfig) -> Self {
        let mut amenities = split_list(params.amenities.as_deref())
            .map(str::to_string)
            .collect::<Vec<_>>();
        amenities.sort();
        amenities.dedup();

        let mut favorite_ids = split_list(params.favorite_ids.as_deref())
            .filter_map(|s| s.parse::<i64>().ok())
            .collect::<Vec<_>>();
        favorite_ids.sort_unstable();
        favorite_ids.dedup();

        let property_type = params
            .property_type
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("any"))
            .and_then(|s| match s.parse::<PropertyType>() {
                Ok(t) => Some(t),
                Err(_) => {
                    log::debug!("Ignoring unknown property type '{}'", s);
                    None
                }
            });

        let property_name = params
            .property_name
            .as_deref()
            .map(fold_text)
            .filter(|s| !s.is_empty());

        Self {
            price_min: parse_amount(params.price_min.as_deref()),
            price_max: parse_amount(params.price_max.as_deref()),
            beds: parse_count(params.beds.as_deref()),
            baths: parse_amount(params.baths.as_deref()),
            square_feet_min: parse_count(params.square_feet_min.as_deref()),
            square_feet_max: parse_count(params.square_feet_max.as_deref()),
            property_type,
            amenities,
            location: params
                .location
                .as_deref()
                .and_then(|raw| normalize_location(raw, &config.country)),
            coordinates: parse_coordinates(params),
            property_name,
            available_from: parse_date(params.available_from.as_deref()),
            favorite_ids,
            limit: clamp_limit(params.limit.as_deref(), config),
        }
    }

    /// True when a location, name or coordinate filter is present
    ///
    /// These searches are specific to one visitor and get the shorter TTL.
    pub fn is_targeted(&self) -> bool {
        self.location.is_some() || self.property_name.is_some() || self.coordinates.is_some()
    }

    /// Stable cache key for this filter
    ///
    /// The key is a digest of the canonical JSON form (serde_json orders map
    /// keys), so parameter order on the query string never matters.
    pub fn cache_key(&self) -> String {
        let canonical = serde_json::to_value(self)
            .map(|v| v.to_string())
            .unwrap_or_else(|_| format!("{:?}", self));

        format!("search:{}", blake3::hash(canonical.as_bytes()).to_hex())
    }
}

fn split_list(raw: Option<&str>) -> impl Iterator<Item = &str> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Parse a non-negative, finite decimal
fn parse_amount(raw: Option<&str>) -> Option<f64> {
    let value = raw?.trim().parse::<f64>().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value)
}

/// Parse a non-negative whole number; "2.0" counts as 2
fn parse_count(raw: Option<&str>) -> Option<i64> {
    let raw = raw?.trim();
    if let Ok(value) = raw.parse::<i64>() {
        return (value >= 0).then_some(value);
    }
    let value = parse_amount(Some(raw))?;
    (value.fract() == 0.0 && value <= i64::MAX as f64).then_some(value as i64)
}

fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw?.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("any") {
        return None;
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

/// Coordinates from `coordinates=lng,lat`, falling back to `longitude`/`latitude`
///
/// Returns `None` unless the pair is usable (finite, not `[0, 0]`).
pub fn parse_coordinates(params: &SearchParams) -> Option<Coordinates> {
    let from_pair = params.coordinates.as_deref().and_then(|raw| {
        let mut parts = raw.split(',').map(str::trim);
        let lng = parts.next()?.parse::<f64>().ok()?;
        let lat = parts.next()?.parse::<f64>().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Coordinates::new(lng, lat))
    });

    let coordinates = from_pair.or_else(|| {
        let lng = params.longitude.as_deref()?.trim().parse::<f64>().ok()?;
        let lat = params.latitude.as_deref()?.trim().parse::<f64>().ok()?;
        Some(Coordinates::new(lng, lat))
    })?;

    coordinates.is_usable().then_some(coordinates)
}

/// Clamp the requested limit into `[1, max_limit]`
///
/// Missing or unparseable values use the default; zero and negatives clamp
/// to 1.
pub fn clamp_limit(raw: Option<&str>, config: &SearchConfig) -> usize {
    let max = config.max_limit.max(1);
    let default = config.default_limit.clamp(1, max);

    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => default,
        Some(raw) => match raw.parse::<i64>() {
            Ok(n) if n < 1 => 1,
            Ok(n) => usize::try_from(n).map_or(max, |n| n.min(max)),
            Err(_) => {
                log::debug!("Ignoring unparseable limit '{}'", raw);
                default
            }
        },
    }
}

/// Normalize a free-text location for matching
///
/// Lower-cases, strips a trailing `, <country>`, and collapses whitespace.
/// Returns `None` when nothing is left.
pub fn normalize_location(raw: &str, country: &str) -> Option<String> {
    let collapsed = fold_text(raw);
    let country = fold_text(country);

    let mut normalized = collapsed.as_str();
    if !country.is_empty() {
        if let Some(head) = normalized.strip_suffix(country.as_str()) {
            if let Some(head) = head.trim_end().strip_suffix(',') {
                normalized = head;
            }
        }
    }

    let normalized = normalized.trim().trim_end_matches(',').trim();
    (!normalized.is_empty()).then(|| normalized.to_string())
}

/// Unicode lower-case with whitespace runs collapsed to one space
///
/// Applied to search input here and to stored text inside SQLite, so both
/// sides of a comparison are folded the same way.
pub fn fold_text(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Escape LIKE wildcards so user input matches literally (`ESCAPE '\'`)
pub fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
