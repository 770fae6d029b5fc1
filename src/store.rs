//! Listings store backed by SQLite
//!
//! The store owns the relational schema:
//! - `managers`: manager accounts and their status
//! - `locations`: address fields plus longitude/latitude
//! - `properties`: listings; amenity/highlight/photo sets as JSON arrays
//! - `leases`: lease start/end per property
//! - `disabled_properties`: soft-delete markers
//! - `meta`: schema hash and bookkeeping
//!
//! A connection is opened per operation. Every connection gets the
//! `distance_meters` SQL function so radius predicates run inside SQLite.

use chrono::Utc;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::filter::fold_text;
use crate::geo::{haversine_meters, DISTANCE_FN};
use crate::models::{
    Coordinates, ImportReport, Lease, Location, Manager, ManagerStatus, NewLease, NewLocation,
    NewManager, NewProperty, Property, PropertyUpdate, SeedData, StoreStats,
};
use crate::query::{ComposedQuery, FOLD_FN, PROPERTY_COLUMNS, PROPERTY_FROM};

/// Hash of the schema-defining sources this binary was built from
pub const SCHEMA_HASH: &str = env!("DIGS_SCHEMA_HASH");

/// SQLite VM instructions between deadline checks
const PROGRESS_OPS: i32 = 1_000;

/// How long a writer waits on a locked database
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors surfaced by a listings store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("query exceeded the {}ms statement timeout", .0.as_millis())]
    Timeout(Duration),

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, StoreError::Timeout(_))
    }
}

/// Relational store of listings
pub trait ListingStore: Send + Sync {
    /// Execute a composed search
    fn search(&self, query: &ComposedQuery) -> Result<Vec<Property>, StoreError>;

    /// A single property unless it is disabled
    fn get_property(&self, id: i64) -> Result<Option<Property>, StoreError>;

    fn create_property(&self, property: &NewProperty) -> Result<Property, StoreError>;

    /// Returns `None` when the property does not exist or is disabled
    fn update_property(&self, id: i64, update: PropertyUpdate) -> Result<Option<Property>, StoreError>;

    /// Soft-delete; returns false when the property is missing or already disabled
    fn disable_property(&self, id: i64, reason: Option<&str>) -> Result<bool, StoreError>;

    fn create_manager(&self, manager: &NewManager) -> Result<Manager, StoreError>;

    fn set_manager_status(&self, id: i64, status: ManagerStatus) -> Result<Option<Manager>, StoreError>;

    fn create_lease(&self, lease: &NewLease) -> Result<Lease, StoreError>;

    fn stats(&self) -> Result<StoreStats, StoreError>;
}

/// SQLite implementation of [`ListingStore`]
pub struct SqliteStore {
    db_path: PathBuf,
    statement_timeout: Option<Duration>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `db_path`
    pub fn open(db_path: impl AsRef<Path>, statement_timeout: Option<Duration>) -> Result<Self, StoreError> {
        let store = Self {
            db_path: db_path.as_ref().to_path_buf(),
            statement_timeout,
        };
        store.init()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Delete the database file and its WAL side files
    pub fn reset(db_path: impl AsRef<Path>) -> Result<(), StoreError> {
        let db_path = db_path.as_ref();
        log::warn!("Removing database at {:?}", db_path);

        for suffix in ["", "-wal", "-shm"] {
            let mut name = db_path.as_os_str().to_owned();
            name.push(suffix);
            let path = PathBuf::from(name);
            if path.exists() {
                std::fs::remove_file(&path)?;
            }
        }

        Ok(())
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        register_functions(&conn)?;
        Ok(conn)
    }

    /// Create tables and indexes if missing and check the schema hash
    fn init(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = self.connect()?;

        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        log::debug!("Journal mode: {}", mode);

        conn.execute(
            "CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS managers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                phone_number TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'Pending'
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS locations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                address TEXT NOT NULL,
                city TEXT NOT NULL,
                suburb TEXT NOT NULL DEFAULT '',
                state TEXT NOT NULL DEFAULT '',
                country TEXT NOT NULL,
                postal_code TEXT NOT NULL DEFAULT '',
                longitude REAL NOT NULL,
                latitude REAL NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS properties (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                price_per_month REAL NOT NULL,
                security_deposit REAL NOT NULL DEFAULT 0,
                application_fee REAL NOT NULL DEFAULT 0,
                photo_urls TEXT NOT NULL DEFAULT '[]',
                amenities TEXT NOT NULL DEFAULT '[]',
                highlights TEXT NOT NULL DEFAULT '[]',
                is_pets_allowed INTEGER NOT NULL DEFAULT 0,
                is_parking_included INTEGER NOT NULL DEFAULT 0,
                beds INTEGER NOT NULL,
                baths REAL NOT NULL,
                kitchens INTEGER NOT NULL DEFAULT 1,
                square_feet INTEGER NOT NULL DEFAULT 0,
                property_type TEXT NOT NULL,
                posted_date TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                average_rating REAL,
                number_of_reviews INTEGER NOT NULL DEFAULT 0,
                location_id INTEGER NOT NULL,
                manager_id INTEGER NOT NULL,
                FOREIGN KEY (location_id) REFERENCES locations(id),
                FOREIGN KEY (manager_id) REFERENCES managers(id)
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_properties_manager ON properties(manager_id)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_properties_price ON properties(price_per_month)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS leases (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                property_id INTEGER NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                rent REAL NOT NULL,
                FOREIGN KEY (property_id) REFERENCES properties(id) ON DELETE CASCADE
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_leases_property ON leases(property_id, start_date)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS disabled_properties (
                property_id INTEGER PRIMARY KEY,
                reason TEXT,
                disabled_at TEXT NOT NULL,
                FOREIGN KEY (property_id) REFERENCES properties(id) ON DELETE CASCADE
            )",
            [],
        )?;

        self.check_schema_hash(&conn)?;

        log::debug!("Database schema ready at {:?}", self.db_path);
        Ok(())
    }

    /// Stamp the schema hash on first use, warn when it differs later
    fn check_schema_hash(&self, conn: &Connection) -> Result<(), StoreError> {
        let stored: Option<String> = conn
            .query_row("SELECT value FROM meta WHERE key = 'schema_hash'", [], |row| row.get(0))
            .optional()?;

        match stored {
            None => {
                conn.execute(
                    "INSERT INTO meta (key, value, updated_at) VALUES ('schema_hash', ?, ?)",
                    params![SCHEMA_HASH, Utc::now().timestamp()],
                )?;
            }
            Some(hash) if hash != SCHEMA_HASH => {
                log::warn!(
                    "Database {:?} was created by a build with schema {} (this build: {}). \
                     Run 'digs init --reset' if queries fail.",
                    self.db_path,
                    hash,
                    SCHEMA_HASH
                );
            }
            Some(_) => {}
        }

        Ok(())
    }

    /// Stored schema hash, if any
    pub fn schema_hash(&self) -> Result<Option<String>, StoreError> {
        let conn = self.connect()?;
        let hash = conn
            .query_row("SELECT value FROM meta WHERE key = 'schema_hash'", [], |row| row.get(0))
            .optional()?;
        Ok(hash)
    }

    pub fn get_manager(&self, id: i64) -> Result<Option<Manager>, StoreError> {
        let conn = self.connect()?;
        fetch_manager(&conn, id)
    }

    /// Load a seed document in one transaction
    ///
    /// Managers and properties keep the ids given in the document so leases
    /// and properties can reference them.
    pub fn import(&self, seed: &SeedData) -> Result<ImportReport, StoreError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let now = Utc::now();

        for entry in &seed.managers {
            insert_manager(&tx, Some(entry.id), &entry.manager)?;
        }

        for entry in &seed.properties {
            validate_property(&entry.property)?;
            if fetch_manager(&tx, entry.property.manager_id)?.is_none() {
                return Err(StoreError::NotFound(format!(
                    "manager {} (referenced by property {})",
                    entry.property.manager_id, entry.id
                )));
            }
            insert_property(&tx, Some(entry.id), &entry.property, now)?;
        }

        for lease in &seed.leases {
            insert_lease(&tx, lease)?;
        }

        tx.commit()?;

        let report = ImportReport {
            managers: seed.managers.len(),
            properties: seed.properties.len(),
            leases: seed.leases.len(),
        };
        log::info!(
            "Imported {} managers, {} properties, {} leases",
            report.managers,
            report.properties,
            report.leases
        );
        Ok(report)
    }
}

impl ListingStore for SqliteStore {
    fn search(&self, query: &ComposedQuery) -> Result<Vec<Property>, StoreError> {
        let conn = self.connect()?;
        install_deadline(&conn, self.statement_timeout);

        let sql = query.to_sql();
        log::debug!("Search SQL: {} ({} params)", sql.sql, sql.params.len());

        let classify = |e: rusqlite::Error| classify_error(e, self.statement_timeout);

        let mut stmt = conn.prepare(&sql.sql).map_err(classify)?;
        let rows = stmt
            .query_map(params_from_iter(sql.params.iter()), property_from_row)
            .map_err(classify)?;

        let properties = rows.collect::<Result<Vec<_>, _>>().map_err(classify)?;
        log::debug!("Search returned {} properties", properties.len());
        Ok(properties)
    }

    fn get_property(&self, id: i64) -> Result<Option<Property>, StoreError> {
        let conn = self.connect()?;
        fetch_property(&conn, id)
    }

    fn create_property(&self, property: &NewProperty) -> Result<Property, StoreError> {
        validate_property(property)?;

        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        if fetch_manager(&tx, property.manager_id)?.is_none() {
            return Err(StoreError::NotFound(format!("manager {}", property.manager_id)));
        }

        let id = insert_property(&tx, None, property, Utc::now())?;
        let created = fetch_property(&tx, id)?
            .ok_or_else(|| StoreError::NotFound(format!("property {}", id)))?;
        tx.commit()?;

        log::info!("Created property {} ({})", created.id, created.name);
        Ok(created)
    }

    fn update_property(&self, id: i64, update: PropertyUpdate) -> Result<Option<Property>, StoreError> {
        if let Some(location) = &update.location {
            validate_location(location)?;
        }

        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        let Some(mut property) = fetch_property(&tx, id)? else {
            return Ok(None);
        };

        update.apply(&mut property);
        validate_existing(&property)?;
        property.updated_at = Utc::now();

        tx.execute(
            "UPDATE properties SET
                name = ?, description = ?, price_per_month = ?, security_deposit = ?,
                application_fee = ?, photo_urls = ?, amenities = ?, highlights = ?,
                is_pets_allowed = ?, is_parking_included = ?, beds = ?, baths = ?,
                kitchens = ?, square_feet = ?, property_type = ?, updated_at = ?
             WHERE id = ?",
            params![
                property.name,
                property.description,
                property.price_per_month,
                property.security_deposit,
                property.application_fee,
                serde_json::to_string(&property.photo_urls)?,
                serde_json::to_string(&property.amenities)?,
                serde_json::to_string(&property.highlights)?,
                property.is_pets_allowed,
                property.is_parking_included,
                property.beds,
                property.baths,
                property.kitchens,
                property.square_feet,
                property.property_type.to_string(),
                property.updated_at,
                id,
            ],
        )?;

        let location = &property.location;
        tx.execute(
            "UPDATE locations SET
                address = ?, city = ?, suburb = ?, state = ?, country = ?,
                postal_code = ?, longitude = ?, latitude = ?
             WHERE id = ?",
            params![
                location.address,
                location.city,
                location.suburb,
                location.state,
                location.country,
                location.postal_code,
                location.coordinates.longitude,
                location.coordinates.latitude,
                location.id,
            ],
        )?;

        let updated = fetch_property(&tx, id)?;
        tx.commit()?;

        log::info!("Updated property {}", id);
        Ok(updated)
    }

    fn disable_property(&self, id: i64, reason: Option<&str>) -> Result<bool, StoreError> {
        let conn = self.connect()?;

        let exists = conn
            .query_row("SELECT 1 FROM properties WHERE id = ?", [id], |_| Ok(()))
            .optional()?
            .is_some();
        if !exists {
            return Ok(false);
        }

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO disabled_properties (property_id, reason, disabled_at) VALUES (?, ?, ?)",
            params![id, reason, Utc::now()],
        )?;

        if inserted > 0 {
            log::info!("Disabled property {}", id);
        }
        Ok(inserted > 0)
    }

    fn create_manager(&self, manager: &NewManager) -> Result<Manager, StoreError> {
        let conn = self.connect()?;
        let id = insert_manager(&conn, None, manager)?;
        fetch_manager(&conn, id)?.ok_or_else(|| StoreError::NotFound(format!("manager {}", id)))
    }

    fn set_manager_status(&self, id: i64, status: ManagerStatus) -> Result<Option<Manager>, StoreError> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "UPDATE managers SET status = ? WHERE id = ?",
            params![status.to_string(), id],
        )?;

        if changed == 0 {
            return Ok(None);
        }

        log::info!("Manager {} is now {}", id, status);
        fetch_manager(&conn, id)
    }

    fn create_lease(&self, lease: &NewLease) -> Result<Lease, StoreError> {
        let conn = self.connect()?;
        let exists = conn
            .query_row("SELECT 1 FROM properties WHERE id = ?", [lease.property_id], |_| Ok(()))
            .optional()?
            .is_some();
        if !exists {
            return Err(StoreError::NotFound(format!("property {}", lease.property_id)));
        }

        let id = insert_lease(&conn, lease)?;
        Ok(Lease {
            id,
            property_id: lease.property_id,
            start_date: lease.start_date,
            end_date: lease.end_date,
            rent: lease.rent,
        })
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        let conn = self.connect()?;
        let count = |sql: &str| -> Result<u64, StoreError> {
            let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n.max(0) as u64)
        };

        Ok(StoreStats {
            properties: count("SELECT COUNT(*) FROM properties")?,
            searchable_properties: count(
                "SELECT COUNT(*) FROM properties p
                 JOIN managers m ON m.id = p.manager_id
                 WHERE m.status = 'Active'
                   AND NOT EXISTS (SELECT 1 FROM disabled_properties d WHERE d.property_id = p.id)",
            )?,
            disabled_properties: count("SELECT COUNT(*) FROM disabled_properties")?,
            managers: count("SELECT COUNT(*) FROM managers")?,
            leases: count("SELECT COUNT(*) FROM leases")?,
        })
    }
}

/// Register the scalar SQL functions search predicates rely on
fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        DISTANCE_FN,
        4,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let lat1: f64 = ctx.get(0)?;
            let lng1: f64 = ctx.get(1)?;
            let lat2: f64 = ctx.get(2)?;
            let lng2: f64 = ctx.get(3)?;
            Ok(haversine_meters(lat1, lng1, lat2, lng2))
        },
    )?;

    // SQLite's LOWER only folds ASCII
    conn.create_scalar_function(
        FOLD_FN,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| fold_text(&t)))
        },
    )
}

/// Interrupt statements on `conn` once `timeout` has elapsed
fn install_deadline(conn: &Connection, timeout: Option<Duration>) {
    if let Some(timeout) = timeout {
        let deadline = Instant::now() + timeout;
        conn.progress_handler(PROGRESS_OPS, Some(move || Instant::now() >= deadline));
    }
}

/// Map an interrupted statement to `Timeout`, anything else to `Database`
fn classify_error(err: rusqlite::Error, timeout: Option<Duration>) -> StoreError {
    let interrupted = matches!(
        &err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::OperationInterrupted
    );

    match timeout {
        Some(timeout) if interrupted => {
            log::warn!("Search interrupted after {:?}", timeout);
            StoreError::Timeout(timeout)
        }
        _ => StoreError::Database(err),
    }
}

fn validate_location(location: &NewLocation) -> Result<(), StoreError> {
    let coordinates = Coordinates::new(location.longitude, location.latitude);
    if !coordinates.is_usable()
        || !(-90.0..=90.0).contains(&location.latitude)
        || !(-180.0..=180.0).contains(&location.longitude)
    {
        return Err(StoreError::Invalid(format!(
            "coordinates ({}, {}) are not a valid location",
            location.longitude, location.latitude
        )));
    }
    if location.address.trim().is_empty() || location.city.trim().is_empty() {
        return Err(StoreError::Invalid("address and city are required".into()));
    }
    Ok(())
}

fn validate_numbers(price: f64, deposit: f64, fee: f64, beds: i64, baths: f64, kitchens: i64, square_feet: i64) -> Result<(), StoreError> {
    let money_ok = [price, deposit, fee].iter().all(|v| v.is_finite() && *v >= 0.0);
    let counts_ok = beds >= 0 && kitchens >= 0 && square_feet >= 0 && baths.is_finite() && baths >= 0.0;
    if !money_ok || !counts_ok {
        return Err(StoreError::Invalid("amounts and counts must be non-negative".into()));
    }
    Ok(())
}

fn validate_property(property: &NewProperty) -> Result<(), StoreError> {
    if property.name.trim().is_empty() {
        return Err(StoreError::Invalid("property name is required".into()));
    }
    validate_numbers(
        property.price_per_month,
        property.security_deposit,
        property.application_fee,
        property.beds,
        property.baths,
        property.kitchens,
        property.square_feet,
    )?;
    validate_location(&property.location)
}

fn validate_existing(property: &Property) -> Result<(), StoreError> {
    if property.name.trim().is_empty() {
        return Err(StoreError::Invalid("property name is required".into()));
    }
    validate_numbers(
        property.price_per_month,
        property.security_deposit,
        property.application_fee,
        property.beds,
        property.baths,
        property.kitchens,
        property.square_feet,
    )
}

fn insert_manager(conn: &Connection, id: Option<i64>, manager: &NewManager) -> Result<i64, StoreError> {
    if manager.email.trim().is_empty() {
        return Err(StoreError::Invalid("manager email is required".into()));
    }

    let result = conn.execute(
        "INSERT INTO managers (id, name, email, phone_number, status) VALUES (?, ?, ?, ?, ?)",
        params![
            id,
            manager.name,
            manager.email,
            manager.phone_number,
            manager.status.to_string()
        ],
    );

    match result {
        Ok(_) => Ok(conn.last_insert_rowid()),
        Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
            Err(StoreError::Conflict(format!("manager {} already exists", manager.email)))
        }
        Err(e) => Err(e.into()),
    }
}

fn insert_property(
    conn: &Connection,
    id: Option<i64>,
    property: &NewProperty,
    now: chrono::DateTime<Utc>,
) -> Result<i64, StoreError> {
    let location = &property.location;
    conn.execute(
        "INSERT INTO locations (address, city, suburb, state, country, postal_code, longitude, latitude)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            location.address,
            location.city,
            location.suburb,
            location.state,
            location.country,
            location.postal_code,
            location.longitude,
            location.latitude,
        ],
    )?;
    let location_id = conn.last_insert_rowid();

    conn.execute(
        "INSERT INTO properties (
            id, name, description, price_per_month, security_deposit, application_fee,
            photo_urls, amenities, highlights, is_pets_allowed, is_parking_included,
            beds, baths, kitchens, square_feet, property_type,
            posted_date, created_at, updated_at, location_id, manager_id
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            id,
            property.name,
            property.description,
            property.price_per_month,
            property.security_deposit,
            property.application_fee,
            serde_json::to_string(&property.photo_urls)?,
            serde_json::to_string(&property.amenities)?,
            serde_json::to_string(&property.highlights)?,
            property.is_pets_allowed,
            property.is_parking_included,
            property.beds,
            property.baths,
            property.kitchens,
            property.square_feet,
            property.property_type.to_string(),
            now,
            now,
            now,
            location_id,
            property.manager_id,
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

fn insert_lease(conn: &Connection, lease: &NewLease) -> Result<i64, StoreError> {
    if lease.end_date < lease.start_date {
        return Err(StoreError::Invalid(format!(
            "lease ends ({}) before it starts ({})",
            lease.end_date, lease.start_date
        )));
    }

    conn.execute(
        "INSERT INTO leases (property_id, start_date, end_date, rent) VALUES (?, ?, ?, ?)",
        params![lease.property_id, lease.start_date, lease.end_date, lease.rent],
    )?;
    Ok(conn.last_insert_rowid())
}

fn fetch_property(conn: &Connection, id: i64) -> Result<Option<Property>, StoreError> {
    let sql = format!(
        "SELECT {} {} WHERE p.id = ?
           AND NOT EXISTS (SELECT 1 FROM disabled_properties d WHERE d.property_id = p.id)",
        PROPERTY_COLUMNS, PROPERTY_FROM
    );
    let property = conn.query_row(&sql, [id], property_from_row).optional()?;
    Ok(property)
}

fn fetch_manager(conn: &Connection, id: i64) -> Result<Option<Manager>, StoreError> {
    let manager = conn
        .query_row(
            "SELECT id, name, email, phone_number, status FROM managers WHERE id = ?",
            [id],
            |row| {
                Ok(Manager {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                    phone_number: row.get(3)?,
                    status: parsed_column(row, 4)?,
                })
            },
        )
        .optional()?;
    Ok(manager)
}

/// Map a row selected with [`PROPERTY_COLUMNS`]
fn property_from_row(row: &Row) -> rusqlite::Result<Property> {
    Ok(Property {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        price_per_month: row.get(3)?,
        security_deposit: row.get(4)?,
        application_fee: row.get(5)?,
        photo_urls: json_column(row, 6)?,
        amenities: json_column(row, 7)?,
        highlights: json_column(row, 8)?,
        is_pets_allowed: row.get(9)?,
        is_parking_included: row.get(10)?,
        beds: row.get(11)?,
        baths: row.get(12)?,
        kitchens: row.get(13)?,
        square_feet: row.get(14)?,
        property_type: parsed_column(row, 15)?,
        posted_date: row.get(16)?,
        created_at: row.get(17)?,
        updated_at: row.get(18)?,
        average_rating: row.get(19)?,
        number_of_reviews: row.get(20)?,
        location_id: row.get(21)?,
        manager_id: row.get(22)?,
        location: Location {
            id: row.get(23)?,
            address: row.get(24)?,
            city: row.get(25)?,
            suburb: row.get(26)?,
            state: row.get(27)?,
            country: row.get(28)?,
            postal_code: row.get(29)?,
            coordinates: Coordinates::new(row.get(30)?, row.get(31)?),
        },
    })
}

fn json_column<T: DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parsed_column<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
