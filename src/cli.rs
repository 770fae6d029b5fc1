//! CLI argument parsing and command handlers

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::cache::MemoryCache;
use crate::config::{load_config, AppConfig};
use crate::filter::{Filter, SearchParams};
use crate::models::{Property, SeedData};
use crate::output;
use crate::search::SearchService;
use crate::server::{self, AppState};
use crate::store::{ListingStore, SqliteStore};

/// digs: search service for student-accommodation listings
#[derive(Parser, Debug)]
#[command(
    name = "digs",
    version,
    about = "Search and manage student-accommodation listings",
    long_about = "digs serves a filtered, cached search over rental listings backed by a \
                  local SQLite database. Run 'digs init' to create the database, \
                  'digs import' to load listings and 'digs serve' to start the HTTP API."
)]
pub struct Cli {
    /// Enable verbose logging (can be repeated for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ./digs.toml when present)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP API server
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// SQLite database file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// Create the database schema
    Init {
        /// SQLite database file
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Delete any existing database first
        #[arg(long)]
        reset: bool,
    },

    /// Load managers, properties and leases from a JSON seed file
    ///
    /// The file holds three arrays: `managers`, `properties` (each with a
    /// nested `location`) and `leases`. Managers and properties carry explicit
    /// ids. The whole file is loaded in one transaction.
    ///
    /// Examples:
    ///   digs import seed.json
    ///   digs import seed.json --database /tmp/digs.db
    Import {
        /// Seed file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// SQLite database file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// Run a search against the database
    ///
    /// Takes the same filters as GET /properties. Malformed values are
    /// ignored rather than rejected.
    ///
    /// Examples:
    ///   digs search --location "Cape Town" --beds 2
    ///   digs search --coordinates "18.42,-33.92" --price-max 5000
    ///   digs search --amenities WiFi,Parking --json --pretty
    Search {
        /// Free-text location (city, suburb, state or address)
        #[arg(long)]
        location: Option<String>,

        /// Substring of the property name
        #[arg(long)]
        property_name: Option<String>,

        /// "longitude,latitude" pair; takes precedence over --latitude/--longitude
        #[arg(long, allow_hyphen_values = true)]
        coordinates: Option<String>,

        #[arg(long, allow_hyphen_values = true)]
        latitude: Option<String>,

        #[arg(long, allow_hyphen_values = true)]
        longitude: Option<String>,

        /// Minimum monthly price
        #[arg(long)]
        price_min: Option<String>,

        /// Maximum monthly price
        #[arg(long)]
        price_max: Option<String>,

        /// Minimum bedrooms
        #[arg(long)]
        beds: Option<String>,

        /// Minimum bathrooms
        #[arg(long)]
        baths: Option<String>,

        /// Property type (Rooms, Tinyhouse, Apartment, Villa, ...)
        #[arg(long)]
        property_type: Option<String>,

        #[arg(long)]
        square_feet_min: Option<String>,

        #[arg(long)]
        square_feet_max: Option<String>,

        /// Comma-separated amenities that must all be present
        #[arg(long)]
        amenities: Option<String>,

        /// Only properties with a lease starting on or before this date (YYYY-MM-DD)
        #[arg(long)]
        available_from: Option<String>,

        /// Comma-separated property ids
        #[arg(long)]
        favorite_ids: Option<String>,

        /// Maximum results (clamped to the configured range)
        #[arg(short, long)]
        limit: Option<String>,

        /// Output format as JSON
        #[arg(long)]
        json: bool,

        /// Pretty-print JSON output (only with --json)
        #[arg(long)]
        pretty: bool,

        /// SQLite database file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// Show database statistics
    Stats {
        /// Output format as JSON
        #[arg(long)]
        json: bool,

        /// Pretty-print JSON output (only with --json)
        #[arg(long)]
        pretty: bool,

        /// SQLite database file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        // Setup logging based on verbosity
        let log_level = match self.verbose {
            0 => "warn",   // Default: only warnings and errors
            1 => "info",   // -v: show info messages
            2 => "debug",  // -vv: show debug messages
            _ => "trace",  // -vvv: show trace messages
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
            .init();

        let mut config = load_config(self.config.as_deref())?;

        match self.command {
            Command::Serve { port, host, database } => {
                if let Some(port) = port {
                    config.server.port = port;
                }
                if let Some(host) = host {
                    config.server.host = host;
                }
                override_database(&mut config, database);
                handle_serve(config)
            }
            Command::Init { database, reset } => {
                override_database(&mut config, database);
                handle_init(&config, reset)
            }
            Command::Import { file, database } => {
                override_database(&mut config, database);
                handle_import(&config, &file)
            }
            Command::Search {
                location,
                property_name,
                coordinates,
                latitude,
                longitude,
                price_min,
                price_max,
                beds,
                baths,
                property_type,
                square_feet_min,
                square_feet_max,
                amenities,
                available_from,
                favorite_ids,
                limit,
                json,
                pretty,
                database,
            } => {
                override_database(&mut config, database);
                let params = SearchParams {
                    location,
                    property_name,
                    coordinates,
                    latitude,
                    longitude,
                    price_min,
                    price_max,
                    beds,
                    baths,
                    property_type,
                    square_feet_min,
                    square_feet_max,
                    amenities,
                    available_from,
                    favorite_ids,
                    limit,
                };
                handle_search(&config, &params, json, pretty)
            }
            Command::Stats { json, pretty, database } => {
                override_database(&mut config, database);
                handle_stats(&config, json, pretty)
            }
        }
    }
}

fn override_database(config: &mut AppConfig, database: Option<PathBuf>) {
    if let Some(path) = database {
        config.database.path = path;
    }
}

fn open_store(config: &AppConfig) -> Result<SqliteStore> {
    SqliteStore::open(&config.database.path, config.database.statement_timeout())
        .with_context(|| format!("Failed to open database {}", config.database.path.display()))
}

/// Open an existing database, refusing to create one implicitly
fn open_existing_store(config: &AppConfig) -> Result<SqliteStore> {
    if !config.database.path.exists() {
        anyhow::bail!(
            "Database not found: {}\n\
             \n\
             Run 'digs init' to create it, then 'digs import <FILE>' to load listings.",
            config.database.path.display()
        );
    }
    open_store(config)
}

fn build_service(config: &AppConfig, store: SqliteStore) -> SearchService {
    let cache = Arc::new(MemoryCache::new(config.search.cache_capacity));
    SearchService::new(Arc::new(store), cache, config.search.clone())
}

/// Handle the `serve` subcommand
fn handle_serve(config: AppConfig) -> Result<()> {
    let store = open_store(&config)?;
    let addr = format!("{}:{}", config.server.host, config.server.port);
    log::info!("Starting HTTP server on {} (database {})", addr, store.path().display());

    println!("Starting digs HTTP server...");
    println!("  Address:  http://{}", addr);
    println!("  Database: {}", store.path().display());
    println!("\nEndpoints:");
    println!("  GET    /properties?location=&propertyName=&coordinates=&priceMin=&priceMax=&beds=&baths=&propertyType=&squareFeetMin=&squareFeetMax=&amenities=&availableFrom=&favoriteIds=&limit=");
    println!("  GET    /properties/:id");
    println!("  POST   /properties");
    println!("  PUT    /properties/:id");
    println!("  DELETE /properties/:id");
    println!("  POST   /managers");
    println!("  PUT    /managers/:id/status");
    println!("  POST   /leases");
    println!("  GET    /health");
    println!("\nPress Ctrl+C to stop.");

    let state = AppState::new(build_service(&config, store));

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async { server::serve(&addr, state).await })
}

/// Handle the `init` subcommand
fn handle_init(config: &AppConfig, reset: bool) -> Result<()> {
    let path = &config.database.path;

    if reset && path.exists() {
        SqliteStore::reset(path).with_context(|| format!("Failed to reset {}", path.display()))?;
        output::warn(&format!("Removed existing database {}", path.display()));
    }

    let store = open_store(config)?;
    let stats = store.stats()?;

    println!("{} {}", "Database ready:".green(), store.path().display());
    if stats.properties > 0 {
        println!("  {} existing properties kept", stats.properties);
    }
    Ok(())
}

/// Handle the `import` subcommand
fn handle_import(config: &AppConfig, file: &Path) -> Result<()> {
    let start = Instant::now();

    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read seed file {}", file.display()))?;
    let seed: SeedData = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse seed file {}", file.display()))?;

    if seed.managers.is_empty() && seed.properties.is_empty() && seed.leases.is_empty() {
        output::warn(&format!("{} contains no managers, properties or leases.", file.display()));
        return Ok(());
    }

    let store = open_store(config)?;
    let report = store
        .import(&seed)
        .with_context(|| format!("Failed to import {}", file.display()))?;

    println!(
        "{} {} managers, {} properties, {} leases in {}ms",
        "Imported".green(),
        report.managers,
        report.properties,
        report.leases,
        start.elapsed().as_millis()
    );
    Ok(())
}

/// Handle the `search` subcommand
fn handle_search(config: &AppConfig, params: &SearchParams, as_json: bool, pretty_json: bool) -> Result<()> {
    let store = open_existing_store(config)?;
    let service = build_service(config, store);

    let filter = Filter::from_params(params, &config.search);
    log::debug!("Search filter: {:?}", filter);

    let start = Instant::now();
    let results = service.find(&filter)?;
    let elapsed = start.elapsed();

    if as_json {
        let json_output = if pretty_json {
            serde_json::to_string_pretty(&results.properties)?
        } else {
            serde_json::to_string(&results.properties)?
        };
        println!("{}", json_output);
        return Ok(());
    }

    if results.degraded {
        output::warn(&format!(
            "Search timed out; showing at most {} results.",
            results.limit
        ));
    }

    if results.properties.is_empty() {
        println!("No properties found.");
        return Ok(());
    }

    for property in &results.properties {
        print_property(property);
    }
    println!(
        "\n{} properties in {}ms",
        results.properties.len(),
        elapsed.as_millis()
    );
    Ok(())
}

fn print_property(property: &Property) {
    let location = &property.location;
    println!(
        "{} {}  {}",
        format!("#{}", property.id).dimmed(),
        property.name.bold(),
        format!("R{:.0}/month", property.price_per_month).green()
    );
    println!(
        "    {}, {}, {}  ({})",
        location.address, location.suburb, location.city, property.property_type
    );
    println!(
        "    {} beds, {} baths, {} sq ft{}",
        property.beds,
        property.baths,
        property.square_feet,
        if property.amenities.is_empty() {
            String::new()
        } else {
            format!("  [{}]", property.amenities.join(", "))
        }
    );
}

/// Handle the `stats` subcommand
fn handle_stats(config: &AppConfig, as_json: bool, pretty_json: bool) -> Result<()> {
    let store = open_existing_store(config)?;
    let stats = store.stats()?;

    if as_json {
        let json_output = if pretty_json {
            serde_json::to_string_pretty(&stats)?
        } else {
            serde_json::to_string(&stats)?
        };
        println!("{}", json_output);
    } else {
        println!("digs Database Statistics");
        println!("========================");
        println!("Database:       {}", store.path().display());
        println!("Properties:     {}", stats.properties);
        println!("  searchable:   {}", stats.searchable_properties);
        println!("  disabled:     {}", stats.disabled_properties);
        println!("Managers:       {}", stats.managers);
        println!("Leases:         {}", stats.leases);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_flags_parse() {
        let cli = Cli::try_parse_from([
            "digs",
            "search",
            "--location",
            "Cape Town",
            "--coordinates",
            "18.42,-33.92",
            "--beds",
            "2",
            "--json",
        ])
        .unwrap();

        match cli.command {
            Command::Search { location, coordinates, beds, json, pretty, .. } => {
                assert_eq!(location.as_deref(), Some("Cape Town"));
                assert_eq!(coordinates.as_deref(), Some("18.42,-33.92"));
                assert_eq!(beds.as_deref(), Some("2"));
                assert!(json);
                assert!(!pretty);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_negative_latitude_is_a_value() {
        let cli = Cli::try_parse_from(["digs", "search", "--latitude", "-33.92", "--longitude", "18.42"]).unwrap();
        match cli.command {
            Command::Search { latitude, .. } => assert_eq!(latitude.as_deref(), Some("-33.92")),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["digs", "stats", "-vv", "--config", "alt.toml"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("alt.toml")));
    }

    #[test]
    fn test_serve_overrides_are_optional() {
        let cli = Cli::try_parse_from(["digs", "serve", "--port", "9000"]).unwrap();
        match cli.command {
            Command::Serve { port, host, database } => {
                assert_eq!(port, Some(9000));
                assert!(host.is_none());
                assert!(database.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_init_then_stats_on_temp_database() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut config = AppConfig::default();
        override_database(&mut config, Some(temp.path().join("digs.db")));

        assert!(handle_stats(&config, true, false).is_err());
        handle_init(&config, false).unwrap();
        handle_stats(&config, true, true).unwrap();
        handle_init(&config, true).unwrap();
        assert!(config.database.path.exists());
    }

    #[test]
    fn test_database_override() {
        let mut config = AppConfig::default();
        override_database(&mut config, None);
        assert_eq!(config.database.path, PathBuf::from("digs.db"));

        override_database(&mut config, Some(PathBuf::from("/tmp/other.db")));
        assert_eq!(config.database.path, PathBuf::from("/tmp/other.db"));
    }
}
