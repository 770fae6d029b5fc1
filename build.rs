//! Build-time schema hash computation for database compatibility checks
//!
//! This build script hashes the source files that define the SQLite schema and
//! the row mapping at compile time. The hash is stamped into the `meta` table
//! when a database is created; a binary built from different schema sources
//! warns on startup so operators know to re-run `digs init --reset`.
//!
//! ## Schema-critical files:
//! - src/store.rs: table definitions and row mapping
//! - src/models.rs: records persisted as JSON columns (amenities, photo URLs)
//! - src/query.rs: column list shared by every SELECT

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Source files whose changes can break compatibility with existing databases
const SCHEMA_CRITICAL_FILES: &[&str] = &["src/store.rs", "src/models.rs", "src/query.rs"];

fn main() {
    let schema_hash = compute_schema_hash();

    println!("cargo:rustc-env=DIGS_SCHEMA_HASH={}", schema_hash);

    for file in SCHEMA_CRITICAL_FILES {
        println!("cargo:rerun-if-changed={}", file);
    }
}

/// Compute a deterministic hash of all schema-critical source files
fn compute_schema_hash() -> String {
    let mut hasher = blake3::Hasher::new();

    // BTreeSet keeps the hashing order stable
    let files: BTreeSet<String> = SCHEMA_CRITICAL_FILES
        .iter()
        .map(|s| s.to_string())
        .collect();

    for file_path in &files {
        let path = Path::new(file_path);

        if !path.exists() {
            panic!("Schema-critical file not found: {}", file_path);
        }

        let content = fs::read(path)
            .unwrap_or_else(|e| panic!("Failed to read {}: {}", file_path, e));

        hasher.update(file_path.as_bytes());
        hasher.update(&content);
    }

    // First 8 bytes are plenty to tell builds apart
    let hash = hasher.finalize();

    hash.as_bytes()[..8]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<String>()
}
