//! The `LOG`/TTL table definitions, expressed through the SDL (`crate::schema`)
//! and turned into the adapter's bootstrap migration.
//!
//! Grounded in the teacher's `sqlite/schema.rs` (a fixed `SCHEMA_STATEMENTS`
//! slice executed in `init_schema`); here the DDL is generated through the
//! SDL emitters instead of hand-written, since the adapter is itself the
//! SDL's first consumer (spec.md S:1).

use crate::migration::Migration;
use crate::schema::{self, flags, ColumnDef, IndexDef, TableDef};

/// Describes the `LOG` table (spec.md S:3): `id` is the sole primary key,
/// `created` is a reserved always-zero slot, `term`/`cmd` are opaque
/// application tags, `data` is the opaque value blob.
pub(crate) fn log_table() -> TableDef {
    TableDef::new(
        "log",
        vec![
            ColumnDef::new("id", flags::INTEGER | flags::PRIMARY_KEY | flags::NOT_NULL),
            ColumnDef::new("created", flags::INTEGER | flags::NOT_NULL)
                .default_value(schema::DefaultValue::Int(0)),
            ColumnDef::new("term", flags::INTEGER | flags::NOT_NULL)
                .default_value(schema::DefaultValue::Int(0)),
            ColumnDef::new("cmd", flags::INTEGER | flags::NOT_NULL)
                .default_value(schema::DefaultValue::Int(0)),
            ColumnDef::new("data", flags::BLOB | flags::NOT_NULL),
        ],
    )
}

/// Describes the `_kvidx_ttl` side table (spec.md S:4.4): keyed by id, with
/// a secondary ordering index on `expires_at` used by `expire_scan`.
pub(crate) fn ttl_table() -> TableDef {
    TableDef::new(
        "_kvidx_ttl",
        vec![
            ColumnDef::new("id", flags::INTEGER | flags::PRIMARY_KEY | flags::NOT_NULL),
            ColumnDef::new("expires_at", flags::INTEGER | flags::NOT_NULL),
        ],
    )
    .with_index(IndexDef::new(vec!["expires_at".into()]).named("_kvidx_ttl_expires_at_idx"))
}

/// The bootstrap migration (version 1) that lays down `LOG` and the TTL
/// side table. Run by the adapter's own internal migration runner before
/// any caller-supplied migrations, mirroring the teacher's
/// `init_schema` -> `run_migrations_on_conn` ordering.
pub(crate) fn bootstrap_migration() -> Migration {
    let mut sql = schema::emit_create_table(&log_table()).expect("log table definition is valid");
    sql.push(';');
    sql.push('\n');
    sql.push_str(&schema::emit_create_table(&ttl_table()).expect("ttl table definition is valid"));
    sql.push(';');
    for stmt in schema::emit_create_indexes(&ttl_table()).expect("ttl indexes are valid") {
        sql.push('\n');
        sql.push_str(&stmt);
        sql.push(';');
    }
    Migration::new(1, sql)
}
