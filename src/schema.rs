//! Schema Description Language (SDL).
//!
//! Declarative, in-memory description of tables, columns, constraints and
//! indexes, plus pure-text emitters that turn that description into DDL and
//! prepared-statement templates. The relational adapter (`crate::sqlite`)
//! uses this to lay down its own `LOG`/TTL/metadata tables instead of
//! hand-writing the DDL strings inline, the way the teacher's
//! `sqlite/schema.rs` hand-writes `SCHEMA_STATEMENTS` -- here that
//! hand-writing is generalised into a reusable emitter.

use crate::error::{KvError, Result};

/// Column type/constraint flags. Exactly one base-type bit (`INTEGER`,
/// `TEXT`, `BLOB`, `REAL`) must be set per column (invariant I1).
pub mod flags {
    pub const INTEGER: u32 = 1 << 0;
    pub const TEXT: u32 = 1 << 1;
    pub const BLOB: u32 = 1 << 2;
    pub const REAL: u32 = 1 << 3;
    pub const PRIMARY_KEY: u32 = 1 << 4;
    pub const NOT_NULL: u32 = 1 << 5;
    pub const UNIQUE: u32 = 1 << 6;
    pub const AUTOINCREMENT: u32 = 1 << 7;
    pub const REFERENCES: u32 = 1 << 8;
    pub const CASCADE_DELETE: u32 = 1 << 9;
    pub const DEFERRED: u32 = 1 << 10;
    pub const HAS_DEFAULT: u32 = 1 << 11;

    pub(super) const BASE_TYPE_MASK: u32 = INTEGER | TEXT | BLOB | REAL;
}

/// A column's default value, tagged by kind. `Expr` is printed unquoted
/// (e.g. `CURRENT_TIMESTAMP`); `Text` is single-quoted with embedded quotes
/// doubled; `Int`/`Real` are printed verbatim including sign; `Null` prints
/// the `NULL` keyword.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    None,
    Null,
    Int(i64),
    Real(f64),
    Text(String),
    Expr(String),
}

/// Description of a single table column.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: String,
    pub flags: u32,
    /// Required iff `flags & REFERENCES != 0`.
    pub ref_table: Option<String>,
    pub default: DefaultValue,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, flags: u32) -> Self {
        Self {
            name: name.into(),
            flags,
            ref_table: None,
            default: DefaultValue::None,
        }
    }

    pub fn references(mut self, table: impl Into<String>) -> Self {
        self.ref_table = Some(table.into());
        self
    }

    pub fn default_value(mut self, default: DefaultValue) -> Self {
        self.default = default;
        self
    }

    fn has(&self, bit: u32) -> bool {
        self.flags & bit != 0
    }
}

/// Description of a single index.
#[derive(Debug, Clone)]
pub struct IndexDef {
    pub name: Option<String>,
    pub unique: bool,
    pub columns: Vec<String>,
}

impl IndexDef {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            name: None,
            unique: false,
            columns,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Description of a single table.
#[derive(Debug, Clone)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub indexes: Vec<IndexDef>,
    pub without_rowid: bool,
}

impl TableDef {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        Self {
            name: name.into(),
            columns,
            indexes: Vec::new(),
            without_rowid: false,
        }
    }

    pub fn with_index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn without_rowid(mut self) -> Self {
        self.without_rowid = true;
        self
    }

    fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    fn primary_key_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.has(flags::PRIMARY_KEY))
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// Statement kinds the adapter can request from [`emit_statement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    InsertAll,
    SelectById,
    SelectAll,
    UpdateById,
    DeleteById,
    Count,
    MaxId,
    MinId,
}

// ---------------------------------------------------------------------------
// Validation (I1-I5)
// ---------------------------------------------------------------------------

/// Validates a single column against invariants I1-I4.
pub fn validate_column(col: &ColumnDef) -> Result<()> {
    if col.name.is_empty() {
        return Err(KvError::invalid_argument("column name must not be empty"));
    }
    let base_type_bits = (col.flags & flags::BASE_TYPE_MASK).count_ones();
    if base_type_bits != 1 {
        return Err(KvError::invalid_argument(format!(
            "column {} must have exactly one base type, found {base_type_bits}",
            col.name
        )));
    }
    if col.has(flags::AUTOINCREMENT) && !(col.has(flags::PRIMARY_KEY) && col.has(flags::INTEGER)) {
        return Err(KvError::invalid_argument(format!(
            "column {} is AUTOINCREMENT but not an INTEGER PRIMARY KEY",
            col.name
        )));
    }
    if (col.has(flags::CASCADE_DELETE) || col.has(flags::DEFERRED)) && !col.has(flags::REFERENCES) {
        return Err(KvError::invalid_argument(format!(
            "column {} has CASCADE_DELETE/DEFERRED without REFERENCES",
            col.name
        )));
    }
    if col.has(flags::REFERENCES) && col.ref_table.as_deref().unwrap_or("").is_empty() {
        return Err(KvError::invalid_argument(format!(
            "column {} is REFERENCES but has no ref_table",
            col.name
        )));
    }
    if matches!(col.default, DefaultValue::Null) && col.has(flags::NOT_NULL) {
        return Err(KvError::invalid_argument(format!(
            "column {} has a NULL default but is NOT_NULL",
            col.name
        )));
    }
    Ok(())
}

/// Validates a table against invariant I5 (plus transitively validating
/// every column).
pub fn validate_table(table: &TableDef) -> Result<()> {
    if table.name.is_empty() {
        return Err(KvError::invalid_argument("table name must not be empty"));
    }
    if table.columns.is_empty() {
        return Err(KvError::invalid_argument(format!(
            "table {} has no columns",
            table.name
        )));
    }
    for col in &table.columns {
        validate_column(col)?;
    }
    for index in &table.indexes {
        for col in &index.columns {
            if table.column(col).is_none() {
                return Err(KvError::invalid_argument(format!(
                    "index on {} references unknown column {col}",
                    table.name
                )));
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Emitters
// ---------------------------------------------------------------------------

fn sanitize_identifier_fragment(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

fn quote_text_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Emits the column-type fragment of a `CREATE TABLE` statement for a single
/// column, in the fixed order documented by the SDL: base type, PRIMARY KEY,
/// AUTOINCREMENT, NOT NULL, UNIQUE, REFERENCES, ON DELETE CASCADE,
/// DEFERRABLE INITIALLY DEFERRED, DEFAULT.
pub fn emit_column_type(col: &ColumnDef) -> Result<String> {
    validate_column(col)?;

    let base = if col.has(flags::INTEGER) {
        "INTEGER"
    } else if col.has(flags::TEXT) {
        "TEXT"
    } else if col.has(flags::BLOB) {
        "BLOB"
    } else {
        "REAL"
    };

    let mut parts = vec![base.to_string()];
    if col.has(flags::PRIMARY_KEY) {
        parts.push("PRIMARY KEY".to_string());
    }
    if col.has(flags::AUTOINCREMENT) {
        parts.push("AUTOINCREMENT".to_string());
    }
    if col.has(flags::NOT_NULL) {
        parts.push("NOT NULL".to_string());
    }
    if col.has(flags::UNIQUE) {
        parts.push("UNIQUE".to_string());
    }
    if col.has(flags::REFERENCES) {
        parts.push(format!("REFERENCES {}", col.ref_table.as_ref().unwrap()));
    }
    if col.has(flags::CASCADE_DELETE) {
        parts.push("ON DELETE CASCADE".to_string());
    }
    if col.has(flags::DEFERRED) {
        parts.push("DEFERRABLE INITIALLY DEFERRED".to_string());
    }
    if col.has(flags::HAS_DEFAULT) || !matches!(col.default, DefaultValue::None) {
        let literal = match &col.default {
            DefaultValue::None => None,
            DefaultValue::Null => Some("NULL".to_string()),
            DefaultValue::Int(v) => Some(v.to_string()),
            DefaultValue::Real(v) => Some(v.to_string()),
            DefaultValue::Text(s) => Some(quote_text_literal(s)),
            DefaultValue::Expr(e) => Some(e.clone()),
        };
        if let Some(literal) = literal {
            parts.push(format!("DEFAULT {literal}"));
        }
    }

    Ok(format!("{} {}", col.name, parts.join(" ")))
}

/// Emits `CREATE TABLE IF NOT EXISTS ...` for the given table.
pub fn emit_create_table(table: &TableDef) -> Result<String> {
    validate_table(table)?;
    let cols: Result<Vec<String>> = table.columns.iter().map(emit_column_type).collect();
    let cols = cols?.join(", ");
    let suffix = if table.without_rowid {
        " WITHOUT ROWID"
    } else {
        ""
    };
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} ({}){}",
        table.name, cols, suffix
    ))
}

/// Emits one `CREATE [UNIQUE] INDEX IF NOT EXISTS` statement per
/// [`IndexDef`] on the table.
pub fn emit_create_indexes(table: &TableDef) -> Result<Vec<String>> {
    validate_table(table)?;
    let mut out = Vec::with_capacity(table.indexes.len());
    for index in &table.indexes {
        let name = index.name.clone().unwrap_or_else(|| {
            let cols = index
                .columns
                .iter()
                .map(|c| sanitize_identifier_fragment(c))
                .collect::<Vec<_>>()
                .join("_");
            format!("{}_{}_idx", table.name, cols)
        });
        let unique = if index.unique { "UNIQUE " } else { "" };
        out.push(format!(
            "CREATE {unique}INDEX IF NOT EXISTS {name} ON {}({})",
            table.name,
            index.columns.join(", ")
        ));
    }
    Ok(out)
}

/// Emits one of the canned statement templates for a table. `INSERT_ALL`
/// uses one positional placeholder per column; `UPDATE_BY_ID` sets every
/// non-primary-key column and filters on the primary key.
pub fn emit_statement(kind: StatementKind, table: &TableDef) -> Result<String> {
    validate_table(table)?;
    let pk = table.primary_key_columns();
    let pk_col = pk.first().copied().unwrap_or("id");

    Ok(match kind {
        StatementKind::InsertAll => {
            let cols: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
            let placeholders: Vec<String> =
                (1..=cols.len()).map(|i| format!("?{i}")).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table.name,
                cols.join(", "),
                placeholders.join(", ")
            )
        }
        StatementKind::SelectById => {
            format!("SELECT * FROM {} WHERE {} = ?1", table.name, pk_col)
        }
        StatementKind::SelectAll => format!("SELECT * FROM {}", table.name),
        StatementKind::UpdateById => {
            let sets: Vec<String> = table
                .columns
                .iter()
                .filter(|c| c.name != pk_col)
                .enumerate()
                .map(|(i, c)| format!("{} = ?{}", c.name, i + 2))
                .collect();
            format!(
                "UPDATE {} SET {} WHERE {} = ?1",
                table.name,
                sets.join(", "),
                pk_col
            )
        }
        StatementKind::DeleteById => {
            format!("DELETE FROM {} WHERE {} = ?1", table.name, pk_col)
        }
        StatementKind::Count => format!("SELECT COUNT(*) FROM {}", table.name),
        StatementKind::MaxId => format!("SELECT MAX({}) FROM {}", pk_col, table.name),
        StatementKind::MinId => format!("SELECT MIN({}) FROM {}", pk_col, table.name),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_column_type_autoincrement_primary_key() {
        let col = ColumnDef::new("id", flags::INTEGER | flags::PRIMARY_KEY | flags::AUTOINCREMENT);
        assert_eq!(emit_column_type(&col).unwrap(), "id INTEGER PRIMARY KEY AUTOINCREMENT");
    }

    #[test]
    fn emit_column_type_references_cascade_deferred() {
        let col = ColumnDef::new(
            "uid",
            flags::INTEGER | flags::REFERENCES | flags::CASCADE_DELETE | flags::DEFERRED,
        )
        .references("users");
        let text = emit_column_type(&col).unwrap();
        assert!(text.contains("REFERENCES users"));
        assert!(text.contains("ON DELETE CASCADE"));
        assert!(text.contains("DEFERRABLE INITIALLY DEFERRED"));
    }

    #[test]
    fn emit_column_type_text_default_escapes_quotes() {
        let col = ColumnDef::new("name", flags::TEXT).default_value(DefaultValue::Text("O'Brien".into()));
        assert_eq!(emit_column_type(&col).unwrap(), "name TEXT DEFAULT 'O''Brien'");
    }

    #[test]
    fn rejects_zero_or_two_base_types() {
        let none = ColumnDef::new("x", flags::PRIMARY_KEY);
        assert!(validate_column(&none).is_err());
        let both = ColumnDef::new("x", flags::INTEGER | flags::TEXT);
        assert!(validate_column(&both).is_err());
    }

    #[test]
    fn rejects_autoincrement_without_integer_primary_key() {
        let col = ColumnDef::new("x", flags::TEXT | flags::AUTOINCREMENT);
        assert!(validate_column(&col).is_err());
    }

    #[test]
    fn rejects_cascade_without_references() {
        let col = ColumnDef::new("x", flags::INTEGER | flags::CASCADE_DELETE);
        assert!(validate_column(&col).is_err());
    }

    #[test]
    fn rejects_empty_table() {
        let table = TableDef::new("t", vec![]);
        assert!(validate_table(&table).is_err());
    }

    #[test]
    fn rejects_index_on_unknown_column() {
        let table = TableDef::new("t", vec![ColumnDef::new("id", flags::INTEGER | flags::PRIMARY_KEY)])
            .with_index(IndexDef::new(vec!["missing".into()]));
        assert!(validate_table(&table).is_err());
    }

    #[test]
    fn auto_generated_index_name_sanitises_characters() {
        let table = TableDef::new(
            "log",
            vec![ColumnDef::new("exp-at", flags::INTEGER)],
        )
        .with_index(IndexDef::new(vec!["exp-at".into()]));
        let stmts = emit_create_indexes(&table).unwrap();
        assert_eq!(stmts.len(), 1);
        assert!(stmts[0].contains("log_exp_at_idx"));
    }

    #[test]
    fn emit_create_table_without_rowid_suffix() {
        let table = TableDef::new("t", vec![ColumnDef::new("id", flags::INTEGER | flags::PRIMARY_KEY)])
            .without_rowid();
        assert!(emit_create_table(&table).unwrap().ends_with("WITHOUT ROWID"));
    }

    #[test]
    fn emit_statement_insert_all_positional_placeholders() {
        let table = TableDef::new(
            "log",
            vec![
                ColumnDef::new("id", flags::INTEGER | flags::PRIMARY_KEY),
                ColumnDef::new("data", flags::BLOB),
            ],
        );
        let sql = emit_statement(StatementKind::InsertAll, &table).unwrap();
        assert_eq!(sql, "INSERT INTO log (id, data) VALUES (?1, ?2)");
    }

    #[test]
    fn emit_statement_update_by_id_skips_primary_key() {
        let table = TableDef::new(
            "log",
            vec![
                ColumnDef::new("id", flags::INTEGER | flags::PRIMARY_KEY),
                ColumnDef::new("term", flags::INTEGER),
                ColumnDef::new("data", flags::BLOB),
            ],
        );
        let sql = emit_statement(StatementKind::UpdateById, &table).unwrap();
        assert_eq!(sql, "UPDATE log SET term = ?2, data = ?3 WHERE id = ?1");
    }
}
