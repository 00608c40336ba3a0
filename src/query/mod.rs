//! SQL text for the statements the statistics engine issues.
//!
//! Identifiers only ever enter query text through [`Dialect::quote`]; every
//! value (table names in catalog lookups, rank numbers, limits) is a bound
//! `?` parameter.

mod identifier;

pub use identifier::Identifier;

use serde::{Deserialize, Serialize};

/// SQL flavour of the backing store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    MySql,
    Sqlite,
}

impl Dialect {
    /// Quote an identifier, doubling any embedded quote character.
    pub fn quote(&self, ident: &Identifier) -> String {
        let quote = match self {
            Dialect::MySql => '`',
            Dialect::Sqlite => '"',
        };
        let mut quoted = String::with_capacity(ident.as_str().len() + 2);
        quoted.push(quote);
        for c in ident.as_str().chars() {
            if c == quote {
                quoted.push(quote);
            }
            quoted.push(c);
        }
        quoted.push(quote);
        quoted
    }

    fn double_cast(&self, expr: &str) -> String {
        match self {
            Dialect::MySql => format!("CAST({} AS DOUBLE)", expr),
            Dialect::Sqlite => format!("CAST({} AS REAL)", expr),
        }
    }

    fn integer_cast(&self, expr: &str) -> String {
        match self {
            Dialect::MySql => format!("CAST({} AS SIGNED)", expr),
            Dialect::Sqlite => format!("CAST({} AS INTEGER)", expr),
        }
    }

    /// One row, one column: number of tables or views named `?`.
    pub fn table_exists_sql(&self) -> &'static str {
        match self {
            Dialect::MySql => {
                "SELECT COUNT(*) FROM information_schema.TABLES \
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?"
            }
            Dialect::Sqlite => {
                "SELECT COUNT(*) FROM sqlite_master \
                 WHERE type IN ('table', 'view') AND name = ? COLLATE NOCASE"
            }
        }
    }

    /// Rows of `(name, data_type, is_pk)` for table `?`, in declaration order.
    pub fn columns_sql(&self) -> &'static str {
        match self {
            // information_schema columns come back as binary strings on some
            // server collations, hence the CHAR casts.
            Dialect::MySql => {
                "SELECT CAST(COLUMN_NAME AS CHAR) AS name, \
                 CAST(DATA_TYPE AS CHAR) AS data_type, \
                 CAST(COLUMN_KEY = 'PRI' AS SIGNED) AS is_pk \
                 FROM information_schema.COLUMNS \
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
                 ORDER BY ORDINAL_POSITION"
            }
            Dialect::Sqlite => {
                "SELECT name, type AS data_type, CAST(pk > 0 AS INTEGER) AS is_pk \
                 FROM pragma_table_info(?) ORDER BY cid"
            }
        }
    }

    pub fn row_count_sql(&self, table: &Identifier) -> String {
        format!("SELECT COUNT(*) FROM {}", self.quote(table))
    }

    /// One row of `(count, mean, spread, min, max)` over the non-null values
    /// of `column`. `spread` is the population standard deviation on MySQL
    /// and the population variance on SQLite, which has no STD aggregate;
    /// pass it through [`Dialect::finish_spread`].
    pub fn aggregate_sql(&self, table: &Identifier, column: &Identifier) -> String {
        let table = self.quote(table);
        let column = self.quote(column);
        match self {
            Dialect::MySql => format!(
                "SELECT COUNT({c}) AS n, {avg} AS mean, {std} AS spread, {min} AS lo, {max} AS hi FROM {t}",
                c = column,
                avg = self.double_cast(&format!("AVG({})", column)),
                std = self.double_cast(&format!("STD({})", column)),
                min = self.double_cast(&format!("MIN({})", column)),
                max = self.double_cast(&format!("MAX({})", column)),
                t = table,
            ),
            Dialect::Sqlite => {
                let value = format!("src.{}", column);
                let deviation = format!("({} - m.mean)", value);
                format!(
                    "SELECT COUNT({v}) AS n, {avg} AS mean, {var} AS spread, {min} AS lo, {max} AS hi \
                     FROM {t} AS src, (SELECT AVG({c}) AS mean FROM {t}) AS m",
                    v = value,
                    avg = self.double_cast(&format!("AVG({})", value)),
                    var = self.double_cast(&format!("AVG({d} * {d})", d = deviation)),
                    min = self.double_cast(&format!("MIN({})", value)),
                    max = self.double_cast(&format!("MAX({})", value)),
                    c = column,
                    t = table,
                )
            }
        }
    }

    /// Turn the `spread` column of [`Dialect::aggregate_sql`] into a
    /// standard deviation.
    pub fn finish_spread(&self, spread: f64) -> f64 {
        match self {
            Dialect::MySql => spread,
            // Rounding can leave a tiny negative variance for constant columns.
            Dialect::Sqlite => spread.max(0.0).sqrt(),
        }
    }

    /// Rows of `(rank, value)` for the requested ranks, where non-null values
    /// of `column` are numbered 1..=count in ascending order. One `?` per
    /// rank; `rank_count` must be at least one.
    pub fn ranked_values_sql(&self, table: &Identifier, column: &Identifier, rank_count: usize) -> String {
        let table = self.quote(table);
        let column = self.quote(column);
        let placeholders = vec!["?"; rank_count.max(1)].join(", ");
        format!(
            "SELECT {rank} AS rank_no, {value} AS value FROM (\
             SELECT {c} AS v, ROW_NUMBER() OVER (ORDER BY {c}) AS row_rank \
             FROM {t} WHERE {c} IS NOT NULL) AS ranked \
             WHERE ranked.row_rank IN ({p}) ORDER BY ranked.row_rank",
            rank = self.integer_cast("ranked.row_rank"),
            value = self.double_cast("ranked.v"),
            c = column,
            t = table,
            p = placeholders,
        )
    }

    /// `SELECT *` over the table, with a bound `?` limit when `limited`.
    pub fn select_all_sql(&self, table: &Identifier, limited: bool) -> String {
        let mut sql = format!("SELECT * FROM {}", self.quote(table));
        if limited {
            sql.push_str(" LIMIT ?");
        }
        sql
    }
}
