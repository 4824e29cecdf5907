//! SQL differences between the supported backends

use crate::db::Backend;

impl Backend {
    /// Escape text for embedding in SQL, without the surrounding quotes.
    ///
    /// The result is safe between single quotes of a literal. Identifiers
    /// additionally go through [`Backend::quote_ident`].
    pub fn escape(&self, text: &str) -> String {
        text.replace('\0', "").replace('\'', "''")
    }

    /// Quote an identifier (table, alias or column name). Only the closing
    /// quote character is doubled.
    pub fn quote_ident(&self, name: &str) -> String {
        let name = name.replace('\0', "");
        match self {
            Backend::Sqlite => format!("`{}`", name.replace('`', "``")),
            Backend::SqlServer => format!("[{}]", name.replace(']', "]]")),
        }
    }

    /// Quote a value as a string literal. SQL Server literals are `N'...'` so
    /// text outside the database code page survives.
    pub fn quote_literal(&self, text: &str) -> String {
        match self {
            Backend::Sqlite => format!("'{}'", self.escape(text)),
            Backend::SqlServer => format!("N'{}'", self.escape(text)),
        }
    }

    /// A predicate no row satisfies.
    pub fn false_predicate(&self) -> &'static str {
        match self {
            Backend::Sqlite => "FALSE",
            Backend::SqlServer => "1 = 0",
        }
    }

    /// `SELECT * ... WHERE <predicate>` limited to one row.
    pub fn select_one(&self, table: &str, predicate: &str) -> String {
        let table = self.quote_ident(table);
        match self {
            Backend::Sqlite => format!("SELECT * FROM {} WHERE {} LIMIT 1", table, predicate),
            Backend::SqlServer => format!("SELECT TOP 1 * FROM {} WHERE {}", table, predicate),
        }
    }

    /// Window clause placed after `ORDER BY`.
    pub fn window(&self, limit: usize, offset: usize) -> String {
        match self {
            Backend::Sqlite => format!("LIMIT {} OFFSET {}", limit, offset),
            Backend::SqlServer => {
                format!("OFFSET {} ROWS FETCH NEXT {} ROWS ONLY", offset, limit)
            }
        }
    }

    /// Query listing every user table name in its first column.
    pub fn table_list_query(&self) -> &'static str {
        match self {
            Backend::Sqlite => {
                "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name"
            }
            Backend::SqlServer => "SELECT t.name FROM sys.tables t ORDER BY t.name",
        }
    }
}
