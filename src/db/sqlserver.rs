//! SQL Server driver implementation using tiberius
//!
//! tiberius is async; the driver owns a current-thread tokio runtime and
//! blocks on it so the rest of the crate stays synchronous.

use crate::db::driver::{Backend, DatabaseDriver};
use crate::db::schema::NativeColumn;
use crate::db::value::{Row, Value};
use anyhow::{Context, Result};
use tiberius::time::chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use tiberius::{numeric::Numeric, AuthMethod, Client, Column, ColumnType, Config};
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

/// Configuration specific to SQL Server connections
#[derive(Clone, Debug, PartialEq)]
pub struct SqlServerConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub encrypt: bool,
    pub trust_cert: bool,
}

/// SQL Server driver
pub struct SqlServerDriver {
    runtime: Runtime,
    client: Mutex<Client<Compat<TcpStream>>>,
    pub config: SqlServerConfig,
}

impl SqlServerDriver {
    /// Create a new SQL Server connection
    pub fn connect(config: SqlServerConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to start tokio runtime for SQL Server")?;
        let client = runtime.block_on(Self::connect_internal(&config))?;
        Ok(Self {
            runtime,
            client: Mutex::new(client),
            config,
        })
    }

    /// Internal TCP + TDS connection
    async fn connect_internal(cfg: &SqlServerConfig) -> Result<Client<Compat<TcpStream>>> {
        let mut config = Config::new();
        config.host(&cfg.host);
        config.port(cfg.port);
        config.database(&cfg.database);
        config.authentication(AuthMethod::sql_server(&cfg.user, &cfg.password));

        if cfg.trust_cert {
            config.trust_cert();
        }
        if !cfg.encrypt {
            config.encryption(tiberius::EncryptionLevel::NotSupported);
        }

        let tcp = TcpStream::connect(config.get_addr())
            .await
            .context("Failed to connect to SQL Server")?;
        tcp.set_nodelay(true)?;

        let client = Client::connect(config, tcp.compat_write())
            .await
            .context("Failed to authenticate with SQL Server")?;

        Ok(client)
    }

    async fn fetch(&self, sql: &str) -> Result<Vec<Row>> {
        let mut client = self.client.lock().await;
        let stream = client.simple_query(sql).await?;
        let results = stream.into_results().await?;

        let mut rows = Vec::new();
        for result in results {
            for raw in result {
                let mut row = Row::with_capacity(raw.columns().len());
                for (i, col) in raw.columns().iter().enumerate() {
                    row.insert(col.name().to_string(), cell(&raw, i, col));
                }
                rows.push(row);
            }
        }
        Ok(rows)
    }
}

impl DatabaseDriver for SqlServerDriver {
    fn backend(&self) -> Backend {
        Backend::SqlServer
    }

    fn query_rows(&self, sql: &str) -> Result<Vec<Row>> {
        self.runtime.block_on(self.fetch(sql))
    }

    fn list_tables(&self) -> Result<Vec<String>> {
        let rows = self.query_rows(Backend::SqlServer.table_list_query())?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get("name").and_then(Value::as_str).map(str::to_string))
            .collect())
    }

    fn native_columns(&self, table: &str) -> Result<Vec<NativeColumn>> {
        let query = format!(
            "SELECT COLUMN_NAME, DATA_TYPE, CHARACTER_MAXIMUM_LENGTH, \
             NUMERIC_PRECISION, NUMERIC_SCALE, COLUMN_DEFAULT \
             FROM INFORMATION_SCHEMA.COLUMNS \
             WHERE TABLE_NAME = {} \
             ORDER BY ORDINAL_POSITION",
            Backend::SqlServer.quote_literal(table)
        );
        let rows = self
            .query_rows(&query)
            .with_context(|| format!("Failed to read INFORMATION_SCHEMA for `{}`", table))?;

        let keys = [
            "COLUMN_NAME",
            "DATA_TYPE",
            "CHARACTER_MAXIMUM_LENGTH",
            "NUMERIC_PRECISION",
            "NUMERIC_SCALE",
            "COLUMN_DEFAULT",
        ];
        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            match NativeColumn::from_row(row, keys) {
                Some(column) => columns.push(column),
                None => tracing::warn!(table, ?row, "skipping unreadable INFORMATION_SCHEMA row"),
            }
        }
        Ok(columns)
    }

    fn database_name(&self) -> String {
        self.config.database.clone()
    }

    fn server_version(&self) -> Result<String> {
        let rows = self.query_rows("SELECT @@VERSION AS version")?;
        rows.first()
            .and_then(|row| row.get("version"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .context("No version info")
    }
}

// ---- Type conversion ----

fn cell(row: &tiberius::Row, index: usize, col: &Column) -> Value {
    fn get<'a, T>(row: &'a tiberius::Row, index: usize) -> Option<T>
    where
        T: tiberius::FromSql<'a>,
    {
        row.try_get::<T, _>(index).ok().flatten()
    }

    let value = match col.column_type() {
        ColumnType::Null => None,
        ColumnType::Bit | ColumnType::Bitn => get::<bool>(row, index).map(Value::Bool),
        ColumnType::Int1 => get::<u8>(row, index).map(|v| Value::Int(i64::from(v))),
        ColumnType::Int2 => get::<i16>(row, index).map(|v| Value::Int(i64::from(v))),
        ColumnType::Int4 => get::<i32>(row, index).map(|v| Value::Int(i64::from(v))),
        ColumnType::Int8 => get::<i64>(row, index).map(Value::Int),
        ColumnType::Intn => get::<i64>(row, index)
            .or_else(|| get::<i32>(row, index).map(i64::from))
            .or_else(|| get::<i16>(row, index).map(i64::from))
            .or_else(|| get::<u8>(row, index).map(i64::from))
            .map(Value::Int),
        ColumnType::Float4 => get::<f32>(row, index).map(|v| Value::Float(f64::from(v))),
        ColumnType::Float8 | ColumnType::Floatn | ColumnType::Money | ColumnType::Money4 => {
            get::<f64>(row, index)
                .or_else(|| get::<f32>(row, index).map(f64::from))
                .map(Value::Float)
        }
        ColumnType::Decimaln | ColumnType::Numericn => get::<Numeric>(row, index).map(|v| {
            if v.scale() == 0 {
                i64::try_from(v.value())
                    .map(Value::Int)
                    .unwrap_or_else(|_| Value::String(v.to_string()))
            } else {
                Value::Float(f64::from(v))
            }
        }),
        ColumnType::Datetime
        | ColumnType::Datetime2
        | ColumnType::Datetimen
        | ColumnType::Datetime4 => get::<NaiveDateTime>(row, index)
            .map(|v| Value::DateTime(v.format("%Y-%m-%d %H:%M:%S").to_string())),
        ColumnType::Daten => get::<NaiveDate>(row, index)
            .map(|v| Value::DateTime(v.format("%Y-%m-%d").to_string())),
        ColumnType::Timen => get::<NaiveTime>(row, index)
            .map(|v| Value::DateTime(v.format("%H:%M:%S").to_string())),
        ColumnType::DatetimeOffsetn => get::<DateTime<FixedOffset>>(row, index)
            .map(|v| Value::DateTime(v.format("%Y-%m-%d %H:%M:%S %:z").to_string())),
        ColumnType::Guid => get::<tiberius::Uuid>(row, index).map(|v| Value::String(v.to_string())),
        ColumnType::BigVarBin | ColumnType::BigBinary | ColumnType::Image => {
            get::<&[u8]>(row, index).map(|v| Value::Binary(v.to_vec()))
        }
        _ => get::<&str>(row, index).map(|v| Value::String(v.to_string())),
    };
    value.unwrap_or(Value::Null)
}
