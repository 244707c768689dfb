//! PostgreSQL scalar store for [`BasicInfo`].

use async_trait::async_trait;
use chrono::NaiveDate;
use deadpool_postgres::{Config, Pool, Runtime};
use tokio_postgres::NoTls;

use crate::config::DatabaseConfig;
use crate::db::BasicInfoStore;
use crate::error::DatabaseError;
use crate::profile::{BasicInfo, BasicInfoField};

/// Schema-qualified table holding one row per user.
const TABLE: &str = "user_profile.basic_info";

/// Boxed dynamic SQL parameter for tokio_postgres queries.
type PgParam = Box<dyn tokio_postgres::types::ToSql + Sync + Send>;

/// Basic info backed by PostgreSQL.
pub struct PgBasicInfoStore {
    pool: Pool,
}

impl PgBasicInfoStore {
    /// Create a new store and connect to the database.
    pub async fn new(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let mut cfg = Config::new();
        cfg.url = Some(config.url().to_string());
        cfg.pool = Some(deadpool_postgres::PoolConfig {
            max_size: config.pool_size,
            ..Default::default()
        });

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| DatabaseError::Pool(e.to_string()))?;

        // Test connection
        let _ = pool.get().await?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }

    /// Get a connection from the pool.
    pub async fn conn(&self) -> Result<deadpool_postgres::Object, DatabaseError> {
        Ok(self.pool.get().await?)
    }
}

/// `INSERT .. ON CONFLICT` touching only the given columns. `$1` is the user id.
fn upsert_sql(fields: &[BasicInfoField]) -> String {
    let columns: Vec<&str> = fields.iter().map(|f| f.column()).collect();
    let placeholders: Vec<String> = (0..fields.len()).map(|i| format!("${}", i + 2)).collect();
    let updates: Vec<String> = columns
        .iter()
        .map(|c| format!("{c} = EXCLUDED.{c}"))
        .chain(std::iter::once("updated_at = NOW()".to_string()))
        .collect();

    format!(
        "INSERT INTO {TABLE} (user_id, {}) VALUES ($1, {}) \
         ON CONFLICT (user_id) DO UPDATE SET {}",
        columns.join(", "),
        placeholders.join(", "),
        updates.join(", "),
    )
}

fn select_sql() -> String {
    let columns: Vec<&str> = BasicInfoField::ALL.iter().map(|f| f.column()).collect();
    format!("SELECT {} FROM {TABLE} WHERE user_id = $1", columns.join(", "))
}

fn param_for(info: &BasicInfo, field: BasicInfoField) -> Result<PgParam, DatabaseError> {
    if field == BasicInfoField::Birthday {
        let date: NaiveDate = info.birthday().ok_or_else(|| {
            DatabaseError::Serialization("birthday is not a valid date".to_string())
        })?;
        return Ok(Box::new(date));
    }
    Ok(Box::new(info.get(field).unwrap_or_default().to_string()))
}

fn row_to_basic_info(row: &tokio_postgres::Row) -> Result<BasicInfo, DatabaseError> {
    let mut info = BasicInfo::new();
    for field in BasicInfoField::ALL {
        let value = if field == BasicInfoField::Birthday {
            row.try_get::<_, Option<NaiveDate>>(field.column())?
                .map(|d| d.format(crate::profile::basic_info::BIRTHDAY_FORMAT).to_string())
        } else {
            row.try_get::<_, Option<String>>(field.column())?
        };
        if let Some(value) = value
            && let Err(e) = info.set(field, value)
        {
            tracing::debug!(column = field.column(), error = %e, "Skipping stored value");
        }
    }
    Ok(info)
}

#[async_trait]
impl BasicInfoStore for PgBasicInfoStore {
    /// Run database migrations (embedded via refinery).
    async fn ensure_schema(&self) -> Result<(), DatabaseError> {
        use refinery::embed_migrations;
        embed_migrations!("migrations");

        let mut client = self.pool.get().await?;
        migrations::runner()
            .run_async(&mut **client)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;
        Ok(())
    }

    async fn get_basic_info(&self, user_id: &str) -> Result<Option<BasicInfo>, DatabaseError> {
        let conn = self.conn().await?;
        let row = conn.query_opt(&select_sql(), &[&user_id]).await?;
        row.as_ref().map(row_to_basic_info).transpose()
    }

    async fn upsert_basic_info(
        &self,
        user_id: &str,
        info: &BasicInfo,
    ) -> Result<bool, DatabaseError> {
        if info.is_empty() {
            return Ok(false);
        }
        let fields: Vec<BasicInfoField> = info.iter().map(|(f, _)| f).collect();

        let mut params: Vec<PgParam> = Vec::with_capacity(fields.len() + 1);
        params.push(Box::new(user_id.to_string()));
        for field in &fields {
            params.push(param_for(info, *field)?);
        }
        let param_refs: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> = params
            .iter()
            .map(|p| p.as_ref() as &(dyn tokio_postgres::types::ToSql + Sync))
            .collect();

        let conn = self.conn().await?;
        conn.execute(&upsert_sql(&fields), &param_refs).await?;
        tracing::debug!(user_id, columns = fields.len(), "Upserted basic info");
        Ok(true)
    }

    async fn delete_basic_info(&self, user_id: &str) -> Result<bool, DatabaseError> {
        let conn = self.conn().await?;
        let deleted = conn
            .execute(&format!("DELETE FROM {TABLE} WHERE user_id = $1"), &[&user_id])
            .await?;
        Ok(deleted > 0)
    }
}
