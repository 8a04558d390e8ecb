use anyhow::Result;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};

use crate::error::PredictionError;
use crate::models::{ClassLabel, NutrientKey, NutritionProfile};

/// Read-only source of nutrition profiles keyed by class name.
///
/// `Ok(None)` means the reference data has no row for the class; transport
/// and decoding failures are errors.
#[async_trait::async_trait]
pub trait NutritionRepository: Send + Sync {
    async fn lookup(&self, class_name: ClassLabel) -> Result<Option<NutritionProfile>, PredictionError>;
}

/// Postgres-backed reference table.
///
/// Every lookup checks a connection out of the pool for a single query; the
/// pool takes it back when the query future completes or is dropped.
pub struct Database {
    pool: PgPool,
    lookup_sql: String,
}

impl Database {
    pub async fn new(database_url: &str, max_connections: u32, table: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self::with_pool(pool, table))
    }

    pub fn with_pool(pool: PgPool, table: &str) -> Self {
        Database {
            pool,
            lookup_sql: build_lookup_sql(table),
        }
    }
}

#[async_trait::async_trait]
impl NutritionRepository for Database {
    async fn lookup(&self, class_name: ClassLabel) -> Result<Option<NutritionProfile>, PredictionError> {
        let row = sqlx::query(&self.lookup_sql)
            .bind(class_name.name())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let profile = NutritionProfile::try_from_fn(|key| -> Result<(f64, f64), sqlx::Error> {
            let amount_column = key.as_str();
            let akg_column = akg_column(key);
            let amount = finite_value(amount_column, row.try_get(amount_column)?)?;
            let akg = finite_value(&akg_column, row.try_get(akg_column.as_str())?)?;
            Ok((amount, akg))
        })?;

        Ok(Some(profile))
    }
}

/// `DOUBLE PRECISION` admits NaN and infinities, which would break the AKG ranking.
fn finite_value(column: &str, value: f64) -> Result<f64, sqlx::Error> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: format!("non-finite value {}", value).into(),
        })
    }
}

fn akg_column(key: NutrientKey) -> String {
    format!("akg_{}", key.as_str())
}

/// Columns are cast so NUMERIC, REAL and INTEGER schemas all decode as f64.
fn build_lookup_sql(table: &str) -> String {
    let columns: Vec<String> = NutrientKey::ALL
        .iter()
        .flat_map(|key| [key.as_str().to_string(), akg_column(*key)])
        .map(|column| format!("{0}::DOUBLE PRECISION AS {0}", column))
        .collect();

    format!(
        r#"SELECT {} FROM "{}" WHERE class_name = $1 LIMIT 1"#,
        columns.join(", "),
        table
    )
}

/// Fixed in-memory reference data.
#[cfg(test)]
#[derive(Default)]
pub struct InMemoryNutritionRepository {
    pub profiles: std::collections::HashMap<ClassLabel, NutritionProfile>,
}

#[cfg(test)]
#[async_trait::async_trait]
impl NutritionRepository for InMemoryNutritionRepository {
    async fn lookup(&self, class_name: ClassLabel) -> Result<Option<NutritionProfile>, PredictionError> {
        Ok(self.profiles.get(&class_name).cloned())
    }
}
