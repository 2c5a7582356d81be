//! Source/field catalog and projection registry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, types::Json, FromRow, PgPool};
use tracing::{debug, info};

use wx_common::{
    GribSelector, IndexSelector, Metric, MetricId, Projection, ProjectionId, ProjectionParams,
    Source, SourceField, SourceFieldId, SourceId, StepType, WxError, WxResult,
};

use crate::seed::CatalogSeed;

/// Shared projection records, one per distinct grid.
#[async_trait]
pub trait ProjectionRegistry: Send + Sync {
    /// Return the projection with exactly these parameters, creating it
    /// on first sight. Ids are stable.
    async fn get_or_create_projection(&self, params: &ProjectionParams) -> WxResult<Projection>;
}

/// Sources and their configured fields.
#[async_trait]
pub trait SourceCatalog: Send + Sync {
    async fn source_by_short_name(&self, short_name: &str) -> WxResult<Source>;

    /// Fields of a source ordered by id.
    async fn source_fields(&self, source_id: SourceId) -> WxResult<Vec<SourceField>>;

    async fn set_field_projection(
        &self,
        field_id: SourceFieldId,
        projection_id: ProjectionId,
    ) -> WxResult<()>;

    async fn mark_updated(&self, source_id: SourceId, at: DateTime<Utc>) -> WxResult<()>;

    /// Fields of every source providing one of `metrics`.
    async fn fields_for_metrics(&self, metrics: &[MetricId]) -> WxResult<Vec<SourceField>>;
}

/// PostgreSQL-backed catalog.
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub async fn connect(database_url: &str) -> WxResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| WxError::DatabaseError(format!("Connection failed: {}", e)))?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> WxResult<()> {
        for statement in SCHEMA_SQL.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| WxError::DatabaseError(format!("Migration failed: {}", e)))?;
            }
        }

        Ok(())
    }

    /// Upsert metrics, sources and fields from a seed. Existing projection
    /// assignments are kept.
    pub async fn apply_seed(&self, seed: &CatalogSeed) -> WxResult<()> {
        for metric in seed.all_metrics() {
            sqlx::query(
                "INSERT INTO metrics (id, name, units, intermediate) VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, units = EXCLUDED.units, \
                 intermediate = EXCLUDED.intermediate",
            )
            .bind(metric.id.0)
            .bind(&metric.name)
            .bind(&metric.units)
            .bind(metric.intermediate)
            .execute(&self.pool)
            .await
            .map_err(|e| WxError::DatabaseError(format!("Metric upsert failed: {}", e)))?;
        }

        for source in &seed.sources {
            let (source_id,): (i64,) = sqlx::query_as(
                "INSERT INTO sources (short_name, name, src_url) VALUES ($1, $2, $3) \
                 ON CONFLICT (short_name) DO UPDATE SET name = EXCLUDED.name, \
                 src_url = EXCLUDED.src_url RETURNING id",
            )
            .bind(&source.short_name)
            .bind(&source.name)
            .bind(&source.src_url)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| WxError::DatabaseError(format!("Source upsert failed: {}", e)))?;

            for field in &source.fields {
                sqlx::query(
                    r#"
                    INSERT INTO source_fields (
                        source_id, metric_id, idx_short_name, idx_level,
                        grib_short_name, grib_level, grib_step_type
                    ) VALUES ($1, $2, $3, $4, $5, $6, $7)
                    ON CONFLICT (source_id, metric_id) DO UPDATE SET
                        idx_short_name = EXCLUDED.idx_short_name,
                        idx_level = EXCLUDED.idx_level,
                        grib_short_name = EXCLUDED.grib_short_name,
                        grib_level = EXCLUDED.grib_level,
                        grib_step_type = EXCLUDED.grib_step_type
                    "#,
                )
                .bind(source_id)
                .bind(field.metric.0)
                .bind(&field.idx.short_name)
                .bind(&field.idx.level)
                .bind(&field.grib.short_name)
                .bind(&field.grib.level)
                .bind(field.grib.step_type.map(|s| s.as_str()))
                .execute(&self.pool)
                .await
                .map_err(|e| WxError::DatabaseError(format!("Field upsert failed: {}", e)))?;
            }

            info!(source = %source.short_name, fields = source.fields.len(), "Seeded source");
        }

        Ok(())
    }

    async fn query_fields(&self, filter: &str, bind: FieldFilter<'_>) -> WxResult<Vec<SourceField>> {
        let sql = format!("{} WHERE {} ORDER BY f.id", FIELD_SELECT, filter);
        let query = sqlx::query_as::<_, FieldRow>(&sql);
        let query = match bind {
            FieldFilter::Source(id) => query.bind(id),
            FieldFilter::Metrics(ids) => query.bind(ids.to_vec()),
        };

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| WxError::DatabaseError(format!("Query failed: {}", e)))?;

        rows.into_iter().map(FieldRow::into_field).collect()
    }
}

enum FieldFilter<'a> {
    Source(i64),
    Metrics(&'a [i64]),
}

#[async_trait]
impl ProjectionRegistry for PgCatalog {
    async fn get_or_create_projection(&self, params: &ProjectionParams) -> WxResult<Projection> {
        sqlx::query("INSERT INTO projections (params) VALUES ($1) ON CONFLICT (params) DO NOTHING")
            .bind(Json(params))
            .execute(&self.pool)
            .await
            .map_err(|e| WxError::DatabaseError(format!("Projection insert failed: {}", e)))?;

        let row = sqlx::query_as::<_, ProjectionRow>(
            "SELECT id, params FROM projections WHERE params = $1",
        )
        .bind(Json(params))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| WxError::DatabaseError(format!("Projection lookup failed: {}", e)))?;

        debug!(id = row.id, "Resolved projection");
        Ok(row.into())
    }
}

#[async_trait]
impl SourceCatalog for PgCatalog {
    async fn source_by_short_name(&self, short_name: &str) -> WxResult<Source> {
        let row = sqlx::query_as::<_, SourceRow>(
            "SELECT id, short_name, name, src_url, last_updated FROM sources WHERE short_name = $1",
        )
        .bind(short_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| WxError::DatabaseError(format!("Query failed: {}", e)))?;

        row.map(Source::from)
            .ok_or_else(|| WxError::UnknownSource(short_name.to_string()))
    }

    async fn source_fields(&self, source_id: SourceId) -> WxResult<Vec<SourceField>> {
        self.query_fields("f.source_id = $1", FieldFilter::Source(source_id.0))
            .await
    }

    async fn set_field_projection(
        &self,
        field_id: SourceFieldId,
        projection_id: ProjectionId,
    ) -> WxResult<()> {
        let result = sqlx::query("UPDATE source_fields SET projection_id = $1 WHERE id = $2")
            .bind(projection_id.0)
            .bind(field_id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| WxError::DatabaseError(format!("Update failed: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(WxError::NotFound(format!("source field {}", field_id.0)));
        }
        Ok(())
    }

    async fn mark_updated(&self, source_id: SourceId, at: DateTime<Utc>) -> WxResult<()> {
        sqlx::query("UPDATE sources SET last_updated = $1 WHERE id = $2")
            .bind(at)
            .bind(source_id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| WxError::DatabaseError(format!("Update failed: {}", e)))?;
        Ok(())
    }

    async fn fields_for_metrics(&self, metrics: &[MetricId]) -> WxResult<Vec<SourceField>> {
        let ids: Vec<i64> = metrics.iter().map(|m| m.0).collect();
        self.query_fields("f.metric_id = ANY($1)", FieldFilter::Metrics(&ids))
            .await
    }
}

#[derive(Debug, FromRow)]
struct SourceRow {
    id: i64,
    short_name: String,
    name: String,
    src_url: Option<String>,
    last_updated: Option<DateTime<Utc>>,
}

impl From<SourceRow> for Source {
    fn from(row: SourceRow) -> Self {
        Source {
            id: SourceId(row.id),
            short_name: row.short_name,
            name: row.name,
            src_url: row.src_url,
            last_updated: row.last_updated,
        }
    }
}

#[derive(Debug, FromRow)]
struct ProjectionRow {
    id: i64,
    params: Json<ProjectionParams>,
}

impl From<ProjectionRow> for Projection {
    fn from(row: ProjectionRow) -> Self {
        Projection {
            id: ProjectionId(row.id),
            params: row.params.0,
        }
    }
}

#[derive(Debug, FromRow)]
struct FieldRow {
    id: i64,
    source_id: i64,
    metric_id: i64,
    metric_name: String,
    metric_units: String,
    intermediate: bool,
    idx_short_name: String,
    idx_level: String,
    grib_short_name: String,
    grib_level: String,
    grib_step_type: Option<String>,
    projection_id: Option<i64>,
    projection_params: Option<Json<ProjectionParams>>,
}

impl FieldRow {
    fn into_field(self) -> WxResult<SourceField> {
        let step_type = self
            .grib_step_type
            .as_deref()
            .map(str::parse::<StepType>)
            .transpose()
            .map_err(|e| WxError::DatabaseError(format!("Field {}: {}", self.id, e)))?;

        let projection = match (self.projection_id, self.projection_params) {
            (Some(id), Some(params)) => Some(Projection {
                id: ProjectionId(id),
                params: params.0,
            }),
            _ => None,
        };

        Ok(SourceField {
            id: SourceFieldId(self.id),
            source_id: SourceId(self.source_id),
            metric: Metric {
                id: MetricId(self.metric_id),
                name: self.metric_name,
                units: self.metric_units,
                intermediate: self.intermediate,
            },
            idx: IndexSelector::new(self.idx_short_name, self.idx_level),
            selector: GribSelector {
                short_name: self.grib_short_name,
                level: self.grib_level,
                step_type,
            },
            projection,
        })
    }
}

const FIELD_SELECT: &str = r#"
SELECT f.id, f.source_id, m.id AS metric_id, m.name AS metric_name,
       m.units AS metric_units, m.intermediate,
       f.idx_short_name, f.idx_level, f.grib_short_name, f.grib_level,
       f.grib_step_type, p.id AS projection_id, p.params AS projection_params
FROM source_fields f
JOIN metrics m ON m.id = f.metric_id
LEFT JOIN projections p ON p.id = f.projection_id
"#;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS sources (
    id BIGSERIAL PRIMARY KEY,
    short_name TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    src_url TEXT,
    last_updated TIMESTAMPTZ
);

CREATE TABLE IF NOT EXISTS metrics (
    id BIGINT PRIMARY KEY,
    name TEXT NOT NULL,
    units TEXT NOT NULL,
    intermediate BOOLEAN NOT NULL DEFAULT FALSE
);

CREATE TABLE IF NOT EXISTS projections (
    id BIGSERIAL PRIMARY KEY,
    params JSONB NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS source_fields (
    id BIGSERIAL PRIMARY KEY,
    source_id BIGINT NOT NULL REFERENCES sources(id),
    metric_id BIGINT NOT NULL REFERENCES metrics(id),
    idx_short_name TEXT NOT NULL,
    idx_level TEXT NOT NULL,
    grib_short_name TEXT NOT NULL,
    grib_level TEXT NOT NULL,
    grib_step_type TEXT,
    projection_id BIGINT REFERENCES projections(id),
    UNIQUE (source_id, metric_id)
);

CREATE INDEX IF NOT EXISTS idx_source_fields_metric ON source_fields(metric_id);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_row_conversion() {
        let row = FieldRow {
            id: 4,
            source_id: 1,
            metric_id: 3,
            metric_name: "Raining".into(),
            metric_units: "bool".into(),
            intermediate: false,
            idx_short_name: "CRAIN".into(),
            idx_level: "surface".into(),
            grib_short_name: "CRAIN".into(),
            grib_level: "surface".into(),
            grib_step_type: Some("instant".into()),
            projection_id: None,
            projection_params: None,
        };
        let field = row.into_field().unwrap();
        assert_eq!(field.id, SourceFieldId(4));
        assert_eq!(field.selector.step_type, Some(StepType::Instant));
        assert!(field.projection.is_none());
    }

    #[test]
    fn test_bad_step_type_is_an_error() {
        let row = FieldRow {
            id: 4,
            source_id: 1,
            metric_id: 3,
            metric_name: "Raining".into(),
            metric_units: "bool".into(),
            intermediate: false,
            idx_short_name: "CRAIN".into(),
            idx_level: "surface".into(),
            grib_short_name: "CRAIN".into(),
            grib_level: "surface".into(),
            grib_step_type: Some("hourly".into()),
            projection_id: None,
            projection_params: None,
        };
        assert!(matches!(row.into_field(), Err(WxError::DatabaseError(_))));
    }

    #[test]
    fn test_schema_statements_split() {
        let statements: Vec<_> = SCHEMA_SQL
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        assert_eq!(statements.len(), 5);
    }
}
