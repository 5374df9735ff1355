use super::traits::{CanonicalEventRecord, EventStore, StoreError};
use crate::config::StorageConfig;
use crate::pipeline::normalize::normalizers::base::NormalizerUtils;
use crate::types::{Platform, RawImportedEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Builder, Connection, Database, Row};
use tracing::info;
use uuid::Uuid;

const SELECT_COLUMNS: &str = "id, slug, source_url, platform, title, description, starts_at, \
    ends_at, location_name, address, city, latitude, longitude, organizer_name, image_url, \
    is_free, price, imported_by, created_at";

fn backend<E: std::fmt::Display>(context: &str) -> impl FnOnce(E) -> StoreError + '_ {
    move |e| StoreError::Backend(format!("{context}: {e}"))
}

/// Event store backed by a local libSQL file or a remote libSQL/Turso database.
pub struct LibsqlEventStore {
    db: Database,
}

impl LibsqlEventStore {
    /// Remote when `libsql_url` is set, otherwise the local `db_path` file.
    pub async fn connect(config: &StorageConfig) -> Result<Self, StoreError> {
        let db = match (&config.libsql_url, &config.db_path) {
            (Some(url), _) => {
                let token = config.libsql_auth_token.clone().unwrap_or_default();
                info!("Connecting to remote libSQL database at {}", url);
                Builder::new_remote(url.clone(), token)
                    .build()
                    .await
                    .map_err(backend("Failed to connect to database"))?
            }
            (None, Some(path)) => {
                info!("Opening local libSQL database at {}", path);
                Builder::new_local(path)
                    .build()
                    .await
                    .map_err(backend("Failed to open database"))?
            }
            (None, None) => {
                return Err(StoreError::Backend(
                    "neither LIBSQL_URL nor IMPORTER_DB_PATH is set".to_string(),
                ))
            }
        };

        let store = Self { db };
        store.run_migrations().await?;
        Ok(store)
    }

    fn connection(&self) -> Result<Connection, StoreError> {
        self.db
            .connect()
            .map_err(backend("Failed to get database connection"))
    }

    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        info!("Running database migrations...");
        let conn = self.connection()?;
        conn.execute_batch(include_str!("../../migrations/001_create_imported_events.sql"))
            .await
            .map_err(backend("Failed to run migrations"))?;
        info!("Database migrations completed successfully");
        Ok(())
    }

    fn row_to_record(row: &Row) -> Result<CanonicalEventRecord, StoreError> {
        let text = |i: i32| row.get::<String>(i).map_err(backend("Failed to read column"));
        let opt_text =
            |i: i32| row.get::<Option<String>>(i).map_err(backend("Failed to read column"));
        let opt_real =
            |i: i32| row.get::<Option<f64>>(i).map_err(backend("Failed to read column"));
        let uuid = |s: String| Uuid::parse_str(&s).map_err(backend("Invalid UUID column"));
        let timestamp = |s: Option<String>| s.as_deref().and_then(NormalizerUtils::parse_datetime);

        let platform: Platform = serde_json::from_value(serde_json::Value::String(text(3)?))
            .map_err(backend("Unknown platform"))?;
        let created_at: DateTime<Utc> =
            timestamp(Some(text(18)?)).ok_or_else(|| StoreError::Backend("Invalid created_at".into()))?;

        Ok(CanonicalEventRecord {
            id: uuid(text(0)?)?,
            slug: text(1)?,
            platform,
            imported_by: uuid(text(17)?)?,
            created_at,
            event: RawImportedEvent {
                source_url: text(2)?,
                title: text(4)?,
                description: opt_text(5)?,
                starts_at: timestamp(opt_text(6)?),
                ends_at: timestamp(opt_text(7)?),
                location_name: opt_text(8)?,
                address: opt_text(9)?,
                city: opt_text(10)?,
                latitude: opt_real(11)?,
                longitude: opt_real(12)?,
                organizer_name: opt_text(13)?,
                image_url: opt_text(14)?,
                is_free: row.get::<i64>(15).map_err(backend("Failed to read column"))? != 0,
                price: opt_text(16)?,
            },
        })
    }
}

#[async_trait]
impl EventStore for LibsqlEventStore {
    async fn find_by_source_url(
        &self,
        source_url: &str,
    ) -> Result<Option<CanonicalEventRecord>, StoreError> {
        let conn = self.connection()?;
        let mut rows = conn
            .query(
                &format!("SELECT {SELECT_COLUMNS} FROM imported_events WHERE source_url = ?"),
                libsql::params![source_url],
            )
            .await
            .map_err(backend("Failed to query event"))?;

        match rows.next().await.map_err(backend("Failed to read row"))? {
            Some(row) => Ok(Some(Self::row_to_record(&row)?)),
            None => Ok(None),
        }
    }

    async fn insert_event(&self, record: &CanonicalEventRecord) -> Result<(), StoreError> {
        let conn = self.connection()?;
        let e = &record.event;
        let result = conn
            .execute(
                &format!(
                    "INSERT INTO imported_events ({SELECT_COLUMNS}) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
                ),
                libsql::params![
                    record.id.to_string(),
                    record.slug.clone(),
                    e.source_url.clone(),
                    record.platform.as_str(),
                    e.title.clone(),
                    e.description.clone(),
                    e.starts_at.map(|d| d.to_rfc3339()),
                    e.ends_at.map(|d| d.to_rfc3339()),
                    e.location_name.clone(),
                    e.address.clone(),
                    e.city.clone(),
                    e.latitude,
                    e.longitude,
                    e.organizer_name.clone(),
                    e.image_url.clone(),
                    e.is_free as i64,
                    e.price.clone(),
                    record.imported_by.to_string(),
                    record.created_at.to_rfc3339(),
                ],
            )
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if err.to_string().contains("UNIQUE constraint failed") => {
                Err(StoreError::UniqueViolation {
                    source_url: e.source_url.clone(),
                })
            }
            Err(err) => Err(StoreError::Backend(format!("Failed to insert event: {err}"))),
        }
    }

    async fn count_events(&self) -> Result<u64, StoreError> {
        let conn = self.connection()?;
        let mut rows = conn
            .query("SELECT COUNT(*) FROM imported_events", ())
            .await
            .map_err(backend("Failed to count events"))?;
        let count = match rows.next().await.map_err(backend("Failed to read row"))? {
            Some(row) => row.get::<i64>(0).map_err(backend("Failed to read count"))?,
            None => 0,
        };
        Ok(count.max(0) as u64)
    }
}
