use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::errors::{AppError, ResultExt};
use crate::models::{Client, ClientFilter, NewClient, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Rows per multi-row INSERT inside a batch.
const INSERT_CHUNK_SIZE: usize = 100;

/// Persistence for client records.
#[async_trait]
pub trait ClientStore: Send + Sync {
    async fn create(&self, client: &NewClient) -> Result<Client, AppError>;

    /// Inserts all clients atomically and returns how many were stored.
    async fn batch_create(&self, clients: &[NewClient]) -> Result<usize, AppError>;

    async fn get_by_id(&self, id: i64) -> Result<Client, AppError>;

    async fn search(&self, filter: &ClientFilter) -> Result<Vec<Client>, AppError>;

    /// Persists all mutable fields of `client`; fails with `NotFound` if no row matches.
    async fn update(&self, client: &Client) -> Result<Client, AppError>;

    async fn delete(&self, id: i64) -> Result<(), AppError>;

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Client>, AppError>;
}

/// Rejects non-positive ids before they reach the database.
pub fn validate_id(id: i64) -> Result<(), AppError> {
    if id <= 0 {
        return Err(AppError::BadRequest("invalid client ID".to_string()));
    }
    Ok(())
}

/// Escapes `LIKE` wildcards so user input matches literally.
pub fn escape_like_pattern(pattern: &str) -> String {
    pattern
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Clamps list pagination to the allowed range.
pub fn clamp_page(limit: i64, offset: i64) -> (i64, i64) {
    let limit = if limit <= 0 || limit > MAX_PAGE_SIZE {
        DEFAULT_PAGE_SIZE
    } else {
        limit
    };
    (limit, offset.max(0))
}

/// Postgres-backed client store.
#[derive(Clone)]
pub struct PgClientStore {
    pool: PgPool,
}

impl PgClientStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClientStore for PgClientStore {
    async fn create(&self, client: &NewClient) -> Result<Client, AppError> {
        tracing::debug!(
            "Creating client {} {}",
            client.first_name,
            client.last_name
        );

        let created = sqlx::query_as::<_, Client>(
            r#"
            INSERT INTO clients (first_name, last_name, middle_name, birth_date, features)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&client.first_name)
        .bind(&client.last_name)
        .bind(&client.middle_name)
        .bind(client.birth_date)
        .bind(&client.features)
        .fetch_one(&self.pool)
        .await
        .context("failed to create client")?;

        tracing::info!("Client created: {}", created.id);
        Ok(created)
    }

    async fn batch_create(&self, clients: &[NewClient]) -> Result<usize, AppError> {
        if clients.is_empty() {
            return Ok(0);
        }

        tracing::debug!("Batch creating {} clients", clients.len());

        let mut tx = self.pool.begin().await.context("failed to open transaction")?;
        let mut created = 0usize;

        for chunk in clients.chunks(INSERT_CHUNK_SIZE) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO clients (first_name, last_name, middle_name, birth_date, features) ",
            );
            builder.push_values(chunk, |mut row, client| {
                row.push_bind(&client.first_name)
                    .push_bind(&client.last_name)
                    .push_bind(&client.middle_name)
                    .push_bind(client.birth_date)
                    .push_bind(&client.features);
            });

            let result = builder
                .build()
                .execute(&mut *tx)
                .await
                .context("failed to batch create clients")?;
            created += result.rows_affected() as usize;
        }

        tx.commit().await.context("failed to commit client batch")?;

        tracing::info!("Clients batch created: {}", created);
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> Result<Client, AppError> {
        validate_id(id)?;

        sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to get client {}", id))?
            .ok_or_else(|| {
                tracing::warn!("Client not found: {}", id);
                AppError::NotFound(format!("client {} not found", id))
            })
    }

    async fn search(&self, filter: &ClientFilter) -> Result<Vec<Client>, AppError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT * FROM clients WHERE TRUE");

        for (column, value) in [
            ("first_name", &filter.first_name),
            ("last_name", &filter.last_name),
            ("middle_name", &filter.middle_name),
        ] {
            if let Some(value) = value {
                builder
                    .push(format!(" AND LOWER({}) LIKE LOWER(", column))
                    .push_bind(format!("%{}%", escape_like_pattern(value)))
                    .push(") ESCAPE '\\'");
            }
        }

        if let Some(birth_date) = filter.birth_date {
            builder.push(" AND birth_date = ").push_bind(birth_date);
        }

        builder
            .push(" ORDER BY id LIMIT ")
            .push_bind(MAX_PAGE_SIZE);

        let clients = builder
            .build_query_as::<Client>()
            .fetch_all(&self.pool)
            .await
            .context("failed to search clients")?;

        tracing::info!("Client search returned {} rows", clients.len());
        Ok(clients)
    }

    async fn update(&self, client: &Client) -> Result<Client, AppError> {
        validate_id(client.id)?;

        sqlx::query_as::<_, Client>(
            r#"
            UPDATE clients
            SET first_name = $2,
                last_name = $3,
                middle_name = $4,
                birth_date = $5,
                features = $6,
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(client.id)
        .bind(&client.first_name)
        .bind(&client.last_name)
        .bind(&client.middle_name)
        .bind(client.birth_date)
        .bind(&client.features)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to update client {}", client.id))?
        .ok_or_else(|| {
            tracing::warn!("Client not found for update: {}", client.id);
            AppError::NotFound(format!("client {} not found", client.id))
        })
    }

    async fn delete(&self, id: i64) -> Result<(), AppError> {
        validate_id(id)?;

        let result = sqlx::query("DELETE FROM clients WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete client {}", id))?;

        if result.rows_affected() == 0 {
            tracing::warn!("Client not found for deletion: {}", id);
            return Err(AppError::NotFound(format!("client {} not found", id)));
        }

        Ok(())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Client>, AppError> {
        let (limit, offset) = clamp_page(limit, offset);

        let clients = sqlx::query_as::<_, Client>(
            "SELECT * FROM clients ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("failed to list clients")?;

        Ok(clients)
    }
}
