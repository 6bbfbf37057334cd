use sqlx::{postgres::PgPoolOptions, PgPool};

pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Creates the `clients` table and its indexes if they are missing.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        tracing::info!("Running database migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS clients (
                id          BIGSERIAL PRIMARY KEY,
                first_name  VARCHAR(100) NOT NULL,
                last_name   VARCHAR(100) NOT NULL,
                middle_name VARCHAR(100),
                birth_date  DATE NOT NULL,
                features    JSONB,
                created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        for statement in [
            "CREATE INDEX IF NOT EXISTS idx_clients_first_name ON clients (first_name)",
            "CREATE INDEX IF NOT EXISTS idx_clients_last_name ON clients (last_name)",
            "CREATE INDEX IF NOT EXISTS idx_clients_birth_date ON clients (birth_date)",
        ] {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        tracing::info!("Database migrations completed");
        Ok(())
    }
}
