use std::time::Duration;

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::database::models::{Drink, DrinkPatch, DrinkRow, Ingredient, NewDrink, Recipe};
use crate::database::store::{DrinkStore, StoreError};

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS drinks (
        id SERIAL PRIMARY KEY,
        title TEXT NOT NULL UNIQUE CHECK (title <> ''),
        recipe TEXT NOT NULL
    )
"#;

const DROP_TABLE: &str = "DROP TABLE IF EXISTS drinks";

/// PostgreSQL-backed drink store
#[derive(Clone, Debug)]
pub struct PgDrinkStore {
    pool: PgPool,
}

impl PgDrinkStore {
    /// Open a pool against `DATABASE_URL`
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let url = config
            .url
            .as_deref()
            .ok_or(StoreError::ConfigMissing("DATABASE_URL"))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await?;

        info!(
            "Created database pool (max {} connections)",
            config.max_connections
        );
        Ok(Self { pool })
    }

    /// Create the `drinks` table when it is missing
    pub async fn setup(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        Ok(())
    }

    /// Drop every record, recreate the table and seed a single drink
    pub async fn reset(&self) -> Result<Drink, StoreError> {
        sqlx::query(DROP_TABLE).execute(&self.pool).await?;
        self.setup().await?;

        let seeded = self.create(seed_drink()).await?;
        info!("Reset drinks table and seeded drink {}", seeded.id);
        Ok(seeded)
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Closed database pool");
    }
}

/// The drink a freshly reset database starts with
pub fn seed_drink() -> NewDrink {
    NewDrink {
        title: "water".to_string(),
        recipe: Recipe(vec![Ingredient {
            name: "water".to_string(),
            color: "blue".to_string(),
            parts: 1,
        }]),
    }
}

fn into_drink(row: DrinkRow) -> Result<Drink, StoreError> {
    let id = row.id;
    Drink::try_from(row).map_err(|source| StoreError::CorruptRecipe { id, source })
}

/// Map constraint violations to `Conflict`, everything else passes through
fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::Conflict("a drink with this title already exists".to_string());
        }
        if db_err.is_check_violation() {
            return StoreError::Conflict("drink title must not be empty".to_string());
        }
    }
    StoreError::Sqlx(err)
}

#[async_trait]
impl DrinkStore for PgDrinkStore {
    async fn all(&self) -> Result<Vec<Drink>, StoreError> {
        let rows = sqlx::query_as::<_, DrinkRow>("SELECT id, title, recipe FROM drinks ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(into_drink).collect()
    }

    async fn get(&self, id: i32) -> Result<Drink, StoreError> {
        let row = sqlx::query_as::<_, DrinkRow>("SELECT id, title, recipe FROM drinks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(id))?;

        into_drink(row)
    }

    async fn create(&self, drink: NewDrink) -> Result<Drink, StoreError> {
        let recipe = drink.recipe.to_text()?;

        let row = sqlx::query_as::<_, DrinkRow>(
            "INSERT INTO drinks (title, recipe) VALUES ($1, $2) RETURNING id, title, recipe",
        )
        .bind(&drink.title)
        .bind(recipe)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;

        into_drink(row)
    }

    async fn update(&self, id: i32, patch: DrinkPatch) -> Result<Drink, StoreError> {
        let recipe = patch.recipe.as_ref().map(Recipe::to_text).transpose()?;

        let row = sqlx::query_as::<_, DrinkRow>(
            r#"
            UPDATE drinks
            SET title = COALESCE($2, title),
                recipe = COALESCE($3, recipe)
            WHERE id = $1
            RETURNING id, title, recipe
            "#,
        )
        .bind(id)
        .bind(patch.title)
        .bind(recipe)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?
        .ok_or(StoreError::NotFound(id))?;

        into_drink(row)
    }

    async fn delete(&self, id: i32) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM drinks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
