use crate::food::generation::AssembledRecipe;
use chrono::{DateTime, SecondsFormat, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use rusqlite::{params, types::Type, OptionalExtension, Row};
use tokio_rusqlite::Connection;
use uuid::Uuid;

pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] tokio_rusqlite::Error),
    #[error("Database connection error: {0}")]
    Connection(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A persisted recipe: the assembled record plus identity and provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecipe {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    pub recipe: AssembledRecipe,
    #[serde(rename = "createdBy")]
    pub created_by: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeQuery {
    pub search: Option<String>,
    /// 1-based.
    pub page: u32,
    pub limit: u32,
}

impl Default for RecipeQuery {
    fn default() -> Self {
        Self {
            search: None,
            page: 1,
            limit: 10,
        }
    }
}

impl RecipeQuery {
    fn normalized(&self) -> Self {
        Self {
            search: self
                .search
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            page: self.page.max(1),
            limit: self.limit.clamp(1, MAX_PAGE_SIZE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipePage {
    pub recipes: Vec<StoredRecipe>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub pages: u64,
}

#[derive(Clone)]
pub struct Database {
    conn: Arc<Connection>,
}

impl Database {
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DatabaseError::Connection(e.to_string()))?;
        }

        let conn = Connection::open(path)
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;
        Self::with_connection(conn).await
    }

    pub async fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;
        Self::with_connection(conn).await
    }

    async fn with_connection(conn: Connection) -> Result<Self, DatabaseError> {
        let db = Self {
            conn: Arc::new(conn),
        };
        db.initialize().await?;
        Ok(db)
    }

    async fn initialize(&self) -> Result<(), DatabaseError> {
        self.conn
            .call(|conn| {
                conn.execute_batch(
                    "CREATE TABLE IF NOT EXISTS recipes (
                        id TEXT PRIMARY KEY,
                        name TEXT NOT NULL,
                        ingredients TEXT NOT NULL,
                        instructions TEXT NOT NULL,
                        estimated_calories REAL NOT NULL,
                        estimated_time TEXT NOT NULL,
                        servings INTEGER NOT NULL,
                        image TEXT NOT NULL,
                        ai_generated INTEGER NOT NULL,
                        diets TEXT NOT NULL,
                        created_by TEXT NOT NULL,
                        created_at TEXT NOT NULL
                    );
                    CREATE INDEX IF NOT EXISTS idx_recipes_created_at ON recipes (created_at);",
                )?;
                Ok(())
            })
            .await?;

        info!("Database initialized successfully");
        Ok(())
    }

    /// Persists a generated recipe, assigning its id and creation time.
    pub async fn insert_recipe(
        &self,
        recipe: &AssembledRecipe,
        created_by: &str,
    ) -> Result<StoredRecipe, DatabaseError> {
        let stored = StoredRecipe {
            id: Uuid::new_v4().to_string(),
            recipe: recipe.clone(),
            created_by: created_by.to_string(),
            created_at: Utc::now(),
        };

        let ingredients = serde_json::to_string(&stored.recipe.ingredients)?;
        let diets = serde_json::to_string(&stored.recipe.diets)?;
        let row = stored.clone();

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO recipes (id, name, ingredients, instructions, estimated_calories,
                        estimated_time, servings, image, ai_generated, diets, created_by, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                    params![
                        row.id,
                        row.recipe.name,
                        ingredients,
                        row.recipe.instructions,
                        row.recipe.estimated_calories,
                        row.recipe.estimated_time,
                        row.recipe.servings,
                        row.recipe.image,
                        row.recipe.ai_generated,
                        diets,
                        row.created_by,
                        format_timestamp(&row.created_at),
                    ],
                )?;
                Ok(())
            })
            .await?;

        info!("Stored recipe '{}' as {}", stored.recipe.name, stored.id);
        Ok(stored)
    }

    pub async fn get_recipe(&self, id: &str) -> Result<Option<StoredRecipe>, DatabaseError> {
        let id = id.to_string();
        let result = self
            .conn
            .call(move |conn| {
                let recipe = conn
                    .query_row(
                        &format!("SELECT {} FROM recipes WHERE id = ?1", RECIPE_COLUMNS),
                        [&id],
                        row_to_recipe,
                    )
                    .optional()?;
                Ok(recipe)
            })
            .await?;

        Ok(result)
    }

    pub async fn list_recipes(&self, query: &RecipeQuery) -> Result<RecipePage, DatabaseError> {
        let query = query.normalized();
        let pattern = like_pattern(query.search.as_deref());
        let limit = query.limit;
        let offset = u64::from(query.page - 1) * u64::from(limit);

        let (recipes, total) = self
            .conn
            .call(move |conn| {
                let total: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM recipes WHERE name LIKE ?1 ESCAPE '\\'",
                    [&pattern],
                    |row| row.get(0),
                )?;

                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM recipes WHERE name LIKE ?1 ESCAPE '\\'
                     ORDER BY created_at DESC, id LIMIT ?2 OFFSET ?3",
                    RECIPE_COLUMNS
                ))?;
                let rows = stmt.query_map(params![pattern, limit, offset as i64], row_to_recipe)?;

                let mut recipes = Vec::new();
                for row in rows {
                    recipes.push(row?);
                }

                Ok((recipes, total.max(0) as u64))
            })
            .await?;

        Ok(RecipePage {
            recipes,
            total,
            page: query.page,
            limit,
            pages: total.div_ceil(u64::from(limit)),
        })
    }

    /// Replaces the content fields of a stored recipe. Identity and
    /// provenance columns are left alone. Returns whether a row matched.
    pub async fn update_recipe(&self, id: &str, recipe: &AssembledRecipe) -> Result<bool, DatabaseError> {
        let id = id.to_string();
        let ingredients = serde_json::to_string(&recipe.ingredients)?;
        let diets = serde_json::to_string(&recipe.diets)?;
        let recipe = recipe.clone();

        let updated = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE recipes SET name = ?1, ingredients = ?2, instructions = ?3,
                        estimated_calories = ?4, estimated_time = ?5, servings = ?6, image = ?7,
                        ai_generated = ?8, diets = ?9
                     WHERE id = ?10",
                    params![
                        recipe.name,
                        ingredients,
                        recipe.instructions,
                        recipe.estimated_calories,
                        recipe.estimated_time,
                        recipe.servings,
                        recipe.image,
                        recipe.ai_generated,
                        diets,
                        id,
                    ],
                )?;
                Ok(changed > 0)
            })
            .await?;

        Ok(updated)
    }

    /// Returns whether a recipe was removed.
    pub async fn delete_recipe(&self, id: &str) -> Result<bool, DatabaseError> {
        let id = id.to_string();
        let deleted = self
            .conn
            .call(move |conn| {
                let changed = conn.execute("DELETE FROM recipes WHERE id = ?1", [&id])?;
                Ok(changed > 0)
            })
            .await?;

        Ok(deleted)
    }
}

const RECIPE_COLUMNS: &str = "id, name, ingredients, instructions, estimated_calories, estimated_time, \
     servings, image, ai_generated, diets, created_by, created_at";

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn like_pattern(search: Option<&str>) -> String {
    match search {
        Some(term) => {
            let escaped = term
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{}%", escaped)
        }
        None => "%".to_string(),
    }
}

fn json_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_recipe(row: &Row<'_>) -> rusqlite::Result<StoredRecipe> {
    let created_at: String = row.get(11)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(11, Type::Text, Box::new(e)))?
        .with_timezone(&Utc);

    Ok(StoredRecipe {
        id: row.get(0)?,
        recipe: AssembledRecipe {
            name: row.get(1)?,
            ingredients: json_column(row, 2)?,
            instructions: row.get(3)?,
            estimated_calories: row.get(4)?,
            estimated_time: row.get(5)?,
            servings: row.get(6)?,
            image: row.get(7)?,
            ai_generated: row.get(8)?,
            diets: json_column(row, 9)?,
        },
        created_by: row.get(10)?,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe(name: &str) -> AssembledRecipe {
        AssembledRecipe {
            name: name.to_string(),
            ingredients: vec!["2 eggs".to_string(), "1 cup flour".to_string()],
            instructions: "Mix and bake.".to_string(),
            estimated_calories: 320.0,
            estimated_time: "30 mins".to_string(),
            servings: 4,
            image: "https://source.unsplash.com/random/800x600/?Cake".to_string(),
            ai_generated: true,
            diets: vec!["vegetarian".to_string()],
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::open_in_memory().await.unwrap();
        let stored = db.insert_recipe(&recipe("Sponge Cake"), "user-1").await.unwrap();

        assert!(Uuid::parse_str(&stored.id).is_ok());
        assert_eq!(stored.created_by, "user-1");

        let fetched = db.get_recipe(&stored.id).await.unwrap().unwrap();
        assert_eq!(fetched.recipe, recipe("Sponge Cake"));
        assert_eq!(fetched.id, stored.id);
        assert_eq!(
            format_timestamp(&fetched.created_at),
            format_timestamp(&stored.created_at)
        );
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = Database::open_in_memory().await.unwrap();
        assert!(db.get_recipe("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_with_search_and_paging() {
        let db = Database::open_in_memory().await.unwrap();
        for name in ["Sponge Cake", "Carrot Cake", "Tomato Soup"] {
            db.insert_recipe(&recipe(name), "system").await.unwrap();
        }

        let cakes = db
            .list_recipes(&RecipeQuery {
                search: Some("cake".to_string()),
                page: 1,
                limit: 1,
            })
            .await
            .unwrap();
        assert_eq!(cakes.total, 2);
        assert_eq!(cakes.pages, 2);
        assert_eq!(cakes.recipes.len(), 1);

        let all = db.list_recipes(&RecipeQuery::default()).await.unwrap();
        assert_eq!(all.total, 3);
        assert_eq!(all.pages, 1);
    }

    #[tokio::test]
    async fn test_search_wildcards_are_literal() {
        let db = Database::open_in_memory().await.unwrap();
        db.insert_recipe(&recipe("Tomato Soup"), "system").await.unwrap();

        let page = db
            .list_recipes(&RecipeQuery {
                search: Some("%".to_string()),
                ..RecipeQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_update_keeps_identity() {
        let db = Database::open_in_memory().await.unwrap();
        let stored = db.insert_recipe(&recipe("Sponge Cake"), "user-1").await.unwrap();

        let mut changed = recipe("Lemon Sponge Cake");
        changed.servings = 8;
        assert!(db.update_recipe(&stored.id, &changed).await.unwrap());

        let fetched = db.get_recipe(&stored.id).await.unwrap().unwrap();
        assert_eq!(fetched.recipe, changed);
        assert_eq!(fetched.created_by, "user-1");
        assert_eq!(
            format_timestamp(&fetched.created_at),
            format_timestamp(&stored.created_at)
        );

        assert!(!db.update_recipe("nope", &changed).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete() {
        let db = Database::open_in_memory().await.unwrap();
        let stored = db.insert_recipe(&recipe("Sponge Cake"), "system").await.unwrap();

        assert!(db.delete_recipe(&stored.id).await.unwrap());
        assert!(!db.delete_recipe(&stored.id).await.unwrap());
        assert!(db.get_recipe(&stored.id).await.unwrap().is_none());
    }

    #[test]
    fn test_query_normalization() {
        let query = RecipeQuery {
            search: Some("  ".to_string()),
            page: 0,
            limit: 1000,
        }
        .normalized();

        assert_eq!(query.search, None);
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, MAX_PAGE_SIZE);
    }
}
