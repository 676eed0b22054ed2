use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One ingredient of a recipe, in the order it is poured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub color: String,
    pub parts: u32,
}

/// Ordered list of ingredients, persisted as JSON text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Recipe(pub Vec<Ingredient>);

impl Recipe {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn ingredients(&self) -> &[Ingredient] {
        &self.0
    }

    /// Serialize for the `recipe` text column
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.0)
    }

    /// Parse the `recipe` text column
    pub fn from_text(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// A stored drink. Serializes as the long (full detail) view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Drink {
    pub id: i32,
    pub title: String,
    pub recipe: Recipe,
}

/// Ingredient with everything but the name redacted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShortIngredient {
    pub name: String,
}

/// Public projection of a drink
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShortDrink {
    pub id: i32,
    pub title: String,
    pub recipe: Vec<ShortIngredient>,
}

impl Drink {
    pub fn short(&self) -> ShortDrink {
        ShortDrink {
            id: self.id,
            title: self.title.clone(),
            recipe: self
                .recipe
                .ingredients()
                .iter()
                .map(|ingredient| ShortIngredient {
                    name: ingredient.name.clone(),
                })
                .collect(),
        }
    }
}

/// Raw `drinks` row as stored in PostgreSQL
#[derive(Debug, Clone, FromRow)]
pub struct DrinkRow {
    pub id: i32,
    pub title: String,
    pub recipe: String,
}

impl TryFrom<DrinkRow> for Drink {
    type Error = serde_json::Error;

    fn try_from(row: DrinkRow) -> Result<Self, Self::Error> {
        Ok(Drink {
            id: row.id,
            title: row.title,
            recipe: Recipe::from_text(&row.recipe)?,
        })
    }
}

/// Validated input for creating a drink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDrink {
    pub title: String,
    pub recipe: Recipe,
}

/// Partial update; `None` leaves the stored value unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DrinkPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub recipe: Option<Recipe>,
}

impl DrinkPatch {
    /// Apply the provided fields onto an existing drink
    pub fn apply_to(self, drink: &mut Drink) {
        if let Some(title) = self.title {
            drink.title = title;
        }
        if let Some(recipe) = self.recipe {
            drink.recipe = recipe;
        }
    }
}
