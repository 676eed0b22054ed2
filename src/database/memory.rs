use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::database::models::{Drink, DrinkPatch, NewDrink};
use crate::database::store::{DrinkStore, StoreError};

/// In-process drink store with the same constraints as the `drinks` table.
/// Ids start at 1 and are never reused.
#[derive(Debug, Default)]
pub struct MemoryDrinkStore {
    state: RwLock<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    last_id: i32,
    drinks: BTreeMap<i32, Drink>,
}

impl MemoryState {
    fn check_title(&self, title: &str, except: Option<i32>) -> Result<(), StoreError> {
        if title.is_empty() {
            return Err(StoreError::Conflict("drink title must not be empty".to_string()));
        }
        let taken = self
            .drinks
            .values()
            .any(|drink| drink.title == title && Some(drink.id) != except);
        if taken {
            return Err(StoreError::Conflict("a drink with this title already exists".to_string()));
        }
        Ok(())
    }
}

impl MemoryDrinkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DrinkStore for MemoryDrinkStore {
    async fn all(&self) -> Result<Vec<Drink>, StoreError> {
        let state = self.state.read().await;
        Ok(state.drinks.values().cloned().collect())
    }

    async fn get(&self, id: i32) -> Result<Drink, StoreError> {
        let state = self.state.read().await;
        state.drinks.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    async fn create(&self, drink: NewDrink) -> Result<Drink, StoreError> {
        let mut state = self.state.write().await;
        state.check_title(&drink.title, None)?;

        state.last_id += 1;
        let created = Drink {
            id: state.last_id,
            title: drink.title,
            recipe: drink.recipe,
        };
        state.drinks.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: i32, patch: DrinkPatch) -> Result<Drink, StoreError> {
        let mut state = self.state.write().await;
        if !state.drinks.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        if let Some(title) = &patch.title {
            state.check_title(title, Some(id))?;
        }

        let drink = state.drinks.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        patch.apply_to(drink);
        Ok(drink.clone())
    }

    async fn delete(&self, id: i32) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state
            .drinks
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
