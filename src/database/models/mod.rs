pub mod drink;

pub use drink::{Drink, DrinkPatch, DrinkRow, Ingredient, NewDrink, Recipe, ShortDrink, ShortIngredient};
