pub mod drinks;
pub mod health;

pub use health::health;
