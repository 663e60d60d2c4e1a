//! Infrastructure layer: configuration, database, stores and seeding.

pub mod config;
pub mod db;
pub mod seed;
pub mod store;

pub use config::{ConfigError, SeedAdmin, Settings};
pub use seed::{seed, SeedError};
pub use store::{StoreError, Stores};
