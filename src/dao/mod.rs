/// Database model definitions.
pub mod models;
/// Score storage backends and the abstraction over them.
pub mod score_store;
/// Storage abstraction layer for database operations.
pub mod storage;
