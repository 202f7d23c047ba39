/// Document store abstraction and its backends.
pub mod document_store;
/// Serde adapter for `level_N` keyed maps.
pub mod level_map;
/// Database model definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;
