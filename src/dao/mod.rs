/// Chat archive abstraction.
pub mod archive;
/// JSON file archive implementation.
pub mod file;
/// Durable model definitions and the tolerant archive decoder.
pub mod models;
/// Storage abstraction layer for archive errors.
pub mod storage;
