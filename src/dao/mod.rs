/// Score record models shared by every storage backend.
pub mod models;
/// Score persistence backends and the capability trait they implement.
pub mod score_store;
/// Storage abstraction layer for database operations.
pub mod storage;
