pub mod encoding;
pub mod snapshot_store;
pub mod sqlite;
