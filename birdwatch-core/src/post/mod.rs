pub mod error;
pub mod models;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use models::Post;
pub use store::{SqlitePostStore, SqlitePostStoreBuilder};
