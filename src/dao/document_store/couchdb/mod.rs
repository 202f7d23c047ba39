mod config;
mod error;
mod models;
mod store;

pub use config::CouchConfig;
pub use error::CouchDaoError;
pub use store::CouchDocumentStore;

use crate::dao::storage::StorageError;

impl From<CouchDaoError> for StorageError {
    fn from(err: CouchDaoError) -> Self {
        match err {
            CouchDaoError::MissingDocument { collection, id } => {
                StorageError::not_found(collection, id)
            }
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
