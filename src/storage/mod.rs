pub mod codec;
pub mod csv_store;
pub mod error;
pub mod memory;
mod replace;

use async_trait::async_trait;

use crate::users::repo_types::User;
pub use error::{StoreError, StoreResult};

/// Persistence contract the user service is written against.
///
/// `get_by_id`, `update` and `delete` report a missing id as
/// [`StoreError::NotFound`], distinct from I/O failures.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_all(&self) -> StoreResult<Vec<User>>;
    async fn get_by_id(&self, id: &str) -> StoreResult<User>;
    async fn create(&self, user: User) -> StoreResult<()>;
    async fn update(&self, id: &str, name: &str, email: &str) -> StoreResult<()>;
    async fn delete(&self, id: &str) -> StoreResult<()>;
}
