// Service exports
pub mod appwrite;
pub mod cache;
pub mod memory;
pub mod postgres;
pub mod store;

pub use appwrite::{AppwriteClient, AppwriteCollections, AppwriteError};
pub use cache::{CacheError, CacheKey, CacheManager, CacheStats, CachedProfiles};
pub use memory::{InMemoryMatchStore, InMemoryProfiles};
pub use postgres::{PostgresError, PostgresMatchStore};
pub use store::{MatchStore, ProfileRepository, StoreError};
