mod config;
mod error;
#[allow(clippy::module_inception)]
mod lock;
mod lock_manager;
mod lock_type;
mod resource;
mod resource_entry;
mod snapshot;

pub use config::LockManagerConfig;
pub use error::LockError;
pub use lock::{Lock, LockRequest};
pub use lock_manager::LockManager;
pub use lock_type::LockType;
pub use resource::ResourceName;
pub use snapshot::{LockTableSnapshot, ResourceSnapshot};
