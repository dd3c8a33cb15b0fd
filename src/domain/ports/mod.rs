pub mod config_source;
pub mod notifier;
pub mod process_manager;
pub mod store;

pub use config_source::{ConfigFetchError, RemoteConfigSource};
pub use notifier::{DeliverySettings, NotificationError, NotificationGateway};
pub use process_manager::{EventSource, ManagerError, ProcessManager};
pub use store::{SnapshotStore, StoreError};
