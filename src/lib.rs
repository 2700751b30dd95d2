pub mod chain;
pub mod config;
pub mod container;
pub mod digest;
pub mod drivers;
pub mod error;
pub mod fs_size;
pub mod inspect;
pub mod notifier;
pub mod orphans;
pub mod registry;
pub mod report;
pub mod scanner;

// Re-exports for easy access
pub use chain::ChainBuilder;
pub use config::{InspectMode, ScanConfig};
pub use container::{ContainerBuilder, ContainerRecord};
pub use drivers::{DriverKind, StorageDriver};
pub use error::ScanError;
pub use inspect::{ContainerDetails, DockerInspector, Inspector, OfflineInspector};
pub use notifier::Notifier;
pub use registry::{LayerId, LayerNode, LayerRegistry, LayerSize};
pub use scanner::{ScanReport, Scanner, SkippedContainer};
