pub mod config;
pub mod error;
pub mod owner;

pub use config::{Config, HostConfig, SchedulerConfig};
pub use error::*;
pub use owner::{Identifiable, Owner, OwnerInfo, OwnerRegistry, OwnerResolver};
