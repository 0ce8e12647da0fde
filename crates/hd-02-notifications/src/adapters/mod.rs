//! Adapters for the notification service's outbound ports.

pub mod directory;
pub mod memory;

pub use directory::BusRecipientDirectory;
pub use memory::MemoryNotificationStore;
