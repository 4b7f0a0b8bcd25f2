//! Realtime Database bridge
//!
//! # Native Reference
//! - `FirebaseDatabase` framework (`FIRDatabase`, `FIRDatabaseReference`, `FIRDatabaseQuery`)

pub mod commands;
pub mod memory;
pub mod ordering;
pub mod push_id;
pub mod registry;
pub mod settings;
pub mod store;
pub mod types;

pub use commands::DatabaseCommands;
pub use memory::InMemoryDataStore;
pub use push_id::PushIdGenerator;
pub use registry::DatabaseListenerRegistry;
pub use settings::DatabaseSettings;
pub use store::{DataEvent, DataEventSink, DataStore, ObserverHandle};
pub use types::{DataSnapshot, EventType, Limit, Location, OrderBy, Query};
