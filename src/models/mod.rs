//! # Data Models
//!
//! SeaORM entities for connections and the change events collected from them.

pub mod change_event;
pub mod connection;

pub use change_event::Entity as ChangeEvent;
pub use connection::Entity as Connection;
