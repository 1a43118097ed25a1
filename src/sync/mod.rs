//! Settings synchronization: intents in, authoritative broadcasts out

pub mod broker;
pub mod control_loop;
pub mod intent;

pub use control_loop::{BrokerHandle, Command, ControlLoop};
pub use intent::SaveResult;
