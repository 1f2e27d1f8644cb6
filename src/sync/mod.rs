//! Notification synchronization: turns store and action events into a
//! consistent set of notifications.

pub mod accounts;
pub mod actions;
pub mod coordinator;
pub mod engine;
pub mod messages;
pub mod sink;

#[cfg(test)]
pub(crate) mod testing;
