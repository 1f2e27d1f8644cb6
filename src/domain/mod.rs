pub mod account;
pub mod action;
pub mod event;
pub mod message;
pub mod notification;
