//! Marketplace entities, value objects and the ports the application layer depends on.
//!
//! Nothing in here performs I/O.

pub mod course;
pub mod enrollment;
pub mod gateway;
pub mod money;
pub mod payment;
pub mod ports;
pub mod pricing;
pub mod user;
pub mod webhook_signature;
