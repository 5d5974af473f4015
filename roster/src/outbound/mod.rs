//! Outbound adapters implementing the domain's driven ports.

pub mod credentials;
pub mod files;
pub mod graph;
pub mod smtp;
