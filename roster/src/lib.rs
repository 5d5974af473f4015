//! Membership reconciliation for event-participant directory accounts.
//!
//! The crate is laid out as a small hexagon:
//! - [`domain`] holds participant and directory types, the ledger dedup
//!   session, the reconciliation engine, provisioning and license flows;
//! - [`outbound`] adapts Microsoft Graph, SMTP and CSV files to the domain
//!   ports;
//! - [`inbound`] exposes the command-line surface;
//! - [`config`] turns layered environment settings into typed values.

pub mod config;
pub mod domain;
pub mod inbound;
pub mod outbound;
