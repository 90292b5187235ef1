//! Pairing and direct-transfer core for the operative-report application.
//!
//! A phone scans a QR invitation, resolves the desktop's address through the
//! rendezvous broker, and the two exchange photos or a finished report over a
//! direct channel. The broker only trades reachability metadata; payloads
//! never pass through it.

pub mod broker;
pub mod common;
pub mod desktop;
pub mod invite;
pub mod mobile;
pub mod pairing;
pub mod qr;
pub mod rendezvous;
pub mod session;
pub mod wire;
