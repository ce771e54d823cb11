//! # Tableside
//!
//! Multi-tenant restaurant ordering: cart pricing, gapless per-day order
//! numbering, the order status lifecycle, durable table identities and a
//! live order board, served over an axum HTTP API backed by SeaORM.

pub mod audit;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod handlers;
pub mod lifecycle;
pub mod models;
pub mod orders;
pub mod pricing;
pub mod registry;
pub mod repositories;
pub mod seed;
pub mod sequence;
pub mod server;
pub mod telemetry;
pub use migration;
