//! Multistore Gateway Library
//!
//! Schema-per-tenant data layer for a multi-store retail backend: a shared
//! registry of stores and products, tenant-bound data handles backed by a
//! process-wide compiled-model cache, and a migration orchestrator that keeps
//! every tenant schema on the same migration history.

pub mod api;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod migration;
pub mod model;
pub mod registry;
pub mod security;
pub mod tenant;
