//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store, index and report layers into runnable use cases.
//! - Keep the CLI decoupled from storage and pagination details.

pub mod reconcile_service;
pub mod seed_service;
