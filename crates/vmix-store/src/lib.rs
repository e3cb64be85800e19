//! Job record store.
//!
//! This crate provides:
//! - A Supabase PostgREST client (upsert / patch / select)
//! - The [`JobStore`] trait with Supabase and in-memory implementations
//! - Retry with exponential backoff and request metrics

pub mod client;
pub mod error;
pub mod metrics;
pub mod repo;
pub mod retry;

pub use client::{Filter, StoreConfig, SupabaseClient};
pub use error::{StoreError, StoreResult};
pub use repo::{JobStore, MemoryJobStore, RecordUpdate, SupabaseJobStore};
pub use retry::RetryConfig;
