//! Portal Cache
//!
//! Read-optimized in-memory cache of portal entities (applications,
//! blockchains, load balancers, pay plans, redirects), loaded in bulk from the
//! source of truth and kept current by a change feed.
//!
//! # Architecture
//!
//! ```text
//!   SourceReader ──reload()──► Snapshot ──swap──┐
//!                                               ▼
//!   ChangeFeed ──listener──► apply() ──► CacheState { EntityStore, PendingBuffer }
//!                                               ▲
//!   request handlers ──────── reads ────────────┘
//! ```
//!
//! Child rows (limits, gateway settings, sync options, redirects, load
//! balancer associations) can arrive before their parent. They wait in the
//! pending buffer and are merged when the parent is inserted.
//!
//! # Example
//!
//! ```ignore
//! use portal_cache::{telemetry, PortalCache};
//! use portal_core::CacheConfig;
//!
//! let config = CacheConfig::from_env();
//! config.validate()?;
//! telemetry::init_tracing(&config)?;
//!
//! let cache = PortalCache::new(reader, feed_rx);
//! cache.reload().await?;
//! cache.spawn_refresh_task(config.refresh_interval);
//!
//! let apps = cache.applications_by_owner("60ecb2bf67774900350d9c42").await;
//! ```

pub mod applier;
pub mod cache;
pub mod listener;
pub mod loader;
pub mod pending;
pub mod refresh;
pub mod store;
pub mod telemetry;

pub use applier::{ApplyOutcome, CacheState};
pub use cache::{CacheStats, PortalCache};
pub use listener::ListenerState;
pub use loader::Snapshot;
pub use pending::PendingBuffer;
pub use refresh::{refresh_task, RefreshMetrics, RefreshSnapshot};
pub use store::{EntityStore, StoreCounts};
