//! A sharded concurrent hashmap with pluggable lock strategies and scoped
//! access handles.
//!
//! # Overview
//! `shardlock` splits the key space into a fixed number of shards and decouples
//! the number of shards from the number of locks guarding them:
//!
//! - [`DirectMap`]: one mutex per shard.
//! - [`StaticPoolMap`]: a fixed pool of mutexes, shard `i` guarded by mutex
//!   `i % mutex_count`.
//! - [`DynamicPoolMap`]: a pool of mutexes handed out per access. Each shard
//!   admits one operation at a time, which then reserves the first free mutex.
//!
//! # Features
//! - Scoped handles: [`WriteAccess`], [`ReadAccess`] and [`Presence`] keep
//!   their shard locked until dropped
//! - Release is identical for every handle and happens on every exit path,
//!   panics included; there is no poisoning
//! - Per-shard atomic snapshots
//! - Optional diagnostics through an injected [`AcquireObserver`]
//!
//! # Examples
//! ```
//! use shardlock::{DynamicPoolMap, Error};
//!
//! let map = DynamicPoolMap::<String, u32>::try_new(16, 4).unwrap();
//!
//! // Write access inserts a default value when the key is absent.
//! *map.write_access("key1".into()) += 42;
//! assert_eq!(*map.read_access("key1").unwrap(), 42);
//!
//! // Read access does not insert.
//! assert_eq!(map.read_access("key2").err(), Some(Error::KeyNotFound));
//! assert!(!map.contains("key2"));
//!
//! // Copy everything out, one shard at a time.
//! let snapshot = map.snapshot();
//! assert_eq!(snapshot.len(), 1);
//! ```
mod admission;
mod config;
mod error;
mod futex;
mod handle;
mod map;
mod observer;
mod pool;
mod router;
mod shard;
mod strategy;

use admission::*;
pub use config::*;
pub use error::*;
use futex::*;
pub use handle::*;
pub use map::*;
pub use observer::*;
use pool::*;
pub use router::*;
use shard::*;
pub use strategy::*;
