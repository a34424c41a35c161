//! Output generation: the persisted snapshot and chat-sized text blocks.
//!
//! # Submodules
//!
//! - [`json`]: Reads and atomically writes the snapshot file
//! - [`chunks`]: Packs news items into blocks no longer than the transport limit
//!
//! # Snapshot Location
//!
//! ```text
//! news_cache.json      # current snapshot
//! news_cache.json.tmp  # only present while a write is in progress
//! ```

pub mod chunks;
pub mod json;
