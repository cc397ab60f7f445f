//! # Host Bridge Traits
//!
//! Capability contracts the core needs from its host platform.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Async HTTP used by the photo search client
//! - [`SettingsStore`](storage::SettingsStore) - Key-value preferences (viewport, launch flag)
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ Available |
//! | iOS      | TBD                 | 📋 Planned |
//! | Android  | TBD                 | 📋 Planned |
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! convert platform errors into it and keep transport failures distinct from
//! other failures so the core can report them as network errors.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single adapter can be shared
//! by every async task in the core.

pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use storage::SettingsStore;
pub use time::{Clock, LogLevel, ManualClock, SystemClock};
