//! Discovery Feed Layer
//!
//! Ingestion of heterogeneous, unreliable external token-data sources into a
//! single risk-scored record stream:
//!
//! - `push`: WebSocket client for the low-latency new-asset stream
//! - `scanner`: timer-driven HTTP poll of a market aggregator
//! - `registry`: dedup/upsert by address plus the opportunity store
//! - `payloads`: lossy-tolerant wire shapes

pub mod payloads;
pub mod push;
pub mod registry;
pub mod scanner;

pub use payloads::PushTokenPayload;
pub use push::{FeedEvent, PushFeed, PushFeedConfig, PushFeedError};
pub use registry::{TokenRegistry, UpsertOutcome};
pub use scanner::{FeedScanner, FeedScannerConfig, ScanError};
