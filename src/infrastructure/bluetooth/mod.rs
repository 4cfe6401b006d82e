//! Bluetooth Module
//!
//! Discovers the KICKR Bike, resolves its GATT services and streams decoded
//! telemetry to a sink.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      ScanSession                         │
//! │      (countdown, watcher lifetime, session wiring)       │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼─────────────┐
//!         │             │             │
//!         ▼             ▼             ▼
//! ┌───────────┐  ┌────────────┐  ┌──────────┐
//! │  Scanner  │─▶│  Resolver  │  │ Protocol │
//! │           │  │            │  │          │
//! │ - filter  │  │ - GATT     │  │ - UUIDs  │
//! │ - dedup   │  │ - notify   │  │ - roles  │
//! └───────────┘  └────────────┘  └──────────┘
//!         │             │
//!         └──────┬──────┘
//!                ▼
//!          ┌───────────┐
//!          │  Adapter  │  (WinRT, or the test fake)
//!          └───────────┘
//! ```

pub mod adapter;
#[cfg(test)]
pub mod fake;
pub mod protocol;
pub mod resolver;
pub mod scanner;
pub mod session;
#[cfg(windows)]
pub mod winrt;

pub use adapter::{AdapterError, BleAdapter};
pub use session::ScanSession;
