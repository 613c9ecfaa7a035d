//! # Position Sync Server
//!
//! The authoritative side of the position-sync protocol. Clients report their
//! own positions over UDP; the server decides which reports count, stores the
//! accepted state per participant, and periodically sends every participant's
//! state to every client it has heard from.
//!
//! ## Ingest Pipeline
//!
//! Each inbound datagram gets its own task and passes through:
//!
//! 1. **Decode**: the payload must be exactly one 24-byte record, otherwise it
//!    is dropped with a warning and nothing else happens.
//! 2. **Sequence gate**: an update whose sequence is not newer than the last
//!    accepted one for that participant is discarded without touching any of
//!    the participant's state.
//! 3. **Speed validation**: a displacement larger than `max_speed * dt` on
//!    either axis is clamped back to the previous position. The update still
//!    refreshes the participant's liveness.
//! 4. **Registry upsert**: the whole entry is replaced atomically for that
//!    participant, and the sender's address is recorded.
//!
//! ## Ticks
//!
//! Two timers run independently of ingest and of each other:
//!
//! - **Broadcast** (`tick_rate` Hz): snapshot the registry and send each record
//!   to each known address. A failed send drops only that address.
//! - **Disconnect sweep** (`sweep_interval`): remove participants silent for
//!   longer than `disconnect_timeout`.
//!
//! ## Concurrency
//!
//! All tasks share one [`shared::Registry`], a sharded map with per-key
//! locking. Updates for different participants never contend on a common lock.
//! Two concurrent updates for the same participant are not ordered beyond the
//! per-key replace, so the later write wins.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(ServerConfig {
//!         bind_addr: "127.0.0.1:8000".to_string(),
//!         tick_rate: 30,
//!         ..ServerConfig::default()
//!     })
//!     .await?;
//!
//!     // Runs ingest, broadcast and sweep until Ctrl+C
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod game;
pub mod network;
pub mod validation;
