//! # Position Sync Client
//!
//! A terminal client for the position-sync protocol. It owns exactly one
//! participant, reports that participant's position to the server, and shows
//! every other participant on a small text board.
//!
//! ## Architecture Overview
//!
//! The server is authoritative and the network is plain UDP, so anything may be
//! lost, duplicated or reordered. The client deals with that in two places:
//!
//! ### Outbound
//! Each successful move is sent immediately. On top of that a heartbeat tick
//! resends the current position whenever no move went out during the last tick
//! interval, which keeps the participant alive on the server. Every update
//! carries the next value of a per-session sequence counter.
//!
//! ### Inbound
//! Broadcast records go through the same sequence gate the server uses, so an
//! older record never overwrites a newer one. Accepted records are blended into
//! the displayed position rather than jumped to, and between records remote
//! players are dead-reckoned along their last known velocity for up to a second.
//!
//! ## Module Organization
//!
//! - `config`: session settings
//! - `game`: the local player (position, sequence, heartbeat timing) and the
//!   remote view (authoritative records plus displayed positions)
//! - `input`: W/A/S/D/Q keys to commands
//! - `network`: the socket, the receiver and the heartbeat and display ticks
//! - `rendering`: the bordered text board
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::config::ClientConfig;
//! use client::input::{Command, Direction};
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::connect(ClientConfig {
//!         id: 3,
//!         headless: true,
//!         ..ClientConfig::default()
//!     })
//!     .await?;
//!
//!     let (commands, inbox) = tokio::sync::mpsc::unbounded_channel();
//!     commands.send(Command::Move(Direction::Up))?;
//!     commands.send(Command::Quit)?;
//!
//!     client.run(inbox).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod game;
pub mod input;
pub mod network;
pub mod rendering;
