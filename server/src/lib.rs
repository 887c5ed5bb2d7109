//! # Game Server Library
//!
//! This library provides the authoritative server for the multiplayer game. It owns
//! the canonical world, validates every client request against a session token and
//! broadcasts the state of every entity to every player in the world once per tick.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Player movement and NPC behaviour are integrated on the server. Clients send
//! their input and the position they predicted; when the two disagree the server
//! answers with a correction.
//!
//! ### Session Management
//! Handles the complete lifecycle of an account session:
//! - Account creation and login with salted password hashes
//! - Character creation, deletion and entering the world
//! - Heartbeats and the timeout sweep that logs out silent sessions
//!
//! ### State Broadcasting
//! Every tick, each in-world session receives one update per other NPC and
//! in-world player. The cost grows with sessions times entities.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! One task owns the socket and the game state. A tick drains the socket without
//! blocking, sweeps timed-out sessions, advances the controllers, broadcasts and
//! flushes the outbox, so no component is ever touched concurrently.
//!
//! ### UDP-Based Communication
//! Every datagram is a fixed-size buffer holding a checksum, an opcode and text
//! arguments (see the `shared` crate). Nothing is retransmitted; heartbeats and the
//! per-tick broadcast make up for lost packets.
//!
//! ## Module Organization
//!
//! - [`ecs`]: entity store and component tables
//! - [`session`]: login, characters, heartbeats and timeouts
//! - [`abilities`]: ability activation and targeting
//! - [`dispatch`]: opcode to handler table
//! - [`game`]: game state, controller update and broadcast
//! - [`network`]: UDP socket and tick loop
//! - [`repository`], [`credentials`]: persistence and password hashing collaborators
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::game::GameState;
//! use server::network::Server;
//! use server::repository::MemoryRepository;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default().with_tick_rate(30);
//!     let state = GameState::new(&config, Box::new(MemoryRepository::new()))?;
//!
//!     let mut server = Server::bind(&config, state).await?;
//!     server
//!         .run_until(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod abilities;
pub mod config;
pub mod controller;
pub mod credentials;
pub mod dispatch;
pub mod ecs;
pub mod error;
pub mod game;
pub mod network;
pub mod repository;
pub mod session;

#[cfg(test)]
mod testing;
