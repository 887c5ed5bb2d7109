//! Server network layer: owns the UDP socket and drives the tick loop.
//!
//! One tick drains every pending datagram without blocking (up to the configured
//! budget), runs the game tick and then writes the outbox to the socket. Everything
//! happens on the task calling [`Server::run_until`], so the game state needs no locks.

use crate::config::ServerConfig;
use crate::dispatch::Dispatcher;
use crate::game::GameState;
use log::{debug, error, info};
use shared::{encode, PACKET_SIZE};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::time::{interval, MissedTickBehavior};

/// Ticks between two statistics log lines.
const STATS_INTERVAL_TICKS: u64 = 300;

pub struct Server {
    socket: UdpSocket,
    game_state: GameState,
    dispatcher: Dispatcher,
    tick_duration: Duration,
    recv_budget: usize,
    buffer: Vec<u8>,
}

impl Server {
    pub async fn bind(config: &ServerConfig, game_state: GameState) -> io::Result<Self> {
        let socket = UdpSocket::bind(config.bind_addr()).await?;
        info!("Server listening on {}", socket.local_addr()?);

        Ok(Server {
            socket,
            game_state,
            dispatcher: Dispatcher::new(),
            tick_duration: config.tick_duration,
            recv_budget: config.recv_budget.max(1),
            buffer: vec![0u8; PACKET_SIZE],
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn game_state(&self) -> &GameState {
        &self.game_state
    }

    pub fn game_state_mut(&mut self) -> &mut GameState {
        &mut self.game_state
    }

    /// Handles queued datagrams until the socket would block or the budget is used up.
    /// Returns the number of datagrams read.
    pub fn drain_socket(&mut self, now: Instant) -> usize {
        let mut received = 0;
        while received < self.recv_budget {
            match self.socket.try_recv_from(&mut self.buffer) {
                Ok((len, addr)) => {
                    received += 1;
                    self.dispatcher.handle_datagram(
                        &mut self.game_state,
                        &self.buffer[..len],
                        addr,
                        now,
                    );
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                // An ICMP port unreachable from an earlier send, reported on some platforms.
                Err(e) if e.kind() == io::ErrorKind::ConnectionReset => {
                    debug!("Ignoring connection reset: {}", e);
                }
                Err(e) => {
                    error!("Error receiving packet: {}", e);
                    break;
                }
            }
        }
        received
    }

    /// Encodes and sends every queued packet. Returns the number of datagrams sent.
    pub async fn flush_outbox(&mut self) -> usize {
        let mut sent = 0;
        for outgoing in self.game_state.drain_outbox() {
            let bytes = match encode(&outgoing.packet) {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!(
                        "Failed to encode {:?} for {}: {}",
                        outgoing.packet.opcode(),
                        outgoing.addr,
                        e
                    );
                    continue;
                }
            };
            match self.socket.send_to(&bytes, outgoing.addr).await {
                Ok(_) => sent += 1,
                Err(e) => error!("Failed to send packet to {}: {}", outgoing.addr, e),
            }
        }
        sent
    }

    /// Drain, game tick, flush.
    pub async fn tick(&mut self, dt: f32, now: Instant) {
        let received = self.drain_socket(now);
        self.game_state.run_tick(dt, now);
        let sent = self.flush_outbox().await;

        if self.game_state.tick % STATS_INTERVAL_TICKS == 0 {
            debug!(
                "Tick {}: {} sessions ({} in world), {} entities, {} in / {} out",
                self.game_state.tick,
                self.game_state.session_count(),
                self.game_state.in_world_count(),
                self.game_state.world.entities.len(),
                received,
                sent
            );
        }
    }

    /// Runs the tick loop until `shutdown` completes.
    pub async fn run_until<F>(&mut self, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_tick = Instant::now();

        info!(
            "Server started, ticking every {:?}",
            self.tick_duration
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Server shutting down after {} ticks", self.game_state.tick);
                    break;
                }

                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;
                    self.tick(dt, now).await;
                }
            }
        }

        Ok(())
    }
}
