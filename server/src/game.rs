//! Authoritative game state: the world, the collaborators the handlers call into, and
//! the per-tick controller update and broadcast.

use crate::config::ServerConfig;
use crate::controller;
use crate::credentials::{Argon2Hasher, CredentialHasher, TokenGenerator, UuidTokens};
use crate::ecs::{
    AiComponent, Entity, EntityDesc, EntityId, EntityKind, PlayerComponent, StatsComponent, World,
};
use crate::error::{HandlerError, StartupError};
use crate::repository::{Ability, Repository};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{Opcode, Packet, Vec3};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

pub const PLAYER_SPEED: f32 = 10.0;
pub const PLAYER_SCALE: Vec3 = Vec3::new(14.0, 14.0, 14.0);
/// Largest client/server position disagreement accepted without a correction.
pub const CORRECTION_EPSILON: f32 = 0.01;

/// A packet waiting to be written to the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub addr: SocketAddr,
    pub packet: Packet,
}

/// Input carried by a `PlayerUpdate` message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerInput {
    pub update_id: u32,
    pub position: Vec3,
    pub right_mouse_down: bool,
    pub direction: Vec3,
}

pub struct GameState {
    pub tick: u64,
    pub world: World,
    pub(crate) repository: Box<dyn Repository + Send>,
    pub(crate) hasher: Box<dyn CredentialHasher + Send>,
    pub(crate) tokens: Box<dyn TokenGenerator + Send>,
    pub(crate) abilities: Vec<Ability>,
    pub(crate) session_timeout: Duration,
    outbox: Vec<Outgoing>,
    rng: StdRng,
}

impl GameState {
    pub fn new(
        config: &ServerConfig,
        repository: Box<dyn Repository + Send>,
    ) -> Result<Self, StartupError> {
        Self::with_collaborators(
            config,
            repository,
            Box::new(Argon2Hasher::default()),
            Box::new(UuidTokens),
        )
    }

    /// Builds the state and spawns the static objects listed by the repository.
    pub fn with_collaborators(
        config: &ServerConfig,
        repository: Box<dyn Repository + Send>,
        hasher: Box<dyn CredentialHasher + Send>,
        tokens: Box<dyn TokenGenerator + Send>,
    ) -> Result<Self, StartupError> {
        let abilities = repository.list_abilities()?;
        let static_objects = repository.list_static_objects()?;

        let mut state = Self {
            tick: 0,
            world: World::new(config.max_entities),
            repository,
            hasher,
            tokens,
            abilities,
            session_timeout: config.session_timeout,
            outbox: Vec::new(),
            rng: StdRng::from_entropy(),
        };

        for object in static_objects {
            state.world.spawn(
                EntityDesc::new(EntityKind::StaticObject, object.name, object.position)
                    .with_id(EntityId(object.id)),
            )?;
        }

        info!(
            "Game state ready: {} abilities, {} static objects",
            state.abilities.len(),
            state.world.entities.len()
        );
        Ok(state)
    }

    pub fn send(&mut self, addr: SocketAddr, packet: Packet) {
        self.outbox.push(Outgoing { addr, packet });
    }

    pub fn outbox(&self) -> &[Outgoing] {
        &self.outbox
    }

    pub fn drain_outbox(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.outbox)
    }

    pub fn ability(&self, ability_id: u32) -> Option<&Ability> {
        self.abilities.iter().find(|a| a.ability_id == ability_id)
    }

    /// Spawns an NPC with stats and an AI controller.
    pub fn spawn_npc(
        &mut self,
        desc: EntityDesc,
        stats: StatsComponent,
        ai: AiComponent,
    ) -> Result<EntityId, HandlerError> {
        let id = self.world.spawn(desc)?;
        self.world.attach(id, stats)?;
        self.world.attach(id, ai)?;
        info!("Spawned NPC {}", id);
        Ok(id)
    }

    /// Records the client's input and checks its reported position.
    ///
    /// Returns a `PlayerCorrection` packet when the client has drifted from the
    /// authoritative position.
    pub fn apply_player_input(
        &mut self,
        entity_id: EntityId,
        input: PlayerInput,
    ) -> Result<Option<Packet>, HandlerError> {
        let position = self.world.entities.get(entity_id)?.position;
        let session = self.world.get_mut::<PlayerComponent>(entity_id)?;
        if !session.in_world() {
            return Err(HandlerError::NotInWorld(session.account_id));
        }

        let expected = session.update_counter;
        if input.update_id != expected {
            debug!(
                "Update ids don't match for account {}: client {}, server {}",
                session.account_id, input.update_id, expected
            );
        }

        session.right_mouse_down = input.right_mouse_down;
        session.right_mouse_down_dir = input.direction;
        session.update_counter = session.update_counter.wrapping_add(1);

        if position.distance(input.position) > CORRECTION_EPSILON {
            return Ok(Some(
                Packet::new(Opcode::PlayerCorrection)
                    .arg(expected)
                    .arg(position.x)
                    .arg(position.y)
                    .arg(position.z),
            ));
        }
        Ok(None)
    }

    /// Sends a chat line from an in-world session to every session. Returns the number
    /// of recipients.
    pub fn propagate_chat(
        &mut self,
        entity_id: EntityId,
        message: &str,
    ) -> Result<usize, HandlerError> {
        let session = self.world.get::<PlayerComponent>(entity_id)?;
        if !session.in_world() {
            return Err(HandlerError::NotInWorld(session.account_id));
        }
        let sender = self.world.entities.get(entity_id)?.name.clone();
        let packet = Packet::new(Opcode::PropagateChatMessage)
            .arg(&sender)
            .arg(message);

        let recipients: Vec<SocketAddr> = self
            .world
            .players
            .iter()
            .map(|(_, session)| session.addr)
            .collect();
        for addr in &recipients {
            self.send(*addr, packet.clone());
        }
        info!("[chat] {}: {}", sender, message);
        Ok(recipients.len())
    }

    /// Advances every player and NPC controller by `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        let World {
            entities,
            players,
            ai,
            ..
        } = &mut self.world;

        for (id, session) in players.iter() {
            if !session.in_world() {
                continue;
            }
            if let Ok(entity) = entities.get_mut(id) {
                controller::update_player(entity, session, dt);
            }
        }

        for (id, brain) in ai.iter_mut() {
            if let Ok(entity) = entities.get_mut(id) {
                controller::update_npc(entity, brain, &mut self.rng, dt);
            }
        }
    }

    fn entity_update(&self, entity: &Entity) -> Option<Packet> {
        let stats = self.world.stats.get(entity.id).copied().unwrap_or_default();
        let packet = match entity.kind {
            EntityKind::Npc => Packet::new(Opcode::NpcUpdate)
                .arg(entity.id)
                .args_from(vec3_fields(entity.position))
                .args_from(vec3_fields(entity.movement)),
            EntityKind::Player => {
                let session = self.world.players.get(entity.id)?;
                if !session.in_world() {
                    return None;
                }
                Packet::new(Opcode::OtherPlayerUpdate)
                    .arg(entity.id)
                    .args_from(vec3_fields(entity.position))
                    .args_from(vec3_fields(entity.movement))
                    .arg(session.model_id)
                    .arg(session.texture_id)
                    .arg(&entity.name)
            }
            EntityKind::StaticObject => return None,
        };
        Some(packet.args_from(stats.wire_fields()))
    }

    /// Queues, for every in-world session, one update per other NPC and in-world
    /// player. Returns the number of queued messages.
    pub fn broadcast(&mut self) -> usize {
        let updates: Vec<(EntityId, Packet)> = self
            .world
            .entities
            .iter()
            .filter_map(|entity| self.entity_update(entity).map(|p| (entity.id, p)))
            .collect();

        let recipients: Vec<(EntityId, SocketAddr)> = self
            .world
            .players
            .iter()
            .filter(|(_, session)| session.in_world())
            .map(|(id, session)| (id, session.addr))
            .collect();

        let mut sent = 0;
        for (recipient, addr) in recipients {
            for (id, packet) in &updates {
                if *id == recipient {
                    continue;
                }
                self.send(addr, packet.clone());
                sent += 1;
            }
        }
        sent
    }

    /// One tick after the inbound queue has been drained: timeout sweep, controller
    /// update, broadcast.
    pub fn run_tick(&mut self, dt: f32, now: Instant) {
        self.sweep_timeouts(now);
        self.update(dt);
        self.broadcast();
        self.tick += 1;
    }

    pub fn session_count(&self) -> usize {
        self.world.players.len()
    }

    pub fn in_world_count(&self) -> usize {
        self.world
            .players
            .iter()
            .filter(|(_, session)| session.in_world())
            .count()
    }
}

pub(crate) fn vec3_fields(v: Vec3) -> [f32; 3] {
    [v.x, v.y, v.z]
}
