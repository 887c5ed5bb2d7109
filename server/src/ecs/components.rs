use super::EntityId;
use serde::{Deserialize, Serialize};
use shared::Vec3;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Seven base attributes and three resource pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsComponent {
    pub agility: i32,
    pub strength: i32,
    pub wisdom: i32,
    pub intelligence: i32,
    pub charisma: i32,
    pub luck: i32,
    pub endurance: i32,
    pub health: i32,
    pub max_health: i32,
    pub mana: i32,
    pub max_mana: i32,
    pub stamina: i32,
    pub max_stamina: i32,
}

impl StatsComponent {
    pub const FIELD_COUNT: usize = 13;

    pub fn alive(&self) -> bool {
        self.health > 0
    }

    /// Wire order: base attributes, then health, mana and stamina with their maxima.
    pub fn wire_fields(&self) -> [i32; Self::FIELD_COUNT] {
        [
            self.agility,
            self.strength,
            self.wisdom,
            self.intelligence,
            self.charisma,
            self.luck,
            self.endurance,
            self.health,
            self.max_health,
            self.mana,
            self.max_mana,
            self.stamina,
            self.max_stamina,
        ]
    }

    /// Overwrites the three resource pairs, keeping the base attributes.
    pub fn set_resources(&mut self, health: (i32, i32), mana: (i32, i32), stamina: (i32, i32)) {
        (self.health, self.max_health) = health;
        (self.mana, self.max_mana) = mana;
        (self.stamina, self.max_stamina) = stamina;
    }
}

impl Default for StatsComponent {
    fn default() -> Self {
        Self {
            agility: 10,
            strength: 10,
            wisdom: 10,
            intelligence: 10,
            charisma: 10,
            luck: 10,
            endurance: 10,
            health: 100,
            max_health: 100,
            mana: 100,
            max_mana: 100,
            stamina: 100,
            max_stamina: 100,
        }
    }
}

/// Session state of a connected account.
///
/// Created at login with no character; `character_id` is filled in when the account
/// enters the world.
#[derive(Debug, Clone)]
pub struct PlayerComponent {
    pub entity_id: EntityId,
    pub account_id: u32,
    pub token: String,
    pub addr: SocketAddr,
    pub character_id: Option<u32>,
    pub last_heartbeat: Instant,
    pub target_id: Option<EntityId>,
    pub auto_attack_on: bool,
    pub right_mouse_down: bool,
    pub right_mouse_down_dir: Vec3,
    pub model_id: u32,
    pub texture_id: u32,
    /// Expected id of the next `PlayerUpdate` from the client.
    pub update_counter: u32,
}

impl PlayerComponent {
    pub fn new(entity_id: EntityId, account_id: u32, token: String, addr: SocketAddr) -> Self {
        Self {
            entity_id,
            account_id,
            token,
            addr,
            character_id: None,
            last_heartbeat: Instant::now(),
            target_id: None,
            auto_attack_on: false,
            right_mouse_down: false,
            right_mouse_down_dir: Vec3::ZERO,
            model_id: 0,
            texture_id: 0,
            update_counter: 0,
        }
    }

    pub fn in_world(&self) -> bool {
        self.character_id.is_some()
    }

    pub fn refresh_heartbeat(&mut self, now: Instant) {
        self.last_heartbeat = now;
    }

    pub fn is_timed_out(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_heartbeat) > timeout
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub skill_id: u32,
    pub name: String,
    pub value: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkillComponent {
    pub skills: Vec<Skill>,
    pub ability_ids: Vec<u32>,
}

impl SkillComponent {
    pub fn knows_ability(&self, ability_id: u32) -> bool {
        self.ability_ids.contains(&ability_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AiState {
    /// Waiting in place for the remaining number of seconds.
    Idle { remaining: f32 },
    /// Walking towards a point inside the wander radius.
    Wander { destination: Vec3 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AiComponent {
    pub home: Vec3,
    pub wander_radius: f32,
    pub state: AiState,
}

impl AiComponent {
    /// A controller that never leaves its spawn point.
    pub fn stationary(home: Vec3) -> Self {
        Self {
            home,
            wander_radius: 0.0,
            state: AiState::Idle { remaining: 0.0 },
        }
    }

    pub fn wandering(home: Vec3, wander_radius: f32) -> Self {
        Self {
            home,
            wander_radius,
            state: AiState::Idle { remaining: 0.0 },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryComponent {
    pub item_ids: Vec<u32>,
}
