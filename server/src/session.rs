//! Session lifecycle: accounts, login, characters, entering the world, heartbeats and
//! the timeout sweep.
//!
//! A session is a player entity carrying a [`PlayerComponent`]. It moves through
//! `Authenticated` (no character) to `InWorld` and is removed by logout or timeout,
//! both of which go through [`GameState::logout`].

use crate::credentials::tokens_match;
use crate::ecs::{
    EntityDesc, EntityId, EntityKind, PlayerComponent, Skill, SkillComponent, StatsComponent,
};
use crate::error::{HandlerError, Rejection};
use crate::game::{GameState, PLAYER_SCALE, PLAYER_SPEED};
use crate::repository::Ability;
use log::{info, warn};
use shared::records::{self, RecordList};
use shared::{Opcode, Packet, Vec3};
use std::net::SocketAddr;
use std::time::Instant;

pub const MAX_CHARACTER_NAME_LEN: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSuccess {
    pub account_id: u32,
    pub token: String,
    pub entity_id: EntityId,
    pub characters: Vec<String>,
}

impl LoginSuccess {
    pub fn to_packet(&self) -> Packet {
        Packet::new(Opcode::LoginSuccess)
            .arg(self.account_id)
            .arg(&self.token)
            .arg(records::join_names(&self.characters))
    }
}

/// Everything the client needs to render its own character after entering the world.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldSnapshot {
    pub entity_id: EntityId,
    pub name: String,
    pub position: Vec3,
    pub model_id: u32,
    pub texture_id: u32,
    pub stats: StatsComponent,
    pub skills: Vec<Skill>,
    pub abilities: Vec<Ability>,
}

impl WorldSnapshot {
    pub fn to_packet(&self) -> Packet {
        Packet::new(Opcode::EnterWorldSuccess)
            .arg(self.entity_id)
            .arg(&self.name)
            .arg(self.position.x)
            .arg(self.position.y)
            .arg(self.position.z)
            .arg(self.model_id)
            .arg(self.texture_id)
            .args_from(self.stats.wire_fields())
            .arg(format_skills(&self.skills))
            .arg(format_abilities(&self.abilities))
    }
}

/// `skillId%name%value;` per skill.
pub fn format_skills(skills: &[Skill]) -> String {
    let mut list = RecordList::new();
    for skill in skills {
        list.push([
            skill.skill_id.to_string(),
            skill.name.clone(),
            skill.value.to_string(),
        ]);
    }
    list.finish()
}

/// `abilityId%name%spriteId%toggled%targeted;` per ability, flags as `0`/`1`.
pub fn format_abilities(abilities: &[Ability]) -> String {
    let mut list = RecordList::new();
    for ability in abilities {
        list.push([
            ability.ability_id.to_string(),
            ability.name.clone(),
            ability.sprite_id.to_string(),
            u8::from(ability.toggled).to_string(),
            u8::from(ability.targeted).to_string(),
        ]);
    }
    list.finish()
}

pub fn is_valid_character_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_CHARACTER_NAME_LEN
        && name.chars().all(|c| c.is_ascii_alphanumeric())
}

impl GameState {
    pub fn find_session(&self, account_id: u32) -> Option<EntityId> {
        self.world
            .players
            .iter()
            .find(|(_, session)| session.account_id == account_id)
            .map(|(id, _)| id)
    }

    /// Resolves the session entity of `account_id`, rejecting a wrong token.
    pub fn validate_token(&self, account_id: u32, token: &str) -> Result<EntityId, HandlerError> {
        let (id, session) = self
            .world
            .players
            .iter()
            .find(|(_, session)| session.account_id == account_id)
            .ok_or(HandlerError::SessionNotFound(account_id))?;
        if !tokens_match(&session.token, token) {
            return Err(HandlerError::InvalidToken(account_id));
        }
        Ok(id)
    }

    pub fn create_account(&mut self, account_name: &str, password: &str) -> Result<u32, HandlerError> {
        if self.repository.account_exists(account_name)? {
            return Err(Rejection::AccountAlreadyExists.into());
        }
        let hashed = self.hasher.hash(password)?;
        let account_id = self.repository.create_account(account_name, &hashed)?;
        info!("Created account {} ({})", account_id, account_name);
        Ok(account_id)
    }

    /// Verifies credentials and opens a fresh session, replacing any existing one.
    pub fn login(
        &mut self,
        account_name: &str,
        password: &str,
        addr: SocketAddr,
    ) -> Result<LoginSuccess, HandlerError> {
        let account = self
            .repository
            .get_account(account_name)?
            .ok_or(Rejection::IncorrectUsername)?;
        if !self.hasher.verify(&account.hashed_password, password)? {
            return Err(Rejection::IncorrectPassword.into());
        }
        let characters = self.repository.list_characters(account.id)?;

        if let Some(previous) = self.find_session(account.id) {
            info!("Account {} logged in again, replacing its session", account.id);
            self.logout(previous)?;
        }

        let entity_id = self.world.spawn(
            EntityDesc::new(EntityKind::Player, account.name, Vec3::ZERO)
                .speed(PLAYER_SPEED)
                .scale(PLAYER_SCALE),
        )?;
        let token = self.tokens.new_token();
        self.world.attach(
            entity_id,
            PlayerComponent::new(entity_id, account.id, token.clone(), addr),
        )?;

        info!("Account {} logged in from {} as entity {}", account.id, addr, entity_id);
        Ok(LoginSuccess {
            account_id: account.id,
            token,
            entity_id,
            characters,
        })
    }

    /// Removes a session and its entity, releasing every component.
    pub fn logout(&mut self, entity_id: EntityId) -> Result<(), HandlerError> {
        let entity = self.world.delete(entity_id)?;
        info!("Entity {} ({}) logged out", entity_id, entity.name);
        Ok(())
    }

    fn account_of(&self, entity_id: EntityId) -> Result<u32, HandlerError> {
        Ok(self.world.get::<PlayerComponent>(entity_id)?.account_id)
    }

    pub fn create_character(
        &mut self,
        entity_id: EntityId,
        character_name: &str,
    ) -> Result<Vec<String>, HandlerError> {
        let account_id = self.account_of(entity_id)?;
        if !is_valid_character_name(character_name) {
            return Err(Rejection::InvalidCharacterName.into());
        }
        if self.repository.character_exists(character_name)? {
            return Err(Rejection::CharacterAlreadyExists.into());
        }
        let character_id = self.repository.create_character(character_name, account_id)?;
        info!(
            "Account {} created character {} ({})",
            account_id, character_id, character_name
        );
        Ok(self.repository.list_characters(account_id)?)
    }

    pub fn delete_character(
        &mut self,
        entity_id: EntityId,
        character_name: &str,
    ) -> Result<Vec<String>, HandlerError> {
        let account_id = self.account_of(entity_id)?;
        let character = self
            .repository
            .get_character(character_name)?
            .filter(|c| c.account_id == account_id)
            .ok_or(Rejection::CharacterNotFound)?;
        let session = self.world.get::<PlayerComponent>(entity_id)?;
        if session.character_id == Some(character.id) {
            return Err(Rejection::CharacterInWorld.into());
        }
        self.repository.delete_character(&character.name)?;
        info!("Account {} deleted character {}", account_id, character.name);
        Ok(self.repository.list_characters(account_id)?)
    }

    /// Loads the character into the session's entity and moves the session in world.
    pub fn enter_world(
        &mut self,
        entity_id: EntityId,
        character_name: &str,
        now: Instant,
    ) -> Result<WorldSnapshot, HandlerError> {
        let account_id = self.account_of(entity_id)?;
        let character = self
            .repository
            .get_character(character_name)?
            .filter(|c| c.account_id == account_id)
            .ok_or(Rejection::CharacterNotFound)?;
        let skills = self.repository.list_character_skills(character.id)?;
        let abilities = self.repository.list_character_abilities(character.id)?;

        let entity = self.world.entities.get_mut(entity_id)?;
        entity.name = character.name.clone();
        entity.position = character.position;
        entity.movement = Vec3::ZERO;
        entity.model_id = character.model_id;
        entity.texture_id = character.texture_id;

        self.world.attach(entity_id, character.stats)?;
        self.world.attach(
            entity_id,
            SkillComponent {
                skills: skills.clone(),
                ability_ids: abilities.iter().map(|a| a.ability_id).collect(),
            },
        )?;

        let session = self.world.get_mut::<PlayerComponent>(entity_id)?;
        session.character_id = Some(character.id);
        session.model_id = character.model_id;
        session.texture_id = character.texture_id;
        session.target_id = None;
        session.auto_attack_on = false;
        session.right_mouse_down = false;
        session.right_mouse_down_dir = Vec3::ZERO;
        session.update_counter = 0;
        session.refresh_heartbeat(now);

        info!(
            "Account {} entered the world as {} (entity {})",
            account_id, character.name, entity_id
        );
        Ok(WorldSnapshot {
            entity_id,
            name: character.name,
            position: character.position,
            model_id: character.model_id,
            texture_id: character.texture_id,
            stats: character.stats,
            skills,
            abilities,
        })
    }

    pub fn heartbeat(&mut self, entity_id: EntityId, now: Instant) -> Result<(), HandlerError> {
        self.world
            .get_mut::<PlayerComponent>(entity_id)?
            .refresh_heartbeat(now);
        Ok(())
    }

    /// Logs out every session whose last heartbeat is older than the timeout.
    pub fn sweep_timeouts(&mut self, now: Instant) -> Vec<EntityId> {
        let timeout = self.session_timeout;
        let expired: Vec<(EntityId, u32)> = self
            .world
            .players
            .iter()
            .filter(|(_, session)| session.is_timed_out(now, timeout))
            .map(|(id, session)| (id, session.account_id))
            .collect();

        let mut removed = Vec::with_capacity(expired.len());
        for (id, account_id) in expired {
            info!("Account {} timed out", account_id);
            match self.logout(id) {
                Ok(()) => removed.push(id),
                Err(e) => warn!("Failed to remove timed out entity {}: {}", id, e),
            }
        }
        removed
    }
}
