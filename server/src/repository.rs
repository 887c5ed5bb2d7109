//! Account, character and world-content persistence.
//!
//! The server only talks to the [`Repository`] trait. [`MemoryRepository`] keeps every
//! row in memory and, when opened with a path, writes a `bincode` snapshot of all rows
//! after each mutation so accounts and characters survive a restart.

use crate::ecs::{Skill, StatsComponent};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use shared::Vec3;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type AccountId = u32;
pub type CharacterId = u32;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored data is corrupt: {0}")]
    Corrupt(#[from] bincode::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub hashed_password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub account_id: AccountId,
    pub name: String,
    pub position: Vec3,
    pub model_id: u32,
    pub texture_id: u32,
    pub stats: StatsComponent,
    pub skills: Vec<Skill>,
    pub ability_ids: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ability {
    pub ability_id: u32,
    pub name: String,
    pub sprite_id: u32,
    pub toggled: bool,
    pub targeted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticObject {
    pub id: u32,
    pub name: String,
    pub position: Vec3,
}

pub trait Repository {
    fn account_exists(&self, account_name: &str) -> Result<bool, RepositoryError>;
    fn create_account(
        &mut self,
        account_name: &str,
        hashed_password: &str,
    ) -> Result<AccountId, RepositoryError>;
    fn get_account(&self, account_name: &str) -> Result<Option<Account>, RepositoryError>;
    fn character_exists(&self, character_name: &str) -> Result<bool, RepositoryError>;
    fn create_character(
        &mut self,
        character_name: &str,
        account_id: AccountId,
    ) -> Result<CharacterId, RepositoryError>;
    fn delete_character(&mut self, character_name: &str) -> Result<(), RepositoryError>;
    fn get_character(&self, character_name: &str) -> Result<Option<Character>, RepositoryError>;
    fn list_characters(&self, account_id: AccountId) -> Result<Vec<String>, RepositoryError>;
    fn list_character_skills(
        &self,
        character_id: CharacterId,
    ) -> Result<Vec<Skill>, RepositoryError>;
    fn list_character_abilities(
        &self,
        character_id: CharacterId,
    ) -> Result<Vec<Ability>, RepositoryError>;
    fn list_abilities(&self) -> Result<Vec<Ability>, RepositoryError>;
    fn list_static_objects(&self) -> Result<Vec<StaticObject>, RepositoryError>;
}

pub fn default_abilities() -> Vec<Ability> {
    vec![
        Ability {
            ability_id: 1,
            name: "Auto Attack".into(),
            sprite_id: 3,
            toggled: true,
            targeted: true,
        },
        Ability {
            ability_id: 2,
            name: "Fireball".into(),
            sprite_id: 4,
            toggled: false,
            targeted: true,
        },
        Ability {
            ability_id: 3,
            name: "Healing".into(),
            sprite_id: 5,
            toggled: false,
            targeted: false,
        },
    ]
}

fn default_skills() -> Vec<Skill> {
    ["Melee", "Magic", "Defense"]
        .iter()
        .enumerate()
        .map(|(i, name)| Skill {
            skill_id: i as u32 + 1,
            name: name.to_string(),
            value: 1,
        })
        .collect()
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Rows {
    accounts: BTreeMap<AccountId, Account>,
    characters: BTreeMap<CharacterId, Character>,
    abilities: Vec<Ability>,
    static_objects: Vec<StaticObject>,
    next_account_id: AccountId,
    next_character_id: CharacterId,
}

impl Rows {
    fn seeded() -> Self {
        Self {
            abilities: default_abilities(),
            next_account_id: 1,
            next_character_id: 1,
            ..Default::default()
        }
    }
}

#[derive(Debug)]
pub struct MemoryRepository {
    rows: Rows,
    path: Option<PathBuf>,
}

impl MemoryRepository {
    /// Empty store with the default ability catalog, never written to disk.
    pub fn new() -> Self {
        Self {
            rows: Rows::seeded(),
            path: None,
        }
    }

    /// Loads the snapshot at `path` if it exists; later mutations are written back.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let path = path.as_ref().to_path_buf();
        let rows = if path.exists() {
            let bytes = fs::read(&path)?;
            let rows: Rows = bincode::deserialize(&bytes)?;
            info!(
                "Loaded {} accounts and {} characters from {}",
                rows.accounts.len(),
                rows.characters.len(),
                path.display()
            );
            rows
        } else {
            info!("No store at {}, starting empty", path.display());
            Rows::seeded()
        };
        Ok(Self {
            rows,
            path: Some(path),
        })
    }

    pub fn with_static_objects(mut self, objects: Vec<StaticObject>) -> Self {
        self.rows.static_objects = objects;
        self
    }

    fn persist(&self) -> Result<(), RepositoryError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let bytes = bincode::serialize(&self.rows)?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;
        debug!("Persisted store to {}", path.display());
        Ok(())
    }

    fn find_character(&self, character_name: &str) -> Option<&Character> {
        self.rows
            .characters
            .values()
            .find(|c| c.name.eq_ignore_ascii_case(character_name))
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl Repository for MemoryRepository {
    fn account_exists(&self, account_name: &str) -> Result<bool, RepositoryError> {
        Ok(self.get_account(account_name)?.is_some())
    }

    fn create_account(
        &mut self,
        account_name: &str,
        hashed_password: &str,
    ) -> Result<AccountId, RepositoryError> {
        let id = self.rows.next_account_id;
        self.rows.next_account_id += 1;
        self.rows.accounts.insert(
            id,
            Account {
                id,
                name: account_name.to_string(),
                hashed_password: hashed_password.to_string(),
            },
        );
        self.persist()?;
        Ok(id)
    }

    fn get_account(&self, account_name: &str) -> Result<Option<Account>, RepositoryError> {
        Ok(self
            .rows
            .accounts
            .values()
            .find(|a| a.name == account_name)
            .cloned())
    }

    fn character_exists(&self, character_name: &str) -> Result<bool, RepositoryError> {
        Ok(self.find_character(character_name).is_some())
    }

    fn create_character(
        &mut self,
        character_name: &str,
        account_id: AccountId,
    ) -> Result<CharacterId, RepositoryError> {
        let id = self.rows.next_character_id;
        self.rows.next_character_id += 1;
        let ability_ids = self.rows.abilities.iter().map(|a| a.ability_id).collect();
        self.rows.characters.insert(
            id,
            Character {
                id,
                account_id,
                name: character_name.to_string(),
                position: Vec3::ZERO,
                model_id: 0,
                texture_id: 0,
                stats: StatsComponent::default(),
                skills: default_skills(),
                ability_ids,
            },
        );
        self.persist()?;
        Ok(id)
    }

    fn delete_character(&mut self, character_name: &str) -> Result<(), RepositoryError> {
        if let Some(id) = self.find_character(character_name).map(|c| c.id) {
            self.rows.characters.remove(&id);
            self.persist()?;
        }
        Ok(())
    }

    fn get_character(&self, character_name: &str) -> Result<Option<Character>, RepositoryError> {
        Ok(self.find_character(character_name).cloned())
    }

    fn list_characters(&self, account_id: AccountId) -> Result<Vec<String>, RepositoryError> {
        Ok(self
            .rows
            .characters
            .values()
            .filter(|c| c.account_id == account_id)
            .map(|c| c.name.clone())
            .collect())
    }

    fn list_character_skills(
        &self,
        character_id: CharacterId,
    ) -> Result<Vec<Skill>, RepositoryError> {
        Ok(self
            .rows
            .characters
            .get(&character_id)
            .map(|c| c.skills.clone())
            .unwrap_or_default())
    }

    fn list_character_abilities(
        &self,
        character_id: CharacterId,
    ) -> Result<Vec<Ability>, RepositoryError> {
        let Some(character) = self.rows.characters.get(&character_id) else {
            return Ok(Vec::new());
        };
        Ok(self
            .rows
            .abilities
            .iter()
            .filter(|a| character.ability_ids.contains(&a.ability_id))
            .cloned()
            .collect())
    }

    fn list_abilities(&self) -> Result<Vec<Ability>, RepositoryError> {
        Ok(self.rows.abilities.clone())
    }

    fn list_static_objects(&self) -> Result<Vec<StaticObject>, RepositoryError> {
        Ok(self.rows.static_objects.clone())
    }
}
