//! Per-request error types.
//!
//! A [`HandlerError`] aborts a single request: the dispatcher logs it and moves on to the
//! next datagram. [`Rejection`]s are the expected, user-facing failures that are sent
//! back to the client with a request-specific failure opcode.

use crate::credentials::CredentialError;
use crate::ecs::EcsError;
use crate::repository::RepositoryError;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    IncorrectUsername,
    IncorrectPassword,
    AccountAlreadyExists,
    CharacterAlreadyExists,
    CharacterNotFound,
    CharacterInWorld,
    InvalidCharacterName,
    NoAttackTarget,
    InvalidAttackTarget,
    UnknownAbility,
}

impl Rejection {
    pub fn message(self) -> &'static str {
        match self {
            Rejection::IncorrectUsername => shared::INCORRECT_USERNAME,
            Rejection::IncorrectPassword => shared::INCORRECT_PASSWORD,
            Rejection::AccountAlreadyExists => shared::ACCOUNT_ALREADY_EXISTS,
            Rejection::CharacterAlreadyExists => shared::CHARACTER_ALREADY_EXISTS,
            Rejection::CharacterNotFound => shared::CHARACTER_NOT_FOUND,
            Rejection::CharacterInWorld => shared::CHARACTER_IN_WORLD,
            Rejection::InvalidCharacterName => shared::INVALID_CHARACTER_NAME,
            Rejection::NoAttackTarget => shared::NO_ATTACK_TARGET,
            Rejection::InvalidAttackTarget => shared::INVALID_ATTACK_TARGET,
            Rejection::UnknownAbility => shared::UNKNOWN_ABILITY,
        }
    }
}

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("request rejected: {}", .0.message())]
    Rejected(Rejection),

    #[error("missing argument {index}")]
    MissingArgument { index: usize },

    #[error("argument {index} has invalid value {value:?}")]
    InvalidArgument { index: usize, value: String },

    #[error("no session for account {0}")]
    SessionNotFound(u32),

    #[error("token mismatch for account {0}")]
    InvalidToken(u32),

    #[error("account {0} has not entered the world")]
    NotInWorld(u32),

    #[error(transparent)]
    Ecs(#[from] EcsError),

    #[error("persistence failure: {0}")]
    Repository(#[from] RepositoryError),

    #[error("credential failure: {0}")]
    Credential(#[from] CredentialError),
}

/// Failures while building the initial game state.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("failed to load world content: {0}")]
    Repository(#[from] RepositoryError),

    #[error("failed to spawn world content: {0}")]
    Ecs(#[from] EcsError),
}

impl From<Rejection> for HandlerError {
    fn from(rejection: Rejection) -> Self {
        HandlerError::Rejected(rejection)
    }
}
