//! Fixtures shared by the unit tests.

use crate::config::ServerConfig;
use crate::ecs::EntityId;
use crate::game::GameState;
use crate::repository::MemoryRepository;
use crate::session::WorldSnapshot;
use std::net::SocketAddr;
use std::time::Instant;

pub(crate) struct TestLogin {
    pub account_id: u32,
    pub token: String,
    pub entity: EntityId,
    pub addr: SocketAddr,
}

pub(crate) fn addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

pub(crate) fn new_state() -> GameState {
    GameState::new(&ServerConfig::default(), Box::new(MemoryRepository::new())).unwrap()
}

/// Creates `account` with password `pw` and logs it in from `addr`.
pub(crate) fn sign_up_and_login(state: &mut GameState, account: &str, addr: SocketAddr) -> TestLogin {
    state.create_account(account, "pw").unwrap();
    let login = state.login(account, "pw", addr).unwrap();
    TestLogin {
        account_id: login.account_id,
        token: login.token,
        entity: login.entity_id,
        addr,
    }
}

/// Creates `character` for the session and enters the world with it.
pub(crate) fn enter_world(state: &mut GameState, login: &TestLogin, character: &str) -> WorldSnapshot {
    state.create_character(login.entity, character).unwrap();
    state.enter_world(login.entity, character, Instant::now()).unwrap()
}
