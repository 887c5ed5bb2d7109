//! Opcode dispatch: decodes a datagram, looks up the handler registered for its opcode
//! and runs it against the game state.
//!
//! Handlers only pull typed arguments out of the request, authenticate it and call
//! into [`GameState`]. Any [`HandlerError`] drops the request with a log line; the
//! server keeps running.

use crate::ecs::EntityId;
pub use crate::error::HandlerError;
use crate::game::{GameState, PlayerInput};
use log::{debug, error, warn};
use shared::records;
use shared::{decode, Opcode, Packet, Vec3};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Instant;

pub type Handler = fn(&mut GameState, &Request<'_>) -> Result<(), HandlerError>;

/// Positional arguments of a decoded request.
#[derive(Debug, Clone, Copy)]
pub struct Args<'a>(&'a [String]);

impl<'a> Args<'a> {
    pub fn new(args: &'a [String]) -> Self {
        Self(args)
    }

    pub fn str(&self, index: usize) -> Result<&'a str, HandlerError> {
        self.0
            .get(index)
            .map(String::as_str)
            .ok_or(HandlerError::MissingArgument { index })
    }

    pub fn parse<T: FromStr>(&self, index: usize) -> Result<T, HandlerError> {
        let raw = self.str(index)?;
        raw.parse().map_err(|_| HandlerError::InvalidArgument {
            index,
            value: raw.to_string(),
        })
    }

    /// `1` or `0`.
    pub fn flag(&self, index: usize) -> Result<bool, HandlerError> {
        match self.str(index)? {
            "1" => Ok(true),
            "0" => Ok(false),
            other => Err(HandlerError::InvalidArgument {
                index,
                value: other.to_string(),
            }),
        }
    }

    pub fn vec3(&self, first: usize) -> Result<Vec3, HandlerError> {
        Ok(Vec3::new(
            self.parse(first)?,
            self.parse(first + 1)?,
            self.parse(first + 2)?,
        ))
    }
}

pub struct Request<'a> {
    pub addr: SocketAddr,
    pub now: Instant,
    pub args: Args<'a>,
}

impl Request<'_> {
    /// Authenticates a request that starts with `accountId|token` and returns the
    /// session entity.
    fn session(&self, state: &GameState) -> Result<EntityId, HandlerError> {
        let account_id: u32 = self.args.parse(0)?;
        let token = self.args.str(1)?;
        state.validate_token(account_id, token)
    }
}

/// Sends the success packet, or turns a rejection into `failure(reason)`.
fn reply<T>(
    state: &mut GameState,
    addr: SocketAddr,
    result: Result<T, HandlerError>,
    failure: Opcode,
    success: impl FnOnce(T) -> Packet,
) -> Result<(), HandlerError> {
    match result {
        Ok(value) => {
            state.send(addr, success(value));
            Ok(())
        }
        Err(HandlerError::Rejected(rejection)) => {
            debug!("Rejected {:?} from {}: {}", failure, addr, rejection.message());
            state.send(addr, Packet::new(failure).arg(rejection.message()));
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn handle_connect(state: &mut GameState, req: &Request<'_>) -> Result<(), HandlerError> {
    let name = req.args.str(0)?;
    let password = req.args.str(1)?;
    let result = state.login(name, password, req.addr);
    reply(state, req.addr, result, Opcode::LoginFailure, |login| {
        login.to_packet()
    })
}

fn handle_disconnect(state: &mut GameState, req: &Request<'_>) -> Result<(), HandlerError> {
    let entity_id = req.session(state)?;
    state.logout(entity_id)
}

fn handle_heartbeat(state: &mut GameState, req: &Request<'_>) -> Result<(), HandlerError> {
    let entity_id = req.session(state)?;
    state.heartbeat(entity_id, req.now)
}

fn handle_create_account(state: &mut GameState, req: &Request<'_>) -> Result<(), HandlerError> {
    let name = req.args.str(0)?;
    let password = req.args.str(1)?;
    let result = state.create_account(name, password);
    reply(state, req.addr, result, Opcode::CreateAccountFailure, |_| {
        Packet::new(Opcode::CreateAccountSuccess)
    })
}

fn handle_create_character(state: &mut GameState, req: &Request<'_>) -> Result<(), HandlerError> {
    let entity_id = req.session(state)?;
    let name = req.args.str(2)?;
    let result = state.create_character(entity_id, name);
    reply(state, req.addr, result, Opcode::CreateCharacterFailure, |names| {
        Packet::new(Opcode::CreateCharacterSuccess).arg(records::join_names(&names))
    })
}

fn handle_delete_character(state: &mut GameState, req: &Request<'_>) -> Result<(), HandlerError> {
    let entity_id = req.session(state)?;
    let name = req.args.str(2)?;
    let result = state.delete_character(entity_id, name);
    reply(state, req.addr, result, Opcode::DeleteCharacterFailure, |names| {
        Packet::new(Opcode::DeleteCharacterSuccess).arg(records::join_names(&names))
    })
}

fn handle_enter_world(state: &mut GameState, req: &Request<'_>) -> Result<(), HandlerError> {
    let entity_id = req.session(state)?;
    let name = req.args.str(2)?;
    let result = state.enter_world(entity_id, name, req.now);
    reply(state, req.addr, result, Opcode::EnterWorldFailure, |snapshot| {
        snapshot.to_packet()
    })
}

fn handle_player_update(state: &mut GameState, req: &Request<'_>) -> Result<(), HandlerError> {
    let entity_id = req.session(state)?;
    let input = PlayerInput {
        update_id: req.args.parse(2)?,
        position: req.args.vec3(3)?,
        right_mouse_down: req.args.flag(6)?,
        direction: req.args.vec3(7)?,
    };
    if let Some(correction) = state.apply_player_input(entity_id, input)? {
        state.send(req.addr, correction);
    }
    Ok(())
}

fn handle_activate_ability(state: &mut GameState, req: &Request<'_>) -> Result<(), HandlerError> {
    let entity_id = req.session(state)?;
    let ability_id = req.args.parse(2)?;
    state.activate_ability(entity_id, ability_id)
}

fn handle_send_chat_message(state: &mut GameState, req: &Request<'_>) -> Result<(), HandlerError> {
    let entity_id = req.session(state)?;
    let message = req.args.str(2)?;
    state.propagate_chat(entity_id, message).map(|_| ())
}

fn handle_set_target(state: &mut GameState, req: &Request<'_>) -> Result<(), HandlerError> {
    let entity_id = req.session(state)?;
    let target_id = req.args.parse(2)?;
    state.set_target(entity_id, target_id)
}

fn handle_unset_target(state: &mut GameState, req: &Request<'_>) -> Result<(), HandlerError> {
    let entity_id = req.session(state)?;
    state.unset_target(entity_id)
}

fn handle_ping(state: &mut GameState, req: &Request<'_>) -> Result<(), HandlerError> {
    let timestamp = req.args.str(0)?;
    state.send(req.addr, Packet::new(Opcode::Pong).arg(timestamp));
    Ok(())
}

/// Opcode to handler table, built once at startup.
pub struct Dispatcher {
    handlers: HashMap<Opcode, Handler>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let mut dispatcher = Self {
            handlers: HashMap::new(),
        };
        dispatcher.register(Opcode::Connect, handle_connect);
        dispatcher.register(Opcode::Disconnect, handle_disconnect);
        dispatcher.register(Opcode::Heartbeat, handle_heartbeat);
        dispatcher.register(Opcode::CreateAccount, handle_create_account);
        dispatcher.register(Opcode::CreateCharacter, handle_create_character);
        dispatcher.register(Opcode::DeleteCharacter, handle_delete_character);
        dispatcher.register(Opcode::EnterWorld, handle_enter_world);
        dispatcher.register(Opcode::PlayerUpdate, handle_player_update);
        dispatcher.register(Opcode::ActivateAbility, handle_activate_ability);
        dispatcher.register(Opcode::SendChatMessage, handle_send_chat_message);
        dispatcher.register(Opcode::SetTarget, handle_set_target);
        dispatcher.register(Opcode::UnsetTarget, handle_unset_target);
        dispatcher.register(Opcode::Ping, handle_ping);
        dispatcher
    }

    pub fn register(&mut self, opcode: Opcode, handler: Handler) {
        self.handlers.insert(opcode, handler);
    }

    pub fn handles(&self, opcode: Opcode) -> bool {
        self.handlers.contains_key(&opcode)
    }

    /// Decodes and dispatches one datagram. Undecodable traffic is dropped.
    pub fn handle_datagram(
        &self,
        state: &mut GameState,
        datagram: &[u8],
        addr: SocketAddr,
        now: Instant,
    ) {
        match decode(datagram) {
            Ok(packet) => self.dispatch(state, &packet, addr, now),
            Err(e) if e.is_foreign() => debug!("Dropped datagram from {}: {}", addr, e),
            Err(e) => warn!("Malformed datagram from {}: {}", addr, e),
        }
    }

    pub fn dispatch(&self, state: &mut GameState, packet: &Packet, addr: SocketAddr, now: Instant) {
        let opcode = packet.opcode();
        let Some(handler) = self.handlers.get(&opcode) else {
            debug!("No handler for {:?} from {}", opcode, addr);
            return;
        };
        if !opcode.is_chatty() {
            debug!("{:?} from {} ({} args)", opcode, addr, packet.args().len());
        }

        let request = Request {
            addr,
            now,
            args: Args::new(packet.args()),
        };
        match handler(state, &request) {
            Ok(()) => {}
            Err(e @ (HandlerError::Repository(_) | HandlerError::Credential(_))) => {
                error!("Failed {:?} from {}: {}", opcode, addr, e)
            }
            Err(e) => warn!("Dropped {:?} from {}: {}", opcode, addr, e),
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::PlayerComponent;
    use crate::testing::{addr, new_state};
    use shared::encode;

    struct Harness {
        state: GameState,
        dispatcher: Dispatcher,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                state: new_state(),
                dispatcher: Dispatcher::new(),
            }
        }

        fn send(&mut self, from: SocketAddr, packet: Packet) -> Vec<Packet> {
            let bytes = encode(&packet).unwrap();
            self.dispatcher
                .handle_datagram(&mut self.state, &bytes, from, Instant::now());
            self.state
                .drain_outbox()
                .into_iter()
                .map(|out| out.packet)
                .collect()
        }

        /// Creates an account, logs in and returns `(accountId, token)`.
        fn login(&mut self, from: SocketAddr, name: &str) -> (String, String) {
            self.send(
                from,
                Packet::new(Opcode::CreateAccount).arg(name).arg("secret"),
            );
            let replies = self.send(from, Packet::new(Opcode::Connect).arg(name).arg("secret"));
            assert_eq!(replies[0].opcode(), Opcode::LoginSuccess);
            (replies[0].args()[0].clone(), replies[0].args()[1].clone())
        }

        fn authed(&self, opcode: Opcode, session: &(String, String)) -> Packet {
            Packet::new(opcode).arg(&session.0).arg(&session.1)
        }
    }

    #[test]
    fn test_args_accessors() {
        let raw: Vec<String> = ["7", "x", "1", "2.5"].iter().map(|s| s.to_string()).collect();
        let args = Args::new(&raw);

        assert_eq!(args.parse::<u32>(0).unwrap(), 7);
        assert_eq!(args.str(1).unwrap(), "x");
        assert!(args.flag(2).unwrap());
        assert!(matches!(
            args.parse::<u32>(1),
            Err(HandlerError::InvalidArgument { index: 1, .. })
        ));
        assert!(matches!(
            args.str(9),
            Err(HandlerError::MissingArgument { index: 9 })
        ));
        assert!(args.vec3(1).is_err());
    }

    #[test]
    fn test_every_client_opcode_is_registered() {
        let dispatcher = Dispatcher::new();
        for opcode in [
            Opcode::Connect,
            Opcode::Disconnect,
            Opcode::Heartbeat,
            Opcode::CreateAccount,
            Opcode::CreateCharacter,
            Opcode::DeleteCharacter,
            Opcode::EnterWorld,
            Opcode::PlayerUpdate,
            Opcode::ActivateAbility,
            Opcode::SendChatMessage,
            Opcode::SetTarget,
            Opcode::UnsetTarget,
            Opcode::Ping,
        ] {
            assert!(dispatcher.handles(opcode), "{:?}", opcode);
        }
        assert!(!dispatcher.handles(Opcode::NpcUpdate));
    }

    #[test]
    fn test_create_account_replies() {
        let mut h = Harness::new();
        let replies = h.send(
            addr(9000),
            Packet::new(Opcode::CreateAccount).arg("alice").arg("pw"),
        );
        assert_eq!(replies, vec![Packet::new(Opcode::CreateAccountSuccess)]);

        let replies = h.send(
            addr(9000),
            Packet::new(Opcode::CreateAccount).arg("alice").arg("pw"),
        );
        assert_eq!(replies[0].opcode(), Opcode::CreateAccountFailure);
        assert_eq!(replies[0].args(), &["Account already exists."]);
    }

    #[test]
    fn test_login_failure_reply() {
        let mut h = Harness::new();
        let replies = h.send(addr(9000), Packet::new(Opcode::Connect).arg("nobody").arg("pw"));
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].opcode(), Opcode::LoginFailure);
        assert_eq!(replies[0].args(), &["Incorrect Username."]);
    }

    #[test]
    fn test_character_flow() {
        let mut h = Harness::new();
        let session = h.login(addr(9000), "alice");

        let replies = h.send(addr(9000), h.authed(Opcode::CreateCharacter, &session).arg("Hero"));
        assert_eq!(replies[0].opcode(), Opcode::CreateCharacterSuccess);
        assert_eq!(replies[0].args(), &["Hero;"]);

        let replies = h.send(addr(9000), h.authed(Opcode::CreateCharacter, &session).arg("Hero"));
        assert_eq!(replies[0].opcode(), Opcode::CreateCharacterFailure);

        let replies = h.send(addr(9000), h.authed(Opcode::EnterWorld, &session).arg("Hero"));
        assert_eq!(replies[0].opcode(), Opcode::EnterWorldSuccess);
        assert_eq!(replies[0].args()[1], "Hero");

        let replies = h.send(addr(9000), h.authed(Opcode::DeleteCharacter, &session).arg("Hero"));
        assert_eq!(replies[0].opcode(), Opcode::DeleteCharacterFailure);
        assert_eq!(replies[0].args(), &["Character is in the world."]);
    }

    #[test]
    fn test_forged_token_is_dropped() {
        let mut h = Harness::new();
        let session = h.login(addr(9000), "alice");
        let forged = (session.0.clone(), "not-the-token".to_string());

        let replies = h.send(addr(9666), h.authed(Opcode::CreateCharacter, &forged).arg("Evil"));
        assert!(replies.is_empty());

        let replies = h.send(addr(9666), h.authed(Opcode::Disconnect, &forged));
        assert!(replies.is_empty());
        assert_eq!(h.state.session_count(), 1);
    }

    #[test]
    fn test_malformed_arguments_do_not_panic() {
        let mut h = Harness::new();
        let session = h.login(addr(9000), "alice");

        let replies = h.send(
            addr(9000),
            h.authed(Opcode::PlayerUpdate, &session).arg("one").arg("x"),
        );
        assert!(replies.is_empty());
        let replies = h.send(addr(9000), Packet::new(Opcode::Heartbeat).arg("abc"));
        assert!(replies.is_empty());
        let replies = h.send(addr(9000), Packet::new(Opcode::SetTarget));
        assert!(replies.is_empty());
        assert_eq!(h.state.session_count(), 1);
    }

    #[test]
    fn test_garbage_is_ignored() {
        let mut h = Harness::new();
        h.dispatcher
            .handle_datagram(&mut h.state, b"hello", addr(9000), Instant::now());
        h.dispatcher
            .handle_datagram(&mut h.state, &[0u8; 1024], addr(9000), Instant::now());
        assert!(h.state.outbox().is_empty());
    }

    #[test]
    fn test_server_opcodes_are_ignored() {
        let mut h = Harness::new();
        let replies = h.send(addr(9000), Packet::new(Opcode::NpcUpdate).arg(1));
        assert!(replies.is_empty());
    }

    #[test]
    fn test_ping_echoes_timestamp() {
        let mut h = Harness::new();
        let replies = h.send(addr(9000), Packet::new(Opcode::Ping).arg(123456789u64));
        assert_eq!(replies, vec![Packet::new(Opcode::Pong).arg("123456789")]);
    }

    #[test]
    fn test_player_update_and_correction() {
        let mut h = Harness::new();
        let session = h.login(addr(9000), "alice");
        h.send(addr(9000), h.authed(Opcode::CreateCharacter, &session).arg("Hero"));
        h.send(addr(9000), h.authed(Opcode::EnterWorld, &session).arg("Hero"));

        let update = h
            .authed(Opcode::PlayerUpdate, &session)
            .arg(0)
            .args_from([3.0f32, 0.0, 0.0])
            .arg(1)
            .args_from([1.0f32, 0.0, 0.0]);
        let replies = h.send(addr(9000), update);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].opcode(), Opcode::PlayerCorrection);
        assert_eq!(replies[0].args(), &["0", "0", "0", "0"]);

        let account_id: u32 = session.0.parse().unwrap();
        let entity_id = h.state.find_session(account_id).unwrap();
        let player = h.state.world.get::<PlayerComponent>(entity_id).unwrap();
        assert!(player.right_mouse_down);
        assert_eq!(player.right_mouse_down_dir, Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_targeting_and_auto_attack() {
        let mut h = Harness::new();
        let session = h.login(addr(9000), "alice");
        h.send(addr(9000), h.authed(Opcode::CreateCharacter, &session).arg("Hero"));
        h.send(addr(9000), h.authed(Opcode::EnterWorld, &session).arg("Hero"));

        let replies = h.send(addr(9000), h.authed(Opcode::ActivateAbility, &session).arg(1));
        assert_eq!(replies[0].opcode(), Opcode::ServerMessage);
        assert_eq!(replies[0].args()[1], "ERROR");

        let other = h.login(addr(9001), "bob");
        h.send(addr(9001), h.authed(Opcode::CreateCharacter, &other).arg("Villain"));
        let replies = h.send(addr(9001), h.authed(Opcode::EnterWorld, &other).arg("Villain"));
        let villain = replies[0].args()[0].clone();

        h.send(addr(9000), h.authed(Opcode::SetTarget, &session).arg(&villain));
        let replies = h.send(addr(9000), h.authed(Opcode::ActivateAbility, &session).arg(1));
        assert_eq!(replies[0].opcode(), Opcode::ActivateAbilitySuccess);

        h.send(addr(9000), h.authed(Opcode::UnsetTarget, &session));
        let account_id: u32 = session.0.parse().unwrap();
        let entity_id = h.state.find_session(account_id).unwrap();
        let player = h.state.world.get::<PlayerComponent>(entity_id).unwrap();
        assert!(!player.auto_attack_on);
        assert_eq!(player.target_id, None);
    }

    #[test]
    fn test_disconnect_removes_session() {
        let mut h = Harness::new();
        let session = h.login(addr(9000), "alice");
        h.send(addr(9000), h.authed(Opcode::Disconnect, &session));
        assert_eq!(h.state.session_count(), 0);
        assert!(h.state.world.entities.is_empty());
    }
}
