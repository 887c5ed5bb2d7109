//! Opcode catalog. The numeric value is what travels on the wire.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Opcode {
    // Connection
    Connect = 1,
    Disconnect = 2,
    Heartbeat = 3,
    LoginSuccess = 4,
    LoginFailure = 5,

    // Account
    CreateAccount = 10,
    CreateAccountSuccess = 11,
    CreateAccountFailure = 12,

    // Character
    CreateCharacter = 20,
    CreateCharacterSuccess = 21,
    CreateCharacterFailure = 22,
    DeleteCharacter = 23,
    DeleteCharacterSuccess = 24,
    DeleteCharacterFailure = 25,
    EnterWorld = 26,
    EnterWorldSuccess = 27,
    EnterWorldFailure = 28,

    // World state
    PlayerUpdate = 30,
    NpcUpdate = 31,
    OtherPlayerUpdate = 32,
    PlayerCorrection = 33,

    // Combat
    ActivateAbility = 40,
    ActivateAbilitySuccess = 41,
    ActivateAbilityFailure = 42,
    ServerMessage = 43,

    // Social
    SendChatMessage = 50,
    PropagateChatMessage = 51,

    // Targeting
    SetTarget = 60,
    UnsetTarget = 61,

    // Latency
    Ping = 70,
    Pong = 71,
}

impl Opcode {
    pub const ALL: [Opcode; 31] = [
        Opcode::Connect,
        Opcode::Disconnect,
        Opcode::Heartbeat,
        Opcode::LoginSuccess,
        Opcode::LoginFailure,
        Opcode::CreateAccount,
        Opcode::CreateAccountSuccess,
        Opcode::CreateAccountFailure,
        Opcode::CreateCharacter,
        Opcode::CreateCharacterSuccess,
        Opcode::CreateCharacterFailure,
        Opcode::DeleteCharacter,
        Opcode::DeleteCharacterSuccess,
        Opcode::DeleteCharacterFailure,
        Opcode::EnterWorld,
        Opcode::EnterWorldSuccess,
        Opcode::EnterWorldFailure,
        Opcode::PlayerUpdate,
        Opcode::NpcUpdate,
        Opcode::OtherPlayerUpdate,
        Opcode::PlayerCorrection,
        Opcode::ActivateAbility,
        Opcode::ActivateAbilitySuccess,
        Opcode::ActivateAbilityFailure,
        Opcode::ServerMessage,
        Opcode::SendChatMessage,
        Opcode::PropagateChatMessage,
        Opcode::SetTarget,
        Opcode::UnsetTarget,
        Opcode::Ping,
        Opcode::Pong,
    ];

    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns `None` for values outside the catalog.
    pub fn from_u16(value: u16) -> Option<Opcode> {
        Self::ALL.iter().copied().find(|op| op.as_u16() == value)
    }

    /// High-rate opcodes that are kept out of per-packet trace logging.
    pub fn is_chatty(self) -> bool {
        matches!(self, Opcode::PlayerUpdate | Opcode::Heartbeat)
    }
}

impl TryFrom<u16> for Opcode {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Opcode::from_u16(value).ok_or(value)
    }
}
