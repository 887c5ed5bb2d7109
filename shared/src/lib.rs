//! Protocol vocabulary shared by the server and any client speaking its wire format.
//!
//! A datagram is always exactly [`PACKET_SIZE`] bytes:
//!
//! | bytes      | content                                             |
//! |------------|-----------------------------------------------------|
//! | `0..4`     | [`CHECKSUM_MAGIC`], little-endian `u32`             |
//! | `4..6`     | [`Opcode`], little-endian `u16`                     |
//! | `6..`      | `|`-terminated, escaped text arguments, NUL padding |

pub mod opcode;
pub mod records;
pub mod wire;

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Sub};

pub use opcode::Opcode;
pub use wire::{decode, encode, Packet, WireError};

/// Rejects traffic that does not speak this protocol. Not an integrity check.
pub const CHECKSUM_MAGIC: u32 = 0x5EED_F00D;
/// Size of every datagram, in both directions.
pub const PACKET_SIZE: usize = 1024;
/// Bytes taken by the checksum and the opcode.
pub const HEADER_SIZE: usize = 6;
pub const DEFAULT_PORT: u16 = 27016;
/// A session that has not sent a heartbeat for this long is logged out.
pub const TIMEOUT_DURATION_MS: u64 = 30_000;

pub const INCORRECT_USERNAME: &str = "Incorrect Username.";
pub const INCORRECT_PASSWORD: &str = "Incorrect Password.";
pub const ACCOUNT_ALREADY_EXISTS: &str = "Account already exists.";
pub const CHARACTER_ALREADY_EXISTS: &str = "Character already exists.";
pub const CHARACTER_NOT_FOUND: &str = "Character not found.";
pub const CHARACTER_IN_WORLD: &str = "Character is in the world.";
pub const INVALID_CHARACTER_NAME: &str = "Invalid character name.";
pub const INVALID_ATTACK_TARGET: &str = "You can't attack that.";
pub const NO_ATTACK_TARGET: &str = "You need a target before attacking.";
pub const UNKNOWN_ABILITY: &str = "Unknown ability.";
pub const MESSAGE_TYPE_ERROR: &str = "ERROR";

#[derive(Debug, Default, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Unit vector in the same direction, or zero for a (near) zero vector.
    pub fn normalized(self) -> Self {
        let len = self.length();
        if len > 0.0001 {
            self * (1.0 / len)
        } else {
            Vec3::ZERO
        }
    }

    pub fn distance(self, other: Vec3) -> f32 {
        (self - other).length()
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Vec3) {
        *self = *self + rhs;
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}
