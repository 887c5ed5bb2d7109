//! Ability activation and targeting.
//!
//! Only Auto Attack changes state: it toggles the session's auto attack flag. Turning it
//! on needs a valid target, turning it off always succeeds. Every other known ability is
//! acknowledged without effect.

use crate::ecs::{EntityId, PlayerComponent, SkillComponent};
use crate::error::{HandlerError, Rejection};
use crate::game::GameState;
use log::debug;
use shared::{Opcode, Packet, MESSAGE_TYPE_ERROR};

pub const AUTO_ATTACK: &str = "Auto Attack";

impl GameState {
    /// Activates `ability_id` for the session and queues the reply.
    pub fn activate_ability(
        &mut self,
        entity_id: EntityId,
        ability_id: u32,
    ) -> Result<(), HandlerError> {
        let session = self.world.get::<PlayerComponent>(entity_id)?;
        if !session.in_world() {
            return Err(HandlerError::NotInWorld(session.account_id));
        }
        let addr = session.addr;

        let known = self
            .world
            .get::<SkillComponent>(entity_id)
            .map(|skills| skills.knows_ability(ability_id))
            .unwrap_or(false);
        let name = self
            .ability(ability_id)
            .filter(|_| known)
            .map(|ability| ability.name.clone());
        let Some(name) = name else {
            self.send(
                addr,
                Packet::new(Opcode::ActivateAbilityFailure)
                    .arg(ability_id)
                    .arg(Rejection::UnknownAbility.message()),
            );
            return Ok(());
        };

        if name == AUTO_ATTACK {
            let attacking = self.world.get::<PlayerComponent>(entity_id)?.auto_attack_on;
            let gate = if attacking {
                Ok(())
            } else {
                self.check_attack_target(entity_id).map(|_| ())
            };
            if let Err(rejection) = gate {
                self.send(
                    addr,
                    Packet::new(Opcode::ServerMessage)
                        .arg(rejection.message())
                        .arg(MESSAGE_TYPE_ERROR),
                );
                return Ok(());
            }
            let session = self.world.get_mut::<PlayerComponent>(entity_id)?;
            session.auto_attack_on = !session.auto_attack_on;
            debug!(
                "Entity {} auto attack {}",
                entity_id,
                if session.auto_attack_on { "on" } else { "off" }
            );
        }

        self.send(
            addr,
            Packet::new(Opcode::ActivateAbilitySuccess).arg(ability_id),
        );
        Ok(())
    }

    fn check_attack_target(&self, entity_id: EntityId) -> Result<EntityId, Rejection> {
        let target_id = self
            .world
            .players
            .get(entity_id)
            .and_then(|session| session.target_id)
            .ok_or(Rejection::NoAttackTarget)?;
        match self.world.entities.get(target_id) {
            Ok(target) if !target.is_static && target_id != entity_id => Ok(target_id),
            _ => Err(Rejection::InvalidAttackTarget),
        }
    }

    pub fn set_target(&mut self, entity_id: EntityId, target_id: EntityId) -> Result<(), HandlerError> {
        self.world.get_mut::<PlayerComponent>(entity_id)?.target_id = Some(target_id);
        Ok(())
    }

    /// Clears the target and stops auto attacking.
    pub fn unset_target(&mut self, entity_id: EntityId) -> Result<(), HandlerError> {
        let session = self.world.get_mut::<PlayerComponent>(entity_id)?;
        session.target_id = None;
        session.auto_attack_on = false;
        Ok(())
    }
}
