//! Per-entity movement controllers advanced once per tick.

use crate::ecs::{AiComponent, AiState, Entity, PlayerComponent};
use rand::Rng;
use shared::Vec3;
use std::f32::consts::TAU;

/// Seconds an NPC waits between wander legs.
const IDLE_SECONDS: (f32, f32) = (2.0, 6.0);

/// Moves a player along the held right-mouse direction at the entity's speed.
///
/// Returns the new position.
pub fn update_player(entity: &mut Entity, session: &PlayerComponent, dt: f32) -> Vec3 {
    entity.movement = if session.right_mouse_down {
        session.right_mouse_down_dir.normalized() * entity.speed
    } else {
        Vec3::ZERO
    };
    entity.position += entity.movement * dt;
    entity.position
}

/// Idle/wander state machine around the NPC's home point.
pub fn update_npc<R: Rng + ?Sized>(
    entity: &mut Entity,
    ai: &mut AiComponent,
    rng: &mut R,
    dt: f32,
) -> Vec3 {
    match ai.state {
        AiState::Idle { remaining } => {
            entity.movement = Vec3::ZERO;
            let remaining = remaining - dt;
            ai.state = if remaining > 0.0 || ai.wander_radius <= 0.0 {
                AiState::Idle {
                    remaining: remaining.max(0.0),
                }
            } else {
                AiState::Wander {
                    destination: pick_destination(ai, rng),
                }
            };
        }
        AiState::Wander { destination } => {
            let to_destination = destination - entity.position;
            let step = entity.speed * dt;
            if entity.speed <= 0.0 || to_destination.length() <= step {
                entity.position = destination;
                entity.movement = Vec3::ZERO;
                ai.state = AiState::Idle {
                    remaining: rng.gen_range(IDLE_SECONDS.0..IDLE_SECONDS.1),
                };
            } else {
                entity.movement = to_destination.normalized() * entity.speed;
                entity.position += entity.movement * dt;
            }
        }
    }
    entity.position
}

fn pick_destination<R: Rng + ?Sized>(ai: &AiComponent, rng: &mut R) -> Vec3 {
    let angle = rng.gen_range(0.0..TAU);
    let distance = rng.gen_range(0.0..=ai.wander_radius);
    ai.home + Vec3::new(angle.cos() * distance, 0.0, angle.sin() * distance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{EntityDesc, EntityId, EntityKind, EntityStore};
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn entity(kind: EntityKind, speed: f32) -> Entity {
        let mut store = EntityStore::new(4);
        let id = store
            .create(EntityDesc::new(kind, "e", Vec3::ZERO).speed(speed))
            .unwrap();
        store.get(id).unwrap().clone()
    }

    fn session() -> PlayerComponent {
        PlayerComponent::new(
            EntityId(1),
            1,
            "token".into(),
            "127.0.0.1:5000".parse().unwrap(),
        )
    }

    #[test]
    fn test_player_moves_while_right_mouse_held() {
        let mut player = entity(EntityKind::Player, 10.0);
        let mut input = session();
        input.right_mouse_down = true;
        input.right_mouse_down_dir = Vec3::new(2.0, 0.0, 0.0);

        let pos = update_player(&mut player, &input, 0.5);
        assert_approx_eq!(pos.x, 5.0, 0.0001);
        assert_approx_eq!(player.movement.x, 10.0, 0.0001);
        assert_approx_eq!(pos.z, 0.0, 0.0001);
    }

    #[test]
    fn test_player_stops_when_released() {
        let mut player = entity(EntityKind::Player, 10.0);
        let mut input = session();
        input.right_mouse_down = true;
        input.right_mouse_down_dir = Vec3::new(0.0, 0.0, 1.0);
        update_player(&mut player, &input, 1.0);

        input.right_mouse_down = false;
        let pos = update_player(&mut player, &input, 1.0);
        assert_approx_eq!(pos.z, 10.0, 0.0001);
        assert_eq!(player.movement, Vec3::ZERO);
    }

    #[test]
    fn test_stationary_npc_never_moves() {
        let mut npc = entity(EntityKind::Npc, 5.0);
        let mut ai = AiComponent::stationary(Vec3::ZERO);
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..100 {
            update_npc(&mut npc, &mut ai, &mut rng, 0.1);
        }
        assert_eq!(npc.position, Vec3::ZERO);
    }

    #[test]
    fn test_wandering_npc_stays_near_home() {
        let mut npc = entity(EntityKind::Npc, 4.0);
        let mut ai = AiComponent::wandering(Vec3::ZERO, 10.0);
        let mut rng = StdRng::seed_from_u64(42);
        let mut moved = false;

        for _ in 0..2000 {
            let pos = update_npc(&mut npc, &mut ai, &mut rng, 0.05);
            assert!(pos.distance(ai.home) <= 10.0 + 0.001);
            moved |= pos != Vec3::ZERO;
        }
        assert!(moved);
    }

    #[test]
    fn test_wander_arrival_switches_to_idle() {
        let mut npc = entity(EntityKind::Npc, 100.0);
        let mut ai = AiComponent::wandering(Vec3::ZERO, 10.0);
        ai.state = AiState::Wander {
            destination: Vec3::new(1.0, 0.0, 0.0),
        };
        let mut rng = StdRng::seed_from_u64(1);

        update_npc(&mut npc, &mut ai, &mut rng, 1.0);
        assert_eq!(npc.position, Vec3::new(1.0, 0.0, 0.0));
        assert!(matches!(ai.state, AiState::Idle { remaining } if remaining >= 2.0));
    }
}
