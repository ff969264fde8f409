//! Fighter movement on the arena grid

use super::{Action, Position};

/// Distance moved per axis by one movement action
pub const STEP: f64 = 1.0;

/// Physics system for fighter positions
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Euclidean distance between two fighters
    pub fn distance(a: Position, b: Position) -> f64 {
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Position after `action`, given where the opponent stands
    ///
    /// Approach and retreat move one unit per axis, not along the
    /// normalized direction. An axis already aligned with the opponent
    /// does not move.
    pub fn apply_movement(position: Position, opponent: Position, action: Action) -> Position {
        let direction = match action {
            Action::Approach => 1.0,
            Action::Retreat => -1.0,
            _ => return position,
        };

        Position {
            x: position.x + direction * STEP * Self::axis_sign(position.x, opponent.x),
            y: position.y + direction * STEP * Self::axis_sign(position.y, opponent.y),
        }
    }

    fn axis_sign(from: f64, to: f64) -> f64 {
        if to > from {
            1.0
        } else if to < from {
            -1.0
        } else {
            0.0
        }
    }
}
