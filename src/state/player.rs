//! Player position and movement rules

use serde::{Deserialize, Serialize};

/// Movement directions, keyed by WASD
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// W
    North,
    /// A
    West,
    /// S
    South,
    /// D
    East,
}

impl Direction {
    /// Parse a direction token, ignoring case and surrounding whitespace
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "W" => Some(Direction::North),
            "A" => Some(Direction::West),
            "S" => Some(Direction::South),
            "D" => Some(Direction::East),
            _ => None,
        }
    }

    /// (dx, dy) for one step
    pub fn delta(self) -> (i64, i64) {
        match self {
            Direction::North => (0, 1),
            Direction::West => (-1, 0),
            Direction::South => (0, -1),
            Direction::East => (1, 0),
        }
    }
}

/// Position of a player. `z` is reserved and always 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl Player {
    #[cfg(test)]
    pub fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    /// Move one step in `direction`. Coordinates stop at the `i64` bounds.
    pub fn step(&mut self, direction: Direction) {
        let (dx, dy) = direction.delta();
        self.x = self.x.saturating_add(dx);
        self.y = self.y.saturating_add(dy);
    }

    /// Apply a raw direction token. Unknown tokens leave the position as is.
    /// Returns whether the player moved.
    pub fn apply(&mut self, token: &str) -> bool {
        match Direction::parse(token) {
            Some(direction) => {
                self.step(direction);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_deltas() {
        let start = Player::new(3, -2, 0);
        let cases = [
            ("W", Player::new(3, -1, 0)),
            ("S", Player::new(3, -3, 0)),
            ("A", Player::new(2, -2, 0)),
            ("D", Player::new(4, -2, 0)),
        ];
        for (token, expected) in cases {
            let mut p = start;
            assert!(p.apply(token));
            assert_eq!(p, expected, "token {}", token);
        }
    }

    #[test]
    fn test_direction_is_case_insensitive() {
        let mut p = Player::default();
        p.apply("w");
        p.apply("d");
        assert_eq!(p, Player::new(1, 1, 0));
    }

    #[test]
    fn test_unknown_token_is_noop() {
        for token in ["", "Q", "up", "WW", "1", " "] {
            let mut p = Player::new(5, 5, 0);
            assert!(!p.apply(token));
            assert_eq!(p, Player::new(5, 5, 0));
        }
    }

    #[test]
    fn test_step_at_coordinate_bounds() {
        let mut p = Player::new(i64::MAX, i64::MIN, 0);
        assert!(p.apply("D"));
        assert!(p.apply("S"));
        assert_eq!(p, Player::new(i64::MAX, i64::MIN, 0));

        assert!(p.apply("A"));
        assert!(p.apply("W"));
        assert_eq!(p, Player::new(i64::MAX - 1, i64::MIN + 1, 0));
    }
}
