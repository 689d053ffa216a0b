//! Protocol message definitions
//!
//! Defines the movement command sent from clients to the server.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Longest client identifier accepted on the wire
pub const MAX_CLIENT_ID_LEN: usize = 32;

/// Rejected client identifier
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientIdError {
    #[error("client id is empty")]
    Empty,

    #[error("client id is too long: {0} chars (max: {max})", max = MAX_CLIENT_ID_LEN)]
    TooLong(usize),

    #[error("client id contains invalid character {0:?}")]
    InvalidChar(char),
}

/// Identifier a client picks for itself at startup.
///
/// Used as the key into both the registry and the player store, so it is
/// restricted to characters that are safe in a file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClientId(String);

impl ClientId {
    pub fn new(id: impl Into<String>) -> Result<Self, ClientIdError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ClientIdError::Empty);
        }
        if id.chars().count() > MAX_CLIENT_ID_LEN {
            return Err(ClientIdError::TooLong(id.chars().count()));
        }
        if let Some(c) = id
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(ClientIdError::InvalidChar(c));
        }
        Ok(Self(id))
    }

    /// Generate a short numeric identifier.
    ///
    /// Four digits drawn from `[0100, 9099]`. There is no collision check: two
    /// clients that pick the same number share one player record.
    pub fn generate() -> Self {
        let n = (uuid::Uuid::new_v4().as_u128() % 9000) as u32 + 100;
        Self(format!("{:04}", n))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ClientId {
    type Error = ClientIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ClientId> for String {
    fn from(id: ClientId) -> Self {
        id.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single movement command.
///
/// `direction` is kept as the raw token the operator typed; tokens outside
/// W/A/S/D are carried to the server and ignored there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub client_id: ClientId,
    pub direction: String,
}

impl Movement {
    /// Build a movement, normalizing the token to uppercase
    pub fn new(client_id: ClientId, direction: &str) -> Self {
        Self {
            client_id,
            direction: direction.trim().to_uppercase(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_id_is_short_and_numeric() {
        for _ in 0..100 {
            let id = ClientId::generate();
            assert_eq!(id.as_str().len(), 4);
            assert!(id.as_str().chars().all(|c| c.is_ascii_digit()));
            let n: u32 = id.as_str().parse().unwrap();
            assert!((100..9100).contains(&n));
        }
    }

    #[test]
    fn test_client_id_validation() {
        assert!(ClientId::new("1234").is_ok());
        assert!(ClientId::new("player_one-2").is_ok());
        assert_eq!(ClientId::new(""), Err(ClientIdError::Empty));
        assert_eq!(
            ClientId::new("../etc/passwd"),
            Err(ClientIdError::InvalidChar('.'))
        );
        assert!(matches!(
            ClientId::new("x".repeat(MAX_CLIENT_ID_LEN + 1)),
            Err(ClientIdError::TooLong(_))
        ));
    }

    #[test]
    fn test_movement_wire_format() {
        let movement = Movement::new(ClientId::new("1234").unwrap(), "w");
        let json = serde_json::to_string(&movement).unwrap();
        assert_eq!(json, r#"{"client_id":"1234","direction":"W"}"#);
    }

    #[test]
    fn test_movement_rejects_bad_client_id() {
        let result: Result<Movement, _> =
            serde_json::from_str(r#"{"client_id":"a/b","direction":"W"}"#);
        assert!(result.is_err());
    }
}
