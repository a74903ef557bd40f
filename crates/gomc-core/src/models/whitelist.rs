//! Named player whitelists: `whitelists/<name>.yaml`.

use crate::error::{Result, StateError};
use crate::validation::{validate_player_name, validate_uuid, validate_whitelist_name, Validate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A whitelisted player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub uuid: String,
    pub name: String,
    pub added_at: DateTime<Utc>,
}

impl PlayerInfo {
    pub fn new(uuid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            name: name.into(),
            added_at: Utc::now(),
        }
    }
}

/// A reusable list of players that servers can attach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistState {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub players: Vec<PlayerInfo>,
}

impl WhitelistState {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            created_at: now,
            updated_at: now,
            players: Vec::new(),
        }
    }

    /// Look a player up by UUID, ignoring case.
    pub fn find_player(&self, uuid: &str) -> Option<&PlayerInfo> {
        self.players
            .iter()
            .find(|player| player.uuid.eq_ignore_ascii_case(uuid))
    }
}

impl Validate for WhitelistState {
    fn validate(&self) -> Result<()> {
        validate_whitelist_name(&self.name)?;
        let mut seen = HashSet::new();
        for player in &self.players {
            validate_uuid(&player.uuid)?;
            validate_player_name(&player.name)?;
            if !seen.insert(player.uuid.to_ascii_lowercase()) {
                return Err(StateError::validation(
                    "players",
                    &player.uuid,
                    "uuid appears more than once",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTCH: &str = "069a79f4-44e9-4726-a5be-fca90e38aaf5";

    #[test]
    fn test_new_whitelist_is_empty_and_valid() {
        let whitelist = WhitelistState::new("ops");
        whitelist.validate().unwrap();
        assert!(whitelist.players.is_empty());
    }

    #[test]
    fn test_find_player_ignores_case() {
        let mut whitelist = WhitelistState::new("ops");
        whitelist.players.push(PlayerInfo::new(NOTCH, "Notch"));
        assert!(whitelist.find_player(&NOTCH.to_uppercase()).is_some());
    }

    #[test]
    fn test_duplicate_players_are_invalid() {
        let mut whitelist = WhitelistState::new("ops");
        whitelist.players.push(PlayerInfo::new(NOTCH, "Notch"));
        whitelist.players.push(PlayerInfo::new(NOTCH, "Notch2"));
        assert!(whitelist.validate().is_err());
    }

    #[test]
    fn test_bad_player_name_is_invalid() {
        let mut whitelist = WhitelistState::new("ops");
        whitelist.players.push(PlayerInfo::new(NOTCH, "Not ch"));
        assert!(whitelist.validate().is_err());
    }
}
