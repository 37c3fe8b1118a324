//! # Server Configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so a
//! partial file (or no file) is valid.
//!
//! ```toml
//! mode = "real_time"
//! seed = 42
//! match_duration_secs = 120
//! ```

use std::hash::Hasher;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bastion_rules::{
    UnitCatalog, DEFAULT_MATCH_SECONDS, DEFAULT_OFFER_SIZE, MANA_PER_SECOND, MAX_MANA,
    STARTING_MANA,
};
use bastion_shared::{MatchId, MatchModeKind};
use serde::{Deserialize, Serialize};
use siphasher::sip::SipHasher24;

use crate::engine::MatchRules;
use crate::error::{ConfigError, ConfigResult};

/// Server configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Ruleset for every match this server runs.
    pub mode: MatchModeKind,
    /// Base RNG seed. Each match mixes in its id.
    pub seed: u64,
    /// Troops offered per turn.
    pub offer_size: usize,
    /// Unit catalog file. `None` uses the embedded standard catalog.
    pub catalog_path: Option<PathBuf>,
    /// Pending commands per match before senders wait.
    pub mailbox_capacity: usize,
    /// Buffered messages per player outbox.
    pub outbox_capacity: usize,
    /// Longest a send waits on a full outbox before the message is dropped.
    pub outbox_send_timeout_ms: u64,
    /// Real-time match length.
    pub match_duration_secs: u64,
    /// Real-time supervisor tick.
    pub tick_interval_ms: u64,
    /// Real-time mana at match start.
    pub starting_mana: u32,
    /// Real-time mana ceiling.
    pub max_mana: u32,
    /// Real-time mana regenerated per second.
    pub mana_per_second: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            mode: MatchModeKind::TurnBased,
            seed: 0x0BA5_7105,
            offer_size: DEFAULT_OFFER_SIZE,
            catalog_path: None,
            mailbox_capacity: 32,
            outbox_capacity: 64,
            outbox_send_timeout_ms: 250,
            match_duration_secs: DEFAULT_MATCH_SECONDS,
            tick_interval_ms: 1000,
            starting_mana: STARTING_MANA,
            max_mana: MAX_MANA,
            mana_per_second: MANA_PER_SECOND,
        }
    }
}

impl ServerConfig {
    /// Parses and validates a config.
    ///
    /// # Errors
    ///
    /// `Parse` for malformed TOML, `Invalid` for out-of-range values.
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a config file.
    ///
    /// # Errors
    ///
    /// `Io` if unreadable, otherwise as [`Self::from_toml_str`].
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&source)
    }

    /// Checks ranges.
    ///
    /// # Errors
    ///
    /// `Invalid` naming the first bad field.
    pub fn validate(&self) -> ConfigResult<()> {
        let checks: [(&'static str, bool); 6] = [
            ("offer_size", self.offer_size > 0),
            ("mailbox_capacity", self.mailbox_capacity > 0),
            ("outbox_capacity", self.outbox_capacity > 0),
            ("tick_interval_ms", self.tick_interval_ms > 0),
            ("match_duration_secs", self.match_duration_secs > 0),
            ("max_mana", self.max_mana >= self.starting_mana),
        ];
        match checks.iter().find(|(_, ok)| !ok) {
            Some((field, _)) => Err(ConfigError::Invalid {
                field: *field,
                reason: "out of range".to_owned(),
            }),
            None => Ok(()),
        }
    }

    /// Loads the configured catalog.
    ///
    /// # Errors
    ///
    /// `Catalog` if the file is missing or invalid.
    pub fn load_catalog(&self) -> ConfigResult<UnitCatalog> {
        let catalog = match &self.catalog_path {
            Some(path) => UnitCatalog::from_file(path)?,
            None => UnitCatalog::standard()?,
        };
        Ok(catalog)
    }

    /// Per-match rules derived from this config.
    #[must_use]
    pub const fn match_rules(&self) -> MatchRules {
        MatchRules {
            mode: self.mode,
            offer_size: self.offer_size,
            match_duration: Duration::from_secs(self.match_duration_secs),
            starting_mana: self.starting_mana,
            max_mana: self.max_mana,
            mana_per_second: self.mana_per_second,
        }
    }

    /// RNG seed for one match: the base seed keyed with the match id.
    #[must_use]
    pub fn match_seed(&self, match_id: &MatchId) -> u64 {
        let mut hasher = SipHasher24::new_with_keys(self.seed, 0);
        hasher.write(match_id.as_str().as_bytes());
        hasher.finish()
    }

    /// Outbox send timeout.
    #[must_use]
    pub const fn outbox_send_timeout(&self) -> Duration {
        Duration::from_millis(self.outbox_send_timeout_ms)
    }

    /// Real-time tick interval.
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_defaults() {
        let config = ServerConfig::from_toml_str("").expect("empty config");
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_partial_file() {
        let config = ServerConfig::from_toml_str("mode = \"real_time\"\nseed = 7\n").expect("config");
        assert_eq!(config.mode, MatchModeKind::RealTime);
        assert_eq!(config.seed, 7);
        assert_eq!(config.offer_size, DEFAULT_OFFER_SIZE);
        assert_eq!(config.max_mana, MAX_MANA);
    }

    #[test]
    fn test_zero_offer_size_rejected() {
        let err = ServerConfig::from_toml_str("offer_size = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "offer_size", .. }));
    }

    #[test]
    fn test_bad_toml_rejected() {
        assert!(matches!(ServerConfig::from_toml_str("mode = ["), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_match_seed_depends_on_id() {
        let config = ServerConfig::default();
        let a = config.match_seed(&MatchId::numbered(1));
        let b = config.match_seed(&MatchId::numbered(2));
        assert_ne!(a, b);
        assert_eq!(a, config.match_seed(&MatchId::numbered(1)));
    }

    #[test]
    fn test_shipped_config_is_default() {
        let config = ServerConfig::from_toml_str(include_str!("../config/server.toml")).expect("shipped config");
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_standard_catalog_by_default() {
        let catalog = ServerConfig::default().load_catalog().expect("catalog");
        assert_eq!(catalog.troop_count(), 6);
    }
}
