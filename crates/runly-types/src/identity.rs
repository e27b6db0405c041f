//! Operator identity and local profile types.
//!
//! A profile is the locally stored record of who the operator is (`me_id`)
//! and which Ed25519 keypair they sign with. The signing workflow turns the
//! active profile into an [`OperatorIdentity`] and re-stamps the asset's
//! creator from it before sealing.

use std::collections::BTreeMap;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// The identity used to stamp and sign an asset.
#[derive(Debug)]
pub struct OperatorIdentity {
    pub me_id: String,
    /// Hex-encoded Ed25519 public key.
    pub public_key_hex: String,
    /// Hex-encoded 32-byte Ed25519 seed.
    pub private_key_hex: SecretString,
}

/// One named environment in the local profile file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub name: String,
    pub me_server: String,
    pub hub_server: String,
    pub access_token: String,
    pub public_key: String,
    pub me_id: String,
    pub secret_key: String,
}

impl Profile {
    pub fn has_keys(&self) -> bool {
        !self.secret_key.is_empty() && !self.public_key.is_empty()
    }
}

/// Root of `~/.runly/config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSet {
    pub active_profile: String,
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for ProfileSet {
    /// The two stock environments shipped with a fresh install.
    fn default() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert(
            "cloud".to_string(),
            Profile {
                name: "cloud".to_string(),
                me_server: "https://api.runly.me".to_string(),
                hub_server: "https://api.runlyhub.com".to_string(),
                ..Profile::default()
            },
        );
        profiles.insert(
            "local".to_string(),
            Profile {
                name: "local".to_string(),
                me_server: "http://localhost:8080".to_string(),
                hub_server: "http://localhost:8081".to_string(),
                ..Profile::default()
            },
        );
        Self {
            active_profile: "cloud".to_string(),
            profiles,
        }
    }
}

impl ProfileSet {
    /// The active profile, if the name resolves.
    pub fn active(&self) -> Option<&Profile> {
        self.profiles.get(&self.active_profile)
    }

    pub fn active_mut(&mut self) -> Option<&mut Profile> {
        self.profiles.get_mut(&self.active_profile)
    }
}
