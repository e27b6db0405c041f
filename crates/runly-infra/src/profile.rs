//! Local operator profiles (`~/.runly/config.json`).
//!
//! The file holds named environments plus the name of the active one. The
//! active profile's keypair is the identity used when sealing assets.

use std::path::{Path, PathBuf};

use runly_core::service::identity::IdentityProvider;
use runly_types::error::IdentityError;
use runly_types::identity::{OperatorIdentity, Profile, ProfileSet};
use secrecy::{ExposeSecret, SecretString};

/// File name of the profile store inside the data directory.
pub const PROFILE_FILE: &str = "config.json";

/// JSON-file backed profile storage.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `{data_dir}/config.json`.
    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(PROFILE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the profile set. A missing file yields the stock profiles.
    pub fn load(&self) -> Result<ProfileSet, IdentityError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No profile file at {}, using defaults", self.path.display());
                return Ok(ProfileSet::default());
            }
            Err(err) => {
                return Err(IdentityError::Storage(format!(
                    "failed to read {}: {err}",
                    self.path.display()
                )));
            }
        };

        serde_json::from_str(&content).map_err(|e| {
            IdentityError::Storage(format!("failed to parse {}: {e}", self.path.display()))
        })
    }

    /// Persist the profile set, creating the data directory if needed.
    pub fn save(&self, profiles: &ProfileSet) -> Result<(), IdentityError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| IdentityError::Storage(format!("failed to create {}: {e}", parent.display())))?;
        }

        let json = serde_json::to_string_pretty(profiles)
            .map_err(|e| IdentityError::Storage(e.to_string()))?;
        std::fs::write(&self.path, json)
            .map_err(|e| IdentityError::Storage(format!("failed to write {}: {e}", self.path.display())))?;

        // The file carries the signing seed.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| IdentityError::Storage(e.to_string()))?;
        }

        tracing::debug!(path = %self.path.display(), "saved profiles");
        Ok(())
    }

    /// Apply `update` to the active profile and persist the result.
    pub fn update_active<F>(&self, update: F) -> Result<Profile, IdentityError>
    where
        F: FnOnce(&mut Profile),
    {
        let mut profiles = self.load()?;
        let name = profiles.active_profile.clone();
        let profile = profiles
            .active_mut()
            .ok_or_else(|| IdentityError::UnknownProfile(name))?;
        update(profile);
        let updated = profile.clone();
        self.save(&profiles)?;
        Ok(updated)
    }

    /// Store a keypair on the active profile.
    pub fn save_keys(
        &self,
        me_id: &str,
        public_key_hex: &str,
        private_key_hex: &SecretString,
    ) -> Result<Profile, IdentityError> {
        self.update_active(|profile| {
            profile.me_id = me_id.to_string();
            profile.public_key = public_key_hex.to_string();
            profile.secret_key = private_key_hex.expose_secret().to_string();
        })
    }

    /// Switch the active profile.
    pub fn use_profile(&self, name: &str) -> Result<(), IdentityError> {
        let mut profiles = self.load()?;
        if !profiles.profiles.contains_key(name) {
            return Err(IdentityError::UnknownProfile(name.to_string()));
        }
        profiles.active_profile = name.to_string();
        self.save(&profiles)
    }
}

impl IdentityProvider for ProfileStore {
    fn active_identity(&self) -> Result<OperatorIdentity, IdentityError> {
        let profiles = self.load()?;
        let profile = profiles
            .active()
            .ok_or_else(|| IdentityError::UnknownProfile(profiles.active_profile.clone()))?;

        if !profile.has_keys() {
            return Err(IdentityError::MissingKey(profiles.active_profile.clone()));
        }

        Ok(OperatorIdentity {
            me_id: profile.me_id.clone(),
            public_key_hex: profile.public_key.clone(),
            private_key_hex: SecretString::from(profile.secret_key.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(tmp: &TempDir) -> ProfileStore {
        ProfileStore::in_data_dir(&tmp.path().join("nested"))
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let tmp = TempDir::new().unwrap();
        let profiles = store(&tmp).load().unwrap();
        assert_eq!(profiles, ProfileSet::default());
    }

    #[test]
    fn test_active_identity_without_keys_is_missing_key() {
        let tmp = TempDir::new().unwrap();
        let err = store(&tmp).active_identity().unwrap_err();
        assert!(matches!(err, IdentityError::MissingKey(ref p) if p == "cloud"));
    }

    #[test]
    fn test_save_keys_then_resolve_identity() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        store
            .save_keys("me_0xabc", "ab".repeat(32).as_str(), &SecretString::from("cd".repeat(32)))
            .unwrap();

        let identity = store.active_identity().unwrap();
        assert_eq!(identity.me_id, "me_0xabc");
        assert_eq!(identity.public_key_hex, "ab".repeat(32));
        assert_eq!(identity.private_key_hex.expose_secret(), "cd".repeat(32));
        assert!(store.path().exists());
    }

    #[test]
    fn test_use_profile_switches_and_rejects_unknown() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        store.use_profile("local").unwrap();
        assert_eq!(store.load().unwrap().active_profile, "local");

        let err = store.use_profile("staging").unwrap_err();
        assert!(matches!(err, IdentityError::UnknownProfile(_)));
    }

    #[test]
    fn test_keys_are_per_profile() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        store
            .save_keys("me_cloud", "11".repeat(32).as_str(), &SecretString::from("22".repeat(32)))
            .unwrap();
        store.use_profile("local").unwrap();
        assert!(matches!(
            store.active_identity().unwrap_err(),
            IdentityError::MissingKey(_)
        ));
    }

    #[test]
    fn test_malformed_file_is_storage_error() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "{not json").unwrap();
        assert!(matches!(store.load().unwrap_err(), IdentityError::Storage(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        store.save(&ProfileSet::default()).unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
