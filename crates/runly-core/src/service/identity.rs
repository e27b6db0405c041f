//! IdentityProvider trait: who is sealing this asset.

use runly_types::error::IdentityError;
use runly_types::identity::OperatorIdentity;

/// Source of the active operator identity. `runly-infra` backs this with the
/// local profile file.
pub trait IdentityProvider: Send + Sync {
    fn active_identity(&self) -> Result<OperatorIdentity, IdentityError>;
}
