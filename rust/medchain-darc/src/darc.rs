use medchain_common::{Blake3Hash, NULL_BLAKE3_HASH, hash_cbor};
use serde::{Deserialize, Serialize};

use crate::{MedchainDarcError, Rules};

/// One version of a DARC.
///
/// The id of a version is the hash of its canonical encoding. Version 0
/// stores a null base id and its own id stands in for it; every later
/// version stores the base id explicitly, together with the id of the
/// version it replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Darc {
    version: u64,
    description: String,
    base_id: Blake3Hash,
    prev_id: Blake3Hash,
    rules: Rules,
}

impl Darc {
    /// A fresh DARC at version 0.
    pub fn new(description: impl Into<String>, rules: Rules) -> Self {
        Darc {
            version: 0,
            description: description.into(),
            base_id: NULL_BLAKE3_HASH,
            prev_id: NULL_BLAKE3_HASH,
            rules,
        }
    }

    /// The next version of this DARC carrying `rules`.
    pub fn evolve_to(&self, rules: Rules) -> Result<Self, MedchainDarcError> {
        Ok(Darc {
            version: self.version + 1,
            description: self.description.clone(),
            base_id: self.base_id()?,
            prev_id: self.id()?,
            rules,
        })
    }

    /// Id of this version.
    pub fn id(&self) -> Result<Blake3Hash, MedchainDarcError> {
        Ok(hash_cbor(self)?)
    }

    /// Id shared by every version.
    pub fn base_id(&self) -> Result<Blake3Hash, MedchainDarcError> {
        if self.version == 0 {
            self.id()
        } else {
            Ok(self.base_id)
        }
    }

    /// Id of the previous version, `None` at version 0.
    pub fn prev_id(&self) -> Option<Blake3Hash> {
        (self.version > 0).then_some(self.prev_id)
    }

    /// Version number.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Free-form description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The rule table.
    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    /// Check that `next` is a well-formed successor of this version: one
    /// version higher, same base id, and pointing back at this version.
    pub fn check_successor(&self, next: &Darc) -> Result<(), MedchainDarcError> {
        if next.version != self.version + 1 {
            return Err(MedchainDarcError::InvalidEvolution(format!(
                "version {} does not follow {}",
                next.version, self.version
            )));
        }
        if next.base_id()? != self.base_id()? {
            return Err(MedchainDarcError::InvalidEvolution(
                "base id changed".to_string(),
            ));
        }
        if next.prev_id() != Some(self.id()?) {
            return Err(MedchainDarcError::InvalidEvolution(
                "previous version reference does not match".to_string(),
            ));
        }
        Ok(())
    }
}
