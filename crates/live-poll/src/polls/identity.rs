//! Voter identity resolution used for duplicate suppression.
//!
//! Identity here is advisory: it decides which stored field a duplicate check
//! compares against, nothing more. Ingestion and status checks must agree on
//! the outcome, so both go through [`resolve_identity`].

use serde::Serialize;

use super::domain::VoteRecord;

/// Which vote field an identity value is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IdentityKind {
    User,
    Device,
    Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct VoterIdentity {
    pub kind: IdentityKind,
    pub value: String,
}

impl VoterIdentity {
    /// Whether the stored vote carries this identity in the matching field.
    pub fn matches(&self, vote: &VoteRecord) -> bool {
        let field = match self.kind {
            IdentityKind::User => vote.user_id.as_deref(),
            IdentityKind::Device => vote.device_id.as_deref(),
            IdentityKind::Address => Some(vote.ip_address.as_str()),
        };
        field == Some(self.value.as_str())
    }
}

/// Picks exactly one identity: user id, else device id, else network address.
/// Blank ids count as absent.
pub fn resolve_identity(
    user_id: Option<&str>,
    device_id: Option<&str>,
    address: &str,
) -> VoterIdentity {
    if let Some(user) = present(user_id) {
        VoterIdentity {
            kind: IdentityKind::User,
            value: user.to_string(),
        }
    } else if let Some(device) = present(device_id) {
        VoterIdentity {
            kind: IdentityKind::Device,
            value: device.to_string(),
        }
    } else {
        VoterIdentity {
            kind: IdentityKind::Address,
            value: address.to_string(),
        }
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
