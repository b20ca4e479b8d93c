use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Access policy attached to a registered file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// A single explicit grantee.
    Private,
    /// An explicit set of grantees.
    Shared,
    /// Every peer.
    Public,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Shared => "shared",
            Self::Public => "public",
        }
    }

    /// Policy implied by a recipient count when the caller did not ask for
    /// `public` explicitly.
    pub fn for_recipient_count(count: usize) -> Self {
        if count <= 1 {
            Self::Private
        } else {
            Self::Shared
        }
    }
}

impl FromStr for Visibility {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(Self::Private),
            "shared" => Ok(Self::Shared),
            "public" => Ok(Self::Public),
            other => Err(ProtocolError::UnknownValue(other.to_string())),
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Presence of a peer as tracked by the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerStatus {
    Online,
    Offline,
}

impl PeerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

impl FromStr for PeerStatus {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            other => Err(ProtocolError::UnknownValue(other.to_string())),
        }
    }
}

impl fmt::Display for PeerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one attempted delivery, as recorded in the transfer log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferOutcome {
    Success,
    Failed,
}

impl TransferOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl FromStr for TransferOutcome {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            other => Err(ProtocolError::UnknownValue(other.to_string())),
        }
    }
}

impl fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a transfer payload contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    /// Raw bytes of a single file.
    File,
    /// A directory packed by the archive codec.
    ArchivedDirectory,
}

impl ItemKind {
    pub fn is_directory(&self) -> bool {
        matches!(self, Self::ArchivedDirectory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_round_trips_through_str() {
        for v in [Visibility::Private, Visibility::Shared, Visibility::Public] {
            assert_eq!(v.as_str().parse::<Visibility>().unwrap(), v);
        }
        assert!("everyone".parse::<Visibility>().is_err());
    }

    #[test]
    fn test_visibility_for_recipient_count() {
        assert_eq!(Visibility::for_recipient_count(1), Visibility::Private);
        assert_eq!(Visibility::for_recipient_count(3), Visibility::Shared);
    }

    #[test]
    fn test_outcome_success_flag() {
        assert!(TransferOutcome::Success.is_success());
        assert!(!TransferOutcome::Failed.is_success());
    }
}
