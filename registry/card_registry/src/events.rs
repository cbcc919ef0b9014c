//! # Notifications
//!
//! Every successful state change produces one [`Notification`], handed to the
//! registry's optional [`NotificationSink`].
//!
//! | Kind           | Emitted by   | Payload                              |
//! |----------------|--------------|--------------------------------------|
//! | `minted`       | `mint`       | `recipient`, `card_id`, `character_type` |
//! | `upgraded`     | `upgrade`    | `card_id`, `new_level`, `owner`      |
//! | `traded`       | `trade`      | `from`, `to`, `card_id`              |
//! | `role_granted` | `grant_role` | `account`, `role`, `by`              |
//! | `role_revoked` | `revoke_role`| `account`, `role`, `by`              |
//! | `paused`       | `pause`      | `by`                                 |
//! | `unpaused`     | `unpause`    | `by`                                 |
//!
//! Delivery is best-effort. The registry has already committed the change
//! when it calls [`NotificationSink::publish`]; a sink error is logged and
//! otherwise ignored.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::rbac::Role;
use crate::types::{Address, CardId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    Minted {
        recipient: Address,
        card_id: CardId,
        character_type: u32,
    },
    Upgraded {
        card_id: CardId,
        new_level: u32,
        owner: Address,
    },
    Traded {
        from: Address,
        to: Address,
        card_id: CardId,
    },
    RoleGranted {
        account: Address,
        role: Role,
        by: Address,
    },
    RoleRevoked {
        account: Address,
        role: Role,
        by: Address,
    },
    Paused {
        by: Address,
    },
    Unpaused {
        by: Address,
    },
}

impl Notification {
    /// The serialized `kind` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Minted { .. } => "minted",
            Self::Upgraded { .. } => "upgraded",
            Self::Traded { .. } => "traded",
            Self::RoleGranted { .. } => "role_granted",
            Self::RoleRevoked { .. } => "role_revoked",
            Self::Paused { .. } => "paused",
            Self::Unpaused { .. } => "unpaused",
        }
    }

    /// The card this notification concerns, if any.
    pub fn card_id(&self) -> Option<CardId> {
        match self {
            Self::Minted { card_id, .. }
            | Self::Upgraded { card_id, .. }
            | Self::Traded { card_id, .. } => Some(*card_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    #[error("notification sink is closed")]
    Closed,

    #[error("notification sink rejected the record: {0}")]
    Rejected(String),
}

/// Receiver of registry notifications.
///
/// `publish` is called after the registry has released its state lock, once
/// per committed mutation and in commit order. Calls are never concurrent.
/// Implementations may read from the registry; they should still return
/// promptly, since the mutating caller waits for them.
pub trait NotificationSink: Send + Sync {
    fn publish(&self, notification: &Notification) -> Result<(), SinkError>;
}

/// Sink that keeps every notification in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<Notification>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Notification> {
        self.records.lock().clone()
    }

    pub fn last(&self) -> Option<Notification> {
        self.records.lock().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl NotificationSink for MemorySink {
    fn publish(&self, notification: &Notification) -> Result<(), SinkError> {
        self.records.lock().push(notification.clone());
        Ok(())
    }
}
