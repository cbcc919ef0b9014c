//! Event types handled by the collector.
//!
//! A registry's [`HttpSink`](crate::sink::HttpSink) wraps each
//! [`Notification`] in a [`NotificationEnvelope`]. On ingest the envelope is
//! flattened into a [`CollectedEvent`] row so that cards and accounts can be
//! queried without parsing the JSON payload.

use card_registry::Notification;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{CollectorError, Result};

/// What travels over the wire from a registry to the collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEnvelope {
    /// Name of the emitting registry.
    pub source: String,
    /// Random id of the emitting sink instance. Envelopes without one fall
    /// under the nil session.
    #[serde(default)]
    pub session: Uuid,
    /// Per-session sequence number, starting at 1.
    pub sequence: u64,
    /// Unix seconds at which the registry emitted the notification.
    pub emitted_at: i64,
    pub notification: Notification,
}

/// A decoded notification, ready to be stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectedEvent {
    pub source: String,
    pub session: String,
    pub sequence: i64,
    pub event_type: String,
    pub card_id: Option<i64>,
    /// The account that performed or received the action.
    pub actor: Option<String>,
    /// The other account involved (trade recipient, role grantee).
    pub counterparty: Option<String>,
    /// Character type for mints, new level for upgrades.
    pub value: Option<i64>,
    /// Role name for role events.
    pub detail: Option<String>,
    pub emitted_at: i64,
    pub payload: String,
}

impl CollectedEvent {
    pub fn from_envelope(envelope: &NotificationEnvelope) -> Result<Self> {
        let sequence = i64::try_from(envelope.sequence).map_err(|_| {
            CollectorError::EventDecode(format!("sequence {} out of range", envelope.sequence))
        })?;
        let card_id = envelope
            .notification
            .card_id()
            .map(|id| {
                i64::try_from(id)
                    .map_err(|_| CollectorError::EventDecode(format!("card id {id} out of range")))
            })
            .transpose()?;

        let (actor, counterparty, value, detail) = match &envelope.notification {
            Notification::Minted {
                recipient,
                character_type,
                ..
            } => (Some(recipient.to_string()), None, Some(i64::from(*character_type)), None),
            Notification::Upgraded {
                new_level, owner, ..
            } => (Some(owner.to_string()), None, Some(i64::from(*new_level)), None),
            Notification::Traded { from, to, .. } => {
                (Some(from.to_string()), Some(to.to_string()), None, None)
            }
            Notification::RoleGranted { account, role, by }
            | Notification::RoleRevoked { account, role, by } => (
                Some(by.to_string()),
                Some(account.to_string()),
                None,
                Some(role.as_str().to_string()),
            ),
            Notification::Paused { by } | Notification::Unpaused { by } => {
                (Some(by.to_string()), None, None, None)
            }
        };

        Ok(CollectedEvent {
            source: envelope.source.clone(),
            session: envelope.session.to_string(),
            sequence,
            event_type: envelope.notification.kind().to_string(),
            card_id,
            actor,
            counterparty,
            value,
            detail,
            emitted_at: envelope.emitted_at,
            payload: serde_json::to_string(&envelope.notification)?,
        })
    }
}

/// A raw event record as stored in / read from the database.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EventRecord {
    pub id: i64,
    pub source: String,
    pub session: String,
    pub sequence: i64,
    pub event_type: String,
    pub card_id: Option<i64>,
    pub actor: Option<String>,
    pub counterparty: Option<String>,
    pub value: Option<i64>,
    pub detail: Option<String>,
    pub emitted_at: i64,
    pub payload: String,
    pub received_at: i64,
}
