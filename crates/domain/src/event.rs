//! Events handed to the store and the rows persisted for them.

use std::str::FromStr;

use logstore_core::{AppError, NonEmptyString};
use serde::{Deserialize, Serialize};

use crate::codec::{self, CodecError, PayloadFormat};
use crate::{EventPayload, derive_policy_key};

/// Kind of data operation an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Crud {
    /// Something was created.
    Create,
    /// Something was read.
    Read,
    /// Something was updated.
    Update,
    /// Something was deleted.
    Delete,
}

impl Crud {
    /// Returns the one-letter storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "c",
            Self::Read => "r",
            Self::Update => "u",
            Self::Delete => "d",
        }
    }
}

impl FromStr for Crud {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "c" => Ok(Self::Create),
            "r" => Ok(Self::Read),
            "u" => Ok(Self::Update),
            "d" => Ok(Self::Delete),
            _ => Err(AppError::Validation(format!("unknown crud value '{value}'"))),
        }
    }
}

/// Educational significance of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EducationLevel {
    /// Administrative or system activity.
    Other,
    /// Activity by a teacher.
    Teaching,
    /// Activity by a learner.
    Participating,
}

impl EducationLevel {
    /// Returns the numeric storage value.
    #[must_use]
    pub fn as_i16(&self) -> i16 {
        match self {
            Self::Other => 0,
            Self::Teaching => 1,
            Self::Participating => 2,
        }
    }
}

impl TryFrom<i16> for EducationLevel {
    type Error = AppError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Other),
            1 => Ok(Self::Teaching),
            2 => Ok(Self::Participating),
            _ => Err(AppError::Validation(format!(
                "unknown education level '{value}'"
            ))),
        }
    }
}

/// Fields that describe what happened.
#[derive(Debug, Clone, PartialEq)]
pub struct EventData {
    /// Fully-qualified event type name, e.g. `\core\event\user_loggedin`.
    pub event_name: NonEmptyString,
    /// Component that emitted the event.
    pub component: String,
    /// Verb of the event.
    pub action: String,
    /// Object kind the action applied to.
    pub target: String,
    /// Table of the affected object, if any.
    pub object_table: Option<String>,
    /// Identifier of the affected object, if any.
    pub object_id: Option<i64>,
    /// Data operation kind.
    pub crud: Crud,
    /// Educational significance.
    pub edu_level: EducationLevel,
    /// Context the event happened in.
    pub context_id: i64,
    /// Acting user; zero when nobody is logged in.
    pub user_id: i64,
    /// User affected by the action, if any.
    pub related_user_id: Option<i64>,
    /// Whether the actor must not be revealed.
    pub anonymous: bool,
    /// Auxiliary payload.
    pub other: EventPayload,
    /// Creation time in unix seconds.
    pub time_created: i64,
}

/// Storage-only fields kept out of the event data proper.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventExtra {
    /// Request origin such as `web`, `cli` or `ws`.
    pub origin: Option<String>,
    /// Client IP address.
    pub ip: Option<String>,
    /// Actual actor when the user was impersonated.
    pub real_user_id: Option<i64>,
}

/// Event as delivered by the dispatcher or rehydrated from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    /// What happened.
    pub data: EventData,
    /// Where it came from.
    pub extra: EventExtra,
}

impl LogEvent {
    /// Returns the policy key for this event's type.
    #[must_use]
    pub fn policy_key(&self) -> String {
        derive_policy_key(self.data.event_name.as_str())
    }
}

/// Persisted columns of one log row, without the storage-assigned id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Fully-qualified event type name.
    pub event_name: String,
    /// Component that emitted the event.
    pub component: String,
    /// Verb of the event.
    pub action: String,
    /// Object kind the action applied to.
    pub target: String,
    /// Table of the affected object.
    pub object_table: Option<String>,
    /// Identifier of the affected object.
    pub object_id: Option<i64>,
    /// Data operation kind.
    pub crud: Crud,
    /// Educational significance.
    pub edu_level: EducationLevel,
    /// Context the event happened in.
    pub context_id: i64,
    /// Acting user.
    pub user_id: i64,
    /// Affected user.
    pub related_user_id: Option<i64>,
    /// Whether the actor must not be revealed.
    pub anonymous: bool,
    /// Encoded auxiliary payload.
    pub other: String,
    /// Creation time in unix seconds.
    pub time_created: i64,
    /// Request origin.
    pub origin: Option<String>,
    /// Client IP address.
    pub ip: Option<String>,
    /// Actual actor under impersonation.
    pub real_user_id: Option<i64>,
    /// Policy key derived from `event_name` at write time.
    pub config_name: String,
}

impl LogEntry {
    /// Builds the row for an event, encoding its payload and stamping the
    /// policy key.
    pub fn from_event(event: LogEvent, format: PayloadFormat) -> Result<Self, CodecError> {
        let config_name = event.policy_key();
        let LogEvent { data, extra } = event;
        let other = codec::encode(&data.other, format)?;

        Ok(Self {
            event_name: data.event_name.into(),
            component: data.component,
            action: data.action,
            target: data.target,
            object_table: data.object_table,
            object_id: data.object_id,
            crud: data.crud,
            edu_level: data.edu_level,
            context_id: data.context_id,
            user_id: data.user_id,
            related_user_id: data.related_user_id,
            anonymous: data.anonymous,
            other,
            time_created: data.time_created,
            origin: extra.origin,
            ip: extra.ip,
            real_user_id: extra.real_user_id,
            config_name,
        })
    }

    /// Splits the row into event data and the storage-only extra bundle,
    /// using an already decoded payload. Fails only for an empty event name.
    pub fn into_event(self, other: EventPayload) -> Result<LogEvent, AppError> {
        Ok(LogEvent {
            data: EventData {
                event_name: NonEmptyString::new(self.event_name)?,
                component: self.component,
                action: self.action,
                target: self.target,
                object_table: self.object_table,
                object_id: self.object_id,
                crud: self.crud,
                edu_level: self.edu_level,
                context_id: self.context_id,
                user_id: self.user_id,
                related_user_id: self.related_user_id,
                anonymous: self.anonymous,
                other,
                time_created: self.time_created,
            },
            extra: EventExtra {
                origin: self.origin,
                ip: self.ip,
                real_user_id: self.real_user_id,
            },
        })
    }
}

/// A persisted log row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Storage-assigned, monotonically increasing identifier.
    pub id: i64,
    /// Row columns.
    pub entry: LogEntry,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use logstore_core::NonEmptyString;

    use super::{Crud, EducationLevel, EventData, EventExtra, LogEntry, LogEvent};
    use crate::codec::PayloadFormat;
    use crate::{EventPayload, PayloadValue};

    fn event() -> Option<LogEvent> {
        Some(LogEvent {
            data: EventData {
                event_name: NonEmptyString::new("\\core\\event\\course_viewed").ok()?,
                component: "core".to_owned(),
                action: "viewed".to_owned(),
                target: "course".to_owned(),
                object_table: None,
                object_id: None,
                crud: Crud::Read,
                edu_level: EducationLevel::Participating,
                context_id: 15,
                user_id: 4,
                related_user_id: None,
                anonymous: false,
                other: EventPayload::new().with("section", PayloadValue::Integer(2)),
                time_created: 1_700_000_000,
            },
            extra: EventExtra {
                origin: Some("web".to_owned()),
                ip: Some("10.0.0.1".to_owned()),
                real_user_id: Some(2),
            },
        })
    }

    #[test]
    fn crud_roundtrip_storage_value() {
        for crud in [Crud::Create, Crud::Read, Crud::Update, Crud::Delete] {
            assert_eq!(Crud::from_str(crud.as_str()).ok(), Some(crud));
        }
        assert!(Crud::from_str("x").is_err());
    }

    #[test]
    fn education_level_rejects_unknown_values() {
        assert_eq!(
            EducationLevel::try_from(1).ok(),
            Some(EducationLevel::Teaching)
        );
        assert!(EducationLevel::try_from(7).is_err());
    }

    #[test]
    fn entry_stamps_policy_key_and_encodes_payload() {
        let Some(event) = event() else {
            panic!("fixture event should build");
        };
        let entry = LogEntry::from_event(event.clone(), PayloadFormat::Json);
        assert!(entry.is_ok());
        let Ok(entry) = entry else {
            return;
        };

        assert_eq!(entry.config_name, "core_event_course_viewed");
        assert_eq!(entry.other, r#"{"section":2}"#);

        let restored = entry.into_event(event.data.other.clone());
        assert_eq!(restored.ok(), Some(event));
    }
}
