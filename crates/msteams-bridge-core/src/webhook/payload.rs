//! Inbound Bot Framework activity payloads and card action values.

use crate::{GroupId, TeamId, UserId};
use serde::{Deserialize, Deserializer, Serialize};

/// Sentinel `assignInput` meaning "assign to the acting user"
pub const ASSIGN_TO_ME: &str = "ME";

/// Prefix of a team assignment target, `team:<id>`
pub const TEAM_ASSIGNEE_PREFIX: &str = "team:";

/// The only `resolveInput` that resolves a group
pub const RESOLVE_SENTINEL: &str = "resolved";

/// `ignoreInput` meaning "ignore indefinitely"
pub const IGNORE_FOREVER_SENTINEL: &str = "-1";

/// Bot Framework activity as posted to the webhook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub activity_type: String,

    pub from: ChannelAccount,

    #[serde(default)]
    pub channel_data: ChannelData,

    #[serde(default)]
    pub service_url: Option<String>,

    /// Card submit data; absent for plain chat messages
    #[serde(default)]
    pub value: Option<ActionValue>,
}

impl Activity {
    pub fn is_message(&self) -> bool {
        self.activity_type == "message"
    }

    pub fn team_id(&self) -> Option<&str> {
        self.channel_data.team.as_ref().map(|t| t.id.as_str())
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.channel_data.tenant.as_ref().map(|t| t.id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAccount {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRef {
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelData {
    #[serde(default)]
    pub team: Option<ChannelRef>,

    #[serde(default)]
    pub tenant: Option<ChannelRef>,
}

/// Data submitted by an issue card action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionValue {
    /// Number or numeric string, depending on how the card was rendered
    #[serde(default)]
    pub group_id: serde_json::Value,

    #[serde(default, deserialize_with = "scalar_as_string")]
    pub action_type: Option<String>,

    #[serde(default, deserialize_with = "scalar_as_string")]
    pub resolve_input: Option<String>,

    #[serde(default, deserialize_with = "scalar_as_string")]
    pub ignore_input: Option<String>,

    #[serde(default, deserialize_with = "scalar_as_string")]
    pub assign_input: Option<String>,
}

/// Accept a string, number or boolean as its string form
///
/// Cards render inputs either way; objects and arrays read as absent.
fn scalar_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

impl ActionValue {
    pub fn group_id(&self) -> Option<GroupId> {
        match &self.group_id {
            serde_json::Value::Number(n) => n.as_u64().map(GroupId::new),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn action_type(&self) -> ActionType {
        ActionType::parse(self.action_type.as_deref())
    }
}

/// Requested mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionType {
    Resolve,
    Ignore,
    Assign,
    /// Any other value, including a missing one
    Unrecognized(String),
}

impl ActionType {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("resolve") => Self::Resolve,
            Some("ignore") => Self::Ignore,
            Some("assign") => Self::Assign,
            Some(other) => Self::Unrecognized(other.to_string()),
            None => Self::Unrecognized(String::new()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Resolve => "resolve",
            Self::Ignore => "ignore",
            Self::Assign => "assign",
            Self::Unrecognized(raw) => raw,
        }
    }
}

/// Parsed `assignInput`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignTarget {
    Me,
    Team(TeamId),
    User(UserId),
    Unrecognized(String),
}

impl AssignTarget {
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::Unrecognized(String::new());
        };

        if raw == ASSIGN_TO_ME {
            return Self::Me;
        }

        if let Some(team) = raw.strip_prefix(TEAM_ASSIGNEE_PREFIX) {
            return match team.parse() {
                Ok(team_id) => Self::Team(team_id),
                Err(_) => Self::Unrecognized(raw.to_string()),
            };
        }

        match raw.parse() {
            Ok(user_id) => Self::User(user_id),
            Err(_) => Self::Unrecognized(raw.to_string()),
        }
    }
}

/// Parsed `resolveInput`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveInput {
    Resolved,
    /// e.g. "resolved in next release"; accepted but not acted on
    Reserved(String),
}

impl ResolveInput {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(RESOLVE_SENTINEL) => Self::Resolved,
            other => Self::Reserved(other.unwrap_or_default().to_string()),
        }
    }
}

/// Parsed `ignoreInput`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreInput {
    Forever,
    /// Timed/counted ignore values; the group is still ignored
    Reserved(String),
}

impl IgnoreInput {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(IGNORE_FOREVER_SENTINEL) => Self::Forever,
            other => Self::Reserved(other.unwrap_or_default().to_string()),
        }
    }
}

#[cfg(test)]
#[path = "payload_tests.rs"]
mod tests;
