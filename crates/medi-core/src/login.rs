//! Login activity records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AccountId, LoginRecordId};

/// One sign-in event for an account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRecord {
    /// Store-assigned reference.
    pub id: LoginRecordId,
    /// Account that signed in.
    pub user_id: AccountId,
    /// When the sign-in happened.
    pub login_at: DateTime<Utc>,
    /// Client address, when the identity provider reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// Raw `User-Agent` of the signing-in client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl LoginRecord {
    /// Coarse device class derived from the user agent.
    pub fn device(&self) -> DeviceKind {
        DeviceKind::from_user_agent(self.user_agent.as_deref())
    }
}

/// Coarse device classification shown in the login history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// User agent mentions `Mobile`.
    Mobile,
    /// User agent mentions `Tablet`.
    Tablet,
    /// Any other user agent.
    Desktop,
    /// No user agent recorded.
    Unknown,
}

impl DeviceKind {
    /// Classify a user agent string. `Mobile` wins over `Tablet`.
    pub fn from_user_agent(user_agent: Option<&str>) -> Self {
        match user_agent {
            None => Self::Unknown,
            Some(ua) if ua.contains("Mobile") => Self::Mobile,
            Some(ua) if ua.contains("Tablet") => Self::Tablet,
            Some(_) => Self::Desktop,
        }
    }

    /// Display label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Mobile => "Mobile Device",
            Self::Tablet => "Tablet",
            Self::Desktop => "Desktop",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
