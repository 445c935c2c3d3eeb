//! Payloads of the butlerd calls issued by the probe

use serde::{Deserialize, Deserializer, Serialize};

use crate::secret::Secret;

/// Method names
pub mod methods {
    /// Authenticates a TCP connection; must precede every other call
    pub const META_AUTHENTICATE: &str = "Meta.Authenticate";
    /// Lists the itch.io profiles known to the local database
    pub const PROFILE_LIST: &str = "Profile.List";
}

/// Parameters of `Meta.Authenticate`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticateParams {
    pub secret: Secret,
}

/// Result of `Profile.List`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileList {
    pub profiles: Vec<Profile>,
}

/// A profile remembered by the daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// itch.io user ID of the profile
    pub id: i64,
    /// User the profile belongs to
    pub user: User,
    /// RFC 3339 timestamp of the last login, empty if unknown
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub last_connected: String,
}

/// itch.io user attached to a profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub display_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
}

impl Profile {
    /// Name shown in reports: the display name, or the username if blank
    pub fn label(&self) -> &str {
        if self.user.display_name.is_empty() {
            &self.user.username
        } else {
            &self.user.display_name
        }
    }
}

/// Deserialize `null` as the type's default value
fn deserialize_null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(|opt| opt.unwrap_or_default())
}
