use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A PDF listed from the Drive folder.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
    #[serde(rename = "webViewLink", default)]
    pub web_view_link: String,
}

#[derive(Deserialize, Debug, Default)]
pub struct FileListResp {
    #[serde(default)]
    pub files: Vec<RemoteFile>,
}

/// OAuth credential for the Drive API, persisted between runs.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".into()
}

/// Tokens expiring within this window are treated as already expired.
const EXPIRY_SKEW_SECS: i64 = 60;

impl Credential {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        match self.expires_at {
            Some(at) => at - Duration::seconds(EXPIRY_SKEW_SECS) > now,
            None => true,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token
            .as_deref()
            .map_or(false, |t| !t.is_empty())
    }

    /// Build a credential from a token endpoint response. `previous_refresh`
    /// is kept when the endpoint does not rotate the refresh token.
    pub fn from_token_response(
        resp: TokenResp,
        previous_refresh: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: resp.access_token,
            refresh_token: resp.refresh_token.or(previous_refresh),
            expires_at: resp.expires_in.map(|secs| now + Duration::seconds(secs)),
            token_type: resp.token_type.unwrap_or_else(default_token_type),
            scope: resp.scope,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("expires_at", &self.expires_at)
            .field("has_refresh_token", &self.can_refresh())
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize, Debug)]
pub struct TokenResp {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// OAuth client registration as downloaded from the Google Cloud console.
#[derive(Deserialize, Clone)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".into()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".into()
}

impl fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSecret")
            .field("client_id", &self.client_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

/// The secrets file wraps the registration under `installed` or `web`.
#[derive(Deserialize)]
pub struct ClientSecretFile {
    pub installed: Option<ClientSecret>,
    pub web: Option<ClientSecret>,
}

impl ClientSecretFile {
    pub fn into_secret(self) -> Option<ClientSecret> {
        self.installed.or(self.web)
    }
}
