//! Configuration loading for the sync service.
//!
//! All runtime options come from environment variables, resolved once into
//! plain structs. Google OAuth client credentials can also come from a JSON
//! file in the SheetBridge config directory (Google Cloud Console format).

use serde::Deserialize;

use crate::error::{Error, Result};

/// Credentials filename in the SheetBridge config directory
const CREDENTIALS_FILE: &str = "google-credentials.json";

/// Recognized sync options.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Hosted-domain restriction for interactive login; empty disables it.
    pub allowed_domain: String,
    /// Spreadsheet holding the pairing registry and the audit log.
    pub history_sheet_id: String,
    /// Tab name of the audit log.
    pub history_tab: String,
    /// Tab name of the pairing registry.
    pub pairs_tab: String,
    /// Per-run row cap for either direction.
    pub max_rows_per_sync: usize,
}

impl SyncConfig {
    pub const DEFAULT_MAX_ROWS: usize = 5000;

    /// Resolve the config from environment variables, with the same
    /// defaults for every entry point.
    pub fn from_env() -> Self {
        let max_rows = std::env::var("MAX_ROWS_PER_SYNC")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(Self::DEFAULT_MAX_ROWS);

        Self {
            allowed_domain: config::env_or("ALLOWED_DOMAIN", ""),
            history_sheet_id: config::env_or("HISTORY_SHEET_ID", ""),
            history_tab: config::env_or("HISTORY_TAB", "History"),
            pairs_tab: config::env_or("PAIRS_TAB", "Pairs"),
            max_rows_per_sync: max_rows,
        }
    }

    /// The registry/audit spreadsheet id, required for anything that touches
    /// the registry.
    pub fn require_history_sheet(&self) -> Result<&str> {
        if self.history_sheet_id.is_empty() {
            return Err(Error::config("HISTORY_SHEET_ID is not set"));
        }
        Ok(&self.history_sheet_id)
    }
}

/// The operator secret used to seal and unseal stored refresh credentials.
pub fn sync_secret() -> Result<String> {
    config::require_env("SYNC_SECRET").map_err(|e| Error::config(e.to_string()))
}

/// The operator refresh credential that unattended runs use to read the
/// pairing registry.
pub fn owner_refresh_token() -> Result<String> {
    config::require_env("SYNC_OWNER_REFRESH_TOKEN").map_err(|e| Error::config(e.to_string()))
}

/// OAuth client credentials for the Google token endpoint.
#[derive(Debug, Clone)]
pub struct GoogleCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Google Cloud Console credential file format (installed app)
#[derive(Deserialize)]
struct GoogleCredentialFile {
    installed: Option<ClientEntry>,
    web: Option<ClientEntry>,
}

#[derive(Deserialize)]
struct ClientEntry {
    client_id: String,
    client_secret: String,
}

impl GoogleCredentials {
    /// Load credentials, preferring the JSON file
    /// (~/.config/sheetbridge/google-credentials.json) over environment
    /// variables.
    pub fn load() -> Result<Self> {
        if config::config_exists(CREDENTIALS_FILE) {
            let file: GoogleCredentialFile = config::load_json(CREDENTIALS_FILE)
                .map_err(|e| Error::config(e.to_string()))?;
            return Self::from_credential_file(file);
        }
        Self::from_env()
    }

    /// Load credentials from environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            client_id: config::require_env("GOOGLE_CLIENT_ID")
                .map_err(|e| Error::config(e.to_string()))?,
            client_secret: config::require_env("GOOGLE_CLIENT_SECRET")
                .map_err(|e| Error::config(e.to_string()))?,
        })
    }

    /// Parse credentials from JSON string (Google Cloud Console format)
    pub fn from_json(json: &str) -> Result<Self> {
        let file: GoogleCredentialFile =
            serde_json::from_str(json).map_err(|e| Error::config(e.to_string()))?;
        Self::from_credential_file(file)
    }

    fn from_credential_file(file: GoogleCredentialFile) -> Result<Self> {
        // Support both "installed" (desktop) and "web" credential types
        let entry = file
            .installed
            .or(file.web)
            .ok_or_else(|| Error::config("credentials file missing 'installed' or 'web' section"))?;
        Ok(Self {
            client_id: entry.client_id,
            client_secret: entry.client_secret,
        })
    }
}

/// App credentials and API host for the Lark/Feishu open platform.
#[derive(Debug, Clone)]
pub struct LarkCredentials {
    pub app_id: String,
    pub app_secret: String,
    /// Feishu tenants use `https://open.feishu.cn`, Lark tenants
    /// `https://open.larksuite.com`.
    pub api_base: String,
}

impl LarkCredentials {
    pub const DEFAULT_API_BASE: &'static str = "https://open.feishu.cn";

    pub fn from_env() -> Result<Self> {
        Ok(Self {
            app_id: config::require_env("LARK_APP_ID").map_err(|e| Error::config(e.to_string()))?,
            app_secret: config::require_env("LARK_APP_SECRET")
                .map_err(|e| Error::config(e.to_string()))?,
            api_base: config::env_or("LARK_OPEN_API_BASE", Self::DEFAULT_API_BASE),
        })
    }
}
