//! Google OAuth2 credential provider
//!
//! Exchanges a long-lived refresh credential for short-lived access tokens
//! usable against the Sheets API, and implements the interactive
//! authorization-code flow used by `bridgectl login` to mint refresh
//! credentials in the first place. Uses synchronous HTTP (ureq); failures
//! are never retried here, the caller decides whether to abort.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::time::Duration;

use log::{info, warn};
use serde::Deserialize;
use ureq::Agent;

use crate::config::GoogleCredentials;
use crate::error::{Error, Result};
use crate::sync::TokenRefresher;

/// Token response from Google
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    pub id_token: Option<String>,
}

/// Claims returned by the tokeninfo endpoint for an id token.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenInfo {
    pub email: Option<String>,
    /// Hosted domain, present for workspace accounts.
    pub hd: Option<String>,
    pub aud: Option<String>,
}

/// OAuth2 configuration and token exchange for the Google APIs.
pub struct GoogleAuth {
    client_id: String,
    client_secret: String,
    agent: Agent,
}

impl GoogleAuth {
    /// Google OAuth2 endpoints
    const AUTH_URL: &'static str = "https://accounts.google.com/o/oauth2/v2/auth";
    const TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";
    const TOKENINFO_URL: &'static str = "https://oauth2.googleapis.com/tokeninfo";

    /// Scopes requested at login: identity plus full Sheets access.
    const SCOPES: &'static str =
        "openid email profile https://www.googleapis.com/auth/spreadsheets";

    /// Port range to try for the local OAuth callback server
    const PORT_RANGE_START: u16 = 8080;
    const PORT_RANGE_END: u16 = 8090;

    pub fn new(credentials: GoogleCredentials) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(20)))
            .build()
            .new_agent();
        Self {
            client_id: credentials.client_id,
            client_secret: credentials.client_secret,
            agent,
        }
    }

    /// Exchange an authorization code for tokens.
    pub fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenResponse> {
        let mut response = self
            .agent
            .post(Self::TOKEN_URL)
            .send_form([
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri),
            ])
            .map_err(|e| Error::auth(format!("authorization code exchange failed: {}", e)))?;

        response
            .body_mut()
            .read_json()
            .map_err(|e| Error::auth(format!("malformed token response: {}", e)))
    }

    /// Exchange a refresh credential for a short-lived access token.
    pub fn refresh_access_token(&self, refresh_token: &str) -> Result<String> {
        let mut response = self
            .agent
            .post(Self::TOKEN_URL)
            .send_form([
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .map_err(|e| Error::auth(format!("access token refresh failed: {}", e)))?;

        let token: TokenResponse = response
            .body_mut()
            .read_json()
            .map_err(|e| Error::auth(format!("malformed token response: {}", e)))?;
        Ok(token.access_token)
    }

    /// Look up the claims of an id token (email, hosted domain).
    pub fn verify_id_token(&self, id_token: &str) -> Result<TokenInfo> {
        let url = format!(
            "{}?id_token={}",
            Self::TOKENINFO_URL,
            urlencoding::encode(id_token)
        );
        let mut response = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| Error::auth(format!("id token verification failed: {}", e)))?;

        response
            .body_mut()
            .read_json()
            .map_err(|e| Error::auth(format!("malformed tokeninfo response: {}", e)))
    }

    /// Perform the interactive authorization-code flow.
    ///
    /// Starts a local server for the callback, opens the consent URL
    /// (offline access, forced consent so a refresh token is issued), waits
    /// for the redirect and exchanges the code. When `allowed_domain` is
    /// set, the consent screen is pre-filtered to that hosted domain and
    /// the returned identity is checked against it.
    pub fn authorize_interactive(&self, allowed_domain: Option<&str>) -> Result<TokenResponse> {
        let (listener, port) = self.start_local_server()?;
        let redirect_uri = format!("http://localhost:{}", port);

        let mut auth_url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent&include_granted_scopes=true",
            Self::AUTH_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&redirect_uri),
            urlencoding::encode(Self::SCOPES),
        );
        if let Some(domain) = allowed_domain.filter(|d| !d.is_empty()) {
            auth_url.push_str("&hd=");
            auth_url.push_str(&urlencoding::encode(domain).into_owned());
        }

        info!("waiting for OAuth consent on {}", redirect_uri);
        println!("Opening browser for authentication...");
        println!("If the browser doesn't open, visit: {}", auth_url);
        if let Err(e) = open::that(&auth_url) {
            warn!("failed to open browser: {}", e);
        }

        let code = self.wait_for_callback(listener)?;
        let token = self.exchange_code(&code, &redirect_uri)?;

        if let Some(domain) = allowed_domain.filter(|d| !d.is_empty()) {
            let id_token = token
                .id_token
                .as_deref()
                .ok_or_else(|| Error::auth("no id token in OAuth response"))?;
            let claims = self.verify_id_token(id_token)?;
            if claims.hd.as_deref() != Some(domain) {
                return Err(Error::auth(format!(
                    "domain not allowed: {}",
                    claims.hd.unwrap_or_default()
                )));
            }
        }

        Ok(token)
    }

    /// Start a local TCP server on an available port
    fn start_local_server(&self) -> Result<(TcpListener, u16)> {
        for port in Self::PORT_RANGE_START..=Self::PORT_RANGE_END {
            if let Ok(listener) = TcpListener::bind(format!("127.0.0.1:{}", port)) {
                return Ok((listener, port));
            }
        }
        Err(Error::auth(format!(
            "could not bind to any port in range {}-{}",
            Self::PORT_RANGE_START,
            Self::PORT_RANGE_END
        )))
    }

    /// Wait for the OAuth callback and extract the authorization code
    fn wait_for_callback(&self, listener: TcpListener) -> Result<String> {
        let (mut stream, _) = listener
            .accept()
            .map_err(|e| Error::auth(format!("failed to accept OAuth callback: {}", e)))?;

        let mut reader = BufReader::new(&stream);
        let mut request_line = String::new();
        reader
            .read_line(&mut request_line)
            .map_err(|e| Error::auth(format!("failed to read OAuth callback: {}", e)))?;

        // Format: GET /?code=AUTH_CODE&scope=... HTTP/1.1
        let query_param = |name: &str| {
            request_line
                .split_whitespace()
                .nth(1)
                .and_then(|path| path.split('?').nth(1))
                .and_then(|query| {
                    query.split('&').find_map(|param| {
                        let mut parts = param.split('=');
                        if parts.next() == Some(name) {
                            parts.next().map(|s| s.to_string())
                        } else {
                            None
                        }
                    })
                })
        };
        let code = query_param("code");
        let error = query_param("error");

        let (status, body) = if code.is_some() {
            ("200 OK", "Login complete. You can close this window.")
        } else {
            ("400 Bad Request", "Login failed. Please try again.")
        };
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n<html><body><h1>{}</h1></body></html>",
            status, body
        );
        stream.write_all(response.as_bytes()).ok();

        if let Some(err) = error {
            return Err(Error::auth(format!("OAuth error: {}", err)));
        }
        code.ok_or_else(|| Error::auth("no authorization code received"))
    }
}

impl TokenRefresher for GoogleAuth {
    fn refresh_access_token(&self, refresh_token: &str) -> Result<String> {
        GoogleAuth::refresh_access_token(self, refresh_token)
    }
}
