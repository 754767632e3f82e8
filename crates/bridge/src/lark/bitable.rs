//! Lark Bitable API client
//!
//! Provides the record-table bulk operations: cursor-paginated full
//! listings, per-record delete and per-record create. There is no reliance
//! on a bulk-delete endpoint because it is not enabled for every tenant.
//! Deletes and creates are paced with a short pause every Nth request as
//! simple client-side rate limiting; there is no retry or backoff, a
//! rejected request surfaces as an ordinary failure.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use log::debug;
use serde::Deserialize;
use ureq::Agent;

use crate::config::LarkCredentials;
use crate::error::{Error, Result};
use crate::models::{FieldMap, Record};
use crate::store::RecordStore;

/// Client-side pacing for sequential bulk loops.
#[derive(Debug, Clone, Copy)]
pub struct PacingPolicy {
    /// Pause after every `every`-th request.
    pub every: usize,
    /// Length of the pause.
    pub pause: Duration,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            every: 20,
            pause: Duration::from_millis(120),
        }
    }
}

impl PacingPolicy {
    /// A policy that never sleeps (tests).
    pub fn none() -> Self {
        Self {
            every: usize::MAX,
            pause: Duration::ZERO,
        }
    }

    fn maybe_pause(&self, index: usize) {
        if index % self.every == 0 && !self.pause.is_zero() {
            std::thread::sleep(self.pause);
        }
    }
}

/// Cached tenant access token with its expiry.
#[derive(Debug, Default)]
struct TenantToken {
    token: String,
    expires_at: Option<Instant>,
}

/// Response envelope common to the open-platform endpoints.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct TenantTokenResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    tenant_access_token: Option<String>,
    /// Validity in seconds.
    expire: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ListPage {
    #[serde(default)]
    items: Option<Vec<Record>>,
    #[serde(default)]
    page_token: Option<String>,
}

/// Bitable API client for one app tenant.
pub struct BitableClient {
    credentials: LarkCredentials,
    agent: Agent,
    pacing: PacingPolicy,
    /// Tenant-scoped token shared by every call through this client. The
    /// mutex matters if callers ever run pairings concurrently.
    tenant: Mutex<TenantToken>,
}

impl BitableClient {
    /// Page size for record listings
    const PAGE_SIZE: usize = 500;
    /// Hard cap on pages per listing (~100k records); beyond it the listing
    /// truncates silently instead of looping unbounded.
    const MAX_PAGES: usize = 200;
    /// Refresh the tenant token when less than this much validity remains.
    const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

    pub fn new(credentials: LarkCredentials) -> Self {
        Self::with_pacing(credentials, PacingPolicy::default())
    }

    pub fn with_pacing(credentials: LarkCredentials, pacing: PacingPolicy) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(30)))
            .build()
            .new_agent();
        Self {
            credentials,
            agent,
            pacing,
            tenant: Mutex::new(TenantToken::default()),
        }
    }

    fn records_url(&self, base_id: &str, table_id: &str) -> String {
        format!(
            "{}/open-apis/bitable/v1/apps/{}/tables/{}/records",
            self.credentials.api_base,
            urlencoding::encode(base_id),
            urlencoding::encode(table_id)
        )
    }

    /// Get a tenant access token, reusing the cached one while it has more
    /// than a minute of validity left.
    fn tenant_token(&self) -> Result<String> {
        let mut cached = self.tenant.lock().unwrap();
        if !cached.token.is_empty()
            && let Some(expires_at) = cached.expires_at
            && Instant::now() + Self::EXPIRY_MARGIN < expires_at
        {
            return Ok(cached.token.clone());
        }

        let url = format!(
            "{}/open-apis/auth/v3/tenant_access_token/internal",
            self.credentials.api_base
        );
        let mut response = self
            .agent
            .post(&url)
            .send_json(serde_json::json!({
                "app_id": self.credentials.app_id,
                "app_secret": self.credentials.app_secret,
            }))
            .map_err(|e| Error::auth(format!("tenant token request failed: {}", e)))?;

        let body: TenantTokenResponse = response
            .body_mut()
            .read_json()
            .map_err(|e| Error::auth(format!("malformed tenant token response: {}", e)))?;

        if body.code != 0 {
            return Err(Error::auth(format!(
                "tenant token rejected: {} (code {})",
                body.msg, body.code
            )));
        }
        let token = body
            .tenant_access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::auth("tenant access token missing from response"))?;

        cached.token = token.clone();
        cached.expires_at =
            Some(Instant::now() + Duration::from_secs(body.expire.unwrap_or(3600)));
        Ok(token)
    }

    fn list_page(
        &self,
        token: &str,
        base_id: &str,
        table_id: &str,
        page_token: Option<&str>,
    ) -> Result<ListPage> {
        let mut url = format!(
            "{}?page_size={}",
            self.records_url(base_id, table_id),
            Self::PAGE_SIZE
        );
        if let Some(cursor) = page_token.filter(|c| !c.is_empty()) {
            url.push_str("&page_token=");
            url.push_str(&urlencoding::encode(cursor).into_owned());
        }

        let mut response = self
            .agent
            .get(&url)
            .header("Authorization", &format!("Bearer {}", token))
            .call()?;
        let body: ApiEnvelope<ListPage> = response.body_mut().read_json()?;
        if body.code != 0 {
            return Err(Error::upstream(format!(
                "record listing failed: {} (code {})",
                body.msg, body.code
            )));
        }
        Ok(body.data.unwrap_or(ListPage {
            items: None,
            page_token: None,
        }))
    }

    fn delete_record(&self, token: &str, base_id: &str, table_id: &str, id: &str) -> Result<()> {
        let url = format!(
            "{}/{}",
            self.records_url(base_id, table_id),
            urlencoding::encode(id)
        );
        let mut response = self
            .agent
            .delete(&url)
            .header("Authorization", &format!("Bearer {}", token))
            .call()?;
        let body: ApiEnvelope<serde_json::Value> = response.body_mut().read_json()?;
        if body.code != 0 {
            return Err(Error::upstream(format!(
                "record delete failed: {} (code {})",
                body.msg, body.code
            )));
        }
        Ok(())
    }

    fn create_record(
        &self,
        token: &str,
        base_id: &str,
        table_id: &str,
        fields: &FieldMap,
    ) -> Result<()> {
        let url = self.records_url(base_id, table_id);
        let mut response = self
            .agent
            .post(&url)
            .header("Authorization", &format!("Bearer {}", token))
            .send_json(serde_json::json!({ "fields": fields }))?;
        let body: ApiEnvelope<serde_json::Value> = response.body_mut().read_json()?;
        if body.code != 0 {
            return Err(Error::upstream(format!(
                "record create failed: {} (code {})",
                body.msg, body.code
            )));
        }
        Ok(())
    }
}

impl RecordStore for BitableClient {
    fn list_all(&self, base_id: &str, table_id: &str) -> Result<Vec<Record>> {
        let token = self.tenant_token()?;
        let mut records: Vec<Record> = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..Self::MAX_PAGES {
            let page = self.list_page(&token, base_id, table_id, cursor.as_deref())?;
            if let Some(items) = page.items {
                records.extend(items);
            }
            match page.page_token.filter(|t| !t.is_empty()) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        // Pagination order is not guaranteed stable; creation time is.
        records.sort_by_key(|r| r.created_time);
        debug!("listed {} records from {}/{}", records.len(), base_id, table_id);
        Ok(records)
    }

    fn delete_all(&self, base_id: &str, table_id: &str) -> Result<usize> {
        let token = self.tenant_token()?;
        let ids: Vec<String> = self
            .list_all(base_id, table_id)?
            .into_iter()
            .map(|r| r.record_id)
            .filter(|id| !id.is_empty())
            .collect();

        for (i, id) in ids.iter().enumerate() {
            self.pacing.maybe_pause(i);
            self.delete_record(&token, base_id, table_id, id)?;
        }
        debug!("deleted {} records from {}/{}", ids.len(), base_id, table_id);
        Ok(ids.len())
    }

    fn create_sequential(&self, base_id: &str, table_id: &str, rows: &[FieldMap]) -> Result<usize> {
        let token = self.tenant_token()?;
        for (i, fields) in rows.iter().enumerate() {
            self.pacing.maybe_pause(i);
            self.create_record(&token, base_id, table_id, fields)?;
        }
        debug!("created {} records in {}/{}", rows.len(), base_id, table_id);
        Ok(rows.len())
    }
}
