//! Batch orchestration over pairings
//!
//! Two entry points: [`run_unattended`] reads the registry with the
//! operator's credential and syncs every active, eligible pairing;
//! [`run_manual`] syncs caller-supplied pairings with caller-supplied
//! credentials. Both isolate failures per pairing, append an audit row for
//! every attempt a grid client exists for, and report per-pairing outcomes
//! rather than aborting the batch.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::SyncConfig;
use crate::crypto;
use crate::error::{Error, Result};
use crate::history::{AuditEntry, AuditStatus, HistoryLog};
use crate::links;
use crate::models::{Direction, Pairing, SyncResult};
use crate::registry::PairsRegistry;
use crate::store::{GridStore, RecordStore};
use crate::sync::engine::{SyncOptions, sync_pair};

/// Exchanges a long-lived refresh credential for a short-lived access token.
pub trait TokenRefresher: Send + Sync {
    fn refresh_access_token(&self, refresh_token: &str) -> Result<String>;
}

/// Builds a grid store bound to one access token.
pub trait GridStoreFactory: Send + Sync {
    fn for_token(&self, access_token: &str) -> Result<Box<dyn GridStore>>;
}

/// Everything a batch run needs, behind trait objects so tests can swap in
/// in-memory stores.
pub struct BatchContext<'a> {
    pub config: &'a SyncConfig,
    pub auth: &'a dyn TokenRefresher,
    pub grids: &'a dyn GridStoreFactory,
    pub records: &'a dyn RecordStore,
    pub options: SyncOptions,
}

/// One caller-supplied pairing for a manual run.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManualPair {
    pub sheet_url: String,
    pub sheet_id: String,
    #[serde(alias = "larkUrl")]
    pub base_url: String,
    pub base_id: String,
    pub table_id: String,
    /// Wire string; anything unrecognized falls back to the default.
    pub direction: String,
    pub refresh_token: String,
    /// Registry row to reconcile against and stamp on success.
    pub row_id: Option<usize>,
    #[serde(alias = "userEmail")]
    pub user: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PairStatus {
    Success,
    Error,
}

/// Outcome of one pairing within a batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairOutcome {
    pub status: PairStatus,
    /// The sheet URL identifying the pairing (unattended runs).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pair: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PairOutcome {
    fn success(pair: Option<String>, result: &SyncResult) -> Self {
        Self {
            status: PairStatus::Success,
            pair,
            row_count: Some(result.row_count),
            truncated: Some(result.truncated),
            error: None,
        }
    }

    fn failure(pair: Option<String>, error: &Error) -> Self {
        Self {
            status: PairStatus::Error,
            pair,
            row_count: None,
            truncated: None,
            error: Some(error.to_string()),
        }
    }
}

/// Report for a whole batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub processed: usize,
    pub results: Vec<PairOutcome>,
}

/// A pairing with its identifiers resolved and validated.
#[derive(Debug)]
struct ResolvedPair {
    sheet_id: String,
    base_id: String,
    table_id: String,
    direction: Direction,
}

/// Fill in missing identifiers from the pairing's URLs; explicit ids win.
fn resolve(
    sheet_url: &str,
    sheet_id: &str,
    base_url: &str,
    base_id: &str,
    table_id: &str,
    direction: Direction,
) -> Result<ResolvedPair> {
    let sheet_id = if sheet_id.is_empty() {
        links::parse_sheet_id(sheet_url)
    } else {
        sheet_id.to_string()
    };
    if sheet_id.is_empty() {
        return Err(Error::validation("invalid Google Sheet URL"));
    }

    let parsed = links::parse_base_ref(base_url);
    let base_id = if base_id.is_empty() {
        parsed.base_id
    } else {
        base_id.to_string()
    };
    let table_id = if table_id.is_empty() {
        parsed.table_id
    } else {
        table_id.to_string()
    };
    if base_id.is_empty() || table_id.is_empty() {
        return Err(Error::validation(
            "invalid base URL (expected /base/<baseId>?table=<tableId>)",
        ));
    }

    Ok(ResolvedPair {
        sheet_id,
        base_id,
        table_id,
        direction,
    })
}

fn append_audit(
    history: &HistoryLog,
    sheet_url: &str,
    base_url: &str,
    direction: Direction,
    actor: &str,
    row_count: usize,
    status: AuditStatus,
    error: &str,
) {
    let entry = AuditEntry {
        sheet_url,
        base_url,
        direction,
        actor,
        row_count,
        status,
        error,
    };
    // A failed audit write must not fail the pairing it describes.
    if let Err(e) = history.append_attempt(&entry) {
        warn!("failed to append audit row for {}: {}", sheet_url, e);
    }
}

/// Sync every active, eligible pairing in the registry.
///
/// The operator's refresh credential reads the registry and writes the
/// audit log; each pairing's own sealed credential is unsealed with
/// `secret` and used for that pairing's sheet access. A pairing failing at
/// any step (unsealing, refresh, resolution, sync) is recorded and skipped,
/// never aborting the rest of the batch.
pub fn run_unattended(
    ctx: &BatchContext,
    owner_refresh_token: &str,
    secret: &str,
) -> Result<BatchReport> {
    let history_sheet = ctx.config.require_history_sheet()?;
    let owner_access = ctx.auth.refresh_access_token(owner_refresh_token)?;
    let owner_grid = ctx.grids.for_token(&owner_access)?;
    let registry = PairsRegistry::new(owner_grid.as_ref(), history_sheet, &ctx.config.pairs_tab);
    let history = HistoryLog::new(owner_grid.as_ref(), history_sheet, &ctx.config.history_tab);

    let pairings: Vec<Pairing> = registry
        .read_pairings()?
        .into_iter()
        .filter(|p| p.active && p.is_eligible(true))
        .collect();
    info!("unattended run: {} eligible pairings", pairings.len());

    let mut results = Vec::with_capacity(pairings.len());
    for pairing in &pairings {
        let actor = if pairing.owner.is_empty() {
            "cron"
        } else {
            pairing.owner.as_str()
        };
        match sync_one_sealed(ctx, pairing, secret) {
            Ok(result) => {
                if let Err(e) = registry.update_last_synced(pairing.row_id) {
                    warn!(
                        "failed to stamp last-synced for registry row {}: {}",
                        pairing.row_id, e
                    );
                }
                append_audit(
                    &history,
                    &pairing.sheet_url,
                    &pairing.base_url,
                    pairing.direction,
                    actor,
                    result.row_count,
                    AuditStatus::Success,
                    "",
                );
                results.push(PairOutcome::success(Some(pairing.sheet_url.clone()), &result));
            }
            Err(e) => {
                warn!("registry row {} failed: {}", pairing.row_id, e);
                append_audit(
                    &history,
                    &pairing.sheet_url,
                    &pairing.base_url,
                    pairing.direction,
                    actor,
                    0,
                    AuditStatus::Error,
                    &e.to_string(),
                );
                results.push(PairOutcome::failure(Some(pairing.sheet_url.clone()), &e));
            }
        }
    }

    Ok(BatchReport {
        processed: results.len(),
        results,
    })
}

/// One unattended pairing: unseal its credential, mint a token, sync.
fn sync_one_sealed(ctx: &BatchContext, pairing: &Pairing, secret: &str) -> Result<SyncResult> {
    let resolved = resolve(
        &pairing.sheet_url,
        &pairing.sheet_id,
        &pairing.base_url,
        &pairing.base_id,
        &pairing.table_id,
        pairing.direction,
    )?;
    let refresh_token = crypto::unseal(&pairing.credential_enc, secret)?;
    let access_token = ctx.auth.refresh_access_token(&refresh_token)?;
    let grid = ctx.grids.for_token(&access_token)?;
    sync_pair(
        grid.as_ref(),
        ctx.records,
        &resolved.sheet_id,
        &resolved.base_id,
        &resolved.table_id,
        resolved.direction,
        &ctx.options,
    )
}

/// Sync caller-supplied pairings with caller-supplied refresh credentials.
///
/// Audit rows are written with the caller's own token, so a pairing that
/// fails before a token exists (missing or rejected credential) is reported
/// in the outcome list but leaves no audit row.
pub fn run_manual(ctx: &BatchContext, pairs: &[ManualPair]) -> Result<BatchReport> {
    if pairs.is_empty() {
        return Err(Error::validation("no pairs supplied"));
    }
    info!("manual run: {} pairings", pairs.len());

    let mut results = Vec::with_capacity(pairs.len());
    for pair in pairs {
        let actor = if pair.user.is_empty() {
            "manual"
        } else {
            pair.user.as_str()
        };
        let direction = Direction::parse(&pair.direction);

        let grid = match acquire_grid(ctx, pair) {
            Ok(grid) => grid,
            Err(e) => {
                warn!("manual pairing {} skipped: {}", pair.sheet_url, e);
                results.push(PairOutcome::failure(None, &e));
                continue;
            }
        };

        let attempt = sync_one_manual(ctx, grid.as_ref(), pair, direction);
        match &attempt {
            Ok(result) => {
                if let Some(history_sheet) = audit_sheet(ctx) {
                    let history =
                        HistoryLog::new(grid.as_ref(), history_sheet, &ctx.config.history_tab);
                    append_audit(
                        &history,
                        &pair.sheet_url,
                        &pair.base_url,
                        direction,
                        actor,
                        result.row_count,
                        AuditStatus::Success,
                        "",
                    );
                    if let Some(row_id) = pair.row_id {
                        let registry =
                            PairsRegistry::new(grid.as_ref(), history_sheet, &ctx.config.pairs_tab);
                        if let Err(e) = registry.update_last_synced(row_id) {
                            warn!("failed to stamp last-synced for row {}: {}", row_id, e);
                        }
                    }
                }
                results.push(PairOutcome::success(None, result));
            }
            Err(e) => {
                warn!("manual pairing {} failed: {}", pair.sheet_url, e);
                if let Some(history_sheet) = audit_sheet(ctx) {
                    let history =
                        HistoryLog::new(grid.as_ref(), history_sheet, &ctx.config.history_tab);
                    append_audit(
                        &history,
                        &pair.sheet_url,
                        &pair.base_url,
                        direction,
                        actor,
                        0,
                        AuditStatus::Error,
                        &e.to_string(),
                    );
                }
                results.push(PairOutcome::failure(None, e));
            }
        }
    }

    Ok(BatchReport {
        processed: results.len(),
        results,
    })
}

/// The audit spreadsheet, if one is configured. Manual runs still work
/// without one; they just leave no history.
fn audit_sheet<'a>(ctx: &'a BatchContext) -> Option<&'a str> {
    if ctx.config.history_sheet_id.is_empty() {
        None
    } else {
        Some(&ctx.config.history_sheet_id)
    }
}

fn acquire_grid(ctx: &BatchContext, pair: &ManualPair) -> Result<Box<dyn GridStore>> {
    if pair.refresh_token.is_empty() {
        return Err(Error::validation("pair is missing a refresh token"));
    }
    let access_token = ctx.auth.refresh_access_token(&pair.refresh_token)?;
    ctx.grids.for_token(&access_token)
}

fn sync_one_manual(
    ctx: &BatchContext,
    grid: &dyn GridStore,
    pair: &ManualPair,
    direction: Direction,
) -> Result<SyncResult> {
    let resolved = resolve(
        &pair.sheet_url,
        &pair.sheet_id,
        &pair.base_url,
        &pair.base_id,
        &pair.table_id,
        direction,
    )?;

    // A caller naming a registry row must actually be describing that row.
    if let Some(row_id) = pair.row_id {
        let history_sheet = ctx.config.require_history_sheet()?;
        let registry = PairsRegistry::new(grid, history_sheet, &ctx.config.pairs_tab);
        let stored = registry.get(row_id)?.ok_or_else(|| {
            Error::validation(format!("registry row {} not found", row_id))
        })?;
        let stored = resolve(
            &stored.sheet_url,
            &stored.sheet_id,
            &stored.base_url,
            &stored.base_id,
            &stored.table_id,
            stored.direction,
        )?;
        if stored.sheet_id != resolved.sheet_id
            || stored.base_id != resolved.base_id
            || stored.table_id != resolved.table_id
        {
            return Err(Error::validation(format!(
                "registry row {} does not match the requested pairing",
                row_id
            )));
        }
    }

    sync_pair(
        grid,
        ctx.records,
        &resolved.sheet_id,
        &resolved.base_id,
        &resolved.table_id,
        resolved.direction,
        &ctx.options,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_prefers_explicit_ids() {
        let r = resolve(
            "https://docs.google.com/spreadsheets/d/from-url/edit",
            "explicit",
            "https://acme.feishu.cn/base/burl?table=turl",
            "bexp",
            "texp",
            Direction::RecordsToGrid,
        )
        .unwrap();
        assert_eq!(r.sheet_id, "explicit");
        assert_eq!(r.base_id, "bexp");
        assert_eq!(r.table_id, "texp");
    }

    #[test]
    fn test_resolve_falls_back_to_urls() {
        let r = resolve(
            "https://docs.google.com/spreadsheets/d/from-url/edit#gid=0",
            "",
            "https://acme.feishu.cn/base/bas123?table=tbl456&view=v1",
            "",
            "",
            Direction::GridToRecords,
        )
        .unwrap();
        assert_eq!(r.sheet_id, "from-url");
        assert_eq!(r.base_id, "bas123");
        assert_eq!(r.table_id, "tbl456");
    }

    #[test]
    fn test_resolve_rejects_bad_sheet_url() {
        let err = resolve(
            "https://example.com/not-a-sheet",
            "",
            "https://acme.feishu.cn/base/b?table=t",
            "",
            "",
            Direction::RecordsToGrid,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_resolve_rejects_base_url_without_table() {
        let err = resolve(
            "https://docs.google.com/spreadsheets/d/s1/edit",
            "",
            "https://acme.feishu.cn/base/b1",
            "",
            "",
            Direction::RecordsToGrid,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_manual_pair_deserializes_camel_case_and_aliases() {
        let pair: ManualPair = serde_json::from_str(
            r#"{"sheetUrl": "u", "larkUrl": "b", "direction": "sheet-to-lark",
                "refreshToken": "r", "rowId": 4, "userEmail": "ada@example.com"}"#,
        )
        .unwrap();
        assert_eq!(pair.sheet_url, "u");
        assert_eq!(pair.base_url, "b");
        assert_eq!(pair.refresh_token, "r");
        assert_eq!(pair.row_id, Some(4));
        assert_eq!(pair.user, "ada@example.com");
        assert_eq!(Direction::parse(&pair.direction), Direction::GridToRecords);
    }

    #[test]
    fn test_outcome_serialization_omits_absent_fields() {
        let outcome = PairOutcome::failure(None, &Error::validation("nope"));
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "error");
        assert!(json.get("rowCount").is_none());
        assert!(json.get("pair").is_none());
        assert_eq!(json["error"], "validation error: nope");
    }
}
