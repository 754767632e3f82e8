//! Integration tests for batch orchestration: per-pairing isolation, audit
//! logging and registry bookkeeping, over in-memory stores.

use std::collections::HashSet;
use std::sync::Arc;

use bridge::store::{GridStore, InMemoryGridStore, InMemoryRecordStore};
use bridge::sync::{
    BatchContext, GridStoreFactory, ManualPair, PairStatus, SyncOptions, TokenRefresher,
    run_manual, run_unattended,
};
use bridge::{Error, Result, SyncConfig, crypto};

const SECRET: &str = "operator-secret";

/// Accepts every refresh token except the ones listed, minting a derived
/// access token.
struct FakeRefresher {
    reject: HashSet<String>,
}

impl FakeRefresher {
    fn accepting_all() -> Self {
        Self {
            reject: HashSet::new(),
        }
    }

    fn rejecting(tokens: &[&str]) -> Self {
        Self {
            reject: tokens.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl TokenRefresher for FakeRefresher {
    fn refresh_access_token(&self, refresh_token: &str) -> Result<String> {
        if self.reject.contains(refresh_token) {
            return Err(Error::Auth("refresh token rejected".into()));
        }
        Ok(format!("access-{}", refresh_token))
    }
}

/// Hands every token the same shared in-memory grid.
struct SharedGridFactory {
    grid: Arc<InMemoryGridStore>,
}

impl GridStoreFactory for SharedGridFactory {
    fn for_token(&self, _access_token: &str) -> Result<Box<dyn GridStore>> {
        Ok(Box::new(Arc::clone(&self.grid)))
    }
}

fn test_config() -> SyncConfig {
    SyncConfig {
        allowed_domain: String::new(),
        history_sheet_id: "hist".to_string(),
        history_tab: "History".to_string(),
        pairs_tab: "Pairs".to_string(),
        max_rows_per_sync: 5000,
    }
}

fn registry_header() -> Vec<String> {
    [
        "CreatedAt", "SheetUrl", "SheetId", "BaseUrl", "BaseId", "TableId", "Direction", "Owner",
        "RefreshEnc", "Active", "LastSyncAt", "Notes",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[allow(clippy::too_many_arguments)]
fn registry_row(
    sheet_id: &str,
    base_id: &str,
    table_id: &str,
    direction: &str,
    owner: &str,
    enc: &str,
    active: &str,
) -> Vec<String> {
    vec![
        "2024-01-01T00:00:00.000Z".to_string(),
        format!("https://docs.google.com/spreadsheets/d/{}/edit", sheet_id),
        sheet_id.to_string(),
        format!("https://acme.feishu.cn/base/{}?table={}", base_id, table_id),
        base_id.to_string(),
        table_id.to_string(),
        direction.to_string(),
        owner.to_string(),
        enc.to_string(),
        active.to_string(),
        String::new(),
        String::new(),
    ]
}

#[test]
fn test_unattended_run_isolates_failures() {
    let grid = Arc::new(InMemoryGridStore::new());
    let records = InMemoryRecordStore::new();

    let good_a = crypto::seal("rt-a", SECRET).unwrap();
    let bad_b = crypto::seal("rt-b", SECRET).unwrap();
    let good_c = crypto::seal("rt-c", SECRET).unwrap();
    grid.seed(
        "hist",
        "Pairs",
        vec![
            registry_header(),
            registry_row("sa", "ba", "ta", "lark-to-sheet", "ada@example.com", &good_a, "TRUE"),
            registry_row("sb", "bb", "tb", "lark-to-sheet", "", &bad_b, "TRUE"),
            registry_row("sc", "bc", "tc", "sheet-to-lark", "", &good_c, "TRUE"),
            // Inactive and credential-less rows never reach the engine.
            registry_row("sd", "bd", "td", "lark-to-sheet", "", &good_a, "FALSE"),
            registry_row("se", "be", "te", "lark-to-sheet", "", "", "TRUE"),
        ],
    );
    grid.seed("sa", "", [["Name"]]);
    grid.seed("sc", "", [["Name"], ["Ada"], ["Grace"]]);

    let config = test_config();
    // Pairing B's credential unseals fine but its refresh is rejected.
    let auth = FakeRefresher::rejecting(&["rt-b"]);
    let grids = SharedGridFactory {
        grid: Arc::clone(&grid),
    };
    let ctx = BatchContext {
        config: &config,
        auth: &auth,
        grids: &grids,
        records: &records,
        options: SyncOptions::default(),
    };

    let report = run_unattended(&ctx, "owner-rt", SECRET).unwrap();
    assert_eq!(report.processed, 3);
    assert_eq!(report.results[0].status, PairStatus::Success);
    assert_eq!(report.results[1].status, PairStatus::Error);
    assert_eq!(report.results[2].status, PairStatus::Success);
    assert!(
        report.results[1]
            .error
            .as_deref()
            .unwrap()
            .contains("refresh token rejected")
    );

    // Pairing C actually replaced its record table from the sheet.
    assert_eq!(records.records("bc", "tc").len(), 2);

    // One audit row per attempt, in order, with the right outcome markers.
    let history = grid.rows("hist", "History");
    assert_eq!(history.len(), 3);
    assert_eq!(history[0][6], "Success");
    assert_eq!(history[0][4], "ada@example.com");
    assert_eq!(history[1][6], "Error");
    assert_eq!(history[1][4], "cron", "blank owner audits as cron");
    assert_eq!(history[2][6], "Success");
    assert_eq!(history[2][3], "sheet-to-lark");

    // Only the successful rows got a last-synced stamp (column K).
    let pairs = grid.rows("hist", "Pairs");
    assert!(!pairs[1][10].is_empty());
    assert!(pairs[2][10].is_empty());
    assert!(!pairs[3][10].is_empty());
    assert!(pairs[4][10].is_empty());
}

#[test]
fn test_unattended_run_with_empty_registry() {
    let grid = Arc::new(InMemoryGridStore::new());
    grid.seed("hist", "Pairs", vec![registry_header()]);
    let records = InMemoryRecordStore::new();

    let config = test_config();
    let auth = FakeRefresher::accepting_all();
    let grids = SharedGridFactory {
        grid: Arc::clone(&grid),
    };
    let ctx = BatchContext {
        config: &config,
        auth: &auth,
        grids: &grids,
        records: &records,
        options: SyncOptions::default(),
    };

    let report = run_unattended(&ctx, "owner-rt", SECRET).unwrap();
    assert_eq!(report.processed, 0);
    assert!(report.results.is_empty());
    assert!(grid.rows("hist", "History").is_empty());
}

#[test]
fn test_unattended_requires_history_sheet() {
    let grid = Arc::new(InMemoryGridStore::new());
    let records = InMemoryRecordStore::new();
    let mut config = test_config();
    config.history_sheet_id = String::new();
    let auth = FakeRefresher::accepting_all();
    let grids = SharedGridFactory {
        grid: Arc::clone(&grid),
    };
    let ctx = BatchContext {
        config: &config,
        auth: &auth,
        grids: &grids,
        records: &records,
        options: SyncOptions::default(),
    };

    let err = run_unattended(&ctx, "owner-rt", SECRET).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_manual_run_syncs_and_audits() {
    let grid = Arc::new(InMemoryGridStore::new());
    grid.seed("hist", "Pairs", vec![registry_header()]);
    grid.seed("sheet1", "", [["Name"], ["Ada"]]);
    let records = InMemoryRecordStore::new();

    let config = test_config();
    let auth = FakeRefresher::accepting_all();
    let grids = SharedGridFactory {
        grid: Arc::clone(&grid),
    };
    let ctx = BatchContext {
        config: &config,
        auth: &auth,
        grids: &grids,
        records: &records,
        options: SyncOptions::default(),
    };

    let pair = ManualPair {
        sheet_url: "https://docs.google.com/spreadsheets/d/sheet1/edit".into(),
        base_url: "https://acme.feishu.cn/base/b1?table=t1".into(),
        direction: "sheet-to-lark".into(),
        refresh_token: "rt-user".into(),
        user: "ada@example.com".into(),
        ..ManualPair::default()
    };

    let report = run_manual(&ctx, &[pair]).unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.results[0].status, PairStatus::Success);
    assert_eq!(report.results[0].row_count, Some(1));
    assert_eq!(records.records("b1", "t1").len(), 1);

    let history = grid.rows("hist", "History");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0][4], "ada@example.com");
    assert_eq!(history[0][6], "Success");
}

#[test]
fn test_manual_run_rejects_empty_batch() {
    let grid = Arc::new(InMemoryGridStore::new());
    let records = InMemoryRecordStore::new();
    let config = test_config();
    let auth = FakeRefresher::accepting_all();
    let grids = SharedGridFactory {
        grid: Arc::clone(&grid),
    };
    let ctx = BatchContext {
        config: &config,
        auth: &auth,
        grids: &grids,
        records: &records,
        options: SyncOptions::default(),
    };

    let err = run_manual(&ctx, &[]).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[test]
fn test_manual_missing_refresh_token_is_isolated() {
    let grid = Arc::new(InMemoryGridStore::new());
    grid.seed("sheet1", "", [["Name"], ["Ada"]]);
    let records = InMemoryRecordStore::new();
    let config = test_config();
    let auth = FakeRefresher::accepting_all();
    let grids = SharedGridFactory {
        grid: Arc::clone(&grid),
    };
    let ctx = BatchContext {
        config: &config,
        auth: &auth,
        grids: &grids,
        records: &records,
        options: SyncOptions::default(),
    };

    let broken = ManualPair {
        sheet_url: "https://docs.google.com/spreadsheets/d/sheet1/edit".into(),
        base_url: "https://acme.feishu.cn/base/b1?table=t1".into(),
        ..ManualPair::default()
    };
    let good = ManualPair {
        sheet_url: "https://docs.google.com/spreadsheets/d/sheet1/edit".into(),
        base_url: "https://acme.feishu.cn/base/b1?table=t1".into(),
        direction: "sheet-to-lark".into(),
        refresh_token: "rt-user".into(),
        ..ManualPair::default()
    };

    let report = run_manual(&ctx, &[broken, good]).unwrap();
    assert_eq!(report.processed, 2);
    assert_eq!(report.results[0].status, PairStatus::Error);
    assert_eq!(report.results[1].status, PairStatus::Success);
    // No token means no audit row for the first attempt.
    assert_eq!(grid.rows("hist", "History").len(), 1);
}

#[test]
fn test_manual_row_id_zero_is_isolated() {
    let grid = Arc::new(InMemoryGridStore::new());
    grid.seed(
        "hist",
        "Pairs",
        vec![
            registry_header(),
            registry_row("sheet1", "b1", "t1", "sheet-to-lark", "", "enc", "TRUE"),
        ],
    );
    grid.seed("sheet1", "", [["Name"], ["Ada"]]);
    let records = InMemoryRecordStore::new();
    let config = test_config();
    let auth = FakeRefresher::accepting_all();
    let grids = SharedGridFactory {
        grid: Arc::clone(&grid),
    };
    let ctx = BatchContext {
        config: &config,
        auth: &auth,
        grids: &grids,
        records: &records,
        options: SyncOptions::default(),
    };

    // Row 0 names no registry row; the pairing fails cleanly and the rest
    // of the batch still runs.
    let bad = ManualPair {
        sheet_url: "https://docs.google.com/spreadsheets/d/sheet1/edit".into(),
        base_url: "https://acme.feishu.cn/base/b1?table=t1".into(),
        direction: "sheet-to-lark".into(),
        refresh_token: "rt-user".into(),
        row_id: Some(0),
        ..ManualPair::default()
    };
    let good = ManualPair {
        sheet_url: "https://docs.google.com/spreadsheets/d/sheet1/edit".into(),
        base_url: "https://acme.feishu.cn/base/b1?table=t1".into(),
        direction: "sheet-to-lark".into(),
        refresh_token: "rt-user".into(),
        ..ManualPair::default()
    };

    let report = run_manual(&ctx, &[bad, good]).unwrap();
    assert_eq!(report.processed, 2);
    assert_eq!(report.results[0].status, PairStatus::Error);
    assert_eq!(report.results[1].status, PairStatus::Success);
}

#[test]
fn test_manual_row_id_reconciliation() {
    let grid = Arc::new(InMemoryGridStore::new());
    grid.seed(
        "hist",
        "Pairs",
        vec![
            registry_header(),
            registry_row("sheet1", "b1", "t1", "sheet-to-lark", "", "enc", "TRUE"),
        ],
    );
    grid.seed("sheet1", "", [["Name"], ["Ada"]]);
    let records = InMemoryRecordStore::new();
    let config = test_config();
    let auth = FakeRefresher::accepting_all();
    let grids = SharedGridFactory {
        grid: Arc::clone(&grid),
    };
    let ctx = BatchContext {
        config: &config,
        auth: &auth,
        grids: &grids,
        records: &records,
        options: SyncOptions::default(),
    };

    // Matching row: syncs and stamps column K.
    let matching = ManualPair {
        sheet_url: "https://docs.google.com/spreadsheets/d/sheet1/edit".into(),
        base_url: "https://acme.feishu.cn/base/b1?table=t1".into(),
        direction: "sheet-to-lark".into(),
        refresh_token: "rt-user".into(),
        row_id: Some(2),
        ..ManualPair::default()
    };
    let report = run_manual(&ctx, &[matching]).unwrap();
    assert_eq!(report.results[0].status, PairStatus::Success);
    assert!(!grid.rows("hist", "Pairs")[1][10].is_empty());

    // A row id naming a different pairing is refused.
    let mismatched = ManualPair {
        sheet_url: "https://docs.google.com/spreadsheets/d/other-sheet/edit".into(),
        base_url: "https://acme.feishu.cn/base/b1?table=t1".into(),
        refresh_token: "rt-user".into(),
        row_id: Some(2),
        ..ManualPair::default()
    };
    let report = run_manual(&ctx, &[mismatched]).unwrap();
    assert_eq!(report.results[0].status, PairStatus::Error);
    assert!(
        report.results[0]
            .error
            .as_deref()
            .unwrap()
            .contains("does not match")
    );

    // A row id pointing past the registry is refused too.
    let missing = ManualPair {
        sheet_url: "https://docs.google.com/spreadsheets/d/sheet1/edit".into(),
        base_url: "https://acme.feishu.cn/base/b1?table=t1".into(),
        refresh_token: "rt-user".into(),
        row_id: Some(9),
        ..ManualPair::default()
    };
    let report = run_manual(&ctx, &[missing]).unwrap();
    assert_eq!(report.results[0].status, PairStatus::Error);
    assert!(
        report.results[0]
            .error
            .as_deref()
            .unwrap()
            .contains("not found")
    );
}
