//! Reference-URL parsing for the two stores.
//!
//! Pairings are registered with raw share links; the identifiers the APIs
//! need are extracted here. Both parsers return empty strings rather than
//! errors so callers can apply their own fallback order (explicit id first,
//! then parsed URL), with validation happening at resolution time.

use url::Url;

/// Extract the spreadsheet id from a Google Sheets link
/// (`https://docs.google.com/spreadsheets/d/<id>/edit...`).
pub fn parse_sheet_id(link: &str) -> String {
    let Ok(url) = Url::parse(link) else {
        return String::new();
    };
    let Some(segments) = url.path_segments() else {
        return String::new();
    };

    let mut after_d = false;
    let mut prev = "";
    for seg in segments {
        if after_d {
            return seg.to_string();
        }
        if prev == "spreadsheets" && seg == "d" {
            after_d = true;
        }
        prev = seg;
    }
    String::new()
}

/// Base/table identifiers extracted from a Bitable link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaseRef {
    pub base_id: String,
    pub table_id: String,
}

/// Extract base and table ids from a Lark/Feishu Bitable link.
///
/// Common patterns:
/// `https://xxx.larksuite.com/base/<baseId>?table=<tableId>` and
/// `https://xxx.feishu.cn/base/<baseId>?table=<tableId>`.
/// Some links use an app token in place of the base id under `/base/`.
pub fn parse_base_ref(link: &str) -> BaseRef {
    let Ok(url) = Url::parse(link) else {
        return BaseRef::default();
    };

    let base_id = url
        .path_segments()
        .and_then(|segments| {
            let mut found = false;
            for seg in segments {
                if found {
                    return Some(seg.to_string());
                }
                if seg == "base" {
                    found = true;
                }
            }
            None
        })
        .unwrap_or_default();

    let table_id = url
        .query_pairs()
        .find(|(k, _)| k == "table")
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default();

    BaseRef { base_id, table_id }
}
