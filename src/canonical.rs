//! URL canonicalization.
//!
//! Reduces a content URL to a stable identity key so the same article fetched
//! twice with different tracking parameters is recognised as one item.
//!
//! Only WeChat article links (`mp.weixin.qq.com`) need special handling:
//!
//! | Shape | Example | Key |
//! |-------|---------|-----|
//! | path-form permanent link | `/s/AbC123?src=11` | query dropped |
//! | query-form, stable params | `/s?__biz=..&mid=..&idx=..&sn=..&timestamp=..` | stable params only, fixed order |
//! | query-form, only volatile params | `/s?src=11&timestamp=..&signature=..` | [`Canonical::Ambiguous`] |
//!
//! Everything else is returned trimmed and otherwise untouched. Parse
//! failures fall back to the trimmed input; canonicalization never blocks
//! ingestion.

use url::{Position, Url};

const WEIXIN_HOST: &str = "mp.weixin.qq.com";

/// Parameters that permanently identify a WeChat article, in output order.
const STABLE_PARAMS: [&str; 4] = ["__biz", "mid", "idx", "sn"];

/// Parameters that rotate on every fetch of the same article.
const VOLATILE_PARAMS: [&str; 5] = ["src", "timestamp", "ver", "signature", "new"];

/// Outcome of canonicalizing a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Canonical {
    /// A reliable identity key.
    Key(String),
    /// Only volatile parameters identify this URL; no reliable key exists.
    Ambiguous,
}

impl Canonical {
    pub fn key(&self) -> Option<&str> {
        match self {
            Canonical::Key(k) => Some(k),
            Canonical::Ambiguous => None,
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Canonical::Ambiguous)
    }
}

/// Canonicalize a URL. Pure and idempotent over [`Canonical::Key`] outputs.
pub fn canonicalize(raw: &str) -> Canonical {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Canonical::Key(String::new());
    }

    let parsed = match Url::parse(trimmed) {
        Ok(u) => u,
        Err(e) => {
            tracing::debug!(url = %trimmed, error = %e, "URL did not parse; using it verbatim");
            return Canonical::Key(trimmed.to_string());
        }
    };

    if parsed.host_str() != Some(WEIXIN_HOST) {
        return Canonical::Key(trimmed.to_string());
    }

    let path = parsed.path();
    let base = &parsed[..Position::AfterPath];

    if path.len() > 3 && path.starts_with("/s/") {
        return Canonical::Key(base.to_string());
    }

    if path != "/s" && path != "/s/" {
        return Canonical::Key(trimmed.to_string());
    }

    let pairs: Vec<(&str, &str)> = parsed
        .query()
        .unwrap_or("")
        .split('&')
        .filter(|p| !p.is_empty())
        .map(|p| p.split_once('=').unwrap_or((p, "")))
        .collect();

    if pairs.is_empty() {
        return Canonical::Key(base.to_string());
    }

    let stable: Vec<String> = STABLE_PARAMS
        .iter()
        .filter_map(|name| {
            pairs
                .iter()
                .find(|(k, v)| k == name && !v.is_empty())
                .map(|(k, v)| format!("{k}={v}"))
        })
        .collect();

    if !stable.is_empty() {
        return Canonical::Key(format!("{base}?{}", stable.join("&")));
    }

    let kept: Vec<String> = pairs
        .iter()
        .filter(|(k, _)| !VOLATILE_PARAMS.contains(k))
        .map(|(k, v)| format!("{k}={v}"))
        .collect();

    if kept.is_empty() {
        return Canonical::Ambiguous;
    }

    Canonical::Key(format!("{base}?{}", kept.join("&")))
}

/// Identity key used for dedup. Ambiguous URLs fall back to their trimmed
/// form, so they only ever match byte-identical URLs.
pub fn dedup_key(raw: &str) -> String {
    match canonicalize(raw) {
        Canonical::Key(k) => k,
        Canonical::Ambiguous => raw.trim().to_string(),
    }
}

/// Two-tier URL match used for archived-state lookups.
///
/// Exact match first; otherwise compare canonical keys, but only when both
/// sides produced one.
pub fn urls_match(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b {
        return true;
    }
    match (canonicalize(a), canonicalize(b)) {
        (Canonical::Key(ka), Canonical::Key(kb)) => ka == kb,
        _ => false,
    }
}
