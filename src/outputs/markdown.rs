//! WeCom group-robot Markdown.
//!
//! ```text
//! **AI Coding Digest｜2026-10-16**
//!
//! > Theme: AI coding productivity and engineering practice
//!
//! 1. [Title](https://...)
//!    - Source: Rust Weekly
//!    - Summary: ...
//!
//! > footer
//! ```
//!
//! WeCom rejects Markdown messages over 4096 bytes, so summaries are
//! shortened and trailing items are dropped once the limit would be passed.

use std::fmt::Write;

use tracing::warn;

use super::Digest;
use crate::utils::shorten;

/// WeCom's limit on `markdown.content`, in bytes.
pub const WECOM_MAX_BYTES: usize = 4096;

const SUMMARY_CHARS: usize = 120;

/// Render a digest for the WeCom webhook.
///
/// Only the first [`fitting_items`] items are rendered.
pub fn render_wecom(digest: &Digest) -> String {
    let (head, footer) = frame(digest);
    let kept = fitting_items(digest);
    if kept < digest.items.len() {
        warn!(
            kept,
            total = digest.items.len(),
            "Digest exceeds WeCom size limit; dropping trailing items"
        );
    }

    let mut out = head;
    for (idx, item) in digest.items[..kept].iter().enumerate() {
        out.push_str(&item_block(idx + 1, item));
    }
    out.push_str(&footer);
    while out.ends_with('\n') {
        out.pop();
    }
    out
}

/// How many leading items of `digest` fit in one WeCom message.
pub fn fitting_items(digest: &Digest) -> usize {
    let (head, footer) = frame(digest);
    let mut used = head.len() + footer.len();
    for (idx, item) in digest.items.iter().enumerate() {
        let block = item_block(idx + 1, item).len();
        if used + block > WECOM_MAX_BYTES {
            return idx;
        }
        used += block;
    }
    digest.items.len()
}

fn frame(digest: &Digest) -> (String, String) {
    let mut head = String::new();
    let _ = writeln!(head, "**{}｜{}**", digest.title, digest.date.format("%Y-%m-%d"));
    let _ = writeln!(head);
    if !digest.theme.is_empty() {
        let _ = writeln!(head, "> Theme: {}", digest.theme);
        let _ = writeln!(head);
    }

    let footer = if digest.footer.is_empty() {
        String::new()
    } else {
        format!("> {}", digest.footer)
    };
    (head, footer)
}

fn item_block(idx: usize, item: &crate::models::Item) -> String {
    let mut block = String::new();
    let _ = writeln!(block, "{idx}. [{}]({})", item.title(), item.url());
    if !item.source().is_empty() {
        let _ = writeln!(block, "   - Source: {}", item.source());
    }
    if !item.summary().is_empty() {
        let _ = writeln!(block, "   - Summary: {}", shorten(item.summary(), SUMMARY_CHARS));
    }
    let _ = writeln!(block);
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemBuilder;
    use chrono::NaiveDate;

    fn digest(items: Vec<crate::models::Item>, footer: &str) -> Digest {
        Digest {
            date: NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
            title: "AI Coding Digest".into(),
            theme: "Agents".into(),
            footer: footer.into(),
            items,
            sent_at: None,
            channels: Vec::new(),
        }
    }

    #[test]
    fn test_render_wecom_layout() {
        let items = vec![
            ItemBuilder::new("First", "https://a.example")
                .source("Rust Weekly")
                .summary("About agents")
                .build(),
            ItemBuilder::new("Second", "https://b.example").build(),
        ];
        let out = render_wecom(&digest(items, "more at example.org"));
        let expected = "**AI Coding Digest｜2026-10-16**\n\
                        \n\
                        > Theme: Agents\n\
                        \n\
                        1. [First](https://a.example)\n   - Source: Rust Weekly\n   - Summary: About agents\n\
                        \n\
                        2. [Second](https://b.example)\n\
                        \n\
                        > more at example.org";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_render_wecom_respects_size_limit() {
        let items = (0..200)
            .map(|i| {
                ItemBuilder::new(format!("Title number {i}"), format!("https://example.org/{i}"))
                    .summary("x".repeat(300))
                    .build()
            })
            .collect();
        let digest = digest(items, "");
        let out = render_wecom(&digest);
        assert!(out.len() <= WECOM_MAX_BYTES);
        assert!(out.contains("1. [Title number 0]"));

        let kept = fitting_items(&digest);
        assert!(kept > 0 && kept < 200);
        assert_eq!(out.matches("](https://example.org/").count(), kept);
    }

    #[test]
    fn test_fitting_items_counts_everything_when_small() {
        let items = vec![ItemBuilder::new("Only", "https://a.example").build()];
        assert_eq!(fitting_items(&digest(items, "footer")), 1);
        assert_eq!(fitting_items(&digest(Vec::new(), "")), 0);
    }
}
