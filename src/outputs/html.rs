//! Article body for WeChat MP drafts.
//!
//! The MP draft API takes an HTML `content` field. Everything interpolated is
//! escaped; links use the canonical item URL.

use std::fmt::Write;

use html_escape::{encode_double_quoted_attribute, encode_text};

use super::Digest;

/// Render a digest as a self-contained HTML fragment.
pub fn render_mp_article(digest: &Digest) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "<p><strong>{}</strong> {}</p>",
        encode_text(&digest.title),
        digest.date.format("%Y-%m-%d")
    );
    if !digest.theme.is_empty() {
        let _ = write!(out, "<blockquote>{}</blockquote>", encode_text(&digest.theme));
    }

    out.push_str("<ol>");
    for item in &digest.items {
        let _ = write!(
            out,
            "<li><p><a href=\"{}\">{}</a></p>",
            encode_double_quoted_attribute(item.url()),
            encode_text(item.title())
        );
        if !item.source().is_empty() {
            let _ = write!(out, "<p>Source: {}</p>", encode_text(item.source()));
        }
        if !item.summary().is_empty() {
            let _ = write!(out, "<p>{}</p>", encode_text(item.summary()));
        }
        out.push_str("</li>");
    }
    out.push_str("</ol>");

    if !digest.footer.is_empty() {
        let _ = write!(out, "<p>{}</p>", encode_text(&digest.footer));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemBuilder;
    use chrono::NaiveDate;

    #[test]
    fn test_render_escapes_content() {
        let digest = Digest {
            date: NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
            title: "Digest".into(),
            theme: String::new(),
            footer: String::new(),
            items: vec![
                ItemBuilder::new("<script>x</script>", "https://a.example/?a=1&b=\"2\"")
                    .summary("a & b")
                    .build(),
            ],
            sent_at: None,
            channels: Vec::new(),
        };
        let html = render_mp_article(&digest);
        assert!(html.starts_with("<p><strong>Digest</strong> 2026-10-16</p><ol>"));
        assert!(html.contains("&lt;script&gt;x&lt;/script&gt;"));
        assert!(html.contains("href=\"https://a.example/?a=1&amp;b=&quot;2&quot;\""));
        assert!(html.contains("<p>a &amp; b</p>"));
        assert!(!html.contains("blockquote"));
    }
}
