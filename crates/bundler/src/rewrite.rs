//! Rewrites asset references in rendered HTML to point into the
//! category-partitioned bundle.
//!
//! Matching is textual over the serialized document, so font `url()`
//! references inside inline `<style>` blocks are handled the same way as
//! those in attributes. Each category's extension set is disjoint from the
//! others, so an occurrence is rewritten by at most one pass, and rewriting an
//! already-rewritten document changes nothing.
//!
//! A `?query` or `#fragment` directly after the extension is kept and
//! re-attached after the flattened path.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use vite_ssg_core::AssetCategory;

/// How references to one category appear in a document
enum Syntax {
    /// `attr="…"`
    Attribute(&'static str),
    /// CSS `url(…)`, optionally quoted
    CssUrl,
}

struct Pass {
    category: AssetCategory,
    pattern: Regex,
}

static PASSES: LazyLock<Vec<Pass>> = LazyLock::new(|| {
    [
        (AssetCategory::Script, Syntax::Attribute("src")),
        (AssetCategory::Stylesheet, Syntax::Attribute("href")),
        (AssetCategory::Image, Syntax::Attribute("src")),
        (AssetCategory::Font, Syntax::CssUrl),
    ]
    .into_iter()
    .map(|(category, syntax)| Pass {
        category,
        pattern: build_pattern(category, &syntax),
    })
    .collect()
});

fn build_pattern(category: AssetCategory, syntax: &Syntax) -> Regex {
    let exts = category
        .extensions()
        .iter()
        .map(|e| regex::escape(e))
        .collect::<Vec<_>>()
        .join("|");

    // group 1: path ending in a known extension, group 2: optional ?query / #hash
    let pattern = match syntax {
        Syntax::Attribute(attr) => format!(
            r#"(?i)\b{attr}="([^"?#]+?\.(?:{exts}))([?#][^"]*)?""#,
            attr = attr,
            exts = exts
        ),
        Syntax::CssUrl => format!(
            r#"(?i)url\(\s*['"]?([^'"()\s?#]+?\.(?:{exts}))([?#][^'"()\s]*)?['"]?\s*\)"#,
            exts = exts
        ),
    };

    Regex::new(&pattern).expect("asset reference pattern is valid")
}

/// Last path component of a URL path
fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Rewrite every script, stylesheet, image and font reference in `html` to
/// `/<category dir>/<basename>`. Everything else is left untouched.
pub fn rewrite_references(html: &str) -> String {
    let mut document = html.to_string();

    for pass in PASSES.iter() {
        let dir = pass.category.dir_name();
        let rewritten = pass.pattern.replace_all(&document, |caps: &Captures| {
            let file = basename(&caps[1]);
            let suffix = caps.get(2).map_or("", |m| m.as_str());
            match pass.category {
                AssetCategory::Font => format!("url(/{}/{}{})", dir, file, suffix),
                _ => {
                    // keep the attribute name exactly as written
                    let whole = &caps[0];
                    let attr = &whole[..whole.find('=').unwrap_or(0)];
                    format!(r#"{}="/{}/{}{}""#, attr, dir, file, suffix)
                }
            }
        });
        document = rewritten.into_owned();
    }

    document
}
