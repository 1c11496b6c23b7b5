//! Code block highlighting built on top of syntect.
//!
//! Syntax and theme definitions are owned by an [`AssetCache`] that the renderer creates once
//! per session and shares. Resolving a `(language, theme)` pair is memoized in the same cache.

use std::borrow::Cow;
use std::sync::Arc;

use dashmap::DashMap;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::highlighted_html_for_string;
use syntect::parsing::{SyntaxReference, SyntaxSet};

pub const DEFAULT_THEME: &str = "base16-ocean.dark";

/// Languages rendered without syntax colouring.
const PLAIN_LANGUAGES: &[&str] = &["diff", "text", "plaintext", "txt"];

/// Outcome of resolving a `(language, theme)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAssets {
    /// Syntect syntax name, `None` when rendering as plain text.
    pub syntax: Option<String>,
    pub theme: String,
}

/// Loaded syntax/theme definitions plus the resolution memo.
#[derive(Debug)]
pub struct AssetCache {
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
    resolved: DashMap<(String, String), Arc<ResolvedAssets>>,
}

impl Default for AssetCache {
    fn default() -> Self {
        Self::load_defaults()
    }
}

impl AssetCache {
    /// Load syntect's bundled syntaxes and themes.
    pub fn load_defaults() -> Self {
        Self::new(SyntaxSet::load_defaults_newlines(), ThemeSet::load_defaults())
    }

    pub fn new(syntax_set: SyntaxSet, theme_set: ThemeSet) -> Self {
        Self {
            syntax_set,
            theme_set,
            resolved: DashMap::new(),
        }
    }

    /// Number of memoized `(language, theme)` pairs.
    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }

    pub fn available_themes(&self) -> Vec<String> {
        let mut themes: Vec<_> = self.theme_set.themes.keys().cloned().collect();
        themes.sort();
        themes
    }

    /// Resolve (and memoize) the syntax and theme used for `language` and `theme`.
    pub fn resolve(&self, language: &str, theme: &str) -> Arc<ResolvedAssets> {
        let key = (language.to_ascii_lowercase(), theme.to_string());
        if let Some(hit) = self.resolved.get(&key) {
            return Arc::clone(hit.value());
        }

        tracing::debug!(language, theme, "resolving highlight assets");
        let resolved = Arc::new(ResolvedAssets {
            syntax: self.find_syntax(&key.0).map(|syntax| syntax.name.clone()),
            theme: self.resolve_theme(theme).into_owned(),
        });
        Arc::clone(self.resolved.entry(key).or_insert(resolved).value())
    }

    fn find_syntax(&self, language: &str) -> Option<&SyntaxReference> {
        if language.is_empty() || PLAIN_LANGUAGES.contains(&language) {
            return None;
        }
        let found = self.syntax_set.find_syntax_by_token(language);
        if found.is_none() {
            tracing::debug!(language, "no syntax for language, rendering plain text");
        }
        found
    }

    fn resolve_theme<'a>(&'a self, requested: &'a str) -> Cow<'a, str> {
        if self.theme_set.themes.contains_key(requested) {
            return Cow::Borrowed(requested);
        }

        if let Some(name) = self
            .theme_set
            .themes
            .keys()
            .find(|name| name.eq_ignore_ascii_case(requested))
        {
            return Cow::Owned(name.clone());
        }

        let fallback = if self.theme_set.themes.contains_key(DEFAULT_THEME) {
            DEFAULT_THEME.to_string()
        } else {
            self.theme_set
                .themes
                .keys()
                .next()
                .cloned()
                .unwrap_or_else(|| DEFAULT_THEME.to_string())
        };
        tracing::warn!(requested, fallback = %fallback, "theme not found");
        Cow::Owned(fallback)
    }

    fn theme(&self, name: &str) -> Option<&Theme> {
        self.theme_set.themes.get(name)
    }
}

/// Renders code to themed HTML.
#[derive(Debug, Clone)]
pub struct CodeHighlighter {
    assets: Arc<AssetCache>,
}

impl CodeHighlighter {
    pub fn new(assets: Arc<AssetCache>) -> Self {
        Self { assets }
    }

    pub fn assets(&self) -> &AssetCache {
        &self.assets
    }

    /// Highlight `code` as `language` using `theme`. Anything that cannot be highlighted is
    /// returned as an escaped plain `<pre>` block.
    pub fn highlight(&self, code: &str, language: &str, theme: &str) -> String {
        let resolved = self.assets.resolve(language, theme);
        let syntax = resolved
            .syntax
            .as_deref()
            .and_then(|name| self.assets.syntax_set.find_syntax_by_name(name));

        match (syntax, self.assets.theme(&resolved.theme)) {
            (Some(syntax), Some(theme_def)) => {
                match highlighted_html_for_string(code, &self.assets.syntax_set, syntax, theme_def)
                {
                    Ok(html) => html,
                    Err(err) => {
                        tracing::warn!(error = %err, language, "highlight failed");
                        plain_block(code)
                    }
                }
            }
            _ => plain_block(code),
        }
    }
}

fn plain_block(code: &str) -> String {
    format!("<pre><code>{}</code></pre>", html_escape::encode_text(code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;

    // Loading syntect's defaults is slow; tests share one cache.
    static ASSETS: Lazy<Arc<AssetCache>> = Lazy::new(|| Arc::new(AssetCache::load_defaults()));

    #[test]
    fn rust_code_is_highlighted() {
        let highlighter = CodeHighlighter::new(Arc::clone(&ASSETS));
        let html = highlighter.highlight("fn main() {}\n", "rust", "InspiredGitHub");
        assert!(html.starts_with("<pre style="));
        assert!(html.contains("main"));
    }

    #[test]
    fn resolution_is_memoized_per_language_and_theme() {
        let assets = AssetCache::new(SyntaxSet::load_defaults_newlines(), ThemeSet::load_defaults());
        let first = assets.resolve("rust", "InspiredGitHub");
        let again = assets.resolve("Rust", "InspiredGitHub");
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(assets.len(), 1);

        assets.resolve("rust", DEFAULT_THEME);
        assert_eq!(assets.len(), 2);
    }

    #[test]
    fn diff_and_unknown_languages_render_plain() {
        let highlighter = CodeHighlighter::new(Arc::clone(&ASSETS));
        for language in ["diff", "definitely-not-a-language", ""] {
            let html = highlighter.highlight("- a < b\n", language, DEFAULT_THEME);
            assert_eq!(html, "<pre><code>- a &lt; b\n</code></pre>");
        }
    }

    #[test]
    fn unknown_theme_falls_back() {
        let resolved = ASSETS.resolve("rust", "not-a-theme");
        assert_eq!(resolved.theme, DEFAULT_THEME);
        assert_eq!(resolved.syntax.as_deref(), Some("Rust"));
    }
}
