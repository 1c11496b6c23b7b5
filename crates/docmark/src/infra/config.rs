//! Configuration management utilities.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dirs_next::config_dir;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::infra::markdown::ConvertOptions;

static DEFAULT_CONFIG: Lazy<&'static str> =
    Lazy::new(|| include_str!("../../assets/default-config.toml"));
static DEFAULT_WORKSPACE_CONFIG_PATH: &str = ".docmark/config.toml";

/// Layered configuration loaded from defaults, user, workspace, and env.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub render: Render,
    #[serde(default)]
    pub store: Store,
    #[serde(default)]
    pub site: Site,
}

/// Rendering flags. Unset flags fall back to the built-in defaults, so any layer can turn a
/// flag on or off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Render {
    #[serde(default)]
    pub gfm: Option<bool>,
    #[serde(default)]
    pub heading_ids: Option<bool>,
    #[serde(default)]
    pub alerts: Option<bool>,
    #[serde(default)]
    pub toc: Option<bool>,
    #[serde(default = "Render::default_theme_light")]
    pub theme_light: String,
    #[serde(default = "Render::default_theme_dark")]
    pub theme_dark: String,
}

impl Render {
    fn default_theme_light() -> String {
        "InspiredGitHub".into()
    }

    fn default_theme_dark() -> String {
        "base16-ocean.dark".into()
    }

    pub fn gfm(&self) -> bool {
        self.gfm.unwrap_or(true)
    }

    pub fn heading_ids(&self) -> bool {
        self.heading_ids.unwrap_or(true)
    }

    pub fn alerts(&self) -> bool {
        self.alerts.unwrap_or(true)
    }

    pub fn toc(&self) -> bool {
        self.toc.unwrap_or(false)
    }

    /// Markdown conversion flags derived from this section.
    pub fn convert_options(&self) -> ConvertOptions {
        ConvertOptions {
            gfm: self.gfm(),
            heading_ids: self.heading_ids(),
            alerts: self.alerts(),
        }
    }

    pub fn themes(&self) -> [&str; 2] {
        [&self.theme_light, &self.theme_dark]
    }
}

impl Default for Render {
    fn default() -> Self {
        Self {
            gfm: None,
            heading_ids: None,
            alerts: None,
            toc: None,
            theme_light: Self::default_theme_light(),
            theme_dark: Self::default_theme_dark(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    #[serde(default = "Store::default_path")]
    pub path: PathBuf,
}

impl Store {
    fn default_path() -> PathBuf {
        PathBuf::from(".docmark/highlights.json")
    }
}

impl Default for Store {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
        }
    }
}

/// Where the rendered documents come from, used for "edit" links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Site {
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
}

impl Site {
    fn default_branch() -> &'static str {
        "main"
    }

    pub fn branch(&self) -> &str {
        self.branch.as_deref().unwrap_or(Self::default_branch())
    }
}

/// Environment overrides for critical settings.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    store: Option<String>,
    theme_light: Option<String>,
    theme_dark: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            store: env::var("DOCMARK_STORE").ok(),
            theme_light: env::var("DOCMARK_THEME_LIGHT").ok(),
            theme_dark: env::var("DOCMARK_THEME_DARK").ok(),
        }
    }

    #[cfg(test)]
    fn for_tests(store: &str, theme_dark: &str) -> Self {
        Self {
            store: Some(store.to_owned()),
            theme_light: None,
            theme_dark: Some(theme_dark.to_owned()),
        }
    }
}

impl Config {
    /// Load configuration from defaults, user/global config, workspace config, and env overrides.
    pub fn load() -> Result<Self> {
        let env = EnvOverrides::from_env();
        let global = global_config_path();
        let workspace = workspace_config_path()?;
        Self::load_with_layers(global, workspace, env)
    }

    fn load_with_layers(
        global: Option<PathBuf>,
        workspace: Option<PathBuf>,
        env_overrides: EnvOverrides,
    ) -> Result<Self> {
        let mut layers: Vec<Config> = Vec::new();

        layers.push(Self::from_str(&DEFAULT_CONFIG)?);

        if let Some(global_path) = global.filter(|path| path.exists()) {
            layers.push(Self::from_file(&global_path)?);
        }

        if let Some(workspace_path) = workspace.filter(|path| path.exists()) {
            layers.push(Self::from_file(&workspace_path)?);
        }

        let merged = layers.into_iter().reduce(Config::merge).unwrap_or_default();
        Ok(apply_env_overrides(merged, env_overrides))
    }

    fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_str(&data)
    }

    fn from_str(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).with_context(|| "failed to parse TOML config".to_string())?;
        Ok(config)
    }

    fn merge(self, other: Self) -> Self {
        Self {
            render: merge_render(self.render, other.render),
            store: Store {
                path: choose(self.store.path, other.store.path, Store::default_path),
            },
            site: Site {
                repo: other.site.repo.or(self.site.repo),
                branch: other.site.branch.or(self.site.branch),
            },
        }
    }
}

fn merge_render(mut base: Render, overlay: Render) -> Render {
    if let Some(value) = overlay.gfm {
        base.gfm = Some(value);
    }
    if let Some(value) = overlay.heading_ids {
        base.heading_ids = Some(value);
    }
    if let Some(value) = overlay.alerts {
        base.alerts = Some(value);
    }
    if let Some(value) = overlay.toc {
        base.toc = Some(value);
    }
    base.theme_light = choose(
        base.theme_light,
        overlay.theme_light,
        Render::default_theme_light,
    );
    base.theme_dark = choose(base.theme_dark, overlay.theme_dark, Render::default_theme_dark);
    base
}

fn choose<T: PartialEq>(base: T, overlay: T, default_fn: fn() -> T) -> T {
    if overlay != default_fn() {
        overlay
    } else {
        base
    }
}

fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join("docmark/config.toml"))
}

fn workspace_config_path() -> Result<Option<PathBuf>> {
    let cwd = env::current_dir()?;
    let root = find_repo_root(&cwd).unwrap_or(cwd);
    Ok(Some(root.join(DEFAULT_WORKSPACE_CONFIG_PATH)))
}

fn find_repo_root(start: &Path) -> Option<PathBuf> {
    let mut current = start;
    loop {
        if current.join(".git").exists() {
            return Some(current.to_path_buf());
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return None,
        }
    }
}

fn apply_env_overrides(mut config: Config, env: EnvOverrides) -> Config {
    if let Some(store) = env.store {
        config.store.path = PathBuf::from(store);
    }
    if let Some(theme) = env.theme_light {
        config.render.theme_light = theme;
    }
    if let Some(theme) = env.theme_dark {
        config.render.theme_dark = theme;
    }
    config
}
