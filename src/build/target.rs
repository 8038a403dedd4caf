use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::debug;

use super::render;
use crate::design::tokens::DesignTokens;
use crate::design::{slugify, PageAnalysis, Pattern};
use crate::error::Result;
use crate::plan::{ContentType, DesignOverrides, PlanPage};
use crate::workspace::{site_dir, site_file};

const MARKER_DIR: &str = ".sitesmith";
const MARKER_FILE: &str = "site.json";

/// The content-publishing system a build plan is applied to.
///
/// Probes report readiness for the pre-flight gate. Every other operation
/// backs exactly one build phase and reports failure through `anyhow`.
#[async_trait]
pub trait TargetSystem: Send + Sync {
    fn root(&self) -> &Path;
    async fn is_running(&self) -> bool;
    async fn storage_ready(&self) -> bool;
    async fn cli_available(&self) -> bool;

    async fn provision(&self, site_name: &str) -> anyhow::Result<()>;
    async fn install_plugins(&self, plugins: &[String]) -> anyhow::Result<()>;
    async fn create_content_types(&self, types: &[ContentType]) -> anyhow::Result<()>;
    async fn create_pages(&self, pages: &[PlanPage]) -> anyhow::Result<()>;
    async fn apply_design(
        &self,
        tokens: &DesignTokens,
        overrides: Option<&DesignOverrides>,
    ) -> anyhow::Result<()>;
    async fn create_source_page(&self, page: &PageAnalysis) -> anyhow::Result<()>;
    async fn register_pattern(&self, pattern: &Pattern) -> anyhow::Result<()>;
}

/// Writes every artifact as a file under one site directory.
pub struct FsTarget {
    root: PathBuf,
    cli_tool: String,
}

impl FsTarget {
    pub fn new(sites_root: &Path, site_id: &str, cli_tool: &str) -> Result<FsTarget> {
        Ok(FsTarget {
            root: site_dir(sites_root, site_id)?,
            cli_tool: cli_tool.to_string(),
        })
    }

    fn marker(&self) -> PathBuf {
        self.root.join(MARKER_DIR).join(MARKER_FILE)
    }

    async fn write(&self, path: PathBuf, contents: String) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        debug!(path = %path.display(), bytes = contents.len(), "write");
        tokio::fs::write(&path, contents)
            .await
            .with_context(|| format!("writing {}", path.display()))
    }

    async fn write_json(&self, path: PathBuf, value: &Value) -> anyhow::Result<()> {
        self.write(path, serde_json::to_string_pretty(value)?).await
    }
}

#[async_trait]
impl TargetSystem for FsTarget {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn is_running(&self) -> bool {
        tokio::fs::try_exists(self.marker()).await.unwrap_or(false)
    }

    async fn storage_ready(&self) -> bool {
        match tokio::fs::read(self.marker()).await {
            Ok(bytes) => serde_json::from_slice::<Value>(&bytes).is_ok_and(|v| v.is_object()),
            Err(_) => false,
        }
    }

    async fn cli_available(&self) -> bool {
        on_path(&self.cli_tool)
    }

    async fn provision(&self, site_name: &str) -> anyhow::Result<()> {
        let marker = json!({
            "name": site_name,
            "provisioned_at": Utc::now().to_rfc3339(),
        });
        self.write_json(self.marker(), &marker).await
    }

    async fn install_plugins(&self, plugins: &[String]) -> anyhow::Result<()> {
        let mut list = plugins.to_vec();
        list.sort();
        list.dedup();
        self.write_json(self.root.join("plugins.json"), &json!(list)).await
    }

    async fn create_content_types(&self, types: &[ContentType]) -> anyhow::Result<()> {
        for ct in types {
            let path = site_file(&self.root, "content-types", &ct.slug, "json")?;
            self.write_json(path, &serde_json::to_value(ct)?).await?;
        }
        Ok(())
    }

    async fn create_pages(&self, pages: &[PlanPage]) -> anyhow::Result<()> {
        for page in pages {
            let path = site_file(&self.root, "pages", &page.slug, "html")?;
            self.write(path, render::render_plan_page(page)).await?;
        }
        Ok(())
    }

    async fn apply_design(
        &self,
        tokens: &DesignTokens,
        overrides: Option<&DesignOverrides>,
    ) -> anyhow::Result<()> {
        let theme = render::theme_json(tokens, overrides);
        self.write_json(self.root.join("theme.json"), &theme).await
    }

    async fn create_source_page(&self, page: &PageAnalysis) -> anyhow::Result<()> {
        let slug = slugify(&page.name);
        let slug = if slug.is_empty() { slugify(&page.id) } else { slug };
        let path = site_file(&self.root, "source-pages", &slug, "html")?;
        self.write(path, render::render_page(&page.sections)).await
    }

    async fn register_pattern(&self, pattern: &Pattern) -> anyhow::Result<()> {
        let path = site_file(&self.root, "patterns", &pattern.slug, "html")?;
        let body = format!(
            "<!-- pattern: {} -->\n{}",
            render::escape(&pattern.title),
            render::render_section(&pattern.section)
        );
        self.write(path, body).await
    }
}

fn on_path(tool: &str) -> bool {
    if tool.is_empty() {
        return false;
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(tool).is_file()))
        .unwrap_or(false)
}
