pub mod preflight;
pub mod render;
pub mod session;
pub mod target;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::{BuildSettings, Thresholds};
use crate::design::node::Document;
use crate::design::tokens::DesignTokens;
use crate::design::{analyze_document, collect_patterns, DesignAnalysis};
use crate::error::{Error, Result};
use crate::plan::BuildPlan;
use preflight::preflight;
use session::{await_and_apply, SessionStore};
use target::TargetSystem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseName {
    Plugins,
    ContentStructure,
    Design,
    SourcePages,
    SourcePatterns,
}

impl PhaseName {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseName::Plugins => "plugins",
            PhaseName::ContentStructure => "content_structure",
            PhaseName::Design => "design",
            PhaseName::SourcePages => "source_pages",
            PhaseName::SourcePatterns => "source_patterns",
        }
    }
}

impl fmt::Display for PhaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildPhase {
    pub name: PhaseName,
    pub attempted: bool,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BuildPhase {
    fn skipped(name: PhaseName) -> BuildPhase {
        BuildPhase {
            name,
            attempted: false,
            succeeded: false,
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildSummary {
    pub build_id: String,
    pub started_at: DateTime<Utc>,
    pub phases: Vec<BuildPhase>,
    pub preflight_warnings: Vec<String>,
}

impl BuildSummary {
    pub fn attempted(&self) -> usize {
        self.phases.iter().filter(|p| p.attempted).count()
    }

    pub fn succeeded(&self) -> usize {
        self.phases.iter().filter(|p| p.succeeded).count()
    }

    pub fn failed(&self) -> usize {
        self.phases.iter().filter(|p| p.attempted && !p.succeeded).count()
    }

    pub fn success(&self) -> bool {
        self.failed() == 0
    }

    pub fn phase(&self, name: PhaseName) -> Option<&BuildPhase> {
        self.phases.iter().find(|p| p.name == name)
    }

    /// Failed phases as [`Error::Phase`] values.
    pub fn errors(&self) -> Vec<Error> {
        self.phases
            .iter()
            .filter_map(|p| {
                p.error.as_ref().map(|message| Error::Phase {
                    phase: p.name.to_string(),
                    message: message.clone(),
                })
            })
            .collect()
    }
}

/// Applies a build plan to a target one phase at a time. Phases run in a
/// fixed order and strictly one after another; a failing phase is recorded
/// and the next one still runs.
pub struct Orchestrator<'a> {
    settings: &'a BuildSettings,
    progress: bool,
}

impl<'a> Orchestrator<'a> {
    pub fn new(settings: &'a BuildSettings) -> Self {
        Orchestrator {
            settings,
            progress: false,
        }
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub async fn run(
        &self,
        build_id: &str,
        plan: &BuildPlan,
        analysis: Option<&DesignAnalysis>,
        target: &dyn TargetSystem,
    ) -> Result<BuildSummary> {
        let started_at = Utc::now();
        let report = preflight(target, self.settings).await?;

        let mut order = vec![PhaseName::Plugins, PhaseName::ContentStructure, PhaseName::Design];
        if analysis.is_some() {
            order.extend([PhaseName::SourcePages, PhaseName::SourcePatterns]);
        }

        let pb = if self.progress {
            ProgressBar::new(order.len() as u64)
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }

        let mut phases = Vec::with_capacity(order.len());
        for name in order {
            pb.set_message(name.as_str());
            phases.push(self.run_phase(build_id, name, plan, analysis, target).await);
            pb.inc(1);
        }
        pb.finish_and_clear();

        let summary = BuildSummary {
            build_id: build_id.to_string(),
            started_at,
            phases,
            preflight_warnings: report.warnings,
        };
        info!(
            build_id,
            attempted = summary.attempted(),
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            "build finished"
        );
        Ok(summary)
    }

    /// Full hand-off: park the plan, provision the site, claim the plan once
    /// provisioning signals completion, then run every phase. Returns `None`
    /// when the plan was already claimed by an earlier signal. A claimed
    /// session is always cleaned, whether or not the run succeeds.
    pub async fn provision_and_build(
        &self,
        store: &SessionStore,
        thresholds: &Thresholds,
        target: &dyn TargetSystem,
        site_id: &str,
        plan: &BuildPlan,
        design: Option<&Value>,
    ) -> Result<Option<BuildSummary>> {
        if let Some(v) = design {
            Document::from_json(v)?;
        }
        let build_id = new_build_id(site_id);
        park(store, &build_id, site_id, plan, design)?;
        info!(build_id = %build_id, site = site_id, "plan queued, provisioning");

        let site_name = if plan.site_name.trim().is_empty() {
            site_id
        } else {
            plan.site_name.as_str()
        };
        let signal = target.provision(site_name);
        let claimed =
            match await_and_apply(store, &build_id, signal, self.settings.signal_timeout()).await? {
                Some(c) => c,
                None => return Ok(None),
            };

        let outcome = async {
            let analysis = claimed
                .design
                .as_ref()
                .map(|v| Document::from_json(v).map(|doc| analyze_document(&doc, thresholds)))
                .transpose()?;
            self.run(&build_id, &claimed.plan, analysis.as_ref(), target).await
        }
        .await;

        if let Err(e) = store.cleanup(&build_id) {
            warn!(build_id = %build_id, error = %e, "session cleanup failed");
        }
        outcome.map(Some)
    }

    async fn run_phase(
        &self,
        build_id: &str,
        name: PhaseName,
        plan: &BuildPlan,
        analysis: Option<&DesignAnalysis>,
        target: &dyn TargetSystem,
    ) -> BuildPhase {
        let ready = plan.is_ready();
        let patterns = match (name, analysis) {
            (PhaseName::SourcePatterns, Some(a)) => collect_patterns(a),
            _ => Vec::new(),
        };

        let outcome: Option<anyhow::Result<()>> = match name {
            PhaseName::Plugins if ready && !plan.plugins.is_empty() => {
                Some(target.install_plugins(&plan.plugins).await)
            }
            PhaseName::ContentStructure
                if ready && (!plan.content_types.is_empty() || !plan.pages.is_empty()) =>
            {
                Some(
                    async {
                        target.create_content_types(&plan.content_types).await?;
                        target.create_pages(&plan.pages).await
                    }
                    .await,
                )
            }
            PhaseName::Design if ready && (plan.design.is_some() || analysis.is_some()) => {
                let defaults = DesignTokens::default();
                let tokens = analysis.map(|a| &a.tokens).unwrap_or(&defaults);
                Some(target.apply_design(tokens, plan.design.as_ref()).await)
            }
            PhaseName::SourcePages => match analysis {
                Some(a) if !a.pages.is_empty() => Some(
                    async {
                        for page in &a.pages {
                            target.create_source_page(page).await?;
                        }
                        Ok::<(), anyhow::Error>(())
                    }
                    .await,
                ),
                _ => None,
            },
            PhaseName::SourcePatterns if !patterns.is_empty() => Some(
                async {
                    for pattern in &patterns {
                        target.register_pattern(pattern).await?;
                    }
                    Ok::<(), anyhow::Error>(())
                }
                .await,
            ),
            _ => None,
        };

        match outcome {
            None => {
                info!(build_id, phase = %name, "phase skipped, preconditions not met");
                BuildPhase::skipped(name)
            }
            Some(Ok(())) => {
                info!(build_id, phase = %name, "phase succeeded");
                BuildPhase {
                    name,
                    attempted: true,
                    succeeded: true,
                    error: None,
                }
            }
            Some(Err(e)) => {
                warn!(build_id, phase = %name, "phase failed: {:#}", e);
                BuildPhase {
                    name,
                    attempted: true,
                    succeeded: false,
                    error: Some(format!("{:#}", e)),
                }
            }
        }
    }
}

static BUILD_SEQ: AtomicU64 = AtomicU64::new(0);

/// `<site>-<timestamp>-<seq>`. The sequence keeps ids distinct when two
/// builds start within the same millisecond.
pub fn new_build_id(site_id: &str) -> String {
    let seq = BUILD_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}-{}", site_id, Utc::now().format("%Y%m%d%H%M%S%3f"), seq)
}

/// Enqueue that refuses to reuse an id already in the store.
fn park(
    store: &SessionStore,
    build_id: &str,
    site_id: &str,
    plan: &BuildPlan,
    design: Option<&Value>,
) -> Result<()> {
    if store.enqueue(build_id, site_id, plan, design)? {
        Ok(())
    } else {
        Err(Error::validation(format!("build {} is already queued", build_id)))
    }
}
