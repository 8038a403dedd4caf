use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::Value;

use sitesmith::build::session::SessionStore;
use sitesmith::build::target::FsTarget;
use sitesmith::build::{BuildSummary, Orchestrator};
use sitesmith::config::Settings;
use sitesmith::design::node::Document;
use sitesmith::design::{analyze_document, collect_patterns, tokens};
use sitesmith::plan::BuildPlan;
use sitesmith::response::ResponseExtractor;
use sitesmith::retry::RetryPolicy;
use sitesmith::source::{image_node_ids, DesignApi};

#[derive(Parser)]
#[command(name = "sitesmith", about = "Design file + model plan → site, phase by phase")]
struct Cli {
    /// Settings file (default: ./sitesmith.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print normalized design tokens for a design file
    Tokens {
        design: PathBuf,
    },
    /// Table of classified sections per page
    Sections {
        design: PathBuf,
    },
    /// Full analysis (tokens, pages, sections, patterns) as JSON
    Analyze {
        design: PathBuf,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Recover the JSON plan from raw model output
    Extract {
        response: PathBuf,
    },
    /// Download a design file from the design tool API
    Fetch {
        file_key: String,
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Provision a site and apply a plan to it
    Build {
        /// Site identifier, used as the directory name under sites_root
        #[arg(short, long)]
        site: String,
        /// Raw model output containing the plan
        #[arg(short, long)]
        plan: PathBuf,
        /// Design file to mine for tokens, source pages and patterns
        #[arg(short, long)]
        design: Option<PathBuf>,
    },
    /// Show build sessions
    Sessions {
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    let result = match cli.command {
        Commands::Tokens { design } => {
            let doc = load_document(&design)?;
            let tokens = tokens::design_tokens(&doc.root);
            println!("{}", serde_json::to_string_pretty(&tokens)?);
            Ok(())
        }
        Commands::Sections { design } => {
            let doc = load_document(&design)?;
            let analysis = analyze_document(&doc, &settings.thresholds);
            if analysis.pages.is_empty() {
                println!("No pages found.");
                return Ok(());
            }

            println!(
                "{:<20} | {:>3} | {:<12} | {:<20} | {:<28} | {:>5}",
                "Page", "#", "Kind", "Source", "Heading", "Items"
            );
            println!("{}", "-".repeat(102));
            for page in &analysis.pages {
                for (i, s) in page.sections.iter().enumerate() {
                    let heading = s.content.heading.as_deref().unwrap_or("-");
                    println!(
                        "{:<20} | {:>3} | {:<12} | {:<20} | {:<28} | {:>5}",
                        truncate(&page.name, 20),
                        i + 1,
                        s.kind,
                        truncate(&s.source.name, 20),
                        truncate(heading, 28),
                        s.content.items.len()
                    );
                }
            }

            let patterns = collect_patterns(&analysis);
            if !patterns.is_empty() {
                println!("\n--- Patterns ---");
                for p in &patterns {
                    println!("  {}: {}", p.slug, p.title);
                }
            }
            let total: usize = analysis.pages.iter().map(|p| p.sections.len()).sum();
            println!("\n{} pages | {} sections", analysis.pages.len(), total);
            Ok(())
        }
        Commands::Analyze { design, out } => {
            let doc = load_document(&design)?;
            let analysis = analyze_document(&doc, &settings.thresholds);
            let patterns = collect_patterns(&analysis);
            let report = serde_json::json!({ "analysis": analysis, "patterns": patterns });
            let text = serde_json::to_string_pretty(&report)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, text)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("Wrote analysis of {} pages to {}", analysis.pages.len(), path.display());
                }
                None => println!("{}", text),
            }
            Ok(())
        }
        Commands::Extract { response } => {
            let text = read(&response)?;
            let extractor = ResponseExtractor::new(settings.build.completion_marker.clone());
            match extractor.extract(&text) {
                Some(recovered) => {
                    println!("Recovered via {:?}:", recovered.strategy);
                    println!("{}", serde_json::to_string_pretty(&recovered.value)?);
                    match BuildPlan::from_value(recovered.value) {
                        Ok(plan) => println!(
                            "\nPlan: {} plugins, {} content types, {} pages, ready: {}",
                            plan.plugins.len(),
                            plan.content_types.len(),
                            plan.pages.len(),
                            plan.is_ready()
                        ),
                        Err(e) => println!("\nNot a usable plan: {}", e),
                    }
                }
                None => println!("No structured response yet (model has not finished)."),
            }
            Ok(())
        }
        Commands::Fetch { file_key, out } => {
            let api = DesignApi::new(&settings.design_api, RetryPolicy::from(&settings.retry))?;
            let mut file = api.fetch_file(&file_key).await?;
            let doc = Document::from_json(&file)?;
            let ids = image_node_ids(&doc);
            let images = api.fetch_image_urls(&file_key, &ids).await;
            if let Value::Object(map) = &mut file {
                map.insert("images".into(), serde_json::to_value(&images)?);
            }
            std::fs::write(&out, serde_json::to_string_pretty(&file)?)
                .with_context(|| format!("writing {}", out.display()))?;
            println!(
                "Saved {} to {} ({} of {} image fills resolved)",
                doc.name,
                out.display(),
                images.len(),
                ids.len()
            );
            Ok(())
        }
        Commands::Build { site, plan, design } => {
            let text = read(&plan)?;
            let extractor = ResponseExtractor::new(settings.build.completion_marker.clone());
            let value = match extractor.extract(&text) {
                Some(r) => r.value,
                None => {
                    println!("No structured plan in {} yet. Nothing to build.", plan.display());
                    return Ok(());
                }
            };
            let build_plan = BuildPlan::from_value(value)?;
            let design_value = design
                .as_deref()
                .map(|p| -> anyhow::Result<Value> { Ok(serde_json::from_str(&read(p)?)?) })
                .transpose()?;

            let target = FsTarget::new(&settings.build.sites_root, &site, &settings.build.cli_tool)?;
            let store = SessionStore::open(&settings.build.session_db)?;
            let orchestrator =
                Orchestrator::new(&settings.build).with_progress(std::io::stderr().is_terminal());
            let summary = orchestrator
                .provision_and_build(
                    &store,
                    &settings.thresholds,
                    &target,
                    &site,
                    &build_plan,
                    design_value.as_ref(),
                )
                .await?;
            match summary {
                Some(s) => print_summary(&s),
                None => println!("Plan was already applied by an earlier completion signal."),
            }
            Ok(())
        }
        Commands::Sessions { limit } => {
            let store = SessionStore::open(&settings.build.session_db)?;
            let rows = store.list(Some(limit))?;
            if rows.is_empty() {
                println!("No build sessions.");
                return Ok(());
            }
            println!("{:<36} | {:<16} | {:<8} | {:<25}", "Build", "Site", "State", "Updated");
            println!("{}", "-".repeat(94));
            for r in &rows {
                println!(
                    "{:<36} | {:<16} | {:<8} | {:<25}",
                    truncate(&r.build_id, 36),
                    truncate(&r.site_id, 16),
                    r.state.as_str(),
                    r.updated_at
                );
            }
            let s = store.stats()?;
            println!("\nPending: {} | Applied: {} | Cleaned: {}", s.pending, s.applied, s.cleaned);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn load_document(path: &Path) -> anyhow::Result<Document> {
    let value: Value = serde_json::from_str(&read(path)?)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(Document::from_json(&value)?)
}

fn print_summary(s: &BuildSummary) {
    println!("Build {} (started {})", s.build_id, s.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
    for w in &s.preflight_warnings {
        println!("  warning: {}", w);
    }
    println!("{:<18} | {:<9} | {:<9} | {}", "Phase", "Attempted", "Succeeded", "Error");
    println!("{}", "-".repeat(72));
    for p in &s.phases {
        println!(
            "{:<18} | {:<9} | {:<9} | {}",
            p.name.as_str(),
            yes_no(p.attempted),
            yes_no(p.succeeded),
            p.error.as_deref().map(|e| truncate(e, 40)).unwrap_or_default()
        );
    }
    if s.success() {
        println!("\nSucceeded: {} of {} attempted phases.", s.succeeded(), s.attempted());
    } else {
        println!("\nSucceeded with {} phases failed.", s.failed());
    }
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "yes"
    } else {
        "no"
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
