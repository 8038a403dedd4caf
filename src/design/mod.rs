pub mod content;
pub mod node;
pub mod pages;
pub mod sections;
pub mod tokens;
pub mod walk;

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, info};

use crate::config::Thresholds;
use node::Document;
use sections::{Section, SectionKind};
use tokens::DesignTokens;

#[derive(Debug, Clone, Serialize)]
pub struct PageAnalysis {
    pub id: String,
    pub name: String,
    pub sections: Vec<Section>,
}

/// Everything mined from one design file.
#[derive(Debug, Clone, Serialize)]
pub struct DesignAnalysis {
    pub name: String,
    pub tokens: DesignTokens,
    pub pages: Vec<PageAnalysis>,
}

/// A section worth registering as a reusable block pattern.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pattern {
    pub slug: String,
    pub title: String,
    pub section: Section,
}

/// Three-pass pipeline: document → tokens → pages → sections.
pub fn analyze_document(doc: &Document, t: &Thresholds) -> DesignAnalysis {
    let tokens = tokens::design_tokens(&doc.root);

    let pages: Vec<PageAnalysis> = pages::find_pages(doc, t)
        .into_iter()
        .map(|page| {
            let sections = sections::classify_sections(&page.children, t);
            debug!(page = %page.name, sections = sections.len(), "classified page");
            PageAnalysis {
                id: page.id.clone(),
                name: page.name.clone(),
                sections,
            }
        })
        .collect();

    info!(
        file = %doc.name,
        pages = pages.len(),
        sections = pages.iter().map(|p| p.sections.len()).sum::<usize>(),
        "analyzed design file"
    );

    DesignAnalysis {
        name: doc.name.clone(),
        tokens,
        pages,
    }
}

/// Sections with repeating items, plus sections whose source name recurs on
/// two or more pages (shared headers and footers). Deduplicated by kind and
/// name, first occurrence kept.
pub fn collect_patterns(analysis: &DesignAnalysis) -> Vec<Pattern> {
    let mut pages_per_name: HashMap<&str, HashSet<&str>> = HashMap::new();
    for page in &analysis.pages {
        for s in &page.sections {
            pages_per_name
                .entry(s.source.name.as_str())
                .or_default()
                .insert(page.id.as_str());
        }
    }

    let mut seen: HashSet<(SectionKind, &str)> = HashSet::new();
    let mut patterns = Vec::new();
    for s in analysis.pages.iter().flat_map(|p| &p.sections) {
        let recurring = pages_per_name
            .get(s.source.name.as_str())
            .is_some_and(|pages| pages.len() >= 2);
        if s.content.items.is_empty() && !recurring {
            continue;
        }
        if !seen.insert((s.kind, s.source.name.as_str())) {
            continue;
        }
        patterns.push(Pattern {
            slug: pattern_slug(s),
            title: s.source.name.trim().to_string(),
            section: s.clone(),
        });
    }
    patterns
}

/// Longest slug that still passes `workspace::site_dir`.
pub const MAX_SLUG_LEN: usize = 64;

/// Lowercase ASCII slug, runs of other characters collapsed to `-`.
/// Anything longer than [`MAX_SLUG_LEN`] is cut and suffixed with a hash
/// of the full slug, so long names sharing a prefix stay distinct.
pub fn slugify(name: &str) -> String {
    let mut slug = String::new();
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    cap_slug(slug.trim_end_matches('-'))
}

fn cap_slug(slug: &str) -> String {
    if slug.len() <= MAX_SLUG_LEN {
        return slug.to_string();
    }
    // FNV-1a, stable across runs and platforms.
    let hash = slug
        .bytes()
        .fold(0x811c_9dc5u32, |h, b| (h ^ u32::from(b)).wrapping_mul(0x0100_0193));
    // slug is ASCII, so byte slicing is safe
    let head = slug[..MAX_SLUG_LEN - 9].trim_end_matches('-');
    format!("{}-{:08x}", head, hash)
}

fn pattern_slug(s: &Section) -> String {
    let slug = slugify(&s.source.name);
    if slug.is_empty() {
        s.kind.as_str().to_string()
    } else {
        cap_slug(&format!("{}-{}", s.kind.as_str(), slug))
    }
}
