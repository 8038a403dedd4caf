use std::collections::HashSet;

pub const DEFAULT_TEXT: &str = "#1a1a1a";
pub const DEFAULT_BACKGROUND: &str = "#ffffff";
pub const DEFAULT_PRIMARY: &str = "#3b82f6";
pub const DEFAULT_SECONDARY: &str = "#64748b";
pub const DEFAULT_ACCENT: &str = "#f59e0b";

const TEXT_MAX_LUMINANCE: f64 = 0.3;
const BACKGROUND_MIN_LUMINANCE: f64 = 0.8;
const PRIMARY_MIN_SATURATION: f64 = 0.3;

/// Parse `#rgb` / `#rrggbb` (leading `#` optional) into 0..=255 channels.
pub fn parse_hex(hex: &str) -> Option<(u8, u8, u8)> {
    let h = hex.trim().trim_start_matches('#');
    let expanded: String = match h.len() {
        3 => h.chars().flat_map(|c| [c, c]).collect(),
        6 => h.to_string(),
        _ => return None,
    };
    let channel = |i: usize| u8::from_str_radix(expanded.get(i..i + 2)?, 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

/// Perceived brightness in 0..=1.
pub fn luminance(hex: &str) -> Option<f64> {
    let (r, g, b) = parse_hex(hex)?;
    Some((0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64) / 255.0)
}

/// `(max - min) / max` over the channels; 0 for black.
pub fn saturation(hex: &str) -> Option<f64> {
    let (r, g, b) = parse_hex(hex)?;
    let max = r.max(g).max(b) as f64;
    let min = r.min(g).min(b) as f64;
    if max == 0.0 {
        Some(0.0)
    } else {
        Some((max - min) / max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorRoles {
    pub primary: String,
    pub secondary: String,
    pub accent: String,
    pub background: String,
    pub text: String,
}

#[derive(Debug, Clone)]
struct Candidate {
    hex: String,
    luminance: f64,
    saturation: f64,
}

/// Assign semantic roles to observed colors. Roles are allocated in a fixed
/// order (text, background, primary, secondary, accent); each allocation only
/// considers colors not claimed by an earlier role.
pub fn map_to_semantic_colors<'a, I>(observed: I) -> ColorRoles
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    let candidates: Vec<Candidate> = observed
        .into_iter()
        .filter_map(|raw| {
            let hex = normalize_hex(raw)?;
            if !seen.insert(hex.clone()) {
                return None;
            }
            Some(Candidate {
                luminance: luminance(&hex)?,
                saturation: saturation(&hex)?,
                hex,
            })
        })
        .collect();

    let mut claimed: HashSet<String> = HashSet::new();

    let text = allocate(&candidates, &mut claimed, |c| c.luminance < TEXT_MAX_LUMINANCE, |a, b| {
        a.luminance < b.luminance
    })
    .unwrap_or_else(|| DEFAULT_TEXT.to_string());

    let background = allocate(
        &candidates,
        &mut claimed,
        |c| c.luminance > BACKGROUND_MIN_LUMINANCE,
        |a, b| a.luminance > b.luminance,
    )
    .unwrap_or_else(|| DEFAULT_BACKGROUND.to_string());

    let primary = allocate(
        &candidates,
        &mut claimed,
        |c| c.saturation > PRIMARY_MIN_SATURATION,
        |a, b| a.saturation > b.saturation,
    )
    .unwrap_or_else(|| DEFAULT_PRIMARY.to_string());

    let secondary = allocate(&candidates, &mut claimed, |_| true, |_, _| false)
        .unwrap_or_else(|| DEFAULT_SECONDARY.to_string());

    let accent = allocate(&candidates, &mut claimed, |_| true, |_, _| false)
        .unwrap_or_else(|| DEFAULT_ACCENT.to_string());

    ColorRoles {
        primary,
        secondary,
        accent,
        background,
        text,
    }
}

/// Pick the best unclaimed candidate passing `eligible`. `better(a, b)` must
/// be strict so the earliest candidate wins ties.
fn allocate<E, B>(
    candidates: &[Candidate],
    claimed: &mut HashSet<String>,
    eligible: E,
    better: B,
) -> Option<String>
where
    E: Fn(&Candidate) -> bool,
    B: Fn(&Candidate, &Candidate) -> bool,
{
    let mut best: Option<&Candidate> = None;
    for c in candidates {
        if claimed.contains(&c.hex) || !eligible(c) {
            continue;
        }
        best = match best {
            Some(current) if !better(c, current) => Some(current),
            _ => Some(c),
        };
    }
    let hex = best?.hex.clone();
    claimed.insert(hex.clone());
    Some(hex)
}

fn normalize_hex(raw: &str) -> Option<String> {
    let (r, g, b) = parse_hex(raw)?;
    Some(format!("#{:02x}{:02x}{:02x}", r, g, b))
}
