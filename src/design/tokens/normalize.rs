use std::collections::{BTreeMap, HashMap};

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use super::color::{map_to_semantic_colors, ColorRoles};
use super::extract::{RawShadow, RawTokens};
use crate::design::node::trim_float;

/// A fixed, ordered semantic scale: `(key, canonical reference value)`.
pub type ScaleDef = &'static [(&'static str, f64)];

pub const SPACING_SCALE: ScaleDef = &[
    ("xs", 4.0),
    ("sm", 8.0),
    ("md", 16.0),
    ("lg", 24.0),
    ("xl", 32.0),
    ("2xl", 48.0),
    ("3xl", 64.0),
];

pub const FONT_SIZE_SCALE: ScaleDef = &[
    ("xs", 12.0),
    ("sm", 14.0),
    ("base", 16.0),
    ("lg", 18.0),
    ("xl", 20.0),
    ("2xl", 24.0),
    ("3xl", 30.0),
    ("4xl", 36.0),
    ("5xl", 48.0),
];

pub const FONT_WEIGHT_SCALE: ScaleDef = &[
    ("light", 300.0),
    ("normal", 400.0),
    ("medium", 500.0),
    ("semibold", 600.0),
    ("bold", 700.0),
];

pub const LINE_HEIGHT_SCALE: ScaleDef = &[("tight", 1.25), ("normal", 1.5), ("relaxed", 1.75)];

pub const RADIUS_SCALE: ScaleDef = &[
    ("sm", 2.0),
    ("md", 4.0),
    ("lg", 8.0),
    ("xl", 16.0),
    ("2xl", 24.0),
];

pub const RADIUS_FULL: f64 = 9999.0;

/// Blur references for the sm/md/lg shadow slots.
const SHADOW_SCALE: ScaleDef = &[("sm", 2.0), ("md", 6.0), ("lg", 15.0)];

const DEFAULT_SHADOWS: [(&str, &str); 3] = [
    ("sm", "0 1px 2px 0 rgba(0, 0, 0, 0.05)"),
    ("md", "0 4px 6px -1px rgba(0, 0, 0, 0.1)"),
    ("lg", "0 10px 15px -3px rgba(0, 0, 0, 0.1)"),
];

pub const DEFAULT_FONT_FAMILIES: [&str; 2] = ["Inter", "sans-serif"];

/// A normalized scale: every key of its definition, in definition order.
#[derive(Debug, Clone, PartialEq)]
pub struct Scale {
    entries: Vec<(String, f64)>,
}

impl Serialize for Scale {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl Scale {
    pub fn get(&self, key: &str) -> Option<f64> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }

    pub fn values(&self) -> Vec<f64> {
        self.entries.iter().map(|(_, v)| *v).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Map raw values onto a fixed scale. Each slot independently takes the raw
/// value nearest its reference value; an empty collection yields the
/// reference values themselves.
///
/// Candidates are deduplicated and sorted ascending before the scan, so ties
/// go to the smaller value rather than to whichever raw value came first.
/// The result then depends only on the set of raw values, which keeps
/// normalization idempotent.
pub fn normalize_scale(raw: &[f64], def: ScaleDef) -> Scale {
    let mut candidates: Vec<f64> = raw.iter().copied().filter(|v| v.is_finite()).collect();
    candidates.sort_by(|a, b| a.total_cmp(b));
    candidates.dedup();

    let entries = def
        .iter()
        .map(|(key, reference)| {
            let value = nearest(&candidates, *reference).unwrap_or(*reference);
            (key.to_string(), value)
        })
        .collect();
    Scale { entries }
}

fn nearest(candidates: &[f64], target: f64) -> Option<f64> {
    let mut best: Option<f64> = None;
    for &c in candidates {
        match best {
            Some(b) if (c - target).abs() >= (b - target).abs() => {}
            _ => best = Some(c),
        }
    }
    best
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorTokens {
    pub primary: String,
    pub secondary: String,
    pub accent: String,
    pub background: String,
    pub text: String,
    /// Node name → hex as observed, sorted by name.
    pub raw: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Typography {
    pub font_families: Vec<String>,
    pub sizes: Scale,
    pub weights: Scale,
    pub line_heights: Scale,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Shadows {
    pub sm: String,
    pub md: String,
    pub lg: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BorderRadius {
    pub scale: Scale,
    pub full: f64,
}

/// Normalized, semantically keyed design tokens. Every key is populated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DesignTokens {
    pub colors: ColorTokens,
    pub typography: Typography,
    pub spacing: Scale,
    pub border_radius: BorderRadius,
    pub shadows: Shadows,
}

impl Default for DesignTokens {
    fn default() -> Self {
        normalize_tokens(&RawTokens::default())
    }
}

pub fn normalize_tokens(raw: &RawTokens) -> DesignTokens {
    let ColorRoles {
        primary,
        secondary,
        accent,
        background,
        text,
    } = map_to_semantic_colors(raw.color_values());

    DesignTokens {
        colors: ColorTokens {
            primary,
            secondary,
            accent,
            background,
            text,
            raw: raw.colors.iter().cloned().collect(),
        },
        typography: Typography {
            font_families: rank_families(&raw.font_families),
            sizes: normalize_scale(&raw.font_sizes, FONT_SIZE_SCALE),
            weights: normalize_scale(&raw.font_weights, FONT_WEIGHT_SCALE),
            line_heights: normalize_scale(&raw.line_heights, LINE_HEIGHT_SCALE),
        },
        spacing: normalize_scale(&raw.spacing, SPACING_SCALE),
        border_radius: BorderRadius {
            scale: normalize_scale(&raw.radii, RADIUS_SCALE),
            full: RADIUS_FULL,
        },
        shadows: normalize_shadows(&raw.shadows),
    }
}

/// Distinct families, most used first; ties keep first appearance.
fn rank_families(families: &[String]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for f in families {
        let count = counts.entry(f.as_str()).or_insert(0);
        if *count == 0 {
            order.push(f.as_str());
        }
        *count += 1;
    }
    if order.is_empty() {
        return DEFAULT_FONT_FAMILIES.iter().map(|s| s.to_string()).collect();
    }
    // stable sort keeps first-appearance order among equal counts
    order.sort_by(|a, b| counts[b].cmp(&counts[a]));
    order.into_iter().map(str::to_string).collect()
}

fn normalize_shadows(raw: &[RawShadow]) -> Shadows {
    let mut sorted: Vec<&RawShadow> = raw.iter().filter(|s| s.blur.is_finite()).collect();
    sorted.sort_by(|a, b| a.blur.total_cmp(&b.blur));

    let pick = |slot: usize| -> String {
        let (_, reference) = SHADOW_SCALE[slot];
        let mut best: Option<&RawShadow> = None;
        for &s in &sorted {
            match best {
                Some(b) if (s.blur - reference).abs() >= (b.blur - reference).abs() => {}
                _ => best = Some(s),
            }
        }
        match best {
            Some(s) => shadow_css(s),
            None => DEFAULT_SHADOWS[slot].1.to_string(),
        }
    };

    Shadows {
        sm: pick(0),
        md: pick(1),
        lg: pick(2),
    }
}

fn shadow_css(s: &RawShadow) -> String {
    format!(
        "{}px {}px {}px {}",
        trim_float(s.offset_x),
        trim_float(s.offset_y),
        trim_float(s.blur),
        s.color.to_css()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::node::Rgba;

    #[test]
    fn empty_collections_yield_reference_values() {
        for def in [SPACING_SCALE, FONT_SIZE_SCALE, FONT_WEIGHT_SCALE, LINE_HEIGHT_SCALE, RADIUS_SCALE] {
            let scale = normalize_scale(&[], def);
            let expected: Vec<f64> = def.iter().map(|(_, v)| *v).collect();
            assert_eq!(scale.values(), expected);
            assert_eq!(scale.len(), def.len());
        }
    }

    #[test]
    fn nearest_value_per_slot() {
        let scale = normalize_scale(&[5.0, 10.0, 20.0, 60.0], SPACING_SCALE);
        assert_eq!(scale.get("xs"), Some(5.0));
        assert_eq!(scale.get("sm"), Some(10.0));
        assert_eq!(scale.get("md"), Some(20.0));
        assert_eq!(scale.get("lg"), Some(20.0));
        assert_eq!(scale.get("xl"), Some(20.0));
        assert_eq!(scale.get("2xl"), Some(60.0));
        assert_eq!(scale.get("3xl"), Some(60.0));
    }

    #[test]
    fn ties_go_to_the_smaller_value() {
        // 6 and 10 are both 2 away from sm=8
        let scale = normalize_scale(&[10.0, 6.0], SPACING_SCALE);
        assert_eq!(scale.get("sm"), Some(6.0));
        let reordered = normalize_scale(&[6.0, 10.0, 6.0], SPACING_SCALE);
        assert_eq!(reordered.get("sm"), Some(6.0));
    }

    #[test]
    fn normalization_is_idempotent() {
        let inputs: Vec<Vec<f64>> = vec![
            vec![],
            vec![3.0],
            vec![10.0, 6.0],
            vec![1.0, 7.0, 13.0, 19.0, 99.0, 41.0],
            vec![12.0, 12.0, 12.0, 28.0],
            vec![0.5, 1000.0, f64::NAN],
        ];
        for def in [SPACING_SCALE, FONT_SIZE_SCALE, RADIUS_SCALE, LINE_HEIGHT_SCALE] {
            for raw in &inputs {
                let once = normalize_scale(raw, def);
                let twice = normalize_scale(&once.values(), def);
                assert_eq!(once, twice, "not idempotent for {:?}", raw);
            }
        }
    }

    #[test]
    fn every_key_populated_for_empty_tree() {
        let tokens = DesignTokens::default();
        assert_eq!(tokens.spacing.len(), SPACING_SCALE.len());
        assert_eq!(tokens.typography.sizes.get("base"), Some(16.0));
        assert_eq!(tokens.typography.weights.get("bold"), Some(700.0));
        assert_eq!(tokens.typography.line_heights.get("normal"), Some(1.5));
        assert_eq!(tokens.border_radius.scale.get("lg"), Some(8.0));
        assert_eq!(tokens.border_radius.full, RADIUS_FULL);
        assert_eq!(tokens.typography.font_families, vec!["Inter", "sans-serif"]);
        assert_eq!(tokens.shadows.md, DEFAULT_SHADOWS[1].1);
        assert_eq!(tokens.colors.background, "#ffffff");
    }

    #[test]
    fn families_ranked_by_use() {
        let fams: Vec<String> = ["Inter", "Lora", "Lora", "Mono"].iter().map(|s| s.to_string()).collect();
        assert_eq!(rank_families(&fams), vec!["Lora", "Inter", "Mono"]);
    }

    #[test]
    fn shadows_pick_nearest_blur() {
        let black = Rgba { r: 0.0, g: 0.0, b: 0.0, a: 0.2 };
        let raw = vec![
            RawShadow { blur: 20.0, offset_x: 0.0, offset_y: 8.0, color: black },
            RawShadow { blur: 1.0, offset_x: 0.0, offset_y: 1.0, color: black },
        ];
        let s = normalize_shadows(&raw);
        assert_eq!(s.sm, "0px 1px 1px rgba(0, 0, 0, 0.2)");
        assert_eq!(s.lg, "0px 8px 20px rgba(0, 0, 0, 0.2)");
        // md (6) is 5 from 1 and 14 from 20
        assert_eq!(s.md, s.sm);
    }

    #[test]
    fn scale_serializes_as_ordered_map() {
        let scale = normalize_scale(&[], LINE_HEIGHT_SCALE);
        let json = serde_json::to_string(&scale).unwrap();
        assert_eq!(json, r#"{"tight":1.25,"normal":1.5,"relaxed":1.75}"#);
    }
}
