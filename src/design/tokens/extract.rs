use std::collections::HashSet;

use crate::design::node::{CornerRadius, Effect, Node, NodeKind, Paint, Rgba};
use crate::design::walk::walk;

#[derive(Debug, Clone, PartialEq)]
pub struct RawShadow {
    pub blur: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    pub color: Rgba,
}

/// Values observed in a tree before normalization. Duplicates are kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTokens {
    /// Node name → hex, first write wins per name, in discovery order.
    pub colors: Vec<(String, String)>,
    pub font_families: Vec<String>,
    pub font_sizes: Vec<f64>,
    pub font_weights: Vec<f64>,
    /// Line height as a ratio of font size.
    pub line_heights: Vec<f64>,
    pub radii: Vec<f64>,
    pub spacing: Vec<f64>,
    pub shadows: Vec<RawShadow>,
}

impl RawTokens {
    pub fn color_values(&self) -> impl Iterator<Item = &str> {
        self.colors.iter().map(|(_, hex)| hex.as_str())
    }
}

/// Walk the whole tree once and harvest raw design values.
pub fn extract_tokens(root: &Node) -> RawTokens {
    let mut raw = RawTokens::default();
    let mut named: HashSet<String> = HashSet::new();

    walk(root, &mut |node, _| {
        record_fill(node, &mut raw, &mut named);

        if let NodeKind::Text(run) = &node.kind {
            let style = &run.style;
            if let Some(family) = style.font_family.as_ref().filter(|f| !f.trim().is_empty()) {
                raw.font_families.push(family.trim().to_string());
            }
            if let Some(size) = style.font_size.filter(|s| *s > 0.0) {
                raw.font_sizes.push(size);
                if let Some(lh) = style.line_height_px.filter(|l| *l > 0.0) {
                    raw.line_heights.push(lh / size);
                }
            }
            if let Some(weight) = style.font_weight.filter(|w| *w > 0.0) {
                raw.font_weights.push(weight);
            }
        }

        match &node.corner {
            Some(CornerRadius::Uniform(r)) if *r > 0.0 => raw.radii.push(*r),
            Some(CornerRadius::PerCorner(corners)) => {
                raw.radii.extend(corners.iter().copied().filter(|r| *r > 0.0));
            }
            _ => {}
        }

        if let Some(layout) = node.layout() {
            for v in [layout.item_spacing, layout.padding_left, layout.padding_top]
                .into_iter()
                .flatten()
            {
                if v > 0.0 {
                    raw.spacing.push(v);
                }
            }
        }

        for effect in &node.effects {
            if let Effect::DropShadow {
                radius,
                offset_x,
                offset_y,
                color,
                visible: true,
            } = effect
            {
                raw.shadows.push(RawShadow {
                    blur: *radius,
                    offset_x: *offset_x,
                    offset_y: *offset_y,
                    color: *color,
                });
            }
        }
    });

    raw
}

fn record_fill(node: &Node, raw: &mut RawTokens, named: &mut HashSet<String>) {
    let name = node.name.trim();
    if name.is_empty() || named.contains(name) {
        return;
    }
    let solid = node.fills.iter().find_map(|p| match p {
        Paint::Solid {
            color,
            visible: true,
            ..
        } => Some(color),
        _ => None,
    });
    if let Some(color) = solid {
        named.insert(name.to_string());
        raw.colors.push((name.to_string(), color.to_hex()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree() -> Node {
        Node::from_json(&json!({
            "type": "FRAME",
            "name": "Page",
            "fills": [{ "type": "SOLID", "color": { "r": 1, "g": 1, "b": 1 } }],
            "itemSpacing": 24,
            "paddingLeft": 32,
            "paddingTop": 0,
            "children": [
                {
                    "type": "TEXT",
                    "name": "Title",
                    "characters": "Hi",
                    "fills": [{ "type": "SOLID", "color": { "r": 0.1, "g": 0.1, "b": 0.1 } }],
                    "style": { "fontFamily": "Poppins", "fontSize": 40, "fontWeight": 700, "lineHeightPx": 48 }
                },
                {
                    "type": "RECTANGLE",
                    "name": "Card",
                    "cornerRadius": 12,
                    "fills": [
                        { "type": "SOLID", "visible": false, "color": { "r": 1, "g": 0, "b": 0 } },
                        { "type": "SOLID", "color": { "r": 0, "g": 0, "b": 1 } }
                    ],
                    "effects": [
                        { "type": "DROP_SHADOW", "radius": 8, "offset": { "x": 0, "y": 4 }, "color": { "r": 0, "g": 0, "b": 0, "a": 0.1 } },
                        { "type": "DROP_SHADOW", "visible": false, "radius": 30 },
                        { "type": "INNER_SHADOW", "radius": 2 }
                    ]
                },
                {
                    "type": "RECTANGLE",
                    "name": "Card",
                    "rectangleCornerRadii": [6, 6, 0, 0],
                    "fills": [{ "type": "SOLID", "color": { "r": 0, "g": 1, "b": 0 } }]
                }
            ]
        }))
    }

    #[test]
    fn harvests_every_category() {
        let raw = extract_tokens(&tree());
        assert_eq!(
            raw.colors,
            vec![
                ("Page".to_string(), "#ffffff".to_string()),
                ("Title".to_string(), "#1a1a1a".to_string()),
                ("Card".to_string(), "#0000ff".to_string()),
            ]
        );
        assert_eq!(raw.font_families, vec!["Poppins"]);
        assert_eq!(raw.font_sizes, vec![40.0]);
        assert_eq!(raw.font_weights, vec![700.0]);
        assert_eq!(raw.line_heights, vec![1.2]);
        assert_eq!(raw.radii, vec![12.0, 6.0, 6.0]);
        assert_eq!(raw.spacing, vec![24.0, 32.0]);
        assert_eq!(raw.shadows.len(), 1);
        assert_eq!(raw.shadows[0].blur, 8.0);
        assert_eq!(raw.shadows[0].offset_y, 4.0);
    }

    #[test]
    fn hidden_nodes_are_skipped() {
        let n = Node::from_json(&json!({
            "type": "FRAME",
            "name": "Hidden",
            "visible": false,
            "fills": [{ "type": "SOLID", "color": { "r": 1, "g": 0, "b": 0 } }]
        }));
        assert!(extract_tokens(&n).colors.is_empty());
    }

    #[test]
    fn text_inside_hidden_frame_is_skipped() {
        let n = Node::from_json(&json!({
            "type": "FRAME",
            "name": "Root",
            "children": [{
                "type": "FRAME",
                "name": "Old hero",
                "visible": false,
                "itemSpacing": 40,
                "children": [{
                    "type": "TEXT",
                    "name": "Title",
                    "characters": "Draft",
                    "style": { "fontFamily": "Comic Sans", "fontSize": 72, "fontWeight": 900 },
                    "fills": [{ "type": "SOLID", "color": { "r": 0, "g": 1, "b": 0 } }]
                }]
            }]
        }));
        let raw = extract_tokens(&n);
        assert!(raw.font_families.is_empty());
        assert!(raw.font_sizes.is_empty());
        assert!(raw.colors.is_empty());
        assert!(raw.spacing.is_empty());
    }

    #[test]
    fn empty_tree_yields_empty_collections() {
        let raw = extract_tokens(&Node::from_json(&json!({ "type": "FRAME" })));
        assert_eq!(raw, RawTokens::default());
    }
}
