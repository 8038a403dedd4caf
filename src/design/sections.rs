use serde::Serialize;

use super::content::{extract_content, is_button_name, repeating_children, ExtractedContent};
use super::node::{Bounds, Node};
use super::walk;
use crate::config::Thresholds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Hero,
    Features,
    Testimonials,
    Cta,
    Footer,
    Navigation,
    Gallery,
    Contact,
    About,
    Pricing,
    Team,
    Faq,
    Stats,
    Content,
}

impl SectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::Hero => "hero",
            SectionKind::Features => "features",
            SectionKind::Testimonials => "testimonials",
            SectionKind::Cta => "cta",
            SectionKind::Footer => "footer",
            SectionKind::Navigation => "navigation",
            SectionKind::Gallery => "gallery",
            SectionKind::Contact => "contact",
            SectionKind::About => "about",
            SectionKind::Pricing => "pricing",
            SectionKind::Team => "team",
            SectionKind::Faq => "faq",
            SectionKind::Stats => "stats",
            SectionKind::Content => "content",
        }
    }
}

impl std::fmt::Display for SectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name fragments per kind, checked in this order; first match wins.
const NAME_TABLE: &[(SectionKind, &[&str])] = &[
    (SectionKind::Hero, &["hero", "banner", "jumbotron", "masthead"]),
    (SectionKind::Features, &["feature", "benefit", "service"]),
    (SectionKind::Testimonials, &["testimonial", "review", "quote"]),
    (SectionKind::Cta, &["cta", "call to action", "call-to-action", "signup", "sign up"]),
    (SectionKind::Footer, &["footer"]),
    (SectionKind::Navigation, &["nav", "header", "menu", "topbar"]),
    (SectionKind::Gallery, &["gallery", "portfolio", "showcase"]),
    (SectionKind::Contact, &["contact"]),
    (SectionKind::About, &["about", "story", "mission"]),
    (SectionKind::Pricing, &["pricing", "plans", "price"]),
    (SectionKind::Team, &["team", "people", "staff"]),
    (SectionKind::Faq, &["faq", "questions"]),
    (SectionKind::Stats, &["stats", "numbers", "metrics", "counter"]),
];

/// Where a section came from in the visual-node tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRef {
    pub id: String,
    pub name: String,
    pub bounds: Bounds,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub kind: SectionKind,
    pub source: SourceRef,
    pub content: ExtractedContent,
}

pub fn kind_from_name(name: &str) -> Option<SectionKind> {
    let lower = name.to_lowercase();
    NAME_TABLE
        .iter()
        .find(|(_, needles)| needles.iter().any(|n| lower.contains(n)))
        .map(|(kind, _)| *kind)
}

/// Name first, then structure.
pub fn classify_node(node: &Node, t: &Thresholds) -> SectionKind {
    kind_from_name(&node.name).unwrap_or_else(|| classify_structure(node, t))
}

fn classify_structure(node: &Node, t: &Thresholds) -> SectionKind {
    let has_button = walk::any(node, |n| is_button_name(&n.name));
    let tall = node.bounds.height >= t.hero_min_height;
    let short = node.bounds.height < t.cta_max_height;

    if tall && has_button && has_large_image(node, t) {
        return SectionKind::Hero;
    }
    if repeating_children(node, t.repeat_tolerance).is_some() {
        return SectionKind::Features;
    }
    if short && has_button {
        return SectionKind::Cta;
    }
    SectionKind::Content
}

fn has_large_image(node: &Node, t: &Thresholds) -> bool {
    let min_area = node.bounds.area() * t.large_image_ratio;
    walk::any(node, |n| n.has_image_fill() && n.bounds.area() >= min_area)
}

fn too_small(node: &Node, t: &Thresholds) -> bool {
    node.bounds.width < t.section_min_width || node.bounds.height < t.section_min_height
}

/// Segment a page's direct children into ordered sections. Children are
/// visited top to bottom; decorative fragments and sections without any
/// heading, body or button are dropped.
pub fn classify_sections(children: &[Node], t: &Thresholds) -> Vec<Section> {
    let mut ordered: Vec<&Node> = children.iter().filter(|n| n.visible).collect();
    ordered.sort_by(|a, b| a.bounds.y.total_cmp(&b.bounds.y));

    ordered
        .into_iter()
        .filter(|n| !too_small(n, t))
        .filter_map(|node| {
            let content = extract_content(node, t);
            if !content.is_meaningful() {
                return None;
            }
            Some(Section {
                kind: classify_node(node, t),
                source: SourceRef {
                    id: node.id.clone(),
                    name: node.name.clone(),
                    bounds: node.bounds,
                },
                content,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::node::fixtures::{frame, image, text};

    fn nodes(values: Vec<serde_json::Value>) -> Vec<Node> {
        values.iter().map(Node::from_json).collect()
    }

    #[test]
    fn name_table_order() {
        assert_eq!(kind_from_name("Hero Header"), Some(SectionKind::Hero));
        assert_eq!(kind_from_name("Site Header"), Some(SectionKind::Navigation));
        assert_eq!(kind_from_name("Customer Reviews"), Some(SectionKind::Testimonials));
        assert_eq!(kind_from_name("FAQ"), Some(SectionKind::Faq));
        assert_eq!(kind_from_name("Frame 12"), None);
    }

    #[test]
    fn features_section_with_two_cards() {
        let card = |name: &str, w: f64, h: f64, title: &str| {
            frame(
                name,
                0.0,
                0.0,
                w,
                h,
                vec![
                    text("Title", title, 24.0),
                    text("Copy", "Explains why this feature matters", 14.0),
                ],
            )
        };
        let children = nodes(vec![frame(
            "Features",
            0.0,
            800.0,
            1200.0,
            500.0,
            vec![card("Card A", 200.0, 300.0, "Fast"), card("Card B", 210.0, 290.0, "Secure")],
        )]);
        let sections = classify_sections(&children, &Thresholds::default());
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].kind, SectionKind::Features);
        assert_eq!(sections[0].content.items.len(), 2);
    }

    #[test]
    fn sorted_by_vertical_position_and_small_nodes_dropped() {
        let children = nodes(vec![
            frame("Footer", 0.0, 2000.0, 1200.0, 200.0, vec![text("t", "Copyright notice for the site", 14.0)]),
            frame("Icon", 0.0, 10.0, 24.0, 24.0, vec![text("t", "Decorative icon label", 14.0)]),
            frame("Frame 1", 0.0, 100.0, 1200.0, 400.0, vec![text("t", "Welcome aboard", 40.0)]),
        ]);
        let sections = classify_sections(&children, &Thresholds::default());
        let kinds: Vec<SectionKind> = sections.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![SectionKind::Content, SectionKind::Footer]);
        assert_eq!(sections[0].source.name, "Frame 1");
    }

    #[test]
    fn sections_without_content_are_dropped() {
        let children = nodes(vec![frame("Spacer", 0.0, 0.0, 1200.0, 200.0, vec![])]);
        assert!(classify_sections(&children, &Thresholds::default()).is_empty());
    }

    #[test]
    fn structural_hero() {
        let node = Node::from_json(&frame(
            "Frame 7",
            0.0,
            0.0,
            1440.0,
            800.0,
            vec![
                image("Photo", 1440.0, 800.0),
                text("t", "Make something great", 56.0),
                frame("Button", 0.0, 0.0, 160.0, 48.0, vec![text("l", "Begin", 16.0)]),
            ],
        ));
        assert_eq!(classify_node(&node, &Thresholds::default()), SectionKind::Hero);
    }

    #[test]
    fn structural_features_from_repetition() {
        let node = Node::from_json(&frame(
            "Frame 8",
            0.0,
            0.0,
            1440.0,
            600.0,
            vec![
                frame("A", 0.0, 0.0, 300.0, 300.0, vec![]),
                frame("B", 0.0, 0.0, 310.0, 300.0, vec![]),
                frame("C", 0.0, 0.0, 300.0, 280.0, vec![]),
            ],
        ));
        assert_eq!(classify_node(&node, &Thresholds::default()), SectionKind::Features);
    }

    #[test]
    fn structural_cta_and_fallback() {
        let short_with_button = Node::from_json(&frame(
            "Frame 9",
            0.0,
            0.0,
            1440.0,
            200.0,
            vec![text("t", "Ready?", 32.0), frame("btn", 0.0, 0.0, 100.0, 40.0, vec![])],
        ));
        assert_eq!(classify_node(&short_with_button, &Thresholds::default()), SectionKind::Cta);

        let plain = Node::from_json(&frame("Frame 10", 0.0, 0.0, 1440.0, 600.0, vec![text("t", "Hi", 32.0)]));
        assert_eq!(classify_node(&plain, &Thresholds::default()), SectionKind::Content);
    }

    #[test]
    fn tall_without_image_is_not_hero() {
        let node = Node::from_json(&frame(
            "Frame 11",
            0.0,
            0.0,
            1440.0,
            900.0,
            vec![
                image("Thumb", 40.0, 40.0),
                frame("Button", 0.0, 0.0, 160.0, 48.0, vec![]),
            ],
        ));
        assert_eq!(classify_node(&node, &Thresholds::default()), SectionKind::Content);
    }
}
