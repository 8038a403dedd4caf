use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::node::Node;
use super::walk::walk;
use crate::config::Thresholds;

// `button`, `btn` or `cta` as a whole word, a camel-case segment or with a
// plural `s`; "Dictation" and "Octane" do not count.
static BUTTON_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^A-Za-z])(?i:button|btn|cta)s?(?:$|[^a-z])|[a-z](?:Button|Btn|CTA)s?(?:$|[^a-z])")
        .unwrap()
});

const ACTION_WORDS: &[&str] = &[
    "get", "start", "sign", "join", "learn", "buy", "shop", "try", "book", "contact",
    "download", "subscribe", "register", "explore", "discover", "order", "view", "see",
    "apply", "send",
];

const MAX_BUTTON_WORDS: usize = 4;
const DEFAULT_FONT_SIZE: f64 = 16.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractedContent {
    pub heading: Option<String>,
    pub subheading: Option<String>,
    pub body: Vec<String>,
    pub buttons: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<ExtractedContent>,
}

impl ExtractedContent {
    /// Whether the section carries anything worth keeping.
    pub fn is_meaningful(&self) -> bool {
        self.heading.is_some() || !self.body.is_empty() || !self.buttons.is_empty()
    }
}

/// A trimmed text leaf with what the classifier needs to know about it.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRunInfo {
    pub text: String,
    pub font_size: f64,
    pub in_button: bool,
}

pub fn is_button_name(name: &str) -> bool {
    BUTTON_NAME_RE.is_match(name)
}

fn is_action_label(text: &str) -> bool {
    let words: Vec<String> = text
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect();
    !words.is_empty()
        && words.len() <= MAX_BUTTON_WORDS
        && words.iter().any(|w| ACTION_WORDS.contains(&w.as_str()))
}

/// Every non-empty text leaf under `root`, in document order.
pub fn collect_text_runs(root: &Node) -> Vec<TextRunInfo> {
    let mut runs = Vec::new();
    walk(root, &mut |node, ancestors| {
        let Some(run) = node.text() else {
            return;
        };
        let text = run.characters.trim();
        if text.is_empty() {
            return;
        }
        // the extraction root's own name says nothing about its text runs
        let parent_is_button = ancestors.len() > 1
            && ancestors
                .last()
                .is_some_and(|parent| is_button_name(&parent.name));
        let in_button = parent_is_button || is_button_name(&node.name) || is_action_label(text);
        runs.push(TextRunInfo {
            text: text.to_string(),
            font_size: run.style.font_size.unwrap_or(DEFAULT_FONT_SIZE),
            in_button,
        });
    });
    runs
}

/// Assign runs to heading/subheading/body/buttons. Runs are visited largest
/// font first; each run lands in exactly one slot and the first candidate
/// claims each singleton slot.
pub fn classify_runs(mut runs: Vec<TextRunInfo>, t: &Thresholds) -> ExtractedContent {
    runs.sort_by(|a, b| b.font_size.total_cmp(&a.font_size));

    let mut content = ExtractedContent::default();
    for run in runs {
        if run.in_button {
            content.buttons.push(run.text);
        } else if content.heading.is_none() && run.font_size >= t.heading_min_size {
            content.heading = Some(run.text);
        } else if content.subheading.is_none()
            && run.font_size >= t.subheading_min_size
            && run.font_size < t.heading_min_size
        {
            content.subheading = Some(run.text);
        } else if run.font_size >= t.body_min_size && run.text.chars().count() > t.body_min_chars {
            content.body.push(run.text);
        }
    }
    content
}

/// Frame-like direct children that look like repetitions of one another:
/// at least two, each within `tolerance` of the first in width and height.
pub fn repeating_children<'a>(node: &'a Node, tolerance: f64) -> Option<Vec<&'a Node>> {
    let group: Vec<&Node> = node
        .children
        .iter()
        .filter(|c| c.visible && c.is_frame_like())
        .collect();
    let first = group.first()?;
    if group.len() < 2 {
        return None;
    }
    let similar = group.iter().all(|c| {
        (c.bounds.width - first.bounds.width).abs() < tolerance
            && (c.bounds.height - first.bounds.height).abs() < tolerance
    });
    similar.then_some(group)
}

pub fn extract_content(node: &Node, t: &Thresholds) -> ExtractedContent {
    let mut content = classify_runs(collect_text_runs(node), t);

    if let Some(group) = repeating_children(node, t.repeat_tolerance) {
        content.items = group
            .into_iter()
            .map(|child| extract_content(child, t))
            .filter(|item| item.heading.is_some() || !item.body.is_empty())
            .collect();
    }
    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::node::fixtures::{frame, text};

    fn run(text: &str, size: f64, in_button: bool) -> TextRunInfo {
        TextRunInfo {
            text: text.to_string(),
            font_size: size,
            in_button,
        }
    }

    #[test]
    fn largest_unflagged_run_over_24_becomes_heading() {
        let runs = vec![
            run("Small print that is long", 12.0, false),
            run("Get started", 40.0, true),
            run("Build faster sites", 32.0, false),
            run("Another big line", 28.0, false),
            run("A subtitle here", 20.0, false),
        ];
        let c = classify_runs(runs, &Thresholds::default());
        assert_eq!(c.heading.as_deref(), Some("Build faster sites"));
        assert_eq!(c.subheading.as_deref(), Some("A subtitle here"));
        assert_eq!(c.buttons, vec!["Get started"]);
        assert_eq!(c.body, vec!["Another big line", "Small print that is long"]);
    }

    #[test]
    fn no_heading_when_nothing_reaches_24() {
        let runs = vec![run("Medium sized title", 22.0, false), run("body text goes here", 16.0, false)];
        let c = classify_runs(runs, &Thresholds::default());
        assert!(c.heading.is_none());
        assert_eq!(c.subheading.as_deref(), Some("Medium sized title"));
    }

    #[test]
    fn short_and_tiny_runs_are_dropped() {
        let runs = vec![run("tiny", 16.0, false), run("footnote text that is long", 10.0, false)];
        let c = classify_runs(runs, &Thresholds::default());
        assert!(c.body.is_empty());
        assert!(!c.is_meaningful());
    }

    #[test]
    fn equal_sizes_keep_document_order() {
        let runs = vec![run("First heading", 30.0, false), run("Second heading", 30.0, false)];
        let c = classify_runs(runs, &Thresholds::default());
        assert_eq!(c.heading.as_deref(), Some("First heading"));
        assert_eq!(c.body, vec!["Second heading"]);
    }

    #[test]
    fn action_labels() {
        assert!(is_action_label("Get started"));
        assert!(is_action_label("Sign up free!"));
        assert!(!is_action_label("We help you get started with your website today"));
        assert!(!is_action_label("Pricing"));
    }

    #[test]
    fn button_context_from_parent_name() {
        let tree = Node::from_json(&frame(
            "CTA Section",
            0.0,
            0.0,
            800.0,
            200.0,
            vec![
                text("Title", "Ready to grow?", 32.0),
                frame("Primary Button", 0.0, 0.0, 120.0, 40.0, vec![text("Label", "Okay", 16.0)]),
            ],
        ));
        let runs = collect_text_runs(&tree);
        assert_eq!(runs.len(), 2);
        // root is named CTA but its direct text is not a button
        assert!(!runs[0].in_button);
        assert!(runs[1].in_button);

        let c = extract_content(&tree, &Thresholds::default());
        assert_eq!(c.heading.as_deref(), Some("Ready to grow?"));
        assert_eq!(c.buttons, vec!["Okay"]);
    }

    #[test]
    fn button_names_match_whole_words() {
        for name in ["Button", "Primary Button", "btn-primary", "CTA", "Hero CTA", "PrimaryButton", "CTAButton", "Buttons", "button_2"] {
            assert!(is_button_name(name), "{name}");
        }
        for name in ["Dictation", "Octane", "Buttonhole", "Rebuttal", "Actions"] {
            assert!(!is_button_name(name), "{name}");
        }
    }

    #[test]
    fn hidden_frame_text_is_not_content() {
        let mut draft = frame("Draft", 0.0, 0.0, 400.0, 200.0, vec![text("Old", "Old headline we dropped", 40.0)]);
        draft["visible"] = serde_json::json!(false);
        let tree = Node::from_json(&frame(
            "Hero",
            0.0,
            0.0,
            800.0,
            600.0,
            vec![draft, text("Title", "Current headline", 40.0)],
        ));
        let runs = collect_text_runs(&tree);
        assert_eq!(runs.len(), 1);
        let c = extract_content(&tree, &Thresholds::default());
        assert_eq!(c.heading.as_deref(), Some("Current headline"));
        assert!(c.body.is_empty());
    }

    #[test]
    fn blank_text_is_ignored() {
        let tree = Node::from_json(&frame("x", 0.0, 0.0, 10.0, 10.0, vec![text("a", "   ", 30.0)]));
        assert!(collect_text_runs(&tree).is_empty());
    }

    fn card(name: &str, w: f64, h: f64, title: &str) -> serde_json::Value {
        frame(
            name,
            0.0,
            0.0,
            w,
            h,
            vec![
                text("Title", title, 24.0),
                text("Copy", "A short description of the feature", 14.0),
            ],
        )
    }

    #[test]
    fn detects_repeating_cards() {
        let tree = Node::from_json(&frame(
            "Features",
            0.0,
            0.0,
            1200.0,
            600.0,
            vec![card("Card 1", 200.0, 300.0, "Fast"), card("Card 2", 210.0, 290.0, "Safe")],
        ));
        let c = extract_content(&tree, &Thresholds::default());
        assert_eq!(c.items.len(), 2);
        assert_eq!(c.items[0].heading.as_deref(), Some("Fast"));
        assert_eq!(c.items[1].heading.as_deref(), Some("Safe"));
    }

    #[test]
    fn dissimilar_children_are_not_items() {
        let tree = Node::from_json(&frame(
            "Mixed",
            0.0,
            0.0,
            1200.0,
            600.0,
            vec![card("A", 200.0, 300.0, "One"), card("B", 600.0, 300.0, "Two")],
        ));
        assert!(extract_content(&tree, &Thresholds::default()).items.is_empty());
    }

    #[test]
    fn empty_items_are_dropped() {
        let tree = Node::from_json(&frame(
            "Logos",
            0.0,
            0.0,
            1200.0,
            100.0,
            vec![
                frame("Logo 1", 0.0, 0.0, 80.0, 40.0, vec![]),
                frame("Logo 2", 0.0, 0.0, 80.0, 40.0, vec![]),
            ],
        ));
        assert!(repeating_children(&tree, 50.0).is_some());
        assert!(extract_content(&tree, &Thresholds::default()).items.is_empty());
    }
}
