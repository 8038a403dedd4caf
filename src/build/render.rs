use serde_json::{json, Map, Value};

use crate::design::content::ExtractedContent;
use crate::design::sections::Section;
use crate::design::tokens::DesignTokens;
use crate::plan::{DesignOverrides, PlanPage};

pub(crate) fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_content(c: &ExtractedContent, level: u8, out: &mut String) {
    if let Some(h) = &c.heading {
        out.push_str(&format!("<h{0}>{1}</h{0}>\n", level, escape(h)));
    }
    if let Some(s) = &c.subheading {
        out.push_str(&format!("<p class=\"subheading\">{}</p>\n", escape(s)));
    }
    for p in &c.body {
        out.push_str(&format!("<p>{}</p>\n", escape(p)));
    }
    if !c.items.is_empty() {
        out.push_str("<div class=\"items\">\n");
        for item in &c.items {
            out.push_str("<div class=\"item\">\n");
            render_content(item, level.saturating_add(1).min(6), out);
            out.push_str("</div>\n");
        }
        out.push_str("</div>\n");
    }
    for b in &c.buttons {
        out.push_str(&format!("<a class=\"button\" href=\"#\">{}</a>\n", escape(b)));
    }
}

/// Markup for one classified section.
pub fn render_section(section: &Section) -> String {
    let level = match section.kind {
        crate::design::sections::SectionKind::Hero => 1,
        _ => 2,
    };
    let mut out = format!(
        "<section class=\"section section-{}\" data-source=\"{}\">\n",
        section.kind,
        escape(&section.source.id)
    );
    render_content(&section.content, level, &mut out);
    out.push_str("</section>\n");
    out
}

pub fn render_page(sections: &[Section]) -> String {
    sections.iter().map(render_section).collect()
}

/// Markup for a page the plan asks for. Blank lines separate paragraphs.
pub fn render_plan_page(page: &PlanPage) -> String {
    let mut out = format!("<h1>{}</h1>\n", escape(&page.title));
    for para in page.content.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        out.push_str(&format!("<p>{}</p>\n", escape(para)));
    }
    out
}

/// Theme document built from tokens, with plan overrides layered on top.
pub fn theme_json(tokens: &DesignTokens, overrides: Option<&DesignOverrides>) -> Value {
    let mut roles: Vec<(String, String)> = vec![
        ("primary".into(), tokens.colors.primary.clone()),
        ("secondary".into(), tokens.colors.secondary.clone()),
        ("accent".into(), tokens.colors.accent.clone()),
        ("background".into(), tokens.colors.background.clone()),
        ("text".into(), tokens.colors.text.clone()),
    ];
    let mut families = tokens.typography.font_families.clone();

    if let Some(o) = overrides {
        for (role, hex) in &o.colors {
            match roles.iter_mut().find(|(r, _)| r == role) {
                Some(slot) => slot.1 = hex.to_lowercase(),
                None => roles.push((role.clone(), hex.to_lowercase())),
            }
        }
        if !o.fonts.is_empty() {
            families = o.fonts.clone();
        }
    }

    let palette: Vec<Value> = roles
        .iter()
        .map(|(slug, color)| json!({ "slug": slug, "name": title_case(slug), "color": color }))
        .collect();
    let font_sizes: Vec<Value> = tokens
        .typography
        .sizes
        .iter()
        .map(|(slug, v)| json!({ "slug": slug, "size": format!("{}px", v) }))
        .collect();
    let spacing: Vec<Value> = tokens
        .spacing
        .iter()
        .map(|(slug, v)| json!({ "slug": slug, "size": format!("{}px", v) }))
        .collect();

    let mut custom = Map::new();
    custom.insert("radius".into(), json!(tokens.border_radius.scale));
    custom.insert("radiusFull".into(), json!(tokens.border_radius.full));
    custom.insert("shadow".into(), json!(tokens.shadows));
    custom.insert("fontWeight".into(), json!(tokens.typography.weights));
    custom.insert("lineHeight".into(), json!(tokens.typography.line_heights));

    json!({
        "version": 2,
        "settings": {
            "color": { "palette": palette },
            "typography": {
                "fontFamilies": [{ "slug": "body", "fontFamily": families.join(", ") }],
                "fontSizes": font_sizes,
            },
            "spacing": { "spacingSizes": spacing },
            "custom": Value::Object(custom),
        }
    })
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
