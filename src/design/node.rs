use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}

/// Channels in 0..=1, as the design tool reports them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rgba {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Rgba {
    pub fn to_hex(&self) -> String {
        let ch = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("#{:02x}{:02x}{:02x}", ch(self.r), ch(self.g), ch(self.b))
    }

    /// `rgba(r, g, b, a)` with 0..=255 channels, used for shadow strings.
    pub fn to_css(&self) -> String {
        let ch = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!(
            "rgba({}, {}, {}, {})",
            ch(self.r),
            ch(self.g),
            ch(self.b),
            trim_float(self.a.clamp(0.0, 1.0))
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    Solid { color: Rgba, opacity: f64, visible: bool },
    Image { visible: bool },
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    DropShadow {
        radius: f64,
        offset_x: f64,
        offset_y: f64,
        color: Rgba,
        visible: bool,
    },
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CornerRadius {
    Uniform(f64),
    PerCorner([f64; 4]),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextStyle {
    pub font_family: Option<String>,
    pub font_size: Option<f64>,
    pub font_weight: Option<f64>,
    pub line_height_px: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextRun {
    pub characters: String,
    pub style: TextStyle,
}

/// Auto-layout metrics carried by frame-like containers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layout {
    pub item_spacing: Option<f64>,
    pub padding_left: Option<f64>,
    pub padding_top: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Document,
    Canvas,
    Frame(Layout),
    Group,
    Component(Layout),
    Instance(Layout),
    Section,
    Text(TextRun),
    Rectangle,
    Ellipse,
    Vector,
    Line,
    Other(String),
}

/// One entry of the visual-node tree. Shared positional/styling data lives on
/// the node; kind-specific payloads live on [`NodeKind`].
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub bounds: Bounds,
    pub visible: bool,
    pub fills: Vec<Paint>,
    pub effects: Vec<Effect>,
    pub corner: Option<CornerRadius>,
    pub kind: NodeKind,
    pub children: Vec<Node>,
}

impl Node {
    /// Decode a node from design-tool JSON. Never fails: absent or malformed
    /// fields fall back to empty values.
    pub fn from_json(v: &Value) -> Node {
        let kind_tag = str_field(v, "type").unwrap_or("");
        let kind = match kind_tag {
            "DOCUMENT" => NodeKind::Document,
            "CANVAS" => NodeKind::Canvas,
            "FRAME" => NodeKind::Frame(layout(v)),
            "GROUP" => NodeKind::Group,
            "COMPONENT" | "COMPONENT_SET" => NodeKind::Component(layout(v)),
            "INSTANCE" => NodeKind::Instance(layout(v)),
            "SECTION" => NodeKind::Section,
            "TEXT" => NodeKind::Text(TextRun {
                characters: str_field(v, "characters").unwrap_or("").to_string(),
                style: text_style(v.get("style")),
            }),
            "RECTANGLE" => NodeKind::Rectangle,
            "ELLIPSE" => NodeKind::Ellipse,
            "VECTOR" | "BOOLEAN_OPERATION" | "STAR" | "REGULAR_POLYGON" => NodeKind::Vector,
            "LINE" => NodeKind::Line,
            other => NodeKind::Other(other.to_string()),
        };

        let children = v
            .get("children")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter(|c| c.is_object()).map(Node::from_json).collect())
            .unwrap_or_default();

        Node {
            id: str_field(v, "id").unwrap_or("").to_string(),
            name: str_field(v, "name").unwrap_or("").to_string(),
            bounds: bounds(v),
            visible: v.get("visible").and_then(Value::as_bool).unwrap_or(true),
            fills: list(v, "fills", paint),
            effects: list(v, "effects", effect),
            corner: corner(v),
            kind,
            children,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind, NodeKind::Text(_))
    }

    pub fn text(&self) -> Option<&TextRun> {
        match &self.kind {
            NodeKind::Text(run) => Some(run),
            _ => None,
        }
    }

    pub fn layout(&self) -> Option<&Layout> {
        match &self.kind {
            NodeKind::Frame(l) | NodeKind::Component(l) | NodeKind::Instance(l) => Some(l),
            _ => None,
        }
    }

    /// Containers that can stand for a card, a column or a page.
    pub fn is_frame_like(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Frame(_) | NodeKind::Group | NodeKind::Component(_) | NodeKind::Instance(_)
        )
    }

    pub fn has_image_fill(&self) -> bool {
        self.fills
            .iter()
            .any(|p| matches!(p, Paint::Image { visible: true }))
    }
}

/// A decoded design file: the document root whose children are canvases.
#[derive(Debug, Clone)]
pub struct Document {
    pub name: String,
    pub root: Node,
}

impl Document {
    /// Accepts either a full file payload (`{"name", "document": {...}}`) or a
    /// bare document node with `children`.
    pub fn from_json(v: &Value) -> Result<Document> {
        let obj = v
            .as_object()
            .ok_or_else(|| Error::validation("design file must be a JSON object"))?;
        let root_json = match obj.get("document") {
            Some(doc) if doc.is_object() => doc,
            Some(_) => return Err(Error::validation("`document` must be an object")),
            None if obj.get("children").is_some_and(Value::is_array) => v,
            None => {
                return Err(Error::validation(
                    "design file has neither `document` nor `children`",
                ))
            }
        };
        let name = str_field(v, "name")
            .or_else(|| str_field(root_json, "name"))
            .unwrap_or("")
            .to_string();
        Ok(Document {
            name,
            root: Node::from_json(root_json),
        })
    }

    pub fn canvases(&self) -> impl Iterator<Item = &Node> {
        self.root
            .children
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Canvas))
    }
}

// ── Field decoding ──

fn str_field<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key).and_then(Value::as_str)
}

fn num(v: Option<&Value>) -> Option<f64> {
    v.and_then(Value::as_f64).filter(|n| n.is_finite())
}

fn list<T>(v: &Value, key: &str, decode: fn(&Value) -> T) -> Vec<T> {
    v.get(key)
        .and_then(Value::as_array)
        .map(|arr| arr.iter().map(decode).collect())
        .unwrap_or_default()
}

fn bounds(v: &Value) -> Bounds {
    let b = v
        .get("absoluteBoundingBox")
        .filter(|b| b.is_object())
        .or_else(|| v.get("boundingBox"));
    match b {
        Some(b) => Bounds {
            x: num(b.get("x")).unwrap_or(0.0),
            y: num(b.get("y")).unwrap_or(0.0),
            width: num(b.get("width")).unwrap_or(0.0),
            height: num(b.get("height")).unwrap_or(0.0),
        },
        None => Bounds::default(),
    }
}

fn color(v: Option<&Value>) -> Option<Rgba> {
    let c = v?;
    Some(Rgba {
        r: num(c.get("r"))?,
        g: num(c.get("g"))?,
        b: num(c.get("b"))?,
        a: num(c.get("a")).unwrap_or(1.0),
    })
}

fn paint(v: &Value) -> Paint {
    let visible = v.get("visible").and_then(Value::as_bool).unwrap_or(true);
    match str_field(v, "type") {
        Some("SOLID") => match color(v.get("color")) {
            Some(color) => Paint::Solid {
                color,
                opacity: num(v.get("opacity")).unwrap_or(1.0),
                visible,
            },
            None => Paint::Other,
        },
        Some("IMAGE") => Paint::Image { visible },
        _ => Paint::Other,
    }
}

fn effect(v: &Value) -> Effect {
    if str_field(v, "type") != Some("DROP_SHADOW") {
        return Effect::Other;
    }
    let offset = v.get("offset");
    Effect::DropShadow {
        radius: num(v.get("radius")).unwrap_or(0.0),
        offset_x: num(offset.and_then(|o| o.get("x"))).unwrap_or(0.0),
        offset_y: num(offset.and_then(|o| o.get("y"))).unwrap_or(0.0),
        color: color(v.get("color")).unwrap_or(Rgba { r: 0.0, g: 0.0, b: 0.0, a: 0.25 }),
        visible: v.get("visible").and_then(Value::as_bool).unwrap_or(true),
    }
}

fn corner(v: &Value) -> Option<CornerRadius> {
    if let Some(r) = num(v.get("cornerRadius")) {
        return Some(CornerRadius::Uniform(r));
    }
    let radii = v.get("rectangleCornerRadii")?.as_array()?;
    if radii.len() != 4 {
        return None;
    }
    let mut out = [0.0; 4];
    for (slot, r) in out.iter_mut().zip(radii) {
        *slot = num(Some(r))?;
    }
    Some(CornerRadius::PerCorner(out))
}

fn layout(v: &Value) -> Layout {
    Layout {
        item_spacing: num(v.get("itemSpacing")),
        padding_left: num(v.get("paddingLeft")),
        padding_top: num(v.get("paddingTop")),
    }
}

fn text_style(v: Option<&Value>) -> TextStyle {
    let Some(s) = v else {
        return TextStyle::default();
    };
    TextStyle {
        font_family: str_field(s, "fontFamily").map(str::to_string),
        font_size: num(s.get("fontSize")),
        font_weight: num(s.get("fontWeight")),
        line_height_px: num(s.get("lineHeightPx")),
    }
}

pub(crate) fn trim_float(v: f64) -> String {
    let s = format!("{:.2}", v);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::{json, Value};

    pub fn frame(name: &str, x: f64, y: f64, w: f64, h: f64, children: Vec<Value>) -> Value {
        json!({
            "id": format!("id-{}", name),
            "name": name,
            "type": "FRAME",
            "absoluteBoundingBox": { "x": x, "y": y, "width": w, "height": h },
            "children": children,
        })
    }

    pub fn text(name: &str, chars: &str, size: f64) -> Value {
        json!({
            "id": format!("t-{}", name),
            "name": name,
            "type": "TEXT",
            "characters": chars,
            "absoluteBoundingBox": { "x": 0, "y": 0, "width": 100, "height": size },
            "style": { "fontFamily": "Inter", "fontSize": size, "fontWeight": 400 },
        })
    }

    pub fn image(name: &str, w: f64, h: f64) -> Value {
        json!({
            "id": format!("img-{}", name),
            "name": name,
            "type": "RECTANGLE",
            "absoluteBoundingBox": { "x": 0, "y": 0, "width": w, "height": h },
            "fills": [{ "type": "IMAGE", "scaleMode": "FILL" }],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_text_node() {
        let n = Node::from_json(&json!({
            "id": "1:2",
            "name": "Title",
            "type": "TEXT",
            "characters": "Hello",
            "absoluteBoundingBox": { "x": 10, "y": 20, "width": 200, "height": 40 },
            "style": { "fontFamily": "Inter", "fontSize": 32, "fontWeight": 700, "lineHeightPx": 40 }
        }));
        let run = n.text().unwrap();
        assert_eq!(run.characters, "Hello");
        assert_eq!(run.style.font_size, Some(32.0));
        assert_eq!(run.style.line_height_px, Some(40.0));
        assert_eq!(n.bounds.width, 200.0);
    }

    #[test]
    fn tolerates_malformed_fields() {
        let n = Node::from_json(&json!({
            "type": "FRAME",
            "fills": "nope",
            "effects": [{ "type": "DROP_SHADOW", "radius": "big" }],
            "cornerRadius": null,
            "absoluteBoundingBox": { "x": "a" },
            "children": [1, { "type": "GROUP" }]
        }));
        assert!(n.fills.is_empty());
        assert_eq!(n.children.len(), 1);
        assert_eq!(n.bounds, Bounds::default());
        assert!(n.corner.is_none());
        assert!(matches!(n.effects[0], Effect::DropShadow { radius, .. } if radius == 0.0));
    }

    #[test]
    fn per_corner_radii() {
        let n = Node::from_json(&json!({ "type": "RECTANGLE", "rectangleCornerRadii": [4, 4, 0, 0] }));
        assert_eq!(n.corner, Some(CornerRadius::PerCorner([4.0, 4.0, 0.0, 0.0])));
    }

    #[test]
    fn solid_paint_hex() {
        let n = Node::from_json(&json!({
            "type": "RECTANGLE",
            "fills": [{ "type": "SOLID", "color": { "r": 1.0, "g": 0.5, "b": 0.0, "a": 1.0 } }]
        }));
        match &n.fills[0] {
            Paint::Solid { color, .. } => assert_eq!(color.to_hex(), "#ff8000"),
            other => panic!("unexpected paint {:?}", other),
        }
    }

    #[test]
    fn document_accepts_file_or_bare_root() {
        let file = json!({ "name": "Site", "document": { "type": "DOCUMENT", "children": [{ "type": "CANVAS", "name": "Page 1" }] } });
        let doc = Document::from_json(&file).unwrap();
        assert_eq!(doc.name, "Site");
        assert_eq!(doc.canvases().count(), 1);

        let bare = json!({ "type": "DOCUMENT", "children": [] });
        assert!(Document::from_json(&bare).is_ok());
    }

    #[test]
    fn document_rejects_wrong_shape() {
        assert!(matches!(Document::from_json(&json!([1, 2])), Err(Error::Validation(_))));
        assert!(matches!(Document::from_json(&json!({ "foo": 1 })), Err(Error::Validation(_))));
        assert!(matches!(Document::from_json(&json!({ "document": 3 })), Err(Error::Validation(_))));
    }

    #[test]
    fn css_color() {
        let c = Rgba { r: 0.0, g: 0.0, b: 0.0, a: 0.1 };
        assert_eq!(c.to_css(), "rgba(0, 0, 0, 0.1)");
    }
}
