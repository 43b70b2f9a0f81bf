/// Block layout for slide subtrees
///
/// Stacks flow items vertically: headings at scale 2, wrapped text runs at
/// scale 1 and images at their rendered box, shrunk to the content width.

use crate::dom::{clamp_box, Child, Document, NodeId};

/// Pixel width/height of one glyph cell at scale 1
pub const GLYPH: u32 = 8;
/// Padding around the slide content and between blocks
pub const PADDING: u32 = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementType {
    Heading,
    Text,
    Image(NodeId),
}

#[derive(Debug, Clone)]
pub struct LayoutNode {
    pub rect: Rect,
    pub text: String,
    pub elem_type: ElementType,
    pub scale: u32,
}

#[derive(Debug, Clone, PartialEq)]
enum Flow {
    Heading(String),
    Text(String),
    Image(NodeId, u32, u32),
}

const BLOCK_TAGS: &[&str] = &[
    "html", "body", "div", "p", "section", "article", "header", "footer", "main", "nav", "aside",
    "ul", "ol", "li", "table", "thead", "tbody", "tfoot", "tr", "figure", "figcaption",
    "blockquote", "pre", "form", "fieldset", "dl", "dt", "dd", "caption",
];

fn is_heading(tag: &str) -> bool {
    matches!(tag, "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

/// Visible text under `node`, skipping excluded subtrees
fn visible_text(doc: &Document, node: NodeId, exclude: &str, out: &mut String) {
    for child in &doc.element(node).children {
        match child {
            Child::Text(t) => out.push_str(t),
            Child::Element(c) if !doc.is_excluded(*c, exclude) => {
                visible_text(doc, *c, exclude, out);
                out.push(' ');
            }
            Child::Element(_) => {}
        }
    }
}

fn flush(line: &mut String, out: &mut Vec<Flow>) {
    let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
    if !collapsed.is_empty() {
        out.push(Flow::Text(collapsed));
    }
    line.clear();
}

fn collect(doc: &Document, node: NodeId, exclude: &str, line: &mut String, out: &mut Vec<Flow>) {
    for child in &doc.element(node).children {
        let c = match child {
            Child::Text(t) => {
                line.push_str(t);
                continue;
            }
            Child::Element(c) => *c,
        };
        if doc.is_excluded(c, exclude) {
            continue;
        }
        let tag = doc.element(c).tag.as_str();
        if tag == "img" {
            flush(line, out);
            let (w, h) = doc.image_box(c);
            out.push(Flow::Image(c, w, h));
        } else if is_heading(tag) {
            flush(line, out);
            let mut text = String::new();
            visible_text(doc, c, exclude, &mut text);
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            if !text.is_empty() {
                out.push(Flow::Heading(text));
            }
        } else if tag == "br" {
            flush(line, out);
        } else if BLOCK_TAGS.contains(&tag) {
            flush(line, out);
            collect(doc, c, exclude, line, out);
            flush(line, out);
        } else {
            collect(doc, c, exclude, line, out);
            if matches!(tag, "td" | "th") {
                line.push_str("  ");
            }
        }
    }
}

/// Greedy word wrap; words longer than a line are split.
pub fn wrap(text: &str, chars_per_line: usize) -> Vec<String> {
    let chars_per_line = chars_per_line.max(1);
    let mut lines = Vec::new();
    let mut cur = String::new();
    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > chars_per_line {
            if !cur.is_empty() {
                lines.push(std::mem::take(&mut cur));
            }
            let rest = word.split_off(chars_per_line);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        let word: String = word.into_iter().collect();
        let cur_len = cur.chars().count();
        if cur_len + word.chars().count() + 1 > chars_per_line && !cur.is_empty() {
            lines.push(std::mem::replace(&mut cur, word));
        } else {
            if !cur.is_empty() {
                cur.push(' ');
            }
            cur.push_str(&word);
        }
    }
    if !cur.is_empty() {
        lines.push(cur);
    }
    lines
}

/// Lay out the subtree rooted at `root` into a box `width` pixels wide.
pub fn layout_slide(doc: &Document, root: NodeId, width: u32, exclude: &str) -> Vec<LayoutNode> {
    let mut items = Vec::new();
    let mut line = String::new();
    collect(doc, root, exclude, &mut line, &mut items);
    flush(&mut line, &mut items);

    let content_w = width.saturating_sub(PADDING * 2).max(GLYPH);
    let mut y = PADDING;
    let mut nodes = Vec::with_capacity(items.len());

    for item in items {
        let node = match item {
            Flow::Heading(text) | Flow::Text(text) if text.is_empty() => continue,
            Flow::Heading(text) => text_block(text, ElementType::Heading, 2, content_w, y),
            Flow::Text(text) => text_block(text, ElementType::Text, 1, content_w, y),
            Flow::Image(node, w, h) => {
                let (w, h) = if w > content_w {
                    (content_w, ((h as u64 * content_w as u64) / w as u64).max(1) as u32)
                } else {
                    (w, h)
                };
                LayoutNode {
                    rect: Rect { x: PADDING as i32, y: y as i32, width: w, height: h },
                    text: String::new(),
                    elem_type: ElementType::Image(node),
                    scale: 1,
                }
            }
        };
        y = node.rect.bottom() as u32 + PADDING;
        nodes.push(node);
    }
    nodes
}

fn text_block(text: String, elem_type: ElementType, scale: u32, content_w: u32, y: u32) -> LayoutNode {
    let chars_per_line = (content_w / (GLYPH * scale)) as usize;
    let lines = wrap(&text, chars_per_line);
    let line_count = (lines.len() as u32).max(1);
    LayoutNode {
        rect: Rect {
            x: PADDING as i32,
            y: y as i32,
            width: content_w,
            height: line_count * GLYPH * scale + 2 * scale,
        },
        text: lines.join("\n"),
        elem_type,
        scale,
    }
}

/// Rendered box of a slide root: declared size where present, otherwise
/// the fallback width and the laid-out content height.
pub fn slide_box(doc: &Document, root: NodeId, fallback: (u32, u32), exclude: &str) -> (u32, u32) {
    let (w, h) = doc.declared_size(root);
    let width = w.unwrap_or(fallback.0).max(1);
    let height = match h {
        Some(h) => h,
        None => {
            let nodes = layout_slide(doc, root, width, exclude);
            nodes
                .last()
                .map(|n| n.rect.bottom() as u32 + PADDING)
                .unwrap_or(fallback.1)
        }
    };
    clamp_box(width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_slide_places_heading_text_and_image() {
        let html = r#"<html><body><div id="s"><h1>Heading</h1><p>Hello world</p>
            <img src="x.png" width="64" height="32"><span>tail</span></div></body></html>"#;
        let doc = Document::parse(html);
        let root = doc.get_element_by_id("s").unwrap();
        let nodes = layout_slide(&doc, root, 200, "data-export-exclude");
        assert_eq!(nodes.len(), 4);
        assert_eq!(nodes[0].elem_type, ElementType::Heading);
        assert_eq!(nodes[0].scale, 2);
        assert_eq!(nodes[1].elem_type, ElementType::Text);
        assert_eq!(nodes[1].text, "Hello world");
        assert!(matches!(nodes[2].elem_type, ElementType::Image(_)));
        assert_eq!((nodes[2].rect.width, nodes[2].rect.height), (64, 32));
        assert_eq!(nodes[3].text, "tail");
        assert!(nodes[1].rect.y > nodes[0].rect.y);
        assert!(nodes[3].rect.y >= nodes[2].rect.bottom());
    }

    #[test]
    fn excluded_nodes_produce_no_layout() {
        let html = r#"<html><body><div id="s"><p>keep</p><script>drop()</script>
            <p data-export-exclude>drop</p></div></body></html>"#;
        let doc = Document::parse(html);
        let root = doc.get_element_by_id("s").unwrap();
        let nodes = layout_slide(&doc, root, 300, "data-export-exclude");
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].text, "keep");
    }

    #[test]
    fn wide_images_shrink_to_content_width() {
        let html = r#"<html><body><div id="s"><img src="x.png" width="400" height="200"></div></body></html>"#;
        let doc = Document::parse(html);
        let root = doc.get_element_by_id("s").unwrap();
        let nodes = layout_slide(&doc, root, 216, "data-export-exclude");
        assert_eq!(nodes[0].rect.width, 200);
        assert_eq!(nodes[0].rect.height, 100);
    }

    #[test]
    fn wrap_splits_long_words() {
        assert_eq!(wrap("aaaaaaa bb", 3), vec!["aaa", "aaa", "a", "bb"]);
        assert_eq!(wrap("one two three", 8), vec!["one two", "three"]);
    }

    #[test]
    fn slide_box_prefers_declared_size() {
        let html = r#"<html><body><div id="a" style="width:320px;height:180px">x</div>
            <div id="b"><p>y</p></div></body></html>"#;
        let doc = Document::parse(html);
        let a = doc.get_element_by_id("a").unwrap();
        assert_eq!(slide_box(&doc, a, (1280, 720), "data-export-exclude"), (320, 180));
        let b = doc.get_element_by_id("b").unwrap();
        let (w, h) = slide_box(&doc, b, (640, 720), "data-export-exclude");
        assert_eq!(w, 640);
        assert_eq!(h, PADDING + GLYPH + 2 + PADDING);
    }
}
