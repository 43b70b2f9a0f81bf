//! Owned document snapshot built from rendered HTML.
//!
//! The report UI hands over a finished DOM. We flatten it into an arena of
//! [`Element`]s (preorder, so `NodeId` order is document order) which the
//! pipeline phases can read without holding on to the parser's tree.

use crate::resolver::ResolvedImages;
use crate::{Error, Result};
use scraper::{ElementRef, Html, Node};
use url::Url;

/// Index of an element inside a [`Document`]
pub type NodeId = usize;

/// Box used for `<img>` elements that declare no size (the HTML default
/// for replaced elements).
pub const DEFAULT_IMAGE_SIZE: (u32, u32) = (300, 150);

/// Largest side, in pixels, of any box we allocate a raster for
pub const MAX_BOX_SIDE: u32 = 4096;

/// Clamp a box to `1..=MAX_BOX_SIDE` on both sides
pub fn clamp_box(width: u32, height: u32) -> (u32, u32) {
    (width.clamp(1, MAX_BOX_SIDE), height.clamp(1, MAX_BOX_SIDE))
}

/// Child of an element: either another element or a run of text
#[derive(Debug, Clone, PartialEq)]
pub enum Child {
    Element(NodeId),
    Text(String),
}

/// A single element in the snapshot
#[derive(Debug, Clone)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Child>,
    pub parent: Option<NodeId>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        if let Some(slot) = self.attrs.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            slot.1 = value.to_string();
        } else {
            self.attrs.push((name.to_string(), value.to_string()));
        }
    }
}

/// An `<img>` node together with its rendered box
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRef {
    pub node: NodeId,
    pub src: String,
    pub width: u32,
    pub height: u32,
}

/// Parsed, owned document
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Element>,
    base_url: Option<Url>,
}

impl Document {
    /// Parse an HTML document with no known origin. Every `http` image is
    /// then treated as cross-origin.
    pub fn parse(html: &str) -> Self {
        let parsed = Html::parse_document(html);
        let mut nodes = Vec::new();
        build(&mut nodes, parsed.root_element(), None);
        log::debug!("parsed document with {} elements", nodes.len());
        Self { nodes, base_url: None }
    }

    /// Parse an HTML document served from `base_url`
    pub fn parse_with_base(html: &str, base_url: &str) -> Result<Self> {
        let mut doc = Self::parse(html);
        doc.set_base_url(base_url)?;
        Ok(doc)
    }

    pub fn set_base_url(&mut self, base_url: &str) -> Result<()> {
        let url = Url::parse(base_url)
            .map_err(|e| Error::ConfigError(format!("invalid base URL {}: {}", base_url, e)))?;
        self.base_url = Some(url);
        Ok(())
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn element(&self, node: NodeId) -> &Element {
        &self.nodes[node]
    }

    /// First element whose `id` attribute equals `id`
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.nodes.iter().position(|el| el.attr("id") == Some(id))
    }

    /// Document `<title>`, trimmed
    pub fn title(&self) -> String {
        self.nodes
            .iter()
            .position(|el| el.tag == "title")
            .map(|n| self.text_content(n).trim().to_string())
            .unwrap_or_default()
    }

    /// Concatenated text of `node` and its descendants
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        for child in &self.nodes[node].children {
            match child {
                Child::Text(t) => out.push_str(t),
                Child::Element(c) => self.collect_text(*c, out),
            }
        }
    }

    /// Every `<img>` in document order
    pub fn images(&self) -> Vec<ImageRef> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, el)| el.tag == "img")
            .map(|(node, el)| {
                let (width, height) = self.image_box(node);
                ImageRef {
                    node,
                    src: el.attr("src").unwrap_or_default().trim().to_string(),
                    width,
                    height,
                }
            })
            .collect()
    }

    /// Declared box of an element. Inline style wins over the `width` and
    /// `height` attributes; percentages and other units are ignored.
    pub fn declared_size(&self, node: NodeId) -> (Option<u32>, Option<u32>) {
        let el = &self.nodes[node];
        let style = el.attr("style").unwrap_or_default();
        let width = style_px(style, "width").or_else(|| el.attr("width").and_then(parse_px));
        let height = style_px(style, "height").or_else(|| el.attr("height").and_then(parse_px));
        (width, height)
    }

    /// Rendered box of an `<img>`. A single declared dimension is mirrored
    /// to keep the box square rather than collapsing it.
    pub fn image_box(&self, node: NodeId) -> (u32, u32) {
        match self.declared_size(node) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => (w, w),
            (None, Some(h)) => (h, h),
            (None, None) => DEFAULT_IMAGE_SIZE,
        }
    }

    /// Resolve `src` against the document base URL
    pub fn resolve_url(&self, src: &str) -> Option<Url> {
        match &self.base_url {
            Some(base) => base.join(src).ok(),
            None => Url::parse(src).ok(),
        }
    }

    /// Whether `url` shares the document origin. Without a base URL nothing
    /// is same-origin.
    pub fn is_same_origin(&self, url: &Url) -> bool {
        match &self.base_url {
            Some(base) => base.origin() == url.origin(),
            None => false,
        }
    }

    /// Whether `node` (or any ancestor) is dropped from rasterization
    pub fn is_excluded(&self, node: NodeId, exclude_attribute: &str) -> bool {
        let mut cur = Some(node);
        while let Some(n) = cur {
            let el = &self.nodes[n];
            if matches!(el.tag.as_str(), "script" | "style" | "template" | "noscript")
                || el.attr(exclude_attribute).is_some()
            {
                return true;
            }
            cur = el.parent;
        }
        false
    }

    /// Write resolved image sources back into the snapshot.
    /// Returns how many `src` attributes changed.
    pub fn apply_resolved(&mut self, resolved: &ResolvedImages) -> usize {
        let mut changed = 0;
        for (node, uri) in resolved.replacements() {
            if let Some(el) = self.nodes.get_mut(*node) {
                if el.tag == "img" && el.attr("src") != Some(uri.as_str()) {
                    el.set_attr("src", uri);
                    changed += 1;
                }
            }
        }
        changed
    }
}

fn build(nodes: &mut Vec<Element>, el: ElementRef, parent: Option<NodeId>) -> NodeId {
    let idx = nodes.len();
    nodes.push(Element {
        tag: el.value().name().to_ascii_lowercase(),
        attrs: el
            .value()
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        children: Vec::new(),
        parent,
    });

    let mut children = Vec::new();
    for child in el.children() {
        match child.value() {
            Node::Text(text) => {
                let s: &str = text;
                children.push(Child::Text(s.to_string()));
            }
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    children.push(Child::Element(build(nodes, child_el, Some(idx))));
                }
            }
            _ => {}
        }
    }
    nodes[idx].children = children;
    idx
}

fn parse_px(value: &str) -> Option<u32> {
    let v = value.trim();
    let v = v.strip_suffix("px").unwrap_or(v).trim();
    let n: f64 = v.parse().ok()?;
    if !n.is_finite() || n <= 0.0 {
        return None;
    }
    if n > MAX_BOX_SIDE as f64 {
        log::warn!("declared size {} exceeds {}px, clamping", value.trim(), MAX_BOX_SIDE);
        return Some(MAX_BOX_SIDE);
    }
    Some((n.round() as u32).max(1))
}

fn style_px(style: &str, prop: &str) -> Option<u32> {
    style.split(';').find_map(|decl| {
        let (k, v) = decl.split_once(':')?;
        if k.trim().eq_ignore_ascii_case(prop) {
            let v = v.trim();
            if v.ends_with("px") || v.chars().all(|c| c.is_ascii_digit() || c == '.') {
                return parse_px(v);
            }
        }
        None
    })
}
