/// Paint command set for the box renderer

use crate::rendering::layout::{ElementType, LayoutNode, GLYPH};

pub type Rgba = (u8, u8, u8, u8);

pub const BLACK: Rgba = (0, 0, 0, 255);
pub const WHITE: Rgba = (255, 255, 255, 255);

#[derive(Debug, Clone, PartialEq)]
pub enum PaintCommand {
    SolidRect {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        rgba: Rgba,
    },
    Text {
        x: i32,
        y: i32,
        text: String,
        scale: u32,
        rgba: Rgba,
    },
    Image {
        node: usize,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },
}

/// Turn layout boxes into paint commands over a `background` fill.
pub fn display_list(nodes: &[LayoutNode], width: u32, height: u32, background: Rgba) -> Vec<PaintCommand> {
    let mut cmds = Vec::with_capacity(nodes.len() + 1);
    cmds.push(PaintCommand::SolidRect { x: 0, y: 0, width, height, rgba: background });

    for node in nodes {
        match node.elem_type {
            ElementType::Image(id) => cmds.push(PaintCommand::Image {
                node: id,
                x: node.rect.x,
                y: node.rect.y,
                width: node.rect.width,
                height: node.rect.height,
            }),
            ElementType::Heading | ElementType::Text => {
                let line_h = (GLYPH * node.scale) as i32;
                for (i, line) in node.text.lines().enumerate() {
                    cmds.push(PaintCommand::Text {
                        x: node.rect.x,
                        y: node.rect.y + node.scale as i32 + i as i32 * line_h,
                        text: line.to_string(),
                        scale: node.scale,
                        rgba: BLACK,
                    });
                }
            }
        }
    }
    cmds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::layout::Rect;

    #[test]
    fn display_list_starts_with_background() {
        let nodes = vec![LayoutNode {
            rect: Rect { x: 8, y: 8, width: 100, height: 26 },
            text: "one\ntwo".into(),
            elem_type: ElementType::Heading,
            scale: 2,
        }];
        let cmds = display_list(&nodes, 120, 60, WHITE);
        assert_eq!(cmds.len(), 3);
        match &cmds[0] {
            PaintCommand::SolidRect { width, height, rgba, .. } => {
                assert_eq!((*width, *height), (120, 60));
                assert_eq!(*rgba, WHITE);
            }
            other => panic!("unexpected {:?}", other),
        }
        match &cmds[2] {
            PaintCommand::Text { y, text, .. } => {
                assert_eq!(text, "two");
                assert_eq!(*y, 8 + 2 + 16);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
