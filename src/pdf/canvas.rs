use pdf_writer::{Content, Name, Str};

use crate::fonts::FontBook;

/// One drawing primitive. Coordinates are in points, measured downward from
/// the top-left corner of the page; conversion to PDF space happens in
/// [`PageCanvas::to_content`].
#[derive(Clone, Debug, PartialEq)]
pub enum DrawOp {
    Text {
        x: f32,
        baseline: f32,
        /// PDF resource name of the resolved font.
        font: String,
        size: f32,
        color: [u8; 3],
        text: String,
    },
    FillRect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: [u8; 3],
    },
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        width: f32,
        color: [u8; 3],
    },
    Image {
        name: String,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

/// The drawing operations of one physical page, in paint order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PageCanvas {
    pub ops: Vec<DrawOp>,
}

impl PageCanvas {
    pub(crate) fn text(&mut self, x: f32, baseline: f32, font: &str, size: f32, color: [u8; 3], text: &str) {
        if text.is_empty() {
            return;
        }
        self.ops.push(DrawOp::Text {
            x,
            baseline,
            font: font.to_string(),
            size,
            color,
            text: text.to_string(),
        });
    }

    pub(crate) fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: [u8; 3]) {
        self.ops.push(DrawOp::FillRect {
            x,
            y,
            width,
            height,
            color,
        });
    }

    pub(crate) fn line(&mut self, (x1, y1): (f32, f32), (x2, y2): (f32, f32), width: f32, color: [u8; 3]) {
        self.ops.push(DrawOp::Line {
            x1,
            y1,
            x2,
            y2,
            width,
            color,
        });
    }

    pub(crate) fn image(&mut self, name: &str, x: f32, y: f32, width: f32, height: f32) {
        self.ops.push(DrawOp::Image {
            name: name.to_string(),
            x,
            y,
            width,
            height,
        });
    }

    /// Every text string on the page, in paint order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn contains_text(&self, needle: &str) -> bool {
        self.texts().any(|t| t.contains(needle))
    }

    pub(crate) fn to_content(&self, page_height: f32, fonts: &FontBook) -> Content {
        let mut content = Content::new();
        for op in &self.ops {
            match op {
                DrawOp::Text {
                    x,
                    baseline,
                    font,
                    size,
                    color,
                    text,
                } => {
                    let Some(entry) = fonts.by_pdf_name(font) else {
                        log::warn!("Skipping text in unknown font resource {font}");
                        continue;
                    };
                    let (r, g, b) = rgb(*color);
                    content.begin_text();
                    content.set_fill_rgb(r, g, b);
                    content.set_font(Name(font.as_bytes()), *size);
                    content.next_line(*x, page_height - baseline);
                    content.show(Str(&entry.encode(text)));
                    content.end_text();
                }
                DrawOp::FillRect {
                    x,
                    y,
                    width,
                    height,
                    color,
                } => {
                    let (r, g, b) = rgb(*color);
                    content.save_state();
                    content.set_fill_rgb(r, g, b);
                    content.rect(*x, page_height - y - height, *width, *height);
                    content.fill_nonzero();
                    content.restore_state();
                }
                DrawOp::Line {
                    x1,
                    y1,
                    x2,
                    y2,
                    width,
                    color,
                } => {
                    let (r, g, b) = rgb(*color);
                    content.save_state();
                    content.set_line_width(*width);
                    content.set_stroke_rgb(r, g, b);
                    content.move_to(*x1, page_height - y1);
                    content.line_to(*x2, page_height - y2);
                    content.stroke();
                    content.restore_state();
                }
                DrawOp::Image {
                    name,
                    x,
                    y,
                    width,
                    height,
                } => {
                    content.save_state();
                    content.transform([*width, 0.0, 0.0, *height, *x, page_height - y - height]);
                    content.x_object(Name(name.as_bytes()));
                    content.restore_state();
                }
            }
        }
        content
    }
}

fn rgb([r, g, b]: [u8; 3]) -> (f32, f32, f32) {
    (r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
}
