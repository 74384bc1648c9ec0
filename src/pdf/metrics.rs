use crate::fonts::{FontBook, FontEntry, FontSpec};

/// Text wrapped to a width, with the height it occupies.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WrappedText {
    pub lines: Vec<String>,
    pub line_height: f32,
    pub height: f32,
}

impl WrappedText {
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }
}

/// Measures rendered text extents. Implementations must be pure: the same
/// `(text, max_width, font)` always produces the same result.
pub trait TextMetrics {
    fn wrap(&self, text: &str, max_width: f32, font: &FontSpec) -> WrappedText;

    /// Width of `text` on a single line, without wrapping.
    fn text_width(&self, text: &str, font: &FontSpec) -> f32;

    fn line_height(&self, font: &FontSpec) -> f32;

    /// Distance from the top of a line box to its baseline.
    fn ascent(&self, font: &FontSpec) -> f32;

    fn measure(&self, text: &str, max_width: f32, font: &FontSpec) -> f32 {
        self.wrap(text, max_width, font).height
    }

    /// `text` cut between characters so that it, plus a trailing `…`, fits
    /// in `max_width`. Text that already fits comes back unchanged.
    fn truncate(&self, text: &str, max_width: f32, font: &FontSpec) -> String {
        if self.text_width(text, font) <= max_width {
            return text.to_string();
        }
        let mut kept = text.to_string();
        while kept.pop().is_some() {
            let candidate = format!("{}{ELLIPSIS}", kept.trim_end());
            if self.text_width(&candidate, font) <= max_width {
                return candidate;
            }
        }
        ELLIPSIS.to_string()
    }
}

const ELLIPSIS: &str = "…";

impl TextMetrics for FontBook {
    fn wrap(&self, text: &str, max_width: f32, font: &FontSpec) -> WrappedText {
        let entry = self.resolve(font);
        let lines = wrap_lines(entry, text, max_width, font.size);
        let line_height = entry.line_height(font.size);
        WrappedText {
            height: lines.len() as f32 * line_height,
            lines,
            line_height,
        }
    }

    fn text_width(&self, text: &str, font: &FontSpec) -> f32 {
        self.resolve(font).text_width(text, font.size)
    }

    fn line_height(&self, font: &FontSpec) -> f32 {
        self.resolve(font).line_height(font.size)
    }

    fn ascent(&self, font: &FontSpec) -> f32 {
        self.resolve(font).ascent(font.size)
    }
}

/// Greedy word wrap on whitespace. Runs of whitespace collapse to one space.
/// A word wider than `max_width` starts its own line and is broken between
/// characters; every piece holds at least one character.
fn wrap_lines(entry: &FontEntry, text: &str, max_width: f32, font_size: f32) -> Vec<String> {
    let space_w = entry.space_width(font_size);
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_w: f32 = 0.0;

    for word in text.split_whitespace() {
        let ww = entry.text_width(word, font_size);

        if ww > max_width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let mut pieces = break_word(entry, word, max_width, font_size);
            let last = pieces.pop().unwrap_or_default();
            lines.extend(pieces);
            current_w = entry.text_width(&last, font_size);
            current = last;
            continue;
        }

        let proposed = if current.is_empty() {
            ww
        } else {
            current_w + space_w + ww
        };

        if !current.is_empty() && proposed > max_width {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
            current_w = ww;
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            current_w = proposed;
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn break_word(entry: &FontEntry, word: &str, max_width: f32, font_size: f32) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut piece = String::new();
    let mut piece_w: f32 = 0.0;
    for ch in word.chars() {
        let cw = entry.char_width_1000(ch) * font_size / 1000.0;
        if !piece.is_empty() && piece_w + cw > max_width {
            pieces.push(std::mem::take(&mut piece));
            piece_w = 0.0;
        }
        piece.push(ch);
        piece_w += cw;
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}
