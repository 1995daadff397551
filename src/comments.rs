use crate::canvas::Canvas;
use crate::error::ReportError;
use crate::font::FontRegistry;
use crate::layout::{FontRole, LINE_HEIGHT_FACTOR};
use crate::mapper::{OVERFLOW_THRESHOLD, OverflowEntry};
use crate::pdf::document_to_pdf;
use crate::text::wrap_lines;
use crate::types::{Color, Pt, Size};
use serde::Deserialize;

pub const COMMENTS_TITLE: &str = "Additional Comments";

pub const COMMENT_BLOCK_BASE_MM: f32 = 30.0;
// Added for every full 100 characters beyond the overflow threshold.
pub const COMMENT_BLOCK_STEP_MM: f32 = 10.0;
pub const COMMENT_BLOCK_MAX_MM: f32 = 80.0;
pub const COMMENT_BLOCK_GAP_MM: f32 = 6.0;

const MARGIN_MM: f32 = 20.0;
const TITLE_TOP_MM: f32 = 18.0;
const TITLE_SIZE: f32 = 14.0;
const FIRST_BLOCK_TOP_MM: f32 = 32.0;
const HEADING_SIZE: f32 = 10.0;
const HEADING_HEIGHT_MM: f32 = 6.0;
const BODY_MAX_SIZE: f32 = 9.0;
const BODY_MIN_SIZE: f32 = 6.0;
const BODY_SHRINK_STEP: f32 = 0.5;
const BLOCK_INSET_MM: f32 = 1.5;
const FRAME_WIDTH: f32 = 0.5;
const HEADING_FILL: Color = Color {
    r: 0.9,
    g: 0.9,
    b: 0.9,
};
const FRAME_COLOR: Color = Color {
    r: 0.6,
    g: 0.6,
    b: 0.6,
};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct CommentLayout {
    pub base_height_mm: f32,
    pub step_mm: f32,
    pub max_height_mm: f32,
    pub gap_mm: f32,
}

impl Default for CommentLayout {
    fn default() -> Self {
        Self {
            base_height_mm: COMMENT_BLOCK_BASE_MM,
            step_mm: COMMENT_BLOCK_STEP_MM,
            max_height_mm: COMMENT_BLOCK_MAX_MM,
            gap_mm: COMMENT_BLOCK_GAP_MM,
        }
    }
}

impl CommentLayout {
    pub fn block_height_mm(&self, char_count: usize) -> f32 {
        let extra = char_count.saturating_sub(OVERFLOW_THRESHOLD);
        let steps = extra / 100;
        (self.base_height_mm + steps as f32 * self.step_mm).min(self.max_height_mm)
    }

    pub(crate) fn validate(&self) -> Result<(), ReportError> {
        let fields = [
            ("base_height_mm", self.base_height_mm),
            ("step_mm", self.step_mm),
            ("max_height_mm", self.max_height_mm),
            ("gap_mm", self.gap_mm),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value <= 0.0 {
                return Err(ReportError::Config(format!(
                    "comments.{name} must be positive, got {value}"
                )));
            }
        }
        if self.max_height_mm < self.base_height_mm {
            return Err(ReportError::Config(
                "comments.max_height_mm must not be below base_height_mm".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentsPage {
    pub bytes: Vec<u8>,
    pub entries: usize,
    // Blocks that started below the bottom margin.
    pub clipped: usize,
}

pub fn build_comments_page(
    entries: &[OverflowEntry],
    fonts: &FontRegistry,
    layout: &CommentLayout,
) -> Result<Option<CommentsPage>, ReportError> {
    if entries.is_empty() {
        return Ok(None);
    }

    let page_size = Size::letter();
    let mut canvas = Canvas::new(page_size);
    let content_width = page_size.width - Pt::from_mm(MARGIN_MM * 2.0);
    let left = Pt::from_mm(MARGIN_MM);
    let bottom_limit = page_size.height - Pt::from_mm(MARGIN_MM);
    let inset = Pt::from_mm(BLOCK_INSET_MM);

    let title_size = Pt::from_f32(TITLE_SIZE);
    canvas.set_font(FontRole::Bold, title_size);
    let title_width = fonts.measure_text_width(FontRole::Bold, title_size, COMMENTS_TITLE);
    canvas.draw_string(
        (page_size.width - title_width) / 2,
        Pt::from_mm(TITLE_TOP_MM),
        COMMENTS_TITLE,
    );

    let mut top = Pt::from_mm(FIRST_BLOCK_TOP_MM);
    let mut clipped = 0;
    for entry in entries {
        if top + Pt::from_mm(HEADING_HEIGHT_MM) > bottom_limit {
            clipped += 1;
            continue;
        }
        let heading_height = Pt::from_mm(HEADING_HEIGHT_MM);
        let heading_size = Pt::from_f32(HEADING_SIZE);
        canvas.save_state();
        canvas.set_fill_color(HEADING_FILL);
        canvas.draw_rect(left, top, content_width, heading_height);
        canvas.restore_state();
        canvas.set_font(FontRole::Bold, heading_size);
        canvas.draw_string(
            left + inset,
            top + (heading_height - heading_size) / 2,
            entry.section_label.as_str(),
        );
        top += heading_height;

        let block_height = Pt::from_mm(layout.block_height_mm(entry.text.chars().count()))
            .min(bottom_limit - top);
        canvas.save_state();
        canvas.set_stroke_color(FRAME_COLOR);
        canvas.set_line_width(Pt::from_f32(FRAME_WIDTH));
        canvas.stroke_rect(left, top, content_width, block_height);
        canvas.restore_state();
        draw_body(
            &mut canvas,
            fonts,
            &entry.text,
            left + inset,
            top + inset,
            content_width - inset - inset,
            block_height - inset - inset,
        );
        top += block_height + Pt::from_mm(layout.gap_mm);
    }
    if clipped > 0 {
        tracing::warn!(clipped, "comment blocks did not fit on the comments page");
    }

    let bytes = document_to_pdf(&canvas.finish(), fonts)?;
    tracing::info!(
        entries = entries.len(),
        bytes = bytes.len(),
        "comments page rendered"
    );
    Ok(Some(CommentsPage {
        bytes,
        entries: entries.len(),
        clipped,
    }))
}

// Lines that still overflow at the minimum size are dropped.
fn draw_body(
    canvas: &mut Canvas,
    fonts: &FontRegistry,
    text: &str,
    left: Pt,
    top: Pt,
    width: Pt,
    height: Pt,
) {
    let mut size = BODY_MAX_SIZE;
    let (size_pt, line_height, lines) = loop {
        let size_pt = Pt::from_f32(size);
        let line_height = size_pt * LINE_HEIGHT_FACTOR;
        let lines = wrap_lines(fonts, FontRole::Regular, size_pt, text, width);
        let needed = line_height * lines.len() as f32;
        if needed <= height || size <= BODY_MIN_SIZE {
            break (size_pt, line_height, lines);
        }
        size = (size - BODY_SHRINK_STEP).max(BODY_MIN_SIZE);
    };

    canvas.set_font(FontRole::Regular, size_pt);
    let mut line_top = top;
    for line in lines {
        if line_top + line_height > top + height {
            break;
        }
        canvas.draw_string(left, line_top, line);
        line_top += line_height;
    }
}
