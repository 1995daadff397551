use crate::assets::sha256_hex;
use crate::layout::FontRole;
use crate::pdf::ImageData;
use crate::types::{Color, Pt, Size};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SaveState,
    RestoreState,
    SetFillColor(Color),
    SetStrokeColor(Color),
    SetLineWidth(Pt),
    SetFont(FontRole),
    SetFontSize(Pt),
    // Top of the text line; the writer drops to the baseline.
    DrawString {
        x: Pt,
        y: Pt,
        text: String,
    },
    DrawRect {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
    },
    StrokeRect {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
    },
    DrawImage {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
        resource_id: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Page {
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone)]
pub struct Document {
    pub page_size: Size,
    pub pages: Vec<Page>,
    pub(crate) images: BTreeMap<String, Arc<ImageData>>,
}

#[derive(Debug, Clone)]
struct GraphicsState {
    fill_color: Color,
    stroke_color: Color,
    line_width: Pt,
    font: FontRole,
    font_size: Pt,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            fill_color: Color::BLACK,
            stroke_color: Color::BLACK,
            line_width: Pt::from_f32(1.0),
            font: FontRole::Regular,
            font_size: Pt::from_f32(12.0),
        }
    }
}

pub struct Canvas {
    page_size: Size,
    pages: Vec<Page>,
    current: Page,
    state_stack: Vec<GraphicsState>,
    current_state: GraphicsState,
    images: BTreeMap<String, Arc<ImageData>>,
}

impl Canvas {
    pub fn new(page_size: Size) -> Self {
        Self {
            page_size,
            pages: Vec::new(),
            current: Page::default(),
            state_stack: Vec::new(),
            current_state: GraphicsState::default(),
            images: BTreeMap::new(),
        }
    }

    pub fn save_state(&mut self) {
        self.state_stack.push(self.current_state.clone());
        self.current.commands.push(Command::SaveState);
    }

    pub fn restore_state(&mut self) {
        if let Some(state) = self.state_stack.pop() {
            self.current_state = state;
            self.current.commands.push(Command::RestoreState);
        }
    }

    pub fn set_fill_color(&mut self, color: Color) {
        if self.current_state.fill_color == color {
            return;
        }
        self.current_state.fill_color = color;
        self.current.commands.push(Command::SetFillColor(color));
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        if self.current_state.stroke_color == color {
            return;
        }
        self.current_state.stroke_color = color;
        self.current.commands.push(Command::SetStrokeColor(color));
    }

    pub fn set_line_width(&mut self, width: Pt) {
        let width = width.max(Pt::ZERO);
        if self.current_state.line_width == width {
            return;
        }
        self.current_state.line_width = width;
        self.current.commands.push(Command::SetLineWidth(width));
    }

    pub fn set_font(&mut self, font: FontRole, size: Pt) {
        if self.current_state.font != font {
            self.current_state.font = font;
            self.current.commands.push(Command::SetFont(font));
        }
        if self.current_state.font_size != size {
            self.current_state.font_size = size;
            self.current.commands.push(Command::SetFontSize(size));
        }
    }

    pub fn draw_string(&mut self, x: Pt, y: Pt, text: impl Into<String>) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        self.current.commands.push(Command::DrawString { x, y, text });
    }

    pub fn draw_rect(&mut self, x: Pt, y: Pt, width: Pt, height: Pt) {
        self.current.commands.push(Command::DrawRect {
            x,
            y,
            width,
            height,
        });
    }

    pub fn stroke_rect(&mut self, x: Pt, y: Pt, width: Pt, height: Pt) {
        self.current.commands.push(Command::StrokeRect {
            x,
            y,
            width,
            height,
        });
    }

    // Identical images share one resource id.
    pub fn register_image(&mut self, image: Arc<ImageData>) -> String {
        let mut digest_input = image.data.clone();
        if let Some(alpha) = &image.alpha {
            digest_input.extend_from_slice(&alpha.data);
        }
        let digest = sha256_hex(&digest_input);
        let resource_id = format!("Im{}", &digest[..16]);
        self.images.entry(resource_id.clone()).or_insert(image);
        resource_id
    }

    pub fn draw_image(&mut self, x: Pt, y: Pt, width: Pt, height: Pt, resource_id: &str) {
        self.current.commands.push(Command::DrawImage {
            x,
            y,
            width,
            height,
            resource_id: resource_id.to_string(),
        });
    }

    pub fn show_page(&mut self) {
        let page = std::mem::take(&mut self.current);
        self.pages.push(page);
        self.state_stack.clear();
        self.current_state = GraphicsState::default();
    }

    pub fn finish(mut self) -> Document {
        if !self.current.commands.is_empty() || self.pages.is_empty() {
            self.show_page();
        }
        self.finish_without_show()
    }

    pub fn finish_without_show(self) -> Document {
        Document {
            page_size: self.page_size,
            pages: self.pages,
            images: self.images,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_image(value: u8) -> Arc<ImageData> {
        Arc::new(ImageData {
            width: 1,
            height: 1,
            color_space: "DeviceRGB",
            bits_per_component: 8,
            filter: None,
            data: vec![value, value, value],
            alpha: None,
            decode_inverted: false,
        })
    }

    #[test]
    fn redundant_state_changes_are_elided() {
        let mut canvas = Canvas::new(Size::letter());
        canvas.set_font(FontRole::Bold, Pt::from_f32(9.0));
        canvas.set_font(FontRole::Bold, Pt::from_f32(9.0));
        canvas.set_fill_color(Color::BLACK);
        canvas.draw_string(Pt::ZERO, Pt::ZERO, "X");
        canvas.draw_string(Pt::ZERO, Pt::ZERO, "");
        let doc = canvas.finish();
        assert_eq!(doc.pages.len(), 1);
        assert_eq!(doc.pages[0].commands.len(), 3);
    }

    #[test]
    fn show_page_keeps_empty_pages() {
        let mut canvas = Canvas::new(Size::letter());
        canvas.show_page();
        canvas.draw_rect(Pt::ZERO, Pt::ZERO, Pt::from_f32(5.0), Pt::from_f32(5.0));
        canvas.show_page();
        let doc = canvas.finish_without_show();
        assert_eq!(doc.pages.len(), 2);
        assert!(doc.pages[0].commands.is_empty());
        assert_eq!(doc.pages[1].commands.len(), 1);
    }

    #[test]
    fn identical_images_share_a_resource() {
        let mut canvas = Canvas::new(Size::letter());
        let a = canvas.register_image(tiny_image(10));
        let b = canvas.register_image(tiny_image(10));
        let c = canvas.register_image(tiny_image(200));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(canvas.finish().images.len(), 2);
    }
}
