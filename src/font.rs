use crate::assets::FontAssets;
use crate::layout::FontRole;
use crate::text::{winansi_byte, winansi_char};
use crate::types::Pt;

const FIRST_CHAR: u8 = 32;
const LAST_CHAR: u8 = 255;
// 1/1000 em.
const FALLBACK_ADVANCE: u16 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FontProgram {
    TrueType,
    Base14(&'static str),
}

#[derive(Debug, Clone)]
pub(crate) struct RegisteredFont {
    pub(crate) name: String,
    pub(crate) data: Vec<u8>,
    pub(crate) program: FontProgram,
    pub(crate) metrics: FontMetrics,
}

#[derive(Debug, Clone)]
pub(crate) struct FontMetrics {
    pub(crate) first_char: u8,
    pub(crate) last_char: u8,
    // Indexed by WinAnsi code minus `first_char`.
    pub(crate) widths: Vec<u16>,
    pub(crate) ascent: i16,
    pub(crate) descent: i16,
    pub(crate) cap_height: i16,
    pub(crate) italic_angle: i16,
    pub(crate) stem_v: i16,
    pub(crate) bbox: (i16, i16, i16, i16),
    pub(crate) missing_width: u16,
    pub(crate) is_fixed_pitch: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct FontRegistry {
    regular: RegisteredFont,
    bold: RegisteredFont,
}

impl FontRegistry {
    pub(crate) fn from_assets(fonts: &FontAssets) -> Self {
        Self {
            regular: RegisteredFont::from_bytes(FontRole::Regular, &fonts.regular),
            bold: RegisteredFont::from_bytes(FontRole::Bold, &fonts.bold),
        }
    }

    #[cfg(test)]
    pub(crate) fn standard() -> Self {
        Self {
            regular: RegisteredFont::base14(FontRole::Regular),
            bold: RegisteredFont::base14(FontRole::Bold),
        }
    }

    pub(crate) fn get(&self, role: FontRole) -> &RegisteredFont {
        match role {
            FontRole::Regular => &self.regular,
            FontRole::Bold => &self.bold,
        }
    }

    pub(crate) fn measure_text_width(&self, role: FontRole, font_size: Pt, text: &str) -> Pt {
        self.get(role).metrics.measure_text_width(font_size, text)
    }
}

impl RegisteredFont {
    fn from_bytes(role: FontRole, data: &[u8]) -> Self {
        match ttf_parser::Face::parse(data, 0) {
            Ok(face) if face.tables().cff.is_none() => Self {
                name: font_name(&face).unwrap_or_else(|| default_name(role).to_string()),
                data: data.to_vec(),
                program: FontProgram::TrueType,
                metrics: FontMetrics::from_face(&face),
            },
            Ok(_) => {
                tracing::warn!(?role, "CFF outlines are not embedded; using base-14 metrics");
                Self::base14(role)
            }
            Err(err) => {
                tracing::warn!(
                    ?role,
                    error = %err,
                    "font bytes failed to parse; using base-14 metrics"
                );
                Self::base14(role)
            }
        }
    }

    fn base14(role: FontRole) -> Self {
        let base = match role {
            FontRole::Regular => "Helvetica",
            FontRole::Bold => "Helvetica-Bold",
        };
        Self {
            name: base.to_string(),
            data: Vec::new(),
            program: FontProgram::Base14(base),
            metrics: FontMetrics::fallback(),
        }
    }
}

fn default_name(role: FontRole) -> &'static str {
    match role {
        FontRole::Regular => "ReportRegular",
        FontRole::Bold => "ReportBold",
    }
}

impl FontMetrics {
    fn from_face(face: &ttf_parser::Face<'_>) -> Self {
        let units_per_em = face.units_per_em().max(1);
        let scale = 1000.0 / units_per_em as f32;
        let widths = build_widths(face, scale);
        let missing_width = widths
            .get((b' ' - FIRST_CHAR) as usize)
            .copied()
            .unwrap_or(0);

        let ascent = scale_i16(face.ascender(), scale);
        let descent = scale_i16(face.descender(), scale);
        let cap_height = face
            .capital_height()
            .map(|value| scale_i16(value, scale))
            .unwrap_or(ascent);
        let bbox = face.global_bounding_box();
        let bbox = (
            scale_i16(bbox.x_min, scale),
            scale_i16(bbox.y_min, scale),
            scale_i16(bbox.x_max, scale),
            scale_i16(bbox.y_max, scale),
        );
        let italic_angle = face
            .italic_angle()
            .map(|value| value.round() as i16)
            .unwrap_or(0);

        Self {
            first_char: FIRST_CHAR,
            last_char: LAST_CHAR,
            widths,
            ascent,
            descent,
            cap_height,
            italic_angle,
            stem_v: 80,
            bbox,
            missing_width,
            is_fixed_pitch: face.is_monospaced(),
        }
    }

    fn fallback() -> Self {
        Self {
            first_char: FIRST_CHAR,
            last_char: LAST_CHAR,
            widths: vec![FALLBACK_ADVANCE; (LAST_CHAR - FIRST_CHAR) as usize + 1],
            ascent: 718,
            descent: -207,
            cap_height: 718,
            italic_angle: 0,
            stem_v: 88,
            bbox: (-166, -225, 1000, 931),
            missing_width: FALLBACK_ADVANCE,
            is_fixed_pitch: false,
        }
    }

    fn advance_for_byte(&self, code: u8) -> u16 {
        if code < self.first_char || code > self.last_char {
            return self.missing_width;
        }
        let idx = (code - self.first_char) as usize;
        self.widths.get(idx).copied().unwrap_or(self.missing_width)
    }

    pub(crate) fn measure_text_width(&self, font_size: Pt, text: &str) -> Pt {
        let total_units: i32 = text
            .chars()
            .map(|ch| self.advance_for_byte(winansi_byte(ch).unwrap_or(b'?')) as i32)
            .fold(0i32, i32::saturating_add);
        if total_units <= 0 {
            return Pt::ZERO;
        }
        font_size.mul_ratio(total_units, 1000)
    }
}

fn build_widths(face: &ttf_parser::Face<'_>, scale: f32) -> Vec<u16> {
    let mut widths = Vec::with_capacity((LAST_CHAR - FIRST_CHAR) as usize + 1);
    for code in FIRST_CHAR..=LAST_CHAR {
        let width = winansi_char(code)
            .and_then(|ch| face.glyph_index(ch))
            .and_then(|id| face.glyph_hor_advance(id))
            .unwrap_or(0);
        let scaled = (width as f32 * scale).round() as i32;
        widths.push(scaled.clamp(0, u16::MAX as i32) as u16);
    }
    widths
}

fn scale_i16(value: i16, scale: f32) -> i16 {
    let scaled = (value as f32 * scale).round() as i32;
    scaled.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

fn font_name(face: &ttf_parser::Face<'_>) -> Option<String> {
    use ttf_parser::name::name_id;

    let mut full = None;
    let mut post = None;
    for entry in face.names() {
        let Some(name) = entry.to_string() else {
            continue;
        };
        match entry.name_id {
            name_id::POST_SCRIPT_NAME if post.is_none() => post = Some(name),
            name_id::FULL_NAME if full.is_none() => full = Some(name),
            _ => {}
        }
    }
    post.or(full)
        .map(|name| sanitize_font_name(&name))
        .filter(|name| !name.is_empty())
}

pub(crate) fn sanitize_font_name(name: &str) -> String {
    name.chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '-' || *ch == '_')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unparsable_bytes_fall_back_to_helvetica() {
        let fonts = FontAssets {
            regular: b"not a font".to_vec(),
            bold: Vec::new(),
        };
        let registry = FontRegistry::from_assets(&fonts);
        assert_eq!(
            registry.get(FontRole::Regular).program,
            FontProgram::Base14("Helvetica")
        );
        assert_eq!(
            registry.get(FontRole::Bold).program,
            FontProgram::Base14("Helvetica-Bold")
        );
        assert!(registry.get(FontRole::Bold).data.is_empty());
    }

    #[test]
    fn fallback_width_is_six_tenths_em_per_char() {
        let registry = FontRegistry::standard();
        let width = registry.measure_text_width(FontRole::Regular, Pt::from_f32(10.0), "abcd");
        assert_eq!(width.to_milli_i64(), 24_000);
        assert_eq!(
            registry
                .measure_text_width(FontRole::Bold, Pt::from_f32(10.0), "")
                .to_milli_i64(),
            0
        );
    }

    #[test]
    fn font_names_are_sanitized() {
        assert_eq!(sanitize_font_name("Inter Regular (v4)"), "InterRegularv4");
        assert_eq!(sanitize_font_name("Inter-Bold"), "Inter-Bold");
    }
}
