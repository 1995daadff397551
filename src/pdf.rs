use crate::canvas::{Command, Document};
use crate::error::{ReportError, lopdf_err};
use crate::font::{FontProgram, FontRegistry, RegisteredFont};
use crate::layout::FontRole;
use crate::text::encode_winansi;
use crate::types::{Color, Pt};
use base64::Engine;
use image::GenericImageView;
use lopdf::content::{Content, Operation};
use lopdf::{
    Dictionary as LoDictionary, Document as LoDocument, Object as LoObject,
    ObjectId as LoObjectId, Stream as LoStream, StringFormat, dictionary,
};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ImageData {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) color_space: &'static str,
    pub(crate) bits_per_component: u8,
    // Raw samples are Flate-compressed on save.
    pub(crate) filter: Option<&'static str>,
    pub(crate) data: Vec<u8>,
    pub(crate) alpha: Option<AlphaData>,
    // Adobe CMYK JPEGs store inverted samples.
    pub(crate) decode_inverted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AlphaData {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) data: Vec<u8>,
}

pub(crate) fn decode_image_bytes(data: &[u8]) -> Result<ImageData, String> {
    let format = image::guess_format(data).map_err(|e| format!("unknown image format: {e}"))?;
    if !matches!(format, image::ImageFormat::Png | image::ImageFormat::Jpeg) {
        return Err(format!("unsupported image format {format:?}"));
    }
    let decoded = image::load_from_memory_with_format(data, format)
        .map_err(|e| format!("decode failed: {e}"))?;
    let (width, height) = decoded.dimensions();
    if width == 0 || height == 0 {
        return Err("image has no pixels".to_string());
    }

    if format == image::ImageFormat::Jpeg {
        return jpeg_passthrough(data, width, height, decoded.color());
    }

    let rgba = decoded.to_rgba8();
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    let mut has_alpha = false;
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        if a != 255 {
            has_alpha = true;
        }
        rgb.extend_from_slice(&[r, g, b]);
        alpha.push(a);
    }
    Ok(ImageData {
        width,
        height,
        color_space: "DeviceRGB",
        bits_per_component: 8,
        filter: None,
        data: rgb,
        alpha: has_alpha.then_some(AlphaData {
            width,
            height,
            data: alpha,
        }),
        decode_inverted: false,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct JpegFrame {
    components: u8,
    adobe: bool,
}

// Walks the marker segments up to the first frame header.
fn jpeg_frame(data: &[u8]) -> Option<JpegFrame> {
    if !data.starts_with(&[0xFF, 0xD8]) {
        return None;
    }
    let mut adobe = false;
    let mut pos = 2;
    loop {
        if *data.get(pos)? != 0xFF {
            return None;
        }
        while data.get(pos) == Some(&0xFF) {
            pos += 1;
        }
        let marker = *data.get(pos)?;
        pos += 1;
        match marker {
            0x01 | 0xD0..=0xD8 => continue,
            0xD9 | 0xDA => return None,
            _ => {}
        }
        let len = u16::from_be_bytes([*data.get(pos)?, *data.get(pos + 1)?]) as usize;
        if len < 2 {
            return None;
        }
        let body = data.get(pos + 2..pos + len)?;
        match marker {
            0xEE if body.starts_with(b"Adobe") => adobe = true,
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                return Some(JpegFrame {
                    components: *body.get(5)?,
                    adobe,
                });
            }
            _ => {}
        }
        pos += len;
    }
}

fn jpeg_passthrough(
    data: &[u8],
    width: u32,
    height: u32,
    fallback: image::ColorType,
) -> Result<ImageData, String> {
    let (color_space, decode_inverted) = match jpeg_frame(data) {
        Some(JpegFrame { components: 1, .. }) => ("DeviceGray", false),
        Some(JpegFrame { components: 3, .. }) => ("DeviceRGB", false),
        Some(JpegFrame {
            components: 4,
            adobe,
        }) => ("DeviceCMYK", adobe),
        Some(frame) => {
            return Err(format!("unsupported JPEG component count {}", frame.components));
        }
        None => match fallback {
            image::ColorType::L8 | image::ColorType::La8 => ("DeviceGray", false),
            _ => ("DeviceRGB", false),
        },
    };
    Ok(ImageData {
        width,
        height,
        color_space,
        bits_per_component: 8,
        filter: Some("DCTDecode"),
        data: data.to_vec(),
        alpha: None,
        decode_inverted,
    })
}

pub(crate) fn parse_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.trim().strip_prefix("data:")?;
    let (header, data_part) = rest.split_once(',')?;
    let mime = header
        .split(';')
        .next()
        .filter(|m| !m.is_empty())
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = if header.contains("base64") {
        let cleaned: String = data_part.chars().filter(|c| !c.is_whitespace()).collect();
        base64::engine::general_purpose::STANDARD
            .decode(cleaned)
            .ok()?
    } else {
        data_part.as_bytes().to_vec()
    };
    Some((mime, data))
}

fn font_resource_name(role: FontRole) -> &'static str {
    match role {
        FontRole::Regular => "F1",
        FontRole::Bold => "F2",
    }
}

fn num(value: Pt) -> LoObject {
    LoObject::Real((value.to_milli_i64() as f64 / 1000.0) as f32)
}

fn unit(value: f32) -> LoObject {
    let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
    LoObject::Real(value)
}

fn color_operands(color: Color) -> Vec<LoObject> {
    vec![unit(color.r), unit(color.g), unit(color.b)]
}

fn used_fonts(document: &Document) -> BTreeSet<FontRole> {
    let mut used = BTreeSet::new();
    for page in &document.pages {
        let mut current = FontRole::Regular;
        for command in &page.commands {
            match command {
                Command::SetFont(role) => current = *role,
                Command::DrawString { .. } => {
                    used.insert(current);
                }
                _ => {}
            }
        }
    }
    used
}

fn add_font(doc: &mut LoDocument, font: &RegisteredFont) -> LoObjectId {
    let base_name = font.name.as_str();
    match font.program {
        FontProgram::Base14(base) => doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => base,
            "Encoding" => "WinAnsiEncoding",
        }),
        FontProgram::TrueType => {
            let metrics = &font.metrics;
            let font_file_id = doc.add_object(LoStream::new(
                dictionary! { "Length1" => font.data.len() as i64 },
                font.data.clone(),
            ));
            let mut flags = 32i64;
            if metrics.is_fixed_pitch {
                flags |= 1;
            }
            let descriptor_id = doc.add_object(dictionary! {
                "Type" => "FontDescriptor",
                "FontName" => base_name,
                "Flags" => flags,
                "FontBBox" => vec![
                    (metrics.bbox.0 as i64).into(),
                    (metrics.bbox.1 as i64).into(),
                    (metrics.bbox.2 as i64).into(),
                    (metrics.bbox.3 as i64).into(),
                ],
                "ItalicAngle" => metrics.italic_angle as i64,
                "Ascent" => metrics.ascent as i64,
                "Descent" => metrics.descent as i64,
                "CapHeight" => metrics.cap_height as i64,
                "StemV" => metrics.stem_v as i64,
                "MissingWidth" => metrics.missing_width as i64,
                "FontFile2" => font_file_id,
            });
            let widths: Vec<LoObject> = metrics
                .widths
                .iter()
                .map(|w| LoObject::Integer(*w as i64))
                .collect();
            doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "TrueType",
                "BaseFont" => base_name,
                "FirstChar" => metrics.first_char as i64,
                "LastChar" => metrics.last_char as i64,
                "Widths" => widths,
                "FontDescriptor" => descriptor_id,
                "Encoding" => "WinAnsiEncoding",
            })
        }
    }
}

fn add_image(doc: &mut LoDocument, image: &ImageData) -> LoObjectId {
    let smask_id = image.alpha.as_ref().map(|alpha| {
        doc.add_object(LoStream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => alpha.width as i64,
                "Height" => alpha.height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            alpha.data.clone(),
        ))
    });
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => image.width as i64,
        "Height" => image.height as i64,
        "ColorSpace" => image.color_space,
        "BitsPerComponent" => image.bits_per_component as i64,
    };
    if let Some(filter) = image.filter {
        dict.set("Filter", LoObject::Name(filter.as_bytes().to_vec()));
    }
    if let Some(id) = smask_id {
        dict.set("SMask", LoObject::Reference(id));
    }
    if image.decode_inverted {
        let decode: Vec<LoObject> = [1, 0, 1, 0, 1, 0, 1, 0]
            .into_iter()
            .map(LoObject::Integer)
            .collect();
        dict.set("Decode", decode);
    }
    let stream = LoStream::new(dict, image.data.clone());
    // JPEG data is already DCT-encoded.
    doc.add_object(stream.with_compression(image.filter.is_none()))
}

fn page_operations(commands: &[Command], page_height: Pt) -> Vec<Operation> {
    let mut ops = Vec::new();
    let mut font = FontRole::Regular;
    let mut font_size = Pt::from_f32(12.0);
    // Font selection is tracked here and follows q/Q like the canvas state does.
    let mut saved = Vec::new();
    for command in commands {
        match command {
            Command::SaveState => {
                saved.push((font, font_size));
                ops.push(Operation::new("q", vec![]));
            }
            Command::RestoreState => {
                if let Some((saved_font, saved_size)) = saved.pop() {
                    font = saved_font;
                    font_size = saved_size;
                }
                ops.push(Operation::new("Q", vec![]));
            }
            Command::SetFillColor(color) => {
                ops.push(Operation::new("rg", color_operands(*color)));
            }
            Command::SetStrokeColor(color) => {
                ops.push(Operation::new("RG", color_operands(*color)));
            }
            Command::SetLineWidth(width) => ops.push(Operation::new("w", vec![num(*width)])),
            Command::SetFont(role) => font = *role,
            Command::SetFontSize(size) => font_size = *size,
            Command::DrawString { x, y, text } => {
                let baseline = page_height - *y - font_size;
                ops.push(Operation::new("BT", vec![]));
                ops.push(Operation::new(
                    "Tf",
                    vec![
                        LoObject::Name(font_resource_name(font).as_bytes().to_vec()),
                        num(font_size),
                    ],
                ));
                ops.push(Operation::new("Td", vec![num(*x), num(baseline)]));
                let operand = LoObject::String(encode_winansi(text), StringFormat::Literal);
                ops.push(Operation::new("Tj", vec![operand]));
                ops.push(Operation::new("ET", vec![]));
            }
            Command::DrawRect {
                x,
                y,
                width,
                height,
            } => {
                let bottom = page_height - *y - *height;
                ops.push(Operation::new(
                    "re",
                    vec![num(*x), num(bottom), num(*width), num(*height)],
                ));
                ops.push(Operation::new("f", vec![]));
            }
            Command::StrokeRect {
                x,
                y,
                width,
                height,
            } => {
                let bottom = page_height - *y - *height;
                ops.push(Operation::new(
                    "re",
                    vec![num(*x), num(bottom), num(*width), num(*height)],
                ));
                ops.push(Operation::new("S", vec![]));
            }
            Command::DrawImage {
                x,
                y,
                width,
                height,
                resource_id,
            } => {
                let bottom = page_height - *y - *height;
                ops.push(Operation::new("q", vec![]));
                ops.push(Operation::new(
                    "cm",
                    vec![
                        num(*width),
                        0.into(),
                        0.into(),
                        num(*height),
                        num(*x),
                        num(bottom),
                    ],
                ));
                ops.push(Operation::new(
                    "Do",
                    vec![LoObject::Name(resource_id.as_bytes().to_vec())],
                ));
                ops.push(Operation::new("Q", vec![]));
            }
        }
    }
    ops
}

pub(crate) fn document_to_pdf(
    document: &Document,
    fonts: &FontRegistry,
) -> Result<Vec<u8>, ReportError> {
    let mut doc = LoDocument::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut font_dict = LoDictionary::new();
    for role in used_fonts(document) {
        let id = add_font(&mut doc, fonts.get(role));
        font_dict.set(font_resource_name(role), LoObject::Reference(id));
    }

    let referenced: BTreeSet<&str> = document
        .pages
        .iter()
        .flat_map(|page| page.commands.iter())
        .filter_map(|command| match command {
            Command::DrawImage { resource_id, .. } => Some(resource_id.as_str()),
            _ => None,
        })
        .collect();
    let mut xobject_dict = LoDictionary::new();
    let mut image_ids: BTreeMap<&str, LoObjectId> = BTreeMap::new();
    for (resource_id, image) in &document.images {
        if !referenced.contains(resource_id.as_str()) {
            continue;
        }
        let id = add_image(&mut doc, image);
        image_ids.insert(resource_id.as_str(), id);
        xobject_dict.set(resource_id.as_bytes().to_vec(), LoObject::Reference(id));
    }
    if let Some(missing) = referenced.iter().find(|id| !image_ids.contains_key(*id)) {
        return Err(ReportError::render(format!(
            "image resource {missing} was drawn but never registered"
        )));
    }

    let resources_id = doc.add_object(dictionary! {
        "Font" => font_dict,
        "XObject" => xobject_dict,
        "ProcSet" => vec!["PDF".into(), "Text".into(), "ImageC".into()],
    });

    let width = document.page_size.width;
    let height = document.page_size.height;
    let mut kids = Vec::with_capacity(document.pages.len());
    for page in &document.pages {
        let content = Content {
            operations: page_operations(&page.commands, height),
        };
        let encoded = content.encode().map_err(lopdf_err)?;
        let content_id = doc.add_object(LoStream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), num(width), num(height)],
        });
        kids.push(LoObject::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        LoObject::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();
    save_document(&mut doc)
}

pub(crate) fn inherited_page_attribute(
    doc: &LoDocument,
    page_id: LoObjectId,
    key: &[u8],
) -> Option<LoObject> {
    let mut current = doc.get_object(page_id).and_then(LoObject::as_dict).ok()?;
    // Bounded walk; malformed files can have cyclic parents.
    for _ in 0..64 {
        if let Ok(value) = current.get(key) {
            return Some(resolve(doc, value).clone());
        }
        let parent = current
            .get(b"Parent")
            .and_then(LoObject::as_reference)
            .ok()?;
        current = doc.get_object(parent).and_then(LoObject::as_dict).ok()?;
    }
    None
}

pub(crate) fn resolve<'a>(doc: &'a LoDocument, object: &'a LoObject) -> &'a LoObject {
    match object {
        LoObject::Reference(id) => doc.get_object(*id).unwrap_or(object),
        _ => object,
    }
}

pub(crate) fn save_document(doc: &mut LoDocument) -> Result<Vec<u8>, ReportError> {
    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|err| ReportError::render(format!("pdf write failed: {err}")))?;
    Ok(out)
}

#[cfg(test)]
pub(crate) mod testing {
    use image::{ImageBuffer, Rgb, Rgba};
    use std::io::Cursor;

    pub fn png_bytes(width: u32, height: u32, translucent: bool) -> Vec<u8> {
        let alpha = if translucent { 128 } else { 255 };
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgba([(x * 40) as u8, (y * 40) as u8, 90, alpha])
        });
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).expect("encode png");
        out.into_inner()
    }

    pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x * 30) as u8, (y * 30) as u8, 60])
        });
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Jpeg).expect("encode jpeg");
        out.into_inner()
    }

    pub fn png_data_uri(width: u32, height: u32) -> String {
        use base64::Engine;
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(png_bytes(width, height, false))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{jpeg_bytes, png_bytes, png_data_uri};
    use super::*;
    use crate::canvas::Canvas;
    use crate::types::Size;
    use std::sync::Arc;

    #[test]
    fn jpeg_is_passed_through() {
        let bytes = jpeg_bytes(8, 4);
        let image = decode_image_bytes(&bytes).expect("jpeg");
        assert_eq!(image.filter, Some("DCTDecode"));
        assert_eq!(image.data, bytes);
        assert_eq!((image.width, image.height), (8, 4));
        assert!(image.alpha.is_none());
    }

    // SOI, an Adobe APP14 segment, then a baseline frame header with four components.
    fn adobe_cmyk_header() -> Vec<u8> {
        let mut out = vec![0xFF, 0xD8];
        out.extend_from_slice(&[0xFF, 0xEE, 0x00, 0x0E]);
        out.extend_from_slice(b"Adobe");
        out.extend_from_slice(&[0x00, 0x64, 0x00, 0x00, 0x00, 0x00, 0x02]);
        out.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x14]);
        out.extend_from_slice(&[0x08, 0x00, 0x10, 0x00, 0x10, 0x04]);
        for id in 1..=4u8 {
            out.extend_from_slice(&[id, 0x11, 0x00]);
        }
        out
    }

    #[test]
    fn jpeg_frame_reads_components_and_adobe_marker() {
        assert_eq!(
            jpeg_frame(&adobe_cmyk_header()),
            Some(JpegFrame {
                components: 4,
                adobe: true,
            })
        );
        assert_eq!(
            jpeg_frame(&jpeg_bytes(8, 4)).map(|frame| frame.components),
            Some(3)
        );
        assert_eq!(jpeg_frame(b"\xFF\xD8\xFF"), None);
        assert_eq!(jpeg_frame(&png_bytes(2, 2, false)), None);
    }

    #[test]
    fn adobe_cmyk_jpeg_is_written_inverted() {
        let header = adobe_cmyk_header();
        let image = jpeg_passthrough(&header, 16, 16, image::ColorType::Rgb8).expect("cmyk");
        assert_eq!(image.color_space, "DeviceCMYK");
        assert!(image.decode_inverted);

        let mut doc = LoDocument::with_version("1.7");
        let id = add_image(&mut doc, &image);
        let stream = doc
            .get_object(id)
            .and_then(LoObject::as_stream)
            .expect("image stream");
        assert_eq!(
            stream
                .dict
                .get(b"ColorSpace")
                .and_then(LoObject::as_name)
                .ok(),
            Some(&b"DeviceCMYK"[..])
        );
        let decode = stream
            .dict
            .get(b"Decode")
            .and_then(LoObject::as_array)
            .expect("decode array");
        assert_eq!(decode.len(), 8);

        let rgb = decode_image_bytes(&jpeg_bytes(8, 4)).expect("rgb jpeg");
        assert_eq!(rgb.color_space, "DeviceRGB");
        assert!(!rgb.decode_inverted);
        let rgb_id = add_image(&mut doc, &rgb);
        let rgb_stream = doc
            .get_object(rgb_id)
            .and_then(LoObject::as_stream)
            .expect("image stream");
        assert!(rgb_stream.dict.get(b"Decode").is_err());
    }

    #[test]
    fn png_becomes_rgb_with_optional_smask() {
        let opaque = decode_image_bytes(&png_bytes(3, 2, false)).expect("png");
        assert_eq!(opaque.filter, None);
        assert_eq!(opaque.data.len(), 3 * 2 * 3);
        assert!(opaque.alpha.is_none());

        let translucent = decode_image_bytes(&png_bytes(3, 2, true)).expect("png");
        assert_eq!(translucent.alpha.as_ref().map(|a| a.data.len()), Some(6));
    }

    #[test]
    fn garbage_bytes_do_not_decode() {
        assert!(decode_image_bytes(b"definitely not an image").is_err());
    }

    #[test]
    fn data_uri_parsing() {
        let (mime, data) = parse_data_uri(&png_data_uri(2, 2)).expect("uri");
        assert_eq!(mime, "image/png");
        assert!(decode_image_bytes(&data).is_ok());
        assert!(parse_data_uri("https://example.test/a.png").is_none());
        assert!(parse_data_uri("data:image/png;base64,%%%").is_none());
    }

    #[test]
    fn writes_one_pdf_page_per_canvas_page() {
        let fonts = FontRegistry::standard();
        let mut canvas = Canvas::new(Size::letter());
        canvas.set_font(FontRole::Bold, Pt::from_f32(14.0));
        canvas.draw_string(Pt::from_f32(72.0), Pt::from_f32(72.0), "Septic Tank");
        canvas.show_page();
        let image = Arc::new(decode_image_bytes(&png_bytes(4, 4, true)).expect("png"));
        let id = canvas.register_image(image);
        canvas.draw_image(
            Pt::from_f32(72.0),
            Pt::from_f32(100.0),
            Pt::from_f32(200.0),
            Pt::from_f32(200.0),
            &id,
        );
        canvas.show_page();
        let bytes = document_to_pdf(&canvas.finish_without_show(), &fonts).expect("pdf");

        let doc = LoDocument::load_mem(&bytes).expect("reload");
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 2);
        let first = pages.get(&1).copied().expect("page 1");
        let content = doc.get_page_content(first).expect("content");
        let text = String::from_utf8_lossy(&content);
        assert!(text.contains("/F2"));
        assert!(text.contains("(Septic Tank)"));
    }

    #[test]
    fn unregistered_image_is_a_render_error() {
        let fonts = FontRegistry::standard();
        let mut canvas = Canvas::new(Size::letter());
        canvas.draw_image(
            Pt::ZERO,
            Pt::ZERO,
            Pt::from_f32(1.0),
            Pt::from_f32(1.0),
            "ImMissing",
        );
        let err = document_to_pdf(&canvas.finish(), &fonts).expect_err("must fail");
        assert!(matches!(err, ReportError::Render { .. }));
    }
}
