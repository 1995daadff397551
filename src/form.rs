use crate::canvas::Canvas;
use crate::error::{ReportError, lopdf_err};
use crate::font::FontRegistry;
use crate::layout::{
    FieldKind, FieldPosition, LINE_HEIGHT_FACTOR, PAGE_COUNT, TEXT_FONT_SIZE, TEXT_MIN_FONT_SIZE,
    page_fields,
};
use crate::mapper::RenderValueMap;
use crate::pdf::{
    decode_image_bytes, document_to_pdf, inherited_page_attribute, parse_data_uri, resolve,
    save_document,
};
use crate::text::{fit_font_size, wrap_lines};
use crate::types::{Pt, Size};
use lopdf::{
    Dictionary as LoDictionary, Document as LoDocument, Object as LoObject, Stream as LoStream,
    dictionary,
};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormOutput {
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub fields_drawn: usize,
}

pub fn render_form(
    base_document: &[u8],
    fonts: &FontRegistry,
    values: &RenderValueMap,
) -> Result<FormOutput, ReportError> {
    let mut base = LoDocument::load_mem(base_document)
        .map_err(|err| ReportError::render(format!("base document failed to parse: {err}")))?;
    if base.is_encrypted() {
        return Err(ReportError::render("base document is encrypted"));
    }
    let base_pages: Vec<_> = base.get_pages().into_values().collect();
    if base_pages.len() != PAGE_COUNT {
        return Err(ReportError::render(format!(
            "base document has {} pages, expected {PAGE_COUNT}",
            base_pages.len()
        )));
    }

    let (overlay, fields_drawn) = draw_overlay(fonts, values)?;
    let overlay_bytes = document_to_pdf(&overlay, fonts)?;
    let mut overlay = LoDocument::load_mem(&overlay_bytes).map_err(lopdf_err)?;

    overlay.renumber_objects_with(base.max_id + 1);
    let overlay_pages: Vec<_> = overlay.get_pages().into_values().collect();
    base.max_id = base.max_id.max(overlay.max_id);
    base.objects.extend(overlay.objects);

    for page in 1..PAGE_COUNT {
        if page_fields(page).is_empty() {
            continue;
        }
        stamp_page(&mut base, base_pages[page], overlay_pages[page], page)?;
    }

    base.prune_objects();
    base.renumber_objects();
    base.compress();
    let bytes = save_document(&mut base)?;
    tracing::info!(
        pages = PAGE_COUNT,
        fields = fields_drawn,
        bytes = bytes.len(),
        "form pages rendered"
    );
    Ok(FormOutput {
        bytes,
        page_count: PAGE_COUNT,
        fields_drawn,
    })
}

fn draw_overlay(
    fonts: &FontRegistry,
    values: &RenderValueMap,
) -> Result<(crate::canvas::Document, usize), ReportError> {
    let mut canvas = Canvas::new(Size::letter());
    let mut drawn = 0;
    for page in 0..PAGE_COUNT {
        for field in page_fields(page) {
            if draw_field(&mut canvas, fonts, field, values)? {
                drawn += 1;
            }
        }
        canvas.show_page();
    }
    Ok((canvas.finish_without_show(), drawn))
}

fn draw_field(
    canvas: &mut Canvas,
    fonts: &FontRegistry,
    field: &FieldPosition,
    values: &RenderValueMap,
) -> Result<bool, ReportError> {
    let rect = field.rect();
    if let FieldKind::Image = field.kind {
        let Some(value) = values.get(field.id) else {
            return Ok(false);
        };
        let (_, bytes) = parse_data_uri(value).ok_or_else(|| {
            ReportError::render_at(field.page, field.id, "value is not a base64 data URL")
        })?;
        let image = decode_image_bytes(&bytes)
            .map_err(|message| ReportError::render_at(field.page, field.id, message))?;
        let placed = rect.fit_aspect(image.width, image.height);
        let resource_id = canvas.register_image(Arc::new(image));
        canvas.draw_image(
            placed.x,
            placed.y,
            placed.width,
            placed.height,
            &resource_id,
        );
        return Ok(true);
    }

    let value = values.get(field.id).ok_or_else(|| {
        ReportError::render_at(field.page, field.id, "no value for declared field")
    })?;
    if value.trim().is_empty() {
        return Ok(false);
    }

    match field.kind {
        FieldKind::Text | FieldKind::AutoText { .. } => {
            let (min_size, max_size) = match field.kind {
                FieldKind::AutoText { min_size, max_size } => (min_size, max_size),
                _ => (TEXT_MIN_FONT_SIZE, TEXT_FONT_SIZE),
            };
            let size = fit_font_size(fonts, field.font, value, rect.width, min_size, max_size);
            let size_pt = Pt::from_f32(size);
            canvas.set_font(field.font, size_pt);
            let top = rect.y + (rect.height - size_pt) / 2;
            canvas.draw_string(rect.x, top, value);
        }
        FieldKind::MultiLine { size } => {
            let size_pt = Pt::from_f32(size);
            let line_height = size_pt * LINE_HEIGHT_FACTOR;
            let rows = rect.height.to_f32() / line_height.to_f32();
            let max_lines = rows.floor().max(1.0) as usize;
            canvas.set_font(field.font, size_pt);
            let lines = wrap_lines(fonts, field.font, size_pt, value, rect.width);
            let mut top = rect.y;
            for line in lines.iter().take(max_lines) {
                canvas.draw_string(rect.x, top, line.as_str());
                top += line_height;
            }
        }
        FieldKind::Checkbox => {
            let size_pt = Pt::from_f32(TEXT_FONT_SIZE).min(rect.height);
            canvas.set_font(field.font, size_pt);
            let width = fonts.measure_text_width(field.font, size_pt, value);
            let left = rect.x + (rect.width - width) / 2;
            let top = rect.y + (rect.height - size_pt) / 2;
            canvas.draw_string(left, top, value);
        }
        FieldKind::Image => {}
    }
    Ok(true)
}

fn dictionary_or_empty(doc: &LoDocument, object: Option<LoObject>) -> LoDictionary {
    match object {
        Some(LoObject::Dictionary(dict)) => dict,
        Some(other) => resolve(doc, &other)
            .as_dict()
            .cloned()
            .unwrap_or_default(),
        None => LoDictionary::new(),
    }
}

fn stamp_page(
    doc: &mut LoDocument,
    base_page_id: lopdf::ObjectId,
    overlay_page_id: lopdf::ObjectId,
    page: usize,
) -> Result<(), ReportError> {
    let overlay_content = doc.get_page_content(overlay_page_id).map_err(lopdf_err)?;
    let overlay_resources = inherited_page_attribute(doc, overlay_page_id, b"Resources")
        .unwrap_or_else(|| LoObject::Dictionary(LoDictionary::new()));
    let bbox = inherited_page_attribute(doc, base_page_id, b"MediaBox")
        .and_then(|obj| obj.as_array().ok().cloned())
        .unwrap_or_else(|| vec![0.into(), 0.into(), 612.into(), 792.into()]);

    let form_id = doc.add_object(LoStream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "FormType" => 1,
            "BBox" => LoObject::Array(bbox),
            "Resources" => overlay_resources,
        },
        overlay_content,
    ));
    let form_name = format!("SROvl{page}");

    let resources_obj = inherited_page_attribute(doc, base_page_id, b"Resources");
    let mut resources = dictionary_or_empty(doc, resources_obj);
    let xobjects_obj = resources.get(b"XObject").ok().cloned();
    let mut xobjects = dictionary_or_empty(doc, xobjects_obj);
    xobjects.set(form_name.as_bytes().to_vec(), LoObject::Reference(form_id));
    resources.set("XObject", LoObject::Dictionary(xobjects));

    let existing: Vec<LoObject> = doc
        .get_page_contents(base_page_id)
        .into_iter()
        .map(LoObject::Reference)
        .collect();
    let open_id = doc.add_object(LoStream::new(dictionary! {}, b"q\n".to_vec()));
    let close_id = doc.add_object(LoStream::new(
        dictionary! {},
        format!("\nQ\nq 1 0 0 1 0 0 cm /{form_name} Do Q\n").into_bytes(),
    ));
    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(LoObject::Reference(open_id));
    contents.extend(existing);
    contents.push(LoObject::Reference(close_id));

    let page_mut = doc
        .get_object_mut(base_page_id)
        .and_then(LoObject::as_dict_mut)
        .map_err(lopdf_err)?;
    page_mut.set("Resources", LoObject::Dictionary(resources));
    page_mut.set("Contents", LoObject::Array(contents));
    Ok(())
}
