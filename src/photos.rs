use crate::assets::{Fetcher, StorageResolver};
use crate::canvas::Canvas;
use crate::error::{PhotoFetchError, PhotoFetchStage, ReportError};
use crate::font::FontRegistry;
use crate::layout::FontRole;
use crate::media::{MediaItem, PhotoGroup, group_photos};
use crate::pdf::{ImageData, decode_image_bytes, document_to_pdf};
use crate::types::{Pt, Rect, Size};
use futures::future::join_all;
use rayon::prelude::*;
use std::sync::Arc;

pub const PHOTOS_PER_PAGE: usize = 2;
pub const PHOTO_HEADER_FIRST_PAGE: &str = "Inspection Photos";

const MARGIN_MM: f32 = 20.0;
const HEADER_TOP_MM: f32 = 15.0;
const HEADER_SIZE: f32 = 14.0;
const SLOT_TOP_MM: [f32; PHOTOS_PER_PAGE] = [30.0, 145.0];
const IMAGE_HEIGHT_MM: f32 = 102.0;
const CAPTION_GAP_MM: f32 = 3.0;
const CAPTION_SIZE: f32 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub struct PhotoSlot {
    pub item: MediaItem,
    pub group_label: &'static str,
    // 1-based within the group.
    pub number: usize,
}

impl PhotoSlot {
    pub fn caption(&self) -> String {
        photo_caption(self.group_label, self.number)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhotoPagePlan {
    pub header: String,
    pub slots: Vec<PhotoSlot>,
}

pub fn photo_caption(group_label: &str, number: usize) -> String {
    format!("{group_label} - Photo {number}")
}

// A group never shares a page with the next group.
pub fn paginate(groups: &[PhotoGroup], first_header: &str) -> Vec<PhotoPagePlan> {
    let mut pages = Vec::new();
    for group in groups {
        let label = group.label();
        let numbered: Vec<PhotoSlot> = group
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| PhotoSlot {
                item: item.clone(),
                group_label: label,
                number: i + 1,
            })
            .collect();
        for chunk in numbered.chunks(PHOTOS_PER_PAGE) {
            let header = if pages.is_empty() {
                first_header.to_string()
            } else {
                label.to_string()
            };
            pages.push(PhotoPagePlan {
                header,
                slots: chunk.to_vec(),
            });
        }
    }
    pages
}

#[derive(Debug, Clone)]
pub struct PhotoAppendix {
    pub bytes: Vec<u8>,
    pub pages: usize,
    pub rendered: usize,
    pub skipped: Vec<PhotoFetchError>,
}

async fn fetch_photo(
    item: &MediaItem,
    storage: &dyn StorageResolver,
    fetcher: &dyn Fetcher,
) -> Result<Vec<u8>, PhotoFetchError> {
    let failure = |stage, message: String| PhotoFetchError {
        media_id: item.id.clone(),
        stage,
        message,
    };
    let url = storage
        .signed_url(&item.storage_path)
        .await
        .map_err(|err| failure(PhotoFetchStage::ResolveUrl, err.0))?;
    let response = fetcher
        .fetch(&url)
        .await
        .map_err(|err| failure(PhotoFetchStage::Fetch, err.0))?;
    if !response.is_success() {
        return Err(failure(
            PhotoFetchStage::Status,
            format!("status {}", response.status),
        ));
    }
    Ok(response.body)
}

async fn decode_all(
    fetched: Vec<(String, Result<Vec<u8>, PhotoFetchError>)>,
) -> Result<Vec<Result<Arc<ImageData>, PhotoFetchError>>, ReportError> {
    tokio::task::spawn_blocking(move || {
        fetched
            .into_par_iter()
            .map(|(media_id, result)| {
                let bytes = result?;
                decode_image_bytes(&bytes)
                    .map(Arc::new)
                    .map_err(|message| PhotoFetchError {
                        media_id,
                        stage: PhotoFetchStage::Decode,
                        message,
                    })
            })
            .collect()
    })
    .await
    .map_err(|err| ReportError::render(format!("photo decode task failed: {err}")))
}

pub async fn build_photo_pages(
    items: &[MediaItem],
    storage: &dyn StorageResolver,
    fetcher: &dyn Fetcher,
    fonts: &FontRegistry,
    first_header: &str,
) -> Result<Option<PhotoAppendix>, ReportError> {
    let groups = group_photos(items);
    if groups.is_empty() {
        return Ok(None);
    }
    let plan = paginate(&groups, first_header);
    let slots: Vec<&PhotoSlot> = plan.iter().flat_map(|page| page.slots.iter()).collect();

    let fetched = join_all(
        slots
            .iter()
            .map(|slot| fetch_photo(&slot.item, storage, fetcher)),
    )
    .await;
    let fetched = slots
        .iter()
        .map(|slot| slot.item.id.clone())
        .zip(fetched)
        .collect();
    let decoded = decode_all(fetched).await?;

    let mut skipped = Vec::new();
    let mut images: Vec<Option<Arc<ImageData>>> = Vec::with_capacity(decoded.len());
    for result in decoded {
        match result {
            Ok(image) => images.push(Some(image)),
            Err(err) => {
                tracing::warn!(
                    media_id = %err.media_id,
                    stage = err.stage.as_str(),
                    error = %err.message,
                    "photo skipped"
                );
                skipped.push(err);
                images.push(None);
            }
        }
    }
    let rendered = images.iter().filter(|image| image.is_some()).count();

    let page_size = Size::letter();
    let mut canvas = Canvas::new(page_size);
    let mut images = images.into_iter();
    for page in &plan {
        draw_header(&mut canvas, fonts, page_size, &page.header);
        for (position, slot) in page.slots.iter().enumerate() {
            let image = images.next().flatten();
            if let Some(image) = image {
                draw_slot(&mut canvas, fonts, page_size, position, slot, image);
            }
        }
        canvas.show_page();
    }

    let bytes = document_to_pdf(&canvas.finish_without_show(), fonts)?;
    tracing::info!(
        pages = plan.len(),
        rendered,
        skipped = skipped.len(),
        bytes = bytes.len(),
        "photo appendix rendered"
    );
    Ok(Some(PhotoAppendix {
        bytes,
        pages: plan.len(),
        rendered,
        skipped,
    }))
}

fn draw_header(canvas: &mut Canvas, fonts: &FontRegistry, page_size: Size, header: &str) {
    let size = Pt::from_f32(HEADER_SIZE);
    canvas.set_font(FontRole::Bold, size);
    let width = fonts.measure_text_width(FontRole::Bold, size, header);
    canvas.draw_string(
        (page_size.width - width) / 2,
        Pt::from_mm(HEADER_TOP_MM),
        header,
    );
}

fn draw_slot(
    canvas: &mut Canvas,
    fonts: &FontRegistry,
    page_size: Size,
    position: usize,
    slot: &PhotoSlot,
    image: Arc<ImageData>,
) {
    let top_mm = SLOT_TOP_MM[position.min(PHOTOS_PER_PAGE - 1)];
    let frame = Rect::new(
        Pt::from_mm(MARGIN_MM),
        Pt::from_mm(top_mm),
        page_size.width - Pt::from_mm(MARGIN_MM * 2.0),
        Pt::from_mm(IMAGE_HEIGHT_MM),
    );
    let placed = frame.fit_aspect(image.width, image.height);
    let resource_id = canvas.register_image(image);
    canvas.draw_image(
        placed.x,
        placed.y,
        placed.width,
        placed.height,
        &resource_id,
    );

    let caption = slot.caption();
    let size = Pt::from_f32(CAPTION_SIZE);
    canvas.set_font(FontRole::Regular, size);
    let width = fonts.measure_text_width(FontRole::Regular, size, &caption);
    canvas.draw_string(
        (page_size.width - width) / 2,
        frame.bottom() + Pt::from_mm(CAPTION_GAP_MM),
        caption,
    );
}
