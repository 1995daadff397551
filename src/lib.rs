mod assets;
mod canvas;
mod comments;
mod error;
mod font;
mod form;
mod layout;
mod mapper;
mod media;
mod merge;
mod pdf;
mod photos;
mod record;
mod text;
mod types;

#[cfg(feature = "http")]
pub use assets::HttpFetcher;
pub use assets::{
    FetchResponse, Fetcher, FontAssets, FsFetcher, StaticStorageResolver, StorageResolver,
    TemplateAssets, TemplateCache,
};
use chrono::NaiveDate;
use comments::build_comments_page;
pub use comments::{
    COMMENT_BLOCK_BASE_MM, COMMENT_BLOCK_GAP_MM, COMMENT_BLOCK_MAX_MM, COMMENT_BLOCK_STEP_MM,
    COMMENTS_TITLE, CommentLayout,
};
pub use error::{FetchTransportError, PhotoFetchError, PhotoFetchStage, ReportError};
use form::render_form;
pub use layout::{
    FieldKind, FieldPosition, FontRole, PAGE_COUNT, SIGNATURE_DATE_FIELD, SIGNATURE_FIELD,
    all_fields, field, page_fields, value_field_ids,
};
pub use mapper::{
    CHECK_MARK, DESIGN_FLOW_COMMENTS_LABEL, DISPOSAL_WORKS_COMMENTS_LABEL, FieldMapper,
    OVERFLOW_THRESHOLD, OverflowEntry, OverflowReport, RenderValueMap, SEE_COMMENTS,
    SEPTIC_TANK_COMMENTS_LABEL, inspector_initials, map_record,
};
pub use media::{MediaItem, MediaKind, PhotoGroup, Section, group_photos};
pub use merge::{DocumentInfo, inspect_document, merge_documents};
use photos::build_photo_pages;
pub use photos::{
    PHOTO_HEADER_FIRST_PAGE, PHOTOS_PER_PAGE, PhotoPagePlan, PhotoSlot, paginate, photo_caption,
};
pub use record::{
    BaffleCondition, ChoiceField, Condition, DesignFlow, DisposalType, DisposalWorks,
    DistributionMethod, FacilityInfo, FacilityType, FlowBasis, GeneralTreatment,
    InspectionRecord, LiquidLevel, Performance, SepticTank, SystemType, TankMaterial, TankRecord,
    WaterSource, YesNo, YesNoUnknown,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
pub use types::{Color, Pt, Rect, Size};

pub const DEFAULT_BASE_DOCUMENT_PATH: &str = "templates/inspection-form.pdf";
pub const DEFAULT_REGULAR_FONT_PATH: &str = "fonts/Inter-Regular.ttf";
pub const DEFAULT_BOLD_FONT_PATH: &str = "fonts/Inter-Bold.ttf";
pub const PRINT_DATE_FORMAT: &str = "%m/%d/%Y";

type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub base_document_path: String,
    pub regular_font_path: String,
    pub bold_font_path: String,
    pub overflow_threshold: usize,
    pub comments: CommentLayout,
    pub photo_header_first_page: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            base_document_path: DEFAULT_BASE_DOCUMENT_PATH.to_string(),
            regular_font_path: DEFAULT_REGULAR_FONT_PATH.to_string(),
            bold_font_path: DEFAULT_BOLD_FONT_PATH.to_string(),
            overflow_threshold: OVERFLOW_THRESHOLD,
            comments: CommentLayout::default(),
            photo_header_first_page: PHOTO_HEADER_FIRST_PAGE.to_string(),
        }
    }
}

impl ReportConfig {
    pub fn from_json(raw: &str) -> Result<Self, ReportError> {
        let config: ReportConfig = serde_json::from_str(raw)
            .map_err(|err| ReportError::Config(format!("config does not parse: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReportError> {
        let paths = [
            ("base_document_path", &self.base_document_path),
            ("regular_font_path", &self.regular_font_path),
            ("bold_font_path", &self.bold_font_path),
        ];
        for (name, value) in paths {
            if value.trim().is_empty() {
                return Err(ReportError::Config(format!("{name} must not be empty")));
            }
        }
        if self.overflow_threshold == 0 {
            return Err(ReportError::Config("overflow_threshold must be at least 1".to_string()));
        }
        self.comments.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSummary {
    pub form_pages: usize,
    pub comments_pages: usize,
    pub photo_pages: usize,
    pub overflow_fields: Vec<String>,
    pub photos_rendered: usize,
    pub photos_skipped: Vec<PhotoFetchError>,
    pub total_bytes: usize,
}

impl ReportSummary {
    pub fn total_pages(&self) -> usize {
        self.form_pages + self.comments_pages + self.photo_pages
    }
}

// Photos that cannot be fetched are left blank and listed in the summary. Every other
// failure aborts the run.
pub struct ReportGenerator {
    config: ReportConfig,
    mapper: FieldMapper,
    cache: Arc<TemplateCache>,
    fetcher: Arc<dyn Fetcher>,
    storage: Arc<dyn StorageResolver>,
    clock: Clock,
}

impl ReportGenerator {
    pub fn builder() -> ReportGeneratorBuilder {
        ReportGeneratorBuilder::new()
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    pub fn template_cache(&self) -> &Arc<TemplateCache> {
        &self.cache
    }

    pub fn print_date(&self) -> String {
        (self.clock)().format(PRINT_DATE_FORMAT).to_string()
    }

    pub fn render_values(
        &self,
        record: &InspectionRecord,
        signature: Option<&str>,
    ) -> (RenderValueMap, OverflowReport) {
        let (mut values, overflow) = self.mapper.map(record);
        match signature.map(str::trim).filter(|data| !data.is_empty()) {
            Some(data) => values.insert(SIGNATURE_FIELD, data),
            None => {
                values.remove(SIGNATURE_FIELD);
            }
        }
        values.insert(SIGNATURE_DATE_FIELD, self.print_date());
        (values, overflow)
    }

    pub async fn generate(
        &self,
        record: &InspectionRecord,
        signature: Option<&str>,
        media: Option<&[MediaItem]>,
    ) -> Result<Vec<u8>, ReportError> {
        let (bytes, _) = self.generate_with_summary(record, signature, media).await?;
        Ok(bytes)
    }

    pub async fn generate_with_summary(
        &self,
        record: &InspectionRecord,
        signature: Option<&str>,
        media: Option<&[MediaItem]>,
    ) -> Result<(Vec<u8>, ReportSummary), ReportError> {
        let started = Instant::now();
        let assets = self
            .cache
            .get_or_load(self.fetcher.as_ref(), &self.config)
            .await?;
        let fonts = &assets.registry;

        let (values, overflow) = self.render_values(record, signature);
        tracing::debug!(
            values = values.len(),
            overflow = overflow.len(),
            signed = values.contains_key(SIGNATURE_FIELD),
            "record mapped"
        );

        let form = render_form(&assets.base_document, fonts, &values)?;
        tracing::info!(
            pages = form.page_count,
            fields = form.fields_drawn,
            bytes = form.bytes.len(),
            "form rendered"
        );

        let comments = build_comments_page(&overflow.entries, fonts, &self.config.comments)?;
        let photos = match media {
            Some(items) => {
                build_photo_pages(
                    items,
                    self.storage.as_ref(),
                    self.fetcher.as_ref(),
                    fonts,
                    &self.config.photo_header_first_page,
                )
                .await?
            }
            None => None,
        };

        let bytes = merge_documents(
            &form.bytes,
            comments.as_ref().map(|page| page.bytes.as_slice()),
            photos.as_ref().map(|appendix| appendix.bytes.as_slice()),
        )?;

        let (photo_pages, photos_rendered, photos_skipped) = match photos {
            Some(appendix) => (appendix.pages, appendix.rendered, appendix.skipped),
            None => (0, 0, Vec::new()),
        };
        let summary = ReportSummary {
            form_pages: form.page_count,
            comments_pages: usize::from(comments.is_some()),
            photo_pages,
            overflow_fields: overflow
                .entries
                .iter()
                .map(|entry| entry.field_id.clone())
                .collect(),
            photos_rendered,
            photos_skipped,
            total_bytes: bytes.len(),
        };
        tracing::info!(
            pages = summary.total_pages(),
            comments_pages = summary.comments_pages,
            photo_pages = summary.photo_pages,
            photos_skipped = summary.photos_skipped.len(),
            bytes = summary.total_bytes,
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "report generated"
        );
        Ok((bytes, summary))
    }
}

pub struct ReportGeneratorBuilder {
    config: ReportConfig,
    cache: Option<Arc<TemplateCache>>,
    fetcher: Option<Arc<dyn Fetcher>>,
    storage: Option<Arc<dyn StorageResolver>>,
    clock: Option<Clock>,
}

impl Default for ReportGeneratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportGeneratorBuilder {
    pub fn new() -> Self {
        Self {
            config: ReportConfig::default(),
            cache: None,
            fetcher: None,
            storage: None,
            clock: None,
        }
    }

    pub fn config(mut self, config: ReportConfig) -> Self {
        self.config = config;
        self
    }

    pub fn template_paths(
        mut self,
        base_document: impl Into<String>,
        regular_font: impl Into<String>,
        bold_font: impl Into<String>,
    ) -> Self {
        self.config.base_document_path = base_document.into();
        self.config.regular_font_path = regular_font.into();
        self.config.bold_font_path = bold_font.into();
        self
    }

    pub fn overflow_threshold(mut self, threshold: usize) -> Self {
        self.config.overflow_threshold = threshold;
        self
    }

    pub fn comment_layout(mut self, layout: CommentLayout) -> Self {
        self.config.comments = layout;
        self
    }

    pub fn photo_header_first_page(mut self, header: impl Into<String>) -> Self {
        self.config.photo_header_first_page = header.into();
        self
    }

    pub fn template_cache(mut self, cache: Arc<TemplateCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn storage_resolver(mut self, storage: Arc<dyn StorageResolver>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn clock(mut self, clock: impl Fn() -> NaiveDate + Send + Sync + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn build(self) -> Result<ReportGenerator, ReportError> {
        self.config.validate()?;
        let fetcher = match self.fetcher {
            Some(fetcher) => fetcher,
            None => default_fetcher()?,
        };
        let Some(storage) = self.storage else {
            return Err(ReportError::Config("no storage resolver configured".to_string()));
        };
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(|| chrono::Local::now().date_naive()));
        Ok(ReportGenerator {
            mapper: FieldMapper::new(self.config.overflow_threshold),
            config: self.config,
            cache: self.cache.unwrap_or_default(),
            fetcher,
            storage,
            clock,
        })
    }
}

#[cfg(feature = "http")]
fn default_fetcher() -> Result<Arc<dyn Fetcher>, ReportError> {
    Ok(Arc::new(HttpFetcher::new()))
}

#[cfg(not(feature = "http"))]
fn default_fetcher() -> Result<Arc<dyn Fetcher>, ReportError> {
    Err(ReportError::Config(
        "no fetcher configured and the http feature is disabled".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::testing::MemoryFetcher;
    use crate::form::testing::blank_form_pdf;
    use crate::pdf::testing::png_data_uri;
    use crate::photos::testing::{PHOTO_HOST, PhotoFetcher, storage};
    use async_trait::async_trait;

    // Template assets from memory, photos from the photo host.
    struct Backend {
        templates: MemoryFetcher,
        photos: PhotoFetcher,
    }

    #[async_trait]
    impl Fetcher for Backend {
        async fn fetch(&self, locator: &str) -> Result<FetchResponse, FetchTransportError> {
            if locator.starts_with(PHOTO_HOST) {
                self.photos.fetch(locator).await
            } else {
                self.templates.fetch(locator).await
            }
        }
    }

    fn backend(failing_photos: &[&str]) -> Arc<Backend> {
        Arc::new(Backend {
            templates: MemoryFetcher::default()
                .with(DEFAULT_BASE_DOCUMENT_PATH, blank_form_pdf(PAGE_COUNT))
                .with(DEFAULT_REGULAR_FONT_PATH, b"not a font".to_vec())
                .with(DEFAULT_BOLD_FONT_PATH, b"not a font".to_vec()),
            photos: PhotoFetcher::failing(failing_photos),
        })
    }

    fn generator_with(backend: Arc<Backend>, builder: ReportGeneratorBuilder) -> ReportGenerator {
        builder
            .fetcher(backend)
            .storage_resolver(Arc::new(storage()))
            .clock(|| NaiveDate::from_ymd_opt(2026, 3, 4).expect("date"))
            .build()
            .expect("build generator")
    }

    fn generator(backend: Arc<Backend>) -> ReportGenerator {
        generator_with(backend, ReportGenerator::builder())
    }

    fn tank_photos(count: usize) -> Vec<MediaItem> {
        (0..count)
            .map(|index| {
                MediaItem::photo(format!("p{index}"), format!("inspections/9/p{index}.jpg"))
                    .with_section("Septic Tank")
                    .with_sort_order(index as i64)
            })
            .collect()
    }

    #[tokio::test]
    async fn long_septic_tank_comment_adds_one_comments_page() {
        let mut record = InspectionRecord::default();
        record.septic_tank.comments = Some("word ".repeat(70));
        assert_eq!(
            record.septic_tank.comments.as_deref().map(str::len),
            Some(350)
        );

        let generator = generator(backend(&[]));
        let (values, _) = generator.render_values(&record, None);
        assert_eq!(values.get("septic_tank_comments"), Some(SEE_COMMENTS));

        let (bytes, summary) = generator
            .generate_with_summary(&record, None, None)
            .await
            .expect("generate");
        assert_eq!(summary.form_pages, PAGE_COUNT);
        assert_eq!(summary.comments_pages, 1);
        assert_eq!(summary.photo_pages, 0);
        assert_eq!(
            summary.overflow_fields,
            vec!["septic_tank_comments".to_string()]
        );
        assert_eq!(
            inspect_document(&bytes).expect("inspect").page_count,
            PAGE_COUNT + 1
        );
        assert_eq!(summary.total_bytes, bytes.len());
    }

    #[tokio::test]
    async fn three_photos_in_one_section_add_two_pages() {
        let record = InspectionRecord::default();
        let items = tank_photos(3);
        let (bytes, summary) = generator(backend(&[]))
            .generate_with_summary(&record, None, Some(&items))
            .await
            .expect("generate");
        assert_eq!(summary.comments_pages, 0);
        assert_eq!(summary.photo_pages, 2);
        assert_eq!(summary.photos_rendered, 3);
        assert!(summary.photos_skipped.is_empty());
        assert_eq!(
            inspect_document(&bytes).expect("inspect").page_count,
            PAGE_COUNT + 2
        );
    }

    #[tokio::test]
    async fn missing_signature_is_left_out_of_the_value_map() {
        let record = InspectionRecord::default();
        let generator = generator(backend(&[]));
        let (values, _) = generator.render_values(&record, None);
        assert!(!values.contains_key(SIGNATURE_FIELD));
        let (blank, _) = generator.render_values(&record, Some("  "));
        assert!(!blank.contains_key(SIGNATURE_FIELD));

        let bytes = generator
            .generate(&record, None, None)
            .await
            .expect("generate");
        assert_eq!(
            inspect_document(&bytes).expect("inspect").page_count,
            PAGE_COUNT
        );

        let signature = png_data_uri(24, 8);
        let (signed, _) = generator.render_values(&record, Some(&signature));
        assert_eq!(signed.get(SIGNATURE_FIELD), Some(signature.as_str()));
        generator
            .generate(&record, Some(&signature), None)
            .await
            .expect("generate signed");
    }

    #[tokio::test]
    async fn one_failed_photo_still_generates_the_appendix() {
        let record = InspectionRecord::default();
        let items = tank_photos(3);
        let (bytes, summary) = generator(backend(&["inspections/9/p1.jpg"]))
            .generate_with_summary(&record, None, Some(&items))
            .await
            .expect("generate");
        assert_eq!(summary.photo_pages, 2);
        assert_eq!(summary.photos_rendered, 2);
        assert_eq!(summary.photos_skipped.len(), 1);
        assert_eq!(summary.photos_skipped[0].media_id, "p1");
        assert_eq!(
            inspect_document(&bytes).expect("inspect").page_count,
            PAGE_COUNT + 2
        );
    }

    #[test]
    fn inspector_initials_reach_every_page() {
        let mut record = InspectionRecord::default();
        record.facility_info.inspector_name = Some("Dan R Smith".to_string());
        let (values, _) = generator(backend(&[])).render_values(&record, None);
        for page in 1..PAGE_COUNT {
            assert_eq!(values.get(&format!("page{page}_initials")), Some("DRS"));
        }
    }

    #[test]
    fn print_date_overwrites_recorded_signature_date() {
        let mut record = InspectionRecord::default();
        record.facility_info.signature_date = Some("01/01/1999".to_string());
        let (values, _) = generator(backend(&[])).render_values(&record, None);
        assert_eq!(values.get(SIGNATURE_DATE_FIELD), Some("03/04/2026"));
    }

    #[tokio::test]
    async fn template_assets_are_fetched_once() {
        let backend = backend(&[]);
        let generator = generator(Arc::clone(&backend));
        let record = InspectionRecord::default();
        generator
            .generate(&record, None, None)
            .await
            .expect("first");
        generator
            .generate(&record, None, Some(&[]))
            .await
            .expect("second");
        assert_eq!(backend.templates.call_count(), 3);
        assert!(generator.template_cache().is_loaded().await);
    }

    #[tokio::test]
    async fn missing_font_fails_generation_and_caches_nothing() {
        let backend = Arc::new(Backend {
            templates: MemoryFetcher::default()
                .with(DEFAULT_BASE_DOCUMENT_PATH, blank_form_pdf(PAGE_COUNT))
                .with(DEFAULT_REGULAR_FONT_PATH, b"not a font".to_vec()),
            photos: PhotoFetcher::default(),
        });
        let generator = generator(backend);
        let err = generator
            .generate(&InspectionRecord::default(), None, None)
            .await
            .expect_err("bold font missing");
        match err {
            ReportError::TemplateLoad {
                resource, status, ..
            } => {
                assert_eq!(resource, DEFAULT_BOLD_FONT_PATH);
                assert_eq!(status, Some(404));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!generator.template_cache().is_loaded().await);
    }

    #[tokio::test]
    async fn raised_threshold_keeps_comments_inline() {
        let mut record = InspectionRecord::default();
        record.septic_tank.comments = Some("word ".repeat(70));
        let generator = generator_with(
            backend(&[]),
            ReportGenerator::builder().overflow_threshold(400),
        );
        let (_, summary) = generator
            .generate_with_summary(&record, None, None)
            .await
            .expect("generate");
        assert_eq!(summary.comments_pages, 0);
        assert!(summary.overflow_fields.is_empty());
    }

    #[tokio::test]
    async fn malformed_signature_aborts_generation() {
        let err = generator(backend(&[]))
            .generate(
                &InspectionRecord::default(),
                Some("data:image/png;base64,AAAA"),
                None,
            )
            .await
            .expect_err("bad signature");
        assert!(matches!(err, ReportError::Render { .. }));
    }

    #[test]
    fn config_json_overrides_only_supplied_keys() {
        let config = ReportConfig::from_json(
            r#"{"overflow_threshold": 250, "comments": {"max_height_mm": 60.0}}"#,
        )
        .expect("config");
        assert_eq!(config.overflow_threshold, 250);
        assert_eq!(config.comments.max_height_mm, 60.0);
        assert_eq!(config.comments.base_height_mm, COMMENT_BLOCK_BASE_MM);
        assert_eq!(config.base_document_path, DEFAULT_BASE_DOCUMENT_PATH);
        assert_eq!(config.photo_header_first_page, PHOTO_HEADER_FIRST_PAGE);
    }

    #[test]
    fn invalid_config_is_rejected() {
        assert!(matches!(
            ReportConfig::from_json(r#"{"overflow_threshold": 0}"#),
            Err(ReportError::Config(_))
        ));
        assert!(ReportConfig::from_json("{not json").is_err());
        let built = ReportGenerator::builder()
            .template_paths("", DEFAULT_REGULAR_FONT_PATH, DEFAULT_BOLD_FONT_PATH)
            .fetcher(backend(&[]))
            .storage_resolver(Arc::new(storage()))
            .build();
        assert!(matches!(built, Err(ReportError::Config(_))));
    }

    #[test]
    fn builder_requires_a_storage_resolver() {
        let built = ReportGenerator::builder().fetcher(backend(&[])).build();
        match built {
            Err(ReportError::Config(message)) => assert!(message.contains("storage resolver")),
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(_) => panic!("built without a storage resolver"),
        }
    }

    #[tokio::test]
    async fn font_registry_is_built_once_with_the_cached_assets() {
        let generator = generator(backend(&[]));
        let record = InspectionRecord::default();
        generator
            .generate(&record, None, None)
            .await
            .expect("first");
        let config = generator.config().clone();
        let fetcher = backend(&[]);
        let first = generator
            .template_cache()
            .get_or_load(fetcher.as_ref(), &config)
            .await
            .expect("cached");
        generator
            .generate(&record, None, None)
            .await
            .expect("second");
        let second = generator
            .template_cache()
            .get_or_load(fetcher.as_ref(), &config)
            .await
            .expect("cached");
        assert!(Arc::ptr_eq(&first, &second));
        assert!(std::ptr::eq(&first.registry, &second.registry));
        assert_eq!(fetcher.templates.call_count(), 0);
    }
}
