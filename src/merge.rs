use crate::error::ReportError;
use crate::pdf::inherited_page_attribute;
use lopdf::{Document as LoDocument, Object as LoObject, ObjectId as LoObjectId, dictionary};

const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentInfo {
    pub version: String,
    pub page_count: usize,
    pub encrypted: bool,
    pub byte_len: usize,
}

pub fn inspect_document(bytes: &[u8]) -> Result<DocumentInfo, ReportError> {
    let doc = LoDocument::load_mem(bytes)
        .map_err(|err| ReportError::Merge(format!("document does not parse: {err}")))?;
    Ok(DocumentInfo {
        version: doc.version.clone(),
        page_count: doc.get_pages().len(),
        encrypted: doc.is_encrypted(),
        byte_len: bytes.len(),
    })
}

fn load_part(label: &str, bytes: &[u8]) -> Result<LoDocument, ReportError> {
    let doc = LoDocument::load_mem(bytes)
        .map_err(|err| ReportError::Merge(format!("{label} document does not parse: {err}")))?;
    if doc.is_encrypted() {
        return Err(ReportError::Merge(format!("{label} document is encrypted")));
    }
    if doc.get_pages().is_empty() {
        return Err(ReportError::Merge(format!("{label} document has no pages")));
    }
    Ok(doc)
}

fn import_pages(
    dst: &mut LoDocument,
    mut src: LoDocument,
) -> Result<Vec<LoObjectId>, ReportError> {
    src.renumber_objects_with(dst.max_id + 1);
    let page_ids: Vec<LoObjectId> = src.get_pages().values().copied().collect();
    let mut inherited = Vec::with_capacity(page_ids.len());
    for page_id in &page_ids {
        let attrs: Vec<(&[u8], LoObject)> = INHERITABLE
            .iter()
            .filter_map(|key| {
                inherited_page_attribute(&src, *page_id, key).map(|value| (*key, value))
            })
            .collect();
        inherited.push(attrs);
    }
    if src.max_id > dst.max_id {
        dst.max_id = src.max_id;
    }
    dst.objects.extend(src.objects);

    for (page_id, attrs) in page_ids.iter().zip(inherited) {
        let page = dst
            .get_object_mut(*page_id)
            .and_then(LoObject::as_dict_mut)
            .map_err(|err| {
                ReportError::Merge(format!("page {page_id:?} is not a dictionary: {err}"))
            })?;
        for (key, value) in attrs {
            page.set(key, value);
        }
    }
    Ok(page_ids)
}

// A form-only merge returns the form bytes untouched after validation.
pub fn merge_documents(
    form: &[u8],
    comments: Option<&[u8]>,
    photos: Option<&[u8]>,
) -> Result<Vec<u8>, ReportError> {
    if comments.is_none() && photos.is_none() {
        load_part("form", form)?;
        return Ok(form.to_vec());
    }

    let parts = [
        ("form", Some(form)),
        ("comments", comments),
        ("photos", photos),
    ];
    let mut merged = LoDocument::with_version("1.7");
    let pages_id = merged.new_object_id();
    let mut kids: Vec<LoObject> = Vec::new();

    for (label, bytes) in parts {
        let Some(bytes) = bytes else {
            continue;
        };
        let src = load_part(label, bytes)?;
        let page_ids = import_pages(&mut merged, src)?;
        tracing::debug!(part = label, pages = page_ids.len(), "merge part imported");
        for page_id in page_ids {
            let page = merged
                .get_object_mut(page_id)
                .and_then(LoObject::as_dict_mut)
                .map_err(|err| ReportError::Merge(format!("{label} page lookup failed: {err}")))?;
            page.set("Parent", pages_id);
            kids.push(LoObject::Reference(page_id));
        }
    }

    let page_count = kids.len();
    merged.objects.insert(
        pages_id,
        LoObject::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
        }),
    );
    let catalog_id = merged.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    merged.trailer.set("Root", catalog_id);
    merged.prune_objects();
    merged.renumber_objects();
    merged.compress();
    let mut bytes = Vec::new();
    merged
        .save_to(&mut bytes)
        .map_err(|err| ReportError::Merge(format!("merged document write failed: {err}")))?;
    tracing::info!(pages = page_count, bytes = bytes.len(), "documents merged");
    Ok(bytes)
}
