use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: String,
    pub kind: MediaKind,
    pub storage_path: String,
    #[serde(default)]
    pub section_label: Option<String>,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl MediaItem {
    pub fn photo(id: impl Into<String>, storage_path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: MediaKind::Photo,
            storage_path: storage_path.into(),
            section_label: None,
            sort_order: 0,
            created_at: None,
        }
    }

    pub fn with_section(mut self, label: impl Into<String>) -> Self {
        self.section_label = Some(label.into());
        self
    }

    pub fn with_sort_order(mut self, sort_order: i64) -> Self {
        self.sort_order = sort_order;
        self
    }

    pub fn is_photo(&self) -> bool {
        self.kind == MediaKind::Photo
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Section {
    FacilityInfo,
    GeneralTreatment,
    DesignFlow,
    SepticTank,
    DisposalWorks,
    Other,
}

impl Section {
    pub const ALL: [Section; 6] = [
        Section::FacilityInfo,
        Section::GeneralTreatment,
        Section::DesignFlow,
        Section::SepticTank,
        Section::DisposalWorks,
        Section::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Section::FacilityInfo => "Facility Info",
            Section::GeneralTreatment => "General Treatment",
            Section::DesignFlow => "Design Flow",
            Section::SepticTank => "Septic Tank",
            Section::DisposalWorks => "Disposal Works",
            Section::Other => "Other",
        }
    }

    // Display label or step key, snake or camel case. Unknown values land in `Other`.
    pub fn from_label(raw: Option<&str>) -> Section {
        let Some(raw) = raw else {
            return Section::Other;
        };
        let key: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "facilityinfo" => Section::FacilityInfo,
            "generaltreatment" => Section::GeneralTreatment,
            "designflow" => Section::DesignFlow,
            "septictank" => Section::SepticTank,
            "disposalworks" => Section::DisposalWorks,
            _ => Section::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhotoGroup {
    pub section: Section,
    pub items: Vec<MediaItem>,
}

impl PhotoGroup {
    pub fn label(&self) -> &'static str {
        self.section.label()
    }
}

fn media_order(a: &MediaItem, b: &MediaItem) -> Ordering {
    a.sort_order
        .cmp(&b.sort_order)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

pub fn group_photos(items: &[MediaItem]) -> Vec<PhotoGroup> {
    let mut groups: Vec<PhotoGroup> = Section::ALL
        .iter()
        .map(|section| PhotoGroup {
            section: *section,
            items: Vec::new(),
        })
        .collect();
    for item in items.iter().filter(|item| item.is_photo()) {
        let section = Section::from_label(item.section_label.as_deref());
        if let Some(group) = groups.iter_mut().find(|g| g.section == section) {
            group.items.push(item.clone());
        }
    }
    groups.retain(|group| !group.items.is_empty());
    for group in &mut groups {
        group.items.sort_by(media_order);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn section_labels_match_loosely() {
        assert_eq!(
            Section::from_label(Some("Septic Tank")),
            Section::SepticTank
        );
        assert_eq!(
            Section::from_label(Some("septic_tank")),
            Section::SepticTank
        );
        assert_eq!(Section::from_label(Some("septicTank")), Section::SepticTank);
        assert_eq!(
            Section::from_label(Some("DISPOSAL WORKS")),
            Section::DisposalWorks
        );
        assert_eq!(Section::from_label(Some("Driveway")), Section::Other);
        assert_eq!(Section::from_label(None), Section::Other);
    }

    #[test]
    fn groups_follow_canonical_order_with_other_last() {
        let items = vec![
            MediaItem::photo("a", "p/a.jpg"),
            MediaItem::photo("b", "p/b.jpg").with_section("Disposal Works"),
            MediaItem::photo("c", "p/c.jpg").with_section("facility_info"),
            MediaItem::photo("d", "p/d.jpg").with_section("Garage"),
        ];
        let groups = group_photos(&items);
        let sections: Vec<Section> = groups.iter().map(|g| g.section).collect();
        assert_eq!(
            sections,
            vec![
                Section::FacilityInfo,
                Section::DisposalWorks,
                Section::Other,
            ]
        );
        let other: Vec<&str> = groups[2].items.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(other, vec!["a", "d"]);
    }

    #[test]
    fn videos_are_excluded() {
        let mut video = MediaItem::photo("v", "p/v.mp4").with_section("Septic Tank");
        video.kind = MediaKind::Video;
        assert!(group_photos(&[video]).is_empty());
    }

    #[test]
    fn items_sort_by_order_then_creation_then_id() {
        let early = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).single();
        let late = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).single();
        let mut first = MediaItem::photo("z", "p/z.jpg").with_section("Septic Tank");
        first.created_at = early;
        let mut second = MediaItem::photo("a", "p/a.jpg").with_section("Septic Tank");
        second.created_at = late;
        let third = MediaItem::photo("y", "p/y.jpg")
            .with_section("Septic Tank")
            .with_sort_order(1);
        let groups = group_photos(&[third, second, first]);
        let ids: Vec<&str> = groups[0].items.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["z", "a", "y"]);
    }

    #[test]
    fn media_item_parses_from_json() {
        let item: MediaItem = serde_json::from_str(
            r#"{ "id": "m1", "kind": "photo", "storagePath": "inspections/1/m1.jpg",
                 "sectionLabel": "Design Flow", "createdAt": "2024-05-01T09:00:00Z" }"#,
        )
        .expect("media item");
        assert!(item.is_photo());
        assert_eq!(item.sort_order, 0);
        assert!(item.created_at.is_some());
    }
}
