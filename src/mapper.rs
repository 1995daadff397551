use crate::layout::{self, SIGNATURE_DATE_FIELD};
use crate::record::{
    ChoiceField, DesignFlow, DisposalWorks, FacilityInfo, GeneralTreatment, InspectionRecord,
    SepticTank, TankRecord,
};
use std::collections::BTreeMap;

pub const CHECK_MARK: &str = "X";
pub const SEE_COMMENTS: &str = "See Comments";
pub const OVERFLOW_THRESHOLD: usize = 200;

pub const DESIGN_FLOW_COMMENTS_LABEL: &str = "Design Flow Comments";
pub const SEPTIC_TANK_COMMENTS_LABEL: &str = "Septic Tank Comments";
pub const DISPOSAL_WORKS_COMMENTS_LABEL: &str = "Disposal Works Comments";

const INITIALS_FIELDS: [&str; 5] = [
    "page1_initials",
    "page2_initials",
    "page3_initials",
    "page4_initials",
    "page5_initials",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderValueMap {
    values: BTreeMap<String, String>,
}

impl RenderValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, value: impl Into<String>) {
        self.values.insert(id.into(), value.into());
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.values.get(id).map(String::as_str)
    }

    pub fn remove(&mut self, id: &str) -> Option<String> {
        self.values.remove(id)
    }

    pub fn contains_key(&self, id: &str) -> bool {
        self.values.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverflowEntry {
    pub section_label: String,
    pub field_id: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverflowReport {
    pub entries: Vec<OverflowEntry>,
}

impl OverflowReport {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains_field(&self, field_id: &str) -> bool {
        self.entries.iter().any(|entry| entry.field_id == field_id)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldMapper {
    overflow_threshold: usize,
}

impl Default for FieldMapper {
    fn default() -> Self {
        Self::new(OVERFLOW_THRESHOLD)
    }
}

impl FieldMapper {
    pub fn new(overflow_threshold: usize) -> Self {
        Self { overflow_threshold }
    }

    pub fn overflow_threshold(&self) -> usize {
        self.overflow_threshold
    }

    pub fn map(&self, record: &InspectionRecord) -> (RenderValueMap, OverflowReport) {
        let mut out = MapState {
            values: RenderValueMap::new(),
            overflow: OverflowReport::default(),
            threshold: self.overflow_threshold,
        };
        map_facility_info(&mut out, &record.facility_info);
        map_general_treatment(&mut out, &record.general_treatment);
        map_design_flow(&mut out, &record.design_flow);
        map_septic_tank(&mut out, &record.septic_tank);
        map_disposal_works(&mut out, &record.disposal_works);
        map_summaries(&mut out, record);

        // Declared fields the record has nothing for still need an entry.
        for id in layout::value_field_ids() {
            if !out.values.contains_key(id) {
                out.values.insert(id, "");
            }
        }
        (out.values, out.overflow)
    }
}

pub fn map_record(record: &InspectionRecord) -> (RenderValueMap, OverflowReport) {
    FieldMapper::default().map(record)
}

pub fn inspector_initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|token| token.chars().next())
        .flat_map(char::to_uppercase)
        .collect()
}

struct MapState {
    values: RenderValueMap,
    overflow: OverflowReport,
    threshold: usize,
}

impl MapState {
    fn text(&mut self, id: &str, value: &Option<String>) {
        self.values.insert(id, value.as_deref().unwrap_or(""));
    }

    fn flag(&mut self, id: &str, value: Option<bool>) {
        let mark = if value.unwrap_or(false) { CHECK_MARK } else { "" };
        self.values.insert(id, mark);
    }

    fn choice<T: ChoiceField>(&mut self, prefix: &str, value: Option<T>) {
        for (choice, suffix, _) in T::CHOICES {
            let selected = value.as_ref() == Some(choice);
            self.values.insert(
                format!("{prefix}_{suffix}"),
                if selected { CHECK_MARK } else { "" },
            );
        }
    }

    fn comment(&mut self, id: &str, section_label: &str, value: &Option<String>) {
        let text = value.as_deref().unwrap_or("");
        if text.chars().count() > self.threshold {
            self.values.insert(id, SEE_COMMENTS);
            self.overflow.entries.push(OverflowEntry {
                section_label: section_label.to_string(),
                field_id: id.to_string(),
                text: text.to_string(),
            });
        } else {
            self.values.insert(id, text);
        }
    }
}

fn map_facility_info(out: &mut MapState, info: &FacilityInfo) {
    out.text("inspector_name", &info.inspector_name);
    out.text("inspector_certification", &info.inspector_certification);
    out.text("inspector_company", &info.inspector_company);
    out.text("inspector_phone", &info.inspector_phone);
    out.text("inspector_email", &info.inspector_email);
    out.text("inspection_date", &info.inspection_date);
    out.text("owner_name", &info.owner_name);
    out.text("owner_phone", &info.owner_phone);
    out.text("facility_address", &info.facility_address);
    out.text("facility_city", &info.facility_city);
    out.text("facility_county", &info.facility_county);
    out.text("facility_zip", &info.facility_zip);
    out.text("tax_parcel_number", &info.tax_parcel_number);
    out.text("permit_number", &info.permit_number);
    out.choice("facility_type", info.facility_type);
    out.text("facility_type_other_text", &info.facility_type_other);
    out.choice("water_source", info.water_source);
    out.flag("well_within_100_feet", info.well_within_100_feet);
    out.choice("records_available", info.records_available);
    out.text("records_description", &info.records_description);

    out.text("certification_inspector_name", &info.inspector_name);
    out.text("certification_number", &info.inspector_certification);
    out.text("certification_company", &info.inspector_company);
    out.text("certification_phone", &info.inspector_phone);
    out.text("certification_email", &info.inspector_email);
    out.text(SIGNATURE_DATE_FIELD, &info.signature_date);

    let initials = inspector_initials(info.inspector_name.as_deref().unwrap_or(""));
    for id in INITIALS_FIELDS {
        out.values.insert(id, initials.as_str());
    }
}

fn map_general_treatment(out: &mut MapState, treatment: &GeneralTreatment) {
    out.choice("system_type", treatment.system_type);
    out.text(
        "alternative_system_description",
        &treatment.alternative_system_description,
    );
    out.text("system_age_years", &treatment.system_age_years);
    out.choice("treatment_performance", treatment.performance);
    out.flag("treatment_surfacing_effluent", treatment.surfacing_effluent);
    out.flag("treatment_odor_present", treatment.odor_present);
    out.flag("treatment_physical_damage", treatment.physical_damage);
    out.choice("repairs_recommended", treatment.repairs_recommended);
    out.text("repair_description", &treatment.repair_description);
}

fn map_design_flow(out: &mut MapState, flow: &DesignFlow) {
    out.text("design_bedrooms", &flow.bedrooms);
    out.text("design_fixture_units", &flow.fixture_units);
    out.text("design_flow_gpd", &flow.design_flow_gpd);
    out.choice("flow_basis", flow.flow_basis);
    out.choice("occupancy_exceeds_design", flow.occupancy_exceeds_design);
    out.flag("water_softener_backwash", flow.water_softener_backwash);
    out.comment(
        "design_flow_comments",
        DESIGN_FLOW_COMMENTS_LABEL,
        &flow.comments,
    );
}

fn map_septic_tank(out: &mut MapState, septic: &SepticTank) {
    out.text("number_of_tanks", &septic.number_of_tanks);
    // The form has a single tank block; later tanks are not placed on the pages.
    let empty = TankRecord::default();
    let tank = septic.tank(0).unwrap_or(&empty);
    map_tank(out, "tank1", tank);
    out.flag("tank_pumped", septic.pumped_during_inspection);
    out.text("gallons_pumped", &septic.gallons_pumped);
    out.text("pumper_company", &septic.pumper_company);
    out.text("pumper_license", &septic.pumper_license);
    out.comment(
        "septic_tank_comments",
        SEPTIC_TANK_COMMENTS_LABEL,
        &septic.comments,
    );
}

fn map_tank(out: &mut MapState, prefix: &str, tank: &TankRecord) {
    out.choice(&format!("{prefix}_material"), tank.material);
    out.text(
        &format!("{prefix}_capacity_gallons"),
        &tank.capacity_gallons,
    );
    out.text(&format!("{prefix}_compartments"), &tank.compartments);
    out.text(&format!("{prefix}_depth_to_lid"), &tank.depth_to_lid_inches);
    out.choice(&format!("{prefix}_inlet_baffle"), tank.inlet_baffle);
    out.choice(&format!("{prefix}_outlet_baffle"), tank.outlet_baffle);
    out.flag(
        &format!("{prefix}_effluent_filter"),
        tank.effluent_filter_present,
    );
    out.flag(&format!("{prefix}_risers"), tank.risers_present);
    out.flag(&format!("{prefix}_lids_secure"), tank.lids_secure);
    out.text(&format!("{prefix}_sludge_depth"), &tank.sludge_depth_inches);
    out.text(&format!("{prefix}_scum_depth"), &tank.scum_depth_inches);
    out.choice(&format!("{prefix}_liquid_level"), tank.liquid_level);
    out.choice(&format!("{prefix}_structural"), tank.structural_condition);
}

fn map_disposal_works(out: &mut MapState, disposal: &DisposalWorks) {
    out.choice("disposal_type", disposal.disposal_type);
    out.text("disposal_type_other_text", &disposal.disposal_type_other);
    out.choice("distribution_method", disposal.distribution_method);
    out.choice(
        "distribution_box_condition",
        disposal.distribution_box_condition,
    );
    out.choice("disposal_performance", disposal.performance);
    out.flag("disposal_surfacing_effluent", disposal.surfacing_effluent);
    out.flag("disposal_saturated_soil", disposal.saturated_soil);
    out.flag("disposal_hydraulic_load_test", disposal.hydraulic_load_test);
    out.choice("reserve_area_available", disposal.reserve_area_available);
    out.flag("disposal_setback_concerns", disposal.setback_concerns);
    out.comment(
        "disposal_works_comments",
        DISPOSAL_WORKS_COMMENTS_LABEL,
        &disposal.comments,
    );
}

fn choice_label<T: ChoiceField>(value: Option<T>) -> String {
    value
        .and_then(|v| v.label())
        .unwrap_or_default()
        .to_string()
}

fn map_summaries(out: &mut MapState, record: &InspectionRecord) {
    let info = &record.facility_info;
    let parcel = info.tax_parcel_number.clone();
    let inspection_date = info.inspection_date.clone();
    let full_address = [
        info.facility_address.as_deref(),
        info.facility_city.as_deref(),
        info.facility_zip.as_deref(),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join(", ");

    out.values.insert("facility_summary_address", full_address.as_str());
    out.text("facility_summary_parcel", &parcel);
    out.text("facility_summary_county", &info.facility_county);
    out.text("facility_summary_inspection_date", &inspection_date);
    out.text("facility_summary_inspector", &info.inspector_name);
    out.text("facility_summary_company", &info.inspector_company);

    let flow = &record.design_flow;
    let treatment = &record.general_treatment;
    out.text("design_summary_bedrooms", &flow.bedrooms);
    out.text("design_summary_fixture_units", &flow.fixture_units);
    out.text("design_summary_flow_gpd", &flow.design_flow_gpd);
    out.text("design_summary_system_age", &treatment.system_age_years);
    out.values.insert(
        "design_summary_treatment",
        choice_label(treatment.performance),
    );
    out.values.insert(
        "design_summary_system_type",
        choice_label(treatment.system_type),
    );
    out.text("design_summary_parcel", &parcel);

    let septic = &record.septic_tank;
    let empty = TankRecord::default();
    let tank = septic.tank(0).unwrap_or(&empty);
    out.text("tank_summary_count", &septic.number_of_tanks);
    out.text("tank_summary_capacity", &tank.capacity_gallons);
    out.text("tank_summary_compartments", &tank.compartments);
    out.text("tank_summary_sludge", &tank.sludge_depth_inches);
    out.text("tank_summary_scum", &tank.scum_depth_inches);
    out.text("tank_summary_pumped_gallons", &septic.gallons_pumped);
    out.text("tank_summary_pumper", &septic.pumper_company);
    out.text("tank_summary_parcel", &parcel);
    out.text("tank_summary_inspection_date", &inspection_date);

    let disposal = &record.disposal_works;
    out.values.insert(
        "disposal_summary_type",
        choice_label(disposal.disposal_type),
    );
    out.values.insert(
        "disposal_summary_distribution",
        choice_label(disposal.distribution_method),
    );
    out.values.insert(
        "disposal_summary_performance",
        choice_label(disposal.performance),
    );
    out.values.insert(
        "disposal_summary_reserve_area",
        choice_label(disposal.reserve_area_available),
    );
    out.text("disposal_summary_parcel", &parcel);
    out.text("disposal_summary_inspection_date", &inspection_date);

    out.values.insert(
        "certification_facility_address",
        full_address.as_str(),
    );
    out.text("certification_parcel", &parcel);
    out.text("certification_inspection_date", &inspection_date);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{SIGNATURE_FIELD, all_fields};
    use crate::record::{
        DisposalType, FacilityType, Performance, SystemType, TankMaterial, YesNoUnknown,
    };

    fn comment_of(len: usize) -> String {
        "a".repeat(len)
    }

    fn sample_record() -> InspectionRecord {
        let mut record = InspectionRecord::default();
        record.facility_info.inspector_name = Some("Jane Q Smith".to_string());
        record.facility_info.facility_type = Some(FacilityType::MultiFamily);
        record.facility_info.well_within_100_feet = Some(true);
        record.facility_info.facility_address = Some("12 Juniper Rd".to_string());
        record.facility_info.facility_city = Some("Prescott".to_string());
        record.general_treatment.system_type = Some(SystemType::Conventional);
        record.general_treatment.performance = Some(Performance::OperationalWithConcerns);
        record.design_flow.occupancy_exceeds_design = Some(YesNoUnknown::Unknown);
        record.septic_tank.number_of_tanks = Some("2".to_string());
        record.septic_tank.tanks = vec![
            TankRecord {
                material: Some(TankMaterial::Concrete),
                capacity_gallons: Some("1000".to_string()),
                ..TankRecord::default()
            },
            TankRecord {
                material: Some(TankMaterial::Steel),
                capacity_gallons: Some("500".to_string()),
                ..TankRecord::default()
            },
        ];
        record.disposal_works.disposal_type = Some(DisposalType::Chamber);
        record
    }

    #[test]
    fn every_declared_value_field_has_an_entry() {
        for record in [InspectionRecord::default(), sample_record()] {
            let (values, _) = map_record(&record);
            for id in layout::value_field_ids() {
                assert!(values.contains_key(id), "missing entry for {id}");
            }
        }
    }

    #[test]
    fn mapper_only_emits_declared_fields() {
        let (values, _) = map_record(&sample_record());
        for key in values.keys() {
            assert!(
                all_fields().any(|field| field.id == key),
                "undeclared key {key}"
            );
        }
        assert!(!values.contains_key(SIGNATURE_FIELD));
    }

    #[test]
    fn booleans_render_check_mark_or_empty() {
        let (values, _) = map_record(&sample_record());
        assert_eq!(values.get("well_within_100_feet"), Some(CHECK_MARK));
        assert_eq!(values.get("water_softener_backwash"), Some(""));
    }

    #[test]
    fn enum_slots_are_exclusive() {
        let (values, _) = map_record(&sample_record());
        let checked: Vec<String> = FacilityType::CHOICES
            .iter()
            .map(|(_, suffix, _)| format!("facility_type_{suffix}"))
            .filter(|id| values.get(id) == Some(CHECK_MARK))
            .collect();
        assert_eq!(checked, vec!["facility_type_multi_family".to_string()]);
        assert_eq!(
            values.get("treatment_performance_concerns"),
            Some(CHECK_MARK)
        );
        assert_eq!(values.get("treatment_performance_operational"), Some(""));
        assert_eq!(
            values.get("occupancy_exceeds_design_unknown"),
            Some(CHECK_MARK)
        );
    }

    #[test]
    fn unrecognized_enum_leaves_all_slots_empty() {
        let mut record = InspectionRecord::default();
        record.disposal_works.disposal_type = Some(DisposalType::Unrecognized);
        let (values, _) = map_record(&record);
        for (_, suffix, _) in DisposalType::CHOICES {
            assert_eq!(values.get(&format!("disposal_type_{suffix}")), Some(""));
        }
        assert_eq!(values.get("disposal_summary_type"), Some(""));
    }

    #[test]
    fn initials_are_derived_from_inspector_name() {
        assert_eq!(inspector_initials("Jane Q Smith"), "JQS");
        assert_eq!(inspector_initials("Dan R Smith"), "DRS");
        assert_eq!(inspector_initials("  ada   lovelace "), "AL");
        assert_eq!(inspector_initials(""), "");

        let mut record = InspectionRecord::default();
        record.facility_info.inspector_name = Some("Dan R Smith".to_string());
        let (values, _) = map_record(&record);
        for id in INITIALS_FIELDS {
            assert_eq!(values.get(id), Some("DRS"));
        }
    }

    #[test]
    fn only_the_first_declared_tank_reaches_the_form() {
        let (values, _) = map_record(&sample_record());
        assert_eq!(values.get("tank1_material_concrete"), Some(CHECK_MARK));
        assert_eq!(values.get("tank1_material_steel"), Some(""));
        assert_eq!(values.get("tank1_capacity_gallons"), Some("1000"));
    }

    #[test]
    fn comment_at_threshold_stays_inline() {
        let mut record = InspectionRecord::default();
        record.septic_tank.comments = Some(comment_of(OVERFLOW_THRESHOLD));
        let (values, overflow) = map_record(&record);
        assert!(overflow.is_empty());
        assert_eq!(
            values.get("septic_tank_comments").map(str::len),
            Some(OVERFLOW_THRESHOLD)
        );
    }

    #[test]
    fn long_comment_is_replaced_and_reported_once() {
        let long = comment_of(350);
        let mut record = InspectionRecord::default();
        record.septic_tank.comments = Some(long.clone());
        let (values, overflow) = map_record(&record);
        assert_eq!(values.get("septic_tank_comments"), Some(SEE_COMMENTS));
        assert_eq!(overflow.len(), 1);
        let entry = &overflow.entries[0];
        assert_eq!(entry.section_label, SEPTIC_TANK_COMMENTS_LABEL);
        assert_eq!(entry.field_id, "septic_tank_comments");
        assert_eq!(entry.text, long);
    }

    #[test]
    fn overflow_and_inline_are_exclusive_for_every_comment_field() {
        let mut record = InspectionRecord::default();
        record.design_flow.comments = Some(comment_of(201));
        record.septic_tank.comments = Some(comment_of(20));
        record.disposal_works.comments = Some(comment_of(999));
        let (values, overflow) = map_record(&record);
        for (id, original) in [
            ("design_flow_comments", &record.design_flow.comments),
            ("septic_tank_comments", &record.septic_tank.comments),
            ("disposal_works_comments", &record.disposal_works.comments),
        ] {
            let inline = values.get(id).expect("entry");
            let reported = overflow.entries.iter().filter(|e| e.field_id == id).count();
            if inline == SEE_COMMENTS {
                assert_eq!(reported, 1, "{id}");
            } else {
                assert_eq!(reported, 0, "{id}");
                assert_eq!(Some(inline), original.as_deref());
            }
        }
        let labels: Vec<&str> = overflow
            .entries
            .iter()
            .map(|e| e.section_label.as_str())
            .collect();
        assert_eq!(
            labels,
            vec![DESIGN_FLOW_COMMENTS_LABEL, DISPOSAL_WORKS_COMMENTS_LABEL]
        );
    }

    #[test]
    fn threshold_counts_characters_not_bytes() {
        let mut record = InspectionRecord::default();
        record.design_flow.comments = Some("é".repeat(OVERFLOW_THRESHOLD));
        let (_, overflow) = map_record(&record);
        assert!(overflow.is_empty());
    }

    #[test]
    fn custom_threshold_is_honored() {
        let mut record = InspectionRecord::default();
        record.disposal_works.comments = Some(comment_of(60));
        let (values, overflow) = FieldMapper::new(50).map(&record);
        assert_eq!(values.get("disposal_works_comments"), Some(SEE_COMMENTS));
        assert!(overflow.contains_field("disposal_works_comments"));
    }

    #[test]
    fn mapping_is_idempotent() {
        let mut record = sample_record();
        record.septic_tank.comments = Some(comment_of(400));
        let first = map_record(&record);
        let second = map_record(&record);
        assert_eq!(first, second);
    }

    #[test]
    fn summary_address_joins_present_parts() {
        let (values, _) = map_record(&sample_record());
        assert_eq!(
            values.get("facility_summary_address"),
            Some("12 Juniper Rd, Prescott")
        );
        assert_eq!(
            values.get("design_summary_treatment"),
            Some("Operational with Concerns")
        );
    }
}
