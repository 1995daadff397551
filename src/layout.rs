use crate::types::Rect;

pub const PAGE_COUNT: usize = 6;
pub const SIGNATURE_FIELD: &str = "inspector_signature";
pub const SIGNATURE_DATE_FIELD: &str = "signature_date";

pub const TEXT_MIN_FONT_SIZE: f32 = 6.0;
pub const TEXT_FONT_SIZE: f32 = 9.0;
pub const MULTILINE_FONT_SIZE: f32 = 8.0;
pub const LINE_HEIGHT_FACTOR: f32 = 1.2;

const ROW_H: f32 = 5.0;
const BOX: f32 = 3.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FontRole {
    Regular,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    // Shrinks from `TEXT_FONT_SIZE` down to `TEXT_MIN_FONT_SIZE`.
    Text,
    AutoText { min_size: f32, max_size: f32 },
    MultiLine { size: f32 },
    Checkbox,
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldPosition {
    pub id: &'static str,
    pub page: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub kind: FieldKind,
    pub font: FontRole,
}

impl FieldPosition {
    pub fn rect(&self) -> Rect {
        Rect::from_mm(self.x, self.y, self.width, self.height)
    }

    pub fn is_image(&self) -> bool {
        matches!(self.kind, FieldKind::Image)
    }
}

const fn text(id: &'static str, page: usize, x: f32, y: f32, width: f32) -> FieldPosition {
    FieldPosition {
        id,
        page,
        x,
        y,
        width,
        height: ROW_H,
        kind: FieldKind::Text,
        font: FontRole::Regular,
    }
}

const fn auto(
    id: &'static str,
    page: usize,
    x: f32,
    y: f32,
    width: f32,
    min_size: f32,
    max_size: f32,
) -> FieldPosition {
    FieldPosition {
        id,
        page,
        x,
        y,
        width,
        height: ROW_H,
        kind: FieldKind::AutoText { min_size, max_size },
        font: FontRole::Regular,
    }
}

const fn multi(
    id: &'static str,
    page: usize,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
) -> FieldPosition {
    FieldPosition {
        id,
        page,
        x,
        y,
        width,
        height,
        kind: FieldKind::MultiLine {
            size: MULTILINE_FONT_SIZE,
        },
        font: FontRole::Regular,
    }
}

const fn check(id: &'static str, page: usize, x: f32, y: f32) -> FieldPosition {
    FieldPosition {
        id,
        page,
        x,
        y,
        width: BOX,
        height: BOX,
        kind: FieldKind::Checkbox,
        font: FontRole::Bold,
    }
}

const fn image(
    id: &'static str,
    page: usize,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
) -> FieldPosition {
    FieldPosition {
        id,
        page,
        x,
        y,
        width,
        height,
        kind: FieldKind::Image,
        font: FontRole::Regular,
    }
}

const fn initials(id: &'static str, page: usize) -> FieldPosition {
    FieldPosition {
        id,
        page,
        x: 182.0,
        y: 262.0,
        width: 18.0,
        height: ROW_H,
        kind: FieldKind::Text,
        font: FontRole::Bold,
    }
}

static PAGE_0: [FieldPosition; 0] = [];

static PAGE_1: [FieldPosition; 35] = [
    text("inspector_name", 1, 48.0, 38.0, 70.0),
    text("inspector_certification", 1, 160.0, 38.0, 40.0),
    text("inspector_company", 1, 48.0, 46.0, 70.0),
    text("inspector_phone", 1, 160.0, 46.0, 40.0),
    auto("inspector_email", 1, 48.0, 54.0, 70.0, 5.0, 9.0),
    text("inspection_date", 1, 160.0, 54.0, 40.0),
    text("owner_name", 1, 48.0, 70.0, 70.0),
    text("owner_phone", 1, 160.0, 70.0, 40.0),
    auto("facility_address", 1, 48.0, 78.0, 152.0, 6.0, 9.0),
    text("facility_city", 1, 30.0, 86.0, 55.0),
    text("facility_county", 1, 105.0, 86.0, 45.0),
    text("facility_zip", 1, 170.0, 86.0, 30.0),
    text("tax_parcel_number", 1, 48.0, 94.0, 60.0),
    text("permit_number", 1, 150.0, 94.0, 50.0),
    check("facility_type_single_family", 1, 20.0, 108.0),
    check("facility_type_multi_family", 1, 60.0, 108.0),
    check("facility_type_commercial", 1, 100.0, 108.0),
    check("facility_type_other", 1, 140.0, 108.0),
    auto("facility_type_other_text", 1, 160.0, 107.3, 40.0, 5.0, 9.0),
    check("water_source_municipal", 1, 20.0, 122.0),
    check("water_source_private_well", 1, 55.0, 122.0),
    check("water_source_shared_well", 1, 90.0, 122.0),
    check("water_source_hauled", 1, 125.0, 122.0),
    check("water_source_other", 1, 160.0, 122.0),
    check("well_within_100_feet", 1, 20.0, 134.0),
    check("records_available_yes", 1, 20.0, 146.0),
    check("records_available_no", 1, 40.0, 146.0),
    multi("records_description", 1, 20.0, 154.0, 176.0, 30.0),
    text("facility_summary_address", 1, 20.0, 196.0, 120.0),
    text("facility_summary_parcel", 1, 150.0, 196.0, 50.0),
    text("facility_summary_county", 1, 20.0, 204.0, 60.0),
    text("facility_summary_inspection_date", 1, 150.0, 204.0, 50.0),
    text("facility_summary_inspector", 1, 20.0, 212.0, 90.0),
    text("facility_summary_company", 1, 120.0, 212.0, 80.0),
    initials("page1_initials", 1),
];

static PAGE_2: [FieldPosition; 33] = [
    check("system_type_conventional", 2, 20.0, 40.0),
    check("system_type_alternative", 2, 70.0, 40.0),
    auto(
        "alternative_system_description",
        2,
        110.0,
        39.3,
        90.0,
        5.0,
        9.0,
    ),
    text("system_age_years", 2, 60.0, 50.0, 25.0),
    check("treatment_performance_operational", 2, 20.0, 62.0),
    check("treatment_performance_concerns", 2, 75.0, 62.0),
    check("treatment_performance_not_operational", 2, 140.0, 62.0),
    check("treatment_surfacing_effluent", 2, 20.0, 74.0),
    check("treatment_odor_present", 2, 75.0, 74.0),
    check("treatment_physical_damage", 2, 140.0, 74.0),
    check("repairs_recommended_yes", 2, 20.0, 86.0),
    check("repairs_recommended_no", 2, 40.0, 86.0),
    multi("repair_description", 2, 20.0, 94.0, 176.0, 22.0),
    text("design_bedrooms", 2, 48.0, 134.0, 20.0),
    text("design_fixture_units", 2, 110.0, 134.0, 20.0),
    text("design_flow_gpd", 2, 170.0, 134.0, 30.0),
    check("flow_basis_bedrooms", 2, 20.0, 146.0),
    check("flow_basis_fixture_units", 2, 65.0, 146.0),
    check("flow_basis_permit_records", 2, 110.0, 146.0),
    check("flow_basis_estimated", 2, 155.0, 146.0),
    check("occupancy_exceeds_design_yes", 2, 20.0, 158.0),
    check("occupancy_exceeds_design_no", 2, 40.0, 158.0),
    check("occupancy_exceeds_design_unknown", 2, 60.0, 158.0),
    check("water_softener_backwash", 2, 20.0, 170.0),
    multi("design_flow_comments", 2, 20.0, 182.0, 176.0, 40.0),
    text("design_summary_bedrooms", 2, 20.0, 230.0, 30.0),
    text("design_summary_fixture_units", 2, 60.0, 230.0, 30.0),
    text("design_summary_flow_gpd", 2, 100.0, 230.0, 30.0),
    text("design_summary_system_age", 2, 140.0, 230.0, 30.0),
    text("design_summary_treatment", 2, 20.0, 238.0, 80.0),
    text("design_summary_system_type", 2, 110.0, 238.0, 90.0),
    text("design_summary_parcel", 2, 20.0, 246.0, 60.0),
    initials("page2_initials", 2),
];

static PAGE_3: [FieldPosition; 42] = [
    text("number_of_tanks", 3, 60.0, 36.0, 15.0),
    check("tank1_material_concrete", 3, 20.0, 48.0),
    check("tank1_material_fiberglass", 3, 55.0, 48.0),
    check("tank1_material_polyethylene", 3, 90.0, 48.0),
    check("tank1_material_steel", 3, 130.0, 48.0),
    check("tank1_material_other", 3, 160.0, 48.0),
    text("tank1_capacity_gallons", 3, 48.0, 60.0, 30.0),
    text("tank1_compartments", 3, 118.0, 60.0, 15.0),
    text("tank1_depth_to_lid", 3, 175.0, 60.0, 25.0),
    check("tank1_inlet_baffle_good", 3, 48.0, 72.0),
    check("tank1_inlet_baffle_damaged", 3, 78.0, 72.0),
    check("tank1_inlet_baffle_missing", 3, 108.0, 72.0),
    check("tank1_inlet_baffle_not_visible", 3, 138.0, 72.0),
    check("tank1_outlet_baffle_good", 3, 48.0, 80.0),
    check("tank1_outlet_baffle_damaged", 3, 78.0, 80.0),
    check("tank1_outlet_baffle_missing", 3, 108.0, 80.0),
    check("tank1_outlet_baffle_not_visible", 3, 138.0, 80.0),
    check("tank1_effluent_filter", 3, 20.0, 92.0),
    check("tank1_risers", 3, 75.0, 92.0),
    check("tank1_lids_secure", 3, 140.0, 92.0),
    text("tank1_sludge_depth", 3, 48.0, 104.0, 20.0),
    text("tank1_scum_depth", 3, 118.0, 104.0, 20.0),
    check("tank1_liquid_level_normal", 3, 20.0, 116.0),
    check("tank1_liquid_level_above_outlet", 3, 65.0, 116.0),
    check("tank1_liquid_level_below_outlet", 3, 110.0, 116.0),
    check("tank1_structural_satisfactory", 3, 20.0, 128.0),
    check("tank1_structural_unsatisfactory", 3, 75.0, 128.0),
    check("tank_pumped", 3, 20.0, 142.0),
    text("gallons_pumped", 3, 170.0, 142.0, 30.0),
    auto("pumper_company", 3, 48.0, 150.0, 80.0, 5.0, 9.0),
    text("pumper_license", 3, 160.0, 150.0, 40.0),
    multi("septic_tank_comments", 3, 20.0, 164.0, 176.0, 60.0),
    text("tank_summary_count", 3, 20.0, 232.0, 20.0),
    text("tank_summary_capacity", 3, 50.0, 232.0, 30.0),
    text("tank_summary_compartments", 3, 90.0, 232.0, 20.0),
    text("tank_summary_sludge", 3, 120.0, 232.0, 20.0),
    text("tank_summary_scum", 3, 150.0, 232.0, 20.0),
    text("tank_summary_pumped_gallons", 3, 20.0, 240.0, 30.0),
    auto("tank_summary_pumper", 3, 60.0, 240.0, 80.0, 5.0, 9.0),
    text("tank_summary_parcel", 3, 150.0, 240.0, 50.0),
    text("tank_summary_inspection_date", 3, 20.0, 248.0, 40.0),
    initials("page3_initials", 3),
];

static PAGE_4: [FieldPosition; 31] = [
    check("disposal_type_trench", 4, 20.0, 40.0),
    check("disposal_type_bed", 4, 50.0, 40.0),
    check("disposal_type_chamber", 4, 80.0, 40.0),
    check("disposal_type_seepage_pit", 4, 110.0, 40.0),
    check("disposal_type_mound", 4, 140.0, 40.0),
    check("disposal_type_other", 4, 165.0, 40.0),
    auto("disposal_type_other_text", 4, 48.0, 48.0, 80.0, 5.0, 9.0),
    check("distribution_method_gravity", 4, 20.0, 60.0),
    check("distribution_method_distribution_box", 4, 60.0, 60.0),
    check("distribution_method_pressure", 4, 110.0, 60.0),
    check("distribution_method_drip", 4, 150.0, 60.0),
    check("distribution_box_condition_satisfactory", 4, 20.0, 72.0),
    check("distribution_box_condition_unsatisfactory", 4, 75.0, 72.0),
    check("disposal_performance_operational", 4, 20.0, 84.0),
    check("disposal_performance_concerns", 4, 75.0, 84.0),
    check("disposal_performance_not_operational", 4, 140.0, 84.0),
    check("disposal_surfacing_effluent", 4, 20.0, 96.0),
    check("disposal_saturated_soil", 4, 75.0, 96.0),
    check("disposal_hydraulic_load_test", 4, 140.0, 96.0),
    check("reserve_area_available_yes", 4, 20.0, 108.0),
    check("reserve_area_available_no", 4, 40.0, 108.0),
    check("reserve_area_available_unknown", 4, 60.0, 108.0),
    check("disposal_setback_concerns", 4, 20.0, 120.0),
    multi("disposal_works_comments", 4, 20.0, 134.0, 176.0, 70.0),
    text("disposal_summary_type", 4, 20.0, 214.0, 60.0),
    text("disposal_summary_distribution", 4, 90.0, 214.0, 60.0),
    text("disposal_summary_performance", 4, 20.0, 222.0, 80.0),
    text("disposal_summary_reserve_area", 4, 110.0, 222.0, 40.0),
    text("disposal_summary_parcel", 4, 20.0, 230.0, 60.0),
    text("disposal_summary_inspection_date", 4, 90.0, 230.0, 40.0),
    initials("page4_initials", 4),
];

static PAGE_5: [FieldPosition; 11] = [
    auto(
        "certification_inspector_name",
        5,
        20.0,
        150.0,
        90.0,
        6.0,
        10.0,
    ),
    text("certification_number", 5, 130.0, 150.0, 70.0),
    auto("certification_company", 5, 20.0, 158.0, 90.0, 6.0, 10.0),
    text("certification_phone", 5, 130.0, 158.0, 70.0),
    image(SIGNATURE_FIELD, 5, 20.0, 166.0, 90.0, 20.0),
    text(SIGNATURE_DATE_FIELD, 5, 130.0, 176.0, 40.0),
    auto(
        "certification_facility_address",
        5,
        20.0,
        200.0,
        120.0,
        6.0,
        9.0,
    ),
    text("certification_parcel", 5, 150.0, 200.0, 50.0),
    text("certification_inspection_date", 5, 20.0, 208.0, 40.0),
    text("certification_email", 5, 90.0, 208.0, 110.0),
    initials("page5_initials", 5),
];

pub fn page_fields(page: usize) -> &'static [FieldPosition] {
    match page {
        0 => &PAGE_0,
        1 => &PAGE_1,
        2 => &PAGE_2,
        3 => &PAGE_3,
        4 => &PAGE_4,
        5 => &PAGE_5,
        _ => &[],
    }
}

pub fn all_fields() -> impl Iterator<Item = &'static FieldPosition> {
    (0..PAGE_COUNT).flat_map(page_fields)
}

pub fn field(id: &str) -> Option<&'static FieldPosition> {
    all_fields().find(|field| field.id == id)
}

// Image fields are filled by the generator, not the mapper.
pub fn value_field_ids() -> impl Iterator<Item = &'static str> {
    all_fields()
        .filter(|field| !field.is_image())
        .map(|field| field.id)
}
