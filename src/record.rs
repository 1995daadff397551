use crate::error::ReportError;
use serde::{Deserialize, Serialize};

pub trait ChoiceField: Copy + PartialEq + 'static {
    // (value, slot suffix, printed label) in form order.
    const CHOICES: &'static [(Self, &'static str, &'static str)];

    fn label(&self) -> Option<&'static str> {
        Self::CHOICES
            .iter()
            .find(|(choice, _, _)| choice == self)
            .map(|(_, _, label)| *label)
    }
}

macro_rules! choice_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => ($slot:literal, $label:literal)),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant,)+
            #[serde(other)]
            Unrecognized,
        }

        impl ChoiceField for $name {
            const CHOICES: &'static [(Self, &'static str, &'static str)] =
                &[$(($name::$variant, $slot, $label)),+];
        }
    };
}

choice_enum!(YesNo { Yes => ("yes", "Yes"), No => ("no", "No") });

choice_enum!(YesNoUnknown {
    Yes => ("yes", "Yes"),
    No => ("no", "No"),
    Unknown => ("unknown", "Unknown"),
});

choice_enum!(FacilityType {
    SingleFamily => ("single_family", "Single Family"),
    MultiFamily => ("multi_family", "Multi-Family"),
    Commercial => ("commercial", "Commercial"),
    Other => ("other", "Other"),
});

choice_enum!(WaterSource {
    Municipal => ("municipal", "Municipal"),
    PrivateWell => ("private_well", "Private Well"),
    SharedWell => ("shared_well", "Shared Well"),
    Hauled => ("hauled", "Hauled"),
    Other => ("other", "Other"),
});

choice_enum!(SystemType {
    Conventional => ("conventional", "Conventional"),
    Alternative => ("alternative", "Alternative"),
});

choice_enum!(
    Performance {
        Operational => ("operational", "Operational"),
        OperationalWithConcerns => ("concerns", "Operational with Concerns"),
        NotOperational => ("not_operational", "Not Operational"),
    }
);

choice_enum!(FlowBasis {
    Bedrooms => ("bedrooms", "Bedrooms"),
    FixtureUnits => ("fixture_units", "Fixture Units"),
    PermitRecords => ("permit_records", "Permit Records"),
    Estimated => ("estimated", "Estimated"),
});

choice_enum!(TankMaterial {
    Concrete => ("concrete", "Concrete"),
    Fiberglass => ("fiberglass", "Fiberglass"),
    Polyethylene => ("polyethylene", "Polyethylene"),
    Steel => ("steel", "Steel"),
    Other => ("other", "Other"),
});

choice_enum!(BaffleCondition {
    Good => ("good", "Good"),
    Damaged => ("damaged", "Damaged"),
    Missing => ("missing", "Missing"),
    NotVisible => ("not_visible", "Not Visible"),
});

choice_enum!(LiquidLevel {
    Normal => ("normal", "Normal"),
    AboveOutlet => ("above_outlet", "Above Outlet"),
    BelowOutlet => ("below_outlet", "Below Outlet"),
});

choice_enum!(Condition {
    Satisfactory => ("satisfactory", "Satisfactory"),
    Unsatisfactory => ("unsatisfactory", "Unsatisfactory"),
});

choice_enum!(DisposalType {
    Trench => ("trench", "Trench"),
    Bed => ("bed", "Bed"),
    Chamber => ("chamber", "Chamber"),
    SeepagePit => ("seepage_pit", "Seepage Pit"),
    Mound => ("mound", "Mound"),
    Other => ("other", "Other"),
});

choice_enum!(DistributionMethod {
    Gravity => ("gravity", "Gravity"),
    DistributionBox => ("distribution_box", "Distribution Box"),
    Pressure => ("pressure", "Pressure"),
    Drip => ("drip", "Drip"),
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InspectionRecord {
    pub facility_info: FacilityInfo,
    pub general_treatment: GeneralTreatment,
    pub design_flow: DesignFlow,
    pub septic_tank: SepticTank,
    pub disposal_works: DisposalWorks,
}

impl InspectionRecord {
    pub fn from_json(raw: &str) -> Result<Self, ReportError> {
        serde_json::from_str(raw).map_err(|err| ReportError::InvalidRecord(err.to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FacilityInfo {
    pub inspector_name: Option<String>,
    pub inspector_company: Option<String>,
    pub inspector_phone: Option<String>,
    pub inspector_email: Option<String>,
    pub inspector_certification: Option<String>,
    pub inspection_date: Option<String>,
    pub owner_name: Option<String>,
    pub owner_phone: Option<String>,
    pub facility_address: Option<String>,
    pub facility_city: Option<String>,
    pub facility_county: Option<String>,
    pub facility_zip: Option<String>,
    pub tax_parcel_number: Option<String>,
    pub permit_number: Option<String>,
    pub facility_type: Option<FacilityType>,
    pub facility_type_other: Option<String>,
    pub water_source: Option<WaterSource>,
    pub well_within_100_feet: Option<bool>,
    pub records_available: Option<YesNo>,
    pub records_description: Option<String>,
    pub signature_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneralTreatment {
    pub system_type: Option<SystemType>,
    pub alternative_system_description: Option<String>,
    pub system_age_years: Option<String>,
    pub performance: Option<Performance>,
    pub surfacing_effluent: Option<bool>,
    pub odor_present: Option<bool>,
    pub physical_damage: Option<bool>,
    pub repairs_recommended: Option<YesNo>,
    pub repair_description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DesignFlow {
    pub bedrooms: Option<String>,
    pub fixture_units: Option<String>,
    pub design_flow_gpd: Option<String>,
    pub flow_basis: Option<FlowBasis>,
    pub occupancy_exceeds_design: Option<YesNoUnknown>,
    pub water_softener_backwash: Option<bool>,
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SepticTank {
    pub number_of_tanks: Option<String>,
    pub tanks: Vec<TankRecord>,
    pub pumped_during_inspection: Option<bool>,
    pub pumper_company: Option<String>,
    pub pumper_license: Option<String>,
    pub gallons_pumped: Option<String>,
    pub comments: Option<String>,
}

impl SepticTank {
    pub const MAX_TANKS: usize = 3;

    // An absent or unparsable count keeps every tank up to the form maximum.
    pub fn declared_tanks(&self) -> &[TankRecord] {
        let declared = self
            .number_of_tanks
            .as_deref()
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .unwrap_or(self.tanks.len());
        let keep = declared.min(Self::MAX_TANKS).min(self.tanks.len());
        &self.tanks[..keep]
    }

    pub fn tank(&self, index: usize) -> Option<&TankRecord> {
        self.declared_tanks().get(index)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TankRecord {
    pub material: Option<TankMaterial>,
    pub capacity_gallons: Option<String>,
    pub compartments: Option<String>,
    pub depth_to_lid_inches: Option<String>,
    pub inlet_baffle: Option<BaffleCondition>,
    pub outlet_baffle: Option<BaffleCondition>,
    pub effluent_filter_present: Option<bool>,
    pub risers_present: Option<bool>,
    pub lids_secure: Option<bool>,
    pub sludge_depth_inches: Option<String>,
    pub scum_depth_inches: Option<String>,
    pub liquid_level: Option<LiquidLevel>,
    pub structural_condition: Option<Condition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DisposalWorks {
    pub disposal_type: Option<DisposalType>,
    pub disposal_type_other: Option<String>,
    pub distribution_method: Option<DistributionMethod>,
    pub distribution_box_condition: Option<Condition>,
    pub performance: Option<Performance>,
    pub surfacing_effluent: Option<bool>,
    pub saturated_soil: Option<bool>,
    pub hydraulic_load_test: Option<bool>,
    pub reserve_area_available: Option<YesNoUnknown>,
    pub setback_concerns: Option<bool>,
    pub comments: Option<String>,
}
