//! Regulation Catalog
//!
//! Static metadata for the regulation libraries loaded into FARchat.
//! Document counts live in the database and are not part of this table.

use serde::Serialize;

/// Grouping used by the regulation explorer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Core,
    Defense,
    Civilian,
}

impl Category {
    pub const fn title(self) -> &'static str {
        match self {
            Self::Core => "Core Federal Regulations",
            Self::Defense => "Defense Agency Supplements",
            Self::Civilian => "Civilian Agency Supplements",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Core => "Foundation regulations that apply across the federal government",
            Self::Defense => "Military branch and defense agency-specific supplements to DFARS",
            Self::Civilian => "Non-defense agency supplements to the FAR",
        }
    }
}

/// One regulation library
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Regulation {
    /// Matches the `regulation` tag on indexed document chunks
    pub id: &'static str,
    pub abbreviation: &'static str,
    pub full_name: &'static str,
    pub agency: &'static str,
    pub agency_abbr: &'static str,
    pub description: &'static str,
    pub coverage: &'static str,
    pub category: Category,
    /// Regulation this one supplements
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_regulation: Option<&'static str>,
    pub official_url: &'static str,
    /// Whether the library is loaded in the retrieval database
    pub is_active: bool,
}

impl Regulation {
    /// Search page pre-filtered to this regulation
    pub fn search_url(&self) -> String {
        format!("/search?regulation={}", self.id)
    }
}

pub static REGULATIONS: &[Regulation] = &[
    Regulation {
        id: "FAR",
        abbreviation: "FAR",
        full_name: "Federal Acquisition Regulation",
        agency: "Government-wide",
        agency_abbr: "FAR",
        description: "The primary regulation governing federal procurement. Establishes uniform policies and procedures for acquisition by all executive agencies.",
        coverage: "Parts 1-53",
        category: Category::Core,
        parent_regulation: None,
        official_url: "https://www.acquisition.gov/far",
        is_active: true,
    },
    Regulation {
        id: "DFARS",
        abbreviation: "DFARS",
        full_name: "Defense Federal Acquisition Regulation Supplement",
        agency: "Department of Defense",
        agency_abbr: "DOD",
        description: "Supplements the FAR with policies and procedures specific to defense acquisitions. Required for all DoD contracts.",
        coverage: "Parts 201-253",
        category: Category::Core,
        parent_regulation: Some("FAR"),
        official_url: "https://www.acquisition.gov/dfars",
        is_active: true,
    },
    Regulation {
        id: "DFARSPGI",
        abbreviation: "DFARS PGI",
        full_name: "DFARS Procedures, Guidance, and Information",
        agency: "Department of Defense",
        agency_abbr: "DOD",
        description: "Companion resource to DFARS providing detailed procedures, guidance, and information for implementing DFARS policies.",
        coverage: "Parts 201-253",
        category: Category::Core,
        parent_regulation: Some("DFARS"),
        official_url: "https://www.acquisition.gov/dfars/pgi",
        is_active: true,
    },
    Regulation {
        id: "AFARS",
        abbreviation: "AFARS",
        full_name: "Army Federal Acquisition Regulation Supplement",
        agency: "U.S. Army",
        agency_abbr: "ARMY",
        description: "Implements and supplements DFARS for Army contracting activities. Provides Army-specific acquisition policies and procedures.",
        coverage: "Parts 5101-5153",
        category: Category::Defense,
        parent_regulation: Some("DFARS"),
        official_url: "https://www.acquisition.gov/afars",
        is_active: true,
    },
    Regulation {
        id: "DAFFARS",
        abbreviation: "DAFFARS",
        full_name: "Department of the Air Force Federal Acquisition Regulation Supplement",
        agency: "U.S. Air Force",
        agency_abbr: "USAF",
        description: "Air Force supplement to DFARS. Governs acquisition procedures for Air Force and Space Force contracting.",
        coverage: "Parts 5301-5353",
        category: Category::Defense,
        parent_regulation: Some("DFARS"),
        official_url: "https://www.acquisition.gov/daffars",
        is_active: true,
    },
    Regulation {
        id: "NMCARS",
        abbreviation: "NMCARS",
        full_name: "Navy Marine Corps Acquisition Regulation Supplement",
        agency: "U.S. Navy & Marine Corps",
        agency_abbr: "NAVY",
        description: "Supplements DFARS for Navy and Marine Corps acquisitions. Includes guidance for naval shipbuilding and marine equipment.",
        coverage: "Parts 5201-5253",
        category: Category::Defense,
        parent_regulation: Some("DFARS"),
        official_url: "https://www.acquisition.gov/nmcars",
        is_active: true,
    },
    Regulation {
        id: "SOFARS",
        abbreviation: "SOFARS",
        full_name: "Special Operations Forces Acquisition Regulation Supplement",
        agency: "U.S. Special Operations Command",
        agency_abbr: "SOCOM",
        description: "DFARS supplement for USSOCOM acquisitions. Addresses unique requirements for special operations equipment and services.",
        coverage: "Parts 5601-5653",
        category: Category::Defense,
        parent_regulation: Some("DFARS"),
        official_url: "https://www.acquisition.gov/sofars",
        is_active: true,
    },
    Regulation {
        id: "DLAD",
        abbreviation: "DLAD",
        full_name: "Defense Logistics Acquisition Directive",
        agency: "Defense Logistics Agency",
        agency_abbr: "DLA",
        description: "DLA supplement to DFARS. Covers logistics, supply chain, and wholesale acquisition procedures.",
        coverage: "Parts 5101-5153",
        category: Category::Defense,
        parent_regulation: Some("DFARS"),
        official_url: "https://www.acquisition.gov/dlad",
        is_active: true,
    },
    Regulation {
        id: "GSAM",
        abbreviation: "GSAM",
        full_name: "General Services Administration Acquisition Manual",
        agency: "General Services Administration",
        agency_abbr: "GSA",
        description: "GSA supplement to the FAR. Essential for GSA Schedule contracts, federal supply schedules, and government-wide acquisition contracts.",
        coverage: "Parts 501-570",
        category: Category::Civilian,
        parent_regulation: Some("FAR"),
        official_url: "https://www.acquisition.gov/gsam",
        is_active: true,
    },
    Regulation {
        id: "VAAR",
        abbreviation: "VAAR",
        full_name: "Veterans Affairs Acquisition Regulation",
        agency: "Department of Veterans Affairs",
        agency_abbr: "VA",
        description: "VA supplement to the FAR. Includes special provisions for veteran-owned small businesses and healthcare acquisitions.",
        coverage: "Parts 801-873",
        category: Category::Civilian,
        parent_regulation: Some("FAR"),
        official_url: "https://www.acquisition.gov/vaar",
        is_active: true,
    },
    Regulation {
        id: "DARS",
        abbreviation: "DARS",
        full_name: "Department of Energy Acquisition Regulation Supplement",
        agency: "Department of Energy",
        agency_abbr: "DOE",
        description: "DOE supplement to the FAR. Covers energy research, nuclear facilities, and national laboratory acquisitions.",
        coverage: "Parts 901-970",
        category: Category::Civilian,
        parent_regulation: Some("FAR"),
        official_url: "https://www.acquisition.gov/dears",
        is_active: true,
    },
];

/// Look up a regulation by its exact id
pub fn by_id(id: &str) -> Option<&'static Regulation> {
    REGULATIONS.iter().find(|r| r.id == id)
}

pub fn by_category(category: Category) -> impl Iterator<Item = &'static Regulation> {
    REGULATIONS.iter().filter(move |r| r.category == category)
}

pub fn active() -> impl Iterator<Item = &'static Regulation> {
    REGULATIONS.iter().filter(|r| r.is_active)
}
