//! Blood product catalog models

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// ABO blood group. Rh is not tracked separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BloodType {
    A,
    B,
    O,
    AB,
}

impl BloodType {
    pub const ALL: [BloodType; 4] = [BloodType::A, BloodType::B, BloodType::O, BloodType::AB];

    pub fn as_str(&self) -> &'static str {
        match self {
            BloodType::A => "A",
            BloodType::B => "B",
            BloodType::O => "O",
            BloodType::AB => "AB",
        }
    }

    /// Universal red-cell donor group
    pub fn is_universal_donor(&self) -> bool {
        matches!(self, BloodType::O)
    }

    /// Normalize a free-form label such as "O+", "ab-" or "A" into a blood type
    pub fn normalize(raw: &str) -> Option<Self> {
        let trimmed = raw.trim().trim_end_matches(['+', '-']).trim();
        trimmed.parse().ok()
    }
}

impl std::fmt::Display for BloodType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BloodType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(BloodType::A),
            "B" => Ok(BloodType::B),
            "O" => Ok(BloodType::O),
            "AB" => Ok(BloodType::AB),
            other => Err(format!("unknown blood type '{}'", other)),
        }
    }
}

/// Blood component group a preparation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Component {
    #[serde(rename = "RBC")]
    Rbc,
    #[serde(rename = "PLT")]
    Plt,
    #[serde(rename = "FFP")]
    Ffp,
    #[serde(rename = "Cryo")]
    Cryo,
}

impl Component {
    pub const ALL: [Component; 4] = [Component::Rbc, Component::Plt, Component::Ffp, Component::Cryo];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Rbc => "RBC",
            Component::Plt => "PLT",
            Component::Ffp => "FFP",
            Component::Cryo => "Cryo",
        }
    }

    /// Red cells are the only family whose target comes from the rate/factor formula
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Component::Rbc)
    }
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Component {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RBC" => Ok(Component::Rbc),
            "PLT" => Ok(Component::Plt),
            "FFP" => Ok(Component::Ffp),
            "CRYO" => Ok(Component::Cryo),
            other => Err(format!("unknown component '{}'", other)),
        }
    }
}

/// Preparation name of the first red-cell sub-product
pub const PRBC: &str = "PRBC";

/// Preparation name of the second red-cell sub-product
pub const PREFILTERED: &str = "Prefiltered";

/// Alternative spellings that refer to a canonical preparation name
const PREPARATION_ALIASES: &[(&str, &str)] = &[("Pre-R", PREFILTERED)];

/// A (component, preparation) reference row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: i32,
    pub component: Component,
    pub preparation: String,
    pub remark: Option<String>,
}

impl Product {
    pub fn is_dynamic(&self) -> bool {
        self.component.is_dynamic()
    }
}

/// Identity of a stock row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub blood_type: BloodType,
    pub preparation_id: i32,
}

impl StockKey {
    pub fn new(blood_type: BloodType, preparation_id: i32) -> Self {
        Self {
            blood_type,
            preparation_id,
        }
    }
}

/// The two interchangeable red-cell sub-products
#[derive(Debug, Clone, Copy)]
pub struct DynamicPair<'a> {
    pub first: &'a Product,
    pub second: &'a Product,
}

/// Static set of products known to the blood bank
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    products: Vec<Product>,
}

impl Catalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn get(&self, id: i32) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    /// Look up a product by preparation name, honoring known aliases
    pub fn by_preparation(&self, name: &str) -> Option<&Product> {
        let name = name.trim();
        let canonical = PREPARATION_ALIASES
            .iter()
            .find(|(alias, _)| alias.eq_ignore_ascii_case(name))
            .map(|(_, canonical)| *canonical)
            .unwrap_or(name);

        self.products
            .iter()
            .find(|p| p.preparation.eq_ignore_ascii_case(canonical))
    }

    /// All products of one component
    pub fn family(&self, component: Component) -> impl Iterator<Item = &Product> {
        self.products.iter().filter(move |p| p.component == component)
    }

    /// Red-cell sub-products in split order, if both are catalogued
    pub fn dynamic_pair(&self) -> Option<DynamicPair<'_>> {
        let first = self.by_preparation(PRBC)?;
        let second = self.by_preparation(PREFILTERED)?;
        Some(DynamicPair { first, second })
    }

    /// Default catalog seeded by the initial migration
    pub fn seed() -> Self {
        let rows = [
            (1, Component::Rbc, PRBC, "Packed red blood cells"),
            (2, Component::Rbc, PREFILTERED, "Pre-storage leukoreduced red cells"),
            (3, Component::Plt, "PC", "Platelet concentrate"),
            (4, Component::Plt, "SDP", "Single donor platelets"),
            (5, Component::Ffp, "FFP", "Fresh frozen plasma"),
            (6, Component::Cryo, "Cryo", "Cryoprecipitate"),
        ];

        Self::new(
            rows.into_iter()
                .map(|(id, component, preparation, remark)| Product {
                    id,
                    component,
                    preparation: preparation.to_string(),
                    remark: Some(remark.to_string()),
                })
                .collect(),
        )
    }
}
