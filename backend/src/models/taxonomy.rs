//! Taxonomy models: countries, products, categories, product versions and
//! per-country disabled cells.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Country entity. `code` is the natural key used in requests.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Country {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub flag_emoji: String,
    pub display_order: i32,
}

/// Product entity
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub color_class: String,
    pub display_order: i32,
}

/// Department responsible for a document category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Department {
    Consulting,
    Business,
    Marketing,
}

impl Department {
    pub fn as_str(&self) -> &'static str {
        match self {
            Department::Consulting => "consulting",
            Department::Business => "business",
            Department::Marketing => "marketing",
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Department {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "consulting" => Ok(Department::Consulting),
            "business" => Ok(Department::Business),
            "marketing" => Ok(Department::Marketing),
            other => Err(format!("unknown department '{}'", other)),
        }
    }
}

impl TryFrom<String> for Department {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Document category entity
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub department: Department,
    pub display_order: i32,
}

/// Product version. At most one version per product is active.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct ProductVersion {
    pub id: Uuid,
    pub product_id: Uuid,
    pub version_number: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A (country, product, category) cell marked not applicable
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct DisabledCell {
    pub id: Uuid,
    pub country_id: Uuid,
    pub product_id: Uuid,
    pub category_id: Uuid,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
