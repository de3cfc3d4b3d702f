//! Matrix resolution.
//!
//! Builds the category x product grid for one country. Each cell holds the
//! artifact that should be shown for it (honouring per-product version
//! filters) and whether the cell is marked not applicable.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::Result;
use crate::models::artifact::ArtifactDetail;
use crate::models::taxonomy::{Category, Country, Department, Product};
use crate::services::artifact_service::ARTIFACT_DETAIL_SELECT;
use crate::services::taxonomy_service::TaxonomyService;

/// Inputs for one dashboard render
#[derive(Debug, Clone, Default)]
pub struct MatrixQuery {
    pub country_code: Option<String>,
    pub department: Option<Department>,
    /// Product id -> exact version label to show
    pub version_filters: HashMap<Uuid, String>,
}

/// Artifact as displayed in a matrix cell
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CellArtifact {
    pub id: Uuid,
    pub version: String,
    pub filename: String,
    pub uploader: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&ArtifactDetail> for CellArtifact {
    fn from(a: &ArtifactDetail) -> Self {
        Self {
            id: a.id,
            version: a.version_string.clone(),
            filename: a.filename().to_string(),
            uploader: a.uploader_label(),
            created_at: a.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MatrixCell {
    pub product_id: Uuid,
    pub artifact: Option<CellArtifact>,
    pub disabled: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MatrixRow {
    pub category: Category,
    pub cells: Vec<MatrixCell>,
}

/// Distinct version labels present for a product, newest label first
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductVersionOptions {
    pub product_id: Uuid,
    pub versions: Vec<String>,
    pub selected: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Matrix {
    pub countries: Vec<Country>,
    pub selected_country: Option<Country>,
    pub department: Option<Department>,
    pub products: Vec<Product>,
    pub product_versions: Vec<ProductVersionOptions>,
    pub rows: Vec<MatrixRow>,
}

/// Pick the country to render. An unknown or missing code falls back to the
/// configured default; if that is unknown too nothing is selected.
pub fn resolve_country<'a>(
    countries: &'a [Country],
    requested: Option<&str>,
    default_code: &str,
) -> Option<&'a Country> {
    let find = |code: &str| {
        countries
            .iter()
            .find(|c| c.code.eq_ignore_ascii_case(code.trim()))
    };

    requested
        .filter(|code| !code.trim().is_empty())
        .and_then(find)
        .or_else(|| find(default_code))
}

/// Choose the artifact shown for one cell out of that cell's candidates.
///
/// With a version filter only exact label matches qualify and the greatest
/// label wins (plain string order). Without one the most recent upload wins.
/// Remaining ties go to the newest row, then the greatest id.
pub fn resolve_cell<'a>(
    candidates: &[&'a ArtifactDetail],
    version_filter: Option<&str>,
) -> Option<&'a ArtifactDetail> {
    match version_filter {
        Some(version) => candidates
            .iter()
            .copied()
            .filter(|a| a.version_string == version)
            .max_by(|a, b| {
                a.version_string
                    .cmp(&b.version_string)
                    .then(a.created_at.cmp(&b.created_at))
                    .then(a.id.cmp(&b.id))
            }),
        None => candidates
            .iter()
            .copied()
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id))),
    }
}

/// Distinct version labels in descending string order.
pub fn distinct_versions<'a>(labels: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let set: BTreeSet<&str> = labels.into_iter().collect();
    set.into_iter().rev().map(str::to_string).collect()
}

/// Assemble the grid from preloaded rows. `artifacts` must already be scoped
/// to the selected country.
pub fn build_rows(
    categories: &[Category],
    products: &[Product],
    artifacts: &[ArtifactDetail],
    disabled: &HashSet<(Uuid, Uuid)>,
    version_filters: &HashMap<Uuid, String>,
) -> Vec<MatrixRow> {
    let mut by_cell: HashMap<(Uuid, Uuid), Vec<&ArtifactDetail>> = HashMap::new();
    for artifact in artifacts {
        by_cell
            .entry((artifact.product_id, artifact.category_id))
            .or_default()
            .push(artifact);
    }

    categories
        .iter()
        .map(|category| {
            let cells = products
                .iter()
                .map(|product| {
                    let key = (product.id, category.id);
                    let candidates = by_cell.get(&key).map(Vec::as_slice).unwrap_or(&[]);
                    let filter = version_filters
                        .get(&product.id)
                        .map(String::as_str)
                        .filter(|v| !v.is_empty());
                    MatrixCell {
                        product_id: product.id,
                        artifact: resolve_cell(candidates, filter).map(CellArtifact::from),
                        disabled: disabled.contains(&key),
                    }
                })
                .collect();
            MatrixRow {
                category: category.clone(),
                cells,
            }
        })
        .collect()
}

/// Per-product version lists for the filter dropdowns.
pub fn product_version_options(
    products: &[Product],
    artifacts: &[ArtifactDetail],
    version_filters: &HashMap<Uuid, String>,
) -> Vec<ProductVersionOptions> {
    products
        .iter()
        .map(|product| ProductVersionOptions {
            product_id: product.id,
            versions: distinct_versions(
                artifacts
                    .iter()
                    .filter(|a| a.product_id == product.id)
                    .map(|a| a.version_string.as_str()),
            ),
            selected: version_filters
                .get(&product.id)
                .filter(|v| !v.is_empty())
                .cloned(),
        })
        .collect()
}

/// Matrix service
pub struct MatrixService {
    db: PgPool,
    default_country_code: String,
}

impl MatrixService {
    pub fn new(db: PgPool, default_country_code: impl Into<String>) -> Self {
        Self {
            db,
            default_country_code: default_country_code.into(),
        }
    }

    /// Resolve the full grid for a dashboard request.
    pub async fn resolve(&self, query: &MatrixQuery) -> Result<Matrix> {
        let taxonomy = TaxonomyService::new(self.db.clone());
        let countries = taxonomy.list_countries().await?;
        let products = taxonomy.list_products().await?;
        let categories: Vec<Category> = taxonomy
            .list_categories()
            .await?
            .into_iter()
            .filter(|c| query.department.map_or(true, |d| c.department == d))
            .collect();

        let selected =
            resolve_country(&countries, query.country_code.as_deref(), &self.default_country_code)
                .cloned();
        let country_id = selected.as_ref().map(|c| c.id);

        let artifacts = self.load_artifacts(country_id).await?;
        let disabled = match country_id {
            Some(id) => taxonomy
                .list_disabled_cells(id)
                .await?
                .into_iter()
                .map(|d| (d.product_id, d.category_id))
                .collect(),
            None => HashSet::new(),
        };

        tracing::debug!(
            country = ?selected.as_ref().map(|c| c.code.as_str()),
            artifacts = artifacts.len(),
            disabled = disabled.len(),
            "Resolving matrix"
        );

        let rows = build_rows(
            &categories,
            &products,
            &artifacts,
            &disabled,
            &query.version_filters,
        );
        let product_versions =
            product_version_options(&products, &artifacts, &query.version_filters);

        Ok(Matrix {
            countries,
            selected_country: selected,
            department: query.department,
            products,
            product_versions,
            rows,
        })
    }

    /// All artifacts for a country, or the global ones when `None`.
    async fn load_artifacts(&self, country_id: Option<Uuid>) -> Result<Vec<ArtifactDetail>> {
        let sql = format!(
            "{} WHERE a.country_id IS NOT DISTINCT FROM $1",
            ARTIFACT_DETAIL_SELECT
        );
        let rows = sqlx::query_as::<_, ArtifactDetail>(&sql)
            .bind(country_id)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn country(code: &str, order: i32) -> Country {
        Country {
            id: Uuid::new_v4(),
            code: code.to_string(),
            name: code.to_string(),
            flag_emoji: String::new(),
            display_order: order,
        }
    }

    fn product(name: &str, order: i32) -> Product {
        Product {
            id: Uuid::new_v4(),
            name: name.to_string(),
            color_class: "bg-blue-500".to_string(),
            display_order: order,
        }
    }

    fn category(name: &str, order: i32) -> Category {
        Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
            department: Department::Consulting,
            display_order: order,
        }
    }

    fn artifact(
        product: &Product,
        category: &Category,
        version: &str,
        minutes: i64,
    ) -> ArtifactDetail {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        ArtifactDetail {
            id: Uuid::new_v4(),
            country_id: None,
            country_code: Some("KR".to_string()),
            product_id: product.id,
            product_name: product.name.clone(),
            category_id: category.id,
            category_name: category.name.clone(),
            version_string: version.to_string(),
            storage_key: format!(
                "artifacts/2024/03/x/{}_{}_v{}.pdf",
                product.name, category.name, version
            ),
            content_type: "application/pdf".to_string(),
            size_bytes: 1,
            uploader_id: None,
            uploader_username: None,
            uploader_display_name: None,
            created_at: base + Duration::minutes(minutes),
        }
    }

    #[test]
    fn test_resolve_country_prefers_requested_code() {
        let countries = vec![country("KR", 1), country("US", 2)];
        let picked = resolve_country(&countries, Some("US"), "KR").unwrap();
        assert_eq!(picked.code, "US");
        let picked = resolve_country(&countries, Some("us"), "KR").unwrap();
        assert_eq!(picked.code, "US");
    }

    #[test]
    fn test_resolve_country_falls_back_to_default() {
        let countries = vec![country("KR", 1), country("US", 2)];
        assert_eq!(resolve_country(&countries, None, "KR").unwrap().code, "KR");
        assert_eq!(resolve_country(&countries, Some(""), "KR").unwrap().code, "KR");
        assert_eq!(resolve_country(&countries, Some("ZZ"), "KR").unwrap().code, "KR");
    }

    #[test]
    fn test_resolve_country_empty_when_nothing_matches() {
        let countries = vec![country("US", 1)];
        assert!(resolve_country(&countries, Some("ZZ"), "KR").is_none());
        assert!(resolve_country(&[], None, "KR").is_none());
    }

    #[test]
    fn test_unfiltered_cell_shows_most_recent_upload() {
        let p = product("Enterprise", 1);
        let c = category("제품소개서", 1);
        let older = artifact(&p, &c, "9.0", 0);
        let newer = artifact(&p, &c, "1.0", 10);
        let picked = resolve_cell(&[&older, &newer], None).unwrap();
        assert_eq!(picked.id, newer.id);
    }

    #[test]
    fn test_unfiltered_tie_broken_by_id() {
        let p = product("Enterprise", 1);
        let c = category("제품소개서", 1);
        let mut a = artifact(&p, &c, "1.0", 0);
        let mut b = artifact(&p, &c, "2.0", 0);
        a.id = Uuid::from_u128(1);
        b.id = Uuid::from_u128(2);
        assert_eq!(resolve_cell(&[&a, &b], None).unwrap().id, b.id);
        assert_eq!(resolve_cell(&[&b, &a], None).unwrap().id, b.id);
    }

    #[test]
    fn test_filtered_cell_matches_exact_label_or_is_empty() {
        let p = product("SAST", 1);
        let c = category("브로슈어", 1);
        let v1 = artifact(&p, &c, "1.0", 0);
        let v2 = artifact(&p, &c, "2.0", 5);
        let candidates = [&v1, &v2];

        let picked = resolve_cell(&candidates, Some("1.0")).unwrap();
        assert_eq!(picked.version_string, "1.0");
        assert!(resolve_cell(&candidates, Some("1")).is_none());
        assert!(resolve_cell(&candidates, Some("3.0")).is_none());
    }

    #[test]
    fn test_empty_cell() {
        assert!(resolve_cell(&[], None).is_none());
        assert!(resolve_cell(&[], Some("1.0")).is_none());
    }

    #[test]
    fn test_distinct_versions_descending_string_order() {
        let versions = distinct_versions(["1.0", "10.0", "2.0", "1.0"]);
        assert_eq!(versions, vec!["2.0", "10.0", "1.0"]);
    }

    #[test]
    fn test_build_rows_orders_and_flags_cells() {
        let p1 = product("Enterprise", 1);
        let p2 = product("SAST", 2);
        let c1 = category("제품소개서", 1);
        let c2 = category("브로슈어", 2);
        let artifacts = vec![
            artifact(&p1, &c1, "1.0.0", 0),
            artifact(&p1, &c1, "1.1.0", 10),
            artifact(&p2, &c2, "3.0", 0),
        ];
        let mut disabled = HashSet::new();
        disabled.insert((p2.id, c1.id));

        let rows = build_rows(
            &[c1.clone(), c2.clone()],
            &[p1.clone(), p2.clone()],
            &artifacts,
            &disabled,
            &HashMap::new(),
        );

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].category.id, c1.id);
        assert_eq!(rows[0].cells.len(), 2);
        assert_eq!(rows[0].cells[0].product_id, p1.id);
        assert_eq!(
            rows[0].cells[0].artifact.as_ref().unwrap().version,
            "1.1.0"
        );
        assert!(!rows[0].cells[0].disabled);
        assert!(rows[0].cells[1].artifact.is_none());
        assert!(rows[0].cells[1].disabled);
        assert!(rows[1].cells[0].artifact.is_none());
        assert_eq!(rows[1].cells[1].artifact.as_ref().unwrap().version, "3.0");
    }

    #[test]
    fn test_build_rows_applies_filter_per_product_only() {
        let p1 = product("Enterprise", 1);
        let p2 = product("SAST", 2);
        let c = category("제품소개서", 1);
        let artifacts = vec![
            artifact(&p1, &c, "1.0.0", 0),
            artifact(&p1, &c, "1.1.0", 10),
            artifact(&p2, &c, "5.0", 0),
            artifact(&p2, &c, "6.0", 10),
        ];
        let mut filters = HashMap::new();
        filters.insert(p1.id, "1.0.0".to_string());

        let rows = build_rows(
            &[c],
            &[p1.clone(), p2.clone()],
            &artifacts,
            &HashSet::new(),
            &filters,
        );
        assert_eq!(rows[0].cells[0].artifact.as_ref().unwrap().version, "1.0.0");
        assert_eq!(rows[0].cells[1].artifact.as_ref().unwrap().version, "6.0");
    }

    #[test]
    fn test_product_version_options() {
        let p1 = product("Enterprise", 1);
        let p2 = product("SAST", 2);
        let c = category("제품소개서", 1);
        let artifacts = vec![
            artifact(&p1, &c, "1.0.0", 0),
            artifact(&p1, &c, "2.0.0", 1),
        ];
        let mut filters = HashMap::new();
        filters.insert(p1.id, "1.0.0".to_string());
        filters.insert(p2.id, String::new());

        let options = product_version_options(&[p1.clone(), p2.clone()], &artifacts, &filters);
        assert_eq!(options[0].versions, vec!["2.0.0", "1.0.0"]);
        assert_eq!(options[0].selected.as_deref(), Some("1.0.0"));
        assert!(options[1].versions.is_empty());
        assert!(options[1].selected.is_none());
    }
}
