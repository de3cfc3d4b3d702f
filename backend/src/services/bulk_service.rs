//! Bulk packaging of a product's documents into one ZIP archive.

use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::sync::Arc;

use bytes::Bytes;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{AppError, Result};
use crate::models::artifact::ArtifactDetail;
use crate::services::artifact_service::ARTIFACT_DETAIL_SELECT;
use crate::services::audit_service::{self, RequestOrigin};
use crate::services::matrix_service::resolve_country;
use crate::services::naming::slugify_or;
use crate::services::taxonomy_service::TaxonomyService;
use crate::storage::StorageBackend;

/// Bulk download request
#[derive(Debug, Clone)]
pub struct BulkRequest {
    pub product_id: Uuid,
    pub country_code: Option<String>,
    pub version: Option<String>,
}

/// Packaged archive ready to be served
#[derive(Debug, Clone)]
pub struct BulkArchive {
    pub filename: String,
    pub content: Bytes,
    /// Artifacts that matched the request
    pub matched: usize,
    /// Artifacts actually written into the archive
    pub packaged: usize,
}

/// `{product-slug}_{country code or Global}_saleskit.zip`
pub fn archive_filename(product_name: &str, country_code: Option<&str>) -> String {
    format!(
        "{}_{}_saleskit.zip",
        slugify_or(product_name, "product"),
        country_code.unwrap_or("Global")
    )
}

/// Archive path for one artifact: `{category-slug}/{filename}`.
pub fn entry_name(category_name: &str, filename: &str) -> String {
    format!("{}/{}", slugify_or(category_name, "category"), filename)
}

/// Write every readable artifact into a deflated ZIP. Blobs that cannot be
/// read are skipped. Returns the archive bytes and the number of entries.
pub async fn build_archive(
    storage: &dyn StorageBackend,
    artifacts: &[ArtifactDetail],
) -> Result<(Vec<u8>, usize)> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut seen = HashSet::new();
    let mut packaged = 0;

    for artifact in artifacts {
        let name = entry_name(&artifact.category_name, artifact.filename());
        if !seen.insert(name.clone()) {
            warn!(artifact_id = %artifact.id, entry = %name, "Skipping duplicate archive entry");
            continue;
        }

        let content = match storage.get(&artifact.storage_key).await {
            Ok(content) => content,
            Err(e) => {
                warn!(
                    artifact_id = %artifact.id,
                    key = %artifact.storage_key,
                    error = %e,
                    "Skipping unreadable artifact"
                );
                continue;
            }
        };

        writer.start_file(name, options)?;
        writer.write_all(&content)?;
        packaged += 1;
    }

    let cursor = writer.finish()?;
    Ok((cursor.into_inner(), packaged))
}

/// Bulk packaging service
pub struct BulkService {
    db: PgPool,
    storage: Arc<dyn StorageBackend>,
    default_country_code: String,
}

impl BulkService {
    pub fn new(
        db: PgPool,
        storage: Arc<dyn StorageBackend>,
        default_country_code: impl Into<String>,
    ) -> Self {
        Self {
            db,
            storage,
            default_country_code: default_country_code.into(),
        }
    }

    /// Package all matching artifacts and log the bulk download.
    pub async fn package(
        &self,
        req: &BulkRequest,
        user_id: Option<Uuid>,
        origin: &RequestOrigin,
    ) -> Result<BulkArchive> {
        let taxonomy = TaxonomyService::new(self.db.clone());
        let product = taxonomy.get_product(req.product_id).await?;
        let countries = taxonomy.list_countries().await?;
        let country = resolve_country(
            &countries,
            req.country_code.as_deref(),
            &self.default_country_code,
        );
        let country_id = country.map(|c| c.id);
        let version = req
            .version
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty());

        let artifacts = self.matching(product.id, country_id, version).await?;
        if artifacts.is_empty() {
            return Err(AppError::NothingToDownload(
                "No documents to download for this product".to_string(),
            ));
        }

        let (content, packaged) = build_archive(self.storage.as_ref(), &artifacts).await?;
        let matched = artifacts.len();

        audit_service::insert_bulk_download(
            &self.db,
            user_id,
            product.id,
            country_id,
            i32::try_from(matched).unwrap_or(i32::MAX),
            origin,
        )
        .await?;

        info!(
            product = %product.name,
            country = ?country.map(|c| c.code.as_str()),
            matched,
            packaged,
            "Bulk archive built"
        );

        Ok(BulkArchive {
            filename: archive_filename(&product.name, country.map(|c| c.code.as_str())),
            content: Bytes::from(content),
            matched,
            packaged,
        })
    }

    async fn matching(
        &self,
        product_id: Uuid,
        country_id: Option<Uuid>,
        version: Option<&str>,
    ) -> Result<Vec<ArtifactDetail>> {
        let sql = format!(
            "{} WHERE a.product_id = $1 \
             AND a.country_id IS NOT DISTINCT FROM $2 \
             AND ($3::text IS NULL OR a.version_string = $3) \
             ORDER BY ca.display_order, ca.name, a.created_at DESC, a.id DESC",
            ARTIFACT_DETAIL_SELECT
        );
        let rows = sqlx::query_as::<_, ArtifactDetail>(&sql)
            .bind(product_id)
            .bind(country_id)
            .bind(version)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }
}
