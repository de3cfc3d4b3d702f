//! Taxonomy service.
//!
//! Countries, products, categories, product versions and disabled cells.

use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::error::{is_unique_violation, AppError, Result};
use crate::models::taxonomy::{Category, Country, Department, DisabledCell, Product, ProductVersion};

const DISABLED_CELL_TRIPLE: &str = "uq_disabled_cells_triple";
const ONE_ACTIVE_VERSION: &str = "idx_product_versions_one_active";

/// Create or update request for a product
#[derive(Debug, Clone)]
pub struct ProductInput {
    pub name: String,
    pub color_class: String,
    pub display_order: i32,
}

/// Create or update request for a category
#[derive(Debug, Clone)]
pub struct CategoryInput {
    pub name: String,
    pub department: Department,
    pub display_order: i32,
}

fn required_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }
    Ok(name.to_string())
}

fn map_name_conflict(e: sqlx::Error, kind: &str, name: &str) -> AppError {
    match &e {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
            AppError::Conflict(format!("{} '{}' already exists", kind, name))
        }
        _ => AppError::from(e),
    }
}

/// Taxonomy service
pub struct TaxonomyService {
    db: PgPool,
}

impl TaxonomyService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list_countries(&self) -> Result<Vec<Country>> {
        let rows = sqlx::query_as::<_, Country>(
            "SELECT id, code, name, flag_emoji, display_order FROM countries ORDER BY display_order, code",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    pub async fn list_products(&self) -> Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, Product>(
            "SELECT id, name, color_class, display_order FROM products ORDER BY display_order, name",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    pub async fn get_product(&self, id: Uuid) -> Result<Product> {
        sqlx::query_as::<_, Product>(
            "SELECT id, name, color_class, display_order FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query_as::<_, Category>(
            "SELECT id, name, department, display_order FROM categories ORDER BY display_order, name",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    pub async fn get_category(&self, id: Uuid) -> Result<Category> {
        sqlx::query_as::<_, Category>(
            "SELECT id, name, department, display_order FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))
    }

    pub async fn create_product(&self, input: &ProductInput) -> Result<Product> {
        let name = required_name(&input.name)?;
        let color_class = input.color_class.trim();
        if color_class.is_empty() {
            return Err(AppError::Validation("Color class is required".to_string()));
        }
        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (name, color_class, display_order)
            VALUES ($1, $2, $3)
            RETURNING id, name, color_class, display_order
            "#,
        )
        .bind(&name)
        .bind(color_class)
        .bind(input.display_order)
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_name_conflict(e, "Product", &name))?;

        info!(product_id = %product.id, name = %product.name, "Product created");
        Ok(product)
    }

    pub async fn update_product(&self, id: Uuid, input: &ProductInput) -> Result<Product> {
        let name = required_name(&input.name)?;
        let color_class = input.color_class.trim();
        if color_class.is_empty() {
            return Err(AppError::Validation("Color class is required".to_string()));
        }
        sqlx::query_as::<_, Product>(
            r#"
            UPDATE products SET name = $2, color_class = $3, display_order = $4
            WHERE id = $1
            RETURNING id, name, color_class, display_order
            "#,
        )
        .bind(id)
        .bind(&name)
        .bind(color_class)
        .bind(input.display_order)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| map_name_conflict(e, "Product", &name))?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
    }

    /// Delete a product that has no artifacts.
    pub async fn delete_product(&self, id: Uuid) -> Result<()> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM artifacts WHERE product_id = $1")
            .bind(id)
            .fetch_one(&self.db)
            .await?;
        if count > 0 {
            return Err(AppError::Conflict(format!(
                "Product still has {} document(s)",
                count
            )));
        }
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Product not found".to_string()));
        }
        info!(product_id = %id, "Product deleted");
        Ok(())
    }

    pub async fn create_category(&self, input: &CategoryInput) -> Result<Category> {
        let name = required_name(&input.name)?;
        let category = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (name, department, display_order)
            VALUES ($1, $2, $3)
            RETURNING id, name, department, display_order
            "#,
        )
        .bind(&name)
        .bind(input.department.as_str())
        .bind(input.display_order)
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_name_conflict(e, "Category", &name))?;

        info!(category_id = %category.id, name = %category.name, "Category created");
        Ok(category)
    }

    pub async fn update_category(&self, id: Uuid, input: &CategoryInput) -> Result<Category> {
        let name = required_name(&input.name)?;
        sqlx::query_as::<_, Category>(
            r#"
            UPDATE categories SET name = $2, department = $3, display_order = $4
            WHERE id = $1
            RETURNING id, name, department, display_order
            "#,
        )
        .bind(id)
        .bind(&name)
        .bind(input.department.as_str())
        .bind(input.display_order)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| map_name_conflict(e, "Category", &name))?
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))
    }

    /// Delete a category that has no artifacts.
    pub async fn delete_category(&self, id: Uuid) -> Result<()> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM artifacts WHERE category_id = $1")
                .bind(id)
                .fetch_one(&self.db)
                .await?;
        if count > 0 {
            return Err(AppError::Conflict(format!(
                "Category still has {} document(s)",
                count
            )));
        }
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Category not found".to_string()));
        }
        info!(category_id = %id, "Category deleted");
        Ok(())
    }

    pub async fn list_product_versions(&self, product_id: Uuid) -> Result<Vec<ProductVersion>> {
        let rows = sqlx::query_as::<_, ProductVersion>(
            r#"
            SELECT id, product_id, version_number, is_active, created_at
            FROM product_versions
            WHERE product_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    /// Add a version to a product. An active version replaces the current
    /// active one in the same transaction.
    pub async fn create_product_version(
        &self,
        product_id: Uuid,
        version_number: &str,
        is_active: bool,
    ) -> Result<ProductVersion> {
        let version_number = version_number.trim();
        if version_number.is_empty() {
            return Err(AppError::Validation("Version is required".to_string()));
        }
        self.get_product(product_id).await?;

        let mut tx = self.db.begin().await?;
        if is_active {
            sqlx::query("UPDATE product_versions SET is_active = false WHERE product_id = $1 AND is_active")
                .bind(product_id)
                .execute(&mut *tx)
                .await?;
        }
        let version = sqlx::query_as::<_, ProductVersion>(
            r#"
            INSERT INTO product_versions (product_id, version_number, is_active)
            VALUES ($1, $2, $3)
            RETURNING id, product_id, version_number, is_active, created_at
            "#,
        )
        .bind(product_id)
        .bind(version_number)
        .bind(is_active)
        .fetch_one(&mut *tx)
        .await
        .map_err(active_version_conflict)?;
        tx.commit().await?;

        Ok(version)
    }

    /// Make `version_id` the product's only active version.
    pub async fn set_active_version(&self, version_id: Uuid) -> Result<ProductVersion> {
        let mut tx = self.db.begin().await?;
        let product_id: Uuid = sqlx::query_scalar(
            "SELECT product_id FROM product_versions WHERE id = $1 FOR UPDATE",
        )
        .bind(version_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Product version not found".to_string()))?;

        sqlx::query(
            "UPDATE product_versions SET is_active = false WHERE product_id = $1 AND id <> $2 AND is_active",
        )
        .bind(product_id)
        .bind(version_id)
        .execute(&mut *tx)
        .await?;

        let version = sqlx::query_as::<_, ProductVersion>(
            r#"
            UPDATE product_versions SET is_active = true WHERE id = $1
            RETURNING id, product_id, version_number, is_active, created_at
            "#,
        )
        .bind(version_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(active_version_conflict)?;
        tx.commit().await?;

        info!(product_id = %product_id, version = %version.version_number, "Active version changed");
        Ok(version)
    }

    pub async fn list_disabled_cells(&self, country_id: Uuid) -> Result<Vec<DisabledCell>> {
        let rows = sqlx::query_as::<_, DisabledCell>(
            r#"
            SELECT id, country_id, product_id, category_id, created_by, created_at
            FROM disabled_cells
            WHERE country_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(country_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    /// Flip the disabled flag of a cell and return the new state.
    pub async fn toggle_disabled_cell(
        &self,
        country_id: Uuid,
        product_id: Uuid,
        category_id: Uuid,
        actor_id: Uuid,
    ) -> Result<bool> {
        let mut tx = self.db.begin().await?;
        let removed = sqlx::query(
            r#"
            DELETE FROM disabled_cells
            WHERE country_id = $1 AND product_id = $2 AND category_id = $3
            "#,
        )
        .bind(country_id)
        .bind(product_id)
        .bind(category_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let disabled = if removed > 0 {
            false
        } else {
            sqlx::query(
                r#"
                INSERT INTO disabled_cells (country_id, product_id, category_id, created_by)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(country_id)
            .bind(product_id)
            .bind(category_id)
            .bind(actor_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e, DISABLED_CELL_TRIPLE) {
                    AppError::Conflict("Cell was toggled concurrently, retry".to_string())
                } else {
                    AppError::from(e)
                }
            })?;
            true
        };
        tx.commit().await?;

        info!(
            country_id = %country_id,
            product_id = %product_id,
            category_id = %category_id,
            disabled,
            "Disabled cell toggled"
        );
        Ok(disabled)
    }
}

fn active_version_conflict(e: sqlx::Error) -> AppError {
    if is_unique_violation(&e, ONE_ACTIVE_VERSION) {
        AppError::Conflict("Another version was activated concurrently".to_string())
    } else {
        AppError::from(e)
    }
}
