//! Initial reference data: 4 countries, 10 products and 17 categories.
//!
//! Seeding is idempotent; rows whose natural key already exists are left
//! untouched.

use sqlx::PgPool;
use tracing::info;

use crate::error::Result;

/// (code, name, flag emoji)
pub const COUNTRIES: &[(&str, &str, &str)] = &[
    ("KR", "한국", "🇰🇷"),
    ("US", "미국", "🇺🇸"),
    ("JP", "일본", "🇯🇵"),
    ("ES", "스페인", "🇪🇸"),
];

/// (name, color class)
pub const PRODUCTS: &[(&str, &str)] = &[
    ("Enterprise", "bg-green-500"),
    ("SAST", "bg-red-500"),
    ("SAQT", "bg-indigo-600"),
    ("DAST", "bg-orange-500"),
    ("SCA", "bg-yellow-500"),
    ("P-Cloud", "bg-blue-500"),
    ("G-Cloud", "bg-green-600"),
    ("SecureHub", "bg-blue-600"),
    ("On-Demand", "bg-teal-500"),
    ("MCP", "bg-purple-500"),
];

/// Category names; all start in the consulting department.
pub const CATEGORIES: &[&str] = &[
    "제품소개서",
    "브로슈어",
    "사례집(Use-CASE)",
    "제품비교표",
    "기능비교자료",
    "BM비교자료",
    "시장점유율",
    "설치가이드",
    "사용설명서",
    "사용가이드",
    "관리자가이드",
    "규격서",
    "릴리즈노트",
    "사업계획서",
    "컴플라이언스/가이드",
    "인증서",
    "특허정보",
];

/// Rows inserted by one seeding run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub countries: u64,
    pub products: u64,
    pub categories: u64,
}

/// 1-based display order for the item at `index`.
fn display_order(index: usize) -> i32 {
    i32::try_from(index + 1).unwrap_or(i32::MAX)
}

pub async fn run(db: &PgPool) -> Result<SeedReport> {
    let mut report = SeedReport::default();
    let mut tx = db.begin().await?;

    for (i, (code, name, flag)) in COUNTRIES.iter().enumerate() {
        report.countries += sqlx::query(
            r#"
            INSERT INTO countries (code, name, flag_emoji, display_order)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (code) DO NOTHING
            "#,
        )
        .bind(code)
        .bind(name)
        .bind(flag)
        .bind(display_order(i))
        .execute(&mut *tx)
        .await?
        .rows_affected();
    }

    for (i, (name, color_class)) in PRODUCTS.iter().enumerate() {
        report.products += sqlx::query(
            r#"
            INSERT INTO products (name, color_class, display_order)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(color_class)
        .bind(display_order(i))
        .execute(&mut *tx)
        .await?
        .rows_affected();
    }

    for (i, name) in CATEGORIES.iter().enumerate() {
        report.categories += sqlx::query(
            r#"
            INSERT INTO categories (name, department, display_order)
            VALUES ($1, 'consulting', $2)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(display_order(i))
        .execute(&mut *tx)
        .await?
        .rows_affected();
    }

    tx.commit().await?;
    info!(
        countries = report.countries,
        products = report.products,
        categories = report.categories,
        "Seed data applied"
    );
    Ok(report)
}
