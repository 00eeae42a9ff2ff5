use crate::errors::{AppError, ResultExt};
use crate::models::{
    FaqItem, NewChatMessage, Product, ProductCreate, ProductFilter, StoredChatMessage,
};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

/// Columns selected for a product, cast to the Rust-side types.
const PRODUCT_COLUMNS: &str = "id, name, bank, loan_type::text AS loan_type, \
     rate_apr::float8 AS rate_apr, min_income::float8 AS min_income, \
     min_credit_score::int4 AS min_credit_score, \
     tenure_min_months::int4 AS tenure_min_months, tenure_max_months::int4 AS tenure_max_months, \
     processing_fee_pct::float8 AS processing_fee_pct, prepayment_allowed, \
     disbursal_speed::text AS disbursal_speed, docs_level::text AS docs_level, \
     limited_offer, summary, faq, terms, created_at";

/// Raw `products` row. Nullable columns fall back to catalog defaults.
#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    bank: String,
    loan_type: String,
    rate_apr: f64,
    min_income: f64,
    min_credit_score: i32,
    tenure_min_months: Option<i32>,
    tenure_max_months: Option<i32>,
    processing_fee_pct: Option<f64>,
    prepayment_allowed: Option<bool>,
    disbursal_speed: Option<String>,
    docs_level: Option<String>,
    limited_offer: Option<bool>,
    summary: Option<String>,
    faq: Option<Json<Vec<FaqItem>>>,
    terms: Option<Json<Map<String, Value>>>,
    created_at: Option<DateTime<Utc>>,
}

impl TryFrom<ProductRow> for Product {
    type Error = String;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let product = Product {
            id: row.id,
            name: row.name,
            bank: row.bank,
            loan_type: row.loan_type.parse()?,
            rate_apr: row.rate_apr,
            min_income: row.min_income,
            min_credit_score: row.min_credit_score,
            tenure_min_months: row.tenure_min_months.unwrap_or(6),
            tenure_max_months: row.tenure_max_months.unwrap_or(60),
            processing_fee_pct: row.processing_fee_pct.unwrap_or(0.0),
            prepayment_allowed: row.prepayment_allowed.unwrap_or(true),
            disbursal_speed: row
                .disbursal_speed
                .map(|s| s.parse())
                .transpose()?
                .unwrap_or_default(),
            docs_level: row
                .docs_level
                .map(|s| s.parse())
                .transpose()?
                .unwrap_or_default(),
            limited_offer: row.limited_offer.unwrap_or(false),
            summary: row.summary,
            faq: row.faq.map(|Json(faq)| faq).unwrap_or_default(),
            terms: row.terms.map(|Json(terms)| terms).unwrap_or_default(),
            created_at: row.created_at,
        };
        product.validate()?;
        Ok(product)
    }
}

fn into_product(row: ProductRow) -> Result<Product, AppError> {
    let id = row.id;
    Product::try_from(row).map_err(|e| {
        AppError::InternalError(format!("Invalid product structure in DB ({}): {}", id, e))
    })
}

/// Escapes `%`, `_` and `\` so user input matches literally inside ILIKE.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    qb.push(" WHERE TRUE");
    if let Some(ref bank) = filter.bank {
        qb.push(" AND bank ILIKE ")
            .push_bind(format!("%{}%", escape_like(bank.trim())));
    }
    if let Some(loan_type) = filter.loan_type {
        qb.push(" AND loan_type::text = ").push_bind(loan_type.as_str());
    }
    if let Some(apr_min) = filter.apr_min {
        qb.push(" AND rate_apr >= ").push_bind(apr_min);
    }
    if let Some(apr_max) = filter.apr_max {
        qb.push(" AND rate_apr <= ").push_bind(apr_max);
    }
    if let Some(min_income) = filter.min_income {
        qb.push(" AND min_income >= ").push_bind(min_income);
    }
    if let Some(min_credit_score) = filter.min_credit_score {
        qb.push(" AND min_credit_score >= ").push_bind(min_credit_score);
    }
}

/// Read/write access to the product catalog.
#[derive(Clone)]
pub struct CatalogStorage {
    pool: PgPool,
}

impl CatalogStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// One page of products matching `filter`, plus the total match count.
    pub async fn list_products(
        &self,
        filter: &ProductFilter,
    ) -> Result<(Vec<Product>, i64), AppError> {
        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
        push_filters(&mut count_qb, filter);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .context("counting products")?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM products", PRODUCT_COLUMNS));
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY created_at ASC NULLS LAST, id ASC LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);

        let rows: Vec<ProductRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .context("listing products")?;

        let products = rows
            .into_iter()
            .map(into_product)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!("Listed {} of {} products", products.len(), total);
        Ok((products, total))
    }

    /// Whole catalog in a stable order (creation time, then id).
    pub async fn all_products(&self) -> Result<Vec<Product>, AppError> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {} FROM products ORDER BY created_at ASC NULLS LAST, id ASC",
            PRODUCT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .context("loading catalog")?;

        rows.into_iter().map(into_product).collect()
    }

    pub async fn get_product(&self, id: Uuid) -> Result<Option<Product>, AppError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {} FROM products WHERE id = $1",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("loading product {}", id))?;

        row.map(into_product).transpose()
    }

    /// Inserts a validated product and returns it as stored.
    pub async fn create_product(&self, new: &ProductCreate) -> Result<Product, AppError> {
        new.validate().map_err(AppError::BadRequest)?;

        let row: ProductRow = sqlx::query_as(&format!(
            "INSERT INTO products (
                name, bank, loan_type, rate_apr, min_income, min_credit_score,
                tenure_min_months, tenure_max_months, processing_fee_pct, prepayment_allowed,
                disbursal_speed, docs_level, limited_offer, summary, faq, terms
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
             RETURNING {}",
            PRODUCT_COLUMNS
        ))
        .bind(&new.name)
        .bind(&new.bank)
        .bind(new.loan_type.as_str())
        .bind(new.rate_apr)
        .bind(new.min_income)
        .bind(new.min_credit_score)
        .bind(new.tenure_min_months)
        .bind(new.tenure_max_months)
        .bind(new.processing_fee_pct)
        .bind(new.prepayment_allowed)
        .bind(new.disbursal_speed.as_str())
        .bind(new.docs_level.as_str())
        .bind(new.limited_offer)
        .bind(&new.summary)
        .bind(Json(&new.faq))
        .bind(Json(&new.terms))
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("creating product '{}'", new.name))?;

        let product = into_product(row)?;
        tracing::info!("Created product {} ({})", product.id, product.name);
        Ok(product)
    }
}

/// Append-only log of AI chat messages.
#[derive(Clone)]
pub struct ChatStorage {
    pool: PgPool,
}

impl ChatStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Appends messages in one transaction, in the order given.
    pub async fn insert_messages(&self, messages: &[NewChatMessage]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        for msg in messages {
            sqlx::query(
                "INSERT INTO ai_chat_messages (user_id, anon_id, product_id, role, content, ip_address)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(msg.user_id)
            .bind(&msg.anon_id)
            .bind(msg.product_id)
            .bind(msg.role.as_str())
            .bind(&msg.content)
            .bind(&msg.ip_address)
            .execute(&mut *tx)
            .await
            .context("inserting chat message")?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn history_for_user(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<Vec<StoredChatMessage>, AppError> {
        let rows = sqlx::query_as::<_, StoredChatMessage>(
            "SELECT id, user_id, anon_id, product_id, role, content, created_at
             FROM ai_chat_messages
             WHERE user_id = $1 AND product_id = $2
             ORDER BY created_at ASC, id ASC",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_all(&self.pool)
        .await
        .context("loading user chat history")?;

        Ok(rows)
    }

    pub async fn history_for_anon(
        &self,
        anon_id: &str,
        product_id: Uuid,
    ) -> Result<Vec<StoredChatMessage>, AppError> {
        let rows = sqlx::query_as::<_, StoredChatMessage>(
            "SELECT id, user_id, anon_id, product_id, role, content, created_at
             FROM ai_chat_messages
             WHERE anon_id = $1 AND product_id = $2
             ORDER BY created_at ASC, id ASC",
        )
        .bind(anon_id)
        .bind(product_id)
        .fetch_all(&self.pool)
        .await
        .context("loading anonymous chat history")?;

        Ok(rows)
    }

    /// Reassigns anonymous messages to `user_id`. Returns the number of rows moved.
    pub async fn merge_anon(&self, anon_id: &str, user_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE ai_chat_messages SET user_id = $1
             WHERE anon_id = $2 AND user_id IS NULL",
        )
        .bind(user_id)
        .bind(anon_id)
        .execute(&self.pool)
        .await
        .context("merging anonymous chat history")?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DisbursalSpeed, LoanType};

    fn row() -> ProductRow {
        ProductRow {
            id: Uuid::new_v4(),
            name: "Edu Saver".to_string(),
            bank: "SBI".to_string(),
            loan_type: "education".to_string(),
            rate_apr: 9.5,
            min_income: 0.0,
            min_credit_score: 600,
            tenure_min_months: None,
            tenure_max_months: None,
            processing_fee_pct: None,
            prepayment_allowed: None,
            disbursal_speed: Some("instant".to_string()),
            docs_level: None,
            limited_offer: None,
            summary: None,
            faq: None,
            terms: None,
            created_at: None,
        }
    }

    #[test]
    fn test_row_conversion_applies_defaults() {
        let product = Product::try_from(row()).unwrap();
        assert_eq!(product.loan_type, LoanType::Education);
        assert_eq!(product.disbursal_speed, DisbursalSpeed::Instant);
        assert_eq!(product.tenure_min_months, 6);
        assert_eq!(product.tenure_max_months, 60);
        assert!(product.prepayment_allowed);
        assert!(product.faq.is_empty());
    }

    #[test]
    fn test_row_conversion_rejects_invalid_rows() {
        let mut bad_enum = row();
        bad_enum.loan_type = "mortgage".to_string();
        assert!(Product::try_from(bad_enum).is_err());

        let mut bad_apr = row();
        bad_apr.rate_apr = 0.0;
        assert!(into_product(bad_apr).is_err());
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("Axis"), "Axis");
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn test_filter_sql() {
        let filter = ProductFilter {
            bank: Some("axis".to_string()),
            loan_type: Some(LoanType::Home),
            apr_max: Some(12.0),
            limit: 25,
            ..Default::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
        push_filters(&mut qb, &filter);
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM products WHERE TRUE AND bank ILIKE $1 AND loan_type::text = $2 AND rate_apr <= $3"
        );
    }
}
