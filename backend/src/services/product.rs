//! Product catalogue service

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use shared::{
    validate_price, CreateProductInput, PaginatedResponse, Pagination, PaginationMeta, Product,
    ProductFilter, UpdateProductInput,
};

/// Product service for the vendor catalogue
#[derive(Clone)]
pub struct ProductService {
    db: PgPool,
}

/// Database row for a product
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    vendor_id: Uuid,
    name: String,
    description: Option<String>,
    category: String,
    price: Decimal,
    unit: String,
    stock_quantity: i32,
    image_url: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            vendor_id: row.vendor_id,
            name: row.name,
            description: row.description,
            category: row.category,
            price: row.price,
            unit: row.unit,
            stock_quantity: row.stock_quantity,
            image_url: row.image_url,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl ProductService {
    /// Create a new ProductService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List active products matching the catalogue filters
    pub async fn list_products(&self, filter: ProductFilter) -> AppResult<PaginatedResponse<Product>> {
        let pagination = Pagination::from_query(filter.page, filter.per_page);
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.replace('%', "\\%").replace('_', "\\_")));

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM products
            WHERE is_active = true
              AND ($1::text IS NULL OR category = $1)
              AND ($2::text IS NULL OR name ILIKE $2)
              AND ($3::uuid IS NULL OR vendor_id = $3)
            "#,
        )
        .bind(&filter.category)
        .bind(&search)
        .bind(filter.vendor_id)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, vendor_id, name, description, category, price, unit,
                   stock_quantity, image_url, is_active, created_at, updated_at
            FROM products
            WHERE is_active = true
              AND ($1::text IS NULL OR category = $1)
              AND ($2::text IS NULL OR name ILIKE $2)
              AND ($3::uuid IS NULL OR vendor_id = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(&filter.category)
        .bind(&search)
        .bind(filter.vendor_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse {
            data: rows.into_iter().map(Product::from).collect(),
            pagination: PaginationMeta::new(pagination, total.max(0) as u64),
        })
    }

    /// Get a product by ID
    pub async fn get_product(&self, product_id: Uuid) -> AppResult<Product> {
        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, vendor_id, name, description, category, price, unit,
                   stock_quantity, image_url, is_active, created_at, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        Ok(row.into())
    }

    /// List a new product for the calling vendor
    pub async fn create_product(
        &self,
        vendor_id: Uuid,
        input: CreateProductInput,
    ) -> AppResult<Product> {
        input.validate()?;
        validate_price(input.price).map_err(|m| AppError::validation("price", m))?;

        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            INSERT INTO products (vendor_id, name, description, category, price, unit,
                                  stock_quantity, image_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, vendor_id, name, description, category, price, unit,
                      stock_quantity, image_url, is_active, created_at, updated_at
            "#,
        )
        .bind(vendor_id)
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(input.category.trim())
        .bind(input.price)
        .bind(&input.unit)
        .bind(input.stock_quantity)
        .bind(&input.image_url)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(product_id = %row.id, %vendor_id, "Product created");
        Ok(row.into())
    }

    /// Update a product owned by the caller
    pub async fn update_product(
        &self,
        user: &AuthUser,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> AppResult<Product> {
        input.validate()?;
        if let Some(price) = input.price {
            validate_price(price).map_err(|m| AppError::validation("price", m))?;
        }

        let product = self.get_product(product_id).await?;
        user.require_owner(product.vendor_id)?;

        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            UPDATE products
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                category = COALESCE($4, category),
                price = COALESCE($5, price),
                unit = COALESCE($6, unit),
                stock_quantity = COALESCE($7, stock_quantity),
                image_url = COALESCE($8, image_url),
                is_active = COALESCE($9, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, vendor_id, name, description, category, price, unit,
                      stock_quantity, image_url, is_active, created_at, updated_at
            "#,
        )
        .bind(product_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.category)
        .bind(input.price)
        .bind(&input.unit)
        .bind(input.stock_quantity)
        .bind(&input.image_url)
        .bind(input.is_active)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        Ok(row.into())
    }

    /// Withdraw a product from the catalogue. Rows are kept because past
    /// orders reference them.
    pub async fn deactivate_product(&self, user: &AuthUser, product_id: Uuid) -> AppResult<()> {
        let product = self.get_product(product_id).await?;
        user.require_owner(product.vendor_id)?;

        sqlx::query("UPDATE products SET is_active = false, updated_at = NOW() WHERE id = $1")
            .bind(product_id)
            .execute(&self.db)
            .await?;

        tracing::info!(%product_id, "Product deactivated");
        Ok(())
    }
}
