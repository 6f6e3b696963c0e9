//! # Catalog Repository
//!
//! Database operations for products and their variants.
//!
//! ## Key Operations
//! - Product / variant CRUD with field validation
//! - Catalog snapshot loading for checkout
//! - Guarded stock decrements (never below zero)
//!
//! ## Guarded Decrement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Two checkouts race for the last unit                                   │
//! │                                                                         │
//! │  A: UPDATE … SET available_quantity = available_quantity - 1           │
//! │        WHERE id = ? AND available_quantity >= 1   → 1 row  ✓           │
//! │  B: UPDATE … SET available_quantity = available_quantity - 1           │
//! │        WHERE id = ? AND available_quantity >= 1   → 0 rows ✗           │
//! │                                                                         │
//! │  0 rows affected = InsufficientStock, B's transaction rolls back.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;

use chrono::Utc;
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};
use storefront_core::validation::{
    validate_price, validate_product_name, validate_quantity, validate_sku,
};
use storefront_core::{CartLine, CatalogSnapshot, CoreError, Product, ProductVariant};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

/// Largest quantity accepted by a single restock call.
pub const MAX_RESTOCK_QUANTITY: i64 = 1_000_000;

const PRODUCT_SELECT: &str = r#"
    SELECT id, sku, name, purchase_cost, sale_price, wholesale_price,
           wholesale_minimum_qty, discount_type, discount_value,
           available_quantity, is_active, created_at, updated_at
    FROM products
"#;

const VARIANT_SELECT: &str = r#"
    SELECT id, product_id, sku, color, size, sale_price, wholesale_price,
           available_quantity, created_at, updated_at
    FROM product_variants
"#;

/// Repository for product and variant database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.catalog();
///
/// let product = repo.insert_product(&product).await?;
/// repo.insert_variant(&variant).await?;
/// let variants = repo.list_variants(&product.id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Err(DbError::Rejected)` - Invalid SKU, name, price or discount
    /// * `Err(DbError::UniqueViolation)` - SKU already exists
    pub async fn insert_product(&self, product: &Product) -> DbResult<Product> {
        debug!(sku = %product.sku, "Inserting product");

        validate_sku(&product.sku)?;
        validate_product_name(&product.name)?;
        validate_price("purchase_cost", product.purchase_cost)?;
        validate_price("sale_price", product.sale_price)?;
        if let Some(wholesale) = product.wholesale_price {
            validate_price("wholesale_price", wholesale)?;
        }
        product.discount()?;

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, purchase_cost, sale_price, wholesale_price,
                wholesale_minimum_qty, discount_type, discount_value,
                available_quantity, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.purchase_cost)
        .bind(product.sale_price)
        .bind(product.wholesale_price)
        .bind(product.wholesale_minimum_qty)
        .bind(product.discount_type)
        .bind(product.discount_value)
        .bind(product.available_quantity)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sku_conflict(e, &product.sku))?;

        Ok(product.clone())
    }

    /// Inserts a variant of an existing product.
    pub async fn insert_variant(&self, variant: &ProductVariant) -> DbResult<ProductVariant> {
        debug!(sku = %variant.sku, product_id = %variant.product_id, "Inserting variant");

        validate_sku(&variant.sku)?;
        validate_price("sale_price", variant.sale_price)?;
        if let Some(wholesale) = variant.wholesale_price {
            validate_price("wholesale_price", wholesale)?;
        }

        sqlx::query(
            r#"
            INSERT INTO product_variants (
                id, product_id, sku, color, size, sale_price, wholesale_price,
                available_quantity, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&variant.id)
        .bind(&variant.product_id)
        .bind(&variant.sku)
        .bind(&variant.color)
        .bind(&variant.size)
        .bind(variant.sale_price)
        .bind(variant.wholesale_price)
        .bind(variant.available_quantity)
        .bind(variant.created_at)
        .bind(variant.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sku_conflict(e, &variant.sku))?;

        Ok(variant.clone())
    }

    pub async fn get_product(&self, id: &str) -> DbResult<Option<Product>> {
        fetch_product(&self.pool, id).await
    }

    pub async fn get_product_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let sql = format!("{PRODUCT_SELECT} WHERE sku = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    pub async fn get_variant(&self, id: &str) -> DbResult<Option<ProductVariant>> {
        fetch_variant(&self.pool, id).await
    }

    /// Lists the variants of a product, ordered by SKU.
    pub async fn list_variants(&self, product_id: &str) -> DbResult<Vec<ProductVariant>> {
        let sql = format!("{VARIANT_SELECT} WHERE product_id = ?1 ORDER BY sku");
        let variants = sqlx::query_as::<_, ProductVariant>(&sql)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(variants)
    }

    /// Lists active products sorted by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        let sql = format!("{PRODUCT_SELECT} WHERE is_active = 1 ORDER BY name LIMIT ?1");
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = products.len(), "Listed active products");
        Ok(products)
    }

    /// Changes a product's sale and wholesale prices.
    ///
    /// Existing orders keep the prices they were placed at.
    pub async fn update_prices(
        &self,
        id: &str,
        sale_price: i64,
        wholesale_price: Option<i64>,
    ) -> DbResult<()> {
        debug!(id = %id, sale_price, "Updating product prices");

        validate_price("sale_price", sale_price)?;
        if let Some(wholesale) = wholesale_price {
            validate_price("wholesale_price", wholesale)?;
        }

        let result = sqlx::query(
            "UPDATE products SET sale_price = ?2, wholesale_price = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(id)
        .bind(sale_price)
        .bind(wholesale_price)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Replaces a product's discount after checking it is applicable.
    pub async fn update_discount(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, discount_type = ?product.discount_type, "Updating discount");

        product.discount()?;

        let result = sqlx::query(
            "UPDATE products SET discount_type = ?2, discount_value = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(&product.id)
        .bind(product.discount_type)
        .bind(product.discount_value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id));
        }

        Ok(())
    }

    /// Adds units to a product's own stock.
    pub async fn restock_product(&self, id: &str, quantity: i64) -> DbResult<()> {
        debug!(id = %id, quantity, "Restocking product");

        validate_quantity(quantity, MAX_RESTOCK_QUANTITY)?;

        let result = sqlx::query(
            r#"
            UPDATE products
            SET available_quantity = available_quantity + ?2, updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(quantity)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Adds units to a variant's stock.
    pub async fn restock_variant(&self, id: &str, quantity: i64) -> DbResult<()> {
        debug!(id = %id, quantity, "Restocking variant");

        validate_quantity(quantity, MAX_RESTOCK_QUANTITY)?;

        let result = sqlx::query(
            r#"
            UPDATE product_variants
            SET available_quantity = available_quantity + ?2, updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(quantity)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("ProductVariant", id));
        }

        Ok(())
    }

    /// Hides a product from checkout without deleting it.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deactivating product");

        let result = sqlx::query("UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Deletes a product. Its variants go with it; placed orders are untouched.
    pub async fn delete_product(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting product");

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Loads every product and variant a set of cart lines refers to.
    pub async fn load_snapshot(&self, lines: &[CartLine]) -> DbResult<CatalogSnapshot> {
        let mut conn = self.pool.acquire().await?;
        load_snapshot(&mut conn, lines).await
    }

    /// Counts active products (for diagnostics).
    pub async fn count_active(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Executor-generic helpers (shared with the checkout transaction)
// =============================================================================

pub(crate) async fn fetch_product<'e, E>(executor: E, id: &str) -> DbResult<Option<Product>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{PRODUCT_SELECT} WHERE id = ?1");
    let product = sqlx::query_as::<_, Product>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;

    Ok(product)
}

pub(crate) async fn fetch_variant<'e, E>(executor: E, id: &str) -> DbResult<Option<ProductVariant>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{VARIANT_SELECT} WHERE id = ?1");
    let variant = sqlx::query_as::<_, ProductVariant>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;

    Ok(variant)
}

/// Reads the products and variants named by `lines`.
///
/// Unknown ids are left out; quoting reports them as not found.
pub(crate) async fn load_snapshot(
    conn: &mut SqliteConnection,
    lines: &[CartLine],
) -> DbResult<CatalogSnapshot> {
    let mut snapshot = CatalogSnapshot::new();
    let mut seen_products = HashSet::new();
    let mut seen_variants = HashSet::new();

    for line in lines {
        if seen_products.insert(line.product_id.as_str()) {
            if let Some(product) = fetch_product(&mut *conn, &line.product_id).await? {
                snapshot.insert_product(product);
            }
        }

        if let Some(variant_id) = line.variant_id.as_deref() {
            if seen_variants.insert(variant_id) {
                if let Some(variant) = fetch_variant(&mut *conn, variant_id).await? {
                    snapshot.insert_variant(variant);
                }
            }
        }
    }

    debug!(
        products = seen_products.len(),
        variants = seen_variants.len(),
        "Loaded catalog snapshot"
    );
    Ok(snapshot)
}

/// Takes `quantity` units from a product, or from a variant when one is given.
///
/// Fails with `InsufficientStock` when the guard does not match, which
/// happens when another checkout took the units first.
pub(crate) async fn decrement_stock(
    conn: &mut SqliteConnection,
    product_id: &str,
    variant_id: Option<&str>,
    sku: &str,
    quantity: i64,
) -> DbResult<()> {
    let now = Utc::now();

    let (table, id) = match variant_id {
        Some(variant_id) => ("product_variants", variant_id),
        None => ("products", product_id),
    };

    let sql = format!(
        "UPDATE {table} SET available_quantity = available_quantity - ?2, updated_at = ?3 \
         WHERE id = ?1 AND available_quantity >= ?2"
    );

    let result = sqlx::query(&sql)
        .bind(id)
        .bind(quantity)
        .bind(now)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        let available_sql = format!("SELECT available_quantity FROM {table} WHERE id = ?1");
        let available: Option<i64> = sqlx::query_scalar(&available_sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        return Err(CoreError::InsufficientStock {
            sku: sku.to_string(),
            available: available.unwrap_or(0),
            requested: quantity,
        }
        .into());
    }

    debug!(table, id = %id, quantity, "Stock decremented");
    Ok(())
}

fn map_sku_conflict(err: sqlx::Error, sku: &str) -> DbError {
    match DbError::from(err) {
        DbError::UniqueViolation { field, .. } if field.ends_with(".sku") => {
            DbError::duplicate("sku", sku)
        }
        other => other,
    }
}

/// Helper to generate a new catalog ID.
pub fn generate_catalog_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use storefront_core::DiscountType;

    fn product(sku: &str, sale_price: i64, stock: i64) -> Product {
        let now = Utc::now();
        Product {
            id: generate_catalog_id(),
            sku: sku.to_string(),
            name: format!("Product {sku}"),
            purchase_cost: sale_price / 2,
            sale_price,
            wholesale_price: None,
            wholesale_minimum_qty: None,
            discount_type: DiscountType::Fixed,
            discount_value: 0,
            available_quantity: stock,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn variant(product_id: &str, sku: &str, stock: i64) -> ProductVariant {
        let now = Utc::now();
        ProductVariant {
            id: generate_catalog_id(),
            product_id: product_id.to_string(),
            sku: sku.to_string(),
            color: Some("Red".into()),
            size: Some("M".into()),
            sale_price: 1200,
            wholesale_price: None,
            available_quantity: stock,
            created_at: now,
            updated_at: now,
        }
    }

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_get_product() {
        let db = setup().await;
        let repo = db.catalog();

        let mut p = product("TSHIRT", 1000, 5);
        p.discount_type = DiscountType::Percentage;
        p.discount_value = 1000;
        repo.insert_product(&p).await.unwrap();

        let loaded = repo.get_product(&p.id).await.unwrap().unwrap();
        assert_eq!(loaded.sku, "TSHIRT");
        assert_eq!(loaded.discount_type, DiscountType::Percentage);
        assert_eq!(loaded.calculated_final_price().unwrap().minor(), 900);

        let by_sku = repo.get_product_by_sku("TSHIRT").await.unwrap();
        assert_eq!(by_sku.map(|p| p.id), Some(p.id));
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let db = setup().await;
        let repo = db.catalog();

        repo.insert_product(&product("MUG", 500, 1)).await.unwrap();
        let err = repo.insert_product(&product("MUG", 600, 1)).await.unwrap_err();

        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "sku"));
    }

    #[tokio::test]
    async fn test_invalid_discount_rejected_before_insert() {
        let db = setup().await;
        let repo = db.catalog();

        let mut p = product("CAP", 1000, 1);
        p.discount_type = DiscountType::Percentage;
        p.discount_value = 12_000;

        let err = repo.insert_product(&p).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_DISCOUNT_CONFIGURATION");
        assert_eq!(repo.count_active().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_product_cascades_to_variants() {
        let db = setup().await;
        let repo = db.catalog();

        let p = product("TSHIRT", 1000, 0);
        repo.insert_product(&p).await.unwrap();
        let v = variant(&p.id, "TSHIRT-RED-M", 3);
        repo.insert_variant(&v).await.unwrap();
        assert_eq!(repo.list_variants(&p.id).await.unwrap().len(), 1);

        repo.delete_product(&p.id).await.unwrap();

        assert!(repo.get_variant(&v.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_restock_and_guarded_decrement() {
        let db = setup().await;
        let repo = db.catalog();

        let p = product("MUG", 500, 2);
        repo.insert_product(&p).await.unwrap();
        repo.restock_product(&p.id, 3).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        decrement_stock(&mut conn, &p.id, None, "MUG", 5).await.unwrap();

        let err = decrement_stock(&mut conn, &p.id, None, "MUG", 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err.rejection(),
            Some(CoreError::InsufficientStock {
                available: 0,
                requested: 1,
                ..
            })
        ));
        drop(conn);

        let loaded = repo.get_product(&p.id).await.unwrap().unwrap();
        assert_eq!(loaded.available_quantity, 0);
    }

    #[tokio::test]
    async fn test_decrement_targets_variant_stock() {
        let db = setup().await;
        let repo = db.catalog();

        let p = product("TSHIRT", 1000, 10);
        repo.insert_product(&p).await.unwrap();
        let v = variant(&p.id, "TSHIRT-RED-M", 3);
        repo.insert_variant(&v).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        decrement_stock(&mut conn, &p.id, Some(&v.id), &v.sku, 3)
            .await
            .unwrap();
        drop(conn);

        assert_eq!(
            repo.get_variant(&v.id).await.unwrap().unwrap().available_quantity,
            0
        );
        assert_eq!(
            repo.get_product(&p.id).await.unwrap().unwrap().available_quantity,
            10
        );
    }

    #[tokio::test]
    async fn test_restock_rejects_non_positive() {
        let db = setup().await;
        let repo = db.catalog();

        let p = product("MUG", 500, 2);
        repo.insert_product(&p).await.unwrap();

        let err = repo.restock_product(&p.id, 0).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_load_snapshot_skips_unknown_ids() {
        let db = setup().await;
        let repo = db.catalog();

        let p = product("MUG", 500, 2);
        repo.insert_product(&p).await.unwrap();

        let lines = vec![
            CartLine::new(p.id.clone(), None, 1),
            CartLine::new(p.id.clone(), None, 1),
            CartLine::new("missing", None, 1),
        ];
        let snapshot = repo.load_snapshot(&lines).await.unwrap();

        assert!(snapshot.product(&p.id).is_ok());
        assert!(matches!(
            snapshot.product("missing"),
            Err(CoreError::ProductNotFound(_))
        ));
    }
}
