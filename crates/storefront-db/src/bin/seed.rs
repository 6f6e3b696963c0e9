//! # Seed Data Generator
//!
//! Populates a development database with store settings, tax rules,
//! shipping and payment methods, and a catalog of products and variants.
//!
//! ## Usage
//! ```bash
//! # 200 products (default) into $STOREFRONT_DB_PATH or ./data/storefront.db
//! cargo run -p storefront-db --bin seed
//!
//! # Custom amount and path
//! cargo run -p storefront-db --bin seed -- --count 1000 --db ./dev.db
//!
//! # More logging
//! RUST_LOG=debug cargo run -p storefront-db --bin seed
//! ```
//!
//! ## Generated Catalog
//! - SKU: `{CATEGORY}-{NAME}-{INDEX}`
//! - Price: 2 500 - 42 500 F CFA, every third product with a discount
//! - Every fourth product sold in colors/sizes (variants carry the stock)
//! - Every fifth product with a wholesale tier from 10 units

use std::env;
use std::sync::Arc;

use chrono::Utc;
use storefront_core::{DiscountType, Product, ProductVariant, SettingValue};
use storefront_db::repository::payment_method::new_payment_method;
use storefront_db::repository::shipping::new_shipping_method;
use storefront_db::repository::tax_rule::new_tax_rule;
use storefront_db::{Database, DbConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Product categories for realistic test data
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "TEX",
        &[
            "Boubou Bazin",
            "Tunique Wax",
            "Chemise Lin",
            "T-Shirt Coton",
            "Pagne Kente",
            "Robe Ankara",
            "Pantalon Toile",
            "Foulard Soie",
        ],
    ),
    (
        "ACC",
        &[
            "Sac Raphia",
            "Sandales Cuir",
            "Bracelet Perles",
            "Chapeau Paille",
            "Ceinture Tressée",
            "Portefeuille Cuir",
        ],
    ),
    (
        "MAI",
        &[
            "Panier Tressé",
            "Coussin Bogolan",
            "Nappe Brodée",
            "Vase Terre Cuite",
            "Lampe Calebasse",
            "Tapis Laine",
        ],
    ),
    (
        "EPI",
        &[
            "Bissap Séché",
            "Café Touba",
            "Beurre Karité",
            "Miel Casamance",
            "Thiakry",
            "Pâte Arachide",
        ],
    ),
];

const COLORS: &[&str] = &["Rouge", "Bleu", "Vert"];
const SIZES: &[&str] = &["S", "M", "L"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,storefront=debug,sqlx=warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut config = DbConfig::from_env()?;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(200);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    config.database_path = args[i + 1].clone().into();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Storefront Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 200)");
                println!("  -d, --db <PATH>    Database file path (default: $STOREFRONT_DB_PATH)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            other => warn!(argument = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    if let Some(parent) = config.database_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    info!(path = %config.database_path.display(), count, "Seeding storefront database");

    let db = Database::new(config).await?;

    let existing = db.catalog().count_active().await?;
    if existing > 0 {
        warn!(
            existing,
            "Database already has products; skipping seed. Delete the file to regenerate."
        );
        return Ok(());
    }

    seed_settings(&db).await?;
    seed_tax_rules(&db).await?;
    seed_shipping_methods(&db).await?;
    seed_payment_methods(&db).await?;

    let start = std::time::Instant::now();
    let (products, variants) = seed_catalog(&db, count).await?;
    let elapsed = start.elapsed();

    info!(
        products,
        variants,
        elapsed_ms = elapsed.as_millis() as u64,
        "Catalog generated"
    );

    let settings = Arc::new(db.load_store_settings().await?);
    let checkout = db.checkout(settings);
    info!(
        store_name = %checkout.settings().store_name,
        currency = %checkout.settings().currency.code,
        "Seed complete"
    );

    db.close().await;
    Ok(())
}

async fn seed_settings(db: &Database) -> Result<(), Box<dyn std::error::Error>> {
    let repo = db.settings();

    repo.set("store_name", &SettingValue::String("Boutique Teranga".into()))
        .await?;
    repo.set(
        "currency",
        &SettingValue::Json(serde_json::json!({
            "code": "XOF",
            "symbol": "F CFA",
            "decimals": 0
        })),
    )
    .await?;
    repo.set("order_number_prefix", &SettingValue::String("BT".into()))
        .await?;
    repo.set("free_shipping_enabled", &SettingValue::Boolean(true))
        .await?;
    repo.set("max_cart_lines", &SettingValue::Float(50.0)).await?;
    repo.set("max_line_quantity", &SettingValue::Float(99.0)).await?;

    info!("Settings seeded");
    Ok(())
}

async fn seed_tax_rules(db: &Database) -> Result<(), Box<dyn std::error::Error>> {
    let repo = db.tax_rules();

    repo.insert(&new_tax_rule("SN", "Sénégal", 1800, true)).await?;

    let mut ci = new_tax_rule("CI", "Côte d'Ivoire", 1800, false);
    ci.min_order_amount = 5_000;
    repo.insert(&ci).await?;

    let mut ml = new_tax_rule("ML", "Mali", 1800, false);
    ml.min_order_amount = 10_000;
    repo.insert(&ml).await?;

    repo.insert(&new_tax_rule("FR", "France", 2000, false)).await?;

    let mut us = new_tax_rule("US", "United States", 0, false);
    us.delivery_allowed = false;
    repo.insert(&us).await?;

    info!(rules = repo.list_all().await?.len(), "Tax rules seeded");
    Ok(())
}

async fn seed_shipping_methods(db: &Database) -> Result<(), Box<dyn std::error::Error>> {
    let repo = db.shipping_methods();

    let mut standard = new_shipping_method("Livraison standard", 2_500, Some(50_000));
    standard.sort_order = 1;
    let mut express = new_shipping_method("Livraison express", 5_000, None);
    express.sort_order = 2;
    let mut pickup = new_shipping_method("Retrait en boutique", 0, None);
    pickup.sort_order = 3;

    for method in [&standard, &express, &pickup] {
        repo.insert(method).await?;
    }

    info!("Shipping methods seeded");
    Ok(())
}

async fn seed_payment_methods(db: &Database) -> Result<(), Box<dyn std::error::Error>> {
    let repo = db.payment_methods();

    for (order, (code, name)) in [
        ("orange_money", "Orange Money"),
        ("wave", "Wave"),
        ("paypal", "PayPal"),
        ("cash_on_delivery", "Paiement à la livraison"),
    ]
    .into_iter()
    .enumerate()
    {
        repo.insert(&new_payment_method(code, name, order as i64))
            .await?;
    }

    info!("Payment methods seeded");
    Ok(())
}

async fn seed_catalog(
    db: &Database,
    count: usize,
) -> Result<(usize, usize), Box<dyn std::error::Error>> {
    let repo = db.catalog();
    let mut products = 0;
    let mut variants = 0;

    for seed in 0..count {
        let (category, names) = CATEGORIES[seed % CATEGORIES.len()];
        let name = names[(seed / CATEGORIES.len()) % names.len()];
        let round = seed / (CATEGORIES.len() * names.len());

        let product = generate_product(category, name, round, seed);

        if let Err(e) = repo.insert_product(&product).await {
            warn!(sku = %product.sku, error = %e, "Failed to insert product");
            continue;
        }
        products += 1;

        if seed % 4 == 0 {
            for variant in generate_variants(&product, seed) {
                match repo.insert_variant(&variant).await {
                    Ok(_) => variants += 1,
                    Err(e) => warn!(sku = %variant.sku, error = %e, "Failed to insert variant"),
                }
            }
        }

        if products % 100 == 0 {
            info!(products, "Generating products...");
        }
    }

    Ok((products, variants))
}

/// Generates a single product with realistic data.
fn generate_product(category: &str, name: &str, round: usize, seed: usize) -> Product {
    let now = Utc::now();

    let short: String = name
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .take(4)
        .collect::<String>()
        .to_uppercase();
    let sku = format!("{}-{}-{:04}", category, short, seed);

    // 2 500 - 42 500, rounded to 500
    let sale_price = 2_500 + ((seed * 37 + round * 11) % 81) as i64 * 500;
    let purchase_cost = sale_price * (55 + (seed % 20) as i64) / 100;

    let (discount_type, discount_value) = match seed % 6 {
        0 => (DiscountType::Percentage, 1000),
        3 => (DiscountType::Fixed, 500),
        _ => (DiscountType::Fixed, 0),
    };

    let (wholesale_price, wholesale_minimum_qty) = if seed % 5 == 0 {
        (Some(sale_price * 85 / 100), Some(10))
    } else {
        (None, None)
    };

    let label = if round == 0 {
        name.to_string()
    } else {
        format!("{} #{}", name, round + 1)
    };

    Product {
        id: Uuid::new_v4().to_string(),
        sku,
        name: label,
        purchase_cost,
        sale_price,
        wholesale_price,
        wholesale_minimum_qty,
        discount_type,
        discount_value,
        available_quantity: (seed % 60) as i64,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

/// One variant per color/size pair; larger sizes cost a little more.
fn generate_variants(product: &Product, seed: usize) -> Vec<ProductVariant> {
    let now = Utc::now();

    COLORS
        .iter()
        .flat_map(|color| SIZES.iter().enumerate().map(move |(idx, size)| (color, idx, size)))
        .map(|(color, idx, size)| ProductVariant {
            id: Uuid::new_v4().to_string(),
            product_id: product.id.clone(),
            sku: format!("{}-{}-{}", product.sku, &color[..1].to_uppercase(), size),
            color: Some(color.to_string()),
            size: Some(size.to_string()),
            sale_price: product.sale_price + idx as i64 * 500,
            wholesale_price: product.wholesale_price.map(|w| w + idx as i64 * 400),
            available_quantity: ((seed + idx * 7) % 15) as i64,
            created_at: now,
            updated_at: now,
        })
        .collect()
}
