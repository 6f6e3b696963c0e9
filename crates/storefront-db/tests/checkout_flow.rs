//! End-to-end checkout against SQLite: placing orders, recording payments,
//! reloading snapshots and concurrent stock contention.

use std::sync::Arc;

use chrono::Utc;
use storefront_core::money::MAX_MONEY;
use storefront_core::tax::TaxSource;
use storefront_core::{
    CartLine, CheckoutRequest, CoreError, DiscountType, GatewayCallback, GatewayOutcome,
    OrderStatus, PaymentMethod, PaymentStatus, Product, ProductVariant, ShippingAddressInput,
    ShippingMethod, ShippingStatus, StoreSettings, Transactionable, TransactionStatus,
};
use storefront_db::repository::catalog::generate_catalog_id;
use storefront_db::repository::payment_method::new_payment_method;
use storefront_db::repository::shipping::new_shipping_method;
use storefront_db::repository::tax_rule::new_tax_rule;
use storefront_db::{CheckoutService, Database, DbConfig, DbError};

struct Shop {
    db: Database,
    checkout: CheckoutService,
    standard: ShippingMethod,
    paypal: PaymentMethod,
    tshirt: Product,
    red_m: ProductVariant,
    lamp: Product,
}

fn product(sku: &str, name: &str, sale_price: i64, stock: i64) -> Product {
    let now = Utc::now();
    Product {
        id: generate_catalog_id(),
        sku: sku.to_string(),
        name: name.to_string(),
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

async fn open_shop(config: DbConfig) -> Shop {
    let db = Database::new(config).await.unwrap();

    let tax = db.tax_rules();
    tax.insert(&new_tax_rule("SN", "Senegal", 1800, true))
        .await
        .unwrap();
    let mut ci = new_tax_rule("CI", "Côte d'Ivoire", 1800, false);
    ci.min_order_amount = 5_000;
    tax.insert(&ci).await.unwrap();
    let mut us = new_tax_rule("US", "United States", 0, false);
    us.delivery_allowed = false;
    tax.insert(&us).await.unwrap();

    let standard = new_shipping_method("Standard", 2_500, Some(50_000));
    db.shipping_methods().insert(&standard).await.unwrap();

    let paypal = new_payment_method("paypal", "PayPal", 0);
    db.payment_methods().insert(&paypal).await.unwrap();

    let catalog = db.catalog();

    let mut tshirt = product("TSHIRT", "T-Shirt", 1_000, 5);
    tshirt.discount_type = DiscountType::Percentage;
    tshirt.discount_value = 1_000;
    catalog.insert_product(&tshirt).await.unwrap();

    let now = Utc::now();
    let red_m = ProductVariant {
        id: generate_catalog_id(),
        product_id: tshirt.id.clone(),
        sku: "TSHIRT-RED-M".to_string(),
        color: Some("Red".to_string()),
        size: Some("M".to_string()),
        sale_price: 1_200,
        wholesale_price: None,
        available_quantity: 3,
        created_at: now,
        updated_at: now,
    };
    catalog.insert_variant(&red_m).await.unwrap();

    let lamp = product("LAMP", "Lampe Calebasse", 25_000, 10);
    catalog.insert_product(&lamp).await.unwrap();

    let settings = Arc::new(db.load_store_settings().await.unwrap());
    let checkout = db.checkout(settings);

    Shop {
        db,
        checkout,
        standard,
        paypal,
        tshirt,
        red_m,
        lamp,
    }
}

async fn shop() -> Shop {
    open_shop(DbConfig::in_memory()).await
}

fn request(shop: &Shop, country_code: &str, lines: Vec<CartLine>) -> CheckoutRequest {
    CheckoutRequest {
        lines,
        country_code: country_code.to_string(),
        shipping_method_id: shop.standard.id.clone(),
        payment_method_id: shop.paypal.id.clone(),
        shipping_address: None,
        customer_note: None,
    }
}

fn address() -> ShippingAddressInput {
    ShippingAddressInput {
        recipient_name: "Awa Diop".to_string(),
        phone: "+221 77 000 00 00".to_string(),
        address_line: "12 Rue Carnot".to_string(),
        city: "Dakar".to_string(),
        postal_code: Some("10200".to_string()),
        country_code: None,
    }
}

fn callback(id: &str, amount: i64, outcome: GatewayOutcome) -> GatewayCallback {
    GatewayCallback {
        gateway_transaction_id: id.to_string(),
        amount,
        currency_code: "XOF".to_string(),
        outcome,
    }
}

async fn stock_of(shop: &Shop, product_id: &str) -> i64 {
    shop.db
        .catalog()
        .get_product(product_id)
        .await
        .unwrap()
        .unwrap()
        .available_quantity
}

fn rejection(err: &DbError) -> &CoreError {
    err.rejection()
        .unwrap_or_else(|| panic!("expected a business rejection, got {err:?}"))
}

// =============================================================================
// Placing orders
// =============================================================================

#[tokio::test]
async fn test_place_order_snapshots_totals() {
    let shop = shop().await;

    let mut req = request(
        &shop,
        "sn",
        vec![
            CartLine::new(shop.tshirt.id.clone(), None, 2),
            CartLine::new(shop.tshirt.id.clone(), Some(&shop.red_m.id), 1),
        ],
    );
    req.shipping_address = Some(address());
    req.customer_note = Some("  Call before delivery  ".to_string());

    let placed = shop.checkout.place_order(&req).await.unwrap();
    let order = &placed.order;

    assert!(order.order_number.starts_with("S-"));
    assert!(order.order_number.ends_with("-0001"));
    assert_eq!(order.country_code, "SN");
    assert_eq!(order.currency_code, "XOF");
    assert_eq!(order.vat_rate_bps, 1800);

    // 2 × 900 + 1 × 1080
    assert_eq!(order.total_payable_amount, 2_880);
    assert_eq!(order.total_discount, 320);
    // 324 + round(194.4)
    assert_eq!(order.total_vat_amount, 518);
    assert_eq!(order.shipping_cost, 2_500);
    assert_eq!(order.grand_total().minor(), 5_898);
    assert_eq!(order.total_paid, 0);
    assert_eq!(order.total_due, 5_898);
    assert_eq!(order.payment_status, PaymentStatus::Unpaid);
    assert_eq!(order.order_status, OrderStatus::Pending);
    assert_eq!(order.customer_note.as_deref(), Some("Call before delivery"));

    assert_eq!(placed.details.len(), 2);
    assert_eq!(placed.details[0].unit_price, 900);
    assert_eq!(placed.details[0].unit_vat, 162);
    assert_eq!(placed.details[1].name, "T-Shirt (Red / M)");
    assert_eq!(placed.details[1].unit_price, 1_080);
    assert_eq!(placed.details[1].line_vat, 194);

    let address = placed.shipping_address.as_ref().unwrap();
    assert_eq!(address.country_code, "SN");
    assert_eq!(address.city, "Dakar");

    assert_eq!(stock_of(&shop, &shop.tshirt.id).await, 3);
    let red_m = shop
        .db
        .catalog()
        .get_variant(&shop.red_m.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(red_m.available_quantity, 2);
}

#[tokio::test]
async fn test_reload_is_identical_after_catalog_and_tax_changes() {
    let shop = shop().await;

    let mut req = request(
        &shop,
        "SN",
        vec![
            CartLine::new(shop.tshirt.id.clone(), None, 2),
            CartLine::new(shop.tshirt.id.clone(), Some(&shop.red_m.id), 1),
        ],
    );
    req.shipping_address = Some(address());
    let placed = shop.checkout.place_order(&req).await.unwrap();

    let catalog = shop.db.catalog();
    catalog
        .update_prices(&shop.tshirt.id, 5_000, None)
        .await
        .unwrap();
    let mut no_discount = shop.tshirt.clone();
    no_discount.discount_value = 0;
    catalog.update_discount(&no_discount).await.unwrap();

    let mut sn = shop.db.tax_rules().get_by_country("SN").await.unwrap().unwrap();
    sn.vat_rate_bps = 2_000;
    shop.db.tax_rules().update(&sn).await.unwrap();

    let reloaded = shop
        .db
        .orders()
        .get_with_details(&placed.order.id)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(reloaded.order.order_number, placed.order.order_number);
    assert_eq!(reloaded.order.vat_rate_bps, 1800);
    assert_eq!(reloaded.order.total_payable_amount, placed.order.total_payable_amount);
    assert_eq!(reloaded.order.total_vat_amount, placed.order.total_vat_amount);
    assert_eq!(reloaded.order.shipping_cost, placed.order.shipping_cost);
    assert_eq!(reloaded.order.grand_total(), placed.order.grand_total());
    assert_eq!(reloaded.order.total_due, placed.order.total_due);
    assert_eq!(reloaded.details, placed.details);
    assert_eq!(reloaded.shipping_address, placed.shipping_address);
    assert_eq!(reloaded.details_subtotal(), reloaded.order.total_payable());

    // A fresh quote sees the new prices.
    let quote = shop.checkout.quote(&req).await.unwrap();
    assert_eq!(quote.totals.total_payable_amount.minor(), 2 * 5_000 + 1_200);
    assert_eq!(quote.tax.rate.bps(), 2_000);
}

#[tokio::test]
async fn test_order_numbers_increase() {
    let shop = shop().await;
    let req = request(&shop, "SN", vec![CartLine::new(shop.lamp.id.clone(), None, 1)]);

    let first = shop.checkout.place_order(&req).await.unwrap();
    let second = shop.checkout.place_order(&req).await.unwrap();

    assert!(first.order.order_number.ends_with("-0001"));
    assert!(second.order.order_number.ends_with("-0002"));
    assert_eq!(
        shop.db
            .orders()
            .get_by_number(&second.order.order_number)
            .await
            .unwrap()
            .map(|o| o.id),
        Some(second.order.id)
    );
    assert_eq!(shop.db.orders().list_recent(10).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_free_shipping_threshold() {
    let shop = shop().await;

    // 2 × 25 000 = 50 000: exactly the threshold
    let at_threshold = request(&shop, "SN", vec![CartLine::new(shop.lamp.id.clone(), None, 2)]);
    let quote = shop.checkout.quote(&at_threshold).await.unwrap();
    assert_eq!(quote.totals.shipping_cost.minor(), 0);

    let below = request(&shop, "SN", vec![CartLine::new(shop.lamp.id.clone(), None, 1)]);
    let quote = shop.checkout.quote(&below).await.unwrap();
    assert_eq!(quote.totals.shipping_cost.minor(), 2_500);

    // Store-wide switch off: base price even above the threshold.
    let settings = StoreSettings {
        free_shipping_enabled: false,
        ..StoreSettings::default()
    };
    let no_free = shop.db.checkout(Arc::new(settings));
    let quote = no_free.quote(&at_threshold).await.unwrap();
    assert_eq!(quote.totals.shipping_cost.minor(), 2_500);
}

// =============================================================================
// Rejections
// =============================================================================

#[tokio::test]
async fn test_insufficient_stock_rolls_back_everything() {
    let shop = shop().await;

    let req = request(
        &shop,
        "SN",
        vec![
            CartLine::new(shop.tshirt.id.clone(), None, 2),
            CartLine::new(shop.lamp.id.clone(), None, 11),
        ],
    );
    let err = shop.checkout.place_order(&req).await.unwrap_err();

    assert!(matches!(
        rejection(&err),
        CoreError::InsufficientStock {
            sku,
            available: 10,
            requested: 11,
        } if sku == "LAMP"
    ));
    assert_eq!(shop.db.orders().count().await.unwrap(), 0);
    assert_eq!(stock_of(&shop, &shop.tshirt.id).await, 5);
    assert_eq!(stock_of(&shop, &shop.lamp.id).await, 10);

    // Exactly the available quantity is accepted, and the rejected
    // attempt did not consume an order number.
    let ok = request(&shop, "SN", vec![CartLine::new(shop.lamp.id.clone(), None, 10)]);
    let placed = shop.checkout.place_order(&ok).await.unwrap();
    assert!(placed.order.order_number.ends_with("-0001"));
    assert_eq!(stock_of(&shop, &shop.lamp.id).await, 0);
}

#[tokio::test]
async fn test_destination_rules() {
    let shop = shop().await;
    let one_tshirt = || vec![CartLine::new(shop.tshirt.id.clone(), None, 1)];

    let err = shop
        .checkout
        .place_order(&request(&shop, "CI", one_tshirt()))
        .await
        .unwrap_err();
    assert!(matches!(
        rejection(&err),
        CoreError::BelowMinimumOrder { minimum: 5_000, subtotal: 900, .. }
    ));

    let err = shop
        .checkout
        .place_order(&request(&shop, "US", one_tshirt()))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_COUNTRY_FOR_DELIVERY");

    let err = shop
        .checkout
        .place_order(&request(&shop, "S1", one_tshirt()))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_COUNTRY_FOR_DELIVERY");

    // No rule for DE: the default rule's rate applies.
    let quote = shop
        .checkout
        .quote(&request(&shop, "DE", one_tshirt()))
        .await
        .unwrap();
    assert_eq!(quote.tax.source, TaxSource::DefaultRule);
    assert_eq!(quote.tax.rate.bps(), 1800);

    assert_eq!(shop.db.orders().count().await.unwrap(), 0);
    assert_eq!(stock_of(&shop, &shop.tshirt.id).await, 5);
}

#[tokio::test]
async fn test_unavailable_methods_and_bad_address() {
    let shop = shop().await;
    let lines = vec![CartLine::new(shop.tshirt.id.clone(), None, 1)];

    let mut req = request(&shop, "SN", lines.clone());
    req.shipping_method_id = "missing".to_string();
    let err = shop.checkout.place_order(&req).await.unwrap_err();
    assert_eq!(err.code(), "SHIPPING_METHOD_UNAVAILABLE");

    shop.db
        .payment_methods()
        .set_active(&shop.paypal.id, false)
        .await
        .unwrap();
    let err = shop
        .checkout
        .place_order(&request(&shop, "SN", lines.clone()))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "PAYMENT_METHOD_UNAVAILABLE");
    shop.db
        .payment_methods()
        .set_active(&shop.paypal.id, true)
        .await
        .unwrap();

    let mut req = request(&shop, "SN", lines.clone());
    req.shipping_address = Some(ShippingAddressInput {
        country_code: Some("CI".to_string()),
        ..address()
    });
    let err = shop.checkout.place_order(&req).await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    let err = shop
        .checkout
        .place_order(&request(&shop, "SN", Vec::new()))
        .await
        .unwrap_err();
    assert!(matches!(rejection(&err), CoreError::EmptyCart));

    shop.db.catalog().deactivate(&shop.lamp.id).await.unwrap();
    let err = shop
        .checkout
        .place_order(&request(&shop, "SN", vec![CartLine::new(shop.lamp.id.clone(), None, 1)]))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "PRODUCT_UNAVAILABLE");

    assert_eq!(shop.db.orders().count().await.unwrap(), 0);
}

// =============================================================================
// Payments
// =============================================================================

#[tokio::test]
async fn test_payments_partial_paid_refunded() {
    let shop = shop().await;
    let req = request(&shop, "SN", vec![CartLine::new(shop.tshirt.id.clone(), None, 1)]);
    let placed = shop.checkout.place_order(&req).await.unwrap();
    let order_id = placed.order.id.clone();

    // 900 + 162 VAT + 2 500 shipping
    assert_eq!(placed.order.grand_total().minor(), 3_562);

    let first = callback("pp-1", 3_000, GatewayOutcome::Succeeded);
    let order = shop
        .checkout
        .record_gateway_callback(&order_id, &first)
        .await
        .unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Partial);
    assert_eq!(order.total_paid, 3_000);
    assert_eq!(order.total_due, 562);

    // Replaying the same callback changes nothing.
    let replayed = shop
        .checkout
        .record_gateway_callback(&order_id, &first)
        .await
        .unwrap();
    assert_eq!(replayed.total_paid, 3_000);
    let owner = Transactionable::Sell(order_id.clone());
    assert_eq!(shop.db.transactions().list_for(&owner).await.unwrap().len(), 1);

    let order = shop
        .checkout
        .record_gateway_callback(&order_id, &callback("pp-2", 562, GatewayOutcome::Succeeded))
        .await
        .unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert_eq!(order.total_due, 0);

    // Reconciliation is idempotent.
    for _ in 0..2 {
        let again = shop.checkout.reconcile_payments(&order_id).await.unwrap();
        assert_eq!(again.total_paid, 3_562);
        assert_eq!(again.total_due, 0);
        assert_eq!(again.payment_status, PaymentStatus::Paid);
    }

    let order = shop
        .checkout
        .record_refund(&order_id, 1_000, Some("pp-refund-1"))
        .await
        .unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Refunded);
    assert_eq!(order.total_paid, 2_562);
    assert_eq!(order.total_due, 1_000);

    let err = shop
        .checkout
        .record_refund(&order_id, 5_000, None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "PAYMENT_ERROR");

    let reloaded = shop.checkout.get_order(&order_id).await.unwrap();
    assert_eq!(reloaded.order.total_paid, 2_562);
    assert_eq!(
        reloaded.order.total_due,
        reloaded.order.grand_total().minor() - reloaded.order.total_paid
    );
}

#[tokio::test]
async fn test_overpayment_gives_negative_due() {
    let shop = shop().await;
    let req = request(&shop, "SN", vec![CartLine::new(shop.tshirt.id.clone(), None, 1)]);
    let placed = shop.checkout.place_order(&req).await.unwrap();

    let order = shop
        .checkout
        .record_gateway_callback(
            &placed.order.id,
            &callback("pp-over", 4_000, GatewayOutcome::Succeeded),
        )
        .await
        .unwrap();

    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert_eq!(order.total_due, 3_562 - 4_000);
    assert!(order.is_overpaid());
}

#[tokio::test]
async fn test_failed_gateway_payment_is_recorded_and_retryable() {
    let shop = shop().await;
    let req = request(&shop, "SN", vec![CartLine::new(shop.tshirt.id.clone(), None, 1)]);
    let placed = shop.checkout.place_order(&req).await.unwrap();
    let order_id = placed.order.id.clone();

    let failed = callback(
        "pp-declined",
        3_562,
        GatewayOutcome::Failed {
            reason: "card declined".to_string(),
        },
    );
    let err = shop
        .checkout
        .record_gateway_callback(&order_id, &failed)
        .await
        .unwrap_err();
    assert!(matches!(
        rejection(&err),
        CoreError::PaymentGatewayFailure { gateway, reason }
            if gateway == "paypal" && reason == "card declined"
    ));

    let order = shop.db.orders().get_by_id(&order_id).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Unpaid);
    assert_eq!(order.total_paid, 0);

    let owner = Transactionable::Sell(order_id.clone());
    let rows = shop.db.transactions().list_for(&owner).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, TransactionStatus::Failed);
    assert_eq!(rows[0].failure_reason.as_deref(), Some("card declined"));

    // Replaying the failure reports it again without a second row.
    let err = shop
        .checkout
        .record_gateway_callback(&order_id, &failed)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "PAYMENT_GATEWAY_FAILURE");
    assert_eq!(shop.db.transactions().list_for(&owner).await.unwrap().len(), 1);

    let order = shop
        .checkout
        .record_gateway_callback(&order_id, &callback("pp-retry", 3_562, GatewayOutcome::Succeeded))
        .await
        .unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Paid);
}

#[tokio::test]
async fn test_callback_in_other_currency_rejected() {
    let shop = shop().await;
    let req = request(&shop, "SN", vec![CartLine::new(shop.tshirt.id.clone(), None, 1)]);
    let placed = shop.checkout.place_order(&req).await.unwrap();

    let mut eur = callback("pp-eur", 6, GatewayOutcome::Succeeded);
    eur.currency_code = "EUR".to_string();

    let err = shop
        .checkout
        .record_gateway_callback(&placed.order.id, &eur)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "CURRENCY_MISMATCH");

    let owner = Transactionable::Sell(placed.order.id.clone());
    assert!(shop.db.transactions().list_for(&owner).await.unwrap().is_empty());

    let missing = uuid::Uuid::new_v4().to_string();
    let err = shop
        .checkout
        .record_gateway_callback(&missing, &callback("pp-x", 100, GatewayOutcome::Succeeded))
        .await
        .unwrap_err();
    assert!(matches!(rejection(&err), CoreError::OrderNotFound(_)));
}

#[tokio::test]
async fn test_amounts_beyond_money_range_refused() {
    let shop = shop().await;
    let req = request(&shop, "SN", vec![CartLine::new(shop.tshirt.id.clone(), None, 1)]);
    let placed = shop.checkout.place_order(&req).await.unwrap();
    let order_id = placed.order.id.clone();
    let owner = Transactionable::Sell(order_id.clone());

    for (id, amount) in [("pp-huge", MAX_MONEY + 1), ("pp-max", i64::MAX)] {
        let err = shop
            .checkout
            .record_gateway_callback(&order_id, &callback(id, amount, GatewayOutcome::Succeeded))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PAYMENT_ERROR");
    }
    assert!(shop.db.transactions().list_for(&owner).await.unwrap().is_empty());

    let order = shop
        .checkout
        .record_gateway_callback(&order_id, &callback("pp-1", MAX_MONEY, GatewayOutcome::Succeeded))
        .await
        .unwrap();
    assert_eq!(order.total_paid, MAX_MONEY);

    // The second one would push the collected total past the range.
    let err = shop
        .checkout
        .record_gateway_callback(&order_id, &callback("pp-2", MAX_MONEY, GatewayOutcome::Succeeded))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    let rows = shop.db.transactions().list_for(&owner).await.unwrap();
    assert_eq!(rows.len(), 1);
    let order = shop.db.orders().get_by_id(&order_id).await.unwrap().unwrap();
    assert_eq!(order.total_paid, MAX_MONEY);
    assert_eq!(order.total_due, 3_562 - MAX_MONEY);

    let mut gold = product("GOLD", "Lingot", MAX_MONEY + 1, 1);
    let err = shop.db.catalog().insert_product(&gold).await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    gold.sale_price = MAX_MONEY;
    gold.purchase_cost = 0;
    shop.db.catalog().insert_product(&gold).await.unwrap();
}

// =============================================================================
// Status machines
// =============================================================================

#[tokio::test]
async fn test_status_transitions_persist() {
    let shop = shop().await;
    let req = request(&shop, "SN", vec![CartLine::new(shop.lamp.id.clone(), None, 1)]);
    let placed = shop.checkout.place_order(&req).await.unwrap();
    let id = placed.order.id.clone();

    let err = shop
        .checkout
        .update_order_status(&id, OrderStatus::OrderCompleted)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_STATUS_TRANSITION");

    shop.checkout
        .update_order_status(&id, OrderStatus::Processing)
        .await
        .unwrap();
    shop.checkout
        .update_shipping_status(&id, ShippingStatus::InProgress)
        .await
        .unwrap();
    shop.checkout
        .update_order_status(&id, OrderStatus::CancelRequest)
        .await
        .unwrap();

    let err = shop
        .checkout
        .update_order_status(&id, OrderStatus::Processing)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_STATUS_TRANSITION");

    let order = shop.db.orders().get_by_id(&id).await.unwrap().unwrap();
    assert_eq!(order.order_status, OrderStatus::CancelRequest);
    assert_eq!(order.shipping_status, ShippingStatus::InProgress);
}

// =============================================================================
// Concurrency
// =============================================================================

async fn contend_for_lamps(shop: &Shop, buyers: usize, each: i64) -> (usize, usize) {
    let handles: Vec<_> = (0..buyers)
        .map(|_| {
            let checkout = shop.checkout.clone();
            let req = request(shop, "SN", vec![CartLine::new(shop.lamp.id.clone(), None, each)]);
            tokio::spawn(async move { checkout.place_order(&req).await })
        })
        .collect();

    let mut placed = 0;
    let mut refused = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => placed += 1,
            Err(err) => {
                assert!(
                    matches!(rejection(&err), CoreError::InsufficientStock { .. }),
                    "unexpected error: {err}"
                );
                refused += 1;
            }
        }
    }

    (placed, refused)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checkouts_never_oversell() {
    let shop = shop().await;

    // 6 buyers × 2 lamps against 10 in stock
    let (placed, refused) = contend_for_lamps(&shop, 6, 2).await;

    assert_eq!(placed, 5);
    assert_eq!(refused, 1);
    assert_eq!(stock_of(&shop, &shop.lamp.id).await, 0);
    assert_eq!(shop.db.orders().count().await.unwrap(), 5);
}

fn temp_db_path() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("storefront-{}.db", uuid::Uuid::new_v4()))
}

async fn remove_db(db: &Database, path: &std::path::Path) {
    db.close().await;
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checkouts_on_file_database() {
    let path = temp_db_path();
    let shop = open_shop(DbConfig::new(&path).max_connections(4)).await;

    // 8 buyers × 3 lamps against 10 in stock
    let (placed, refused) = contend_for_lamps(&shop, 8, 3).await;

    assert_eq!(placed, 3);
    assert_eq!(refused, 5);
    assert_eq!(stock_of(&shop, &shop.lamp.id).await, 1);

    let numbers: std::collections::HashSet<String> = shop
        .db
        .orders()
        .list_recent(100)
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.order_number)
        .collect();
    assert_eq!(numbers.len(), 3);

    remove_db(&shop.db, &path).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callbacks_on_one_order() {
    let path = temp_db_path();
    let shop = open_shop(DbConfig::new(&path).max_connections(4)).await;

    let req = request(&shop, "SN", vec![CartLine::new(shop.lamp.id.clone(), None, 1)]);
    let placed = shop.checkout.place_order(&req).await.unwrap();
    let order_id = placed.order.id.clone();

    // 25 000 + 4 500 VAT + 2 500 shipping
    assert_eq!(placed.order.grand_total().minor(), 32_000);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let checkout = shop.checkout.clone();
            let order_id = order_id.clone();
            let cb = callback(&format!("wave-{i}"), 4_000, GatewayOutcome::Succeeded);
            tokio::spawn(async move { checkout.record_gateway_callback(&order_id, &cb).await })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let order = shop.db.orders().get_by_id(&order_id).await.unwrap().unwrap();
    assert_eq!(order.total_paid, 32_000);
    assert_eq!(order.total_due, 0);
    assert_eq!(order.payment_status, PaymentStatus::Paid);

    let owner = Transactionable::Sell(order_id);
    assert_eq!(shop.db.transactions().list_for(&owner).await.unwrap().len(), 8);

    remove_db(&shop.db, &path).await;
}
