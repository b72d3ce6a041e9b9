mod common;

use axum_test::TestServer;
use marketplace_pricing::handlers;
use marketplace_pricing::repository::{PricingFields, VariantRecord};
use marketplace_pricing::services::attributes::VariantAttributes;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

use crate::common::{simple_product, test_app, StaticRateProvider};

fn server(app: &common::TestApp) -> TestServer {
    TestServer::new(handlers::router(app.state.clone())).unwrap()
}

#[tokio::test]
async fn test_latest_rates_before_first_fetch() {
    let app = test_app(StaticRateProvider::new(&[("EUR", dec!(0.92))]));
    let server = server(&app);

    let response = server.get("/api/exchange-rates/latest").await;
    response.assert_status_ok();

    let json: Value = response.json();
    assert_eq!(json["available"], json!(false));
    assert_eq!(json["message"], json!("No exchange rates available yet"));
}

#[tokio::test]
async fn test_refresh_then_latest_and_quote() {
    let app = test_app(StaticRateProvider::new(&[("EUR", dec!(0.92)), ("GBP", dec!(0.79))]));
    let server = server(&app);

    let refresh: Value = server.post("/api/admin/exchange-rates/refresh").await.json();
    assert_eq!(refresh["success"], json!(true));
    assert_eq!(refresh["rates_count"], json!(2));
    assert_eq!(app.rates.snapshot_count(), 1);

    let latest: Value = server.get("/api/exchange-rates/latest").await.json();
    assert_eq!(latest["available"], json!(true));
    assert_eq!(latest["base"], json!("USD"));
    assert_eq!(latest["date"], json!("2026-10-01"));
    assert!(latest["rates"].get("EUR").is_some());

    let by_date = server.get("/api/exchange-rates/2026-10-01").await;
    by_date.assert_status_ok();

    let quote: Value = server
        .get("/api/prices/quote")
        .add_query_param("amount", "100")
        .add_query_param("currency", "eur")
        .await
        .json();
    assert_eq!(quote["currency"], json!("EUR"));
    assert_eq!(quote["formatted"], json!("92.00 €"));
    assert_eq!(quote["rate_unavailable"], json!(false));

    // 100 * 0.79 = 79, ENDING_9 lands on 79.99
    let pound: Value = server
        .get("/api/prices/quote")
        .add_query_param("amount", "100")
        .add_query_param("currency", "GBP")
        .await
        .json();
    assert_eq!(pound["formatted"], json!("£79.99"));
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_snapshot_out() {
    let app = test_app(StaticRateProvider::down());
    let server = server(&app);

    let refresh = server.post("/api/admin/exchange-rates/refresh").await;
    refresh.assert_status_ok();

    let json: Value = refresh.json();
    assert_eq!(json["success"], json!(false));
    assert_eq!(json["status"], json!("failed"));
    assert!(!json["errors"].as_array().unwrap().is_empty());
    assert_eq!(app.rates.snapshot_count(), 0);
}

#[tokio::test]
async fn test_quote_without_rate_falls_back_to_base() {
    let app = test_app(StaticRateProvider::new(&[]));
    let server = server(&app);

    let quote: Value = server
        .get("/api/prices/quote")
        .add_query_param("amount", "1234.5")
        .add_query_param("currency", "EUR")
        .await
        .json();

    assert_eq!(quote["currency"], json!("USD"));
    assert_eq!(quote["formatted"], json!("$1,234.50"));
    assert_eq!(quote["rate_unavailable"], json!(true));
}

#[tokio::test]
async fn test_quote_too_large_to_convert_falls_back_to_base() {
    let app = test_app(StaticRateProvider::new(&[("EUR", dec!(1.5))]));
    let server = server(&app);
    server.post("/api/admin/exchange-rates/refresh").await.assert_status_ok();

    let response = server
        .get("/api/prices/quote")
        .add_query_param("amount", "79228162514264337593543950335")
        .add_query_param("currency", "EUR")
        .await;

    response.assert_status_ok();
    let quote: Value = response.json();
    assert_eq!(quote["currency"], json!("USD"));
    assert_eq!(quote["rate_unavailable"], json!(true));
}

#[tokio::test]
async fn test_quote_rejects_bad_amount() {
    let app = test_app(StaticRateProvider::new(&[]));
    let server = server(&app);

    let response = server
        .get("/api/prices/quote")
        .add_query_param("amount", "lots")
        .add_query_param("currency", "EUR")
        .expect_failure()
        .await;

    response.assert_status_bad_request();
    let json: Value = response.json();
    assert!(json["error"].as_str().unwrap().contains("Invalid amount"));
}

#[tokio::test]
async fn test_demand_events_and_recalculation_job() {
    let app = test_app(StaticRateProvider::new(&[]));
    app.catalog.insert_product(simple_product(7, dec!(100), 500));
    let server = server(&app);

    for _ in 0..25 {
        server
            .post("/api/products/7/events")
            .json(&json!({ "kind": "sale" }))
            .await
            .assert_status_ok();
    }

    let last: Value = server
        .post("/api/products/7/events")
        .json(&json!({ "kind": "view" }))
        .await
        .json();
    assert_eq!(last["signals"]["sales_24h"], json!(25));
    assert_eq!(last["dynamic_markup_pct"], json!(20));

    let run: Value = server
        .post("/api/admin/jobs/price_recalculation/run")
        .await
        .json();
    assert_eq!(run["job"], json!("price_recalculation"));
    assert_eq!(run["result"], json!("completed"));
    assert_eq!(run["outcome"]["counts"]["products_updated"], json!(1));

    let product = app.catalog.product(7).unwrap();
    assert_eq!(product.pricing.dynamic_markup_pct, dec!(20));
    assert_eq!(product.pricing.final_price, dec!(130));

    let price: Value = server
        .get("/api/products/7/price")
        .add_query_param("currency", "USD")
        .await
        .json();
    assert_eq!(price["display"]["formatted"], json!("$130.00"));
}

#[tokio::test]
async fn test_product_price_for_selected_variant() {
    let app = test_app(StaticRateProvider::new(&[]));
    let mut parent = simple_product(3, dec!(40), 12);
    parent.has_variants = true;
    app.catalog.insert_product(parent);

    for (id, color, price) in [(30, "Red", dec!(45)), (31, "Écru", dec!(55))] {
        let mut pricing = PricingFields::new(price);
        pricing.final_price = price;
        app.catalog.insert_variant(VariantRecord {
            id,
            product_id: 3,
            sku: format!("TEE-{}", id),
            attributes: VariantAttributes::from_pairs([("size", "M"), ("color", color)]),
            pricing,
            stock: 6,
            is_active: true,
        });
    }
    let server = server(&app);

    let price: Value = server
        .get("/api/products/3/price")
        .add_query_param("color", "écru")
        .await
        .json();
    assert_eq!(price["variant_id"], json!(31));
    assert_eq!(price["sku"], json!("TEE-31"));
    assert_eq!(price["display"]["formatted"], json!("$55.00"));

    server
        .get("/api/products/3/price")
        .add_query_param("color", "green")
        .expect_failure()
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_event_for_unknown_product_is_404() {
    let app = test_app(StaticRateProvider::new(&[]));
    let server = server(&app);

    server
        .post("/api/products/999/events")
        .json(&json!({ "kind": "view" }))
        .expect_failure()
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_job_listing_and_unknown_job() {
    let app = test_app(StaticRateProvider::down());
    let server = server(&app);

    let failed: Value = server
        .post("/api/admin/jobs/exchange_rate_refresh/run")
        .await
        .json();
    assert_eq!(failed["result"], json!("failed"));

    let jobs: Value = server.get("/api/admin/jobs").await.json();
    let jobs = jobs["jobs"].as_array().unwrap();
    assert_eq!(jobs.len(), 2);

    let refresh = jobs
        .iter()
        .find(|j| j["name"] == json!("exchange_rate_refresh"))
        .unwrap();
    assert_eq!(refresh["run_count"], json!(1));
    assert_eq!(refresh["failure_count"], json!(1));
    assert_eq!(refresh["is_running"], json!(false));
    assert!(refresh["last_error"].as_str().unwrap().contains("connection refused"));

    server
        .post("/api/admin/jobs/nope/run")
        .expect_failure()
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_router_serves_health_and_job_list() {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    let app = test_app(StaticRateProvider::new(&[]));
    let router = handlers::router(app.state.clone());

    let response = router
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/admin/jobs")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();
    let names: Vec<&str> = json["jobs"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|j| j["name"].as_str())
        .collect();
    assert_eq!(names, vec!["exchange_rate_refresh", "price_recalculation"]);
}
