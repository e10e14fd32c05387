///  To run :
///  cargo r --example client_example
use std::sync::Arc;

use rust_decimal::Decimal;
use shop_client::{ApiError, CheckoutRequest, ShopClient};
use shop_hex::application::Storefront;
use shop_hex::inbound::http::{HttpServer, HttpServerConfig};
use shop_repo::build_repo;
use shop_types::domain::catalog::{Product, ProductStatus};
use shop_types::domain::order::CheckoutDetails;
use shop_types::domain::pricing::PricingConfig;
use shop_types::ports::catalog_repository::CatalogRepository;
use tempfile::tempdir;
use uuid::Uuid;

fn find_free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let port = find_free_port();
    let addr = format!("http://127.0.0.1:{port}/");

    // File-backed SQLite so the seeded catalog and the server share one store.
    let tmp = tempdir()?;
    let db_url = format!("sqlite://{}", tmp.path().join("shop.db").display());
    let repo = Arc::new(build_repo(Some(&db_url)).await?);

    let mut mug = Product::new("Enamel Mug", "enamel-mug", Decimal::new(1250, 2));
    mug.status = ProductStatus::Active;
    mug.stock_quantity = 20;
    let mug = repo.upsert_product(mug).await?;

    let server = HttpServer::new(
        Storefront::new(repo, PricingConfig::default()),
        HttpServerConfig {
            port: port.to_string(),
        },
    )
    .await?;
    let handle = tokio::spawn(async move {
        server.run().await.expect("server run");
    });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let guest = ShopClient::new(&addr)?;
    let added = guest.add_to_cart(mug.id, None, 2).await?;
    println!(
        "{} (count={}, subtotal={})",
        added.message, added.cart_count, added.cart_subtotal
    );
    println!("Guest session token: {:?}", guest.session_token());

    // Guests cannot see order history.
    match guest.list_orders(1).await {
        Ok(_) => println!("Unexpectedly listed orders as a guest"),
        Err(err) => match err.downcast_ref::<ApiError>() {
            Some(api) => println!("Order history refused: {} {}", api.status, api.message),
            None => return Err(err),
        },
    }

    let customer = ShopClient::builder(&addr)?
        .with_customer(Uuid::new_v4())?
        .build()?;
    customer.add_to_cart(mug.id, None, 1).await?;
    let cart = customer.cart().await?;
    println!("Customer cart total={}", cart.totals.total);

    let order = customer
        .checkout(&CheckoutRequest {
            details: CheckoutDetails {
                email: "example@example.com".into(),
                ..Default::default()
            },
            coupon_code: None,
            ..Default::default()
        })
        .await?;
    println!(
        "Placed order {} total={} status={:?}",
        order.order_number, order.total_amount, order.status
    );

    let cancelled = customer.cancel_order(&order.order_number).await?;
    println!("Cancelled order status={:?}", cancelled.status);

    handle.abort();
    Ok(())
}
