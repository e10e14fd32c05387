#![cfg(feature = "memory")]

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use shop_repo::memory::InMemoryRepo;
use shop_types::domain::cart::CartOwner;
use shop_types::domain::catalog::{Product, ProductStatus, ProductVariant};
use shop_types::domain::coupon::{Coupon, DiscountType};
use shop_types::domain::customer::{AddressInput, AddressKind};
use shop_types::domain::order::{Address, AppliedCoupon, CheckoutDetails, Order, OrderStatus};
use shop_types::domain::payment::PaymentWebhook;
use shop_types::domain::pricing::PricingConfig;
use shop_types::ports::address_repository::AddressRepository;
use shop_types::ports::cart_repository::CartRepository;
use shop_types::ports::catalog_repository::CatalogRepository;
use shop_types::ports::coupon_repository::CouponRepository;
use shop_types::ports::order_repository::OrderRepository;
use shop_types::ports::payment_repository::PaymentRepository;
use shop_types::ports::wishlist_repository::WishlistRepository;
use shop_types::ports::RepoError;
use std::sync::Arc;
use uuid::Uuid;

fn product(slug: &str, cents: i64) -> Product {
    let mut p = Product::new(slug.to_uppercase(), slug, Decimal::new(cents, 2));
    p.status = ProductStatus::Active;
    p.stock_quantity = 5;
    p
}

async fn placed_order(repo: &InMemoryRepo, customer: Uuid) -> Order {
    let slug = format!("widget-{}", Uuid::new_v4().simple());
    let widget = repo.upsert_product(product(&slug, 2000)).await.unwrap();
    let owner = CartOwner::Customer(customer);
    let mut cart = repo.get_or_create_cart(&owner).await.unwrap();
    cart.add_item(&widget, None, 1).unwrap();
    let cart = repo.save_cart(&cart).await.unwrap();
    let order = Order::snapshot(
        &cart,
        CheckoutDetails {
            email: "buyer@example.com".into(),
            ..Default::default()
        },
        &PricingConfig::default(),
        None,
    )
    .unwrap();
    repo.place_order(order).await.unwrap()
}

fn address_input(city: &str, is_default: bool) -> AddressInput {
    AddressInput {
        kind: AddressKind::Shipping,
        address: Address {
            first_name: "Ada".into(),
            last_name: "Byron".into(),
            address_line_1: "1 Main St".into(),
            city: city.into(),
            state: "CA".into(),
            postal_code: "94000".into(),
            country: "US".into(),
            ..Default::default()
        },
        is_default,
    }
}

#[tokio::test]
async fn cart_lines_are_hydrated_from_the_live_catalog() {
    let repo = InMemoryRepo::new();
    let mut shirt = product("shirt", 1500);
    let large = ProductVariant::new("Large");
    shirt.variants.push(large.clone());
    let shirt = repo.upsert_product(shirt).await.unwrap();

    let owner = CartOwner::Session("abc".into());
    let mut cart = repo.get_or_create_cart(&owner).await.unwrap();
    cart.add_item(&shirt, Some(&large), 2).unwrap();
    repo.save_cart(&cart).await.unwrap();

    let mut repriced = shirt.clone();
    repriced.price = Decimal::new(1800, 2);
    repo.upsert_product(repriced).await.unwrap();

    let fetched = repo.find_cart(&owner).await.unwrap().unwrap();
    assert_eq!(fetched.id, cart.id);
    assert_eq!(fetched.lines.len(), 1);
    assert_eq!(fetched.lines[0].variant_id(), Some(large.id));
    assert_eq!(fetched.subtotal(), Decimal::new(3600, 2));

    let mut without_variant = shirt;
    without_variant.variants.clear();
    repo.upsert_product(without_variant).await.unwrap();
    let fetched = repo.find_cart(&owner).await.unwrap().unwrap();
    assert!(fetched.is_empty());
}

#[tokio::test]
async fn concurrent_callers_share_one_cart_per_owner() {
    let repo = Arc::new(InMemoryRepo::new());
    let owner = CartOwner::Customer(Uuid::new_v4());

    let mut handles = Vec::new();
    for _ in 0..16 {
        let repo = repo.clone();
        let owner = owner.clone();
        handles.push(tokio::spawn(async move {
            repo.get_or_create_cart(&owner).await.unwrap().id
        }));
    }
    let mut ids = Vec::new();
    for h in handles {
        ids.push(h.await.unwrap());
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);

    assert!(repo
        .find_cart(&CartOwner::Session("nobody".into()))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn product_slugs_stay_unique() {
    let repo = InMemoryRepo::new();
    repo.upsert_product(product("mug", 900)).await.unwrap();
    let clash = repo.upsert_product(product("mug", 1200)).await;
    assert!(matches!(clash, Err(RepoError::Duplicate(_))));

    let mug = repo.get_product_by_slug("mug").await.unwrap().unwrap();
    repo.record_view(mug.id).await.unwrap();
    repo.record_view(mug.id).await.unwrap();
    assert_eq!(repo.get_product(mug.id).await.unwrap().unwrap().view_count, 2);
}

#[tokio::test]
async fn coupon_redemption_respects_usage_limit() {
    let repo = InMemoryRepo::new();
    let mut coupon = Coupon::new(
        "once",
        DiscountType::Fixed,
        Decimal::new(500, 2),
        Utc::now() - Duration::days(1),
    );
    coupon.usage_limit = Some(1);
    repo.upsert_coupon(coupon).await.unwrap();
    assert!(repo.get_coupon("Once").await.unwrap().is_some());

    let widget = repo.upsert_product(product("widget", 2000)).await.unwrap();
    let mut cart = repo
        .get_or_create_cart(&CartOwner::Session("s1".into()))
        .await
        .unwrap();
    cart.add_item(&widget, None, 1).unwrap();

    let applied = AppliedCoupon {
        code: "ONCE".into(),
        discount_amount: Decimal::new(500, 2),
    };
    let details = CheckoutDetails {
        email: "a@b.co".into(),
        ..Default::default()
    };
    let pricing = PricingConfig::default();

    let first = Order::snapshot(&cart, details.clone(), &pricing, Some(applied.clone())).unwrap();
    repo.place_order(first).await.unwrap();
    assert_eq!(repo.get_coupon("ONCE").await.unwrap().unwrap().usage_count, 1);

    let second = Order::snapshot(&cart, details, &pricing, Some(applied)).unwrap();
    let number = second.order_number.clone();
    let err = repo.place_order(second).await.unwrap_err();
    assert!(matches!(err, RepoError::CouponExhausted(_)));
    assert!(repo.get_order_by_number(&number).await.unwrap().is_none());
}

#[tokio::test]
async fn order_numbers_are_unique_and_history_is_newest_first() {
    let repo = InMemoryRepo::new();
    let customer = Uuid::new_v4();
    let first = placed_order(&repo, customer).await;
    let second = placed_order(&repo, customer).await;

    let mut clash = second.clone();
    clash.id = Uuid::new_v4();
    clash.order_number = first.order_number.clone();
    assert!(matches!(
        repo.place_order(clash).await,
        Err(RepoError::Duplicate(_))
    ));

    let history = repo.list_orders_for_customer(customer).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, second.id);

    let mut shipped = first.clone();
    shipped.transition(OrderStatus::Confirmed, "ok").unwrap();
    let updated = repo.update_order(shipped).await.unwrap().unwrap();
    assert_eq!(updated.status, OrderStatus::Confirmed);
    let by_number = repo
        .get_order_by_number(&first.order_number)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_number.status_history.len(), 2);
}

#[tokio::test]
async fn missing_rows_and_webhook_replays() {
    let repo = InMemoryRepo::new();
    assert!(repo.get_order(Uuid::new_v4()).await.unwrap().is_none());
    assert!(repo.get_payment(Uuid::new_v4()).await.unwrap().is_none());

    let orphan = placed_order(&repo, Uuid::new_v4()).await;
    let mut ghost = orphan.clone();
    ghost.id = Uuid::new_v4();
    assert!(repo.update_order(ghost).await.unwrap().is_none());

    let hook = PaymentWebhook::received("evt_1", "stripe", "charge.succeeded", serde_json::json!({"a": 1}));
    let (_, fresh) = repo.store_webhook(hook.clone()).await.unwrap();
    assert!(fresh);
    let mut replay = hook;
    replay.data = serde_json::json!({"a": 2});
    let (stored, fresh) = repo.store_webhook(replay).await.unwrap();
    assert!(!fresh);
    assert_eq!(stored.data, serde_json::json!({"a": 1}));
}

#[tokio::test]
async fn one_wishlist_per_customer_and_only_known_products() {
    let repo = Arc::new(InMemoryRepo::new());
    let customer = Uuid::new_v4();
    let lamp = repo.upsert_product(product("lamp", 4500)).await.unwrap();
    assert!(repo.find_wishlist(customer).await.unwrap().is_none());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let repo = repo.clone();
            tokio::spawn(async move { repo.get_or_create_wishlist(customer).await.unwrap().id })
        })
        .collect();
    let mut ids = Vec::new();
    for h in handles {
        ids.push(h.await.unwrap());
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);

    let mut wishlist = repo.get_or_create_wishlist(customer).await.unwrap();
    wishlist.add_item(lamp.id);
    assert_eq!(repo.save_wishlist(&wishlist).await.unwrap().item_count(), 1);

    wishlist.add_item(Uuid::new_v4());
    assert!(matches!(
        repo.save_wishlist(&wishlist).await,
        Err(RepoError::DbError(_))
    ));
    assert_eq!(repo.find_wishlist(customer).await.unwrap().unwrap().item_count(), 1);
}

#[tokio::test]
async fn address_books_are_kept_per_customer() {
    let repo = InMemoryRepo::new();
    let customer = Uuid::new_v4();
    let mut book = repo.load_address_book(customer).await.unwrap();
    assert!(book.addresses.is_empty());

    let home = book.add(address_input("Home", false)).unwrap();
    book.add(address_input("Work", false)).unwrap();
    book.remove(home.id).unwrap();
    repo.save_address_book(&book).await.unwrap();

    let reloaded = repo.load_address_book(customer).await.unwrap();
    assert_eq!(reloaded.addresses.len(), 2);
    assert_eq!(reloaded.default_address().unwrap().address.city, "Work");
    assert!(repo
        .load_address_book(Uuid::new_v4())
        .await
        .unwrap()
        .addresses
        .is_empty());
}
