use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
    serve, Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use super::identity::{RequestIdentity, SESSION_HEADER};
use crate::application::checkout_service::CheckoutRequest;
use crate::application::identity::Scoped;
use crate::application::wishlist_service::{WishlistChange, WishlistView};
use crate::application::Storefront;
use crate::errors::AppError;
use shop_types::domain::catalog::{Page, Product, ProductQuery, ProductSort};
use shop_types::domain::customer::{AddressInput, SavedAddress};
use shop_types::domain::order::{Order, OrderQuery, OrderStatus};
use shop_types::domain::payment::{NewPayment, Payment, Refund};
use shop_types::ports::ShopRepository;

type Shop<R> = State<Arc<Storefront<R>>>;
type Body<T> = Result<Json<T>, JsonRejection>;

#[derive(Clone)]
pub struct HttpServerConfig {
    pub port: String,
}

#[derive(Clone)]
pub struct HttpServer<R>
where
    R: ShopRepository,
{
    pub storefront: Arc<Storefront<R>>,
    pub config: HttpServerConfig,
}

/// Every successful cart mutation is wrapped as `{success: true, ...}`.
#[derive(Serialize)]
struct Success<T> {
    success: bool,
    #[serde(flatten)]
    body: T,
}

impl<T: Serialize> Success<T> {
    fn json(body: T) -> Json<Self> {
        Json(Self {
            success: true,
            body,
        })
    }
}

/// Echoes a freshly minted session token so the caller can keep its cart.
fn with_session<T: Serialize>(scoped: Scoped<T>) -> Response {
    let mut res = Success::json(scoped.value).into_response();
    if let Some(token) = scoped.minted_session {
        if let Ok(value) = HeaderValue::from_str(&token) {
            res.headers_mut().insert(SESSION_HEADER, value);
        }
    }
    res
}

fn parse_uuid(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|e| AppError::BadRequest(e.to_string()))
}

#[derive(Deserialize, Default)]
pub struct ProductListParams {
    pub search: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub sort: Option<String>,
    pub page: Option<String>,
}

impl ProductListParams {
    /// Unparseable bounds and pages are ignored rather than rejected.
    fn into_query(self) -> ProductQuery {
        let price = |raw: Option<String>| raw.and_then(|s| Decimal::from_str(s.trim()).ok());
        ProductQuery {
            search: self.search.filter(|s| !s.trim().is_empty()),
            category: self.category.filter(|s| !s.trim().is_empty()),
            min_price: price(self.min_price),
            max_price: price(self.max_price),
            sort: self
                .sort
                .as_deref()
                .map(ProductSort::parse_lenient)
                .unwrap_or_default(),
            page: parse_page(self.page),
        }
    }
}

fn parse_page(raw: Option<String>) -> u32 {
    raw.and_then(|p| p.trim().parse().ok()).unwrap_or(1)
}

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Deserialize, Default)]
pub struct OrderListParams {
    pub search: Option<String>,
    pub status: Option<String>,
    pub page: Option<String>,
}

#[derive(Deserialize)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    #[serde(default = "one")]
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct RemoveFromCartRequest {
    pub item_id: Uuid,
}

#[derive(Deserialize)]
pub struct UpdateCartRequest {
    pub item_id: Uuid,
    #[serde(default = "one")]
    pub quantity: u32,
}

fn one() -> u32 {
    1
}

#[derive(Deserialize)]
pub struct WishlistRequest {
    pub product_id: Uuid,
}

#[derive(Deserialize)]
pub struct ValidateCouponRequest {
    pub code: String,
    pub amount: Decimal,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
    pub note: Option<String>,
}

#[derive(Deserialize)]
pub struct RefundRequest {
    pub amount: Decimal,
    #[serde(default)]
    pub reason: String,
}

#[derive(Deserialize)]
pub struct WebhookRequest {
    pub id: String,
    pub event_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl<R> HttpServer<R>
where
    R: ShopRepository,
{
    pub async fn new(storefront: Storefront<R>, config: HttpServerConfig) -> anyhow::Result<Self> {
        Ok(Self {
            storefront: Arc::new(storefront),
            config,
        })
    }

    pub fn router(&self) -> Router {
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &axum::extract::Request<_>| {
                let uri = request.uri().to_string();
                let request_id = Uuid::new_v4();
                tracing::info_span!(
                    "http_request",
                    %request_id,
                    method = %request.method(),
                    uri
                )
            })
            .on_request(
                |request: &axum::extract::Request<_>, span: &tracing::Span| {
                    tracing::info!(
                        parent: span,
                        method = %request.method(),
                        uri = %request.uri(),
                        "request"
                    );
                },
            )
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &tracing::Span| {
                    tracing::info!(
                        parent: span,
                        status = %response.status(),
                        latency_ms = %latency.as_millis(),
                        "response"
                    );
                },
            );

        Router::new()
            .route("/health", get(health))
            .route("/products", get(list_products::<R>))
            .route("/products/search", get(search_products::<R>))
            .route("/products/{slug}", get(product_detail::<R>))
            .route("/cart", get(cart_detail::<R>))
            .route("/cart/count", get(cart_count::<R>))
            .route("/cart/add", post(add_to_cart::<R>))
            .route("/cart/remove", post(remove_from_cart::<R>))
            .route("/cart/update", post(update_cart_item::<R>))
            .route("/cart/clear", post(clear_cart::<R>))
            .route("/wishlist", get(wishlist::<R>))
            .route("/wishlist/add", post(add_to_wishlist::<R>))
            .route("/wishlist/remove", post(remove_from_wishlist::<R>))
            .route("/addresses", get(list_addresses::<R>).post(add_address::<R>))
            .route(
                "/addresses/{id}",
                put(update_address::<R>).delete(delete_address::<R>),
            )
            .route("/coupons/validate", post(validate_coupon::<R>))
            .route("/checkout", post(checkout::<R>))
            .route("/orders", get(list_orders::<R>))
            .route("/orders/{order_number}", get(get_order::<R>))
            .route("/orders/{order_number}/cancel", post(cancel_order::<R>))
            .route("/orders/{order_number}/status", patch(update_status::<R>))
            .route("/payments", post(record_payment::<R>))
            .route("/payments/{id}/refunds", post(record_refund::<R>))
            .route("/webhooks/{provider}", post(receive_webhook::<R>))
            .layer(trace_layer)
            .with_state(self.storefront.clone())
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let app = self.router();
        let addr: SocketAddr = format!("0.0.0.0:{}", self.config.port).parse()?;
        tracing::info!("starting server on {}", addr);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        serve(listener, app.into_make_service()).await?;
        Ok(())
    }
}

async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn list_products<R: ShopRepository>(
    State(shop): Shop<R>,
    Query(params): Query<ProductListParams>,
) -> Result<Json<Page<Product>>, AppError> {
    Ok(Json(shop.catalog.list(&params.into_query()).await?))
}

async fn search_products<R: ShopRepository>(
    State(shop): Shop<R>,
    Query(params): Query<SearchParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let results = shop.catalog.search(&params.q).await?;
    Ok(Json(serde_json::json!({ "results": results })))
}

async fn product_detail<R: ShopRepository>(
    State(shop): Shop<R>,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    Ok(Json(shop.catalog.detail(&slug).await?).into_response())
}

async fn cart_detail<R: ShopRepository>(
    State(shop): Shop<R>,
    RequestIdentity(identity): RequestIdentity,
) -> Result<Response, AppError> {
    Ok(with_session(shop.carts.detail(&identity).await?))
}

async fn cart_count<R: ShopRepository>(
    State(shop): Shop<R>,
    RequestIdentity(identity): RequestIdentity,
) -> Result<Json<serde_json::Value>, AppError> {
    let count = shop.carts.count(&identity).await?;
    Ok(Json(serde_json::json!({ "cart_count": count })))
}

async fn add_to_cart<R: ShopRepository>(
    State(shop): Shop<R>,
    RequestIdentity(identity): RequestIdentity,
    payload: Body<AddToCartRequest>,
) -> Result<Response, AppError> {
    let Json(req) = payload?;
    let summary = shop
        .carts
        .add(&identity, req.product_id, req.variant_id, req.quantity)
        .await?;
    Ok(with_session(summary))
}

async fn remove_from_cart<R: ShopRepository>(
    State(shop): Shop<R>,
    RequestIdentity(identity): RequestIdentity,
    payload: Body<RemoveFromCartRequest>,
) -> Result<Response, AppError> {
    let Json(req) = payload?;
    Ok(with_session(shop.carts.remove(&identity, req.item_id).await?))
}

async fn update_cart_item<R: ShopRepository>(
    State(shop): Shop<R>,
    RequestIdentity(identity): RequestIdentity,
    payload: Body<UpdateCartRequest>,
) -> Result<Response, AppError> {
    let Json(req) = payload?;
    let summary = shop
        .carts
        .update(&identity, req.item_id, req.quantity)
        .await?;
    Ok(with_session(summary))
}

async fn clear_cart<R: ShopRepository>(
    State(shop): Shop<R>,
    RequestIdentity(identity): RequestIdentity,
) -> Result<Response, AppError> {
    Ok(with_session(shop.carts.clear(&identity).await?))
}

async fn wishlist<R: ShopRepository>(
    State(shop): Shop<R>,
    RequestIdentity(identity): RequestIdentity,
) -> Result<Json<WishlistView>, AppError> {
    Ok(Json(shop.wishlist.view(&identity).await?))
}

async fn add_to_wishlist<R: ShopRepository>(
    State(shop): Shop<R>,
    RequestIdentity(identity): RequestIdentity,
    payload: Body<WishlistRequest>,
) -> Result<Json<Success<WishlistChange>>, AppError> {
    let Json(req) = payload?;
    let change = shop.wishlist.add(&identity, req.product_id).await?;
    Ok(Success::json(change))
}

async fn remove_from_wishlist<R: ShopRepository>(
    State(shop): Shop<R>,
    RequestIdentity(identity): RequestIdentity,
    payload: Body<WishlistRequest>,
) -> Result<Json<Success<WishlistChange>>, AppError> {
    let Json(req) = payload?;
    let change = shop.wishlist.remove(&identity, req.product_id).await?;
    Ok(Success::json(change))
}

async fn list_addresses<R: ShopRepository>(
    State(shop): Shop<R>,
    RequestIdentity(identity): RequestIdentity,
) -> Result<Json<serde_json::Value>, AppError> {
    let addresses = shop.addresses.list(&identity).await?;
    Ok(Json(serde_json::json!({ "addresses": addresses })))
}

async fn add_address<R: ShopRepository>(
    State(shop): Shop<R>,
    RequestIdentity(identity): RequestIdentity,
    payload: Body<AddressInput>,
) -> Result<(StatusCode, Json<SavedAddress>), AppError> {
    let Json(input) = payload?;
    let saved = shop.addresses.add(&identity, input).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

async fn update_address<R: ShopRepository>(
    State(shop): Shop<R>,
    RequestIdentity(identity): RequestIdentity,
    Path(id): Path<String>,
    payload: Body<AddressInput>,
) -> Result<Json<SavedAddress>, AppError> {
    let id = parse_uuid(&id)?;
    let Json(input) = payload?;
    Ok(Json(shop.addresses.update(&identity, id, input).await?))
}

async fn delete_address<R: ShopRepository>(
    State(shop): Shop<R>,
    RequestIdentity(identity): RequestIdentity,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_uuid(&id)?;
    shop.addresses.remove(&identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn validate_coupon<R: ShopRepository>(
    State(shop): Shop<R>,
    payload: Body<ValidateCouponRequest>,
) -> Result<Response, AppError> {
    let Json(req) = payload?;
    let check = shop.checkout.validate_coupon(&req.code, req.amount).await?;
    Ok(Json(check).into_response())
}

async fn checkout<R: ShopRepository>(
    State(shop): Shop<R>,
    RequestIdentity(identity): RequestIdentity,
    payload: Body<CheckoutRequest>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let Json(req) = payload?;
    let order = shop.checkout.checkout(&identity, req).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn list_orders<R: ShopRepository>(
    State(shop): Shop<R>,
    RequestIdentity(identity): RequestIdentity,
    Query(params): Query<OrderListParams>,
) -> Result<Json<Page<Order>>, AppError> {
    let query = OrderQuery {
        search: params.search,
        status: params.status.and_then(|s| OrderStatus::from_str(s.trim()).ok()),
        page: parse_page(params.page),
    };
    Ok(Json(shop.orders.history(&identity, &query).await?))
}

async fn get_order<R: ShopRepository>(
    State(shop): Shop<R>,
    RequestIdentity(identity): RequestIdentity,
    Path(order_number): Path<String>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(shop.orders.get_order(&identity, &order_number).await?))
}

async fn cancel_order<R: ShopRepository>(
    State(shop): Shop<R>,
    RequestIdentity(identity): RequestIdentity,
    Path(order_number): Path<String>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(shop.orders.cancel(&identity, &order_number).await?))
}

async fn update_status<R: ShopRepository>(
    State(shop): Shop<R>,
    Path(order_number): Path<String>,
    payload: Body<UpdateStatusRequest>,
) -> Result<Json<Order>, AppError> {
    let Json(req) = payload?;
    let updated = shop
        .orders
        .update_status(&order_number, req.status, req.note)
        .await?;
    Ok(Json(updated))
}

async fn record_payment<R: ShopRepository>(
    State(shop): Shop<R>,
    payload: Body<NewPayment>,
) -> Result<(StatusCode, Json<Payment>), AppError> {
    let Json(input) = payload?;
    let payment = shop.payments.record_payment(input).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

async fn record_refund<R: ShopRepository>(
    State(shop): Shop<R>,
    Path(id): Path<String>,
    payload: Body<RefundRequest>,
) -> Result<(StatusCode, Json<Refund>), AppError> {
    let payment_id = parse_uuid(&id)?;
    let Json(req) = payload?;
    let refund = shop
        .payments
        .record_refund(payment_id, req.amount, req.reason)
        .await?;
    Ok((StatusCode::CREATED, Json(refund)))
}

async fn receive_webhook<R: ShopRepository>(
    State(shop): Shop<R>,
    Path(provider): Path<String>,
    payload: Body<WebhookRequest>,
) -> Result<Response, AppError> {
    let Json(req) = payload?;
    let (webhook, fresh) = shop
        .payments
        .store_webhook(&provider, &req.id, &req.event_type, req.data)
        .await?;
    let status = if fresh { StatusCode::ACCEPTED } else { StatusCode::OK };
    Ok((status, Json(webhook)).into_response())
}
