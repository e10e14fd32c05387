use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{RequestBuilder, Response, Url};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shop_types::domain::cart::Cart;
use shop_types::domain::catalog::{Page, Product, ProductVariant};
use shop_types::domain::customer::{AddressInput, SavedAddress};
use shop_types::domain::order::{CheckoutDetails, Order, OrderStatus};
use shop_types::domain::payment::{NewPayment, Payment, PaymentWebhook, Refund};
use shop_types::domain::pricing::Totals;
use uuid::Uuid;

pub const CUSTOMER_HEADER: &str = "x-customer-id";
pub const SESSION_HEADER: &str = "x-session-token";

/// Non-2xx answer from the storefront, carrying its `message`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("storefront returned {status}: {message}")]
pub struct ApiError {
    pub status: u16,
    pub message: String,
}

#[derive(Clone)]
pub struct ShopClientBuilder {
    base: Url,
    headers: HeaderMap,
    session: Option<String>,
    timeout: Option<Duration>,
    client: Option<reqwest::Client>,
}

/// Typed client for the storefront HTTP API. Anonymous clients adopt the
/// session token the server mints on their first cart call.
#[derive(Clone)]
pub struct ShopClient {
    base: Url,
    client: reqwest::Client,
    session: Arc<Mutex<Option<String>>>,
}

impl ShopClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        Self::builder(base_url)?.build()
    }

    pub fn builder(base_url: &str) -> anyhow::Result<ShopClientBuilder> {
        let base = Url::parse(base_url).context("invalid base url")?;
        Ok(ShopClientBuilder {
            base,
            headers: HeaderMap::new(),
            session: None,
            timeout: None,
            client: None,
        })
    }

    pub fn session_token(&self) -> Option<String> {
        self.session.lock().ok().and_then(|s| s.clone())
    }

    fn url(&self, path: &str) -> anyhow::Result<Url> {
        self.base.join(path).context("failed to join url")
    }

    fn with_session(&self, req: RequestBuilder) -> RequestBuilder {
        match self.session_token() {
            Some(token) => req.header(SESSION_HEADER, token),
            None => req,
        }
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> anyhow::Result<T> {
        let res = self.with_session(req).send().await?;
        self.adopt_session(&res);
        decode(res).await
    }

    fn adopt_session(&self, res: &Response) {
        let minted = res
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if let (Some(token), Ok(mut slot)) = (minted, self.session.lock()) {
            tracing::debug!("adopted storefront session");
            *slot = Some(token);
        }
    }

    pub async fn health(&self) -> anyhow::Result<serde_json::Value> {
        self.send(self.client.get(self.url("health")?)).await
    }

    pub async fn list_products(&self, query: &ProductListQuery) -> anyhow::Result<Page<Product>> {
        self.send(self.client.get(self.url("products")?).query(query))
            .await
    }

    pub async fn search_products(&self, q: &str) -> anyhow::Result<Vec<Product>> {
        let res: SearchResults = self
            .send(self.client.get(self.url("products/search")?).query(&[("q", q)]))
            .await?;
        Ok(res.results)
    }

    pub async fn product(&self, slug: &str) -> anyhow::Result<ProductView> {
        self.send(self.client.get(self.url(&format!("products/{slug}"))?))
            .await
    }

    pub async fn cart(&self) -> anyhow::Result<CartView> {
        self.send(self.client.get(self.url("cart")?)).await
    }

    pub async fn cart_count(&self) -> anyhow::Result<u64> {
        let res: CartCount = self.send(self.client.get(self.url("cart/count")?)).await?;
        Ok(res.cart_count)
    }

    pub async fn add_to_cart(
        &self,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        quantity: u32,
    ) -> anyhow::Result<CartMutation> {
        let body = AddToCartRequest {
            product_id,
            variant_id,
            quantity,
        };
        self.send(self.client.post(self.url("cart/add")?).json(&body))
            .await
    }

    pub async fn remove_from_cart(&self, item_id: Uuid) -> anyhow::Result<CartMutation> {
        self.send(
            self.client
                .post(self.url("cart/remove")?)
                .json(&serde_json::json!({ "item_id": item_id })),
        )
        .await
    }

    pub async fn update_cart_item(&self, item_id: Uuid, quantity: u32) -> anyhow::Result<CartMutation> {
        self.send(
            self.client
                .post(self.url("cart/update")?)
                .json(&serde_json::json!({ "item_id": item_id, "quantity": quantity })),
        )
        .await
    }

    pub async fn clear_cart(&self) -> anyhow::Result<CartMutation> {
        self.send(self.client.post(self.url("cart/clear")?)).await
    }

    pub async fn wishlist(&self) -> anyhow::Result<WishlistView> {
        self.send(self.client.get(self.url("wishlist")?)).await
    }

    pub async fn add_to_wishlist(&self, product_id: Uuid) -> anyhow::Result<WishlistChange> {
        self.send(
            self.client
                .post(self.url("wishlist/add")?)
                .json(&serde_json::json!({ "product_id": product_id })),
        )
        .await
    }

    pub async fn remove_from_wishlist(&self, product_id: Uuid) -> anyhow::Result<WishlistChange> {
        self.send(
            self.client
                .post(self.url("wishlist/remove")?)
                .json(&serde_json::json!({ "product_id": product_id })),
        )
        .await
    }

    pub async fn list_addresses(&self) -> anyhow::Result<Vec<SavedAddress>> {
        let res: AddressList = self.send(self.client.get(self.url("addresses")?)).await?;
        Ok(res.addresses)
    }

    pub async fn add_address(&self, input: &AddressInput) -> anyhow::Result<SavedAddress> {
        self.send(self.client.post(self.url("addresses")?).json(input))
            .await
    }

    pub async fn update_address(&self, id: Uuid, input: &AddressInput) -> anyhow::Result<SavedAddress> {
        self.send(self.client.put(self.url(&format!("addresses/{id}"))?).json(input))
            .await
    }

    pub async fn delete_address(&self, id: Uuid) -> anyhow::Result<()> {
        let req = self.client.delete(self.url(&format!("addresses/{id}"))?);
        let res = self.with_session(req).send().await?;
        check(res).await?;
        Ok(())
    }

    pub async fn validate_coupon(&self, code: &str, amount: Decimal) -> anyhow::Result<CouponCheck> {
        self.send(
            self.client
                .post(self.url("coupons/validate")?)
                .json(&serde_json::json!({ "code": code, "amount": amount })),
        )
        .await
    }

    pub async fn checkout(&self, req: &CheckoutRequest) -> anyhow::Result<Order> {
        self.send(self.client.post(self.url("checkout")?).json(req))
            .await
    }

    pub async fn list_orders(&self, page: u32) -> anyhow::Result<Page<Order>> {
        self.send(
            self.client
                .get(self.url("orders")?)
                .query(&[("page", page.to_string())]),
        )
        .await
    }

    pub async fn get_order(&self, order_number: &str) -> anyhow::Result<Order> {
        self.send(self.client.get(self.url(&format!("orders/{order_number}"))?))
            .await
    }

    pub async fn cancel_order(&self, order_number: &str) -> anyhow::Result<Order> {
        self.send(
            self.client
                .post(self.url(&format!("orders/{order_number}/cancel"))?),
        )
        .await
    }

    pub async fn update_status(
        &self,
        order_number: &str,
        status: OrderStatus,
        note: Option<&str>,
    ) -> anyhow::Result<Order> {
        self.send(
            self.client
                .patch(self.url(&format!("orders/{order_number}/status"))?)
                .json(&UpdateStatusRequest {
                    status,
                    note: note.map(str::to_string),
                }),
        )
        .await
    }

    pub async fn record_payment(&self, payment: &NewPayment) -> anyhow::Result<Payment> {
        self.send(self.client.post(self.url("payments")?).json(payment))
            .await
    }

    pub async fn record_refund(
        &self,
        payment_id: Uuid,
        amount: Decimal,
        reason: &str,
    ) -> anyhow::Result<Refund> {
        self.send(
            self.client
                .post(self.url(&format!("payments/{payment_id}/refunds"))?)
                .json(&serde_json::json!({ "amount": amount, "reason": reason })),
        )
        .await
    }

    pub async fn send_webhook(
        &self,
        provider: &str,
        id: &str,
        event_type: &str,
        data: serde_json::Value,
    ) -> anyhow::Result<PaymentWebhook> {
        self.send(
            self.client
                .post(self.url(&format!("webhooks/{provider}"))?)
                .json(&serde_json::json!({ "id": id, "event_type": event_type, "data": data })),
        )
        .await
    }
}

async fn decode<T: DeserializeOwned>(res: Response) -> anyhow::Result<T> {
    check(res)
        .await?
        .json()
        .await
        .context("failed to decode response body")
}

/// Turns the `{success: false, message}` envelope into an [`ApiError`].
async fn check(res: Response) -> anyhow::Result<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let message = match res.json::<Failure>().await {
        Ok(body) => body.message,
        Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
    };
    Err(ApiError {
        status: status.as_u16(),
        message,
    }
    .into())
}

impl ShopClientBuilder {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_header(
        mut self,
        key: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> anyhow::Result<Self> {
        let header_name =
            HeaderName::from_bytes(key.as_ref().as_bytes()).context("invalid header name")?;
        let header_value = HeaderValue::from_str(value.as_ref()).context("invalid header value")?;
        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    /// Acts as a signed-in customer.
    pub fn with_customer(self, customer_id: Uuid) -> anyhow::Result<Self> {
        self.with_header(CUSTOMER_HEADER, customer_id.to_string())
    }

    /// Resumes an existing anonymous session.
    pub fn with_session(mut self, token: impl Into<String>) -> Self {
        self.session = Some(token.into());
        self
    }

    pub fn with_reqwest_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self) -> anyhow::Result<ShopClient> {
        let session = Arc::new(Mutex::new(self.session));
        if let Some(client) = self.client {
            return Ok(ShopClient {
                base: self.base,
                client,
                session,
            });
        }

        let mut builder = reqwest::Client::builder();
        if !self.headers.is_empty() {
            builder = builder.default_headers(self.headers);
        }
        if let Some(t) = self.timeout {
            builder = builder.timeout(t);
        }
        let client = builder.build()?;
        Ok(ShopClient {
            base: self.base,
            client,
            session,
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ProductListQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProductView {
    pub product: Product,
    pub variants: Vec<ProductVariant>,
    pub related: Vec<Product>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CartView {
    pub cart: Cart,
    pub totals: Totals,
    pub unavailable_items: Vec<Uuid>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CartMutation {
    pub success: bool,
    pub message: String,
    pub cart_count: u64,
    pub cart_subtotal: Decimal,
    #[serde(default)]
    pub item_total: Option<Decimal>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CouponCheck {
    pub code: String,
    pub valid: bool,
    pub discount: Decimal,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct CheckoutRequest {
    #[serde(flatten)]
    pub details: CheckoutDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_address_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_address_id: Option<Uuid>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WishlistEntry {
    pub id: Uuid,
    pub product_id: Uuid,
    #[serde(default)]
    pub notes: String,
    pub product: Product,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WishlistView {
    pub id: Uuid,
    pub name: String,
    pub item_count: usize,
    pub items: Vec<WishlistEntry>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WishlistChange {
    pub success: bool,
    pub message: String,
    pub in_wishlist: bool,
    pub wishlist_count: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct AddToCartRequest {
    product_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    variant_id: Option<Uuid>,
    quantity: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct UpdateStatusRequest {
    status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<String>,
}

#[derive(Deserialize)]
struct SearchResults {
    results: Vec<Product>,
}

#[derive(Deserialize)]
struct AddressList {
    addresses: Vec<SavedAddress>,
}

#[derive(Deserialize)]
struct CartCount {
    cart_count: u64,
}

#[derive(Deserialize)]
struct Failure {
    message: String,
}
