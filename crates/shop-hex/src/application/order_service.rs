use crate::errors::AppError;
use shop_types::domain::cart::Identity;
use shop_types::domain::catalog::Page;
use shop_types::domain::order::{Order, OrderQuery, OrderStatus};
use shop_types::ports::order_repository::OrderRepository;
use shop_types::ports::ShopRepository;
use std::sync::Arc;
use uuid::Uuid;

pub struct OrderService<R: ShopRepository> {
    repo: Arc<R>,
}

impl<R: ShopRepository> OrderService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    fn customer(identity: &Identity) -> Result<Uuid, AppError> {
        identity
            .customer_id()
            .ok_or_else(|| AppError::Unauthorized("sign in to view orders".into()))
    }

    pub async fn history(&self, identity: &Identity, query: &OrderQuery) -> Result<Page<Order>, AppError> {
        let customer_id = Self::customer(identity)?;
        let orders = self.repo.list_orders_for_customer(customer_id).await?;
        Ok(query.apply(orders))
    }

    /// Someone else's order is reported as missing.
    pub async fn get_order(&self, identity: &Identity, order_number: &str) -> Result<Order, AppError> {
        let customer_id = Self::customer(identity)?;
        match self.repo.get_order_by_number(order_number).await? {
            Some(o) if o.customer_id == Some(customer_id) => Ok(o),
            _ => Err(AppError::NotFound(format!("order {order_number}"))),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, identity: &Identity, order_number: &str) -> Result<Order, AppError> {
        let mut order = self.get_order(identity, order_number).await?;
        order.transition(OrderStatus::Cancelled, "cancelled by customer")?;
        let order = self.save(order).await?;
        tracing::info!(%order_number, "order cancelled");
        Ok(order)
    }

    /// Operator-side status change through the order state machine.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_number: &str,
        status: OrderStatus,
        note: Option<String>,
    ) -> Result<Order, AppError> {
        let mut order = self
            .repo
            .get_order_by_number(order_number)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {order_number}")))?;
        let from = order.status;
        order.transition(status, note.unwrap_or_default())?;
        let order = self.save(order).await?;
        tracing::info!(%order_number, from = from.as_str(), to = status.as_str(), "order status changed");
        Ok(order)
    }

    async fn save(&self, order: Order) -> Result<Order, AppError> {
        let number = order.order_number.clone();
        self.repo
            .update_order(order)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {number}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use shop_repo::memory::InMemoryRepo;
    use shop_types::domain::cart::{Cart, CartOwner};
    use shop_types::domain::catalog::{Product, ProductStatus};
    use shop_types::domain::order::{CheckoutDetails, PaymentStatus};
    use shop_types::domain::pricing::PricingConfig;

    async fn place(repo: &InMemoryRepo, customer: Uuid) -> Order {
        let mut p = Product::new("Widget", "widget", Decimal::new(1000, 2));
        p.status = ProductStatus::Active;
        let mut cart = Cart::new(CartOwner::Customer(customer));
        cart.add_item(&p, None, 1).unwrap();
        let order = Order::snapshot(
            &cart,
            CheckoutDetails {
                email: "me@example.com".into(),
                ..Default::default()
            },
            &PricingConfig::default(),
            None,
        )
        .unwrap();
        repo.place_order(order).await.unwrap()
    }

    fn svc() -> (Arc<InMemoryRepo>, OrderService<InMemoryRepo>) {
        let repo = Arc::new(InMemoryRepo::new());
        (repo.clone(), OrderService::new(repo))
    }

    #[tokio::test]
    async fn history_requires_authentication() {
        let (_, svc) = svc();
        let res = svc
            .history(&Identity::Anonymous { session_token: None }, &OrderQuery::default())
            .await;
        assert!(matches!(res, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn history_is_scoped_to_the_customer() {
        let (repo, svc) = svc();
        let me = Uuid::new_v4();
        let first = place(&repo, me).await;
        place(&repo, me).await;
        place(&repo, Uuid::new_v4()).await;

        let identity = Identity::Authenticated { customer_id: me };
        let page = svc.history(&identity, &OrderQuery::default()).await.unwrap();
        assert_eq!(page.total, 2);

        let found = svc.get_order(&identity, &first.order_number).await.unwrap();
        assert_eq!(found.id, first.id);

        let stranger = Identity::Authenticated {
            customer_id: Uuid::new_v4(),
        };
        assert!(matches!(
            svc.get_order(&stranger, &first.order_number).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn cancel_follows_the_state_machine() {
        let (repo, svc) = svc();
        let me = Uuid::new_v4();
        let identity = Identity::Authenticated { customer_id: me };
        let order = place(&repo, me).await;

        let cancelled = svc.cancel(&identity, &order.order_number).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.status_history.len(), 2);
        assert!(matches!(
            svc.cancel(&identity, &order.order_number).await,
            Err(AppError::Conflict(_))
        ));

        let mut paid = place(&repo, me).await;
        paid.set_payment_status(PaymentStatus::Paid);
        repo.update_order(paid.clone()).await.unwrap();
        assert!(matches!(
            svc.cancel(&identity, &paid.order_number).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn operator_moves_order_forward() {
        let (repo, svc) = svc();
        let order = place(&repo, Uuid::new_v4()).await;
        for status in [
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            svc.update_status(&order.order_number, status, None).await.unwrap();
        }
        let delivered = repo.get_order(order.id).await.unwrap().unwrap();
        assert!(delivered.shipped_at.is_some());
        assert!(delivered.delivered_at.is_some());

        assert!(matches!(
            svc.update_status(&order.order_number, OrderStatus::Pending, None).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            svc.update_status("MISSING1", OrderStatus::Confirmed, None).await,
            Err(AppError::NotFound(_))
        ));
    }
}
