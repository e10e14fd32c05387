use async_trait::async_trait;

use super::RepoError;
use crate::domain::coupon::Coupon;

#[async_trait]
pub trait CouponRepository: Send + Sync + 'static {
    async fn upsert_coupon(&self, coupon: Coupon) -> Result<Coupon, RepoError>;
    /// `code` is matched case-insensitively.
    async fn get_coupon(&self, code: &str) -> Result<Option<Coupon>, RepoError>;
}
