pub mod cart;
pub mod catalog;
pub mod coupon;
pub mod customer;
pub mod order;
pub mod payment;
pub mod pricing;
pub mod wishlist;
