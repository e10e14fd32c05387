mod identity;
mod server;

pub use identity::{RequestIdentity, CUSTOMER_HEADER, SESSION_HEADER};
pub use server::{HttpServer, HttpServerConfig};
