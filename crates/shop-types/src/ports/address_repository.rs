use async_trait::async_trait;
use uuid::Uuid;

use super::RepoError;
use crate::domain::customer::AddressBook;

#[async_trait]
pub trait AddressRepository: Send + Sync + 'static {
    /// Every saved address for the customer, deactivated ones included.
    /// Customers with nothing saved get an empty book.
    async fn load_address_book(&self, customer_id: Uuid) -> Result<AddressBook, RepoError>;
    /// Writes every address in the book in one transaction.
    async fn save_address_book(&self, book: &AddressBook) -> Result<AddressBook, RepoError>;
}
