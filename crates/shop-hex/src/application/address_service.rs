use std::sync::Arc;

use shop_types::domain::cart::Identity;
use shop_types::domain::customer::{AddressInput, SavedAddress};
use shop_types::ports::address_repository::AddressRepository;
use shop_types::ports::ShopRepository;
use uuid::Uuid;

use crate::errors::AppError;

pub struct AddressService<R: ShopRepository> {
    repo: Arc<R>,
}

impl<R: ShopRepository> AddressService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    fn customer(identity: &Identity) -> Result<Uuid, AppError> {
        identity
            .customer_id()
            .ok_or_else(|| AppError::Unauthorized("sign in to manage addresses".into()))
    }

    pub async fn list(&self, identity: &Identity) -> Result<Vec<SavedAddress>, AppError> {
        let customer_id = Self::customer(identity)?;
        Ok(self.repo.load_address_book(customer_id).await?.active())
    }

    #[tracing::instrument(skip(self, input))]
    pub async fn add(&self, identity: &Identity, input: AddressInput) -> Result<SavedAddress, AppError> {
        let customer_id = Self::customer(identity)?;
        let mut book = self.repo.load_address_book(customer_id).await?;
        let saved = book.add(input)?;
        self.repo.save_address_book(&book).await?;
        tracing::info!(address_id = %saved.id, "address saved");
        Ok(saved)
    }

    #[tracing::instrument(skip(self, input))]
    pub async fn update(
        &self,
        identity: &Identity,
        id: Uuid,
        input: AddressInput,
    ) -> Result<SavedAddress, AppError> {
        let customer_id = Self::customer(identity)?;
        let mut book = self.repo.load_address_book(customer_id).await?;
        let saved = book.update(id, input)?;
        self.repo.save_address_book(&book).await?;
        Ok(saved)
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, identity: &Identity, id: Uuid) -> Result<(), AppError> {
        let customer_id = Self::customer(identity)?;
        let mut book = self.repo.load_address_book(customer_id).await?;
        book.remove(id)?;
        self.repo.save_address_book(&book).await?;
        Ok(())
    }
}
