use shop_types::domain::cart::{Cart, CartOwner, Identity};
use shop_types::ports::cart_repository::CartRepository;
use uuid::Uuid;

use crate::errors::AppError;

/// A result handed back to a caller together with the session token minted
/// for it, if one had to be created.
#[derive(Debug, Clone)]
pub struct Scoped<T> {
    pub value: T,
    pub minted_session: Option<String>,
}

impl<T> Scoped<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Scoped<U> {
        Scoped {
            value: f(self.value),
            minted_session: self.minted_session,
        }
    }
}

/// 32 lowercase hex characters.
pub fn mint_session_token() -> String {
    Uuid::new_v4().simple().to_string()
}

fn session_token(identity: &Identity) -> Option<&str> {
    match identity {
        Identity::Anonymous {
            session_token: Some(token),
        } if !token.trim().is_empty() => Some(token.trim()),
        _ => None,
    }
}

/// Owner for an identity that may not have a cart yet. Anonymous callers
/// without a token get a fresh one.
pub fn resolve_owner(identity: &Identity) -> (CartOwner, Option<String>) {
    match identity {
        Identity::Authenticated { customer_id } => (CartOwner::Customer(*customer_id), None),
        Identity::Anonymous { .. } => match session_token(identity) {
            Some(token) => (CartOwner::Session(token.to_string()), None),
            None => {
                let token = mint_session_token();
                (CartOwner::Session(token.clone()), Some(token))
            }
        },
    }
}

/// Owner for read-only lookups; never mints a token.
pub fn existing_owner(identity: &Identity) -> Option<CartOwner> {
    match identity {
        Identity::Authenticated { customer_id } => Some(CartOwner::Customer(*customer_id)),
        Identity::Anonymous { .. } => session_token(identity).map(|t| CartOwner::Session(t.into())),
    }
}

/// Active cart for the identity, created on first use.
pub async fn resolve_cart<R>(repo: &R, identity: &Identity) -> Result<Scoped<Cart>, AppError>
where
    R: CartRepository + ?Sized,
{
    let (owner, minted_session) = resolve_owner(identity);
    let cart = repo.get_or_create_cart(&owner).await?;
    Ok(Scoped {
        value: cart,
        minted_session,
    })
}

/// Active cart without creating one.
pub async fn find_cart<R>(repo: &R, identity: &Identity) -> Result<Option<Cart>, AppError>
where
    R: CartRepository + ?Sized,
{
    match existing_owner(identity) {
        Some(owner) => Ok(repo.find_cart(&owner).await?),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shop_repo::memory::InMemoryRepo;

    #[test]
    fn minted_tokens_are_opaque_hex() {
        let token = mint_session_token();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, mint_session_token());
    }

    #[test]
    fn blank_session_token_counts_as_missing() {
        let identity = Identity::Anonymous {
            session_token: Some("  ".into()),
        };
        assert!(existing_owner(&identity).is_none());
        let (owner, minted) = resolve_owner(&identity);
        assert_eq!(owner, CartOwner::Session(minted.unwrap()));
    }

    #[tokio::test]
    async fn resolution_is_idempotent_per_identity() {
        let repo = InMemoryRepo::new();
        let customer = Identity::Authenticated {
            customer_id: Uuid::new_v4(),
        };
        let first = resolve_cart(&repo, &customer).await.unwrap();
        let second = resolve_cart(&repo, &customer).await.unwrap();
        assert_eq!(first.value.id, second.value.id);
        assert!(first.minted_session.is_none());

        let fresh = resolve_cart(&repo, &Identity::Anonymous { session_token: None })
            .await
            .unwrap();
        let token = fresh.minted_session.clone().unwrap();
        let again = resolve_cart(
            &repo,
            &Identity::Anonymous {
                session_token: Some(token),
            },
        )
        .await
        .unwrap();
        assert_eq!(again.value.id, fresh.value.id);
        assert!(again.minted_session.is_none());
    }

    #[tokio::test]
    async fn lookups_do_not_create_carts() {
        let repo = InMemoryRepo::new();
        let identity = Identity::Anonymous {
            session_token: Some("never-seen".into()),
        };
        assert!(find_cart(&repo, &identity).await.unwrap().is_none());
        assert!(find_cart(&repo, &Identity::Anonymous { session_token: None })
            .await
            .unwrap()
            .is_none());
    }
}
