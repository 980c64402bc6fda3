//! Ticket operations, always scoped to the caller's account.

use std::sync::Arc;

use serde::Deserialize;

use crate::error::ServiceError;
use crate::scope::{transaction, Backend};
use crate::store::{self, IdentityStore, TicketRecord, TicketStore};
use crate::tariff;

/// Booking request.
#[derive(Debug, Default, Deserialize)]
pub struct NewTicket {
    pub showing: Option<String>,
    /// Falls back to the account's tariff.
    pub tariff: Option<String>,
}

/// Ticket operations over any backend whose sessions store users and tickets.
#[derive(Debug)]
pub struct TicketService<B> {
    backend: Arc<B>,
}

impl<B> Clone for TicketService<B> {
    fn clone(&self) -> Self {
        Self { backend: Arc::clone(&self.backend) }
    }
}

impl<B> TicketService<B>
where
    B: Backend + 'static,
    for<'a> B::Session<'a>: IdentityStore + TicketStore,
{
    /// Creates the service.
    #[must_use]
    pub const fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Lists the caller's tickets. An empty list is not an error.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the query fails.
    pub fn list(&self, identity: &str) -> Result<Vec<TicketRecord>, ServiceError> {
        transaction(&*self.backend, |scope| Ok(scope.session()?.list_tickets(identity)?))
    }

    /// Fetches one of the caller's tickets.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the ticket does not exist or belongs to someone
    /// else.
    pub fn get(&self, identity: &str, ticket: &str) -> Result<TicketRecord, ServiceError> {
        transaction(&*self.backend, |scope| {
            scope.session()?.get_ticket(ticket, identity)?.ok_or(ServiceError::NotFound("Ticket"))
        })
    }

    /// Books a ticket priced from the tariff catalogue.
    ///
    /// # Errors
    ///
    /// Returns `MissingFields` without a showing, `InvalidTariff` for an
    /// unknown tariff and `NotFound` if the caller's account no longer exists.
    pub fn create(&self, identity: &str, request: NewTicket) -> Result<TicketRecord, ServiceError> {
        let Some(showing) = request.showing else {
            return Err(ServiceError::MissingFields(vec!["showing"]));
        };

        let ticket = transaction(&*self.backend, |scope| {
            let store = scope.session()?;
            let owner = store.get_by_key(identity)?.ok_or(ServiceError::NotFound("User"))?;
            let tariff = tariff::lookup(Some(request.tariff.as_deref().unwrap_or(&owner.tariff)))?;

            let ticket = TicketRecord {
                uuid: store::new_key(),
                showing,
                user_id: owner.uuid,
                tariff: tariff.code.to_string(),
                price_cents: tariff.price_cents,
            };
            store.insert_ticket(&ticket)?;
            Ok::<_, ServiceError>(ticket)
        })?;

        tracing::info!(user = %identity, ticket = %ticket.uuid, tariff = %ticket.tariff, "ticket booked");
        Ok(ticket)
    }

    /// Cancels one of the caller's tickets.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the ticket does not exist or belongs to someone
    /// else.
    pub fn delete(&self, identity: &str, ticket: &str) -> Result<(), ServiceError> {
        transaction(&*self.backend, |scope| {
            if scope.session()?.delete_ticket(ticket, identity)? {
                Ok(())
            } else {
                Err(ServiceError::NotFound("Ticket"))
            }
        })?;

        tracing::info!(user = %identity, ticket = %ticket, "ticket cancelled");
        Ok(())
    }

    /// Cancels all of the caller's tickets, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the statement fails.
    pub fn delete_all(&self, identity: &str) -> Result<usize, ServiceError> {
        let removed = transaction(&*self.backend, |scope| {
            Ok::<_, ServiceError>(scope.session()?.delete_all_tickets(identity)?)
        })?;
        tracing::info!(user = %identity, removed, "tickets cancelled");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Role, SqliteBackend, UserRecord};
    use crate::StoreError;

    fn seeded() -> TicketService<SqliteBackend> {
        let backend = Arc::new(SqliteBackend::open_in_memory().unwrap());
        transaction(&*backend, |scope| {
            let store = scope.session()?;
            for (uuid, hash, tariff) in [("u1", "h1", "student"), ("u2", "h2", "standard")] {
                store.insert_user(&UserRecord {
                    uuid: uuid.into(),
                    lastname: "t".into(),
                    firstname: "t".into(),
                    age: "t".into(),
                    email: "t".into(),
                    email_hash: hash.into(),
                    password: "p".into(),
                    role: Role::User,
                    tariff: tariff.into(),
                })?;
            }
            Ok::<_, StoreError>(())
        })
        .unwrap();
        TicketService::new(backend)
    }

    fn showing(name: &str) -> NewTicket {
        NewTicket { showing: Some(name.into()), tariff: None }
    }

    #[test]
    fn test_create_uses_account_tariff() {
        let service = seeded();
        let ticket = service.create("u1", showing("Nosferatu")).unwrap();

        assert_eq!(ticket.tariff, "student");
        assert_eq!(ticket.price_cents, 900);
        assert_eq!(service.get("u1", &ticket.uuid).unwrap(), ticket);
    }

    #[test]
    fn test_create_with_explicit_tariff() {
        let service = seeded();
        let request = NewTicket { tariff: Some("Under16".into()), ..showing("Nosferatu") };

        let ticket = service.create("u2", request).unwrap();
        assert_eq!(ticket.price_cents, 700);
    }

    #[test]
    fn test_create_validation() {
        let service = seeded();

        assert!(matches!(service.create("u1", NewTicket::default()), Err(ServiceError::MissingFields(_))));
        assert!(matches!(
            service.create("u1", NewTicket { tariff: Some("vip".into()), ..showing("x") }),
            Err(ServiceError::InvalidTariff(_))
        ));
        assert!(matches!(service.create("ghost", showing("x")), Err(ServiceError::NotFound("User"))));
    }

    #[test]
    fn test_tickets_are_private() {
        let service = seeded();
        let ticket = service.create("u1", showing("Nosferatu")).unwrap();

        assert!(matches!(service.get("u2", &ticket.uuid), Err(ServiceError::NotFound("Ticket"))));
        assert!(matches!(service.delete("u2", &ticket.uuid), Err(ServiceError::NotFound("Ticket"))));
        assert!(service.list("u2").unwrap().is_empty());
        assert_eq!(service.list("u1").unwrap().len(), 1);
    }

    #[test]
    fn test_delete_and_delete_all() {
        let service = seeded();
        let first = service.create("u1", showing("Metropolis")).unwrap();
        service.create("u1", showing("M")).unwrap();
        service.create("u1", showing("Faust")).unwrap();
        service.create("u2", showing("Faust")).unwrap();

        service.delete("u1", &first.uuid).unwrap();
        assert_eq!(service.delete_all("u1").unwrap(), 2);
        assert!(service.list("u1").unwrap().is_empty());
        assert_eq!(service.list("u2").unwrap().len(), 1);
    }

    #[test]
    fn test_orphan_ticket_is_a_storage_fault() {
        let service = seeded();
        let orphan = TicketRecord {
            uuid: store::new_key(),
            showing: "Nosferatu 22:00".into(),
            user_id: "ghost".into(),
            tariff: "standard".into(),
            price_cents: 1200,
        };

        let result = transaction(&*service.backend, |scope| {
            Ok::<_, ServiceError>(scope.session()?.insert_ticket(&orphan)?)
        });

        assert!(matches!(result, Err(ServiceError::Storage(StoreError::Database(_)))));
    }
}
