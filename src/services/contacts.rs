use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::entities::{contact, Contact, ContactModel};
use crate::errors::ServiceError;

/// Shipping-contact management. Every order references exactly one contact,
/// so basket building needs these to exist; anything beyond owner-scoped
/// create/list/delete belongs to the identity service.
#[derive(Clone)]
pub struct ContactService {
    db: Arc<DatabaseConnection>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateContactInput {
    #[validate(length(min = 1, max = 50))]
    pub city: String,
    #[validate(length(min = 1, max = 100))]
    pub street: String,
    #[serde(default)]
    pub house: String,
    #[serde(default)]
    pub structure: String,
    #[serde(default)]
    pub building: String,
    #[serde(default)]
    pub apartment: String,
    #[validate(length(min = 1, max = 20))]
    pub phone: String,
    #[serde(default)]
    pub note: Option<String>,
}

impl ContactService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, input), fields(user_id = %user_id))]
    pub async fn create_contact(
        &self,
        user_id: Uuid,
        input: CreateContactInput,
    ) -> Result<ContactModel, ServiceError> {
        input.validate()?;

        let contact = contact::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            city: Set(input.city),
            street: Set(input.street),
            house: Set(input.house),
            structure: Set(input.structure),
            building: Set(input.building),
            apartment: Set(input.apartment),
            phone: Set(input.phone),
            note: Set(input.note),
        };

        let contact = contact.insert(&*self.db).await?;
        info!(contact_id = %contact.id, "Contact created");
        Ok(contact)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_contacts(&self, user_id: Uuid) -> Result<Vec<ContactModel>, ServiceError> {
        let contacts = Contact::find()
            .filter(contact::Column::UserId.eq(user_id))
            .order_by_asc(contact::Column::City)
            .all(&*self.db)
            .await?;
        Ok(contacts)
    }

    #[instrument(skip(self), fields(user_id = %user_id, contact_id = %contact_id))]
    pub async fn delete_contact(
        &self,
        user_id: Uuid,
        contact_id: Uuid,
    ) -> Result<(), ServiceError> {
        let contact = Contact::find_by_id(contact_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Contact {} not found", contact_id)))?;

        if contact.user_id != user_id {
            return Err(ServiceError::Forbidden(
                "You do not own this contact".to_string(),
            ));
        }

        contact.delete(&*self.db).await?;
        info!(contact_id = %contact_id, "Contact deleted");
        Ok(())
    }
}
