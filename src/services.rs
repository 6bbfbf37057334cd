use serde_json::Value;
use std::sync::Arc;

use crate::client_store::ClientStore;
use crate::errors::{AppError, ResultExt};
use crate::models::*;

/// Client CRUD with validation and partial-update semantics.
#[derive(Clone)]
pub struct ClientService {
    store: Arc<dyn ClientStore>,
}

impl ClientService {
    pub fn new(store: Arc<dyn ClientStore>) -> Self {
        Self { store }
    }

    pub async fn get_client(&self, id: i64) -> Result<Client, AppError> {
        tracing::debug!("Getting client {}", id);
        self.store.get_by_id(id).await.context("failed to get client")
    }

    /// Searches by name fragments and/or exact birth date. At least one
    /// parameter is required; the store is not queried otherwise.
    pub async fn search_clients(&self, params: &SearchParams) -> Result<Vec<Client>, AppError> {
        let filter = params.to_filter()?;
        tracing::debug!("Searching clients: {:?}", filter);

        self.store
            .search(&filter)
            .await
            .context("failed to search clients")
    }

    pub async fn create_client(&self, req: CreateClientRequest) -> Result<Client, AppError> {
        tracing::debug!("Creating client {} {}", req.first_name, req.last_name);

        let new_client = NewClient {
            first_name: required_name("first_name", &req.first_name)?,
            last_name: required_name("last_name", &req.last_name)?,
            middle_name: optional_name("middle_name", req.middle_name.as_deref())?,
            birth_date: parse_api_date(&req.birth_date)?,
            features: req.features.map(Value::Object),
        };

        if !new_client.is_valid() {
            return Err(AppError::BadRequest("client has invalid fields".to_string()));
        }

        let client = self
            .store
            .create(&new_client)
            .await
            .context("failed to create client")?;

        tracing::info!("Client created successfully: {}", client.id);
        Ok(client)
    }

    /// Applies the non-empty fields of `req` to the stored client.
    pub async fn update_client(
        &self,
        id: i64,
        req: UpdateClientRequest,
    ) -> Result<Client, AppError> {
        tracing::debug!("Updating client {}", id);

        let mut client = self
            .store
            .get_by_id(id)
            .await
            .context("failed to get client for update")?;

        if let Some(first_name) = non_blank(req.first_name.as_deref()) {
            client.first_name = required_name("first_name", first_name)?;
        }
        if let Some(last_name) = non_blank(req.last_name.as_deref()) {
            client.last_name = required_name("last_name", last_name)?;
        }
        if let Some(middle_name) = non_blank(req.middle_name.as_deref()) {
            client.middle_name = optional_name("middle_name", Some(middle_name))?;
        }
        if let Some(birth_date) = non_blank(req.birth_date.as_deref()) {
            client.birth_date = parse_api_date(birth_date)?;
        }
        if let Some(features) = req.features {
            client.features = Some(Value::Object(features));
        }

        if !client.is_valid() {
            return Err(AppError::BadRequest("client has invalid fields".to_string()));
        }

        let updated = self
            .store
            .update(&client)
            .await
            .context("failed to update client")?;

        tracing::info!("Client updated successfully: {}", id);
        Ok(updated)
    }

    pub async fn delete_client(&self, id: i64) -> Result<(), AppError> {
        tracing::debug!("Deleting client {}", id);

        self.store
            .delete(id)
            .await
            .context("failed to delete client")?;

        tracing::info!("Client deleted successfully: {}", id);
        Ok(())
    }

    pub async fn list_clients(&self, limit: i64, offset: i64) -> Result<Vec<Client>, AppError> {
        tracing::debug!("Listing clients: limit={}, offset={}", limit, offset);

        self.store
            .list(limit, offset)
            .await
            .context("failed to list clients")
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn required_name(field: &str, value: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::BadRequest(format!("{} is required", field)));
    }
    check_length(field, value)?;
    Ok(value.to_string())
}

fn optional_name(field: &str, value: Option<&str>) -> Result<Option<String>, AppError> {
    match non_blank(value) {
        Some(value) => {
            let value = value.trim();
            check_length(field, value)?;
            Ok(Some(value.to_string()))
        }
        None => Ok(None),
    }
}

fn check_length(field: &str, value: &str) -> Result<(), AppError> {
    if value.chars().count() > MAX_NAME_LENGTH {
        return Err(AppError::BadRequest(format!(
            "{} must be at most {} characters",
            field, MAX_NAME_LENGTH
        )));
    }
    Ok(())
}
