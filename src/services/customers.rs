use crate::{
    entities::{customer, customer_purchase},
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateCustomer {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 3, max = 30))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
}

/// Partial update; absent fields are left as they are.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateCustomer {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 3, max = 30))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
}

/// A customer with their purchase history, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerDetails {
    #[serde(flatten)]
    pub customer: customer::Model,
    pub purchases: Vec<customer_purchase::Model>,
    pub total_spent: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CustomerFilter {
    /// Matches name or phone
    pub q: Option<String>,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CustomerSearch {
    /// Case-insensitive fragment of a name or phone number
    pub q: String,
    pub limit: Option<u64>,
}

const DEFAULT_SEARCH_LIMIT: u64 = 20;

/// Case-insensitive name-or-phone match.
fn matches_name_or_phone(q: &str) -> Condition {
    let pattern = format!("%{}%", q.to_lowercase());
    Condition::any()
        .add(Expr::expr(Func::lower(Expr::col(customer::Column::Name))).like(pattern))
        .add(customer::Column::Phone.contains(q))
}

fn normalize_phone(phone: Option<&str>) -> Option<String> {
    phone
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
}

async fn ensure_phone_free<C: ConnectionTrait>(
    conn: &C,
    phone: &str,
    except: Option<Uuid>,
) -> Result<(), ServiceError> {
    let mut query = customer::Entity::find().filter(customer::Column::Phone.eq(phone));
    if let Some(id) = except {
        query = query.filter(customer::Column::Id.ne(id));
    }
    if query.count(conn).await? > 0 {
        return Err(ServiceError::Conflict(format!(
            "customer with phone {} already exists",
            phone
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct CustomerService {
    db: Arc<DatabaseConnection>,
}

impl CustomerService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Phone numbers are unique when present.
    #[instrument(skip(self, input))]
    pub async fn create_customer(
        &self,
        input: CreateCustomer,
    ) -> Result<customer::Model, ServiceError> {
        input.validate()?;
        let db = &*self.db;

        let phone = normalize_phone(input.phone.as_deref());
        if let Some(phone) = &phone {
            ensure_phone_free(db, phone, None).await?;
        }

        let now = Utc::now();
        let model = customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            phone: Set(phone),
            email: Set(input.email),
            address: Set(input.address),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await?;

        info!(customer_id = %model.id, "Customer created");
        Ok(model)
    }

    #[instrument(skip(self))]
    pub async fn get_customer(&self, id: Uuid) -> Result<CustomerDetails, ServiceError> {
        let db = &*self.db;
        let customer = customer::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("customer", id))?;

        let purchases = customer
            .find_related(customer_purchase::Entity)
            .order_by_desc(customer_purchase::Column::PurchasedAt)
            .all(db)
            .await?;
        let total_spent = purchases.iter().map(|p| p.total_spent).sum();

        Ok(CustomerDetails {
            customer,
            purchases,
            total_spent,
        })
    }

    #[instrument(skip(self))]
    pub async fn list_customers(
        &self,
        filter: &CustomerFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<customer::Model>, u64), ServiceError> {
        let mut query = customer::Entity::find();
        if let Some(q) = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            query = query.filter(matches_name_or_phone(q));
        }

        let paginator = query
            .order_by_asc(customer::Column::Name)
            .paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let customers = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((customers, total))
    }

    #[instrument(skip(self, input))]
    pub async fn update_customer(
        &self,
        id: Uuid,
        input: UpdateCustomer,
    ) -> Result<customer::Model, ServiceError> {
        input.validate()?;
        let db = &*self.db;
        let existing = customer::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("customer", id))?;

        let mut active: customer::ActiveModel = existing.into();
        if let Some(name) = input.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(phone) = normalize_phone(input.phone.as_deref()) {
            ensure_phone_free(db, &phone, Some(id)).await?;
            active.phone = Set(Some(phone));
        }
        if input.email.is_some() {
            active.email = Set(input.email);
        }
        if input.address.is_some() {
            active.address = Set(input.address);
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await?;

        info!(customer_id = %id, "Customer updated");
        Ok(updated)
    }

    /// Quick lookup for the till by name or phone fragment, ordered by name.
    #[instrument(skip(self))]
    pub async fn search_customers(
        &self,
        search: &CustomerSearch,
    ) -> Result<Vec<customer::Model>, ServiceError> {
        let q = search.q.trim();
        if q.is_empty() {
            return Err(ServiceError::ValidationError(
                "search query must not be empty".to_string(),
            ));
        }

        let customers = customer::Entity::find()
            .filter(matches_name_or_phone(q))
            .order_by_asc(customer::Column::Name)
            .limit(search.limit.unwrap_or(DEFAULT_SEARCH_LIMIT).clamp(1, 100))
            .all(&*self.db)
            .await?;
        Ok(customers)
    }
}
