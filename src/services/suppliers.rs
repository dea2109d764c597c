use crate::{
    entities::{
        accessory, phone,
        purchase_order::{self, PurchaseOrderStatus},
        supplied_product, supplier, ModelType,
    },
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateSupplier {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub address: Option<String>,
}

/// Partial update; absent fields are left as they are.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateSupplier {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub address: Option<String>,
}

/// A supplier together with the products it is linked to.
#[derive(Debug, Clone, Serialize)]
pub struct SupplierDetails {
    #[serde(flatten)]
    pub supplier: supplier::Model,
    pub supplied_products: Vec<supplied_product::Model>,
}

#[derive(Clone)]
pub struct SupplierService {
    db: Arc<DatabaseConnection>,
}

impl SupplierService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn create_supplier(
        &self,
        input: CreateSupplier,
    ) -> Result<supplier::Model, ServiceError> {
        input.validate()?;

        let now = Utc::now();
        let model = supplier::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            contact_person: Set(input.contact_person),
            phone: Set(input.phone),
            email: Set(input.email),
            address: Set(input.address),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        info!(supplier_id = %model.id, "Supplier created");
        Ok(model)
    }

    #[instrument(skip(self))]
    pub async fn get_supplier(&self, id: Uuid) -> Result<SupplierDetails, ServiceError> {
        let supplier = supplier::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("supplier", id))?;

        let supplied_products = supplier
            .find_related(supplied_product::Entity)
            .order_by_asc(supplied_product::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        Ok(SupplierDetails {
            supplier,
            supplied_products,
        })
    }

    #[instrument(skip(self))]
    pub async fn list_suppliers(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<supplier::Model>, u64), ServiceError> {
        let paginator = supplier::Entity::find()
            .order_by_asc(supplier::Column::Name)
            .paginate(&*self.db, per_page.max(1));

        let total = paginator.num_items().await?;
        let suppliers = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((suppliers, total))
    }

    #[instrument(skip(self, input))]
    pub async fn update_supplier(
        &self,
        id: Uuid,
        input: UpdateSupplier,
    ) -> Result<supplier::Model, ServiceError> {
        input.validate()?;
        let existing = supplier::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("supplier", id))?;

        let mut active: supplier::ActiveModel = existing.into();
        if let Some(name) = input.name {
            active.name = Set(name.trim().to_string());
        }
        if input.contact_person.is_some() {
            active.contact_person = Set(input.contact_person);
        }
        if input.phone.is_some() {
            active.phone = Set(input.phone);
        }
        if input.email.is_some() {
            active.email = Set(input.email);
        }
        if input.address.is_some() {
            active.address = Set(input.address);
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        info!(supplier_id = %id, "Supplier updated");
        Ok(updated)
    }

    /// Deletes a supplier with no open purchase orders. Its supplied-products
    /// set goes with it and products that named it lose the link.
    #[instrument(skip(self))]
    pub async fn delete_supplier(&self, id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db;
        ensure_supplier_exists(db, id).await?;

        let open_orders = purchase_order::Entity::find()
            .filter(purchase_order::Column::SupplierId.eq(id))
            .filter(purchase_order::Column::Status.is_in([
                PurchaseOrderStatus::Created,
                PurchaseOrderStatus::Ordered,
            ]))
            .count(db)
            .await?;
        if open_orders > 0 {
            return Err(ServiceError::InvalidState(format!(
                "supplier {} has {} open purchase orders",
                id, open_orders
            )));
        }

        let txn = db.begin().await?;
        supplied_product::Entity::delete_many()
            .filter(supplied_product::Column::SupplierId.eq(id))
            .exec(&txn)
            .await?;
        phone::Entity::update_many()
            .col_expr(phone::Column::SupplierId, Expr::value(Option::<Uuid>::None))
            .filter(phone::Column::SupplierId.eq(id))
            .exec(&txn)
            .await?;
        accessory::Entity::update_many()
            .col_expr(accessory::Column::SupplierId, Expr::value(Option::<Uuid>::None))
            .filter(accessory::Column::SupplierId.eq(id))
            .exec(&txn)
            .await?;
        supplier::Entity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        info!(supplier_id = %id, "Supplier deleted");
        Ok(())
    }
}

pub(crate) async fn ensure_supplier_exists<C: ConnectionTrait>(
    conn: &C,
    supplier_id: Uuid,
) -> Result<(), ServiceError> {
    supplier::Entity::find_by_id(supplier_id)
        .one(conn)
        .await?
        .map(|_| ())
        .ok_or_else(|| ServiceError::not_found("supplier", supplier_id))
}

/// Adds the product to the supplier's set, or refreshes the existing entry.
/// An existing entry keeps its restock date unless `restocked_at` is given.
pub(crate) async fn link_product<C: ConnectionTrait>(
    conn: &C,
    supplier_id: Uuid,
    product_id: Uuid,
    model_type: ModelType,
    restocked_at: Option<DateTime<Utc>>,
) -> Result<(), ServiceError> {
    let now = Utc::now();
    let existing = supplied_product::Entity::find()
        .filter(supplied_product::Column::SupplierId.eq(supplier_id))
        .filter(supplied_product::Column::ProductId.eq(product_id))
        .filter(supplied_product::Column::ModelType.eq(model_type))
        .one(conn)
        .await?;

    match existing {
        Some(entry) => {
            if restocked_at.is_some() {
                let mut active: supplied_product::ActiveModel = entry.into();
                active.last_restock_date = Set(restocked_at);
                active.updated_at = Set(now);
                active.update(conn).await?;
            }
        }
        None => {
            supplied_product::ActiveModel {
                id: Set(Uuid::new_v4()),
                supplier_id: Set(supplier_id),
                product_id: Set(product_id),
                model_type: Set(model_type),
                last_restock_date: Set(restocked_at),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(conn)
            .await?;
        }
    }
    Ok(())
}

pub(crate) async fn unlink_product<C: ConnectionTrait>(
    conn: &C,
    supplier_id: Uuid,
    product_id: Uuid,
    model_type: ModelType,
) -> Result<(), ServiceError> {
    supplied_product::Entity::delete_many()
        .filter(supplied_product::Column::SupplierId.eq(supplier_id))
        .filter(supplied_product::Column::ProductId.eq(product_id))
        .filter(supplied_product::Column::ModelType.eq(model_type))
        .exec(conn)
        .await?;
    Ok(())
}

/// Moves the back-reference when a product's supplier link changes.
pub(crate) async fn relink_product<C: ConnectionTrait>(
    conn: &C,
    old_supplier: Option<Uuid>,
    new_supplier: Option<Uuid>,
    product_id: Uuid,
    model_type: ModelType,
) -> Result<(), ServiceError> {
    if old_supplier == new_supplier {
        return Ok(());
    }
    if let Some(old) = old_supplier {
        unlink_product(conn, old, product_id, model_type).await?;
    }
    if let Some(new) = new_supplier {
        link_product(conn, new, product_id, model_type, None).await?;
    }
    Ok(())
}

/// Removes the product from every supplier's set.
pub(crate) async fn unlink_everywhere<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    model_type: ModelType,
) -> Result<u64, ServiceError> {
    let result = supplied_product::Entity::delete_many()
        .filter(supplied_product::Column::ProductId.eq(product_id))
        .filter(supplied_product::Column::ModelType.eq(model_type))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}
