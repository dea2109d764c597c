//! Phone and accessory catalog.
//!
//! Stock on a new product or variant starts at zero and is raised through the
//! inventory adjuster with an `initial` movement, so the ledger accounts for
//! every unit from the first one.

use crate::{
    entities::{accessory, phone, phone_variant, ModelType, MovementType, VariantCondition},
    errors::ServiceError,
    events::EventSender,
    services::{
        inventory::{
            apply_adjustment, load_variants, publish_adjustments, sync_phone_stock,
            MovementContext, StockAdjustment, StockTarget,
        },
        pricing::validate_non_negative,
        suppliers,
    },
};
use chrono::Utc;
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Select, Set, TransactionTrait,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

pub const DEFAULT_PHONE_THRESHOLD: i32 = 5;
pub const DEFAULT_ACCESSORY_THRESHOLD: i32 = 10;
const INITIAL_STOCK_REFERENCE: &str = "initial_stock";
const ACCESSORY_SKU_ATTEMPTS: usize = 5;

static NON_SLUG_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());
static NON_SKU_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Z0-9]").unwrap());

/// `"Apple iPhone 13 Pro"` → `"apple-iphone-13-pro"`.
pub fn slugify(input: &str) -> String {
    NON_SLUG_CHARS
        .replace_all(&input.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

fn take_upper(input: &str, n: usize) -> String {
    input.chars().take(n).collect::<String>().to_uppercase()
}

fn without_whitespace(input: &str) -> String {
    input.split_whitespace().collect()
}

/// `BRAND3-MODEL5-STORAGE-COLOR4-COND`, empty parts skipped.
pub fn variant_sku(
    brand: &str,
    model: &str,
    storage: &str,
    color: &str,
    condition: VariantCondition,
) -> String {
    [
        take_upper(brand.trim(), 3),
        take_upper(&without_whitespace(model), 5),
        storage.to_uppercase(),
        take_upper(&without_whitespace(color), 4),
        condition.sku_code().to_string(),
    ]
    .into_iter()
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join("-")
}

/// `ACC-{NAME4}-{TYPE4}-{NNNN}`.
pub fn accessory_sku(name: &str, accessory_type: &str, suffix: u16) -> String {
    let clean = |s: &str| NON_SKU_CHARS.replace_all(&s.trim().to_uppercase(), "").to_string();
    format!(
        "ACC-{}-{}-{}",
        take_upper(&clean(name), 4),
        take_upper(&clean(accessory_type), 4),
        suffix
    )
}

fn ensure_object(field: &str, value: &Value) -> Result<(), ServiceError> {
    if value.is_object() {
        Ok(())
    } else {
        Err(ServiceError::ValidationError(format!(
            "{} must be a JSON object",
            field
        )))
    }
}

/// Lets an update distinguish an absent field from an explicit `null`.
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateVariant {
    #[validate(length(min = 1, max = 20))]
    pub storage: String,
    #[validate(length(max = 50))]
    #[serde(default)]
    pub color: String,
    pub condition: VariantCondition,
    #[validate(custom = "validate_non_negative")]
    #[schema(value_type = String, example = "350.00")]
    pub purchase_price: Decimal,
    #[validate(custom = "validate_non_negative")]
    #[schema(value_type = String, example = "420.00")]
    pub selling_price: Decimal,
    #[validate(range(min = 0, max = 1000000))]
    #[serde(default)]
    pub stock: i32,
    #[validate(length(min = 1, max = 64))]
    pub sku: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreatePhone {
    #[validate(length(min = 1, max = 100))]
    pub brand: String,
    #[validate(length(min = 1, max = 100))]
    pub model: String,
    #[validate(length(min = 1, max = 200))]
    pub slug: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub sku: Option<String>,
    #[validate(custom = "validate_non_negative")]
    #[schema(value_type = String, example = "350.00")]
    pub purchase_price: Decimal,
    #[validate(custom = "validate_non_negative")]
    #[schema(value_type = String, example = "420.00")]
    pub selling_price: Decimal,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    #[schema(value_type = Object)]
    pub specs: Option<Value>,
    #[serde(default)]
    pub images: Vec<String>,
    pub category_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    #[validate(range(min = 0))]
    pub low_stock_threshold: Option<i32>,
    /// Opening stock of a phone sold without variants
    #[validate(range(min = 0, max = 1000000))]
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub variants: Vec<CreateVariant>,
}

/// Partial update; stock is changed only through inventory operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdatePhone {
    #[validate(length(min = 1, max = 100))]
    pub brand: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub model: Option<String>,
    #[validate(custom = "validate_non_negative")]
    #[schema(value_type = Option<String>)]
    pub purchase_price: Option<Decimal>,
    #[validate(custom = "validate_non_negative")]
    #[schema(value_type = Option<String>)]
    pub selling_price: Option<Decimal>,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub specs: Option<Value>,
    pub images: Option<Vec<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<Uuid>)]
    pub category_id: Option<Option<Uuid>>,
    /// `null` detaches the supplier
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<Uuid>)]
    pub supplier_id: Option<Option<Uuid>>,
    #[validate(range(min = 0))]
    pub low_stock_threshold: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhoneDetails {
    #[serde(flatten)]
    pub phone: phone::Model,
    pub variants: Vec<phone_variant::Model>,
    pub is_low_stock: bool,
    pub is_out_of_stock: bool,
}

impl PhoneDetails {
    fn new(phone: phone::Model, variants: Vec<phone_variant::Model>) -> Self {
        Self {
            is_low_stock: phone.is_low_stock(),
            is_out_of_stock: phone.is_out_of_stock(),
            phone,
            variants,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PhoneSort {
    Name,
    PriceAsc,
    PriceDesc,
    StockAsc,
    StockDesc,
    #[default]
    Latest,
    Oldest,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PhoneFilter {
    pub brand: Option<String>,
    /// Matches brand or model
    pub q: Option<String>,
    pub is_active: Option<bool>,
    pub supplier_id: Option<Uuid>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub sort: Option<PhoneSort>,
}

impl PhoneFilter {
    fn apply(&self, mut query: Select<phone::Entity>) -> Select<phone::Entity> {
        if let Some(brand) = &self.brand {
            query = query.filter(phone::Column::Brand.eq(brand.as_str()));
        }
        if let Some(q) = self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(phone::Column::Brand.contains(q))
                    .add(phone::Column::Model.contains(q)),
            );
        }
        if let Some(is_active) = self.is_active {
            query = query.filter(phone::Column::IsActive.eq(is_active));
        }
        if let Some(supplier_id) = self.supplier_id {
            query = query.filter(phone::Column::SupplierId.eq(supplier_id));
        }
        if let Some(min) = self.min_price {
            query = query.filter(phone::Column::SellingPrice.gte(min));
        }
        if let Some(max) = self.max_price {
            query = query.filter(phone::Column::SellingPrice.lte(max));
        }

        match self.sort.unwrap_or_default() {
            PhoneSort::Name => query
                .order_by_asc(phone::Column::Brand)
                .order_by_asc(phone::Column::Model),
            PhoneSort::PriceAsc => query.order_by_asc(phone::Column::SellingPrice),
            PhoneSort::PriceDesc => query.order_by_desc(phone::Column::SellingPrice),
            PhoneSort::StockAsc => query.order_by_asc(phone::Column::Stock),
            PhoneSort::StockDesc => query.order_by_desc(phone::Column::Stock),
            PhoneSort::Latest => query.order_by_desc(phone::Column::CreatedAt),
            PhoneSort::Oldest => query.order_by_asc(phone::Column::CreatedAt),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateAccessory {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub accessory_type: String,
    pub brand: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub sku: Option<String>,
    #[validate(custom = "validate_non_negative")]
    #[schema(value_type = String, example = "3.50")]
    pub purchase_price: Decimal,
    #[validate(custom = "validate_non_negative")]
    #[schema(value_type = String, example = "8.00")]
    pub selling_price: Decimal,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    /// Slugs of compatible phones
    #[serde(default)]
    pub compatibility: Vec<String>,
    #[schema(value_type = Object)]
    pub attributes: Option<Value>,
    pub category_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    #[validate(range(min = 0, max = 1000000))]
    #[serde(default)]
    pub stock: i32,
    #[validate(range(min = 0))]
    pub low_stock_threshold: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateAccessory {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub accessory_type: Option<String>,
    pub brand: Option<String>,
    #[validate(custom = "validate_non_negative")]
    #[schema(value_type = Option<String>)]
    pub purchase_price: Option<Decimal>,
    #[validate(custom = "validate_non_negative")]
    #[schema(value_type = Option<String>)]
    pub selling_price: Option<Decimal>,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    pub images: Option<Vec<String>>,
    pub compatibility: Option<Vec<String>>,
    #[schema(value_type = Option<Object>)]
    pub attributes: Option<Value>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<Uuid>)]
    pub category_id: Option<Option<Uuid>>,
    /// `null` detaches the supplier
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<Uuid>)]
    pub supplier_id: Option<Option<Uuid>>,
    #[validate(range(min = 0))]
    pub low_stock_threshold: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessoryDetails {
    #[serde(flatten)]
    pub accessory: accessory::Model,
    pub is_low_stock: bool,
    pub is_out_of_stock: bool,
}

impl From<accessory::Model> for AccessoryDetails {
    fn from(accessory: accessory::Model) -> Self {
        Self {
            is_low_stock: accessory.is_low_stock(),
            is_out_of_stock: accessory.is_out_of_stock(),
            accessory,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AccessoryFilter {
    pub accessory_type: Option<String>,
    pub brand: Option<String>,
    /// Matches name or SKU
    pub q: Option<String>,
    pub is_active: Option<bool>,
    pub supplier_id: Option<Uuid>,
}

impl AccessoryFilter {
    fn apply(&self, mut query: Select<accessory::Entity>) -> Select<accessory::Entity> {
        if let Some(accessory_type) = &self.accessory_type {
            query = query.filter(accessory::Column::AccessoryType.eq(accessory_type.as_str()));
        }
        if let Some(brand) = &self.brand {
            query = query.filter(accessory::Column::Brand.eq(brand.as_str()));
        }
        if let Some(q) = self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(accessory::Column::Name.contains(q))
                    .add(accessory::Column::Sku.contains(q)),
            );
        }
        if let Some(is_active) = self.is_active {
            query = query.filter(accessory::Column::IsActive.eq(is_active));
        }
        if let Some(supplier_id) = self.supplier_id {
            query = query.filter(accessory::Column::SupplierId.eq(supplier_id));
        }
        query.order_by_asc(accessory::Column::Name)
    }
}

async fn phone_slug_taken<C: ConnectionTrait>(conn: &C, slug: &str) -> Result<bool, ServiceError> {
    Ok(phone::Entity::find()
        .filter(phone::Column::Slug.eq(slug))
        .count(conn)
        .await?
        > 0)
}

async fn variant_sku_taken<C: ConnectionTrait>(conn: &C, sku: &str) -> Result<bool, ServiceError> {
    Ok(phone_variant::Entity::find()
        .filter(phone_variant::Column::Sku.eq(sku))
        .count(conn)
        .await?
        > 0)
}

async fn accessory_sku_taken<C: ConnectionTrait>(
    conn: &C,
    sku: &str,
) -> Result<bool, ServiceError> {
    Ok(accessory::Entity::find()
        .filter(accessory::Column::Sku.eq(sku))
        .count(conn)
        .await?
        > 0)
}

async fn insert_variant<C: ConnectionTrait>(
    conn: &C,
    phone_id: Uuid,
    sku: String,
    input: &CreateVariant,
) -> Result<phone_variant::Model, ServiceError> {
    let now = Utc::now();
    let variant = phone_variant::ActiveModel {
        id: Set(Uuid::new_v4()),
        phone_id: Set(phone_id),
        sku: Set(sku),
        storage: Set(input.storage.trim().to_string()),
        color: Set(input.color.trim().to_string()),
        condition: Set(input.condition),
        purchase_price: Set(input.purchase_price),
        selling_price: Set(input.selling_price),
        stock: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await?;
    Ok(variant)
}

#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    default_currency: String,
}

impl CatalogService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        default_currency: String,
    ) -> Self {
        Self {
            db,
            event_sender,
            default_currency,
        }
    }

    fn currency(&self, requested: Option<String>) -> String {
        requested
            .map(|c| c.to_uppercase())
            .unwrap_or_else(|| self.default_currency.clone())
    }

    /// Creates a phone with its variants and records opening stock.
    #[instrument(skip(self, input), fields(brand = %input.brand, model = %input.model))]
    pub async fn create_phone(
        &self,
        input: CreatePhone,
        actor: Option<Uuid>,
    ) -> Result<PhoneDetails, ServiceError> {
        input.validate()?;
        for (idx, variant) in input.variants.iter().enumerate() {
            variant
                .validate()
                .map_err(|e| ServiceError::from(e).at_line(idx + 1))?;
        }
        let specs = input
            .specs
            .clone()
            .unwrap_or_else(|| Value::Object(Default::default()));
        ensure_object("specs", &specs)?;
        if !input.variants.is_empty() && input.stock > 0 {
            return Err(ServiceError::ValidationError(
                "stock of a phone with variants is the sum of its variants".to_string(),
            ));
        }

        let db = &*self.db;
        if let Some(supplier_id) = input.supplier_id {
            suppliers::ensure_supplier_exists(db, supplier_id).await?;
        }

        let slug = slugify(
            input
                .slug
                .as_deref()
                .unwrap_or(&format!("{} {}", input.brand, input.model)),
        );
        if slug.is_empty() {
            return Err(ServiceError::ValidationError(
                "slug must contain at least one letter or digit".to_string(),
            ));
        }
        if phone_slug_taken(db, &slug).await? {
            return Err(ServiceError::Conflict(format!(
                "phone slug {} already exists",
                slug
            )));
        }

        let mut skus = Vec::with_capacity(input.variants.len());
        let mut seen = HashSet::new();
        for variant in &input.variants {
            let sku = match &variant.sku {
                Some(sku) => sku.trim().to_uppercase(),
                None => variant_sku(
                    &input.brand,
                    &input.model,
                    &variant.storage,
                    &variant.color,
                    variant.condition,
                ),
            };
            if !seen.insert(sku.clone()) || variant_sku_taken(db, &sku).await? {
                return Err(ServiceError::Conflict(format!(
                    "variant sku {} already exists",
                    sku
                )));
            }
            skus.push(sku);
        }

        let now = Utc::now();
        let phone_id = Uuid::new_v4();
        let ctx = MovementContext::new(MovementType::Initial, INITIAL_STOCK_REFERENCE)
            .reference_id(Some(phone_id))
            .handled_by(actor);

        let txn = db.begin().await?;
        phone::ActiveModel {
            id: Set(phone_id),
            brand: Set(input.brand.trim().to_string()),
            model: Set(input.model.trim().to_string()),
            slug: Set(slug),
            sku: Set(input.sku.clone()),
            purchase_price: Set(input.purchase_price),
            selling_price: Set(input.selling_price),
            currency: Set(self.currency(input.currency.clone())),
            specs: Set(specs),
            images: Set(serde_json::json!(input.images)),
            category_id: Set(input.category_id),
            supplier_id: Set(input.supplier_id),
            stock: Set(0),
            low_stock_threshold: Set(input
                .low_stock_threshold
                .unwrap_or(DEFAULT_PHONE_THRESHOLD)),
            is_active: Set(true),
            version: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let mut adjustments: Vec<StockAdjustment> = Vec::new();
        for (variant_input, sku) in input.variants.iter().zip(skus) {
            let variant = insert_variant(&txn, phone_id, sku, variant_input).await?;
            if variant_input.stock > 0 {
                let target = StockTarget {
                    product_id: phone_id,
                    model_type: ModelType::Phone,
                    variant_id: Some(variant.id),
                };
                let adjustment = apply_adjustment(&txn, target, variant_input.stock, &ctx).await?;
                adjustments.push(adjustment);
            }
        }
        if input.variants.is_empty() && input.stock > 0 {
            let target = StockTarget {
                product_id: phone_id,
                model_type: ModelType::Phone,
                variant_id: None,
            };
            adjustments.push(apply_adjustment(&txn, target, input.stock, &ctx).await?);
        }
        if let Some(supplier_id) = input.supplier_id {
            suppliers::link_product(&txn, supplier_id, phone_id, ModelType::Phone, None).await?;
        }
        txn.commit().await?;

        metrics::counter!("phonestore.catalog.phones_created", 1);
        info!(phone_id = %phone_id, variants = input.variants.len(), "Phone created");
        publish_adjustments(&self.event_sender, &adjustments).await;

        self.get_phone(phone_id).await
    }

    #[instrument(skip(self))]
    pub async fn get_phone(&self, id: Uuid) -> Result<PhoneDetails, ServiceError> {
        let db = &*self.db;
        let phone = phone::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("phone", id))?;
        let variants = load_variants(db, id).await?;
        Ok(PhoneDetails::new(phone, variants))
    }

    #[instrument(skip(self))]
    pub async fn list_phones(
        &self,
        filter: &PhoneFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<phone::Model>, u64), ServiceError> {
        let paginator = filter
            .apply(phone::Entity::find())
            .paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let phones = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((phones, total))
    }

    #[instrument(skip(self, input))]
    pub async fn update_phone(
        &self,
        id: Uuid,
        input: UpdatePhone,
    ) -> Result<PhoneDetails, ServiceError> {
        input.validate()?;
        if let Some(specs) = &input.specs {
            ensure_object("specs", specs)?;
        }

        let db = &*self.db;
        let current = phone::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("phone", id))?;
        if let Some(Some(supplier_id)) = input.supplier_id {
            suppliers::ensure_supplier_exists(db, supplier_id).await?;
        }

        let old_supplier = current.supplier_id;
        let mut active: phone::ActiveModel = current.into();
        if let Some(brand) = input.brand {
            active.brand = Set(brand.trim().to_string());
        }
        if let Some(model) = input.model {
            active.model = Set(model.trim().to_string());
        }
        if let Some(price) = input.purchase_price {
            active.purchase_price = Set(price);
        }
        if let Some(price) = input.selling_price {
            active.selling_price = Set(price);
        }
        if let Some(currency) = input.currency {
            active.currency = Set(currency.to_uppercase());
        }
        if let Some(specs) = input.specs {
            active.specs = Set(specs);
        }
        if let Some(images) = input.images {
            active.images = Set(serde_json::json!(images));
        }
        if let Some(category_id) = input.category_id {
            active.category_id = Set(category_id);
        }
        if let Some(supplier_id) = input.supplier_id {
            active.supplier_id = Set(supplier_id);
        }
        if let Some(threshold) = input.low_stock_threshold {
            active.low_stock_threshold = Set(threshold);
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());

        let txn = db.begin().await?;
        let updated = active.update(&txn).await?;
        suppliers::relink_product(
            &txn,
            old_supplier,
            updated.supplier_id,
            id,
            ModelType::Phone,
        )
        .await?;
        txn.commit().await?;

        info!(phone_id = %id, "Phone updated");
        self.get_phone(id).await
    }

    /// Adds a variant and folds its opening stock into the phone total.
    #[instrument(skip(self, input))]
    pub async fn add_variant(
        &self,
        phone_id: Uuid,
        input: CreateVariant,
        actor: Option<Uuid>,
    ) -> Result<PhoneDetails, ServiceError> {
        input.validate()?;

        let db = &*self.db;
        let phone = phone::Entity::find_by_id(phone_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("phone", phone_id))?;
        let existing = load_variants(db, phone_id).await?;
        if existing.is_empty() && phone.stock > 0 {
            return Err(ServiceError::InvalidState(format!(
                "{} holds {} units without variants; move them to zero before adding variants",
                phone.display_name(),
                phone.stock
            )));
        }

        let sku = match &input.sku {
            Some(sku) => sku.trim().to_uppercase(),
            None => variant_sku(
                &phone.brand,
                &phone.model,
                &input.storage,
                &input.color,
                input.condition,
            ),
        };
        if variant_sku_taken(db, &sku).await? {
            return Err(ServiceError::Conflict(format!(
                "variant sku {} already exists",
                sku
            )));
        }

        let txn = db.begin().await?;
        let variant = insert_variant(&txn, phone_id, sku, &input).await?;
        let adjustment = if input.stock > 0 {
            let ctx = MovementContext::new(MovementType::Initial, INITIAL_STOCK_REFERENCE)
                .reference_id(Some(phone_id))
                .handled_by(actor);
            let target = StockTarget {
                product_id: phone_id,
                model_type: ModelType::Phone,
                variant_id: Some(variant.id),
            };
            Some(apply_adjustment(&txn, target, input.stock, &ctx).await?)
        } else {
            sync_phone_stock(&txn, phone_id).await?;
            None
        };
        txn.commit().await?;

        info!(phone_id = %phone_id, variant_id = %variant.id, sku = %variant.sku, "Variant added");
        if let Some(adjustment) = adjustment {
            publish_adjustments(&self.event_sender, std::slice::from_ref(&adjustment)).await;
        }
        self.get_phone(phone_id).await
    }

    #[instrument(skip(self))]
    pub async fn deactivate_phone(&self, id: Uuid) -> Result<PhoneDetails, ServiceError> {
        self.update_phone(
            id,
            UpdatePhone {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
    }

    /// Hard delete. Variants cascade; movements stay in the ledger.
    #[instrument(skip(self))]
    pub async fn delete_phone(&self, id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        let deleted = phone::Entity::delete_by_id(id).exec(&txn).await?;
        if deleted.rows_affected == 0 {
            return Err(ServiceError::not_found("phone", id));
        }
        let pruned = suppliers::unlink_everywhere(&txn, id, ModelType::Phone).await?;
        txn.commit().await?;

        info!(phone_id = %id, supplier_refs = pruned, "Phone deleted");
        Ok(())
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_accessory(
        &self,
        input: CreateAccessory,
        actor: Option<Uuid>,
    ) -> Result<AccessoryDetails, ServiceError> {
        input.validate()?;
        let attributes = input
            .attributes
            .clone()
            .unwrap_or_else(|| Value::Object(Default::default()));
        ensure_object("attributes", &attributes)?;

        let db = &*self.db;
        if let Some(supplier_id) = input.supplier_id {
            suppliers::ensure_supplier_exists(db, supplier_id).await?;
        }

        let sku = match &input.sku {
            Some(sku) => {
                let sku = sku.trim().to_uppercase();
                if accessory_sku_taken(db, &sku).await? {
                    return Err(ServiceError::Conflict(format!(
                        "accessory sku {} already exists",
                        sku
                    )));
                }
                sku
            }
            None => self.generate_accessory_sku(&input.name, &input.accessory_type).await?,
        };

        let now = Utc::now();
        let accessory_id = Uuid::new_v4();
        let txn = db.begin().await?;
        accessory::ActiveModel {
            id: Set(accessory_id),
            name: Set(input.name.trim().to_string()),
            accessory_type: Set(input.accessory_type.trim().to_string()),
            brand: Set(input.brand.clone()),
            sku: Set(sku),
            purchase_price: Set(input.purchase_price),
            selling_price: Set(input.selling_price),
            currency: Set(self.currency(input.currency.clone())),
            images: Set(serde_json::json!(input.images)),
            compatibility: Set(serde_json::json!(input.compatibility)),
            attributes: Set(attributes),
            category_id: Set(input.category_id),
            supplier_id: Set(input.supplier_id),
            stock: Set(0),
            low_stock_threshold: Set(input
                .low_stock_threshold
                .unwrap_or(DEFAULT_ACCESSORY_THRESHOLD)),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let adjustment = if input.stock > 0 {
            let ctx = MovementContext::new(MovementType::Initial, INITIAL_STOCK_REFERENCE)
                .reference_id(Some(accessory_id))
                .handled_by(actor);
            let target = StockTarget {
                product_id: accessory_id,
                model_type: ModelType::Accessory,
                variant_id: None,
            };
            Some(apply_adjustment(&txn, target, input.stock, &ctx).await?)
        } else {
            None
        };
        if let Some(supplier_id) = input.supplier_id {
            suppliers::link_product(&txn, supplier_id, accessory_id, ModelType::Accessory, None)
                .await?;
        }
        txn.commit().await?;

        metrics::counter!("phonestore.catalog.accessories_created", 1);
        info!(accessory_id = %accessory_id, "Accessory created");
        if let Some(adjustment) = adjustment {
            publish_adjustments(&self.event_sender, std::slice::from_ref(&adjustment)).await;
        }

        self.get_accessory(accessory_id).await
    }

    async fn generate_accessory_sku(
        &self,
        name: &str,
        accessory_type: &str,
    ) -> Result<String, ServiceError> {
        for _ in 0..ACCESSORY_SKU_ATTEMPTS {
            let suffix = rand::thread_rng().gen_range(1000..10000);
            let sku = accessory_sku(name, accessory_type, suffix);
            if !accessory_sku_taken(&*self.db, &sku).await? {
                return Ok(sku);
            }
        }
        Err(ServiceError::Conflict(format!(
            "could not generate a free sku for accessory {}",
            name
        )))
    }

    #[instrument(skip(self))]
    pub async fn get_accessory(&self, id: Uuid) -> Result<AccessoryDetails, ServiceError> {
        accessory::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .map(AccessoryDetails::from)
            .ok_or_else(|| ServiceError::not_found("accessory", id))
    }

    #[instrument(skip(self))]
    pub async fn list_accessories(
        &self,
        filter: &AccessoryFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<accessory::Model>, u64), ServiceError> {
        let paginator = filter
            .apply(accessory::Entity::find())
            .paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let accessories = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((accessories, total))
    }

    #[instrument(skip(self, input))]
    pub async fn update_accessory(
        &self,
        id: Uuid,
        input: UpdateAccessory,
    ) -> Result<AccessoryDetails, ServiceError> {
        input.validate()?;
        if let Some(attributes) = &input.attributes {
            ensure_object("attributes", attributes)?;
        }

        let db = &*self.db;
        let current = accessory::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("accessory", id))?;
        if let Some(Some(supplier_id)) = input.supplier_id {
            suppliers::ensure_supplier_exists(db, supplier_id).await?;
        }

        let old_supplier = current.supplier_id;
        let mut active: accessory::ActiveModel = current.into();
        if let Some(name) = input.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(accessory_type) = input.accessory_type {
            active.accessory_type = Set(accessory_type.trim().to_string());
        }
        if let Some(brand) = input.brand {
            active.brand = Set(Some(brand));
        }
        if let Some(price) = input.purchase_price {
            active.purchase_price = Set(price);
        }
        if let Some(price) = input.selling_price {
            active.selling_price = Set(price);
        }
        if let Some(currency) = input.currency {
            active.currency = Set(currency.to_uppercase());
        }
        if let Some(images) = input.images {
            active.images = Set(serde_json::json!(images));
        }
        if let Some(compatibility) = input.compatibility {
            active.compatibility = Set(serde_json::json!(compatibility));
        }
        if let Some(attributes) = input.attributes {
            active.attributes = Set(attributes);
        }
        if let Some(category_id) = input.category_id {
            active.category_id = Set(category_id);
        }
        if let Some(supplier_id) = input.supplier_id {
            active.supplier_id = Set(supplier_id);
        }
        if let Some(threshold) = input.low_stock_threshold {
            active.low_stock_threshold = Set(threshold);
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());

        let txn = db.begin().await?;
        let updated = active.update(&txn).await?;
        suppliers::relink_product(
            &txn,
            old_supplier,
            updated.supplier_id,
            id,
            ModelType::Accessory,
        )
        .await?;
        txn.commit().await?;

        info!(accessory_id = %id, "Accessory updated");
        Ok(updated.into())
    }

    #[instrument(skip(self))]
    pub async fn deactivate_accessory(&self, id: Uuid) -> Result<AccessoryDetails, ServiceError> {
        self.update_accessory(
            id,
            UpdateAccessory {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn delete_accessory(&self, id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        let deleted = accessory::Entity::delete_by_id(id).exec(&txn).await?;
        if deleted.rows_affected == 0 {
            return Err(ServiceError::not_found("accessory", id));
        }
        let pruned = suppliers::unlink_everywhere(&txn, id, ModelType::Accessory).await?;
        txn.commit().await?;

        info!(accessory_id = %id, supplier_refs = pruned, "Accessory deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Apple", "iPhone 13", "128", "Black", VariantCondition::UsedLocal, "APP-IPHON-128-BLAC-UL")]
    #[case("Samsung", "Galaxy S23 Ultra", "256gb", "Phantom Black", VariantCondition::NewImport, "SAM-GALAX-256GB-PHAN-NI")]
    #[case("", "Pixel 8", "", "", VariantCondition::NewCompany, "PIXEL-NC")]
    fn derives_variant_skus(
        #[case] brand: &str,
        #[case] model: &str,
        #[case] storage: &str,
        #[case] color: &str,
        #[case] condition: VariantCondition,
        #[case] expected: &str,
    ) {
        assert_eq!(variant_sku(brand, model, storage, color, condition), expected);
    }

    #[test]
    fn accessory_sku_strips_punctuation() {
        assert_eq!(
            accessory_sku("USB-C Cable", "cable", 1234),
            "ACC-USBC-CABL-1234"
        );
        assert_eq!(accessory_sku("  ", "", 1000), "ACC---1000");
    }

    #[rstest]
    #[case("Apple iPhone 13 Pro", "apple-iphone-13-pro")]
    #[case("  Samsung   Galaxy S23+ ", "samsung-galaxy-s23")]
    #[case("Xiaomi/Redmi Note 12", "xiaomi-redmi-note-12")]
    fn slugifies(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(slugify(input), expected);
    }

    #[test]
    fn update_distinguishes_null_from_absent() {
        let cleared: UpdatePhone = serde_json::from_str(r#"{"supplier_id": null}"#).unwrap();
        assert_eq!(cleared.supplier_id, Some(None));
        let untouched: UpdatePhone = serde_json::from_str("{}").unwrap();
        assert_eq!(untouched.supplier_id, None);
    }

    #[test]
    fn free_form_fields_must_be_objects() {
        assert!(ensure_object("specs", &serde_json::json!({"os": "iOS"})).is_ok());
        assert!(ensure_object("specs", &serde_json::json!(["iOS"])).is_err());
    }
}
