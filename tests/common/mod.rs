#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use phonestore_api::{
    config::AppConfig,
    db::{self, DbConfig},
    entities::{customer, supplier, ModelType, PaymentMethod, VariantCondition},
    events::{self, EventSender},
    handlers::AppServices,
    services::{
        catalog::{AccessoryDetails, CreateAccessory, CreatePhone, CreateVariant, PhoneDetails},
        customers::CreateCustomer,
        sales::{CartItem, CreateSale, SalePayment},
        suppliers::CreateSupplier,
    },
    AppState,
};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use tower::ServiceExt;
use uuid::Uuid;

/// Application state and router backed by a fresh in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );

        // One connection keeps every query on the same in-memory database.
        let pool = db::establish_connection_with_config(&DbConfig {
            url: cfg.database_url.clone(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        })
        .await
        .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_sender, event_rx) = EventSender::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::new(Arc::new(pool), cfg, event_sender);
        let router = phonestore_api::build_router(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    pub fn services(&self) -> &AppServices {
        &self.state.services
    }

    /// Send a request with an optional JSON body and extra headers.
    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request_with_headers(method, uri, body, &[]).await
    }

    pub async fn seed_supplier(&self, name: &str) -> supplier::Model {
        self.services()
            .suppliers
            .create_supplier(CreateSupplier {
                name: name.to_string(),
                contact_person: None,
                phone: None,
                email: None,
                address: None,
            })
            .await
            .expect("seed supplier")
    }

    pub async fn seed_customer(&self, name: &str, phone: &str) -> customer::Model {
        self.services()
            .customers
            .create_customer(CreateCustomer {
                name: name.to_string(),
                phone: Some(phone.to_string()),
                email: None,
                address: None,
            })
            .await
            .expect("seed customer")
    }

    pub async fn seed_accessory(
        &self,
        name: &str,
        cost: Decimal,
        price: Decimal,
        stock: i32,
    ) -> AccessoryDetails {
        self.services()
            .catalog
            .create_accessory(accessory_input(name, cost, price, stock), None)
            .await
            .expect("seed accessory")
    }

    /// Phone with one variant per `(storage, color, stock)` entry, priced at
    /// 400 cost / 500 selling.
    pub async fn seed_phone(&self, model: &str, variants: &[(&str, &str, i32)]) -> PhoneDetails {
        let input = CreatePhone {
            variants: variants
                .iter()
                .map(|(storage, color, stock)| variant_input(storage, color, *stock))
                .collect(),
            ..phone_input("Apple", model)
        };
        self.services()
            .catalog
            .create_phone(input, None)
            .await
            .expect("seed phone")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub fn dec(value: &str) -> Decimal {
    Decimal::from_str(value).expect("valid decimal literal")
}

/// Reads a response body as JSON.
pub async fn read_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("response body is JSON")
}

/// Decimal fields serialize as strings.
pub fn json_dec(value: &Value) -> Decimal {
    match value {
        Value::String(s) => dec(s),
        other => dec(&other.to_string()),
    }
}

pub fn phone_input(brand: &str, model: &str) -> CreatePhone {
    CreatePhone {
        brand: brand.to_string(),
        model: model.to_string(),
        slug: None,
        sku: None,
        purchase_price: dec("400"),
        selling_price: dec("500"),
        currency: None,
        specs: None,
        images: Vec::new(),
        category_id: None,
        supplier_id: None,
        low_stock_threshold: None,
        stock: 0,
        variants: Vec::new(),
    }
}

pub fn variant_input(storage: &str, color: &str, stock: i32) -> CreateVariant {
    CreateVariant {
        storage: storage.to_string(),
        color: color.to_string(),
        condition: VariantCondition::NewCompany,
        purchase_price: dec("400"),
        selling_price: dec("500"),
        stock,
        sku: None,
    }
}

pub fn accessory_input(name: &str, cost: Decimal, price: Decimal, stock: i32) -> CreateAccessory {
    CreateAccessory {
        name: name.to_string(),
        accessory_type: "Cable".to_string(),
        brand: None,
        sku: None,
        purchase_price: cost,
        selling_price: price,
        currency: None,
        images: Vec::new(),
        compatibility: Vec::new(),
        attributes: None,
        category_id: None,
        supplier_id: None,
        stock,
        low_stock_threshold: None,
    }
}

pub fn accessory_line(product_id: Uuid, quantity: i32) -> CartItem {
    CartItem {
        product_id,
        model_type: ModelType::Accessory,
        quantity,
        variant_id: None,
    }
}

pub fn phone_line(product_id: Uuid, variant_id: Option<Uuid>, quantity: i32) -> CartItem {
    CartItem {
        product_id,
        model_type: ModelType::Phone,
        quantity,
        variant_id,
    }
}

/// Cash sale paying `paid` with no discount or tax.
pub fn cash_sale(items: Vec<CartItem>, paid: &str) -> CreateSale {
    CreateSale {
        items,
        payment: SalePayment {
            method: PaymentMethod::Cash,
            paid_amount: Some(dec(paid)),
        },
        customer_id: None,
        seller_id: None,
        discount: Decimal::ZERO,
        tax: Decimal::ZERO,
        notes: None,
    }
}
