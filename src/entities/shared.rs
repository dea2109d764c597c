//! Enumerations shared by several tables, stored as short strings.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Which catalog table a product id points into.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum ModelType {
    #[sea_orm(string_value = "Phone")]
    Phone,
    #[sea_orm(string_value = "Accessory")]
    Accessory,
}

/// Kind of inventory change recorded in the movement ledger.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MovementType {
    #[sea_orm(string_value = "restock")]
    Restock,
    #[sea_orm(string_value = "sale")]
    Sale,
    #[sea_orm(string_value = "return")]
    Return,
    #[sea_orm(string_value = "adjustment")]
    Adjustment,
    #[sea_orm(string_value = "initial")]
    Initial,
}

/// Physical condition of a phone variant.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VariantCondition {
    #[sea_orm(string_value = "used_local")]
    UsedLocal,
    #[sea_orm(string_value = "new_company")]
    NewCompany,
    #[sea_orm(string_value = "new_import")]
    NewImport,
}

impl VariantCondition {
    /// Two-letter code used in generated SKUs.
    pub fn sku_code(self) -> &'static str {
        match self {
            VariantCondition::UsedLocal => "UL",
            VariantCondition::NewCompany => "NC",
            VariantCondition::NewImport => "NI",
        }
    }

    /// Human label, e.g. "used local".
    pub fn label(self) -> String {
        self.to_string().replace('_', " ")
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentMethod {
    #[sea_orm(string_value = "cash")]
    Cash,
    #[sea_orm(string_value = "card")]
    Card,
    #[sea_orm(string_value = "aba")]
    Aba,
    #[sea_orm(string_value = "wing")]
    Wing,
    #[sea_orm(string_value = "acleda")]
    Acleda,
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "partial")]
    Partial,
    #[sea_orm(string_value = "unpaid")]
    Unpaid,
}

/// Returns true when stock is positive but at or below the threshold.
pub fn is_low_stock(stock: i32, threshold: i32) -> bool {
    stock > 0 && stock <= threshold
}

pub fn is_out_of_stock(stock: i32) -> bool {
    stock <= 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_stock_boundaries() {
        assert!(!is_low_stock(0, 5));
        assert!(is_low_stock(1, 5));
        assert!(is_low_stock(5, 5));
        assert!(!is_low_stock(6, 5));
        assert!(is_out_of_stock(0));
        assert!(!is_out_of_stock(1));
    }

    #[test]
    fn condition_codes_and_labels() {
        assert_eq!(VariantCondition::UsedLocal.sku_code(), "UL");
        assert_eq!(VariantCondition::NewImport.label(), "new import");
        assert_eq!(
            serde_json::to_string(&VariantCondition::NewCompany).unwrap(),
            "\"new_company\""
        );
        assert_eq!(MovementType::Restock.to_string(), "restock");
    }
}
