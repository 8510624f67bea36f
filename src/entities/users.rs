use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};

/// 角色按权限从低到高声明，比较运算即权限比较
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[sea_orm(string_value = "regular")]
    Regular,
    #[sea_orm(string_value = "cashier")]
    Cashier,
    #[sea_orm(string_value = "manager")]
    Manager,
    #[sea_orm(string_value = "superuser")]
    Superuser,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Regular => write!(f, "regular"),
            Role::Cashier => write!(f, "cashier"),
            Role::Manager => write!(f, "manager"),
            Role::Superuser => write!(f, "superuser"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub utorid: String,
    pub name: String,
    pub role: Role,
    pub points: i64,
    pub verified: bool,
    pub suspicious: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
