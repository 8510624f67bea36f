//! 统一的权限策略，所有操作在写入任何数据之前调用 [`authorize`]。
//! 组织者身份依赖活动数据，由调用方在事务内查询后传入。

use crate::entities::Role;
use crate::error::{AppError, AppResult};
use crate::models::Actor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    RecordPurchase,
    RecordAdjustment,
    RequestRedemption,
    ProcessRedemption,
    TransferPoints,
    /// 活动组织者或经理以上可发放活动积分
    AwardEventPoints { is_organizer: bool },
    FlagTransaction,
    ViewAllTransactions,
    ViewPromotions,
    ManagePromotions,
    ManageEvents,
    ResizeEventPool,
    /// 活动组织者或经理以上可添加嘉宾
    AddEventGuest { is_organizer: bool },
    RemoveEventGuest,
    ManageEventOrganizers,
}

impl Permission {
    fn minimum_role(self) -> Role {
        match self {
            Permission::RequestRedemption
            | Permission::TransferPoints
            | Permission::ViewPromotions => Role::Regular,
            Permission::RecordPurchase | Permission::ProcessRedemption => Role::Cashier,
            Permission::AwardEventPoints { is_organizer: true }
            | Permission::AddEventGuest { is_organizer: true } => Role::Regular,
            Permission::AwardEventPoints { is_organizer: false }
            | Permission::AddEventGuest { is_organizer: false }
            | Permission::RecordAdjustment
            | Permission::FlagTransaction
            | Permission::ViewAllTransactions
            | Permission::ManagePromotions
            | Permission::ManageEvents
            | Permission::ResizeEventPool
            | Permission::RemoveEventGuest
            | Permission::ManageEventOrganizers => Role::Manager,
        }
    }
}

pub fn authorize(actor: &Actor, permission: Permission) -> AppResult<()> {
    let required = permission.minimum_role();
    if actor.has_clearance(required) {
        return Ok(());
    }
    Err(AppError::PermissionDenied(match permission {
        Permission::AwardEventPoints { .. } | Permission::AddEventGuest { .. } => {
            "Event organizer or manager required".to_string()
        }
        _ => format!("{} or higher required", capitalize(required)),
    }))
}

fn capitalize(role: Role) -> String {
    let name = role.to_string();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => name,
    }
}
