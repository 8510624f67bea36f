//! 用户间转账：一次扣减、一次入账、两条互为镜像的流水，全部在调用方事务内完成。

use crate::entities::{TransactionType, transaction_entity as transactions};
use crate::error::{AppError, AppResult};
use crate::models::TransferRequest;
use crate::services::balance_store;
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set};

/// 返回 (发送方流水, 接收方流水)
pub async fn transfer<C: ConnectionTrait>(
    db: &C,
    sender_id: i64,
    request: &TransferRequest,
    now: DateTime<Utc>,
) -> AppResult<(transactions::Model, transactions::Model)> {
    let amount = request.amount;
    if amount <= 0 {
        return Err(AppError::ValidationError(
            "Transfer amount must be positive".to_string(),
        ));
    }
    let recipient_id = request.recipient_id;
    if recipient_id == sender_id {
        return Err(AppError::ValidationError(
            "Cannot transfer points to yourself".to_string(),
        ));
    }

    // 按 id 升序加锁，避免两个方向相反的转账互相等待
    let (sender, recipient) = if sender_id < recipient_id {
        let sender = balance_store::lock_user(db, sender_id).await?;
        let recipient = balance_store::lock_user(db, recipient_id).await?;
        (sender, recipient)
    } else {
        let recipient = balance_store::lock_user(db, recipient_id).await?;
        let sender = balance_store::lock_user(db, sender_id).await?;
        (sender, recipient)
    };

    if !sender.verified {
        return Err(AppError::PermissionDenied(
            "Sender must be verified to transfer points".to_string(),
        ));
    }
    if sender.points < amount {
        return Err(AppError::Conflict("Insufficient point balance".to_string()));
    }

    balance_store::debit(db, sender.id, amount).await?;
    balance_store::credit(db, recipient.id, amount).await?;

    let mut sent = transactions::ActiveModel::entry(
        TransactionType::Transfer,
        sender.id,
        -amount,
        sender.id,
        &request.remark,
        now,
    );
    sent.related_id = Set(Some(recipient.id));
    let sent = sent.insert(db).await?;

    let mut received = transactions::ActiveModel::entry(
        TransactionType::Transfer,
        recipient.id,
        amount,
        sender.id,
        &request.remark,
        now,
    );
    received.related_id = Set(Some(sender.id));
    let received = received.insert(db).await?;

    Ok((sent, received))
}
