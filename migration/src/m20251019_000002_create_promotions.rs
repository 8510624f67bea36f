use sea_orm_migration::prelude::*;

/// 促销活动表
#[derive(DeriveIden)]
enum Promotions {
    Table,
    Id,
    Name,
    Description,
    PromotionType,
    StartTime,
    EndTime,
    MinSpending,
    Rate,
    Points,
    CreatedAt,
}

/// 一次性促销使用记录，(promotion_id, user_id) 唯一
#[derive(DeriveIden)]
enum PromotionRedemptions {
    Table,
    PromotionId,
    UserId,
    TransactionId,
    CreatedAt,
}

/// 流水与实际生效促销的关联
#[derive(DeriveIden)]
enum TransactionPromotions {
    Table,
    TransactionId,
    PromotionId,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Promotions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Promotions::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Promotions::Name).string_len(255).not_null())
                    .col(
                        ColumnDef::new(Promotions::Description)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Promotions::PromotionType)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Promotions::StartTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Promotions::EndTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Promotions::MinSpending).double().null())
                    .col(ColumnDef::new(Promotions::Rate).double().null())
                    .col(ColumnDef::new(Promotions::Points).big_integer().null())
                    .col(
                        ColumnDef::new(Promotions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PromotionRedemptions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PromotionRedemptions::PromotionId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PromotionRedemptions::UserId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PromotionRedemptions::TransactionId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PromotionRedemptions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    // 复合主键保证同一用户对同一一次性促销最多使用一次（并发下由数据库兜底）
                    .primary_key(
                        Index::create()
                            .col(PromotionRedemptions::PromotionId)
                            .col(PromotionRedemptions::UserId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TransactionPromotions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TransactionPromotions::TransactionId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TransactionPromotions::PromotionId)
                            .big_integer()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(TransactionPromotions::TransactionId)
                            .col(TransactionPromotions::PromotionId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_transaction_promotions_promotion_id")
                    .table(TransactionPromotions::Table)
                    .col(TransactionPromotions::PromotionId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TransactionPromotions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PromotionRedemptions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Promotions::Table).to_owned())
            .await?;
        Ok(())
    }
}
