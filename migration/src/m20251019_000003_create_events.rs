use sea_orm_migration::prelude::*;

/// 活动表，points_remain + points_awarded = 积分池总额
#[derive(DeriveIden)]
enum Events {
    Table,
    Id,
    Name,
    Description,
    Location,
    StartTime,
    EndTime,
    Capacity,
    PointsRemain,
    PointsAwarded,
    Published,
    CreatedAt,
}

#[derive(DeriveIden)]
enum EventGuests {
    Table,
    EventId,
    UserId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum EventOrganizers {
    Table,
    EventId,
    UserId,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Events::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Events::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Events::Name).string_len(255).not_null())
                    .col(
                        ColumnDef::new(Events::Description)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Events::Location)
                            .string_len(255)
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Events::StartTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Events::EndTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Events::Capacity).integer().null()) // NULL = 不限人数
                    .col(
                        ColumnDef::new(Events::PointsRemain)
                            .big_integer()
                            .not_null()
                            .default(0)
                            .check(Expr::col(Events::PointsRemain).gte(0)),
                    )
                    .col(
                        ColumnDef::new(Events::PointsAwarded)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Events::Published)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Events::CreatedAt)
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
                    .table(EventGuests::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(EventGuests::EventId).big_integer().not_null())
                    .col(ColumnDef::new(EventGuests::UserId).big_integer().not_null())
                    .col(
                        ColumnDef::new(EventGuests::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(EventGuests::EventId)
                            .col(EventGuests::UserId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EventOrganizers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EventOrganizers::EventId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EventOrganizers::UserId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EventOrganizers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(EventOrganizers::EventId)
                            .col(EventOrganizers::UserId),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EventOrganizers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(EventGuests::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Events::Table).to_owned())
            .await?;
        Ok(())
    }
}
