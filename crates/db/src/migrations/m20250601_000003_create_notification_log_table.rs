//! Create notification_log table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(NotificationLog::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(NotificationLog::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(NotificationLog::UserId).string().not_null())
                    .col(ColumnDef::new(NotificationLog::Title).string().not_null())
                    .col(ColumnDef::new(NotificationLog::Body).text().not_null())
                    .col(
                        ColumnDef::new(NotificationLog::NotificationType)
                            .string_len(16)
                            .not_null()
                            .default("custom"),
                    )
                    .col(ColumnDef::new(NotificationLog::Icon).string().null())
                    .col(ColumnDef::new(NotificationLog::Url).string().null())
                    .col(ColumnDef::new(NotificationLog::Data).json_binary().null())
                    .col(
                        ColumnDef::new(NotificationLog::Priority)
                            .string_len(8)
                            .not_null()
                            .default("normal"),
                    )
                    .col(ColumnDef::new(NotificationLog::Campaign).string().null())
                    .col(
                        ColumnDef::new(NotificationLog::Status)
                            .string_len(8)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(NotificationLog::SentAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(NotificationLog::ClickedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(NotificationLog::Error).string().null())
                    .col(
                        ColumnDef::new(NotificationLog::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notification_log_user")
                            .from(NotificationLog::Table, NotificationLog::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index on (user_id, status) for per-user stats
        manager
            .create_index(
                Index::create()
                    .name("idx_notification_log_user_status")
                    .table(NotificationLog::Table)
                    .col(NotificationLog::UserId)
                    .col(NotificationLog::Status)
                    .to_owned(),
            )
            .await?;

        // Index on (notification_type, created_at) for recent-by-type queries
        manager
            .create_index(
                Index::create()
                    .name("idx_notification_log_type_created")
                    .table(NotificationLog::Table)
                    .col(NotificationLog::NotificationType)
                    .col(NotificationLog::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Index on campaign for campaign reporting
        manager
            .create_index(
                Index::create()
                    .name("idx_notification_log_campaign")
                    .table(NotificationLog::Table)
                    .col(NotificationLog::Campaign)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(NotificationLog::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(Iden)]
enum NotificationLog {
    Table,
    Id,
    UserId,
    Title,
    Body,
    NotificationType,
    Icon,
    Url,
    Data,
    Priority,
    Campaign,
    Status,
    SentAt,
    ClickedAt,
    Error,
    CreatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
