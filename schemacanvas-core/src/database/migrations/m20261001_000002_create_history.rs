use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Snapshots::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Snapshots::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Snapshots::ProjectId).string().not_null())
                    .col(ColumnDef::new(Snapshots::Description).string().not_null())
                    .col(ColumnDef::new(Snapshots::Data).text().not_null())
                    .col(ColumnDef::new(Snapshots::CreatedBy).string().not_null())
                    .col(ColumnDef::new(Snapshots::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_snapshots_project_id")
                            .from(Snapshots::Table, Snapshots::ProjectId)
                            .to(Projects::Table, Projects::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_snapshots_project_id")
                    .table(Snapshots::Table)
                    .col(Snapshots::ProjectId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_snapshots_project_created")
                    .table(Snapshots::Table)
                    .col(Snapshots::ProjectId)
                    .col(Snapshots::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UndoEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UndoEntries::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UndoEntries::ProjectId).string().not_null())
                    .col(ColumnDef::new(UndoEntries::UserId).string().not_null())
                    .col(ColumnDef::new(UndoEntries::ActionType).string().not_null())
                    .col(ColumnDef::new(UndoEntries::BeforeState).json().not_null())
                    .col(ColumnDef::new(UndoEntries::AfterState).json().not_null())
                    .col(ColumnDef::new(UndoEntries::Position).integer().not_null())
                    .col(
                        ColumnDef::new(UndoEntries::Superseded)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(UndoEntries::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_undo_entries_project_id")
                            .from(UndoEntries::Table, UndoEntries::ProjectId)
                            .to(Projects::Table, Projects::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_undo_entries_project_user")
                    .table(UndoEntries::Table)
                    .col(UndoEntries::ProjectId)
                    .col(UndoEntries::UserId)
                    .to_owned(),
            )
            .await?;

        // Position assignment is serialized by this constraint
        manager
            .create_index(
                Index::create()
                    .name("uq_undo_entries_project_user_position")
                    .table(UndoEntries::Table)
                    .col(UndoEntries::ProjectId)
                    .col(UndoEntries::UserId)
                    .col(UndoEntries::Position)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UndoCursors::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(UndoCursors::ProjectId).string().not_null())
                    .col(ColumnDef::new(UndoCursors::UserId).string().not_null())
                    .col(ColumnDef::new(UndoCursors::HeadPosition).integer())
                    .col(ColumnDef::new(UndoCursors::UpdatedAt).timestamp().not_null())
                    .primary_key(
                        Index::create()
                            .col(UndoCursors::ProjectId)
                            .col(UndoCursors::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_undo_cursors_project_id")
                            .from(UndoCursors::Table, UndoCursors::ProjectId)
                            .to(Projects::Table, Projects::Id),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UndoCursors::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UndoEntries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Snapshots::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Projects {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Snapshots {
    Table,
    Id,
    ProjectId,
    Description,
    Data,
    CreatedBy,
    CreatedAt,
}

#[derive(DeriveIden)]
enum UndoEntries {
    Table,
    Id,
    ProjectId,
    UserId,
    ActionType,
    BeforeState,
    AfterState,
    Position,
    Superseded,
    CreatedAt,
}

#[derive(DeriveIden)]
enum UndoCursors {
    Table,
    ProjectId,
    UserId,
    HeadPosition,
    UpdatedAt,
}
