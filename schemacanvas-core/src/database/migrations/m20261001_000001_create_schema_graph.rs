use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Projects::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Projects::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Projects::Name).string().not_null())
                    .col(ColumnDef::new(Projects::OwnerId).string().not_null())
                    .col(ColumnDef::new(Projects::ShareLink).string())
                    .col(ColumnDef::new(Projects::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Projects::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_projects_owner_id")
                    .table(Projects::Table)
                    .col(Projects::OwnerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_projects_share_link")
                    .table(Projects::Table)
                    .col(Projects::ShareLink)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ProjectCollaborators::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProjectCollaborators::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ProjectCollaborators::ProjectId).string().not_null())
                    .col(ColumnDef::new(ProjectCollaborators::UserId).string().not_null())
                    .col(ColumnDef::new(ProjectCollaborators::Role).string().not_null())
                    .col(ColumnDef::new(ProjectCollaborators::InvitedBy).string().not_null())
                    .col(
                        ColumnDef::new(ProjectCollaborators::InvitedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_project_collaborators_project_id")
                            .from(ProjectCollaborators::Table, ProjectCollaborators::ProjectId)
                            .to(Projects::Table, Projects::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_project_collaborators_user_id")
                    .table(ProjectCollaborators::Table)
                    .col(ProjectCollaborators::UserId)
                    .to_owned(),
            )
            .await?;

        // Also serves lookups by project_id
        manager
            .create_index(
                Index::create()
                    .name("uq_project_collaborators_project_user")
                    .table(ProjectCollaborators::Table)
                    .col(ProjectCollaborators::ProjectId)
                    .col(ProjectCollaborators::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Tables::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Tables::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Tables::ProjectId).string().not_null())
                    .col(ColumnDef::new(Tables::Name).string().not_null())
                    .col(ColumnDef::new(Tables::PositionX).double().not_null().default(0.0))
                    .col(ColumnDef::new(Tables::PositionY).double().not_null().default(0.0))
                    .col(ColumnDef::new(Tables::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Tables::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tables_project_id")
                            .from(Tables::Table, Tables::ProjectId)
                            .to(Projects::Table, Projects::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tables_project_id")
                    .table(Tables::Table)
                    .col(Tables::ProjectId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EnumTypes::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(EnumTypes::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(EnumTypes::ProjectId).string().not_null())
                    .col(ColumnDef::new(EnumTypes::Name).string().not_null())
                    .col(ColumnDef::new(EnumTypes::Values).json().not_null())
                    .col(ColumnDef::new(EnumTypes::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(EnumTypes::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_enum_types_project_id")
                            .from(EnumTypes::Table, EnumTypes::ProjectId)
                            .to(Projects::Table, Projects::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_enum_types_project_id")
                    .table(EnumTypes::Table)
                    .col(EnumTypes::ProjectId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_enum_types_project_name")
                    .table(EnumTypes::Table)
                    .col(EnumTypes::ProjectId)
                    .col(EnumTypes::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Columns::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Columns::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Columns::TableId).string().not_null())
                    .col(ColumnDef::new(Columns::Name).string().not_null())
                    .col(ColumnDef::new(Columns::DataType).string().not_null())
                    .col(ColumnDef::new(Columns::TypeCategory).string().not_null())
                    .col(ColumnDef::new(Columns::IsPrimaryKey).boolean().not_null().default(false))
                    .col(ColumnDef::new(Columns::IsNullable).boolean().not_null().default(true))
                    .col(ColumnDef::new(Columns::IsUnique).boolean().not_null().default(false))
                    .col(ColumnDef::new(Columns::DefaultValue).string())
                    .col(ColumnDef::new(Columns::ArrayBaseType).string())
                    .col(ColumnDef::new(Columns::EnumTypeId).string())
                    .col(ColumnDef::new(Columns::Order).integer().not_null())
                    .col(ColumnDef::new(Columns::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Columns::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_columns_table_id")
                            .from(Columns::Table, Columns::TableId)
                            .to(Tables::Table, Tables::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_columns_enum_type_id")
                            .from(Columns::Table, Columns::EnumTypeId)
                            .to(EnumTypes::Table, EnumTypes::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_columns_table_id")
                    .table(Columns::Table)
                    .col(Columns::TableId)
                    .to_owned(),
            )
            .await?;

        // Not unique: creation accepts duplicate orders until the next reorder
        manager
            .create_index(
                Index::create()
                    .name("idx_columns_table_order")
                    .table(Columns::Table)
                    .col(Columns::TableId)
                    .col(Columns::Order)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_columns_enum_type_id")
                    .table(Columns::Table)
                    .col(Columns::EnumTypeId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Relationships::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Relationships::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Relationships::ProjectId).string().not_null())
                    .col(ColumnDef::new(Relationships::SourceTableId).string().not_null())
                    .col(ColumnDef::new(Relationships::SourceColumnId).string().not_null())
                    .col(ColumnDef::new(Relationships::TargetTableId).string().not_null())
                    .col(ColumnDef::new(Relationships::TargetColumnId).string().not_null())
                    .col(ColumnDef::new(Relationships::RelationType).string().not_null())
                    .col(ColumnDef::new(Relationships::JunctionTableId).string())
                    .col(ColumnDef::new(Relationships::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_relationships_project_id")
                            .from(Relationships::Table, Relationships::ProjectId)
                            .to(Projects::Table, Projects::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_relationships_source_column_id")
                            .from(Relationships::Table, Relationships::SourceColumnId)
                            .to(Columns::Table, Columns::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_relationships_target_column_id")
                            .from(Relationships::Table, Relationships::TargetColumnId)
                            .to(Columns::Table, Columns::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_relationships_junction_table_id")
                            .from(Relationships::Table, Relationships::JunctionTableId)
                            .to(Tables::Table, Tables::Id),
                    )
                    .to_owned(),
            )
            .await?;

        for (name, column) in [
            ("idx_relationships_project_id", Relationships::ProjectId),
            ("idx_relationships_source_table_id", Relationships::SourceTableId),
            ("idx_relationships_target_table_id", Relationships::TargetTableId),
            ("idx_relationships_source_column_id", Relationships::SourceColumnId),
            ("idx_relationships_target_column_id", Relationships::TargetColumnId),
            ("idx_relationships_junction_table_id", Relationships::JunctionTableId),
        ] {
            manager
                .create_index(
                    Index::create()
                        .name(name)
                        .table(Relationships::Table)
                        .col(column)
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Relationships::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Columns::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(EnumTypes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tables::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ProjectCollaborators::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Projects::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Projects {
    Table,
    Id,
    Name,
    OwnerId,
    ShareLink,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ProjectCollaborators {
    Table,
    Id,
    ProjectId,
    UserId,
    Role,
    InvitedBy,
    InvitedAt,
}

#[derive(DeriveIden)]
enum Tables {
    Table,
    Id,
    ProjectId,
    Name,
    PositionX,
    PositionY,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum EnumTypes {
    Table,
    Id,
    ProjectId,
    Name,
    Values,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Columns {
    Table,
    Id,
    TableId,
    Name,
    DataType,
    TypeCategory,
    IsPrimaryKey,
    IsNullable,
    IsUnique,
    DefaultValue,
    ArrayBaseType,
    EnumTypeId,
    Order,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Relationships {
    Table,
    Id,
    ProjectId,
    SourceTableId,
    SourceColumnId,
    TargetTableId,
    TargetColumnId,
    RelationType,
    JunctionTableId,
    CreatedAt,
}
