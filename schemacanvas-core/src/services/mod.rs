pub mod authorization;
pub mod column_service;
pub mod enum_type_service;
pub mod graph_patch_applicator;
pub mod graph_query;
pub mod project_service;
pub mod relationship_service;
pub mod snapshot_codec;
pub mod snapshot_service;
pub mod table_service;
pub mod undo_service;

pub use authorization::{AuthorizationService, Capability};
pub use column_service::ColumnService;
pub use enum_type_service::EnumTypeService;
pub use graph_patch_applicator::{ApplySummary, GraphPatchApplicator};
pub use project_service::ProjectService;
pub use relationship_service::RelationshipService;
pub use snapshot_codec::SnapshotPayload;
pub use snapshot_service::SnapshotService;
pub use table_service::TableService;
pub use undo_service::UndoService;
