pub mod columns;
pub mod enum_types;
pub mod project_collaborators;
pub mod projects;
pub mod relationships;
pub mod snapshots;
pub mod tables;
pub mod undo_cursors;
pub mod undo_entries;
