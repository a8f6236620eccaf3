//! Shipped Jira entities

use super::{EndpointRegistry, EndpointSpec};
use crate::mapping::{FieldMapping, MappingSet, TypeTag};
use crate::Result;

pub(super) fn register_all(registry: &mut EndpointRegistry) -> Result<()> {
    registry.register(issue_types()?)?;
    registry.register(issues()?)?;
    Ok(())
}

/// `GET /rest/api/3/issuetype` returns a bare array
fn issue_types() -> Result<EndpointSpec> {
    let mappings = MappingSet::new(vec![
        FieldMapping::required("id", "id", TypeTag::String).identifier(),
        FieldMapping::new("name", "name", TypeTag::String),
        FieldMapping::new("description", "description", TypeTag::String),
        FieldMapping::new("iconUrl", "icon_url", TypeTag::String),
        FieldMapping::new("hierarchyLevel", "hierarchy_level", TypeTag::Integer),
        FieldMapping::new("avatarId", "avatar_id", TypeTag::Integer),
        FieldMapping::new("subtask", "subtask", TypeTag::Boolean).with_default(false),
        FieldMapping::new("scope", "project_scope", TypeTag::Json),
    ])?;

    Ok(
        EndpointSpec::new("issuetypes", "/rest/api/3/issuetype", "issue_types", mappings)?
            .without_pagination(),
    )
}

fn issues() -> Result<EndpointSpec> {
    let mappings = MappingSet::new(vec![
        FieldMapping::required("id", "id", TypeTag::String).identifier(),
        FieldMapping::required("key", "issue_key", TypeTag::String),
        FieldMapping::new("fields.summary", "summary", TypeTag::String),
        FieldMapping::new("fields.status.name", "status", TypeTag::String),
        FieldMapping::new("fields.issuetype.id", "issue_type_id", TypeTag::String),
        FieldMapping::new("fields.project.key", "project_key", TypeTag::String),
        FieldMapping::new("fields.priority.name", "priority", TypeTag::String),
        FieldMapping::new("fields.assignee.displayName", "assignee", TypeTag::String),
        FieldMapping::new("fields.labels", "labels", TypeTag::String),
        FieldMapping::new("fields.created", "created", TypeTag::Timestamp),
        FieldMapping::new("fields.updated", "last_update", TypeTag::Timestamp),
    ])?;

    EndpointSpec::new("issues", "/rest/api/3/search", "issues", mappings)?
        .with_list_field("issues")
        .with_cursor_column("last_update")
}
