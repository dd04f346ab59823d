pub mod bulk_group_statuses;
pub mod bulk_operations;
pub mod organization_roles;
pub mod plan_names;
pub mod subscription_statuses;
