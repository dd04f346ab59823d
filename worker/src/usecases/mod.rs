pub mod downgrade_lapsed_subscriptions;
pub mod prune_rate_limits;
