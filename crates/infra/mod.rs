pub mod cache;
pub mod db;
pub mod mailer;
pub mod security;
pub mod webhooks;
