#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub database: Database,
    pub supabase: Supabase,
    pub razorpay: Razorpay,
    pub outbound_webhooks: OutboundWebhooks,
    pub rate_limit: RateLimit,
    pub mailer: Mailer,
    pub cache: Cache,
    pub side_effects: SideEffects,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct Supabase {
    pub jwt_secret: String,
}

#[derive(Debug, Clone)]
pub struct Razorpay {
    /// Billing webhooks answer 503 while this is unset.
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OutboundWebhooks {
    pub timeout_seconds: u64,
    pub max_attempts: i32,
}

#[derive(Debug, Clone)]
pub struct RateLimit {
    pub fail_open: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailProvider {
    Resend,
    Console,
}

#[derive(Debug, Clone)]
pub struct Mailer {
    pub provider: EmailProvider,
    pub resend_api_key: Option<String>,
    pub from_address: String,
    pub app_name: String,
    pub app_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct Cache {
    pub sweep_interval_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct SideEffects {
    pub queue_capacity: usize,
}
