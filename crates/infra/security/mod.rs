pub mod api_key_hasher;
pub mod signatures;
