pub mod console;
pub mod resend;
