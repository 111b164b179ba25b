// handlers/protected/auth/mod.rs - Account endpoints for authenticated callers

pub mod whoami; // GET /api/auth/whoami

pub use whoami::whoami_get;
