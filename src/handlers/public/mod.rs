// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Token acquisition and signed-link downloads.
//
// Security Level: None (signed links carry their own HMAC credential)
// Route Prefix: /api/auth/* and /files/*
// Middleware: None

pub mod auth;
pub mod files;
