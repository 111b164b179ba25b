// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Every route in this tier sits behind `jwt_auth_middleware`, which verifies
// the access token and injects `AuthUser` into request extensions. Handlers
// pass that caller to the services, which ask AuthorizationPolicy about the
// concrete target.
//
// Security Level: JWT Authentication Required
// Route Prefix: /api/* (e.g., /api/auth/whoami, /api/docs/*, /api/tasks/*)
// Middleware: jwt_auth_middleware

pub mod auth; // Caller account
pub mod clients; // Client profiles
pub mod docs; // Document storage
pub mod tasks; // Task tracking
