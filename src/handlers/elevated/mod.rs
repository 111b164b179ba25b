// handlers/elevated/mod.rs - Elevated handlers (admin role required)
//
// Routes share the protected tier's JWT middleware. The admin gate is not a
// route layer: each service call asks AuthorizationPolicy with an admin-only
// action, so a non-admin caller gets 403 from the same rule set that guards
// everything else.
//
// Security Level: JWT Authentication + admin role
// Route Prefix: /api/admin/*
// Middleware: jwt_auth_middleware

pub mod admin;
