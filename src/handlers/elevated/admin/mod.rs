// handlers/elevated/admin/mod.rs - Administrative operations

pub mod clients; // /api/admin/clients, /api/admin/documents
pub mod preapprovals; // /api/admin/preapprovals
pub mod users; // /api/admin/users
