// handlers/protected/docs/mod.rs - Document storage endpoints
//
// Callers address folders by logical path; KeyNamespace turns those into
// storage keys. Raw keys are accepted only for reads and deletes, after a
// prefix check.

pub mod client; // GET /api/docs/client/:document_number
pub mod download_url; // GET /api/docs/download-url
pub mod folder; // POST /api/docs/folder
pub mod health; // GET /api/docs/health
pub mod object; // DELETE /api/docs/object
pub mod recent; // GET /api/docs/recent
pub mod upload; // POST /api/docs/upload

pub use client::client_documents_get;
pub use download_url::download_url_get;
pub use folder::folder_post;
pub use health::health_get;
pub use object::object_delete;
pub use recent::recent_get;
pub use upload::upload_post;
