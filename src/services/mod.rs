pub mod enrich_service;
pub mod quota_service;
pub mod search_service;

pub use enrich_service::*;
pub use quota_service::*;
pub use search_service::*;
