//! Content backend API: transport, response handling and typed wrappers.

pub mod content;
pub mod envelope;
pub mod error;
pub mod transform;
pub mod transport;
pub mod types;

pub use content::{AnalyticsApi, AnnouncementsApi, CategoriesApi, DevotionalsApi, SermonsApi};
pub use error::{ApiError, ApiResult};
pub use transform::{FieldTransformer, FIELD_MAPPINGS};
pub use transport::HttpTransport;
