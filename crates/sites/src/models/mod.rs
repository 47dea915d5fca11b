mod content;
mod id;
mod model;
mod search;

pub use self::content::{PREFERRED_MODEL_KEY, ResourceContent, ResourceDescriptor};
pub use self::id::{IDEAL_ID_TYPES, IdType, detect_isbn_asin, normalize_pair};
pub use self::model::{ItemCategory, ItemModel};
pub use self::search::ExternalSearchResult;
