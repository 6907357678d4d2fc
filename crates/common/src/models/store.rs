//! Remote store handle

use serde::{Deserialize, Serialize};

/// A named remote index.
///
/// `resource_id` is assigned by the service at creation and never changes;
/// `display_name` is chosen by the caller and is not guaranteed unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreHandle {
    /// Full resource name, e.g. `fileSearchStores/my-store-abc123`
    pub resource_id: String,

    pub display_name: String,
}

impl StoreHandle {
    pub fn new(resource_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            display_name: display_name.into(),
        }
    }
}
