use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Local handle for a key provisioned on the reseller side. Usage webhooks only
/// carry `remote_key_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub remote_key_id: String,
    pub name: Option<String>,
}
