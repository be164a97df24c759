// Helper for generating UUIDv7 (timestamp-sortable UUIDs)
//
// CRM documents and audit entries are listed in creation order, so their ids
// are generated app-side as v7. Tenants and users do not depend on ordering.

use uuid::Uuid;

/// Generate a new UUIDv7 (timestamp-sortable).
pub fn uuidv7() -> Uuid {
    Uuid::now_v7()
}
