//! Group - namespace for banks and accounts

use poolfi_core::Clock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: Uuid,
    pub admin_key: String,

    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub description: String,
}

impl Group {
    pub fn new(
        clock: &dyn Clock,
        admin_key: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let now = clock.now_unix();
        Self {
            id: Uuid::new_v4(),
            admin_key: admin_key.into(),
            name: name.into(),
            created_at: now,
            updated_at: now,
            description: description.into(),
        }
    }

    pub fn update(
        &mut self,
        clock: &dyn Clock,
        admin_key: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) {
        self.admin_key = admin_key.into();
        self.name = name.into();
        self.description = description.into();
        self.updated_at = clock.now_unix();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poolfi_core::ManualClock;

    #[test]
    fn update_bumps_timestamp() {
        let clock = ManualClock::new(1_700_000_000);
        let mut group = Group::new(&clock, "admin", "main", "primary group");
        assert_eq!(group.created_at, 1_700_000_000);

        clock.advance(120);
        group.update(&clock, "admin-2", "main", "renamed");
        assert_eq!(group.admin_key, "admin-2");
        assert_eq!(group.updated_at, 1_700_000_120);
        assert_eq!(group.created_at, 1_700_000_000);
    }
}
