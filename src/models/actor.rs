use crate::entities::Role;
use serde::{Deserialize, Serialize};

/// 已认证的操作者身份，由上游认证层提供
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn has_clearance(&self, minimum: Role) -> bool {
        self.role >= minimum
    }
}
