use std::fmt::Display;

/// 实体的唯一标识，本身不携带任何数据
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity(uuid::Uuid);
impl Entity {
    #[inline]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    #[inline]
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}
impl Default for Entity {
    fn default() -> Self {
        Self::new()
    }
}
impl Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}
