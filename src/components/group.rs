//! Hierarchy container.

use crate::component::Component;

/// A component with no ports and no behavior, used to give other components
/// a common parent (`board`, `soc`, ...).
#[derive(Debug, Default)]
pub struct Group;

impl Group {
    pub fn new() -> Self {
        Self
    }
}

impl Component for Group {
    fn type_name(&self) -> &'static str {
        "group"
    }
}
