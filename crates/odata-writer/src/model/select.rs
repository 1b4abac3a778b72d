//! Select/expand tree reflected in context URL projections.

/// Properties selected and navigation properties expanded at one level,
/// in the order the caller declared them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectExpand {
    pub items: Vec<SelectItem>,
}

/// One entry of a projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectItem {
    /// A selected property.
    Select(String),
    /// An expanded navigation property with its own projection.
    Expand { name: String, select_expand: SelectExpand },
}

impl SelectExpand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, name: impl Into<String>) -> Self {
        self.items.push(SelectItem::Select(name.into()));
        self
    }

    pub fn expand(mut self, name: impl Into<String>, nested: SelectExpand) -> Self {
        self.items.push(SelectItem::Expand {
            name: name.into(),
            select_expand: nested,
        });
        self
    }

    /// Returns true if nothing restricts the projection.
    pub fn is_all(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the projection list without parentheses, e.g. `Name,Orders(Id)`.
    ///
    /// Items keep declaration order, selects and expands interleaved.
    /// Returns `None` when the tree does not restrict the projection.
    pub fn projection(&self) -> Option<String> {
        if self.is_all() {
            return None;
        }
        let parts: Vec<String> = self
            .items
            .iter()
            .map(|item| match item {
                SelectItem::Select(name) => name.clone(),
                SelectItem::Expand { name, select_expand } => {
                    format!("{}({})", name, select_expand.projection().unwrap_or_default())
                }
            })
            .collect();
        Some(parts.join(","))
    }
}
