//! Index declarations: ordered key sequences plus creation options.

use serde::{Deserialize, Serialize};

/// Direction of a single index key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

impl IndexDirection {
    /// The numeric encoding the store uses for this direction.
    pub fn as_i32(self) -> i32 {
        match self {
            IndexDirection::Asc => 1,
            IndexDirection::Desc => -1,
        }
    }
}

/// An ordered sequence of `(field, direction)` pairs making up an index
/// key specification.
///
/// # Example
///
/// ```ignore
/// let keys = IndexKeys::new().desc("last_name").asc("first_name");
/// assert_eq!(keys.default_name(), "last_name_-1_first_name_1");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexKeys(Vec<(String, IndexDirection)>);

impl IndexKeys {
    /// Creates an empty key specification.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends an ascending key.
    pub fn asc(mut self, field: impl Into<String>) -> Self {
        self.0.push((field.into(), IndexDirection::Asc));
        self
    }

    /// Appends a descending key.
    pub fn desc(mut self, field: impl Into<String>) -> Self {
        self.0.push((field.into(), IndexDirection::Desc));
        self
    }

    /// Iterates the keys in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &(String, IndexDirection)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The generated index name: each field followed by its numeric
    /// direction, joined by underscores.
    pub fn default_name(&self) -> String {
        self.0
            .iter()
            .map(|(field, direction)| format!("{}_{}", field, direction.as_i32()))
            .collect::<Vec<_>>()
            .join("_")
    }
}

/// Options applied when an index is created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexOptions {
    /// Reject documents that duplicate an existing key value.
    pub unique: bool,
    /// Skip documents that are missing the indexed fields entirely.
    pub sparse: bool,
}

/// A declared index as reported by `index_information`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub keys: IndexKeys,
    pub options: IndexOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_name_encodes_fields_and_directions() {
        let keys = IndexKeys::new().desc("last_name").asc("first_name");
        assert_eq!(keys.default_name(), "last_name_-1_first_name_1");
    }

    #[test]
    fn single_key_name() {
        assert_eq!(IndexKeys::new().asc("email").default_name(), "email_1");
    }

    #[test]
    fn keys_preserve_declaration_order() {
        let keys = IndexKeys::new().asc("b").desc("a");
        let collected: Vec<_> = keys.iter().map(|(f, d)| (f.as_str(), *d)).collect();
        assert_eq!(
            collected,
            vec![("b", IndexDirection::Asc), ("a", IndexDirection::Desc)]
        );
    }
}
