//! Field type tag → target declaration. The built-in map covers every tag.

use crate::definition::model::FieldTypeTag;
use std::collections::BTreeMap;

/// How a field of this type shows up in generated code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetType {
    /// Class in the `models` namespace, e.g. `CharField`.
    pub class: &'static str,
    /// Included in admin `search_fields`.
    pub searchable: bool,
    /// Included in admin `list_filter`.
    pub filterable: bool,
}

#[derive(Clone, Debug)]
pub struct TypeMap {
    entries: BTreeMap<FieldTypeTag, TargetType>,
}

impl TypeMap {
    /// The fixed mapping used for generation.
    pub fn django() -> Self {
        let entries = FieldTypeTag::ALL
            .iter()
            .map(|&tag| {
                let searchable = matches!(
                    tag,
                    FieldTypeTag::Char | FieldTypeTag::Text | FieldTypeTag::Email | FieldTypeTag::Url | FieldTypeTag::Slug
                );
                let filterable = matches!(
                    tag,
                    FieldTypeTag::Boolean | FieldTypeTag::Date | FieldTypeTag::DateTime
                );
                (
                    tag,
                    TargetType {
                        class: tag.as_str(),
                        searchable,
                        filterable,
                    },
                )
            })
            .collect();
        TypeMap { entries }
    }

    /// Same map without `tag`.
    pub fn without(mut self, tag: FieldTypeTag) -> Self {
        self.entries.remove(&tag);
        self
    }

    pub fn get(&self, tag: FieldTypeTag) -> Option<&TargetType> {
        self.entries.get(&tag)
    }

    pub fn is_total(&self) -> bool {
        FieldTypeTag::ALL.iter().all(|t| self.entries.contains_key(t))
    }
}

impl Default for TypeMap {
    fn default() -> Self {
        TypeMap::django()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_map_is_total() {
        let map = TypeMap::django();
        assert!(map.is_total());
        assert_eq!(map.get(FieldTypeTag::IpAddress).map(|t| t.class), Some("GenericIPAddressField"));
        assert!(!map.without(FieldTypeTag::Json).is_total());
    }
}
