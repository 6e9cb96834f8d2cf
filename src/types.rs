//! Transfer types for user group results
//!
//! Values read from the managed side arrive as [`ManagedGroup`]s (any field may
//! be null). [`UserGroupList::from_managed`] turns them into owned,
//! always-populated [`UserGroup`]s.

use serde::{Deserialize, Serialize};

/// A predicted user group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGroup {
    /// Group (segment) identifier
    pub id: String,
    /// Human-readable group name
    pub name: String,
}

impl UserGroup {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// One managed list element as read across the boundary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagedGroup {
    pub id: Option<String>,
    pub name: Option<String>,
}

impl From<ManagedGroup> for UserGroup {
    fn from(group: ManagedGroup) -> Self {
        Self {
            id: group.id.unwrap_or_default(),
            name: group.name.unwrap_or_default(),
        }
    }
}

/// Owned list of user groups returned to callers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserGroupList {
    groups: Vec<UserGroup>,
}

impl UserGroupList {
    pub fn new(groups: Vec<UserGroup>) -> Self {
        Self { groups }
    }

    /// Normalize a managed result.
    ///
    /// A null list becomes an empty list. A null element keeps its index and
    /// becomes a group with empty id and name; null fields become empty strings.
    pub fn from_managed(list: Option<Vec<Option<ManagedGroup>>>) -> Self {
        let groups = list
            .unwrap_or_default()
            .into_iter()
            .map(|item| item.map(UserGroup::from).unwrap_or_default())
            .collect();
        Self { groups }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, UserGroup> {
        self.groups.iter()
    }

    pub fn get(&self, index: usize) -> Option<&UserGroup> {
        self.groups.get(index)
    }

    pub fn into_vec(self) -> Vec<UserGroup> {
        self.groups
    }
}

impl IntoIterator for UserGroupList {
    type Item = UserGroup;
    type IntoIter = std::vec::IntoIter<UserGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.into_iter()
    }
}

impl<'a> IntoIterator for &'a UserGroupList {
    type Item = &'a UserGroup;
    type IntoIter = std::slice::Iter<'a, UserGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.iter()
    }
}

impl FromIterator<UserGroup> for UserGroupList {
    fn from_iter<I: IntoIterator<Item = UserGroup>>(iter: I) -> Self {
        Self {
            groups: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn managed(id: &str, name: &str) -> Option<ManagedGroup> {
        Some(ManagedGroup {
            id: Some(id.to_string()),
            name: Some(name.to_string()),
        })
    }

    #[test]
    fn test_null_list_is_empty() {
        let list = UserGroupList::from_managed(None);
        assert!(list.is_empty());
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn test_null_element_keeps_its_index() {
        let list = UserGroupList::from_managed(Some(vec![
            managed("gamers", "Gamers"),
            None,
            managed("travel", "Travellers"),
        ]));

        assert_eq!(list.len(), 3);
        assert_eq!(list.get(0), Some(&UserGroup::new("gamers", "Gamers")));
        assert_eq!(list.get(1), Some(&UserGroup::new("", "")));
        assert_eq!(list.get(2), Some(&UserGroup::new("travel", "Travellers")));
    }

    #[test]
    fn test_null_fields_become_empty() {
        let list = UserGroupList::from_managed(Some(vec![Some(ManagedGroup {
            id: Some("42".to_string()),
            name: None,
        })]));

        assert_eq!(list.into_vec(), vec![UserGroup::new("42", "")]);
    }

    #[test]
    fn test_serializes_as_array() {
        let list: UserGroupList = vec![UserGroup::new("a", "A")].into_iter().collect();
        let json = serde_json::to_string(&list).unwrap();
        assert_eq!(json, r#"[{"id":"a","name":"A"}]"#);
    }
}
