//! Arena-backed catalog tree.
//!
//! Every group and profile lives in one slot vector and is addressed by a
//! generational index. Each node records its parent, each group records its
//! ordered child lists. Moving a subtree only rewrites indices, and a node
//! can never be reachable from two parents because the public API only ever
//! inserts freshly-owned data.
//!
//! A freed slot bumps its generation, so an id held past `remove_*` is
//! rejected instead of silently addressing whatever reuses the slot.

use super::error::{AddressBookError, AddressBookResult};
use super::types::{ConnectionProfile, ProfileGroup};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct NodeId {
    index: u32,
    generation: u32,
}

/// Handle to a group inside one [`AddressBook`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(NodeId);

/// Handle to a connection profile inside one [`AddressBook`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProfileId(NodeId);

#[derive(Debug, Clone)]
struct GroupNode {
    data: ProfileGroup,
    parent: Option<GroupId>,
    groups: Vec<GroupId>,
    profiles: Vec<ProfileId>,
}

#[derive(Debug, Clone)]
struct ProfileNode {
    data: ConnectionProfile,
    parent: GroupId,
}

#[derive(Debug, Clone)]
enum Node {
    Group(GroupNode),
    Profile(ProfileNode),
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// One item of a pre-order walk.
#[derive(Debug, Clone, Copy)]
pub enum TreeItem<'a> {
    Group { id: GroupId, group: &'a ProfileGroup, depth: usize },
    Profile { id: ProfileId, profile: &'a ConnectionProfile, depth: usize },
}

/// A catalog of connection profiles with exactly one root group.
///
/// Not internally synchronized: share it behind a lock when more than one
/// task edits it.
#[derive(Debug, Clone)]
pub struct AddressBook {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: GroupId,
    group_count: usize,
    profile_count: usize,
}

impl AddressBook {
    /// New catalog whose root group carries the given name.
    pub fn new(root_name: impl Into<String>) -> Self {
        Self::with_root(ProfileGroup::new(root_name))
    }

    pub fn with_root(root: ProfileGroup) -> Self {
        let root_id = NodeId { index: 0, generation: 0 };
        Self {
            slots: vec![Slot {
                generation: 0,
                node: Some(Node::Group(GroupNode {
                    data: root,
                    parent: None,
                    groups: Vec::new(),
                    profiles: Vec::new(),
                })),
            }],
            free: Vec::new(),
            root: GroupId(root_id),
            group_count: 1,
            profile_count: 0,
        }
    }

    pub fn root(&self) -> GroupId {
        self.root
    }

    /// Number of groups including the root.
    pub fn group_count(&self) -> usize {
        self.group_count
    }

    pub fn profile_count(&self) -> usize {
        self.profile_count
    }

    /// Groups plus profiles.
    pub fn node_count(&self) -> usize {
        self.group_count + self.profile_count
    }

    // ─── Slot Management ─────────────────────────────────────────

    fn alloc(&mut self, node: Node) -> NodeId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId { index, generation: slot.generation }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot { generation: 0, node: Some(node) });
            NodeId { index, generation: 0 }
        }
    }

    fn release(&mut self, id: NodeId) -> Option<Node> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let node = slot.node.take();
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        node
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }

    fn group_node(&self, id: GroupId) -> AddressBookResult<&GroupNode> {
        match self.node(id.0) {
            Some(Node::Group(g)) => Ok(g),
            _ => Err(AddressBookError::tree(format!("Group not found: {:?}", id))),
        }
    }

    fn group_node_mut(&mut self, id: GroupId) -> AddressBookResult<&mut GroupNode> {
        match self.node_mut(id.0) {
            Some(Node::Group(g)) => Ok(g),
            _ => Err(AddressBookError::tree(format!("Group not found: {:?}", id))),
        }
    }

    fn profile_node(&self, id: ProfileId) -> AddressBookResult<&ProfileNode> {
        match self.node(id.0) {
            Some(Node::Profile(p)) => Ok(p),
            _ => Err(AddressBookError::tree(format!("Profile not found: {:?}", id))),
        }
    }

    fn profile_node_mut(&mut self, id: ProfileId) -> AddressBookResult<&mut ProfileNode> {
        match self.node_mut(id.0) {
            Some(Node::Profile(p)) => Ok(p),
            _ => Err(AddressBookError::tree(format!("Profile not found: {:?}", id))),
        }
    }

    // ─── Read Access ─────────────────────────────────────────────

    pub fn group(&self, id: GroupId) -> AddressBookResult<&ProfileGroup> {
        self.group_node(id).map(|g| &g.data)
    }

    pub fn group_mut(&mut self, id: GroupId) -> AddressBookResult<&mut ProfileGroup> {
        self.group_node_mut(id).map(|g| &mut g.data)
    }

    pub fn profile(&self, id: ProfileId) -> AddressBookResult<&ConnectionProfile> {
        self.profile_node(id).map(|p| &p.data)
    }

    pub fn profile_mut(&mut self, id: ProfileId) -> AddressBookResult<&mut ConnectionProfile> {
        self.profile_node_mut(id).map(|p| &mut p.data)
    }

    /// `None` for the root group.
    pub fn parent_of_group(&self, id: GroupId) -> AddressBookResult<Option<GroupId>> {
        self.group_node(id).map(|g| g.parent)
    }

    pub fn parent_of_profile(&self, id: ProfileId) -> AddressBookResult<GroupId> {
        self.profile_node(id).map(|p| p.parent)
    }

    /// Child groups in display order.
    pub fn child_groups(&self, id: GroupId) -> AddressBookResult<&[GroupId]> {
        self.group_node(id).map(|g| g.groups.as_slice())
    }

    /// Child profiles in display order.
    pub fn child_profiles(&self, id: GroupId) -> AddressBookResult<&[ProfileId]> {
        self.group_node(id).map(|g| g.profiles.as_slice())
    }

    /// True when `ancestor` is `id` itself or lies on the path from `id` to the root.
    pub fn is_ancestor(&self, ancestor: GroupId, id: GroupId) -> AddressBookResult<bool> {
        let mut current = Some(id);
        while let Some(g) = current {
            if g == ancestor {
                return Ok(true);
            }
            current = self.group_node(g)?.parent;
        }
        Ok(false)
    }

    // ─── Insertion ───────────────────────────────────────────────

    /// Append a new group at the end of `parent`'s child groups.
    pub fn add_group(&mut self, parent: GroupId, group: ProfileGroup) -> AddressBookResult<GroupId> {
        let position = self.group_node(parent)?.groups.len();
        self.insert_group(parent, position, group)
    }

    /// Insert a new group at `position` among `parent`'s child groups.
    pub fn insert_group(
        &mut self,
        parent: GroupId,
        position: usize,
        group: ProfileGroup,
    ) -> AddressBookResult<GroupId> {
        check_position(position, self.group_node(parent)?.groups.len())?;
        let id = GroupId(self.alloc(Node::Group(GroupNode {
            data: group,
            parent: Some(parent),
            groups: Vec::new(),
            profiles: Vec::new(),
        })));
        self.group_node_mut(parent)?.groups.insert(position, id);
        self.group_count += 1;
        Ok(id)
    }

    /// Append a new profile at the end of `parent`'s child profiles.
    pub fn add_profile(
        &mut self,
        parent: GroupId,
        profile: ConnectionProfile,
    ) -> AddressBookResult<ProfileId> {
        let position = self.group_node(parent)?.profiles.len();
        self.insert_profile(parent, position, profile)
    }

    /// Insert a new profile at `position` among `parent`'s child profiles.
    pub fn insert_profile(
        &mut self,
        parent: GroupId,
        position: usize,
        profile: ConnectionProfile,
    ) -> AddressBookResult<ProfileId> {
        check_position(position, self.group_node(parent)?.profiles.len())?;
        let id = ProfileId(self.alloc(Node::Profile(ProfileNode { data: profile, parent })));
        self.group_node_mut(parent)?.profiles.insert(position, id);
        self.profile_count += 1;
        Ok(id)
    }

    // ─── Removal ─────────────────────────────────────────────────

    /// Remove a group and destroy its whole subtree. The root cannot be removed.
    pub fn remove_group(&mut self, id: GroupId) -> AddressBookResult<ProfileGroup> {
        let parent = self
            .group_node(id)?
            .parent
            .ok_or_else(|| AddressBookError::tree("The root group cannot be removed"))?;
        self.group_node_mut(parent)?.groups.retain(|g| *g != id);

        let mut removed = None;
        let mut stack = vec![id];
        while let Some(gid) = stack.pop() {
            if let Some(Node::Group(node)) = self.release(gid.0) {
                self.group_count -= 1;
                for pid in node.profiles {
                    if self.release(pid.0).is_some() {
                        self.profile_count -= 1;
                    }
                }
                stack.extend(node.groups);
                if gid == id {
                    removed = Some(node.data);
                }
            }
        }
        removed.ok_or_else(|| AddressBookError::tree(format!("Group not found: {:?}", id)))
    }

    /// Remove a single profile, returning its data.
    pub fn remove_profile(&mut self, id: ProfileId) -> AddressBookResult<ConnectionProfile> {
        let parent = self.profile_node(id)?.parent;
        self.group_node_mut(parent)?.profiles.retain(|p| *p != id);
        match self.release(id.0) {
            Some(Node::Profile(node)) => {
                self.profile_count -= 1;
                Ok(node.data)
            }
            _ => Err(AddressBookError::tree(format!("Profile not found: {:?}", id))),
        }
    }

    // ─── Move / Reorder ──────────────────────────────────────────

    /// Move a group (with its subtree) under `new_parent` at `position`.
    /// `position` is interpreted after the group has been detached.
    pub fn move_group(
        &mut self,
        id: GroupId,
        new_parent: GroupId,
        position: usize,
    ) -> AddressBookResult<()> {
        let old_parent = self
            .group_node(id)?
            .parent
            .ok_or_else(|| AddressBookError::tree("The root group cannot be moved"))?;
        self.group_node(new_parent)?;
        if self.is_ancestor(id, new_parent)? {
            return Err(AddressBookError::tree(
                "A group cannot be moved into itself or one of its descendants",
            ));
        }

        let mut len = self.group_node(new_parent)?.groups.len();
        if new_parent == old_parent {
            len -= 1;
        }
        check_position(position, len)?;

        self.group_node_mut(old_parent)?.groups.retain(|g| *g != id);
        self.group_node_mut(new_parent)?.groups.insert(position, id);
        self.group_node_mut(id)?.parent = Some(new_parent);
        Ok(())
    }

    /// Move a profile under `new_parent` at `position` (after detaching).
    pub fn move_profile(
        &mut self,
        id: ProfileId,
        new_parent: GroupId,
        position: usize,
    ) -> AddressBookResult<()> {
        let old_parent = self.profile_node(id)?.parent;
        let mut len = self.group_node(new_parent)?.profiles.len();
        if new_parent == old_parent {
            len -= 1;
        }
        check_position(position, len)?;

        self.group_node_mut(old_parent)?.profiles.retain(|p| *p != id);
        self.group_node_mut(new_parent)?.profiles.insert(position, id);
        self.profile_node_mut(id)?.parent = new_parent;
        Ok(())
    }

    /// Change a group's position among its siblings.
    pub fn reorder_group(&mut self, id: GroupId, position: usize) -> AddressBookResult<()> {
        let parent = self
            .group_node(id)?
            .parent
            .ok_or_else(|| AddressBookError::tree("The root group has no siblings"))?;
        self.move_group(id, parent, position)
    }

    /// Change a profile's position among its siblings.
    pub fn reorder_profile(&mut self, id: ProfileId, position: usize) -> AddressBookResult<()> {
        let parent = self.profile_node(id)?.parent;
        self.move_profile(id, parent, position)
    }

    // ─── Traversal ───────────────────────────────────────────────

    /// Pre-order walk: a group, then its child groups (each fully), then
    /// its profiles. Iterative, so deep trees do not grow the call stack.
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            book: self,
            stack: vec![(Pending::Group(self.root), 0)],
        }
    }

    /// Deepest group level; the root alone is depth 0.
    pub fn depth(&self) -> usize {
        self.walk()
            .filter_map(|item| match item {
                TreeItem::Group { depth, .. } => Some(depth),
                TreeItem::Profile { .. } => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Case-insensitive match on profile name or address, in walk order.
    pub fn find_profiles(&self, query: &str) -> Vec<ProfileId> {
        let needle = query.to_lowercase();
        self.walk()
            .filter_map(|item| match item {
                TreeItem::Profile { id, profile, .. }
                    if profile.name.to_lowercase().contains(&needle)
                        || profile.address.to_lowercase().contains(&needle) =>
                {
                    Some(id)
                }
                _ => None,
            })
            .collect()
    }
}

impl Default for AddressBook {
    fn default() -> Self {
        Self::with_root(ProfileGroup::default())
    }
}

/// Structural equality: same attributes, same child order, regardless of
/// how either arena lays out its slots.
impl PartialEq for AddressBook {
    fn eq(&self, other: &Self) -> bool {
        if self.group_count != other.group_count || self.profile_count != other.profile_count {
            return false;
        }
        let mut stack = vec![(self.root, other.root)];
        while let Some((a, b)) = stack.pop() {
            let (Ok(ga), Ok(gb)) = (self.group_node(a), other.group_node(b)) else {
                return false;
            };
            if ga.data != gb.data
                || ga.groups.len() != gb.groups.len()
                || ga.profiles.len() != gb.profiles.len()
            {
                return false;
            }
            for (pa, pb) in ga.profiles.iter().zip(&gb.profiles) {
                match (self.profile(*pa), other.profile(*pb)) {
                    (Ok(x), Ok(y)) if x == y => {}
                    _ => return false,
                }
            }
            stack.extend(ga.groups.iter().copied().zip(gb.groups.iter().copied()));
        }
        true
    }
}

impl Eq for AddressBook {}

#[derive(Debug, Clone, Copy)]
enum Pending {
    Group(GroupId),
    Profile(ProfileId),
}

/// Iterator returned by [`AddressBook::walk`].
pub struct Walk<'a> {
    book: &'a AddressBook,
    stack: Vec<(Pending, usize)>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = TreeItem<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((pending, depth)) = self.stack.pop() {
            match pending {
                Pending::Group(id) => {
                    let Ok(node) = self.book.group_node(id) else { continue };
                    // Profiles go underneath so every child subtree pops first.
                    self.stack
                        .extend(node.profiles.iter().rev().map(|p| (Pending::Profile(*p), depth + 1)));
                    self.stack
                        .extend(node.groups.iter().rev().map(|g| (Pending::Group(*g), depth + 1)));
                    return Some(TreeItem::Group { id, group: &node.data, depth });
                }
                Pending::Profile(id) => {
                    let Ok(node) = self.book.profile_node(id) else { continue };
                    return Some(TreeItem::Profile { id, profile: &node.data, depth });
                }
            }
        }
        None
    }
}

fn check_position(position: usize, len: usize) -> AddressBookResult<()> {
    if position > len {
        return Err(AddressBookError::tree(format!(
            "Position {} is out of range (0..={})",
            position, len
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (AddressBook, GroupId, GroupId, ProfileId) {
        let mut book = AddressBook::new("My Computers");
        let root = book.root();
        let servers = book.add_group(root, ProfileGroup::new("Servers")).unwrap();
        let desktops = book.add_group(root, ProfileGroup::new("Desktops")).unwrap();
        let db1 = book
            .add_profile(servers, ConnectionProfile::new("db1", "10.0.0.5", 22))
            .unwrap();
        book.add_profile(root, ConnectionProfile::new("laptop", "192.168.1.10", 3389))
            .unwrap();
        (book, servers, desktops, db1)
    }

    #[test]
    fn counts_track_inserts_and_removals() {
        let (mut book, servers, _, _) = sample();
        assert_eq!(book.group_count(), 3);
        assert_eq!(book.profile_count(), 2);

        book.remove_group(servers).unwrap();
        assert_eq!(book.group_count(), 2);
        assert_eq!(book.profile_count(), 1);
    }

    #[test]
    fn insert_respects_position() {
        let (mut book, _, _, _) = sample();
        let root = book.root();
        let first = book.insert_group(root, 0, ProfileGroup::new("First")).unwrap();
        let names: Vec<_> = book
            .child_groups(root)
            .unwrap()
            .iter()
            .map(|g| book.group(*g).unwrap().name.clone())
            .collect();
        assert_eq!(names, vec!["First", "Servers", "Desktops"]);
        assert_eq!(book.parent_of_group(first).unwrap(), Some(root));
    }

    #[test]
    fn insert_past_end_is_rejected() {
        let (mut book, _, _, _) = sample();
        let root = book.root();
        let err = book.insert_group(root, 5, ProfileGroup::new("X")).unwrap_err();
        assert!(matches!(err, AddressBookError::InvalidTreeOperation(_)));
    }

    #[test]
    fn stale_id_is_rejected_after_slot_reuse() {
        let (mut book, servers, _, db1) = sample();
        book.remove_group(servers).unwrap();
        assert!(book.profile(db1).is_err());
        assert!(book.group(servers).is_err());

        // The freed slots get reused; old ids must still miss.
        let root = book.root();
        let fresh = book.add_group(root, ProfileGroup::new("Fresh")).unwrap();
        assert_ne!(fresh, servers);
        assert!(book.group(servers).is_err());
        assert_eq!(book.group(fresh).unwrap().name, "Fresh");
    }

    #[test]
    fn root_cannot_be_removed_or_moved() {
        let (mut book, servers, _, _) = sample();
        let root = book.root();
        assert!(book.remove_group(root).is_err());
        assert!(book.move_group(root, servers, 0).is_err());
        assert_eq!(book.parent_of_group(root).unwrap(), None);
    }

    #[test]
    fn move_into_descendant_is_rejected() {
        let (mut book, servers, _, _) = sample();
        let inner = book.add_group(servers, ProfileGroup::new("Inner")).unwrap();
        let err = book.move_group(servers, inner, 0).unwrap_err();
        assert!(matches!(err, AddressBookError::InvalidTreeOperation(_)));
        let err = book.move_group(servers, servers, 0).unwrap_err();
        assert!(matches!(err, AddressBookError::InvalidTreeOperation(_)));
        // Tree untouched.
        assert_eq!(book.parent_of_group(inner).unwrap(), Some(servers));
        assert_eq!(book.child_groups(book.root()).unwrap().len(), 2);
    }

    #[test]
    fn move_group_relinks_subtree() {
        let (mut book, servers, desktops, db1) = sample();
        book.move_group(servers, desktops, 0).unwrap();
        assert_eq!(book.parent_of_group(servers).unwrap(), Some(desktops));
        assert_eq!(book.child_groups(book.root()).unwrap(), &[desktops]);
        assert_eq!(book.parent_of_profile(db1).unwrap(), servers);
        assert_eq!(book.depth(), 2);
    }

    #[test]
    fn move_profile_between_groups() {
        let (mut book, servers, desktops, db1) = sample();
        book.move_profile(db1, desktops, 0).unwrap();
        assert!(book.child_profiles(servers).unwrap().is_empty());
        assert_eq!(book.child_profiles(desktops).unwrap(), &[db1]);
        assert_eq!(book.parent_of_profile(db1).unwrap(), desktops);
    }

    #[test]
    fn reorder_within_parent() {
        let (mut book, servers, desktops, _) = sample();
        book.reorder_group(desktops, 0).unwrap();
        assert_eq!(book.child_groups(book.root()).unwrap(), &[desktops, servers]);
        book.reorder_group(desktops, 1).unwrap();
        assert_eq!(book.child_groups(book.root()).unwrap(), &[servers, desktops]);
        assert!(book.reorder_group(desktops, 2).is_err());
    }

    #[test]
    fn walk_is_preorder_groups_before_profiles() {
        let (book, _, _, _) = sample();
        let order: Vec<(String, usize)> = book
            .walk()
            .map(|item| match item {
                TreeItem::Group { group, depth, .. } => (group.name.clone(), depth),
                TreeItem::Profile { profile, depth, .. } => (profile.name.clone(), depth),
            })
            .collect();
        assert_eq!(
            order,
            vec![
                ("My Computers".to_string(), 0),
                ("Servers".to_string(), 1),
                ("db1".to_string(), 2),
                ("Desktops".to_string(), 1),
                ("laptop".to_string(), 1),
            ]
        );
    }

    #[test]
    fn in_place_update() {
        let (mut book, _, _, db1) = sample();
        book.profile_mut(db1).unwrap().password = "s3cret".into();
        assert_eq!(book.profile(db1).unwrap().password, "s3cret");
    }

    #[test]
    fn find_profiles_matches_name_or_address() {
        let (book, _, _, db1) = sample();
        assert_eq!(book.find_profiles("DB"), vec![db1]);
        assert_eq!(book.find_profiles("192.168").len(), 1);
        assert!(book.find_profiles("nothing").is_empty());
    }

    #[test]
    fn structural_equality_ignores_slot_layout() {
        let (a, _, _, _) = sample();

        // Same tree built in a different order, with a detour through a removed node.
        let mut b = AddressBook::with_root(a.group(a.root()).unwrap().clone());
        let root = b.root();
        let scratch = b.add_group(root, ProfileGroup::new("scratch")).unwrap();
        let laptop = a.profile(a.child_profiles(a.root()).unwrap()[0]).unwrap().clone();
        b.add_profile(root, laptop).unwrap();
        b.remove_group(scratch).unwrap();
        let desktops_data = a.group(a.child_groups(a.root()).unwrap()[1]).unwrap().clone();
        let servers_data = a.group(a.child_groups(a.root()).unwrap()[0]).unwrap().clone();
        b.add_group(root, desktops_data).unwrap();
        let servers = b.insert_group(root, 0, servers_data).unwrap();
        let a_servers = a.child_groups(a.root()).unwrap()[0];
        let db1 = a.profile(a.child_profiles(a_servers).unwrap()[0]).unwrap().clone();
        b.add_profile(servers, db1).unwrap();

        assert_eq!(a, b);
        b.profile_mut(b.child_profiles(servers).unwrap()[0]).unwrap().port = 2222;
        assert_ne!(a, b);
    }
}
