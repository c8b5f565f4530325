use crate::SharedInstance;
use crate::mutation::Tag;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Live instances by tag, plus the external-id index.
///
/// Each map has its own lock and the two are never held together, so a
/// reader may briefly observe one map updated before the other.
#[derive(Default)]
pub struct InstanceRegistry {
    by_tag: Mutex<HashMap<Tag, SharedInstance>>,
    tag_by_id: Mutex<HashMap<String, Tag>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `instance` under its tag, replacing any previous entry
    pub fn insert(&self, instance: SharedInstance) {
        self.by_tag.lock().insert(instance.tag(), instance);
    }

    pub fn find_by_tag(&self, tag: Tag) -> Option<SharedInstance> {
        self.by_tag.lock().get(&tag).cloned()
    }

    pub fn find_tag_by_id(&self, id: &str) -> Option<Tag> {
        self.tag_by_id.lock().get(id).copied()
    }

    pub fn find_by_id(&self, id: &str) -> Option<SharedInstance> {
        let tag = self.find_tag_by_id(id)?;
        self.find_by_tag(tag)
    }

    /// Move the id mapping of `tag` from `previous_id` to `id`.
    ///
    /// `previous_id` is only dropped while it still points at `tag`; empty ids
    /// are never stored. An unchanged id is still (re)registered.
    pub fn update_tag_by_id(&self, tag: Tag, id: &str, previous_id: &str) {
        let mut tag_by_id = self.tag_by_id.lock();
        if !previous_id.is_empty() && tag_by_id.get(previous_id) == Some(&tag) {
            tag_by_id.remove(previous_id);
        }
        if !id.is_empty() {
            tag_by_id.insert(id.to_string(), tag);
        }
    }

    /// Unregister `tag` and its id mapping, returning the removed instance
    pub fn delete_by_tag(&self, tag: Tag) -> Option<SharedInstance> {
        let instance = self.by_tag.lock().remove(&tag)?;

        let id = instance.id();
        if !id.is_empty() {
            let mut tag_by_id = self.tag_by_id.lock();
            if tag_by_id.get(&id) == Some(&tag) {
                tag_by_id.remove(&id);
            }
        }
        Some(instance)
    }

    pub fn len(&self) -> usize {
        self.by_tag.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.lock().is_empty()
    }

    pub fn tags(&self) -> Vec<Tag> {
        let mut tags: Vec<Tag> = self.by_tag.lock().keys().copied().collect();
        tags.sort();
        tags
    }
}
