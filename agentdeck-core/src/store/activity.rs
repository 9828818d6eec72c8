//! Activity feed: a superset view of every stream event kind.

use std::collections::{HashSet, VecDeque};

use crate::types::Activity;

/// Newest-first, capacity-bounded activity feed.
#[derive(Debug)]
pub struct ActivityStore {
    items: VecDeque<Activity>,
    ids: HashSet<String>,
    fingerprints: HashSet<String>,
    capacity: usize,
}

impl ActivityStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            ids: HashSet::new(),
            fingerprints: HashSet::new(),
            capacity,
        }
    }

    fn is_duplicate(&self, activity: &Activity, fingerprint: &str) -> bool {
        self.ids.contains(&activity.id) || self.fingerprints.contains(fingerprint)
    }

    /// Prepend a live activity. Returns false if it was already present.
    pub fn add(&mut self, activity: Activity) -> bool {
        let fingerprint = activity.fingerprint();
        if self.is_duplicate(&activity, &fingerprint) {
            return false;
        }
        self.ids.insert(activity.id.clone());
        self.fingerprints.insert(fingerprint);
        self.items.push_front(activity);
        self.evict();
        true
    }

    /// Merge a historical batch, keeping timestamp-descending order.
    ///
    /// Returns the number of activities actually inserted.
    pub fn add_many(&mut self, activities: impl IntoIterator<Item = Activity>) -> usize {
        let mut fresh = Vec::new();
        for activity in activities {
            let fingerprint = activity.fingerprint();
            if self.is_duplicate(&activity, &fingerprint) {
                continue;
            }
            self.ids.insert(activity.id.clone());
            self.fingerprints.insert(fingerprint);
            fresh.push(activity);
        }
        if fresh.is_empty() {
            return 0;
        }
        let added = fresh.len();

        fresh.extend(self.items.drain(..));
        fresh.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        self.items = fresh.into();
        self.evict();
        added
    }

    fn evict(&mut self) {
        while self.items.len() > self.capacity {
            if let Some(old) = self.items.pop_back() {
                self.ids.remove(&old.id);
                self.fingerprints.remove(&old.fingerprint());
            }
        }
    }

    /// Activities, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &Activity> {
        self.items.iter()
    }

    pub fn by_agent<'a>(&'a self, agent_id: &'a str) -> impl Iterator<Item = &'a Activity> + 'a {
        self.items.iter().filter(move |a| a.agent_id == agent_id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.ids.clear();
        self.fingerprints.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ActivityType;
    use chrono::{Duration, TimeZone, Utc};

    fn activity(id: &str, secs: i64) -> Activity {
        Activity {
            id: id.to_string(),
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs),
            activity_type: ActivityType::ToolCall,
            agent_id: "worker".to_string(),
            data: serde_json::json!({}),
        }
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut store = ActivityStore::new(10);
        assert!(store.add(activity("a", 1)));
        assert!(!store.add(activity("a", 1)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_fingerprint_blocks_same_event_under_new_id() {
        let mut store = ActivityStore::new(10);
        store.add(activity("live-uuid", 5));
        assert!(!store.add(activity("rest-id", 5)));
        assert_eq!(store.add_many(vec![activity("rest-id", 5)]), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_eviction_keeps_newest() {
        let mut store = ActivityStore::new(3);
        for i in 0..5 {
            store.add(activity(&format!("a{}", i), i));
        }
        assert_eq!(store.len(), 3);
        let ids: Vec<_> = store.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a4", "a3", "a2"]);
        assert!(!store.contains("a0"));
    }

    #[test]
    fn test_add_many_merges_by_timestamp() {
        let mut store = ActivityStore::new(4);
        store.add(activity("live-2", 20));
        store.add(activity("live-4", 40));

        let added = store.add_many(vec![
            activity("hist-1", 10),
            activity("hist-3", 30),
            activity("hist-3", 30),
            activity("live-4", 40),
        ]);
        assert_eq!(added, 2);

        let ids: Vec<_> = store.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["live-4", "hist-3", "live-2", "hist-1"]);

        store.add_many(vec![activity("hist-0", 0), activity("hist-5", 50)]);
        let ids: Vec<_> = store.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["hist-5", "live-4", "hist-3", "live-2"]);
    }

    #[test]
    fn test_by_agent_and_clear() {
        let mut store = ActivityStore::new(10);
        store.add(activity("a", 1));
        let mut other = activity("b", 2);
        other.agent_id = "supervisor".to_string();
        store.add(other);

        assert_eq!(store.by_agent("supervisor").count(), 1);
        store.clear();
        assert!(store.is_empty());
        assert!(store.add(activity("a", 1)));
    }
}
