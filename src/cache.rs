//! Tag-invalidated read cache.
//!
//! Reads store their computed value under a key together with a set of tags;
//! mutations invalidate tags, discarding every entry that carries one. The
//! database stays authoritative: this cache is only a derived view and is
//! allowed to over-invalidate, never to serve stale rows.

use std::collections::HashSet;

use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

/// Entity kinds that participate in tag derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Courses,
    CourseSections,
    Lessons,
    Products,
    Purchases,
    Users,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Courses => "courses",
            EntityKind::CourseSections => "course_sections",
            EntityKind::Lessons => "lessons",
            EntityKind::Products => "products",
            EntityKind::Purchases => "purchases",
            EntityKind::Users => "users",
        }
    }
}

/// Tag carried by any read that touches a row of this kind.
pub fn global_tag(kind: EntityKind) -> String {
    format!("{}:global", kind.as_str())
}

/// Tag for reads scoped to a single entity id.
pub fn id_tag(kind: EntityKind, id: Uuid) -> String {
    format!("{}:id:{}", kind.as_str(), id)
}

/// Tag for reads filtered by an owning user.
pub fn user_tag(kind: EntityKind, user_id: Uuid) -> String {
    format!("{}:user:{}", kind.as_str(), user_id)
}

struct CacheEntry {
    value: serde_json::Value,
    tags: Vec<String>,
}

/// Process-wide key-value cache with tag invalidation. Held in `AppState`
/// and passed explicitly; there is no global instance.
#[derive(Default)]
pub struct TagCache {
    entries: DashMap<String, CacheEntry>,
    // tag -> keys carrying it
    index: DashMap<String, HashSet<String>>,
}

impl TagCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = self.entries.get(key)?;
        serde_json::from_value(entry.value.clone()).ok()
    }

    pub fn put<T: Serialize>(&self, key: &str, value: &T, tags: &[String]) {
        let Ok(value) = serde_json::to_value(value) else {
            return;
        };
        for tag in tags {
            self.index
                .entry(tag.clone())
                .or_default()
                .insert(key.to_string());
        }
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                tags: tags.to_vec(),
            },
        );
    }

    /// Drop every entry carrying `tag`. Concurrent writers may race a put
    /// against an invalidate; losing an entry is harmless, keeping a stale
    /// one is not, so removal always wins on the keys seen here.
    pub fn invalidate(&self, tag: &str) {
        let Some((_, keys)) = self.index.remove(tag) else {
            return;
        };
        for key in keys {
            if let Some((_, entry)) = self.entries.remove(&key) {
                for other in entry.tags {
                    if other != tag {
                        if let Some(mut set) = self.index.get_mut(&other) {
                            set.remove(&key);
                        }
                    }
                }
            }
        }
    }

    pub fn invalidate_all(&self, tags: &[String]) {
        for tag in tags {
            self.invalidate(tag);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// Cascade helpers. A child mutation invalidates its own tags plus the
// id tags of every ancestor whose cached aggregates embed it.

pub fn invalidate_course(cache: &TagCache, course_id: Uuid) {
    cache.invalidate_all(&[
        global_tag(EntityKind::Courses),
        id_tag(EntityKind::Courses, course_id),
    ]);
}

pub fn invalidate_section(cache: &TagCache, section_id: Uuid, course_id: Uuid) {
    cache.invalidate_all(&[
        global_tag(EntityKind::CourseSections),
        id_tag(EntityKind::CourseSections, section_id),
        id_tag(EntityKind::Courses, course_id),
    ]);
}

pub fn invalidate_lesson(cache: &TagCache, lesson_id: Uuid, section_id: Uuid, course_id: Uuid) {
    cache.invalidate_all(&[
        global_tag(EntityKind::Lessons),
        id_tag(EntityKind::Lessons, lesson_id),
        id_tag(EntityKind::CourseSections, section_id),
        id_tag(EntityKind::Courses, course_id),
    ]);
}

pub fn invalidate_product(cache: &TagCache, product_id: Uuid) {
    cache.invalidate_all(&[
        global_tag(EntityKind::Products),
        id_tag(EntityKind::Products, product_id),
    ]);
}

pub fn invalidate_purchase(cache: &TagCache, purchase_id: Uuid, user_id: Uuid, product_id: Uuid) {
    cache.invalidate_all(&[
        global_tag(EntityKind::Purchases),
        id_tag(EntityKind::Purchases, purchase_id),
        user_tag(EntityKind::Purchases, user_id),
        id_tag(EntityKind::Products, product_id),
    ]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let cache = TagCache::new();
        cache.put("k", &vec![1, 2, 3], &["t".into()]);
        assert_eq!(cache.get::<Vec<i32>>("k"), Some(vec![1, 2, 3]));
    }

    #[test]
    fn invalidate_drops_only_tagged_entries() {
        let cache = TagCache::new();
        cache.put("a", &1, &["x".into(), "y".into()]);
        cache.put("b", &2, &["y".into()]);
        cache.put("c", &3, &["z".into()]);

        cache.invalidate("y");

        assert_eq!(cache.get::<i32>("a"), None);
        assert_eq!(cache.get::<i32>("b"), None);
        assert_eq!(cache.get::<i32>("c"), Some(3));
    }

    #[test]
    fn invalidate_unknown_tag_is_a_no_op() {
        let cache = TagCache::new();
        cache.put("a", &1, &["x".into()]);
        cache.invalidate("missing");
        assert_eq!(cache.get::<i32>("a"), Some(1));
    }

    #[test]
    fn lesson_invalidation_cascades_to_section_and_course() {
        let cache = TagCache::new();
        let (course_id, section_id, lesson_id) =
            (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        cache.put(
            "course_detail",
            &"detail",
            &[
                global_tag(EntityKind::Courses),
                id_tag(EntityKind::Courses, course_id),
            ],
        );
        cache.put(
            "lesson_read",
            &"lesson",
            &[
                global_tag(EntityKind::Lessons),
                id_tag(EntityKind::Lessons, lesson_id),
            ],
        );
        cache.put("unrelated", &"other", &[global_tag(EntityKind::Products)]);

        invalidate_lesson(&cache, lesson_id, section_id, course_id);

        assert_eq!(cache.get::<String>("course_detail"), None);
        assert_eq!(cache.get::<String>("lesson_read"), None);
        assert_eq!(cache.get::<String>("unrelated"), Some("other".into()));
    }

    #[test]
    fn purchase_invalidation_covers_user_scope() {
        let cache = TagCache::new();
        let (purchase_id, user_id, product_id) =
            (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        cache.put(
            "my_purchases",
            &"history",
            &[user_tag(EntityKind::Purchases, user_id)],
        );
        invalidate_purchase(&cache, purchase_id, user_id, product_id);
        assert_eq!(cache.get::<String>("my_purchases"), None);
    }
}
