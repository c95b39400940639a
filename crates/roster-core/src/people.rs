//! People collection
//!
//! CRUD over the `people` collection of a record backend, plus a live
//! subscription that always delivers the full collection. Nothing is cached
//! here; every read goes to the backend.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::backend::{RecordBackend, SnapshotFeed};
use crate::error::{CoreResult, StoreError, SubscriptionError, ValidationError};
use crate::models::Person;
use crate::path::{validate_key, StorePath};

/// Name of the collection in the store
pub const COLLECTION: &str = "people";

pub struct PeopleStore {
    backend: Arc<dyn RecordBackend>,
    collection: StorePath,
}

impl PeopleStore {
    pub fn new(backend: Arc<dyn RecordBackend>) -> Self {
        Self {
            backend,
            collection: StorePath::top_level(COLLECTION),
        }
    }

    fn record_path(&self, name: &str) -> Result<StorePath, ValidationError> {
        if name.trim().is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        self.collection.child(name)
    }

    /// Write a person under its name, replacing any existing record
    ///
    /// Returns the name that was saved.
    pub async fn save(&self, person: &Person) -> CoreResult<String> {
        person.validate()?;
        let path = self.record_path(&person.name)?;
        let value = serde_json::to_value(person).map_err(StoreError::from)?;

        self.backend.write(&path, value).await?;
        debug!("Saved {}", person.name);
        Ok(person.name.clone())
    }

    /// Validate raw form input and save it
    pub async fn save_input(&self, name: &str, age: &str) -> CoreResult<String> {
        let person = Person::from_input(name, age)?;
        self.save(&person).await
    }

    /// Read the whole collection, ordered by name
    pub async fn load_all(&self) -> CoreResult<Vec<Person>> {
        let snapshot = self.backend.read(&self.collection).await?;
        Ok(decode_collection(snapshot.as_ref()))
    }

    /// Read one person by name
    pub async fn get(&self, name: &str) -> CoreResult<Option<Person>> {
        let path = self.record_path(name)?;
        let value = self.backend.read(&path).await?;
        Ok(value.and_then(|v| decode_person(name, &v)))
    }

    /// Remove a person by name
    ///
    /// Removing someone who is not there succeeds.
    pub async fn delete(&self, name: &str) -> CoreResult<String> {
        let path = self.record_path(name)?;
        self.backend.delete(&path).await?;
        debug!("Deleted {}", name);
        Ok(name.to_string())
    }

    /// Watch the collection
    ///
    /// The watcher yields the full collection right away, then again after
    /// every change from this or any other client.
    pub async fn on_collection_changed(&self) -> CoreResult<CollectionWatcher> {
        let feed = self.backend.subscribe(&self.collection).await?;
        Ok(CollectionWatcher { feed, done: false })
    }
}

/// Live view of the collection
pub struct CollectionWatcher {
    feed: SnapshotFeed,
    done: bool,
}

impl CollectionWatcher {
    /// Wait for the next full snapshot
    ///
    /// A terminal error is yielded once; after that this returns `None`.
    pub async fn next(&mut self) -> Option<Result<Vec<Person>, SubscriptionError>> {
        if self.done {
            return None;
        }
        match self.feed.next().await {
            Some(Ok(snapshot)) => Some(Ok(decode_collection(snapshot.as_ref()))),
            Some(Err(e)) => {
                self.done = true;
                Some(Err(e))
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}

/// Turn a collection snapshot into people ordered by key
///
/// Children that are not records are skipped.
pub fn decode_collection(snapshot: Option<&Value>) -> Vec<Person> {
    let Some(value) = snapshot else {
        return Vec::new();
    };
    let Some(children) = value.as_object() else {
        warn!("Collection is not a map, ignoring it");
        return Vec::new();
    };

    let ordered: BTreeMap<&String, &Value> = children.iter().collect();
    ordered
        .into_iter()
        .filter_map(|(key, child)| decode_person(key, child))
        .collect()
}

/// Decode one child; the key is the record's identity
fn decode_person(key: &str, value: &Value) -> Option<Person> {
    if let Err(e) = validate_key(key) {
        warn!("Skipping record with unusable key: {}", e);
        return None;
    }
    let Some(fields) = value.as_object() else {
        warn!("Skipping malformed record '{}': not a map", key);
        return None;
    };

    let age = match fields.get("age") {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => n.as_f64(),
        Some(other) => {
            warn!("Skipping malformed record '{}': age is {}", key, other);
            return None;
        }
    };

    if let Some(stored) = fields.get("name").and_then(Value::as_str) {
        if stored != key {
            debug!("Record '{}' stores name '{}', using the key", key, stored);
        }
    }

    Some(Person {
        name: key.to_string(),
        age,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DocumentBackend, MemoryBackend};
    use crate::error::CoreError;
    use serde_json::json;
    use std::time::Duration;

    fn store() -> (PeopleStore, MemoryBackend) {
        let backend = MemoryBackend::new();
        (PeopleStore::new(Arc::new(backend.clone())), backend)
    }

    async fn next_snapshot(watcher: &mut CollectionWatcher) -> Vec<Person> {
        tokio::time::timeout(Duration::from_secs(2), watcher.next())
            .await
            .expect("snapshot in time")
            .expect("watcher open")
            .expect("no subscription error")
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let (store, _) = store();

        let saved = store.save(&Person::new("Leo", 30.0)).await.unwrap();
        assert_eq!(saved, "Leo");
        assert_eq!(store.load_all().await.unwrap(), vec![Person::new("Leo", 30.0)]);
    }

    #[tokio::test]
    async fn test_save_twice_keeps_one_record() {
        let (store, _) = store();
        store.save(&Person::new("Leo", 30.0)).await.unwrap();
        store.save(&Person::new("Leo", 30.0)).await.unwrap();
        assert_eq!(store.load_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_later_save_overwrites() {
        let (store, _) = store();
        store.save(&Person::new("Leo", 30.0)).await.unwrap();
        store.save(&Person::new("Leo", 31.0)).await.unwrap();
        assert_eq!(store.load_all().await.unwrap(), vec![Person::new("Leo", 31.0)]);
    }

    #[tokio::test]
    async fn test_load_all_is_ordered_by_name() {
        let (store, _) = store();
        for (name, age) in [("Max", 12.0), ("Ana", 41.0), ("Leo", 30.0)] {
            store.save(&Person::new(name, age)).await.unwrap();
        }

        let names: Vec<String> = store
            .load_all()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Ana", "Leo", "Max"]);
    }

    #[tokio::test]
    async fn test_empty_collection() {
        let (store, _) = store();
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_record() {
        let (store, _) = store();
        store.save(&Person::new("Leo", 30.0)).await.unwrap();
        store.save(&Person::new("Ana", 41.0)).await.unwrap();

        assert_eq!(store.delete("Leo").await.unwrap(), "Leo");
        assert_eq!(store.load_all().await.unwrap(), vec![Person::new("Ana", 41.0)]);
    }

    #[tokio::test]
    async fn test_delete_unknown_on_empty_collection() {
        let (store, _) = store();
        assert_eq!(store.delete("Unknown").await.unwrap(), "Unknown");
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_empty_name_writes_nothing() {
        let (store, backend) = store();

        let err = store.save(&Person::new("", 30.0)).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::MissingField("name"))
        ));

        let err = store.save_input("  ", "30").await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(backend.dump().await, json!({}));
    }

    #[tokio::test]
    async fn test_save_input_bad_age_writes_nothing() {
        let (store, backend) = store();

        let err = store.save_input("Leo", "abc").await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::InvalidAge(_))
        ));

        let err = store.save_input("Leo", "").await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::MissingField("age"))
        ));
        assert_eq!(backend.dump().await, json!({}));
    }

    #[tokio::test]
    async fn test_save_input_valid() {
        let (store, _) = store();
        store.save_input("Leo", " 30 ").await.unwrap();
        assert_eq!(store.get("Leo").await.unwrap(), Some(Person::new("Leo", 30.0)));
    }

    #[tokio::test]
    async fn test_invalid_key_writes_nothing() {
        let (store, backend) = store();
        let err = store.save(&Person::new("a/b", 1.0)).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::InvalidKey { .. })
        ));
        assert!(store.delete("a.b").await.unwrap_err().is_validation());
        assert_eq!(backend.dump().await, json!({}));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let (store, _) = store();
        assert_eq!(store.get("Nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unavailable_backend() {
        let (store, backend) = store();
        backend.set_offline(true);

        let err = store.save(&Person::new("Leo", 30.0)).await.unwrap_err();
        assert!(matches!(err, CoreError::Store(StoreError::Unavailable)));
        assert_eq!(err.user_message(), "Store unavailable, try again later");
        assert!(store.load_all().await.is_err());
        assert!(store.delete("Leo").await.is_err());
    }

    #[tokio::test]
    async fn test_malformed_children_are_skipped() {
        let (store, backend) = store();
        backend
            .write(
                &StorePath::parse("people").unwrap(),
                json!({
                    "Leo": {"name": "Leo", "age": 30.0},
                    "Bad": "just a string",
                    "Odd": {"name": "Odd", "age": "old"},
                    "Ana": {"name": "Anna", "age": null},
                }),
            )
            .await
            .unwrap();

        assert_eq!(
            store.load_all().await.unwrap(),
            vec![Person::unaged("Ana"), Person::new("Leo", 30.0)]
        );
    }

    #[tokio::test]
    async fn test_watcher_fires_immediately() {
        let (store, _) = store();
        store.save(&Person::new("Leo", 30.0)).await.unwrap();

        let mut watcher = store.on_collection_changed().await.unwrap();
        assert_eq!(next_snapshot(&mut watcher).await, vec![Person::new("Leo", 30.0)]);
    }

    #[tokio::test]
    async fn test_watcher_sees_saves_and_deletes() {
        let (store, _) = store();
        let mut watcher = store.on_collection_changed().await.unwrap();
        assert!(next_snapshot(&mut watcher).await.is_empty());

        store.save(&Person::new("Leo", 30.0)).await.unwrap();
        assert_eq!(next_snapshot(&mut watcher).await, vec![Person::new("Leo", 30.0)]);

        store.save(&Person::new("Leo", 31.0)).await.unwrap();
        assert_eq!(next_snapshot(&mut watcher).await, vec![Person::new("Leo", 31.0)]);

        store.delete("Leo").await.unwrap();
        assert!(next_snapshot(&mut watcher).await.is_empty());
    }

    #[tokio::test]
    async fn test_watcher_sees_other_clients() {
        let backend = MemoryBackend::new();
        let mine = PeopleStore::new(Arc::new(backend.clone()));
        let theirs = PeopleStore::new(Arc::new(backend.connect()));

        let mut watcher = mine.on_collection_changed().await.unwrap();
        next_snapshot(&mut watcher).await;

        theirs.save(&Person::new("Ana", 41.0)).await.unwrap();
        assert_eq!(next_snapshot(&mut watcher).await, vec![Person::new("Ana", 41.0)]);
    }

    #[tokio::test]
    async fn test_watcher_keeps_running_while_offline() {
        let backend = MemoryBackend::new();
        let mine = PeopleStore::new(Arc::new(backend.clone()));
        let other = backend.connect();
        let theirs = PeopleStore::new(Arc::new(other));

        let mut watcher = mine.on_collection_changed().await.unwrap();
        next_snapshot(&mut watcher).await;

        backend.set_offline(true);
        theirs.save(&Person::new("Max", 12.0)).await.unwrap();
        assert_eq!(next_snapshot(&mut watcher).await, vec![Person::new("Max", 12.0)]);
    }

    #[tokio::test]
    async fn test_watcher_error_is_terminal() {
        let (store, backend) = store();
        let mut watcher = store.on_collection_changed().await.unwrap();
        next_snapshot(&mut watcher).await;

        backend.revoke_subscriptions("permission denied");

        let err = watcher.next().await.unwrap().unwrap_err();
        assert_eq!(err, SubscriptionError::Revoked("permission denied".to_string()));
        assert!(watcher.next().await.is_none());
        assert!(watcher.next().await.is_none());
    }

    #[tokio::test]
    async fn test_document_backend_end_to_end() {
        let store = PeopleStore::new(Arc::new(DocumentBackend::in_memory()));
        let mut watcher = store.on_collection_changed().await.unwrap();
        assert!(next_snapshot(&mut watcher).await.is_empty());

        store.save_input("Leo", "30").await.unwrap();
        assert_eq!(next_snapshot(&mut watcher).await, vec![Person::new("Leo", 30.0)]);

        store.save_input("Leo", "31").await.unwrap();
        assert_eq!(next_snapshot(&mut watcher).await, vec![Person::new("Leo", 31.0)]);
        assert_eq!(store.load_all().await.unwrap(), vec![Person::new("Leo", 31.0)]);

        store.delete("Leo").await.unwrap();
        assert!(next_snapshot(&mut watcher).await.is_empty());
    }

    #[test]
    fn test_decode_collection_missing_or_not_a_map() {
        assert!(decode_collection(None).is_empty());
        assert!(decode_collection(Some(&json!(42))).is_empty());
    }
}
