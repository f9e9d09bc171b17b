//! Container locator tests

use std::collections::HashMap;
use std::sync::Arc;

use stratadm::container::ContainerLocator;
use stratadm::errors::AdmError;
use stratadm::filesys::file::File;
use stratadm::storage::state::{JsonStateStore, MemoryStateStore};
use stratadm::topology::ServiceIdentity;
use tokio_test::assert_ok;

fn identity() -> ServiceIdentity {
    ServiceIdentity::new("prod", "0123456789ab")
}

#[tokio::test]
async fn test_locate_recorded_container() {
    let store = Arc::new(MemoryStateStore::new());
    store.insert(identity().as_str(), "3f4a9c1b22de\n");

    let locator = ContainerLocator::new(store);
    assert_eq!(assert_ok!(locator.locate(&identity()).await), "3f4a9c1b22de");
}

#[tokio::test]
async fn test_missing_or_empty_record() {
    let store = Arc::new(MemoryStateStore::new());
    let locator = ContainerLocator::new(store.clone());

    match locator.locate(&identity()).await {
        Err(AdmError::ContainerNotFound(id)) => assert_eq!(id, identity().to_string()),
        other => panic!("expected ContainerNotFound, got {:?}", other),
    }

    store.insert(identity().as_str(), "  ");
    assert!(matches!(
        locator.locate(&identity()).await,
        Err(AdmError::ContainerNotFound(_))
    ));
}

#[tokio::test]
async fn test_unavailable_store_is_not_absence() {
    let store = Arc::new(MemoryStateStore::new());
    store.insert(identity().as_str(), "3f4a9c1b22de");
    store.set_unavailable(true);

    let locator = ContainerLocator::new(store.clone());
    let err = locator.locate(&identity()).await.unwrap_err();
    assert!(matches!(err, AdmError::StateUnavailable(_)));
    assert!(err.is_retryable());

    store.set_unavailable(false);
    assert_ok!(locator.locate(&identity()).await);
}

#[tokio::test]
async fn test_lookup_sees_concurrent_updates() {
    let store = Arc::new(MemoryStateStore::new());
    let locator = ContainerLocator::new(store.clone());

    store.insert(identity().as_str(), "aaaaaaaaaaaa");
    assert_eq!(locator.locate(&identity()).await.unwrap(), "aaaaaaaaaaaa");

    store.insert(identity().as_str(), "bbbbbbbbbbbb");
    assert_eq!(locator.locate(&identity()).await.unwrap(), "bbbbbbbbbbbb");

    store.remove(identity().as_str());
    assert!(locator.locate(&identity()).await.is_err());
}

#[tokio::test]
async fn test_json_store() {
    let dir = tempfile::tempdir().unwrap();
    let file = File::new(dir.path().join("containers.json"));
    let locator = ContainerLocator::new(Arc::new(JsonStateStore::new(file.clone())));

    // No state file yet: nothing deployed
    assert!(matches!(
        locator.locate(&identity()).await,
        Err(AdmError::ContainerNotFound(_))
    ));

    let records = HashMap::from([(identity().to_string(), "3f4a9c1b22de".to_string())]);
    file.write_json(&records).await.unwrap();
    assert_eq!(locator.locate(&identity()).await.unwrap(), "3f4a9c1b22de");

    file.write_string("{ not json").await.unwrap();
    assert!(matches!(
        locator.locate(&identity()).await,
        Err(AdmError::StateUnavailable(_))
    ));
}
