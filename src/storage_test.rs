use super::*;

fn temp_path(label: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("taskboard-storage-{label}-{}", uuid::Uuid::new_v4()))
        .join("storage.json")
}

// =============================================================================
// MemoryStorage
// =============================================================================

#[test]
fn memory_storage_set_get_remove() {
    let storage = MemoryStorage::new();
    assert_eq!(storage.get_item("k"), None);
    storage.set_item("k", "v");
    assert_eq!(storage.get_item("k").as_deref(), Some("v"));
    storage.remove_item("k");
    assert_eq!(storage.get_item("k"), None);
}

#[test]
fn memory_storage_overwrites() {
    let storage = MemoryStorage::new();
    storage.set_item("k", "a");
    storage.set_item("k", "b");
    assert_eq!(storage.get_item("k").as_deref(), Some("b"));
}

// =============================================================================
// FileStorage
// =============================================================================

#[test]
fn file_storage_missing_file_starts_empty() {
    let storage = FileStorage::open(temp_path("missing"));
    assert_eq!(storage.get_item(USERID_KEY), None);
}

#[test]
fn file_storage_survives_reopen() {
    let path = temp_path("reopen");
    {
        let storage = FileStorage::open(&path);
        storage.set_item(USERID_KEY, "7");
        storage.set_item(ROLE_KEY, "manager");
    }
    let reopened = FileStorage::open(&path);
    assert_eq!(reopened.get_item(USERID_KEY).as_deref(), Some("7"));
    assert_eq!(reopened.get_item(ROLE_KEY).as_deref(), Some("manager"));
    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn file_storage_remove_persists() {
    let path = temp_path("remove");
    let storage = FileStorage::open(&path);
    storage.set_item(USERID_KEY, "7");
    storage.remove_item(USERID_KEY);
    let reopened = FileStorage::open(&path);
    assert_eq!(reopened.get_item(USERID_KEY), None);
    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn file_storage_corrupt_file_starts_empty() {
    let path = temp_path("corrupt");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"not json").unwrap();
    let storage = FileStorage::open(&path);
    assert_eq!(storage.get_item(USERID_KEY), None);
    storage.set_item(ROLE_KEY, "staff");
    assert_eq!(FileStorage::open(&path).get_item(ROLE_KEY).as_deref(), Some("staff"));
    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

// =============================================================================
// Cached identity
// =============================================================================

#[test]
fn cached_identity_round_trip_uses_plain_strings() {
    let storage = MemoryStorage::new();
    write_cached_identity(&storage, Identity { user_id: 7, role: Role::Manager });
    assert_eq!(storage.get_item(USERID_KEY).as_deref(), Some("7"));
    assert_eq!(storage.get_item(ROLE_KEY).as_deref(), Some("manager"));
    assert_eq!(read_cached_identity(&storage), Some(Identity { user_id: 7, role: Role::Manager }));
}

#[test]
fn cached_identity_requires_both_keys() {
    let storage = MemoryStorage::new();
    storage.set_item(USERID_KEY, "7");
    assert_eq!(read_cached_identity(&storage), None);
}

#[test]
fn cached_identity_ignores_garbage() {
    let storage = MemoryStorage::new();
    storage.set_item(USERID_KEY, "seven");
    storage.set_item(ROLE_KEY, "manager");
    assert_eq!(read_cached_identity(&storage), None);

    storage.set_item(USERID_KEY, "7");
    storage.set_item(ROLE_KEY, "overlord");
    assert_eq!(read_cached_identity(&storage), None);
}

#[test]
fn clear_cached_identity_removes_both_keys() {
    let storage = MemoryStorage::new();
    write_cached_identity(&storage, Identity { user_id: 3, role: Role::Staff });
    clear_cached_identity(&storage);
    assert_eq!(storage.get_item(USERID_KEY), None);
    assert_eq!(storage.get_item(ROLE_KEY), None);
}
