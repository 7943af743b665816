use rental_marketplace::{
    config::S3Config,
    storage::{
        LocalDiskStorage, MockStorageService, S3StorageClient, StorageError, StorageService,
        sanitize_key,
    },
};
use std::path::PathBuf;
use uuid::Uuid;

fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("rental-uploads-{}", Uuid::new_v4().simple()))
}

#[test]
fn test_sanitize_key_strips_navigation() {
    assert_eq!(sanitize_key("user/abc.jpg"), "user/abc.jpg");
    assert_eq!(sanitize_key("../../etc/passwd"), "etc/passwd");
    assert_eq!(sanitize_key("/user//./abc.png"), "user/abc.png");
    assert_eq!(sanitize_key("../.."), "");
}

#[tokio::test]
async fn test_mock_storage_success() {
    let storage = MockStorageService::new();
    storage.ensure_ready().await.unwrap();

    let url = storage
        .put_object("user-1/photo.jpg", "image/jpeg", vec![1, 2, 3])
        .await
        .unwrap();
    assert_eq!(url, "http://localhost:9000/mock-bucket/user-1/photo.jpg");
}

#[tokio::test]
async fn test_mock_storage_failure() {
    let storage = MockStorageService::new_failing();
    let result = storage.put_object("k.jpg", "image/jpeg", vec![1]).await;
    assert!(matches!(result, Err(StorageError::ObjectStore(_))));
}

#[tokio::test]
async fn test_empty_key_is_rejected() {
    let storage = MockStorageService::new();
    let result = storage.put_object("../", "image/png", vec![1]).await;
    assert!(matches!(result, Err(StorageError::InvalidKey(_))));
}

#[tokio::test]
async fn test_local_disk_writes_file_and_builds_url() {
    let root = scratch_dir();
    let storage = LocalDiskStorage::new(root.clone(), "http://localhost:3000/");
    storage.ensure_ready().await.unwrap();
    assert!(root.is_dir());

    let url = storage
        .put_object("seller-1/../seller-1/car.png", "image/png", b"png-bytes".to_vec())
        .await
        .unwrap();

    assert_eq!(url, "http://localhost:3000/uploads/seller-1/seller-1/car.png");
    let written = tokio::fs::read(root.join("seller-1/seller-1/car.png")).await.unwrap();
    assert_eq!(written, b"png-bytes");

    tokio::fs::remove_dir_all(&root).await.unwrap();
}

#[test]
fn test_s3_client_construction() {
    let config = S3Config {
        endpoint: "http://localhost:9000".to_string(),
        region: "us-east-1".to_string(),
        access_key: "minio".to_string(),
        secret_key: "minio-secret".to_string(),
        bucket: "vehicle-images".to_string(),
        public_url: "http://localhost:9000/vehicle-images/".to_string(),
    };
    // Building the client performs no network I/O.
    let _client = S3StorageClient::new(&config);
}
