//! Platform harness behind the smoke suite
//!
//! The smoke flows are written once against [`StorageHarness`]; the platform
//! is picked a single time when the suite is built.

use crate::domain::model::{ObjectBucket, ObjectStoreConnectInfo, ObjectUser};
use crate::domain::platform::PlatformType;
use crate::error::{Error, Result};
use crate::suite::cleanup::CleanupReport;
use async_trait::async_trait;

/// Block test fixture
#[derive(Debug, Clone)]
pub struct BlockTestData {
    pub name: &'static str,
    pub size: u64,
    pub mount_path: &'static str,
    pub claim: &'static str,
}

pub const BLOCK_TEST_DATA: BlockTestData = BlockTestData {
    name: "block-test",
    size: 1048576,
    mount_path: "/tmp/rook1",
    claim: "block-pv-claim",
};

/// Shared filesystem test fixture
#[derive(Debug, Clone)]
pub struct FileTestData {
    pub name: &'static str,
    pub mount_path: &'static str,
    pub pod_name: &'static str,
}

pub const FILE_TEST_DATA: FileTestData = FileTestData {
    name: "testfs",
    mount_path: "/tmp/rookfs",
    pod_name: "file-test",
};

pub const OBJECT_USER_ID: &str = "rook-user";
pub const OBJECT_USER_DISPLAY_NAME: &str = "A rook RGW user";

/// Storage flows as one platform performs them
#[async_trait]
pub trait StorageHarness: Send + Sync {
    fn platform(&self) -> PlatformType;

    /// Pool, storage class and claim; returns once the claim is bound
    async fn create_block_storage(&self) -> Result<()>;
    async fn mount_block_storage(&self) -> Result<()>;
    async fn write_to_block_storage(&self, data: &str, filename: &str) -> Result<String>;
    async fn read_from_block_storage(&self, filename: &str) -> Result<String>;
    async fn unmount_block_storage(&self) -> Result<()>;
    async fn delete_block_storage(&self) -> Result<()>;

    async fn create_file_storage(&self) -> Result<()>;
    async fn mount_file_storage(&self) -> Result<()>;
    async fn write_to_file_storage(&self, data: &str, filename: &str) -> Result<String>;
    async fn read_from_file_storage(&self, filename: &str) -> Result<String>;
    async fn unmount_file_storage(&self) -> Result<()>;
    async fn delete_file_storage(&self) -> Result<String>;

    async fn create_object_store(&self) -> Result<String>;
    async fn create_object_store_user(&self) -> Result<ObjectUser>;
    async fn object_store_users(&self) -> Result<Vec<ObjectUser>>;
    async fn object_store_user(&self, user_id: &str) -> Result<ObjectUser>;
    async fn object_store_connection(&self) -> Result<ObjectStoreConnectInfo>;
    async fn object_store_buckets(&self) -> Result<Vec<ObjectBucket>>;
    async fn delete_object_store_user(&self) -> Result<()>;
    /// `host:port` where clients outside the cluster reach the gateway
    async fn rgw_service_url(&self) -> Result<String>;

    /// Remove whatever the flows left behind
    async fn cleanup(&self) -> CleanupReport;
}

/// Harness for a stand-alone deployment; nothing is implemented yet
#[derive(Debug, Default)]
pub struct StandAloneHarness;

fn nyi<T>(operation: &str) -> Result<T> {
    Err(Error::not_yet_implemented(PlatformType::StandAlone, operation))
}

#[async_trait]
impl StorageHarness for StandAloneHarness {
    fn platform(&self) -> PlatformType {
        PlatformType::StandAlone
    }

    async fn create_block_storage(&self) -> Result<()> {
        nyi("create block storage")
    }

    async fn mount_block_storage(&self) -> Result<()> {
        nyi("mount block storage")
    }

    async fn write_to_block_storage(&self, _data: &str, _filename: &str) -> Result<String> {
        nyi("write to block storage")
    }

    async fn read_from_block_storage(&self, _filename: &str) -> Result<String> {
        nyi("read from block storage")
    }

    async fn unmount_block_storage(&self) -> Result<()> {
        nyi("unmount block storage")
    }

    async fn delete_block_storage(&self) -> Result<()> {
        nyi("delete block storage")
    }

    async fn create_file_storage(&self) -> Result<()> {
        nyi("create file storage")
    }

    async fn mount_file_storage(&self) -> Result<()> {
        nyi("mount file storage")
    }

    async fn write_to_file_storage(&self, _data: &str, _filename: &str) -> Result<String> {
        nyi("write to file storage")
    }

    async fn read_from_file_storage(&self, _filename: &str) -> Result<String> {
        nyi("read from file storage")
    }

    async fn unmount_file_storage(&self) -> Result<()> {
        nyi("unmount file storage")
    }

    async fn delete_file_storage(&self) -> Result<String> {
        nyi("delete file storage")
    }

    async fn create_object_store(&self) -> Result<String> {
        nyi("create object store")
    }

    async fn create_object_store_user(&self) -> Result<ObjectUser> {
        nyi("create object store user")
    }

    async fn object_store_users(&self) -> Result<Vec<ObjectUser>> {
        nyi("list object store users")
    }

    async fn object_store_user(&self, _user_id: &str) -> Result<ObjectUser> {
        nyi("get object store user")
    }

    async fn object_store_connection(&self) -> Result<ObjectStoreConnectInfo> {
        nyi("get object store connection")
    }

    async fn object_store_buckets(&self) -> Result<Vec<ObjectBucket>> {
        nyi("list object store buckets")
    }

    async fn delete_object_store_user(&self) -> Result<()> {
        nyi("delete object store user")
    }

    async fn rgw_service_url(&self) -> Result<String> {
        nyi("get rgw service url")
    }

    async fn cleanup(&self) -> CleanupReport {
        CleanupReport::default()
    }
}
