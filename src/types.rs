//! Core types used throughout the partition client.

/// Identifier of a partition in the fixed space `0..max_partition`.
pub type PartitionId = u32;

/// Name of a cluster member (host name, IP address or any unique label).
pub type NodeName = String;

/// Root under which all partition lock paths are created.
pub const LOCK_PATH_ROOT: &str = "/lockpath";

/// Build the coordination-service path of the lock guarding `partition`.
///
/// Paths are namespaced by application so several applications can share
/// one coordination service.
pub fn lock_path(app_name: &str, partition: PartitionId) -> String {
    format!("{}/{}/{}", LOCK_PATH_ROOT, app_name, partition)
}

/// The ring key a partition is hashed under.
pub fn partition_key(partition: PartitionId) -> String {
    partition.to_string()
}
