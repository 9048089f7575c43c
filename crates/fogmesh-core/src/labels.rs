//! Well-known label keys read from platform nodes and written on workloads.

/// Prefix shared by every fogmesh label.
pub const LABEL_PREFIX: &str = "fogmesh.io";

pub const LONGITUDE: &str = "fogmesh.io/longitude";
pub const LATITUDE: &str = "fogmesh.io/latitude";
/// Comma-separated IoT capability tags.
pub const IOT_CAPS: &str = "fogmesh.io/iot_caps";
/// Comma-separated security capability tags.
pub const SEC_CAPS: &str = "fogmesh.io/sec_caps";
pub const HW_CAPS: &str = "fogmesh.io/hw_caps";

/// Application id label on workload and exposure objects.
pub const APP: &str = "fogmesh.io/app";
/// Service id label on workload and exposure objects.
pub const SERVICE: &str = "fogmesh.io/service";
