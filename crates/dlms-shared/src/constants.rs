/// Application name
pub const APP_NAME: &str = "DLMS";

/// Admin session lifetime in hours
pub const SESSION_TTL_HOURS: i64 = 24;

/// Random bytes in a session token id (hex-encoded on the wire)
pub const SESSION_TOKEN_BYTES: usize = 32;

/// Key derivation context for the session signing key (BLAKE3)
pub const KDF_CONTEXT_SESSION_KEY: &str = "dlms-admin-session-key-v1";

/// Months ahead of expiry at which a license is flagged as expiring soon
pub const EXPIRY_WARNING_MONTHS: u32 = 3;

/// Literal day window for the dashboard "expiring in the next 30 days" widget
pub const DASHBOARD_EXPIRY_WINDOW_DAYS: i64 = 30;

/// Maximum uploaded image size in bytes (2 MiB)
pub const MAX_IMAGE_SIZE: usize = 2 * 1024 * 1024;

/// Blob bucket holding license photos
pub const PHOTO_BUCKET: &str = "license-images";

/// Blob bucket holding license signatures
pub const SIGNATURE_BUCKET: &str = "license-signatures";

/// Minimum length of the name and father name fields
pub const MIN_NAME_LEN: usize = 3;

/// Minimum length of the address field
pub const MIN_ADDRESS_LEN: usize = 10;

/// Number of records shown in the dashboard "recent activity" widget
pub const RECENT_ACTIVITY_LEN: usize = 5;

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;
