// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display and platform directories)
pub const APP_NAME: &str = "Periscope";

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "periscope";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".periscope";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "periscope.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "PERISCOPE_CONFIG";

// =============================================================================
// Environment Variables - Debug
// =============================================================================

/// Environment variable for debug mode (captures every event)
pub const ENV_DEBUG: &str = "PERISCOPE_DEBUG";

// =============================================================================
// Environment Variables - Server
// =============================================================================

/// Environment variable for server host
pub const ENV_HOST: &str = "PERISCOPE_HOST";

/// Environment variable for server port
pub const ENV_PORT: &str = "PERISCOPE_PORT";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "PERISCOPE_LOG";

// =============================================================================
// Server Defaults
// =============================================================================

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_PORT: u16 = 5390;

/// Maximum request body size accepted by the API
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

// =============================================================================
// Environment Variables - Capture
// =============================================================================

/// Environment variable enabling error-only capture outside debug mode
pub const ENV_ERROR_RECORD: &str = "PERISCOPE_ERROR_RECORD";

/// Environment variable dropping requests that matched no route
pub const ENV_ONLY_ROUTE: &str = "PERISCOPE_ONLY_ROUTE";

/// Environment variable for excluded request paths (comma separated)
pub const ENV_EXCLUDE: &str = "PERISCOPE_EXCLUDE";

// =============================================================================
// Capture Defaults
// =============================================================================

/// Paths never captured: the inspection API itself and browser noise
pub const DEFAULT_EXCLUDE: &[&str] = &["/api/v1/*", "/favicon.ico"];

/// Path fragment identifying model-layer frames in a backtrace
pub const DEFAULT_MODEL_MARKER: &str = "/src/entity/";

/// Cap on the buffered copy of each response body
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

/// Request bodies up to this size are buffered for the `payload` field
pub const CAPTURE_REQUEST_BODY_LIMIT: usize = 64 * 1024;

/// Prefix shared by the capture tables; statements touching them are not captured
pub const TABLE_PREFIX: &str = "periscope_";

// =============================================================================
// Environment Variables - Storage
// =============================================================================

/// Environment variable to override data directory
pub const ENV_DATA_DIR: &str = "PERISCOPE_DATA_DIR";

// =============================================================================
// SQLite
// =============================================================================

/// SQLite database filename
pub const SQLITE_DB_FILENAME: &str = "periscope.db";

/// Maximum connections in the pool
pub const SQLITE_MAX_CONNECTIONS: u32 = 5;

/// Busy timeout for lock contention
pub const SQLITE_BUSY_TIMEOUT_SECS: u64 = 30;

/// Page cache size (negative = KiB)
pub const SQLITE_CACHE_SIZE: &str = "-64000";

/// Pages between automatic WAL checkpoints
pub const SQLITE_WAL_AUTOCHECKPOINT: &str = "1000";

/// Interval between explicit WAL checkpoints
pub const SQLITE_CHECKPOINT_INTERVAL_SECS: u64 = 300;

// =============================================================================
// Inspection API
// =============================================================================

/// Default page size for entry listings
pub const DEFAULT_ENTRY_LIMIT: u32 = 50;

/// Largest page size accepted for entry listings
pub const MAX_ENTRY_LIMIT: u32 = 500;

// =============================================================================
// Shutdown
// =============================================================================

/// Time allowed for background tasks to drain on shutdown
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 30;
