use std::time::Duration;

/// Rows between two progress checkpoints
pub const DEFAULT_CHECKPOINT_INTERVAL: usize = 50;

/// Likert scores at or above this count as favorable
pub const FAVORABLE_THRESHOLD: i32 = 6;

/// Average Likert score below which a response is flagged at risk
pub const AT_RISK_AVERAGE: f64 = 5.0;

/// Imports returned by the listing endpoint when no limit is given
pub const DEFAULT_IMPORT_LIST_LIMIT: i64 = 20;

pub const MAX_IMPORT_LIST_LIMIT: i64 = 100;

/// Delivery attempts for one queued import
pub const DEFAULT_IMPORT_MAX_DELIVER: i64 = 3;

/// Redelivery delay after a transient infrastructure failure
pub const IMPORT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Parsed records buffered between the CSV reader and the importer
pub const IMPORT_ROW_BUFFER: usize = 256;

pub const DEFAULT_UPLOAD_DIR: &str = "tmp/uploads/csv_imports";
