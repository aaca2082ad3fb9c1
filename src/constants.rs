// src/constants.rs

/// The name of the directory holding wayfarer configuration (inside the system config dir).
pub const CONFIG_DIR_NAME: &str = "wayfarer";

/// Environment variable that overrides the configuration directory.
pub const CONFIG_DIR_ENV: &str = "WAYFARER_CONFIG_DIR";

/// The name of the settings file (inside the config dir).
pub const SETTINGS_FILENAME: &str = "config.toml";

/// The default name of the directory holding catalog files (inside the config dir).
pub const CATALOG_DIR_NAME: &str = "catalogs";

/// The default name of the file-backed profile store (inside the config dir).
pub const PROFILES_FILENAME: &str = "profiles.toml";

/// The catalog schema version this build understands.
pub const CATALOG_SPEC_VERSION: u32 = 1;

/// Region used when an account does not declare one.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Requested lifetime of assumed-role credentials, in seconds.
pub const DEFAULT_LIFETIME_SECS: u64 = 3600;

/// Size of the bulk execution worker pool.
pub const WORKER_COUNT: usize = 10;

/// The literal an operator must type to confirm a bulk run.
pub const CONFIRMATION_TEXT: &str = "yes";

/// Credential-related variables that are stripped from every spawned process
/// before explicit credentials are applied.
pub const CREDENTIAL_ENV_VARS: &[&str] = &[
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_SESSION_TOKEN",
    "AWS_SECURITY_TOKEN",
    "AWS_PROFILE",
    "AWS_DEFAULT_PROFILE",
    "AWS_REGION",
    "AWS_DEFAULT_REGION",
    "AWS_CREDENTIAL_EXPIRATION",
];
