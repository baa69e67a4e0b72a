//! Sync configuration loaded from environment variables.
//!
//! Loaded once by the binary and handed to the run controller by value.
//! Nothing inside the engine reads the environment.

use crate::adapters::Credentials;
use crate::models::Platform;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Whether a run transfers files or only reports what it would transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    DryRun,
    Sync,
}

/// Source platform settings.
#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub platform: Platform,
    pub credentials: Option<Credentials>,
}

/// One destination, in priority order. The first is the upload target.
#[derive(Debug, Clone)]
pub struct DestinationSettings {
    pub platform: Platform,
    pub enabled: bool,
    /// Whether this destination may be asked for its latest activity time
    pub watermark_lookup: bool,
    pub credentials: Option<Credentials>,
}

/// Pacing, timeout and size limits for the transfer pipeline.
#[derive(Debug, Clone)]
pub struct TransferSettings {
    /// Delay between consecutive network calls
    pub pacing: Duration,
    /// Upper bound for any single adapter call
    pub operation_timeout: Duration,
    /// Largest payload accepted from a download (bytes)
    pub max_file_size: u64,
    /// Uploads per batch
    pub upload_batch_size: usize,
    /// Delay between upload batches
    pub batch_pause: Duration,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            pacing: Duration::from_millis(300),
            operation_timeout: Duration::from_secs(60),
            max_file_size: 50 * 1024 * 1024,
            upload_batch_size: 5,
            batch_pause: Duration::from_secs(2),
        }
    }
}

/// Complete configuration for one sync run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub mode: SyncMode,
    /// Flat directory for downloaded files (doubles as the dedup index)
    pub storage_dir: PathBuf,
    /// Root of the local archive destination
    pub archive_dir: PathBuf,
    pub source: SourceSettings,
    pub destinations: Vec<DestinationSettings>,
    pub transfer: TransferSettings,
}

impl Default for SyncConfig {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            mode: SyncMode::Sync,
            storage_dir: PathBuf::from("./downloads"),
            archive_dir: PathBuf::from("./archive"),
            source: SourceSettings {
                platform: Platform::Igpsport,
                credentials: Some(Credentials::Password {
                    username: "test_user".to_string(),
                    password: "test_password".to_string(),
                }),
            },
            destinations: vec![DestinationSettings {
                platform: Platform::Strava,
                enabled: true,
                watermark_lookup: true,
                credentials: Some(Credentials::OAuthRefresh {
                    client_id: "test_client_id".to_string(),
                    client_secret: "test_secret".to_string(),
                    refresh_token: "test_refresh".to_string(),
                }),
            }],
            transfer: TransferSettings::default(),
        }
    }
}

impl SyncConfig {
    pub fn is_dry_run(&self) -> bool {
        self.mode == SyncMode::DryRun
    }

    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mode = match get("SYNC_MODE").as_deref() {
            None | Some("sync") | Some("full") => SyncMode::Sync,
            Some("dry_run") | Some("dry-run") | Some("preview") => SyncMode::DryRun,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "SYNC_MODE",
                    value: other.to_string(),
                })
            }
        };

        let source = SourceSettings {
            platform: Platform::Igpsport,
            credentials: Some(Credentials::Password {
                username: get("IGPSPORT_USERNAME")
                    .ok_or(ConfigError::Missing("IGPSPORT_USERNAME"))?,
                password: get("IGPSPORT_PASSWORD")
                    .ok_or(ConfigError::Missing("IGPSPORT_PASSWORD"))?,
            }),
        };

        let order = get("SYNC_DESTINATIONS").unwrap_or_else(|| "strava,archive".to_string());
        let mut destinations = Vec::new();
        for name in order.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let platform: Platform = name.parse().map_err(|_| ConfigError::Invalid {
                key: "SYNC_DESTINATIONS",
                value: name.to_string(),
            })?;

            let settings = match platform {
                Platform::Strava => {
                    let credentials = match (
                        get("STRAVA_CLIENT_ID"),
                        get("STRAVA_CLIENT_SECRET"),
                        get("STRAVA_REFRESH_TOKEN"),
                    ) {
                        (Some(client_id), Some(client_secret), Some(refresh_token)) => {
                            Some(Credentials::OAuthRefresh {
                                client_id,
                                client_secret,
                                refresh_token,
                            })
                        }
                        _ => None,
                    };
                    DestinationSettings {
                        platform,
                        enabled: parse_flag(get("STRAVA_ENABLED"), "STRAVA_ENABLED", true)?,
                        watermark_lookup: parse_flag(
                            get("STRAVA_WATERMARK"),
                            "STRAVA_WATERMARK",
                            true,
                        )?,
                        credentials,
                    }
                }
                Platform::Archive => DestinationSettings {
                    platform,
                    enabled: parse_flag(get("ARCHIVE_ENABLED"), "ARCHIVE_ENABLED", false)?,
                    watermark_lookup: parse_flag(
                        get("ARCHIVE_WATERMARK"),
                        "ARCHIVE_WATERMARK",
                        true,
                    )?,
                    credentials: Some(Credentials::Anonymous),
                },
                Platform::Igpsport => {
                    return Err(ConfigError::Invalid {
                        key: "SYNC_DESTINATIONS",
                        value: name.to_string(),
                    })
                }
            };
            destinations.push(settings);
        }

        let defaults = TransferSettings::default();
        let transfer = TransferSettings {
            pacing: get("SYNC_PACING_MS")
                .map(|v| parse_number(&v, "SYNC_PACING_MS").map(Duration::from_millis))
                .transpose()?
                .unwrap_or(defaults.pacing),
            operation_timeout: get("SYNC_TIMEOUT_SECS")
                .map(|v| parse_number(&v, "SYNC_TIMEOUT_SECS").map(Duration::from_secs))
                .transpose()?
                .unwrap_or(defaults.operation_timeout),
            max_file_size: get("SYNC_MAX_FILE_BYTES")
                .map(|v| parse_number(&v, "SYNC_MAX_FILE_BYTES"))
                .transpose()?
                .unwrap_or(defaults.max_file_size),
            upload_batch_size: get("SYNC_UPLOAD_BATCH")
                .map(|v| parse_number(&v, "SYNC_UPLOAD_BATCH").map(|n| n.max(1) as usize))
                .transpose()?
                .unwrap_or(defaults.upload_batch_size),
            batch_pause: get("SYNC_BATCH_PAUSE_MS")
                .map(|v| parse_number(&v, "SYNC_BATCH_PAUSE_MS").map(Duration::from_millis))
                .transpose()?
                .unwrap_or(defaults.batch_pause),
        };

        Ok(Self {
            mode,
            storage_dir: get("STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./downloads")),
            archive_dir: get("ARCHIVE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./archive")),
            source,
            destinations,
            transfer,
        })
    }
}

fn parse_flag(value: Option<String>, key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("1") | Some("true") | Some("yes") | Some("on") => Ok(true),
        Some("0") | Some("false") | Some("no") | Some("off") => Ok(false),
        Some(other) => Err(ConfigError::Invalid {
            key,
            value: other.to_string(),
        }),
    }
}

fn parse_number(value: &str, key: &'static str) -> Result<u64, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}
