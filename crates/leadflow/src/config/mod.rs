use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub admin: AdminConfig,
    pub storage: StorageConfig,
    pub notifications: NotificationConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let storage = StorageConfig {
            leads_db: optional_var("LEADFLOW_LEADS_DB")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("leadflow-leads.db")),
            forms_db: optional_var("LEADFLOW_FORMS_DB")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("leadflow-forms.db")),
            unique_email: flag_var("LEADFLOW_UNIQUE_EMAIL", false)?,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                ansi: environment == AppEnvironment::Development,
            },
            admin: AdminConfig {
                admin_key: optional_var("LEADFLOW_ADMIN_KEY"),
            },
            storage,
            notifications: NotificationConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub ansi: bool,
}

/// Shared secret gating the admin API. `None` locks every admin endpoint.
#[derive(Clone, Default)]
pub struct AdminConfig {
    pub admin_key: Option<String>,
}

impl fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminConfig")
            .field("admin_key_configured", &self.admin_key.is_some())
            .finish()
    }
}

/// Locations of the two SQLite databases: the lead collection and the form catalog.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub leads_db: PathBuf,
    pub forms_db: PathBuf,
    pub unique_email: bool,
}

/// Optional outbound channels. A channel without configuration is skipped.
#[derive(Debug, Clone, Default)]
pub struct NotificationConfig {
    pub email: Option<EmailConfig>,
    pub sms: Option<SmsConfig>,
    pub telegram: Option<TelegramConfig>,
    pub push: Option<PushConfig>,
    pub admin_panel_url: Option<String>,
}

impl NotificationConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let email = match optional_var("SMTP_FROM") {
            Some(from) => {
                let port = match optional_var("SMTP_PORT") {
                    Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::InvalidSmtpPort)?,
                    None => 587,
                };
                Some(EmailConfig {
                    host: optional_var("SMTP_HOST").unwrap_or_else(|| "smtp.gmail.com".to_string()),
                    port,
                    username: optional_var("SMTP_USER"),
                    password: optional_var("SMTP_PASS"),
                    from,
                    admin_recipient: optional_var("ADMIN_EMAIL"),
                })
            }
            None => None,
        };

        let sms = optional_var("FAST2SMS_AUTHORIZATION").map(|authorization| SmsConfig {
            authorization,
            sender_id: optional_var("FAST2SMS_SENDER_ID"),
            message_id: optional_var("FAST2SMS_MESSAGE_ID"),
            endpoint: optional_var("FAST2SMS_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_FAST2SMS_ENDPOINT.to_string()),
        });

        let telegram = match (
            optional_var("TELEGRAM_BOT_TOKEN"),
            optional_var("TELEGRAM_CHAT_ID"),
        ) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramConfig {
                bot_token,
                chat_id,
                api_base: optional_var("TELEGRAM_API_BASE")
                    .unwrap_or_else(|| DEFAULT_TELEGRAM_API_BASE.to_string()),
            }),
            _ => None,
        };

        let push = optional_var("VAPID_PRIVATE_KEY").map(|vapid_private_key| PushConfig {
            vapid_private_key,
            contact_email: optional_var("VAPID_EMAIL")
                .unwrap_or_else(|| "admin@example.com".to_string()),
        });

        Ok(Self {
            email,
            sms,
            telegram,
            push,
            admin_panel_url: optional_var("LEADFLOW_ADMIN_PANEL_URL"),
        })
    }
}

pub const DEFAULT_FAST2SMS_ENDPOINT: &str = "https://www.fast2sms.com/dev/bulkV2";
pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";

#[derive(Clone)]
pub struct EmailConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub admin_recipient: Option<String>,
}

impl fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("from", &self.from)
            .field("admin_recipient", &self.admin_recipient)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct SmsConfig {
    pub authorization: String,
    pub sender_id: Option<String>,
    pub message_id: Option<String>,
    pub endpoint: String,
}

impl fmt::Debug for SmsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmsConfig")
            .field("sender_id", &self.sender_id)
            .field("message_id", &self.message_id)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    pub api_base: String,
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("chat_id", &self.chat_id)
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct PushConfig {
    pub vapid_private_key: String,
    pub contact_email: String,
}

impl fmt::Debug for PushConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushConfig")
            .field("contact_email", &self.contact_email)
            .finish_non_exhaustive()
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn flag_var(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match optional_var(name) {
        None => Ok(default),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidFlag { name }),
        },
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidSmtpPort,
    InvalidFlag { name: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidSmtpPort => write!(f, "SMTP_PORT must be a valid u16"),
            ConfigError::InvalidFlag { name } => {
                write!(f, "{name} must be one of true/false/1/0/yes/no/on/off")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidSmtpPort
            | ConfigError::InvalidFlag { .. } => None,
        }
    }
}
