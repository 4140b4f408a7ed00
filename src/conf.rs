//  struct GetDefault;
//  struct GetOption;
//  struct Has;
//
//  fn settings() -> &'static RwLock<Config>
//  fn settled() -> &'static Settings
//  fn site_key() -> Option<String>
use config::Config;
use serde::{Deserialize, Serialize};
use std::sync::{OnceLock, RwLock};

// raw environment variable the site key falls back to
pub const SITE_KEY_ENV: &str = "DataSiteKey";

// flash secrets shipped in defaults, anyone can sign cookies with them
pub const PUBLIC_FLASH_SECRETS: [&str; 2] = ["change-me", "siteguard-flash"];

//get or default
pub struct GetDefault;
pub struct GetOption;
pub struct Has;

/// get settings
/// it's not recommand to call settings() directly
/// use settled() to get the typed Settings or use GetOption::xxx | GetDefault::xxx | Has::has
///
/// # Returns
/// * `&'static RwLock<Config>` - config instance
pub fn settings() -> &'static RwLock<Config> {
    static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();
    CONFIG.get_or_init(|| RwLock::new(init_config()))
}

/// get typed settings, deserialized once from settings()
/// # Returns
/// * `&'static Settings` - settings instance, defaults when the config can not be deserialized
pub fn settled() -> &'static Settings {
    static SETTLED: OnceLock<Settings> = OnceLock::new();
    SETTLED.get_or_init(|| {
        let loaded = match settings().read() {
            Ok(guard) => guard.clone().try_deserialize::<Settings>().map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        loaded.unwrap_or_else(|e| {
            tracing::warn!("settings loading error, using defaults: {}", e);
            Settings::default()
        })
    })
}

/// site key flashed by the gate
/// `gate.site_key` from config first, then the raw `DataSiteKey` environment variable
pub fn site_key() -> Option<String> {
    settled().gate.site_key.clone().or_else(|| std::env::var(SITE_KEY_ENV).ok())
}

/// init config
/// # Returns
/// * `Config` - config instance
fn init_config() -> Config {
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!(".env not loaded: {}", e);
    }

    //development production testing
    let run_mode = std::env::var("SITEGUARD_RUN_MODE").unwrap_or("development".to_string());
    tracing::info!("SITEGUARD_RUN_MODE={}", run_mode);

    let config_path = std::env::var("SITEGUARD_CONFIG_PATH").unwrap_or("config".to_string());
    tracing::info!("Config file path: {}", config_path);

    let conf = config::File::with_name(&format!("{config_path}/config.yml")).required(false);
    let mode = config::File::with_name(&format!("{config_path}/{run_mode}.yml")).required(false);
    let local = config::File::with_name(&format!("{config_path}/local.yml")).required(false);

    let mut builder = Config::builder().add_source(conf).add_source(mode).add_source(local);

    #[cfg(test)]
    {
        let tests_load = format!("{}/tests/using-test-config.yml", env!("CARGO_MANIFEST_DIR"));
        tracing::info!("test mode, loading: {}", tests_load);
        builder = builder.add_source(config::File::with_name(tests_load.as_str()).required(false));
    }

    builder = builder.add_source(env_source());

    builder.build().unwrap_or_else(|e| {
        tracing::error!("config build failed, continue with empty config: {}", e);
        Config::default()
    })
}

/// `SITEGUARD__WEB__FLASH_SECRET` overrides `web.flash_secret`, the prefix takes the same `__` separator
fn env_source() -> config::Environment {
    config::Environment::with_prefix("SITEGUARD").separator("__")
}

/// make getter for settings, if not found, return default value
macro_rules! make_setting_getter_default {
    ($name:ident, $type:ty, $getter:ident) => {
        pub fn $name(k: &str, default: $type) -> $type {
            match settings().read() {
                Ok(guard) => guard.$getter(k).unwrap_or(default),
                Err(_) => default,
            }
        }
    };
}

/// make getter for settings, return Option value
macro_rules! make_setting_getter_option {
    ($name:ident, $type:ty, $getter:ident) => {
        pub fn $name(k: &str) -> Option<$type> {
            match settings().read() {
                Ok(guard) => guard.$getter(k).ok(),
                Err(_) => None,
            }
        }
    };
}

/// make getter for settings
macro_rules! make_setting_getter {
    ($name:ident, $type:ty, $getter:ident) => {
        impl GetDefault {
            make_setting_getter_default!($name, $type, $getter);
        }

        impl GetOption {
            make_setting_getter_option!($name, $type, $getter);
        }
    };
}

make_setting_getter!(string, String, get_string);
make_setting_getter!(boolean, bool, get_bool);
make_setting_getter!(int, i64, get_int);

impl GetOption {
    pub fn get<T: for<'de> Deserialize<'de>>(key: &str) -> Option<T> {
        match settings().read() {
            Ok(guard) => guard.get(key).ok(),
            Err(_) => None,
        }
    }
}

impl GetDefault {
    pub fn get<T: for<'de> Deserialize<'de>>(key: &str, default: T) -> T {
        match settings().read() {
            Ok(guard) => guard.get(key).unwrap_or(default),
            Err(_) => default,
        }
    }
}

impl Has {
    pub fn has<T: for<'a> serde::Deserialize<'a>>(k: &str) -> bool {
        match settings().read() {
            Ok(guard) => guard.get::<T>(k).is_ok(),
            Err(_) => false,
        }
    }
}

/// Settings
/// # Fields
/// * `name` - application name
/// * `short` - application short name, used as the first part of error codes
/// * `debug` - debug mode
/// * `web` - web server config
/// * `log` - log config
/// * `gate` - validation gate config
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Settings {
    pub name: String,
    pub short: String,
    pub debug: bool,
    pub web: Web,
    pub log: Option<Log>,
    pub gate: Gate,
}

/// Log config
/// # Fields
/// * `level` - tracing filter directives
/// * `console` - write to stdout
/// * `dirs` - daily rolling log directory, empty disables file logging
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Log {
    pub level: String,
    pub console: bool,
    pub dirs: String,
}

/// Web config
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Web {
    pub port: u16,
    pub bind: Option<String>,
    /// hmac secret for the flash cookie
    pub flash_secret: String,
}

/// Gate config
/// # Fields
/// * `site_key` - value flashed when validation fails
/// * `redirect_to` - where failed requests are sent
/// * `flash_key` - flash entry name
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Gate {
    pub site_key: Option<String>,
    pub redirect_to: String,
    pub flash_key: String,
}

impl Default for Log {
    fn default() -> Self {
        Log { level: "info".to_string(), console: true, dirs: String::new() }
    }
}

impl Default for Web {
    fn default() -> Self {
        Self { bind: None, port: 8080, flash_secret: "siteguard-flash".to_string() }
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self { site_key: None, redirect_to: "/auth".to_string(), flash_key: SITE_KEY_ENV.to_string() }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            name: "siteguard".to_string(),
            short: "SGRD".to_string(),
            debug: false,
            web: Default::default(),
            log: Default::default(),
            gate: Default::default(),
        }
    }
}

impl Web {
    pub fn bind_addr(&self) -> String {
        let bind = self.bind.clone().unwrap_or("0.0.0.0".to_string());
        format!("{}:{}", bind, self.port)
    }

    /// empty or one of the shipped defaults
    pub fn flash_secret_is_public(&self) -> bool {
        self.flash_secret.is_empty() || PUBLIC_FLASH_SECRETS.contains(&self.flash_secret.as_str())
    }
}
