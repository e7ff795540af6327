//! Layered configuration for the cart synchronizer.
//!
//! Precedence, lowest first:
//! 1. Built-in defaults (match the deployed server's routes)
//! 2. `config.toml` in the cartsync home (`$CARTSYNC_HOME`, else `~/.cartsync`)
//! 3. `CARTSYNC_*` environment overrides
//!
//! ```toml
//! base-url = "https://food.example.com"
//!
//! [timings]
//! debounce-ms = 300
//!
//! [csrf]
//! meta-token = "abc123"
//! ```

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// Placeholder substituted with the product/item id in endpoint templates.
pub const ID_PLACEHOLDER: &str = "{id}";

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("I/O error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid value for ${var}: '{value}' (expected: {expected})")]
    InvalidEnvValue {
        var: String,
        value: String,
        expected: String,
    },

    #[error("Config validation error: {0}")]
    Validation(String),
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", default)]
pub struct CartConfig {
    /// Origin of the food-ordering server.
    pub base_url: String,
    pub endpoints: Endpoints,
    pub timings: Timings,
    pub links: Links,
    pub csrf: CsrfConfig,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            endpoints: Endpoints::default(),
            timings: Timings::default(),
            links: Links::default(),
            csrf: CsrfConfig::default(),
        }
    }
}

/// Endpoint path templates, relative to `base_url`.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", default)]
pub struct Endpoints {
    pub add_to_cart: String,
    pub update_item: String,
    pub remove_item: String,
    pub cart_count: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            add_to_cart: "/meals/add-to-cart/{id}/".to_string(),
            update_item: "/orders/update-cart-item/{id}/".to_string(),
            remove_item: "/orders/remove-cart-item/{id}/".to_string(),
            cart_count: "/orders/cart-count/".to_string(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", default)]
pub struct Timings {
    /// Quiet period before a quantity edit is sent.
    pub debounce_ms: u64,
    /// Lifetime of the add-to-cart confirmation popup.
    pub confirmation_ms: u64,
    /// Lifetime of an error banner.
    pub error_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            confirmation_ms: 3_000,
            error_ms: 5_000,
            request_timeout_ms: 10_000,
        }
    }
}

impl Timings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn confirmation(&self) -> Duration {
        Duration::from_millis(self.confirmation_ms)
    }

    pub fn error(&self) -> Duration {
        Duration::from_millis(self.error_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Page links the client navigates to or offers as actions.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", default)]
pub struct Links {
    pub sign_in: String,
    pub cart: String,
    pub checkout: String,
    pub browse: String,
}

impl Default for Links {
    fn default() -> Self {
        Self {
            sign_in: "/users/login/".to_string(),
            cart: "/orders/cart/".to_string(),
            checkout: "/orders/checkout/".to_string(),
            browse: "/meals/".to_string(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", default)]
pub struct CsrfConfig {
    pub cookie_name: String,
    /// Token rendered into the page's `csrf-token` meta tag; used when the
    /// cookie is absent.
    pub meta_token: Option<String>,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            cookie_name: "csrftoken".to_string(),
            meta_token: None,
        }
    }
}

impl CartConfig {
    pub fn base_url(&self) -> Result<Url, ConfigLoadError> {
        Url::parse(&self.base_url)
            .map_err(|e| ConfigLoadError::Validation(format!("base-url {:?}: {e}", self.base_url)))
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        self.base_url()?;
        for (name, template) in [
            ("add-to-cart", &self.endpoints.add_to_cart),
            ("update-item", &self.endpoints.update_item),
            ("remove-item", &self.endpoints.remove_item),
        ] {
            if !template.contains(ID_PLACEHOLDER) {
                return Err(ConfigLoadError::Validation(format!(
                    "endpoints.{name} must contain {ID_PLACEHOLDER}"
                )));
            }
        }
        if self.timings.debounce_ms == 0 {
            return Err(ConfigLoadError::Validation(
                "timings.debounce-ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String>>;

/// Builder that merges defaults, the config file and environment overrides.
pub struct ConfigLoader {
    home: Option<PathBuf>,
    env_prefix: String,
    env: EnvLookup,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            home: None,
            env_prefix: "CARTSYNC".to_string(),
            env: Box::new(|key| std::env::var(key).ok()),
        }
    }

    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Replace the process environment, mainly for tests.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String> + 'static) -> Self {
        self.env = Box::new(lookup);
        self
    }

    fn resolve_home(&self) -> Option<PathBuf> {
        if let Some(home) = &self.home {
            return Some(home.clone());
        }
        if let Some(home) = (self.env)(&format!("{}_HOME", self.env_prefix)) {
            return Some(PathBuf::from(home));
        }
        dirs::home_dir().map(|h| h.join(".cartsync"))
    }

    pub fn load(&self) -> Result<CartConfig, ConfigLoadError> {
        let mut config = match self.resolve_home() {
            Some(home) => load_file(&home.join(CONFIG_FILE))?,
            None => CartConfig::default(),
        };
        self.apply_env(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&self, config: &mut CartConfig) -> Result<(), ConfigLoadError> {
        let var = |suffix: &str| format!("{}_{suffix}", self.env_prefix);

        if let Some(url) = (self.env)(&var("BASE_URL")) {
            config.base_url = url;
        }
        if let Some(raw) = (self.env)(&var("DEBOUNCE_MS")) {
            config.timings.debounce_ms =
                raw.trim()
                    .parse()
                    .map_err(|_| ConfigLoadError::InvalidEnvValue {
                        var: var("DEBOUNCE_MS"),
                        value: raw.clone(),
                        expected: "milliseconds as an unsigned integer".to_string(),
                    })?;
        }
        if let Some(token) = (self.env)(&var("CSRF_TOKEN")) {
            config.csrf.meta_token = Some(token);
        }
        Ok(())
    }
}

/// Missing file means defaults.
fn load_file(path: &Path) -> Result<CartConfig, ConfigLoadError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("no config at {}, using defaults", path.display());
            Ok(CartConfig::default())
        }
        Err(source) => Err(ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
