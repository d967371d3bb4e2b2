use std::{
    env, fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use rust_decimal::Decimal;

use crate::{errors::Error, Result};

/// Typed configuration for the bot process.
#[derive(Clone, Debug)]
pub struct Config {
    // WhatsApp Cloud API
    pub whatsapp_phone_number_id: String,
    pub whatsapp_access_token: String,
    pub whatsapp_webhook_token: String,
    pub whatsapp_api_url: String,

    // Order routing
    pub intermediary_phone: String,
    pub store_owner_phone: Option<String>,
    pub commission_percentage: Decimal,

    // Storefront copy
    pub store_name: String,
    pub catalog_url: String,

    // Storage
    pub data_dir: PathBuf,

    // Background work
    pub catalog_limit: usize,
    pub catalog_refresh_interval: Duration,
    pub sweep_interval: Duration,
    pub inactivity_timeout: Duration,

    // HTTP
    pub bind_addr: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let whatsapp_phone_number_id = env_str("WHATSAPP_PHONE_NUMBER_ID").unwrap_or_default();
        let whatsapp_access_token = env_str("WHATSAPP_ACCESS_TOKEN").unwrap_or_default();
        let whatsapp_webhook_token = env_str("WHATSAPP_WEBHOOK_TOKEN").unwrap_or_default();
        let whatsapp_api_url = env_str("WHATSAPP_API_URL")
            .and_then(non_empty)
            .unwrap_or_else(|| "https://graph.facebook.com/v17.0".to_string());

        let intermediary_phone = env_str("INTERMEDIARY_PHONE_NUMBER")
            .and_then(non_empty)
            .ok_or_else(|| {
                Error::Config(
                    "INTERMEDIARY_PHONE_NUMBER environment variable is required".to_string(),
                )
            })?;
        let store_owner_phone = env_str("STORE_OWNER_PHONE").and_then(non_empty);

        let commission_percentage =
            parse_percentage(env_str("INTERMEDIARY_COMMISSION_PERCENTAGE"))?;

        let store_name = env_str("STORE_NAME")
            .and_then(non_empty)
            .unwrap_or_else(|| "Melo Sportt".to_string());
        let catalog_url = env_str("CATALOG_URL")
            .and_then(non_empty)
            .unwrap_or_else(|| "https://melo-sportt.vercel.app/products".to_string());

        let data_dir = env_path("DATA_DIR").unwrap_or_else(|| PathBuf::from("./data"));
        fs::create_dir_all(&data_dir)?;

        let catalog_limit = env_usize("CATALOG_LIMIT").unwrap_or(100);
        let catalog_refresh_interval =
            Duration::from_secs(env_u64("CATALOG_REFRESH_SECS").unwrap_or(300).max(1));
        let sweep_interval = Duration::from_secs(env_u64("SWEEP_INTERVAL_SECS").unwrap_or(600).max(1));
        let inactivity_timeout =
            Duration::from_secs(env_u64("INACTIVITY_TIMEOUT_SECS").unwrap_or(1800));

        let bind_addr = env_str("BIND_ADDR")
            .and_then(non_empty)
            .unwrap_or_else(|| "0.0.0.0:3001".to_string());

        Ok(Self {
            whatsapp_phone_number_id,
            whatsapp_access_token,
            whatsapp_webhook_token,
            whatsapp_api_url,
            intermediary_phone,
            store_owner_phone,
            commission_percentage,
            store_name,
            catalog_url,
            data_dir,
            catalog_limit,
            catalog_refresh_interval,
            sweep_interval,
            inactivity_timeout,
            bind_addr,
        })
    }

    pub fn whatsapp_configured(&self) -> bool {
        !self.whatsapp_phone_number_id.trim().is_empty()
            && !self.whatsapp_access_token.trim().is_empty()
    }
}

fn parse_percentage(raw: Option<String>) -> Result<Decimal> {
    let Some(raw) = raw.and_then(non_empty) else {
        return Ok(Decimal::from(10));
    };
    let pct = Decimal::from_str(raw.trim()).map_err(|e| {
        Error::Config(format!(
            "INTERMEDIARY_COMMISSION_PERCENTAGE is not a number: {raw} ({e})"
        ))
    })?;
    if pct < Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
        return Err(Error::Config(format!(
            "INTERMEDIARY_COMMISSION_PERCENTAGE must be between 0 and 100, got {pct}"
        )));
    }
    Ok(pct)
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, strip_quotes(v.trim()));
    }
}

fn strip_quotes(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return &val[1..val.len() - 1];
    }
    val
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .map(PathBuf::from)
        .filter(|p| !p.as_os_str().is_empty())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.trim().to_string())
    }
}
