use std::{env, path::PathBuf, time::Duration};

use crate::consts::{DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_PKCS11_MODULE, DEFAULT_PKCS11_PROVIDER, DEFAULT_PORT, DEFAULT_SIGN_TOOL, DEFAULT_TIMESTAMP_URLS, DEFAULT_UPLOAD_DIR};

/// Identity and tooling handed to the signing backend.
#[derive(Debug, Clone, Default)]
pub struct SignerSettings {
    pub tool: String,
    pub provider: String,
    pub pkcs11_module: String,
    pub pkcs11_cert: Option<String>,
    pub pkcs11_key: Option<String>,
    pub sign_name: Option<String>,
    pub sign_url: Option<String>,
    pub timestamp_urls: Vec<String>,
    pub attempt_timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub auth_token: Option<String>,
    pub dry_run: bool,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub signer: SignerSettings,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());
        Settings {
            auth_token: get("AUTH_TOKEN"),
            dry_run: get("DRY_RUN").is_some(),
            port: get_port(get("PORT")),
            upload_dir: get("UPLOAD_DIR").unwrap_or_else(|| DEFAULT_UPLOAD_DIR.to_string()).into(),
            max_upload_bytes: get_max_upload_bytes(get("MAX_UPLOAD_BYTES")),
            signer: SignerSettings {
                tool: get("SIGN_TOOL").unwrap_or_else(|| DEFAULT_SIGN_TOOL.to_string()),
                provider: get("PKCS11_PROVIDER").unwrap_or_else(|| DEFAULT_PKCS11_PROVIDER.to_string()),
                pkcs11_module: get("PKCS11_MODULE").unwrap_or_else(|| DEFAULT_PKCS11_MODULE.to_string()),
                pkcs11_cert: get("PKCS11_CERT"),
                pkcs11_key: get("PKCS11_KEY"),
                sign_name: get("SIGN_NAME"),
                sign_url: get("SIGN_URL"),
                timestamp_urls: get_timestamp_urls(get("TIMESTAMP_URLS")),
                attempt_timeout: get_attempt_timeout(get("SIGN_ATTEMPT_TIMEOUT_SECONDS")),
            },
        }
    }

    /// Variables real signing needs but that are not set.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let required = [
            ("AUTH_TOKEN", &self.auth_token),
            ("PKCS11_CERT", &self.signer.pkcs11_cert),
            ("PKCS11_KEY", &self.signer.pkcs11_key),
            ("SIGN_URL", &self.signer.sign_url),
        ];
        required.iter().filter(|(_, value)| value.is_none()).map(|(key, _)| *key).collect()
    }
}

fn get_port(port: Option<String>) -> u16 {
    match port.map(|port| port.parse::<u16>()) {
        Some(Ok(port)) => port,
        _ => DEFAULT_PORT,
    }
}

fn get_max_upload_bytes(max: Option<String>) -> usize {
    match max.map(|max| max.parse::<usize>()) {
        Some(Ok(max)) if max > 0 => max,
        _ => DEFAULT_MAX_UPLOAD_BYTES,
    }
}

fn get_timestamp_urls(urls: Option<String>) -> Vec<String> {
    match urls {
        Some(urls) => urls.split(',').map(str::trim).filter(|url| !url.is_empty()).map(str::to_string).collect(),
        None => DEFAULT_TIMESTAMP_URLS.iter().map(|url| url.to_string()).collect(),
    }
}

fn get_attempt_timeout(seconds: Option<String>) -> Option<Duration> {
    match seconds.map(|seconds| seconds.parse::<u64>()) {
        Some(Ok(seconds)) if seconds > 0 => Some(Duration::from_secs(seconds)),
        _ => None,
    }
}
