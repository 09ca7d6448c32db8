use std::{ffi::OsString, path::Path, process::Stdio};

use tokio::process::Command;
use tracing::debug;

use crate::{consts::DIGEST_ALGORITHM, error::SignError, settings::SignerSettings};

/// One invocation of the signing tool against a single timestamp endpoint.
#[derive(Debug, Clone, Copy)]
pub struct SignRequest<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub endpoint: &'a str,
}

#[async_trait::async_trait]
pub trait SignBackend: Send + Sync {
    /// Succeeds only when the tool reported success. The signed file is then
    /// expected at `request.output`.
    async fn sign(&self, request: &SignRequest<'_>) -> Result<(), SignError>;
}

/// Runs the external signing tool, one process per attempt.
pub struct CommandBackend {
    settings: SignerSettings,
}

impl CommandBackend {
    pub fn new(settings: SignerSettings) -> Self {
        CommandBackend { settings }
    }

    pub fn arguments(&self, request: &SignRequest<'_>) -> Vec<OsString> {
        let settings = &self.settings;
        let mut args: Vec<OsString> = [
            "sign",
            "-provider",
            settings.provider.as_str(),
            "-pkcs11module",
            settings.pkcs11_module.as_str(),
            "-pkcs11cert",
            settings.pkcs11_cert.as_deref().unwrap_or_default(),
            "-key",
            settings.pkcs11_key.as_deref().unwrap_or_default(),
            "-h",
            DIGEST_ALGORITHM,
            "-n",
            settings.sign_name.as_deref().unwrap_or_default(),
            "-i",
            settings.sign_url.as_deref().unwrap_or_default(),
        ]
        .iter()
        .map(OsString::from)
        .collect();
        args.push("-in".into());
        args.push(request.input.into());
        args.push("-out".into());
        args.push(request.output.into());
        args.push("-ts".into());
        args.push(request.endpoint.into());
        args
    }
}

#[async_trait::async_trait]
impl SignBackend for CommandBackend {
    async fn sign(&self, request: &SignRequest<'_>) -> Result<(), SignError> {
        let endpoint = request.endpoint;
        let child = Command::new(&self.settings.tool)
            .args(self.arguments(request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SignError::Launch { endpoint: endpoint.to_string(), source })?;

        // Dropping the child on timeout kills it.
        let output = match self.settings.attempt_timeout {
            Some(timeout) => tokio::time::timeout(timeout, child.wait_with_output())
                .await
                .map_err(|_| SignError::Timeout { endpoint: endpoint.to_string(), timeout })?,
            None => child.wait_with_output().await,
        }
        .map_err(|source| SignError::Launch { endpoint: endpoint.to_string(), source })?;

        debug!("{} exited with {} for {}", &self.settings.tool, output.status, endpoint);
        if output.status.success() {
            return Ok(());
        }
        Err(SignError::Exit {
            endpoint: endpoint.to_string(),
            code: output.status.code(),
            output: captured_output(&output.stdout, &output.stderr),
        })
    }
}

/// stderr if the tool wrote any, stdout otherwise.
fn captured_output(stdout: &[u8], stderr: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    if !stderr.trim().is_empty() {
        return stderr.trim().to_string();
    }
    String::from_utf8_lossy(stdout).trim().to_string()
}
