use std::{
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use bytes::Bytes;
use tokio::fs;
use tracing::{info, warn};

use crate::{
    error::SignError,
    settings::SignerSettings,
    util::tempfiles::{remove_quietly, TempFileProvider},
};

mod backend;
pub use backend::*;

/// Turns one input file into a signed payload.
#[async_trait::async_trait]
pub trait Signer: Send + Sync {
    async fn sign(&self, file_path: &Path, original_name: &str) -> Result<Bytes, SignError>;
}

pub struct SigningService {
    settings: SignerSettings,
    backend: Arc<dyn SignBackend>,
    output_files: TempFileProvider,
    dry_run: AtomicBool,
}

impl SigningService {
    pub fn new(settings: SignerSettings, backend: Arc<dyn SignBackend>, dry_run: bool) -> Self {
        SigningService {
            settings,
            backend,
            output_files: TempFileProvider::system(),
            dry_run: AtomicBool::new(dry_run),
        }
    }

    /// Signing service backed by the external tool named in `settings`.
    pub fn with_command(settings: SignerSettings, dry_run: bool) -> Self {
        let backend = Arc::new(CommandBackend::new(settings.clone()));
        Self::new(settings, backend, dry_run)
    }

    pub fn with_output_files(mut self, output_files: TempFileProvider) -> Self {
        self.output_files = output_files;
        self
    }

    pub fn set_dry_run(&self, dry_run: bool) {
        self.dry_run.store(dry_run, Ordering::SeqCst);
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run.load(Ordering::SeqCst)
    }

    async fn simulate(&self, file_path: &Path, original_name: &str) -> Result<Bytes, SignError> {
        let output = self.output_files.get_named_path(original_name);
        fs::copy(file_path, &output).await.map_err(|source| SignError::Input { source })?;
        let bytes = fs::read(&output).await;
        remove_quietly(&output).await;
        bytes.map(Bytes::from).map_err(|source| SignError::Input { source })
    }

    async fn sign_with_fallback(&self, file_path: &Path, original_name: &str) -> Result<Bytes, SignError> {
        if self.settings.pkcs11_cert.is_none() {
            return Err(SignError::MissingConfig("PKCS11_CERT"));
        }
        if self.settings.pkcs11_key.is_none() {
            return Err(SignError::MissingConfig("PKCS11_KEY"));
        }

        let mut last_error = None;
        for endpoint in &self.settings.timestamp_urls {
            let output = self.output_files.get_named_path(original_name);
            let request = SignRequest {
                input: file_path,
                output: &output,
                endpoint,
            };
            match self.attempt(&request).await {
                Ok(bytes) => {
                    info!("Signed {} using timestamp server {}", original_name, endpoint);
                    return Ok(bytes);
                }
                Err(err) => {
                    warn!("Timestamp server failed {}: {}", endpoint, &err);
                    remove_quietly(&output).await;
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or(SignError::NoEndpoints))
    }

    async fn attempt(&self, request: &SignRequest<'_>) -> Result<Bytes, SignError> {
        self.backend.sign(request).await?;
        let bytes = fs::read(request.output).await.map_err(|source| SignError::Output {
            endpoint: request.endpoint.to_string(),
            source,
        })?;
        remove_quietly(request.output).await;
        Ok(Bytes::from(bytes))
    }
}

#[async_trait::async_trait]
impl Signer for SigningService {
    #[tracing::instrument(skip(self, file_path))]
    async fn sign(&self, file_path: &Path, original_name: &str) -> Result<Bytes, SignError> {
        if self.is_dry_run() {
            return self.simulate(file_path, original_name).await;
        }
        self.sign_with_fallback(file_path, original_name).await
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, path::PathBuf, sync::Mutex};

    use super::*;

    /// Fails the endpoints it was told to, signs with the rest.
    #[derive(Default)]
    struct ScriptedBackend {
        failures: HashMap<String, String>,
        skip_output: bool,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn failing(failures: &[(&str, &str)]) -> Self {
            ScriptedBackend {
                failures: failures.iter().map(|(endpoint, stderr)| (endpoint.to_string(), stderr.to_string())).collect(),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl SignBackend for ScriptedBackend {
        async fn sign(&self, request: &SignRequest<'_>) -> Result<(), SignError> {
            self.calls.lock().unwrap().push(request.endpoint.to_string());
            if let Some(stderr) = self.failures.get(request.endpoint) {
                return Err(SignError::Exit {
                    endpoint: request.endpoint.to_string(),
                    code: Some(1),
                    output: stderr.clone(),
                });
            }
            if !self.skip_output {
                let mut signed = b"signed:".to_vec();
                signed.extend(fs::read(request.input).await.unwrap());
                fs::write(request.output, signed).await.unwrap();
            }
            Ok(())
        }
    }

    const ENDPOINTS: [&str; 3] = ["http://ts-one.test", "http://ts-two.test", "http://ts-three.test"];

    fn signer_settings(endpoints: &[&str]) -> SignerSettings {
        SignerSettings {
            tool: "osslsigncode".to_string(),
            pkcs11_cert: Some("pkcs11:cert".to_string()),
            pkcs11_key: Some("pkcs11:key".to_string()),
            sign_name: Some("Example".to_string()),
            sign_url: Some("https://example.com".to_string()),
            timestamp_urls: endpoints.iter().map(|url| url.to_string()).collect(),
            ..Default::default()
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        input: PathBuf,
        outputs: PathBuf,
    }

    async fn fixture(content: &[u8]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.exe");
        fs::write(&input, content).await.unwrap();
        let outputs = dir.path().join("out");
        Fixture { dir, input, outputs }
    }

    async fn service(fixture: &Fixture, settings: SignerSettings, backend: Arc<ScriptedBackend>) -> SigningService {
        let output_files = TempFileProvider::build(&fixture.outputs).await.unwrap();
        SigningService::new(settings, backend, false).with_output_files(output_files)
    }

    fn is_empty_dir(path: &Path) -> bool {
        std::fs::read_dir(path).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn falls_back_until_an_endpoint_succeeds() {
        let fixture = fixture(b"MZ payload").await;
        let backend = Arc::new(ScriptedBackend::failing(&[(ENDPOINTS[0], "network unreachable"), (ENDPOINTS[1], "timeout")]));
        let service = service(&fixture, signer_settings(&ENDPOINTS), backend.clone()).await;

        let bytes = service.sign(&fixture.input, "app.exe").await.unwrap();

        assert_eq!(&bytes[..], b"signed:MZ payload");
        assert_eq!(backend.calls(), ENDPOINTS.to_vec());
        assert!(is_empty_dir(&fixture.outputs));
        assert!(fixture.input.exists(), "the adapter never deletes its input");
    }

    #[tokio::test]
    async fn stops_at_the_first_success() {
        let fixture = fixture(b"MZ").await;
        let backend = Arc::new(ScriptedBackend::default());
        let service = service(&fixture, signer_settings(&ENDPOINTS), backend.clone()).await;

        service.sign(&fixture.input, "app.exe").await.unwrap();

        assert_eq!(backend.calls(), vec![ENDPOINTS[0]]);
    }

    #[tokio::test]
    async fn exhausted_endpoints_report_the_last_failure() {
        let fixture = fixture(b"MZ").await;
        let backend = Arc::new(ScriptedBackend::failing(&[(ENDPOINTS[0], "network unreachable"), (ENDPOINTS[1], "timeout"), (ENDPOINTS[2], "bad response from tsa")]));
        let service = service(&fixture, signer_settings(&ENDPOINTS), backend.clone()).await;

        let err = service.sign(&fixture.input, "app.exe").await.unwrap_err();

        assert_eq!(err.endpoint(), Some(ENDPOINTS[2]));
        assert_eq!(err.to_string(), "exit 1: bad response from tsa");
        assert_eq!(backend.calls().len(), 3);
    }

    #[tokio::test]
    async fn no_endpoints_fails_without_calling_the_backend() {
        let fixture = fixture(b"MZ").await;
        let backend = Arc::new(ScriptedBackend::default());
        let service = service(&fixture, signer_settings(&[]), backend.clone()).await;

        let err = service.sign(&fixture.input, "app.exe").await.unwrap_err();

        assert!(matches!(err, SignError::NoEndpoints));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_output_counts_as_an_endpoint_failure() {
        let fixture = fixture(b"MZ").await;
        let backend = Arc::new(ScriptedBackend {
            skip_output: true,
            ..Default::default()
        });
        let service = service(&fixture, signer_settings(&ENDPOINTS[..2]), backend.clone()).await;

        let err = service.sign(&fixture.input, "app.exe").await.unwrap_err();

        assert!(matches!(err, SignError::Output { .. }));
        assert_eq!(err.endpoint(), Some(ENDPOINTS[1]));
        assert_eq!(backend.calls().len(), 2);
    }

    #[tokio::test]
    async fn missing_identity_fails_before_any_attempt() {
        let fixture = fixture(b"MZ").await;
        let backend = Arc::new(ScriptedBackend::default());
        let mut settings = signer_settings(&ENDPOINTS);
        settings.pkcs11_key = None;
        let service = service(&fixture, settings, backend.clone()).await;

        let err = service.sign(&fixture.input, "app.exe").await.unwrap_err();

        assert!(matches!(err, SignError::MissingConfig("PKCS11_KEY")));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn dry_run_returns_the_input_unchanged_and_can_be_toggled() {
        let content: Vec<u8> = (0..=255u8).cycle().take(64 * 1024).collect();
        let fixture = fixture(&content).await;
        let backend = Arc::new(ScriptedBackend::default());
        let service = service(&fixture, signer_settings(&ENDPOINTS), backend.clone()).await;

        service.set_dry_run(true);
        let bytes = service.sign(&fixture.input, "../app.exe").await.unwrap();
        assert_eq!(&bytes[..], &content[..]);
        assert!(backend.calls().is_empty());
        assert!(is_empty_dir(&fixture.outputs));

        service.set_dry_run(false);
        let bytes = service.sign(&fixture.input, "app.exe").await.unwrap();
        assert!(bytes.starts_with(b"signed:"));
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn dry_run_with_missing_input_is_an_input_error() {
        let fixture = fixture(b"MZ").await;
        let service = service(&fixture, signer_settings(&ENDPOINTS), Arc::new(ScriptedBackend::default())).await;
        service.set_dry_run(true);

        let err = service.sign(&fixture.dir.path().join("gone.exe"), "gone.exe").await.unwrap_err();

        assert!(matches!(err, SignError::Input { .. }));
    }
}
