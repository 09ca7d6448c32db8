pub static VERSION: &str = env!("CARGO_PKG_VERSION");
pub static NAME: &str = env!("CARGO_PKG_NAME");

pub const DEFAULT_TIMESTAMP_URLS: [&str; 3] = ["http://time.certum.pl", "http://timestamp.digicert.com", "http://timestamp.comodoca.com"];

pub const DEFAULT_SIGN_TOOL: &str = "osslsigncode";
pub const DEFAULT_PKCS11_PROVIDER: &str = "/usr/lib/x86_64-linux-gnu/ossl-modules/pkcs11.so";
pub const DEFAULT_PKCS11_MODULE: &str = "/usr/lib/librtpkcs11ecp.so";
pub const DIGEST_ALGORITHM: &str = "sha256";

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_UPLOAD_DIR: &str = ".tmp";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

pub const QUEUE_POSITION_HEADER: &str = "x-queue-position";
