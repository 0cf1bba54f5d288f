//! Deployment and client identifiers.
//!
//! The env id is a crude "same deployment" marker: a hash of the running
//! binary's path, version and platform. Two processes started from the same
//! build on the same host share it.

use std::sync::OnceLock;

use serde::Serialize;
use sha2::{Digest, Sha256};

/// The inputs hashed into the env id.
#[derive(Debug, Clone, Serialize)]
pub struct EnvIdElements {
    pub executable: String,
    pub version: String,
    pub platform: String,
    pub implementation: String,
}

impl EnvIdElements {
    fn detect() -> Self {
        let executable = std::env::current_exe()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        Self {
            executable,
            version: env!("CARGO_PKG_VERSION").to_string(),
            platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
            implementation: "rust".to_string(),
        }
    }

    fn signature(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.executable, self.version, self.platform, self.implementation
        )
    }
}

static ELEMENTS: OnceLock<EnvIdElements> = OnceLock::new();
static ENV_ID: OnceLock<String> = OnceLock::new();
static BUILD_VERSION: OnceLock<String> = OnceLock::new();

pub fn env_id_elements() -> &'static EnvIdElements {
    ELEMENTS.get_or_init(EnvIdElements::detect)
}

/// SHA-256 hex of the host signature. Computed once per process.
pub fn env_id() -> &'static str {
    ENV_ID.get_or_init(|| sha256_hex(env_id_elements().signature().as_bytes()))
}

/// Per-client identifier derived from the deployment, the client's public
/// address and its user agent.
pub fn private_id(env_id: &str, public_ip: &str, user_agent: &str) -> String {
    sha256_hex(format!("{env_id}|{public_ip}|{user_agent}").as_bytes())
}

/// 256 bits of fresh randomness as 64 hex chars.
pub fn generate_secure_key() -> String {
    let mut hasher = Sha256::new();
    hasher.update(uuid::Uuid::new_v4().as_bytes());
    hasher.update(uuid::Uuid::new_v4().as_bytes());
    hasher.update(uuid::Uuid::new_v4().as_bytes());
    hex::encode(hasher.finalize())
}

/// Short build fingerprint: hash of the executable's bytes and mtime.
/// Falls back to the env id prefix when the binary can't be read.
pub fn build_version() -> &'static str {
    BUILD_VERSION
        .get_or_init(|| compute_build_version().unwrap_or_else(|| env_id()[..10].to_string()))
}

fn compute_build_version() -> Option<String> {
    let exe = std::env::current_exe().ok()?;
    let bytes = std::fs::read(&exe).ok()?;
    let mtime = std::fs::metadata(&exe)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs_f64())
        .unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    hasher.update(mtime.to_string().as_bytes());
    let digest = hex::encode(hasher.finalize());
    Some(digest[..10].to_string())
}

pub(crate) fn sha256_hex(input: &[u8]) -> String {
    hex::encode(Sha256::digest(input))
}
