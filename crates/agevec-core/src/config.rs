use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AgevecError, AgevecResult};

/// Top-level generator configuration (loaded from agevec.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgevecConfig {
    pub generator: GeneratorConfig,
    pub fixtures: FixturesConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Directory that receives one file per vector (default: testdata)
    pub out_dir: PathBuf,
    /// Containers larger than this many bytes are zlib-compressed
    pub compress_threshold: usize,
    /// zlib level 0-9 (default: 9, best compression)
    pub compression_level: u32,
    /// Write index.json next to the vectors
    pub manifest: bool,
    /// Worker thread count (0 = cpu_count)
    pub workers: usize,
}

/// Fixed key material injected into every builder session.
///
/// These are deliberately public test values; vectors must be reproducible
/// byte for byte, so they are never drawn from a real RNG.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FixturesConfig {
    /// Default file key, as a UTF-8 string (16 bytes for conformant vectors)
    pub file_key: String,
    /// Bech32 X25519 identity used by the stock recipient stanzas
    pub identity: String,
    /// 32-byte seed of the deterministic byte source
    pub seed: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("testdata"),
            compress_threshold: 1024,
            compression_level: 9,
            manifest: true,
            workers: 0,
        }
    }
}

impl Default for FixturesConfig {
    fn default() -> Self {
        Self {
            file_key: "YELLOW SUBMARINE".into(),
            identity: "AGE-SECRET-KEY-1EGTZVFFV20835NWYV6270LXYVK2VKNX2MMDKWYKLMGR48UAWX40Q2P2LM0"
                .into(),
            seed: "TEST RANDOMNESS TEST RANDOMNESS!".into(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl AgevecConfig {
    /// Load from `path`, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> AgevecResult<Self> {
        if !path.exists() {
            tracing::warn!("config file not found: {}  (using defaults)", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| AgevecError::Config(format!("parsing {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the generator cannot honour.
    pub fn validate(&self) -> AgevecResult<()> {
        if self.generator.compression_level > 9 {
            return Err(AgevecError::Config(format!(
                "compression_level must be 0-9, got {}",
                self.generator.compression_level
            )));
        }
        if self.fixtures.seed.len() != 32 {
            return Err(AgevecError::Config(format!(
                "fixtures.seed must be exactly 32 bytes, got {}",
                self.fixtures.seed.len()
            )));
        }
        if !matches!(self.log.format.as_str(), "json" | "text") {
            return Err(AgevecError::Config(format!(
                "log.format must be \"json\" or \"text\", got {:?}",
                self.log.format
            )));
        }
        Ok(())
    }
}
