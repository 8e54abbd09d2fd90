//! Configuration management infrastructure.
//!
//! The assembler never reads ambient or global settings. Hosts load an
//! `AssemblerConfiguration` (usually through `ConfigManager`) and pass it to
//! the assembler when constructing it.

use crate::domain::crypto::{CertificateSource, Passphrase};
use crate::infra::error::{AssemblyError, AssemblyResult};
use openssl::symm::Cipher;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Symmetric cipher used for the EnvelopedData content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ContentCipher {
    Aes128Cbc,
    Aes192Cbc,
    #[default]
    Aes256Cbc,
}

impl ContentCipher {
    #[must_use]
    pub fn cipher(&self) -> Cipher {
        match self {
            ContentCipher::Aes128Cbc => Cipher::aes_128_cbc(),
            ContentCipher::Aes192Cbc => Cipher::aes_192_cbc(),
            ContentCipher::Aes256Cbc => Cipher::aes_256_cbc(),
        }
    }
}

/// Settings consumed by the assembler and its certificate providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblerConfiguration {
    /// Signer identity: a mailbox for store lookups, a label for key files.
    pub signer_identity_reference: String,

    /// Where the signer certificate comes from
    pub certificate_source: CertificateSource,

    /// PKCS#12 file used by the `file` source
    pub certificate_file_path: Option<PathBuf>,

    /// Passphrase for `certificate_file_path`
    pub certificate_passphrase: Passphrase,

    /// Store directory for the `os-store` source (defaults to the user config dir)
    pub certificate_store_path: Option<PathBuf>,

    /// Inbox blind-copied when a request asks for it
    pub forms_inbox_address: String,

    /// Site notification address, first fallback for the From header
    pub notification_address: String,

    /// SMTP default sender, last fallback for the From header
    pub default_from_address: String,

    /// Cipher for the encrypted envelope
    pub content_cipher: ContentCipher,

    /// Send unsigned (still encrypted) when signing is requested but the
    /// identity cannot sign. Off by default: that case is an error.
    pub allow_unsigned_fallback: bool,
}

impl Default for AssemblerConfiguration {
    fn default() -> Self {
        Self {
            signer_identity_reference: String::new(),
            certificate_source: CertificateSource::OsStore,
            certificate_file_path: None,
            certificate_passphrase: Passphrase::default(),
            certificate_store_path: None,
            forms_inbox_address: String::new(),
            notification_address: String::new(),
            default_from_address: String::new(),
            content_cipher: ContentCipher::Aes256Cbc,
            allow_unsigned_fallback: false,
        }
    }
}

impl AssemblerConfiguration {
    /// Check the settings the selected certificate source depends on.
    pub fn validate(&self) -> AssemblyResult<()> {
        match self.certificate_source {
            CertificateSource::OsStore => {
                if self.signer_identity_reference.trim().is_empty() {
                    return Err(AssemblyError::ConfigurationError(
                        "signer_identity_reference must name the signer mailbox for the os-store source"
                            .to_string(),
                    ));
                }
            }
            CertificateSource::File => {
                if self.certificate_file_path.is_none() {
                    return Err(AssemblyError::ConfigurationError(
                        "certificate_file_path is required for the file source".to_string(),
                    ));
                }
                if self.certificate_passphrase.is_empty() {
                    return Err(AssemblyError::ConfigurationError(
                        "certificate_passphrase is required for the file source".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Configuration manager for handling config files
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new configuration manager with default path
    pub fn new() -> AssemblyResult<Self> {
        let config_path = Self::default_config_path()?;
        Ok(Self { config_path })
    }

    /// Create a configuration manager with custom path
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> AssemblyResult<PathBuf> {
        if let Some(config_dir) = dirs::config_dir() {
            Ok(config_dir.join("smime-assembler").join("config.toml"))
        } else {
            Ok(PathBuf::from("smime-assembler.toml"))
        }
    }

    /// Load and validate configuration from file
    pub fn load(&self) -> AssemblyResult<AssemblerConfiguration> {
        log::info!("Loading configuration from: {}", self.config_path.display());
        let content = fs::read_to_string(&self.config_path).map_err(|e| {
            AssemblyError::ConfigurationError(format!(
                "Failed to read config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;
        let config = Self::parse(&content, ExportFormat::Toml)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, config: &AssemblerConfiguration) -> AssemblyResult<()> {
        log::info!("Saving configuration to: {}", self.config_path.display());

        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    AssemblyError::ConfigurationError(format!(
                        "Failed to create config directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let content = toml::to_string_pretty(config).map_err(|e| {
            AssemblyError::ConfigurationError(format!("Failed to serialize config: {e}"))
        })?;

        fs::write(&self.config_path, content).map_err(|e| {
            AssemblyError::ConfigurationError(format!(
                "Failed to write config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;
        Ok(())
    }

    /// Get the configuration file path
    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Export configuration with the passphrase blanked out
    pub fn export_config(&self, format: ExportFormat) -> AssemblyResult<String> {
        let mut config = self.load()?;
        config.certificate_passphrase = Passphrase::default();
        match format {
            ExportFormat::Toml => toml::to_string_pretty(&config).map_err(|e| {
                AssemblyError::ConfigurationError(format!("TOML export failed: {e}"))
            }),
            ExportFormat::Json => serde_json::to_string_pretty(&config).map_err(|e| {
                AssemblyError::ConfigurationError(format!("JSON export failed: {e}"))
            }),
            ExportFormat::Yaml => serde_yaml::to_string(&config).map_err(|e| {
                AssemblyError::ConfigurationError(format!("YAML export failed: {e}"))
            }),
        }
    }

    /// Import configuration from a string, validate it and save it
    pub fn import_config(&self, content: &str, format: ExportFormat) -> AssemblyResult<()> {
        let config = Self::parse(content, format)?;
        config.validate()?;
        self.save(&config)
    }

    fn parse(content: &str, format: ExportFormat) -> AssemblyResult<AssemblerConfiguration> {
        match format {
            ExportFormat::Toml => toml::from_str(content).map_err(|e| {
                AssemblyError::ConfigurationError(format!("Failed to parse TOML config: {e}"))
            }),
            ExportFormat::Json => serde_json::from_str(content).map_err(|e| {
                AssemblyError::ConfigurationError(format!("Failed to parse JSON config: {e}"))
            }),
            ExportFormat::Yaml => serde_yaml::from_str(content).map_err(|e| {
                AssemblyError::ConfigurationError(format!("Failed to parse YAML config: {e}"))
            }),
        }
    }
}

/// Configuration export/import formats
#[derive(Debug, Clone, Copy)]
pub enum ExportFormat {
    Toml,
    Json,
    Yaml,
}
