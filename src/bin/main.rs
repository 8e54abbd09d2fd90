//! S/MIME assembler CLI
//!
//! Assembles signed and encrypted messages from request files, opens
//! assembled messages for inspection, and manages the configuration file.

use clap::{Parser, Subcommand, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use serde::Deserialize;
use smime_assembler::{
    config::{AssemblerConfiguration, ConfigManager, ExportFormat},
    provider_for_config, AttachmentPart, CertificateSource, EmailRequest, Fingerprint, IdentityRef,
    Passphrase,
    SecureEmailAssembler, SecureEnvelope,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "smime-assembler")]
#[command(about = "Assemble signed and encrypted S/MIME messages")]
#[command(long_about = "
S/MIME assembler - builds signed and encrypted e-mail from form requests

EXAMPLES:
    # Assemble a message and write it to a file
    smime-assembler assemble --request request.toml --output message.eml

    # Decrypt and verify an assembled message
    smime-assembler inspect message.eml

    # Require a specific signer certificate
    smime-assembler inspect message.eml --expect-signer 3F:2A:...:9C

    # Sign with a PKCS#12 key file instead of the certificate store
    smime-assembler assemble --request request.toml --source file

    # Create the default configuration file
    smime-assembler config init

ENVIRONMENT VARIABLES:
    SMIME_CERT_PASSWORD   Passphrase for the PKCS#12 key file (overrides config)
    RUST_LOG              Logging level (debug, info, warn, error)
")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the user configuration directory)
    #[arg(short, long, global = true, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble a signed and encrypted message from a request file
    Assemble {
        /// Request description (TOML)
        #[arg(short, long, value_name = "REQUEST_FILE")]
        request: PathBuf,

        /// Output file for the RFC 5322 message (defaults to stdout)
        #[arg(short, long, value_name = "OUTPUT_FILE")]
        output: Option<PathBuf>,

        /// Signer identity (overrides signer_identity_reference)
        #[arg(long, value_name = "IDENTITY")]
        identity: Option<String>,

        /// Certificate source: os-store or file (overrides certificate_source)
        #[arg(long, value_name = "SOURCE")]
        source: Option<CertificateSource>,
    },

    /// Decrypt an assembled message and verify its signature
    Inspect {
        /// Message (.eml) or raw EnvelopedData (DER)
        #[arg(value_name = "MESSAGE_FILE")]
        file: PathBuf,

        /// Write the decrypted entity to this file
        #[arg(short, long, value_name = "OUTPUT_FILE")]
        output: Option<PathBuf>,

        /// Fail unless the message was signed by this certificate thumbprint
        #[arg(long, value_name = "THUMBPRINT")]
        expect_signer: Option<String>,
    },

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Create default configuration file
    Init,

    /// Export configuration (passphrase omitted)
    Export {
        /// Export format
        #[arg(short, long, value_enum, default_value = "toml")]
        format: ExportFormatArg,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import configuration
    Import {
        /// Configuration file to import
        file: PathBuf,
        /// Import format
        #[arg(short, long, value_enum, default_value = "toml")]
        format: ExportFormatArg,
    },

    /// Print the configuration file path
    Path,
}

#[derive(ValueEnum, Clone)]
enum ExportFormatArg {
    Toml,
    Json,
    Yaml,
}

impl From<ExportFormatArg> for ExportFormat {
    fn from(arg: ExportFormatArg) -> Self {
        match arg {
            ExportFormatArg::Toml => ExportFormat::Toml,
            ExportFormatArg::Json => ExportFormat::Json,
            ExportFormatArg::Yaml => ExportFormat::Yaml,
        }
    }
}

/// Request file layout. Attachment paths are relative to the request file.
#[derive(Deserialize, Default)]
#[serde(default)]
struct RequestFile {
    recipient: String,
    cc: String,
    bcc: String,
    reply_to: String,
    from: String,
    sender: String,
    subject: String,
    body: String,
    body_file: Option<PathBuf>,
    attachments: Vec<PathBuf>,
    bcc_forms_inbox: Option<bool>,
    sign: Option<bool>,
}

impl RequestFile {
    fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .into_diagnostic()
            .with_context(|| format!("Failed to read request file {}", path.display()))?;
        toml::from_str(&content)
            .into_diagnostic()
            .with_context(|| format!("Failed to parse request file {}", path.display()))
    }

    fn into_request(self, base_dir: &Path) -> Result<EmailRequest> {
        let body = match &self.body_file {
            Some(file) => std::fs::read_to_string(base_dir.join(file))
                .into_diagnostic()
                .with_context(|| format!("Failed to read body file {}", file.display()))?,
            None => self.body,
        };
        let attachments = self
            .attachments
            .iter()
            .map(|path| AttachmentPart::from_path(base_dir.join(path)).into_diagnostic())
            .collect::<Result<Vec<_>>>()?;

        let defaults = EmailRequest::default();
        Ok(EmailRequest {
            recipient_email: self.recipient,
            cc_email: self.cc,
            bcc_email: self.bcc,
            reply_to_email: self.reply_to,
            from_email: self.from,
            sender_email: self.sender,
            subject: self.subject,
            body,
            attachments,
            bcc_forms_inbox: self.bcc_forms_inbox.unwrap_or(defaults.bcc_forms_inbox),
            sign_email: self.sign.unwrap_or(defaults.sign_email),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config_manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new().into_diagnostic()?,
    };

    match cli.command {
        Commands::Assemble {
            request,
            output,
            identity,
            source,
        } => {
            handle_assemble_command(&config_manager, &request, output, identity, source).await?;
        }

        Commands::Inspect {
            file,
            output,
            expect_signer,
        } => {
            handle_inspect_command(&config_manager, &file, output, expect_signer.as_deref())?;
        }

        Commands::Config(config_cmd) => {
            handle_config_command(&config_manager, config_cmd)?;
        }
    }

    Ok(())
}

/// Load the configuration and apply the passphrase environment override.
fn load_configuration(config_manager: &ConfigManager) -> Result<AssemblerConfiguration> {
    let mut config = config_manager
        .load()
        .into_diagnostic()
        .wrap_err("Run 'smime-assembler config init' and edit the file first")?;
    if let Ok(passphrase) = std::env::var("SMIME_CERT_PASSWORD") {
        log::debug!("Using certificate passphrase from SMIME_CERT_PASSWORD");
        config.certificate_passphrase = Passphrase::new(passphrase);
    }
    Ok(config)
}

async fn handle_assemble_command(
    config_manager: &ConfigManager,
    request_path: &Path,
    output: Option<PathBuf>,
    identity: Option<String>,
    source: Option<CertificateSource>,
) -> Result<()> {
    let mut config = load_configuration(config_manager)?;
    if let Some(identity) = identity {
        config.signer_identity_reference = identity;
    }
    if let Some(source) = source {
        config.certificate_source = source;
    }
    config.validate().into_diagnostic()?;

    let base_dir = request_path.parent().unwrap_or_else(|| Path::new("."));
    let request = RequestFile::load(request_path)?.into_request(base_dir)?;

    let assembler = Arc::new(SecureEmailAssembler::from_config(config).into_diagnostic()?);
    let message = assembler
        .assemble_offloaded(request)
        .await
        .into_diagnostic()?;

    let formatted = message.formatted();
    if let Some(output_path) = output {
        std::fs::write(&output_path, &formatted).into_diagnostic()?;
        println!(
            "✅ {} message written to: {}",
            if message.is_signed() { "Signed and encrypted" } else { "Encrypted" },
            output_path.display()
        );
        println!("   Recipients: {}", message.headers().recipients().count());
    } else {
        println!("{}", String::from_utf8_lossy(&formatted));
    }
    Ok(())
}

fn handle_inspect_command(
    config_manager: &ConfigManager,
    file: &Path,
    output: Option<PathBuf>,
    expect_signer: Option<&str>,
) -> Result<()> {
    let expected = expect_signer
        .map(|text| {
            Fingerprint::parse(text)
                .ok_or_else(|| miette::miette!("Not a SHA-1 certificate thumbprint: {text}"))
        })
        .transpose()?;
    let config = load_configuration(config_manager)?;
    let input = std::fs::read(file)
        .into_diagnostic()
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let provider = provider_for_config(&config).into_diagnostic()?;
    let identity = provider
        .resolve_signer(&IdentityRef::new(config.signer_identity_reference.as_str()))
        .into_diagnostic()?;
    let opened = SecureEnvelope::new(config.content_cipher)
        .open(&input, &identity)
        .into_diagnostic()?;

    println!("🔓 Decrypted {} bytes", opened.content.len());
    match &opened.signer {
        Some(signer) => println!("✅ Signature valid, signer certificate {signer}"),
        None => println!("⚠️  Content is not signed"),
    }
    if let Some(expected) = expected {
        if opened.signer.as_ref() != Some(&expected) {
            miette::bail!("Message was not signed by certificate {expected}");
        }
    }

    if let Some(output_path) = output {
        std::fs::write(&output_path, &opened.content).into_diagnostic()?;
        println!("   Content written to: {}", output_path.display());
    }
    Ok(())
}

fn handle_config_command(config_manager: &ConfigManager, config_cmd: ConfigCommands) -> Result<()> {
    match config_cmd {
        ConfigCommands::Show => match config_manager.load() {
            Ok(config) => {
                println!("📋 Current Configuration:");
                println!("  Signer identity: {}", config.signer_identity_reference);
                println!("  Certificate source: {}", config.certificate_source);
                if let Some(path) = &config.certificate_file_path {
                    println!("  Certificate file: {}", path.display());
                }
                if let Some(path) = &config.certificate_store_path {
                    println!("  Certificate store: {}", path.display());
                }
                println!("  Forms inbox: {}", config.forms_inbox_address);
                println!("  Notification address: {}", config.notification_address);
                println!("  Default from address: {}", config.default_from_address);
                println!("  Content cipher: {:?}", config.content_cipher);
                println!("  Unsigned fallback: {}", config.allow_unsigned_fallback);
                println!(
                    "  Configuration file: {}",
                    config_manager.config_path().display()
                );
            }
            Err(e) => {
                println!("📋 No usable configuration file ({e}). Use 'config init' to create one.");
            }
        },

        ConfigCommands::Init => {
            if config_manager.config_path().exists() {
                println!(
                    "📋 Configuration already exists: {}",
                    config_manager.config_path().display()
                );
            } else {
                config_manager
                    .save(&AssemblerConfiguration::default())
                    .into_diagnostic()?;
                println!(
                    "✅ Configuration initialized: {}",
                    config_manager.config_path().display()
                );
                println!("   Edit the file to set the signer identity and certificate source.");
            }
        }

        ConfigCommands::Export { format, output } => {
            let content = config_manager
                .export_config(format.into())
                .into_diagnostic()?;

            if let Some(output_path) = output {
                std::fs::write(&output_path, content).into_diagnostic()?;
                println!("✅ Configuration exported to: {}", output_path.display());
            } else {
                println!("{content}");
            }
        }

        ConfigCommands::Import { file, format } => {
            let content = std::fs::read_to_string(&file).into_diagnostic()?;
            config_manager
                .import_config(&content, format.into())
                .into_diagnostic()?;
            println!("✅ Configuration imported from: {}", file.display());
        }

        ConfigCommands::Path => {
            println!("{}", config_manager.config_path().display());
        }
    }

    Ok(())
}
