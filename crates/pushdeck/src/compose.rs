//! Turning flags, files, and settings into credentials and notifications.
//!
//! Flags win over settings. Credential paths are taken all-or-nothing: if
//! any credential path flag is given, the paths in settings are ignored so
//! the two sources never combine into an ambiguous bundle.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::Args;
use pushdeck_core::{
    AlertPayloadBuilder, CertificateCredential, CredentialBundle, DeliveryPriority, Endpoint,
    InvalidCredentialError, Notification, SigningKeyCredential, sanitize_token,
};
use pushdeck_settings::{ComposeSettings, CredentialSettings, GatewaySettings};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

/// Credential flags.
#[derive(Args, Debug, Default, Clone)]
pub struct CredentialArgs {
    /// PEM client certificate.
    #[arg(long, requires = "private_key", conflicts_with = "signing_key")]
    pub certificate: Option<PathBuf>,

    /// PEM private key for the certificate.
    #[arg(long, requires = "certificate")]
    pub private_key: Option<PathBuf>,

    /// PKCS#12 archive with the certificate and its key.
    #[arg(long, conflicts_with_all = ["certificate", "private_key", "signing_key"])]
    pub p12: Option<PathBuf>,

    /// Environment variable holding the private key or archive passphrase.
    #[arg(long)]
    pub passphrase_env: Option<String>,

    /// `.p8` signing key.
    #[arg(long)]
    pub signing_key: Option<PathBuf>,

    /// Signing key id.
    #[arg(long)]
    pub key_id: Option<String>,

    /// Developer team id.
    #[arg(long)]
    pub team_id: Option<String>,
}

/// Endpoint flags.
#[derive(Args, Debug, Default, Clone)]
pub struct EndpointArgs {
    /// Use the production gateway instead of development.
    #[arg(long)]
    pub production: bool,

    /// Gateway host, overriding the environment.
    #[arg(long)]
    pub host: Option<String>,

    /// Gateway port (443, or 2197).
    #[arg(long)]
    pub port: Option<u16>,
}

/// Notification flags.
#[derive(Args, Debug, Default, Clone)]
pub struct ComposeArgs {
    /// Device token. Spaces and angle brackets are stripped.
    #[arg(long)]
    pub token: Option<String>,

    /// Topic (usually the app bundle id).
    #[arg(long)]
    pub topic: Option<String>,

    /// Raw JSON payload.
    #[arg(long, conflicts_with_all = ["payload_file", "alert_title", "alert_body"])]
    pub payload: Option<String>,

    /// File holding the JSON payload.
    #[arg(long, conflicts_with_all = ["alert_title", "alert_body"])]
    pub payload_file: Option<PathBuf>,

    /// Alert title for a generated payload.
    #[arg(long)]
    pub alert_title: Option<String>,

    /// Alert body for a generated payload.
    #[arg(long)]
    pub alert_body: Option<String>,

    /// Sound for a generated payload.
    #[arg(long)]
    pub sound: Option<String>,

    /// Badge for a generated payload.
    #[arg(long)]
    pub badge: Option<u32>,

    /// Collapse identifier.
    #[arg(long)]
    pub collapse_id: Option<String>,

    /// `immediate` or `conserve-power`.
    #[arg(long)]
    pub priority: Option<DeliveryPriority>,

    /// Expiration instant (RFC 3339).
    #[arg(long)]
    pub expiration: Option<DateTime<Utc>>,

    /// Push type (`alert`, `background`, ...).
    #[arg(long)]
    pub push_type: Option<String>,

    /// Notification id to use instead of a generated one.
    #[arg(long)]
    pub apns_id: Option<Uuid>,
}

/// Resolve the endpoint from flags over settings.
pub fn endpoint(args: &EndpointArgs, settings: &GatewaySettings) -> Endpoint {
    let mut gateway = settings.clone();
    if args.production {
        gateway.environment = pushdeck_settings::GatewayEnvironment::Production;
    }
    if let Some(ref host) = args.host {
        gateway.host = Some(host.clone());
    }
    if let Some(port) = args.port {
        gateway.port = port;
    }
    gateway.endpoint()
}

/// Load the credential bundle, or `None` when nothing is configured.
pub fn credentials(
    args: &CredentialArgs,
    settings: &CredentialSettings,
) -> Result<Option<CredentialBundle>> {
    let from_flags = args.certificate.is_some()
        || args.private_key.is_some()
        || args.p12.is_some()
        || args.signing_key.is_some();
    let (certificate, private_key, p12, signing_key) = if from_flags {
        (
            args.certificate.clone(),
            args.private_key.clone(),
            args.p12.clone(),
            args.signing_key.clone(),
        )
    } else {
        (
            settings.certificate_path.clone(),
            settings.private_key_path.clone(),
            settings.certificate_p12_path.clone(),
            settings.signing_key_path.clone(),
        )
    };
    let passphrase = || {
        args.passphrase_env
            .as_deref()
            .or(settings.private_key_passphrase_env.as_deref())
            .map(read_passphrase)
            .transpose()
    };

    let certificate = match (p12, certificate, private_key) {
        (None, None, None) => None,
        (Some(archive), None, None) => Some(
            CertificateCredential::load_pkcs12(&archive, passphrase()?)
                .context("failed to load PKCS#12 archive")?,
        ),
        (Some(_), _, _) => bail!("use a .p12 archive or a PEM certificate pair, not both"),
        (None, Some(cert), Some(key)) => Some(
            CertificateCredential::load(&cert, &key, passphrase()?)
                .context("failed to load client certificate")?,
        ),
        (None, Some(_), None) => bail!("a certificate needs its private key"),
        (None, None, Some(_)) => bail!("a private key needs its certificate"),
    };

    let signing_key = match signing_key {
        Some(path) => {
            let key_id = args.key_id.clone().or_else(|| settings.key_id.clone());
            let team_id = args.team_id.clone().or_else(|| settings.team_id.clone());
            Some(
                SigningKeyCredential::load(
                    &path,
                    key_id.unwrap_or_default(),
                    team_id.unwrap_or_default(),
                )
                .context("failed to load signing key")?,
            )
        }
        None => None,
    };

    match CredentialBundle::from_parts(certificate, signing_key) {
        Ok(bundle) => Ok(Some(bundle)),
        Err(InvalidCredentialError::NoneProvided) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn read_passphrase(var: &str) -> Result<String> {
    std::env::var(var).with_context(|| format!("passphrase variable {var} is not set"))
}

/// Compose the notification, or `None` while token or topic is missing.
pub fn notification(args: &ComposeArgs, settings: &ComposeSettings) -> Result<Option<Notification>> {
    let Some(ref raw_token) = args.token else {
        return Ok(None);
    };
    let Some(topic) = args.topic.clone().or_else(|| settings.topic.clone()) else {
        return Ok(None);
    };

    let payload = match (&args.payload, &args.payload_file) {
        (Some(payload), _) => payload.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read payload file {}", path.display()))?,
        (None, None) => alert_payload(args),
    };
    check_json(&payload)?;

    let mut notification = Notification::new(sanitize_token(raw_token), topic, payload)
        .with_priority(args.priority.unwrap_or(settings.priority));
    if let Some(ref collapse_id) = args.collapse_id {
        notification = notification.with_collapse_id(collapse_id);
    }
    if let Some(expiration) = args.expiration {
        notification = notification.with_expiration(expiration);
    }
    if let Some(push_type) = args.push_type.clone().or_else(|| settings.push_type.clone()) {
        notification = notification.with_push_type(push_type);
    }
    if let Some(apns_id) = args.apns_id {
        notification = notification.with_apns_id(apns_id);
    }
    Ok(Some(notification))
}

fn alert_payload(args: &ComposeArgs) -> String {
    let mut builder = AlertPayloadBuilder::new();
    if let Some(ref title) = args.alert_title {
        builder = builder.alert_title(title);
    }
    if let Some(ref body) = args.alert_body {
        builder = builder.alert_body(body);
    }
    if let Some(ref sound) = args.sound {
        builder = builder.sound(sound);
    }
    if let Some(badge) = args.badge {
        builder = builder.badge(badge);
    }
    builder.build()
}

fn check_json(payload: &str) -> Result<()> {
    let _: Value = serde_json::from_str(payload).context("payload is not valid JSON")?;
    Ok(())
}

/// One line of a batch file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchLine {
    token: String,
    topic: Option<String>,
    /// A JSON object, or a string holding serialized JSON.
    payload: Option<Value>,
    alert_title: Option<String>,
    alert_body: Option<String>,
    collapse_id: Option<String>,
    priority: Option<DeliveryPriority>,
    expiration: Option<DateTime<Utc>>,
    push_type: Option<String>,
    apns_id: Option<Uuid>,
}

impl BatchLine {
    fn into_args(self) -> Result<ComposeArgs> {
        let payload = match self.payload {
            None => None,
            Some(Value::String(s)) => Some(s),
            Some(v @ Value::Object(_)) => Some(v.to_string()),
            Some(other) => bail!("payload must be an object or a string, got {other}"),
        };
        Ok(ComposeArgs {
            token: Some(self.token),
            topic: self.topic,
            payload,
            alert_title: self.alert_title,
            alert_body: self.alert_body,
            collapse_id: self.collapse_id,
            priority: self.priority,
            expiration: self.expiration,
            push_type: self.push_type,
            apns_id: self.apns_id,
            ..ComposeArgs::default()
        })
    }
}

/// A notification read from a batch file.
#[derive(Debug)]
pub struct BatchEntry {
    /// 1-based line in the file.
    pub line: usize,
    /// The composed notification.
    pub notification: Notification,
}

/// Read a JSON-lines batch file. Blank lines are skipped.
pub fn batch(path: &Path, settings: &ComposeSettings) -> Result<Vec<BatchEntry>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read batch file {}", path.display()))?;
    parse_batch(&content, settings)
}

fn parse_batch(content: &str, settings: &ComposeSettings) -> Result<Vec<BatchEntry>> {
    let mut entries = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line_no = index + 1;
        if line.trim().is_empty() {
            continue;
        }
        let parsed: BatchLine =
            serde_json::from_str(line).with_context(|| format!("line {line_no}: invalid JSON"))?;
        let args = parsed
            .into_args()
            .with_context(|| format!("line {line_no}"))?;
        let notification = notification(&args, settings)
            .with_context(|| format!("line {line_no}"))?
            .with_context(|| format!("line {line_no}: no topic given and none configured"))?;
        entries.push(BatchEntry {
            line: line_no,
            notification,
        });
    }
    Ok(entries)
}
