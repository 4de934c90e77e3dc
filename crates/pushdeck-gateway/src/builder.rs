//! Client construction.
//!
//! Every failure here is local and synchronous: bad key material, a missing
//! server, or a TLS context that cannot be built. Nothing touches the
//! network until the first send.

use std::time::Duration;

use p12_keystore::KeyStore;
use pkcs8::EncryptedPrivateKeyInfo;
use pkcs8::der::pem::LineEnding;
use pkcs8::der::{Decode, Document, SecretDocument};
use tracing::{debug, info};

use crate::client::ApnsClient;
use crate::errors::BuildError;
use crate::token::TokenSigner;

/// Request timeout applied when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const ENCRYPTED_KEY_LABEL: &str = "ENCRYPTED PRIVATE KEY";

/// A `.p8` signing key plus the identifiers that go into each token.
#[derive(Clone)]
pub struct SigningKey {
    /// PEM-encoded PKCS#8 EC key.
    pub key_pem: Vec<u8>,
    /// Key identifier (`kid` header).
    pub key_id: String,
    /// Team identifier (`iss` claim).
    pub team_id: String,
}

impl SigningKey {
    /// Bundle a key with its identifiers.
    pub fn new(
        key_pem: impl Into<Vec<u8>>,
        key_id: impl Into<String>,
        team_id: impl Into<String>,
    ) -> Self {
        Self {
            key_pem: key_pem.into(),
            key_id: key_id.into(),
            team_id: team_id.into(),
        }
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("key_id", &self.key_id)
            .field("team_id", &self.team_id)
            .finish_non_exhaustive()
    }
}

enum Auth {
    Certificate {
        certificate: Vec<u8>,
        private_key: Vec<u8>,
        passphrase: Option<String>,
    },
    Pkcs12 {
        archive: Vec<u8>,
        password: String,
    },
    Token(SigningKey),
}

/// Builder for [`ApnsClient`].
///
/// Exactly one authentication method is used; the last one configured wins.
pub struct GatewayClientBuilder {
    server: Option<(String, u16)>,
    auth: Option<Auth>,
    request_timeout: Duration,
    plaintext: bool,
}

impl Default for GatewayClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayClientBuilder {
    /// Start an empty builder.
    pub fn new() -> Self {
        Self {
            server: None,
            auth: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            plaintext: false,
        }
    }

    /// Gateway host and port.
    #[must_use]
    pub fn server(mut self, host: impl Into<String>, port: u16) -> Self {
        self.server = Some((host.into(), port));
        self
    }

    /// Authenticate with a TLS client certificate.
    ///
    /// `passphrase` decrypts an `ENCRYPTED PRIVATE KEY`; it is ignored for
    /// unencrypted keys.
    #[must_use]
    pub fn client_credentials(
        mut self,
        certificate: impl Into<Vec<u8>>,
        private_key: impl Into<Vec<u8>>,
        passphrase: Option<&str>,
    ) -> Self {
        self.auth = Some(Auth::Certificate {
            certificate: certificate.into(),
            private_key: private_key.into(),
            passphrase: passphrase.map(str::to_string),
        });
        self
    }

    /// Authenticate with the certificate and key inside a PKCS#12 archive.
    ///
    /// A missing password is tried as the empty string.
    #[must_use]
    pub fn pkcs12(mut self, archive: impl Into<Vec<u8>>, password: Option<&str>) -> Self {
        self.auth = Some(Auth::Pkcs12 {
            archive: archive.into(),
            password: password.unwrap_or_default().to_string(),
        });
        self
    }

    /// Authenticate with bearer tokens signed by `key`.
    #[must_use]
    pub fn signing_key(mut self, key: SigningKey) -> Self {
        self.auth = Some(Auth::Token(key));
        self
    }

    /// Upper bound on each request, connect included.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Talk cleartext HTTP/1.1 instead of TLS HTTP/2. For local gateway doubles.
    #[must_use]
    pub fn plaintext(mut self) -> Self {
        self.plaintext = true;
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<ApnsClient, BuildError> {
        let (host, port) = self.server.ok_or(BuildError::MissingServer)?;
        let auth = self.auth.ok_or(BuildError::MissingCredentials)?;

        let mut http = reqwest::Client::builder().timeout(self.request_timeout);
        if !self.plaintext {
            // Force HTTP/2; ALPN alone leaves reqwest on HTTP/1.1.
            http = http.http2_prior_knowledge();
        }

        let signer = match auth {
            Auth::Certificate {
                certificate,
                private_key,
                passphrase,
            } => {
                let key = decrypt_private_key(&private_key, passphrase.as_deref())?;
                let mut bundle = certificate;
                bundle.push(b'\n');
                bundle.extend_from_slice(&key);
                http = http.identity(identity(&bundle)?);
                None
            }
            Auth::Pkcs12 { archive, password } => {
                let bundle = pkcs12_to_pem(&archive, &password)?;
                http = http.identity(identity(&bundle)?);
                None
            }
            Auth::Token(key) => Some(TokenSigner::new(&key.key_pem, &key.key_id, &key.team_id)?),
        };

        let http = http.build().map_err(BuildError::Transport)?;
        let scheme = if self.plaintext { "http" } else { "https" };
        let base_url = format!("{scheme}://{host}:{port}");

        info!(
            %base_url,
            token_auth = signer.is_some(),
            timeout_ms = u64::try_from(self.request_timeout.as_millis()).unwrap_or(u64::MAX),
            "gateway client built"
        );
        Ok(ApnsClient::new(base_url, http, signer))
    }
}

fn identity(pem_bundle: &[u8]) -> Result<reqwest::Identity, BuildError> {
    reqwest::Identity::from_pem(pem_bundle).map_err(|e| BuildError::Identity {
        reason: e.to_string(),
    })
}

/// Unpack a PKCS#12 archive into a PEM certificate chain followed by its key.
fn pkcs12_to_pem(archive: &[u8], password: &str) -> Result<Vec<u8>, BuildError> {
    let pkcs12_error = |reason: String| BuildError::Pkcs12 { reason };

    let store =
        KeyStore::from_pkcs12(archive, password).map_err(|e| pkcs12_error(e.to_string()))?;
    let (alias, chain) = store
        .private_key_chain()
        .ok_or_else(|| pkcs12_error("archive holds no private key".into()))?;
    if chain.chain().is_empty() {
        return Err(pkcs12_error(format!("key {alias:?} has no certificate")));
    }
    debug!(alias, certificates = chain.chain().len(), "opened PKCS#12 archive");

    let mut bundle = String::new();
    for certificate in chain.chain() {
        let pem = Document::from_der(certificate.as_der())
            .and_then(|doc| doc.to_pem("CERTIFICATE", LineEnding::LF))
            .map_err(|e| pkcs12_error(e.to_string()))?;
        bundle.push_str(&pem);
    }
    let key = Document::from_der(chain.key())
        .and_then(|doc| doc.to_pem("PRIVATE KEY", LineEnding::LF))
        .map_err(|e| pkcs12_error(e.to_string()))?;
    bundle.push_str(&key);
    Ok(bundle.into_bytes())
}

/// Return PEM key bytes usable by the TLS stack, decrypting PKCS#8 if needed.
fn decrypt_private_key(key_pem: &[u8], passphrase: Option<&str>) -> Result<Vec<u8>, BuildError> {
    let Ok(text) = std::str::from_utf8(key_pem) else {
        return Ok(key_pem.to_vec());
    };
    let Ok((label, document)) = SecretDocument::from_pem(text) else {
        return Ok(key_pem.to_vec());
    };
    if label != ENCRYPTED_KEY_LABEL {
        if passphrase.is_some() {
            debug!(label, "passphrase supplied for an unencrypted key, ignoring");
        }
        return Ok(key_pem.to_vec());
    }

    let passphrase = passphrase.ok_or_else(|| BuildError::PrivateKey {
        reason: "key is encrypted and no passphrase was supplied".into(),
    })?;
    let info = EncryptedPrivateKeyInfo::try_from(document.as_bytes()).map_err(|e| {
        BuildError::PrivateKey {
            reason: e.to_string(),
        }
    })?;
    let decrypted = info.decrypt(passphrase).map_err(|e| BuildError::PrivateKey {
        reason: format!("decryption failed: {e}"),
    })?;
    let pem = decrypted
        .to_pem("PRIVATE KEY", LineEnding::LF)
        .map_err(|e| BuildError::PrivateKey {
            reason: e.to_string(),
        })?;
    Ok(pem.as_bytes().to_vec())
}
