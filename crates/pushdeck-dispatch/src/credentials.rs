//! Credential resolution: which authentication mode to configure.

use pushdeck_core::{
    CertificateMaterial, CredentialBundle, InvalidCredentialError, SigningKeyCredential,
};

/// Authentication mode chosen for a client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthMode {
    /// Mutual TLS with a client certificate.
    Certificate,
    /// Bearer tokens signed with an EC key.
    Token,
}

/// Borrowed authentication settings handed to a [`crate::ClientFactory`].
#[derive(Clone, Copy, Debug)]
pub enum ClientAuthConfig<'a> {
    /// Certificate-based authentication.
    Certificate {
        /// PEM certificate chain.
        certificate: &'a [u8],
        /// PEM private key.
        private_key: &'a [u8],
        /// Passphrase for an encrypted key.
        passphrase: Option<&'a str>,
    },
    /// Certificate-based authentication from a `.p12` archive.
    Pkcs12 {
        /// DER-encoded PKCS#12 archive.
        archive: &'a [u8],
        /// Archive password.
        passphrase: Option<&'a str>,
    },
    /// Signing-key (token) authentication.
    Token {
        /// The key with its identifiers.
        signing_key: &'a SigningKeyCredential,
    },
}

impl ClientAuthConfig<'_> {
    /// The mode this configuration selects.
    pub fn mode(&self) -> AuthMode {
        match self {
            Self::Certificate { .. } | Self::Pkcs12 { .. } => AuthMode::Certificate,
            Self::Token { .. } => AuthMode::Token,
        }
    }
}

/// Map a credential bundle to client authentication settings.
///
/// Pure; fails only when the populated variant carries unusable material.
pub fn resolve(bundle: &CredentialBundle) -> Result<ClientAuthConfig<'_>, InvalidCredentialError> {
    bundle.validate()?;
    Ok(match bundle {
        CredentialBundle::Certificate(c) => match c.material() {
            CertificateMaterial::Pem {
                certificate,
                private_key,
            } => ClientAuthConfig::Certificate {
                certificate,
                private_key,
                passphrase: c.passphrase(),
            },
            CertificateMaterial::Pkcs12(archive) => ClientAuthConfig::Pkcs12 {
                archive,
                passphrase: c.passphrase(),
            },
        },
        CredentialBundle::SigningKey(k) => ClientAuthConfig::Token { signing_key: k },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;
    use pushdeck_core::CertificateCredential;

    #[test]
    fn certificate_keeps_passphrase() {
        let bundle: CredentialBundle = CertificateCredential::new("cert", "key")
            .with_passphrase("secret")
            .into();
        assert_matches!(
            resolve(&bundle),
            Ok(ClientAuthConfig::Certificate { passphrase: Some("secret"), .. })
        );
    }

    #[test]
    fn pkcs12_archive_selects_certificate_mode() {
        let bundle: CredentialBundle = CertificateCredential::pkcs12(vec![0x30, 0x82])
            .with_passphrase("secret")
            .into();
        let config = resolve(&bundle).unwrap();
        assert_eq!(config.mode(), AuthMode::Certificate);
        assert_matches!(
            config,
            ClientAuthConfig::Pkcs12 { archive: [0x30, 0x82], passphrase: Some("secret") }
        );
    }

    #[test]
    fn signing_key_selects_token() {
        let bundle: CredentialBundle = SigningKeyCredential::new("key", "KID", "TEAM").into();
        let config = resolve(&bundle).unwrap();
        assert_eq!(config.mode(), AuthMode::Token);
    }

    #[test]
    fn empty_material_rejected_before_any_client() {
        let bundle: CredentialBundle = CertificateCredential::new("cert", "").into();
        assert_eq!(
            resolve(&bundle).unwrap_err(),
            InvalidCredentialError::EmptyPrivateKey
        );
    }

    #[test]
    fn nothing_populated_never_reaches_resolve() {
        assert_eq!(
            CredentialBundle::from_parts(None, None).unwrap_err(),
            InvalidCredentialError::NoneProvided
        );
    }

    fn material() -> impl Strategy<Value = String> {
        "[A-Za-z0-9+/=-]{1,64}"
    }

    proptest! {
        #[test]
        fn populated_certificate_always_resolves(cert in material(), key in material()) {
            let bundle: CredentialBundle = CertificateCredential::new(cert, key).into();
            prop_assert_eq!(resolve(&bundle).unwrap().mode(), AuthMode::Certificate);
        }

        #[test]
        fn populated_signing_key_always_resolves(
            key in material(),
            kid in "[A-Z0-9]{1,10}",
            team in "[A-Z0-9]{1,10}",
        ) {
            let bundle: CredentialBundle = SigningKeyCredential::new(key, kid, team).into();
            prop_assert_eq!(resolve(&bundle).unwrap().mode(), AuthMode::Token);
        }

        #[test]
        fn blank_material_always_fails(blank in "[ \t\n]{0,8}", use_cert in any::<bool>()) {
            let bundle: CredentialBundle = if use_cert {
                CertificateCredential::new(blank.clone(), blank).into()
            } else {
                SigningKeyCredential::new(blank, "KID", "TEAM").into()
            };
            prop_assert!(resolve(&bundle).is_err());
        }
    }
}
