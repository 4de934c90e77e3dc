//! Client construction for dispatch tasks.

use std::time::Duration;

use pushdeck_core::Endpoint;
use pushdeck_gateway::{GatewayClient, GatewayClientBuilder, SigningKey};

use crate::credentials::ClientAuthConfig;
use crate::outcome::ClientBuildError;

/// Builds gateway clients.
///
/// Each returned client is owned exclusively by the caller, who must close it.
pub trait ClientFactory: Send + Sync {
    /// Build a client for an already validated endpoint.
    fn create(
        &self,
        endpoint: &Endpoint,
        auth: &ClientAuthConfig<'_>,
    ) -> Result<Box<dyn GatewayClient>, ClientBuildError>;
}

/// Validate the endpoint, then delegate to `factory`.
pub fn build_client(
    factory: &dyn ClientFactory,
    endpoint: &Endpoint,
    auth: &ClientAuthConfig<'_>,
) -> Result<Box<dyn GatewayClient>, ClientBuildError> {
    endpoint
        .validate()
        .map_err(ClientBuildError::InvalidEndpoint)?;
    factory.create(endpoint, auth)
}

/// Factory producing real HTTP/2 clients.
#[derive(Clone, Debug)]
pub struct ApnsClientFactory {
    request_timeout: Duration,
    plaintext: bool,
}

impl ApnsClientFactory {
    /// Factory whose clients time out each request after `request_timeout`.
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            request_timeout,
            plaintext: false,
        }
    }

    /// Build cleartext clients, for local gateway doubles.
    #[must_use]
    pub fn plaintext(mut self) -> Self {
        self.plaintext = true;
        self
    }
}

impl ClientFactory for ApnsClientFactory {
    fn create(
        &self,
        endpoint: &Endpoint,
        auth: &ClientAuthConfig<'_>,
    ) -> Result<Box<dyn GatewayClient>, ClientBuildError> {
        let mut builder = GatewayClientBuilder::new()
            .server(endpoint.host.trim(), endpoint.port)
            .request_timeout(self.request_timeout);

        builder = match *auth {
            ClientAuthConfig::Certificate {
                certificate,
                private_key,
                passphrase,
            } => builder.client_credentials(certificate, private_key, passphrase),
            ClientAuthConfig::Pkcs12 {
                archive,
                passphrase,
            } => builder.pkcs12(archive, passphrase),
            ClientAuthConfig::Token { signing_key } => builder.signing_key(SigningKey::new(
                signing_key.key(),
                signing_key.key_id(),
                signing_key.team_id(),
            )),
        };
        if self.plaintext {
            builder = builder.plaintext();
        }

        let client = builder.build().map_err(ClientBuildError::Gateway)?;
        Ok(Box::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pushdeck_core::{EndpointError, SigningKeyCredential};
    use pushdeck_gateway::BuildError;

    const SIGNING_KEY: &[u8] = include_bytes!("../../pushdeck-gateway/tests/fixtures/signing_key.p8");
    const IDENTITY: &[u8] =
        include_bytes!("../../pushdeck-gateway/tests/fixtures/client_identity.p12");

    fn factory() -> ApnsClientFactory {
        ApnsClientFactory::new(Duration::from_secs(5))
    }

    #[test]
    fn invalid_endpoint_rejected_before_factory() {
        let key = SigningKeyCredential::new(SIGNING_KEY, "KID", "TEAM");
        let auth = ClientAuthConfig::Token { signing_key: &key };
        let err = build_client(&factory(), &Endpoint::new("", 443), &auth)
            .err()
            .unwrap();
        assert_matches!(err, ClientBuildError::InvalidEndpoint(EndpointError::EmptyHost));
    }

    #[test]
    fn token_client_builds() {
        let key = SigningKeyCredential::new(SIGNING_KEY, "KID", "TEAM");
        let auth = ClientAuthConfig::Token { signing_key: &key };
        assert!(build_client(&factory(), &Endpoint::development(), &auth).is_ok());
    }

    #[test]
    fn malformed_key_is_build_error() {
        let key = SigningKeyCredential::new("garbage", "KID", "TEAM");
        let auth = ClientAuthConfig::Token { signing_key: &key };
        let err = build_client(&factory(), &Endpoint::development(), &auth)
            .err()
            .unwrap();
        assert_matches!(err, ClientBuildError::Gateway(BuildError::SigningKey { .. }));
    }

    #[test]
    fn malformed_certificate_is_build_error() {
        let auth = ClientAuthConfig::Certificate {
            certificate: b"not a cert",
            private_key: b"not a key",
            passphrase: None,
        };
        let err = build_client(&factory(), &Endpoint::production(), &auth)
            .err()
            .unwrap();
        assert_matches!(err, ClientBuildError::Gateway(_));
    }

    #[test]
    fn pkcs12_client_builds() {
        let auth = ClientAuthConfig::Pkcs12 {
            archive: IDENTITY,
            passphrase: Some("pushdeck"),
        };
        assert!(build_client(&factory(), &Endpoint::production(), &auth).is_ok());
    }

    #[test]
    fn pkcs12_wrong_password_is_build_error() {
        let auth = ClientAuthConfig::Pkcs12 {
            archive: IDENTITY,
            passphrase: Some("wrong"),
        };
        let err = build_client(&factory(), &Endpoint::production(), &auth)
            .err()
            .unwrap();
        assert_matches!(err, ClientBuildError::Gateway(BuildError::Pkcs12 { .. }));
    }
}
