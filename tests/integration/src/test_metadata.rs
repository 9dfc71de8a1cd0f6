//! Conversations whose credentials come from a metadata endpoint.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use driverauth_core::{AuthConfig, ClientCredential, MechanismName};
    use driverauth_sasl::{AuthError, Authenticator, MetadataClient, MetadataEndpoint};
    use httptest::{Expectation, Server, matchers::*, responders::*};

    use crate::{FakeServer, init_tracing};

    const ROLE_PATH: &str = "/latest/meta-data/iam/security-credentials/";
    const ROLE_DOCUMENT_PATH: &str = "/latest/meta-data/iam/security-credentials/db-reader";

    const DOCUMENT: &str = r#"{
        "Code": "Success",
        "Type": "AWS-HMAC",
        "AccessKeyId": "ASIAMETADATA",
        "SecretAccessKey": "metadata-secret",
        "Token": "metadata-token",
        "Expiration": "2024-01-01T18:00:00Z"
    }"#;

    fn config_for(server: &Server) -> AuthConfig {
        let base = format!("http://{}", server.addr());
        AuthConfig::builder()
            .container_metadata_base(base.clone())
            .instance_metadata_base(format!("{base}{ROLE_PATH}"))
            .metadata_timeout(Duration::from_secs(2))
            .build()
    }

    fn derived_authenticator(server: &Server, endpoint: MetadataEndpoint) -> Authenticator {
        init_tracing();
        let metadata = MetadataClient::with_endpoint(&config_for(server), endpoint).unwrap();
        Authenticator::with_metadata_source(
            ClientCredential::new(MechanismName::aws()),
            Arc::new(metadata),
        )
    }

    fn container() -> MetadataEndpoint {
        MetadataEndpoint::Container {
            relative_uri: "/v2/credentials/1b2c".to_owned(),
        }
    }

    #[tokio::test]
    async fn test_should_authenticate_with_container_credentials() {
        let metadata = Server::run();
        metadata.expect(
            Expectation::matching(request::method_path("GET", "/v2/credentials/1b2c"))
                .times(1)
                .respond_with(status_code(200).body(DOCUMENT)),
        );
        let auth = derived_authenticator(&metadata, container());
        let mut server =
            FakeServer::new("sts.amazonaws.com").with_key("ASIAMETADATA", "metadata-secret");

        auth.authenticate(&mut server).await.unwrap();

        let client_final = &server.final_messages()[0];
        assert_eq!(client_final.get_str("t").unwrap(), "metadata-token");
        assert!(
            client_final
                .get_str("a")
                .unwrap()
                .starts_with("AWS4-HMAC-SHA256 Credential=ASIAMETADATA/")
        );
    }

    #[tokio::test]
    async fn test_should_authenticate_with_instance_role_credentials() {
        let metadata = Server::run();
        metadata.expect(
            Expectation::matching(request::method_path("GET", ROLE_PATH))
                .times(1)
                .respond_with(status_code(200).body("db-reader")),
        );
        metadata.expect(
            Expectation::matching(request::method_path("GET", ROLE_DOCUMENT_PATH))
                .times(1)
                .respond_with(status_code(200).body(DOCUMENT)),
        );
        let auth = derived_authenticator(&metadata, MetadataEndpoint::Instance);
        let mut server = FakeServer::new("sts.us-east-2.amazonaws.com")
            .with_key("ASIAMETADATA", "metadata-secret");

        auth.authenticate(&mut server).await.unwrap();

        assert_eq!(server.commands(), ["saslStart", "saslContinue"]);
    }

    #[tokio::test]
    async fn test_should_fetch_once_per_attempt() {
        let metadata = Server::run();
        metadata.expect(
            Expectation::matching(request::method_path("GET", "/v2/credentials/1b2c"))
                .times(2)
                .respond_with(status_code(200).body(DOCUMENT)),
        );
        let auth = derived_authenticator(&metadata, container());

        for _ in 0..2 {
            let mut server =
                FakeServer::new("sts.amazonaws.com").with_key("ASIAMETADATA", "metadata-secret");
            auth.authenticate(&mut server).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_should_abort_without_final_message_on_metadata_error() {
        let metadata = Server::run();
        metadata.expect(
            Expectation::matching(request::method_path("GET", "/v2/credentials/1b2c"))
                .times(1)
                .respond_with(status_code(500).body("internal error")),
        );
        let auth = derived_authenticator(&metadata, container());
        let mut server =
            FakeServer::new("sts.amazonaws.com").with_key("ASIAMETADATA", "metadata-secret");

        let err = auth.authenticate(&mut server).await.unwrap_err();

        assert!(matches!(err, AuthError::CredentialSource { .. }), "{err:?}");
        assert!(err.is_transient());
        assert_eq!(server.commands(), ["saslStart"]);
        assert!(server.final_messages().is_empty());
    }

    #[tokio::test]
    async fn test_should_abort_when_metadata_service_stalls() {
        init_tracing();
        let metadata = Server::run();
        metadata.expect(
            Expectation::matching(request::method_path("GET", "/v2/credentials/1b2c"))
                .times(1)
                .respond_with(delay_and_then(
                    Duration::from_secs(5),
                    status_code(200).body(DOCUMENT),
                )),
        );
        let config = AuthConfig::builder()
            .container_metadata_base(format!("http://{}", metadata.addr()))
            .metadata_timeout(Duration::from_millis(300))
            .build();
        let client = MetadataClient::with_endpoint(&config, container()).unwrap();
        let auth = Authenticator::with_metadata_source(
            ClientCredential::new(MechanismName::aws()),
            Arc::new(client),
        );
        let mut server =
            FakeServer::new("sts.amazonaws.com").with_key("ASIAMETADATA", "metadata-secret");

        let started = Instant::now();
        let err = auth.authenticate(&mut server).await.unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(3), "{:?}", started.elapsed());
        assert!(err.is_transient(), "{err:?}");
        assert!(err.to_string().contains("timed out"), "{err}");
        assert_eq!(server.commands(), ["saslStart"]);
        assert!(server.final_messages().is_empty());
    }

    #[tokio::test]
    async fn test_should_report_document_without_secret() {
        let metadata = Server::run();
        metadata.expect(
            Expectation::matching(request::method_path("GET", "/v2/credentials/1b2c"))
                .times(1)
                .respond_with(
                    status_code(200).body(r#"{"AccessKeyId":"ASIAMETADATA","Token":"t"}"#),
                ),
        );
        let auth = derived_authenticator(&metadata, container());
        let mut server = FakeServer::new("sts.amazonaws.com");

        let err = auth.authenticate(&mut server).await.unwrap_err();

        assert!(err.to_string().contains("SecretAccessKey"), "{err}");
        assert!(server.final_messages().is_empty());
    }

    #[tokio::test]
    #[ignore = "requires a cloud workload with an attached role"]
    async fn test_should_resolve_credentials_from_real_metadata_service() {
        init_tracing();
        let auth = Authenticator::new(
            ClientCredential::new(MechanismName::aws()),
            &AuthConfig::from_env(),
        )
        .unwrap();
        let mut server = FakeServer::new("sts.amazonaws.com");

        // The fake server does not know the real key, so the attempt must get
        // as far as a rejected final message.
        let err = auth.authenticate(&mut server).await.unwrap_err();
        assert!(matches!(err, AuthError::Server { .. }), "{err:?}");
        assert_eq!(server.final_messages().len(), 1);
    }
}
