//! Full `MONGODB-AWS` conversations against the fake server.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use driverauth_core::{AuthConfig, ClientCredential, MechanismName, SESSION_TOKEN_PROPERTY};
    use driverauth_sasl::{AuthError, Authenticator, MetadataClient, MetadataEndpoint};

    use crate::{FakeServer, init_tracing};

    /// Explicit credentials never touch the metadata service, so point it
    /// somewhere unroutable to prove it.
    fn authenticator(credential: ClientCredential) -> Authenticator {
        init_tracing();
        let config = AuthConfig::builder()
            .container_metadata_base("http://127.0.0.1:9".to_owned())
            .build();
        let metadata = MetadataClient::with_endpoint(
            &config,
            MetadataEndpoint::Container {
                relative_uri: "/unused".to_owned(),
            },
        )
        .unwrap();
        Authenticator::with_metadata_source(credential, Arc::new(metadata))
    }

    fn explicit(access_key_id: &str, secret_key: &str) -> ClientCredential {
        ClientCredential::new(MechanismName::aws())
            .with_username(access_key_id)
            .with_password(secret_key)
    }

    #[tokio::test]
    async fn test_should_authenticate_with_explicit_credentials() {
        let auth = authenticator(explicit("AKIDEXAMPLE", "wJalrXUtnFEMI"));
        let mut server =
            FakeServer::new("sts.amazonaws.com").with_key("AKIDEXAMPLE", "wJalrXUtnFEMI");

        auth.authenticate(&mut server).await.unwrap();

        assert_eq!(server.commands(), ["saslStart", "saslContinue"]);
        let client_final = &server.final_messages()[0];
        assert!(!client_final.contains_key("t"));
        assert_eq!(client_final.get_str("d").unwrap().len(), 16);
    }

    #[tokio::test]
    async fn test_should_authenticate_with_regional_host_and_token() {
        let credential = explicit("ASIAEXAMPLE", "tempsecret")
            .with_property(SESSION_TOKEN_PROPERTY, "FwoGZXIvYXdzEBYaDH");
        let auth = authenticator(credential);
        let mut server =
            FakeServer::new("sts.eu-central-1.amazonaws.com").with_key("ASIAEXAMPLE", "tempsecret");

        auth.authenticate(&mut server).await.unwrap();

        let client_final = &server.final_messages()[0];
        assert_eq!(client_final.get_str("t").unwrap(), "FwoGZXIvYXdzEBYaDH");
        assert!(
            client_final
                .get_str("a")
                .unwrap()
                .contains("/eu-central-1/sts/aws4_request")
        );
    }

    #[tokio::test]
    async fn test_should_fail_with_wrong_secret() {
        let auth = authenticator(explicit("AKIDEXAMPLE", "not-the-secret"));
        let mut server =
            FakeServer::new("sts.amazonaws.com").with_key("AKIDEXAMPLE", "wJalrXUtnFEMI");

        let err = auth.authenticate(&mut server).await.unwrap_err();

        match err {
            AuthError::Server { code, message } => {
                assert_eq!(code, 18);
                assert_eq!(message, "Authentication failed.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(server.final_messages().len(), 1);
    }

    #[tokio::test]
    async fn test_should_start_fresh_conversation_on_retry() {
        let auth = authenticator(explicit("AKIDEXAMPLE", "wJalrXUtnFEMI"));

        let mut first =
            FakeServer::new("sts.amazonaws.com").with_key("AKIDEXAMPLE", "wJalrXUtnFEMI");
        auth.authenticate(&mut first).await.unwrap();
        let mut second =
            FakeServer::new("sts.amazonaws.com").with_key("AKIDEXAMPLE", "wJalrXUtnFEMI");
        auth.authenticate(&mut second).await.unwrap();

        let first_auth = first.final_messages()[0].get_str("a").unwrap().to_owned();
        let second_auth = second.final_messages()[0].get_str("a").unwrap().to_owned();
        assert_ne!(first_auth, second_auth);
    }

    #[tokio::test]
    async fn test_should_reject_token_without_credentials_before_sending() {
        let credential = ClientCredential::new(MechanismName::aws())
            .with_property(SESSION_TOKEN_PROPERTY, "FwoGZXIvYXdzEBYaDH");
        let auth = authenticator(credential);
        let mut server = FakeServer::new("sts.amazonaws.com");

        let err = auth.authenticate(&mut server).await.unwrap_err();

        assert!(err.is_config());
        assert!(server.commands().is_empty());
    }
}
