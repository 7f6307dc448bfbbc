//! Bearer credential extractor.

use actix_web::{FromRequest, HttpRequest, dev::Payload, http::header};
use std::future::{Ready, ready};

use super::GatewayError;

/// The opaque API credential carried in `Authorization: Bearer <credential>`.
///
/// Extraction only validates the header shape; whether the credential is
/// known is the registry's call, made in the handler.
#[derive(Debug, Clone)]
pub struct BearerCredential(String);

impl BearerCredential {
    pub fn key(&self) -> &str {
        &self.0
    }
}

impl FromRequest for BearerCredential {
    type Error = GatewayError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let Some(value) = req.headers().get(header::AUTHORIZATION) else {
            return ready(Err(GatewayError::InvalidCredential));
        };

        let Ok(value) = value.to_str() else {
            return ready(Err(GatewayError::InvalidCredential));
        };

        let Some((scheme, token)) = value.split_once(' ') else {
            return ready(Err(GatewayError::InvalidCredential));
        };

        let token = token.trim();
        if !scheme.eq_ignore_ascii_case("Bearer") || token.is_empty() {
            return ready(Err(GatewayError::InvalidCredential));
        }

        ready(Ok(BearerCredential(token.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    async fn extract(request: TestRequest) -> Result<BearerCredential, GatewayError> {
        let (req, mut payload) = request.to_http_parts();
        BearerCredential::from_request(&req, &mut payload).await
    }

    #[tokio::test]
    async fn extracts_bearer_token() {
        let credential = extract(
            TestRequest::default().insert_header(("Authorization", "Bearer sk-test-1")),
        )
        .await
        .unwrap();
        assert_eq!(credential.key(), "sk-test-1");
    }

    #[tokio::test]
    async fn scheme_is_case_insensitive() {
        let credential =
            extract(TestRequest::default().insert_header(("Authorization", "bearer sk-test-2")))
                .await
                .unwrap();
        assert_eq!(credential.key(), "sk-test-2");
    }

    #[tokio::test]
    async fn missing_header_is_rejected() {
        assert!(extract(TestRequest::default()).await.is_err());
    }

    #[tokio::test]
    async fn non_bearer_scheme_is_rejected() {
        assert!(
            extract(TestRequest::default().insert_header(("Authorization", "Basic sk-test")))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn empty_token_is_rejected() {
        assert!(
            extract(TestRequest::default().insert_header(("Authorization", "Bearer  ")))
                .await
                .is_err()
        );
    }
}
