use crossclient::{ClientConfig, CrossClient};
use httpmock::Method::POST;
use httpmock::{Mock, MockServer};
use serde_json::json;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Standard login endpoint: issues `abc123` with comfortable expiry windows.
pub fn mock_login(server: &MockServer) -> Mock<'_> {
    server.mock(|when, then| {
        when.method(POST).path("/login/access_token");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({
                "access_token": "abc123",
                "refresh_token": "def456",
                "token_type": "Bearer",
                "expires_in": 3600,
                "refresh_expires_in": 7200
            }));
    })
}

pub fn client_for(server: &MockServer) -> CrossClient {
    CrossClient::from_config(ClientConfig {
        url: server.base_url(),
        username: "test_user".into(),
        password: "test_password".into(),
        verify: true,
    })
    .expect("explicit configuration is always constructible")
}
