use anyhow::anyhow;
use reqwest::StatusCode;
use serde_json::Value;

/// Error body shape used by the SWEET-CROSS backend: `detail` is either a
/// plain string or a validation list; a few endpoints answer with
/// `{"message": ...}` instead.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct CrossErrorResponse {
    #[serde(default)]
    pub(crate) detail: Option<Value>,
    #[serde(default)]
    pub(crate) message: Option<String>,
}

impl CrossErrorResponse {
    pub(crate) fn detail_text(&self) -> String {
        match &self.detail {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Array(items)) => items
                .iter()
                .map(render_validation_item)
                .collect::<Vec<_>>()
                .join("\n"),
            Some(other) => other.to_string(),
            None => self.message.clone().unwrap_or_default(),
        }
    }
}

fn render_validation_item(item: &Value) -> String {
    let loc = item
        .get("loc")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .map(|p| match p {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(".")
        })
        .unwrap_or_default();
    let msg = item
        .get("msg")
        .and_then(Value::as_str)
        .unwrap_or("invalid value");
    if loc.is_empty() {
        format!("- {}", msg)
    } else {
        format!("- {}: {}", loc, msg)
    }
}

/// Turns a non-2xx response body into an error, preferring the structured
/// SWEET-CROSS payload when it parses.
pub(crate) fn error_from_response(status: StatusCode, url: &str, text: &str) -> anyhow::Error {
    if let Ok(err_json) = serde_json::from_str::<CrossErrorResponse>(text) {
        if err_json.detail.is_some() || err_json.message.is_some() {
            return format_cross_error(status, url, &err_json);
        }
    }

    anyhow!(
        "API request failed: HTTP {} for url ({})\n{}",
        status.as_u16(),
        url,
        text
    )
}

pub(crate) fn format_cross_error(
    status: StatusCode,
    url: &str,
    e: &CrossErrorResponse,
) -> anyhow::Error {
    let detail = e.detail_text();

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return anyhow!(
            "SWEET-CROSS authentication/authorization failed (HTTP {}).\n- Check the username and password (CROSSCLIENT_USERNAME / CROSSCLIENT_PASSWORD or your .crossclientrc)\n- Accounts must be registered with the SWEET-CROSS platform before submitting results\n\nServer message: {}\nrequest: {}",
            status.as_u16(),
            if detail.is_empty() { "(none)" } else { &detail },
            url
        );
    }

    if status == StatusCode::NOT_FOUND {
        return anyhow!(
            "SWEET-CROSS API endpoint not found (HTTP 404).\n- The API path may have changed, or the configured base URL is incorrect\n- Recommended base URL: https://sweetcross.link/api/v1\n\nServer message: {}\nrequest: {}",
            if detail.is_empty() { "(none)" } else { &detail },
            url
        );
    }

    if status == StatusCode::UNPROCESSABLE_ENTITY {
        return anyhow!(
            "SWEET-CROSS rejected the request payload (HTTP 422).\n{}\nrequest: {}",
            if detail.is_empty() {
                "(no validation detail)".to_string()
            } else {
                detail
            },
            url
        );
    }

    anyhow!(
        "API request failed: HTTP {} for url ({})\n{}",
        status.as_u16(),
        url,
        detail
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_text_renders_plain_string() {
        let e: CrossErrorResponse =
            serde_json::from_str(r#"{"detail": "Incorrect username or password"}"#).unwrap();
        assert_eq!(e.detail_text(), "Incorrect username or password");
    }

    #[test]
    fn detail_text_renders_validation_list() {
        let e: CrossErrorResponse = serde_json::from_str(
            r#"{"detail": [{"loc": ["body", "file_description"], "msg": "field required", "type": "value_error.missing"}]}"#,
        )
        .unwrap();
        assert_eq!(e.detail_text(), "- body.file_description: field required");
    }

    #[test]
    fn detail_text_falls_back_to_message() {
        let e: CrossErrorResponse =
            serde_json::from_str(r#"{"message": "server exploded"}"#).unwrap();
        assert_eq!(e.detail_text(), "server exploded");
    }

    #[test]
    fn unauthorized_mentions_credentials() {
        let e: CrossErrorResponse =
            serde_json::from_str(r#"{"detail": "Could not validate credentials"}"#).unwrap();
        let msg = format_cross_error(
            StatusCode::UNAUTHORIZED,
            "https://sweetcross.link/api/v1/login/access_token",
            &e,
        )
        .to_string();
        assert!(msg.contains("authentication"));
        assert!(msg.contains("CROSSCLIENT_USERNAME"));
        assert!(msg.contains("Could not validate credentials"));
    }

    #[test]
    fn not_found_recommends_base_url() {
        let e = CrossErrorResponse {
            detail: None,
            message: None,
        };
        let msg = format_cross_error(StatusCode::NOT_FOUND, "https://h/api/v2/x", &e).to_string();
        assert!(msg.contains("https://sweetcross.link/api/v1"));
    }
}
