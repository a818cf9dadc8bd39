//! # Invocation Event
//!
//! Synthesizes the first handler argument from an inbound HTTP request, in
//! the shape of an API gateway proxy event.

use std::collections::BTreeMap;

use axum::http::header::{CONTENT_TYPE, USER_AGENT};
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Body used when the request carries no payload
pub const EMPTY_BODY: &str = "{}";

const MULTIPART_FORM_DATA: &str = "multipart/form-data";
const REQUEST_TIME_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// Identity values that can be substituted for the placeholders
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityOverrides {
    pub account_id: Option<String>,
    pub api_key: Option<String>,
    pub api_key_id: Option<String>,
    pub caller: Option<String>,
    pub cognito_authentication_provider: Option<String>,
    pub cognito_authentication_type: Option<String>,
    pub cognito_identity_id: Option<String>,
    pub cognito_identity_pool_id: Option<String>,
}

impl IdentityOverrides {
    /// Read overrides from the `SLS_*` environment variables.
    /// Empty values count as unset.
    pub fn from_env() -> Self {
        fn var(key: &str) -> Option<String> {
            std::env::var(key).ok().filter(|value| !value.is_empty())
        }

        Self {
            account_id: var("SLS_ACCOUNT_ID"),
            api_key: var("SLS_API_KEY"),
            api_key_id: var("SLS_API_KEY_ID"),
            caller: var("SLS_CALLER"),
            cognito_authentication_provider: var("SLS_COGNITO_AUTHENTICATION_PROVIDER"),
            cognito_authentication_type: var("SLS_COGNITO_AUTHENTICATION_TYPE"),
            cognito_identity_id: var("SLS_COGNITO_IDENTITY_ID"),
            cognito_identity_pool_id: var("SLS_COGNITO_IDENTITY_POOL_ID"),
        }
    }
}

/// The parts of an inbound request the event is built from
#[derive(Debug, Clone)]
pub struct EventSource<'a> {
    /// Method of the matched route
    pub method: &'a str,
    /// Resource path without the stage prefix
    pub resource_path: &'a str,
    pub stage: &'a str,
    pub headers: &'a HeaderMap,
    /// Raw query string, without the leading `?`
    pub query: Option<&'a str>,
    pub path_parameters: BTreeMap<String, String>,
    pub body: &'a [u8],
    pub source_ip: String,
    pub received_at: DateTime<Utc>,
}

/// Caller identity block of the request context
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestIdentity {
    pub access_key: Option<String>,
    pub account_id: String,
    pub api_key: String,
    pub api_key_id: String,
    pub caller: String,
    pub client_cert: Option<String>,
    pub cognito_authentication_provider: String,
    pub cognito_authentication_type: String,
    pub cognito_identity_id: String,
    pub cognito_identity_pool_id: String,
    pub principal_org_id: Option<String>,
    pub source_ip: String,
    pub user: String,
    pub user_agent: String,
    pub user_arn: String,
}

/// Request context block of the event
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    pub account_id: String,
    pub api_id: String,
    pub authorizer: BTreeMap<String, String>,
    pub domain_name: String,
    pub domain_prefix: String,
    pub extended_request_id: String,
    pub http_method: String,
    pub identity: RequestIdentity,
    pub path: String,
    pub protocol: String,
    pub request_id: String,
    pub request_time: String,
    pub request_time_epoch: i64,
    pub resource_id: String,
    pub resource_path: String,
    pub stage: String,
}

/// Event passed to synchronous handlers
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationEvent {
    pub body: String,
    pub headers: BTreeMap<String, String>,
    pub http_method: String,
    pub is_base64_encoded: bool,
    pub multi_value_headers: BTreeMap<String, Vec<String>>,
    pub multi_value_query_string_parameters: BTreeMap<String, Vec<String>>,
    pub path: String,
    pub path_parameters: Option<BTreeMap<String, String>>,
    pub query_string_parameters: BTreeMap<String, String>,
    pub request_context: RequestContext,
    pub resource: String,
    pub stage_variables: Option<BTreeMap<String, String>>,
}

impl InvocationEvent {
    /// Build the event for one request
    pub fn synthesize(source: EventSource<'_>, overrides: &IdentityOverrides) -> Self {
        let multi_value_headers = collect_headers(source.headers);
        let headers: BTreeMap<String, String> = multi_value_headers
            .iter()
            .map(|(name, values)| (name.clone(), values.join(", ")))
            .collect();

        let body = decode_body(headers.get(CONTENT_TYPE.as_str()), source.body);
        let (query_string_parameters, multi_value_query_string_parameters) =
            parse_query(source.query);

        let path_parameters = if source.path_parameters.is_empty() {
            None
        } else {
            Some(source.path_parameters)
        };

        let user_agent = headers
            .get(USER_AGENT.as_str())
            .cloned()
            .unwrap_or_default();
        let identity = RequestIdentity {
            access_key: None,
            account_id: or_placeholder(&overrides.account_id, "accountId"),
            api_key: or_placeholder(&overrides.api_key, "apiKey"),
            api_key_id: or_placeholder(&overrides.api_key_id, "apiKeyId"),
            caller: or_placeholder(&overrides.caller, "caller"),
            client_cert: None,
            cognito_authentication_provider: headers
                .get("cognito-authentication-provider")
                .filter(|value| !value.is_empty())
                .cloned()
                .unwrap_or_else(|| {
                    or_placeholder(
                        &overrides.cognito_authentication_provider,
                        "cognitoAuthenticationProvider",
                    )
                }),
            cognito_authentication_type: or_placeholder(
                &overrides.cognito_authentication_type,
                "cognitoAuthenticationType",
            ),
            cognito_identity_id: headers
                .get("cognito-identity-id")
                .filter(|value| !value.is_empty())
                .cloned()
                .unwrap_or_else(|| {
                    or_placeholder(&overrides.cognito_identity_id, "cognitoIdentityId")
                }),
            cognito_identity_pool_id: or_placeholder(
                &overrides.cognito_identity_pool_id,
                "cognitoIdentityPoolId",
            ),
            principal_org_id: None,
            source_ip: source.source_ip,
            user: placeholder("user"),
            user_agent,
            user_arn: placeholder("userArn"),
        };

        let request_context = RequestContext {
            account_id: placeholder("accountId"),
            api_id: placeholder("apiId"),
            authorizer: BTreeMap::new(),
            domain_name: placeholder("domainName"),
            domain_prefix: placeholder("domainPrefix"),
            extended_request_id: Uuid::new_v4().to_string(),
            http_method: source.method.to_string(),
            identity,
            path: source.resource_path.to_string(),
            protocol: "HTTP/1.1".to_string(),
            request_id: Uuid::new_v4().to_string(),
            request_time: source
                .received_at
                .format(REQUEST_TIME_FORMAT)
                .to_string(),
            request_time_epoch: source.received_at.timestamp_millis(),
            resource_id: placeholder("resourceId"),
            resource_path: source.resource_path.to_string(),
            stage: source.stage.to_string(),
        };

        Self {
            body,
            headers,
            http_method: source.method.to_string(),
            is_base64_encoded: false,
            multi_value_headers,
            multi_value_query_string_parameters,
            path: source.resource_path.to_string(),
            path_parameters,
            query_string_parameters,
            request_context,
            resource: source.resource_path.to_string(),
            stage_variables: None,
        }
    }
}

fn placeholder(field: &str) -> String {
    format!("offlineContext_{}", field)
}

fn or_placeholder(value: &Option<String>, field: &str) -> String {
    value.clone().unwrap_or_else(|| placeholder(field))
}

/// Every header value per lower-cased name, in arrival order
fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, Vec<String>> {
    let mut collected: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        let value = match value.to_str() {
            Ok(value) => value.to_string(),
            Err(_) => String::from_utf8_lossy(value.as_bytes()).into_owned(),
        };
        collected
            .entry(name.as_str().to_string())
            .or_default()
            .push(value);
    }
    collected
}

/// Multipart payloads are kept byte-for-byte (one char per byte), everything
/// else is read as UTF-8.
fn decode_body(content_type: Option<&String>, body: &[u8]) -> String {
    if body.is_empty() {
        return EMPTY_BODY.to_string();
    }

    let is_multipart = content_type
        .map(|value| value.to_ascii_lowercase().contains(MULTIPART_FORM_DATA))
        .unwrap_or(false);
    if is_multipart {
        body.iter().map(|&byte| byte as char).collect()
    } else {
        String::from_utf8_lossy(body).into_owned()
    }
}

/// Single-valued map keeps the last occurrence, multi-valued keeps them all
fn parse_query(
    query: Option<&str>,
) -> (BTreeMap<String, String>, BTreeMap<String, Vec<String>>) {
    let mut single = BTreeMap::new();
    let mut multi: BTreeMap<String, Vec<String>> = BTreeMap::new();

    if let Some(query) = query.filter(|query| !query.is_empty()) {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let key = key.into_owned();
            let value = value.into_owned();
            multi.entry(key.clone()).or_default().push(value.clone());
            single.insert(key, value);
        }
    }

    (single, multi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use chrono::TimeZone;

    fn source<'a>(headers: &'a HeaderMap, body: &'a [u8]) -> EventSource<'a> {
        EventSource {
            method: "POST",
            resource_path: "test",
            stage: "dev",
            headers,
            query: None,
            path_parameters: BTreeMap::new(),
            body,
            source_ip: "127.0.0.1".to_string(),
            received_at: Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap(),
        }
    }

    #[test]
    fn test_missing_body_is_empty_object() {
        let headers = HeaderMap::new();
        let event = InvocationEvent::synthesize(source(&headers, b""), &Default::default());
        assert_eq!(event.body, "{}");
    }

    #[test]
    fn test_text_body_passes_through() {
        let headers = HeaderMap::new();
        let event = InvocationEvent::synthesize(
            source(&headers, br#"{"foo":"bar"}"#),
            &Default::default(),
        );
        assert_eq!(event.body, r#"{"foo":"bar"}"#);
        assert!(!event.is_base64_encoded);
    }

    #[test]
    fn test_multipart_body_keeps_every_byte() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("multipart/form-data; boundary=x"),
        );
        let payload = [0x41, 0xff, 0x00, 0xe9];
        let event = InvocationEvent::synthesize(source(&headers, &payload), &Default::default());

        let bytes: Vec<u8> = event.body.chars().map(|c| c as u32 as u8).collect();
        assert_eq!(bytes, payload);
    }

    #[test]
    fn test_repeated_headers() {
        let mut headers = HeaderMap::new();
        headers.append("x-tag", HeaderValue::from_static("a"));
        headers.append("x-tag", HeaderValue::from_static("b"));
        headers.insert("x-single", HeaderValue::from_static("only"));

        let event = InvocationEvent::synthesize(source(&headers, b""), &Default::default());

        assert_eq!(event.headers["x-tag"], "a, b");
        assert_eq!(event.multi_value_headers["x-tag"], vec!["a", "b"]);
        assert_eq!(event.headers["x-single"], "only");
        assert_eq!(event.multi_value_headers["x-single"], vec!["only"]);
    }

    #[test]
    fn test_query_parameters() {
        let headers = HeaderMap::new();
        let mut src = source(&headers, b"");
        src.query = Some("a=1&b=two&a=3&c=hello%20world");

        let event = InvocationEvent::synthesize(src, &Default::default());

        assert_eq!(event.query_string_parameters["a"], "3");
        assert_eq!(event.query_string_parameters["c"], "hello world");
        assert_eq!(
            event.multi_value_query_string_parameters["a"],
            vec!["1", "3"]
        );
        assert_eq!(event.multi_value_query_string_parameters["b"], vec!["two"]);
    }

    #[test]
    fn test_path_parameters_null_when_empty() {
        let headers = HeaderMap::new();
        let event = InvocationEvent::synthesize(source(&headers, b""), &Default::default());
        assert!(event.path_parameters.is_none());

        let value = serde_json::to_value(&event).unwrap();
        assert!(value["pathParameters"].is_null());
        assert!(value["stageVariables"].is_null());
    }

    #[test]
    fn test_path_parameters_present() {
        let headers = HeaderMap::new();
        let mut src = source(&headers, b"");
        src.path_parameters.insert("id".to_string(), "42".to_string());

        let event = InvocationEvent::synthesize(src, &Default::default());
        assert_eq!(event.path_parameters.unwrap()["id"], "42");
    }

    #[test]
    fn test_placeholder_identity() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("curl/8.0"));
        let event = InvocationEvent::synthesize(source(&headers, b""), &Default::default());

        let identity = &event.request_context.identity;
        assert_eq!(identity.account_id, "offlineContext_accountId");
        assert_eq!(identity.api_key, "offlineContext_apiKey");
        assert_eq!(identity.caller, "offlineContext_caller");
        assert_eq!(identity.user_agent, "curl/8.0");
        assert_eq!(identity.source_ip, "127.0.0.1");
        assert_eq!(event.request_context.stage, "dev");
        assert_eq!(event.request_context.protocol, "HTTP/1.1");
    }

    #[test]
    fn test_identity_overrides() {
        let overrides = IdentityOverrides {
            account_id: Some("123456789012".to_string()),
            api_key: Some("key".to_string()),
            cognito_identity_id: Some("from-env".to_string()),
            ..Default::default()
        };
        let headers = HeaderMap::new();
        let event = InvocationEvent::synthesize(source(&headers, b""), &overrides);

        let identity = &event.request_context.identity;
        assert_eq!(identity.account_id, "123456789012");
        assert_eq!(identity.api_key, "key");
        assert_eq!(identity.api_key_id, "offlineContext_apiKeyId");
        assert_eq!(identity.cognito_identity_id, "from-env");
        // the request context's own account id is never overridden
        assert_eq!(event.request_context.account_id, "offlineContext_accountId");
    }

    #[test]
    fn test_cognito_headers_win_over_environment() {
        let overrides = IdentityOverrides {
            cognito_identity_id: Some("from-env".to_string()),
            ..Default::default()
        };
        let mut headers = HeaderMap::new();
        headers.insert("cognito-identity-id", HeaderValue::from_static("from-header"));
        let event = InvocationEvent::synthesize(source(&headers, b""), &overrides);

        assert_eq!(
            event.request_context.identity.cognito_identity_id,
            "from-header"
        );
    }

    #[test]
    fn test_request_time() {
        let headers = HeaderMap::new();
        let event = InvocationEvent::synthesize(source(&headers, b""), &Default::default());

        assert_eq!(event.request_context.request_time, "05/Mar/2024:14:07:09 +0000");
        assert_eq!(event.request_context.request_time_epoch, 1_709_647_629_000);
    }

    #[test]
    fn test_request_ids_are_fresh() {
        let headers = HeaderMap::new();
        let a = InvocationEvent::synthesize(source(&headers, b""), &Default::default());
        let b = InvocationEvent::synthesize(source(&headers, b""), &Default::default());
        assert_ne!(a.request_context.request_id, b.request_context.request_id);
        assert_ne!(
            a.request_context.extended_request_id,
            b.request_context.extended_request_id
        );
    }

    #[test]
    fn test_serialized_field_names() {
        let headers = HeaderMap::new();
        let event = InvocationEvent::synthesize(source(&headers, b""), &Default::default());
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["httpMethod"], "POST");
        assert_eq!(value["resource"], "test");
        assert_eq!(value["path"], "test");
        assert_eq!(value["isBase64Encoded"], false);
        assert!(value["multiValueQueryStringParameters"].is_object());
        assert_eq!(value["requestContext"]["resourcePath"], "test");
        assert!(value["requestContext"]["identity"]["accessKey"].is_null());
    }
}
