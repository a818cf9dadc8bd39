//! # Response Marshalling
//!
//! Turns handler results and dispatch failures into HTTP responses.

use axum::body::Body;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD, CONTENT_TYPE, ORIGIN,
};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde_json::{json, Value};

use crate::functions::{FunctionError, FunctionResult, InvocationResult};

const DEFAULT_TEXT_CONTENT_TYPE: &str = "text/html; charset=utf-8";
const DEFAULT_BINARY_CONTENT_TYPE: &str = "application/octet-stream";
const JSON_CONTENT_TYPE: &str = "application/json";

const PADDING_INDIFFERENT: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);
const LENIENT_STANDARD: GeneralPurpose =
    GeneralPurpose::new(&alphabet::STANDARD, PADDING_INDIFFERENT);
const LENIENT_URL_SAFE: GeneralPurpose =
    GeneralPurpose::new(&alphabet::URL_SAFE, PADDING_INDIFFERENT);

/// Build the response for a validated handler result.
///
/// Singular headers are appended before multi-value headers so both can
/// target the same name and keep their relative order.
pub fn marshal_result(
    result: InvocationResult,
    origin: Option<&HeaderValue>,
) -> FunctionResult<Response> {
    let status = StatusCode::from_u16(result.status())
        .map_err(|_| FunctionError::InvalidStatusCode(result.status().to_string()))?;

    let mut headers = HeaderMap::new();
    for (name, value) in &result.headers {
        append_header(&mut headers, name, value)?;
    }
    for (name, values) in &result.multi_value_headers {
        for value in values {
            append_header(&mut headers, name, value)?;
        }
    }

    let body = if result.is_base64_encoded {
        decode_base64(&result.body)?
    } else {
        result.body.into_bytes()
    };

    if !headers.contains_key(CONTENT_TYPE) {
        let default = if result.is_base64_encoded {
            DEFAULT_BINARY_CONTENT_TYPE
        } else {
            DEFAULT_TEXT_CONTENT_TYPE
        };
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(default));
    }

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    echo_origin(&mut response, origin);
    Ok(response)
}

/// Padding is optional and the URL-safe alphabet is accepted as well
fn decode_base64(body: &str) -> FunctionResult<Vec<u8>> {
    let encoded: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    LENIENT_STANDARD
        .decode(encoded.as_bytes())
        .or_else(|_| LENIENT_URL_SAFE.decode(encoded.as_bytes()))
        .map_err(|e| FunctionError::InvalidBase64(e.to_string()))
}

fn append_header(headers: &mut HeaderMap, name: &str, value: &str) -> FunctionResult<()> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| FunctionError::InvalidHeader(format!("invalid header name {:?}", name)))?;
    let header_value = HeaderValue::from_str(value).map_err(|_| {
        FunctionError::InvalidHeader(format!("invalid value for header {}", name))
    })?;
    headers.append(header_name, header_value);
    Ok(())
}

/// Structured 5xx response for a failed dispatch
pub fn error_response(error: &FunctionError, origin: Option<&HeaderValue>) -> Response {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = json_response(status, &error.to_json());
    echo_origin(&mut response, origin);
    response
}

/// Answer a CORS preflight by echoing what the request asked for.
/// Headers the request did not send are left out.
pub fn preflight_response(request_headers: &HeaderMap) -> Response {
    let mut response = Response::new(Body::empty());
    let echoes = [
        (ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_ALLOW_HEADERS),
        (ORIGIN, ACCESS_CONTROL_ALLOW_ORIGIN),
        (ACCESS_CONTROL_REQUEST_METHOD, ACCESS_CONTROL_ALLOW_METHODS),
    ];
    for (requested, allowed) in echoes {
        if let Some(value) = request_headers.get(&requested) {
            response.headers_mut().insert(allowed, value.clone());
        }
    }
    response
}

/// Operator diagnostic for a request that matched no route
pub fn not_found_response(
    method: &str,
    path: &str,
    existing_routes: &[String],
    origin: Option<&HeaderValue>,
) -> Response {
    let body = json!({
        "currentRoute": format!("{} - {}", method, path),
        "error": "Route not found.",
        "existingRoutes": existing_routes,
        "statusCode": 404,
    });
    let mut response = json_response(StatusCode::NOT_FOUND, &body);
    echo_origin(&mut response, origin);
    response
}

/// Immediate reply for an async function
pub fn accepted_response() -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::ACCEPTED;
    response
}

pub fn payload_too_large_response(limit: usize) -> Response {
    json_response(
        StatusCode::PAYLOAD_TOO_LARGE,
        &json!({
            "errorMessage": format!("Request body exceeds {} bytes", limit),
            "errorType": "PAYLOAD_TOO_LARGE",
        }),
    )
}

/// 400 for a request body that could not be read to the end
pub fn unreadable_body_response(reason: &str) -> Response {
    json_response(
        StatusCode::BAD_REQUEST,
        &json!({
            "errorMessage": format!("Request body could not be read: {}", reason),
            "errorType": "UNREADABLE_BODY",
        }),
    )
}

fn json_response(status: StatusCode, body: &Value) -> Response {
    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    response
}

/// Mirror the request origin unless the response already allows one
fn echo_origin(response: &mut Response, origin: Option<&HeaderValue>) {
    if let Some(origin) = origin {
        if !response.headers().contains_key(ACCESS_CONTROL_ALLOW_ORIGIN) {
            response
                .headers_mut()
                .insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
        }
    }
}
