use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
    http::header,
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use validator::Validate;

use crate::error::ApiError;

/// An uploaded avatar image, raw as received.
pub struct IconUpload {
    pub bytes: Vec<u8>,
}

/// Body extractor for the icon-bearing endpoints. Accepts either a JSON
/// document or a `multipart/form-data` body whose optional `icon` part is
/// the image and whose remaining parts are treated as string fields
/// ("true"/"false" coerced back to booleans so flag fields deserialize).
pub struct BodyWithIcon<T>(pub T, pub Option<IconUpload>);

#[async_trait]
impl<S, T> FromRequest<S> for BodyWithIcon<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if !is_multipart {
            let Json(body) = Json::<T>::from_request(req, state)
                .await
                .map_err(|err| ApiError::bad_request(err.to_string()))?;
            return Ok(Self(body, None));
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|err| ApiError::bad_request(err.to_string()))?;

        let mut fields = Map::new();
        let mut icon = None;
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|err| ApiError::bad_request(err.to_string()))?
        {
            match field.name().map(str::to_owned) {
                Some(name) if name == "icon" => {
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|err| ApiError::bad_request(err.to_string()))?;
                    icon = Some(IconUpload {
                        bytes: bytes.to_vec(),
                    });
                }
                Some(name) => {
                    let text = field
                        .text()
                        .await
                        .map_err(|err| ApiError::bad_request(err.to_string()))?;
                    fields.insert(name, coerce_form_value(text));
                }
                None => {}
            }
        }

        let body = serde_json::from_value(Value::Object(fields))
            .map_err(|err| ApiError::bad_request(format!("invalid form body: {err}")))?;
        Ok(Self(body, icon))
    }
}

/// Multipart fields arrive as text; map the boolean literals back so typed
/// fields round-trip. Everything else stays a string.
fn coerce_form_value(text: String) -> Value {
    match text.as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(text),
    }
}

/// Run the declared field checks on a request body, collecting every
/// violation into one message list, the way the old JSON-schema layer
/// reported them.
pub fn validate_body<T: Validate>(body: &T) -> Result<(), ApiError> {
    body.validate().map_err(|errs| {
        let mut messages: Vec<String> = errs
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors
                    .iter()
                    .map(move |err| match &err.message {
                        Some(msg) => format!("{field}: {msg}"),
                        None => format!("{field}: invalid value ({})", err.code),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        messages.sort();
        ApiError::validation(messages)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Probe {
        #[validate(length(min = 1, max = 30, message = "length out of range"))]
        username: String,
        #[validate(email(message = "invalid email"))]
        email: String,
    }

    #[test]
    fn collects_every_violation_message() {
        let probe = Probe {
            username: String::new(),
            email: "nope".to_string(),
        };
        let err = validate_body(&probe).unwrap_err();
        match err {
            ApiError::Validation(messages) => {
                assert_eq!(messages.len(), 2);
                assert!(messages.iter().any(|m| m.contains("username")));
                assert!(messages.iter().any(|m| m.contains("email")));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn valid_bodies_pass() {
        let probe = Probe {
            username: "lilly".to_string(),
            email: "lilly@example.com".to_string(),
        };
        assert!(validate_body(&probe).is_ok());
    }

    #[test]
    fn boolean_literals_are_coerced() {
        assert_eq!(coerce_form_value("true".to_string()), Value::Bool(true));
        assert_eq!(coerce_form_value("false".to_string()), Value::Bool(false));
        assert_eq!(
            coerce_form_value("truthy".to_string()),
            Value::String("truthy".to_string())
        );
    }
}
