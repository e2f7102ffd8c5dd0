//! Messages exchanged between the dispatcher and its execution units.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::Event;
use crate::feature::Feature;
use crate::Error;

/// One event handed to a unit, tagged with its correlation token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireRequest {
    pub token: Uuid,
    pub event: Event,
}

/// Classifier failure carried back across the unit boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum WireError {
    InvalidEvent,
    Failed { message: String },
}

impl WireError {
    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::InvalidEvent { .. } => WireError::InvalidEvent,
            other => WireError::Failed {
                message: other.to_string(),
            },
        }
    }

    /// Rebuild the caller-facing error for `event_id`.
    pub fn into_error(self, event_id: &str) -> Error {
        match self {
            WireError::InvalidEvent => Error::InvalidEvent {
                event_id: (!event_id.is_empty()).then(|| event_id.to_string()),
            },
            WireError::Failed { message } => Error::Classifier {
                event_id: event_id.to_string(),
                message,
            },
        }
    }
}

/// Outcome of one request. `feature` is `None` when the event was skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireResponse {
    pub token: Uuid,
    pub feature: Option<Feature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WireError>,
}

impl WireResponse {
    pub fn from_outcome(token: Uuid, outcome: Result<Option<Feature>, Error>) -> Self {
        match outcome {
            Ok(feature) => Self {
                token,
                feature,
                error: None,
            },
            Err(err) => Self {
                token,
                feature: None,
                error: Some(WireError::from_error(&err)),
            },
        }
    }

    pub fn into_outcome(self, event_id: &str) -> Result<Option<Feature>, Error> {
        match self.error {
            Some(err) => Err(err.into_error(event_id)),
            None => Ok(self.feature),
        }
    }
}

/// Everything a unit can report back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UnitMessage {
    Response(WireResponse),
    /// The unit failed outside the classifier's error path. `token` names
    /// the affected request when the unit knows it.
    Fault {
        token: Option<Uuid>,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_event_survives_the_boundary() {
        let token = Uuid::new_v4();
        let response = WireResponse::from_outcome(
            token,
            Err(Error::InvalidEvent {
                event_id: Some("abc".into()),
            }),
        );
        assert_eq!(response.error, Some(WireError::InvalidEvent));

        let err = response.into_outcome("abc").unwrap_err();
        assert!(matches!(err, Error::InvalidEvent { .. }));
        assert_eq!(err.event_id(), Some("abc"));
    }

    #[test]
    fn test_other_errors_become_classifier_errors() {
        let response = WireResponse::from_outcome(Uuid::new_v4(), Err(Error::Config("bad".into())));
        match response.into_outcome("evt").unwrap_err() {
            Error::Classifier { event_id, message } => {
                assert_eq!(event_id, "evt");
                assert!(message.contains("bad"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_message_json() {
        let token = Uuid::new_v4();
        let fault = UnitMessage::Fault {
            token: None,
            reason: "boom".into(),
        };
        let json = serde_json::to_value(&fault).unwrap();
        assert_eq!(json["type"], "fault");

        let response = UnitMessage::Response(WireResponse::from_outcome(token, Ok(None)));
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("error"));
        let back: UnitMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, response);
    }
}
