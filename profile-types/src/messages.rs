//! Relay protocol messages (the subset a profile resolver needs).
//!
//! Client to relay: `["REQ", <id>, <filter>...]` and `["CLOSE", <id>]`.
//! Relay to client: `["EVENT", <id>, <event>]` and `["EOSE", <id>]`. Every
//! other relay message is surfaced as [`RelayMessage::Other`] so callers can
//! log it and move on.

use serde_json::Value;

use crate::{Event, Filter, SubscriptionId, TypesError};

/// Message sent from client to relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Open a subscription
    Req {
        /// Subscription to open
        subscription_id: SubscriptionId,
        /// Filters (OR-ed by the relay)
        filters: Vec<Filter>,
    },
    /// Cancel a subscription
    Close {
        /// Subscription to cancel
        subscription_id: SubscriptionId,
    },
}

impl ClientMessage {
    /// Serialize to a JSON text frame.
    pub fn to_json(&self) -> Result<String, TypesError> {
        let mut items = Vec::new();
        match self {
            Self::Req {
                subscription_id,
                filters,
            } => {
                items.push(Value::from("REQ"));
                items.push(Value::from(subscription_id.as_str()));
                for filter in filters {
                    items.push(serde_json::to_value(filter)?);
                }
            }
            Self::Close { subscription_id } => {
                items.push(Value::from("CLOSE"));
                items.push(Value::from(subscription_id.as_str()));
            }
        }
        Ok(serde_json::to_string(&Value::Array(items))?)
    }

    /// Parse a JSON text frame (relay side; used by mock and test relays).
    pub fn from_json(text: &str) -> Result<Self, TypesError> {
        let (label, mut rest) = split_frame(text)?;
        let subscription_id = take_subscription_id(&mut rest, &label)?;
        match label.as_str() {
            "REQ" => {
                let filters = rest
                    .map(serde_json::from_value)
                    .collect::<Result<Vec<Filter>, _>>()?;
                Ok(Self::Req {
                    subscription_id,
                    filters,
                })
            }
            "CLOSE" => Ok(Self::Close { subscription_id }),
            other => Err(TypesError::InvalidMessage(format!(
                "unknown client message: {}",
                other
            ))),
        }
    }
}

/// Message received from a relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMessage {
    /// An event matching a subscription
    Event {
        /// Subscription the event belongs to
        subscription_id: SubscriptionId,
        /// The raw event
        event: Event,
    },
    /// End of stored events for a subscription
    EndOfStoredEvents {
        /// Subscription that reached the end of stored events
        subscription_id: SubscriptionId,
    },
    /// Any other relay message (NOTICE, CLOSED, OK, AUTH, ...)
    Other {
        /// Message label, e.g. "NOTICE"
        label: String,
    },
}

impl RelayMessage {
    /// Parse a JSON text frame.
    pub fn from_json(text: &str) -> Result<Self, TypesError> {
        let (label, mut rest) = split_frame(text)?;
        match label.as_str() {
            "EVENT" => {
                let subscription_id = take_subscription_id(&mut rest, &label)?;
                let event = rest
                    .next()
                    .ok_or_else(|| TypesError::InvalidMessage("EVENT without event".into()))?;
                Ok(Self::Event {
                    subscription_id,
                    event: serde_json::from_value(event)?,
                })
            }
            "EOSE" => Ok(Self::EndOfStoredEvents {
                subscription_id: take_subscription_id(&mut rest, &label)?,
            }),
            _ => Ok(Self::Other { label }),
        }
    }

    /// Serialize to a JSON text frame (relay side; used by mock and test relays).
    pub fn to_json(&self) -> Result<String, TypesError> {
        let value = match self {
            Self::Event {
                subscription_id,
                event,
            } => Value::Array(vec![
                Value::from("EVENT"),
                Value::from(subscription_id.as_str()),
                serde_json::to_value(event)?,
            ]),
            Self::EndOfStoredEvents { subscription_id } => Value::Array(vec![
                Value::from("EOSE"),
                Value::from(subscription_id.as_str()),
            ]),
            Self::Other { label } => Value::Array(vec![Value::from(label.as_str())]),
        };
        Ok(serde_json::to_string(&value)?)
    }

    /// Subscription this message refers to, if any.
    pub fn subscription_id(&self) -> Option<&SubscriptionId> {
        match self {
            Self::Event {
                subscription_id, ..
            }
            | Self::EndOfStoredEvents { subscription_id } => Some(subscription_id),
            Self::Other { .. } => None,
        }
    }
}

/// Split a frame into its label and the remaining array items.
fn split_frame(text: &str) -> Result<(String, std::vec::IntoIter<Value>), TypesError> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Array(items) = value else {
        return Err(TypesError::InvalidMessage("expected a JSON array".into()));
    };
    let mut items = items.into_iter();
    let label = match items.next() {
        Some(Value::String(label)) => label,
        _ => {
            return Err(TypesError::InvalidMessage(
                "first element must be a string label".into(),
            ))
        }
    };
    Ok((label, items))
}

fn take_subscription_id(
    rest: &mut std::vec::IntoIter<Value>,
    label: &str,
) -> Result<SubscriptionId, TypesError> {
    match rest.next() {
        Some(Value::String(id)) => Ok(SubscriptionId::new(id)),
        _ => Err(TypesError::InvalidMessage(format!(
            "{} without subscription id",
            label
        ))),
    }
}
