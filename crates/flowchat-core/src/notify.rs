//! Operator-facing alerts.

use serde::{Deserialize, Serialize};

/// Title shown above unresolved validation defects.
pub const MISSING_FIELDS_TITLE: &str = "Oops! Looks like you missed some required information:";

/// Title shown when the compose buffer is empty.
pub const SEND_ERROR_TITLE: &str = "Error sending message";

/// Sole list item for an empty compose buffer.
pub const EMPTY_MESSAGE: &str = "The message cannot be empty.";

/// Advisory for a node whose template cannot be inspected.
pub const NODE_ISSUE_NOTICE: &str = "We've noticed a potential issue with a node in the flow. \
Please review it and, if necessary, submit a bug report with your exported flow file. \
Thank you for your help!";

/// Something the operator should see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Alert {
    /// Blocking error with a titled list of reasons.
    Error { title: String, list: Vec<String> },
    /// Non-blocking advisory.
    Notice { title: String },
    /// The duplex channel failed.
    ChannelFailure { message: String },
}

impl Alert {
    /// Titled error list.
    #[must_use]
    pub fn error(title: impl Into<String>, list: Vec<String>) -> Self {
        Self::Error {
            title: title.into(),
            list,
        }
    }

    /// Advisory notice.
    #[must_use]
    pub fn notice(title: impl Into<String>) -> Self {
        Self::Notice {
            title: title.into(),
        }
    }
}

/// Sink for operator alerts.
///
/// Implement this trait to route alerts into your UI.
pub trait Notifier: Send + Sync {
    /// Surface an alert.
    fn notify(&self, alert: Alert);
}

/// Notifier that only logs.
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, alert: Alert) {
        match alert {
            Alert::Error { title, list } => tracing::warn!(?list, "{title}"),
            Alert::Notice { title } => tracing::info!("{title}"),
            Alert::ChannelFailure { message } => tracing::error!("channel failure: {message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_serialization() {
        let alert = Alert::error(SEND_ERROR_TITLE, vec![EMPTY_MESSAGE.to_string()]);
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["kind"], "error");
        assert_eq!(json["list"][0], EMPTY_MESSAGE);
    }
}
