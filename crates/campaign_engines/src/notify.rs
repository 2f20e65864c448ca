#![forbid(unsafe_code)]

use std::fmt::Debug;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;
use thiserror::Error;
use tracing::warn;

const SENDGRID_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";
const SENDGRID_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    #[error("{provider} rejected delivery with http {status}")]
    Rejected { provider: &'static str, status: u16 },
    #[error("{provider} transport failure: {kind}")]
    Transport {
        provider: &'static str,
        kind: &'static str,
    },
}

/// Delivery channel for one-time codes.
pub trait CodeNotifier: Debug + Send + Sync {
    fn deliver(&self, identity: &str, code: &str) -> Result<(), NotifyError>;
}

/// Development channel: writes the code to the log instead of sending it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl CodeNotifier for LogNotifier {
    fn deliver(&self, identity: &str, code: &str) -> Result<(), NotifyError> {
        warn!(
            identity,
            code, "log notifier in use; one-time code written to log instead of email"
        );
        Ok(())
    }
}

/// Sends codes through the SendGrid v3 mail API.
#[derive(Debug, Clone)]
pub struct SendGridNotifier {
    agent: ureq::Agent,
    api_key: String,
    from_address: String,
}

impl SendGridNotifier {
    pub fn new(api_key: String, from_address: String) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(SENDGRID_TIMEOUT)
            .timeout_read(SENDGRID_TIMEOUT)
            .timeout_write(SENDGRID_TIMEOUT)
            .user_agent("campaign-intake/0.1")
            .build();
        Self {
            agent,
            api_key,
            from_address,
        }
    }

    fn message_body(&self, identity: &str, code: &str) -> serde_json::Value {
        json!({
            "personalizations": [{ "to": [{ "email": identity }] }],
            "from": { "email": self.from_address },
            "subject": "Your campaign admin login code",
            "content": [{
                "type": "text/plain",
                "value": format!("Your one-time login code is {code}. It expires shortly."),
            }],
        })
    }
}

impl CodeNotifier for SendGridNotifier {
    fn deliver(&self, identity: &str, code: &str) -> Result<(), NotifyError> {
        let result = self
            .agent
            .post(SENDGRID_ENDPOINT)
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(self.message_body(identity, code));
        match result {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(status, _)) => Err(NotifyError::Rejected {
                provider: "sendgrid",
                status,
            }),
            Err(ureq::Error::Transport(transport)) => Err(NotifyError::Transport {
                provider: "sendgrid",
                kind: classify_transport(&transport),
            }),
        }
    }
}

fn classify_transport(transport: &ureq::Transport) -> &'static str {
    let lower = format!("{:?} {}", transport.kind(), transport).to_ascii_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        "timeout"
    } else if lower.contains("tls") || lower.contains("ssl") {
        "tls"
    } else if lower.contains("dns") {
        "dns"
    } else {
        "network"
    }
}

/// Keeps delivered codes in memory; used by tests and local tooling.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    delivered: Mutex<Vec<(String, String)>>,
    fail_deliveries: bool,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records every code but reports each delivery as failed.
    pub fn failing() -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
            fail_deliveries: true,
        }
    }

    pub fn last_code_for(&self, identity: &str) -> Option<String> {
        self.delivered
            .lock()
            .iter()
            .rev()
            .find(|(who, _)| who == identity)
            .map(|(_, code)| code.clone())
    }

    pub fn delivery_count(&self) -> usize {
        self.delivered.lock().len()
    }
}

impl CodeNotifier for MemoryNotifier {
    fn deliver(&self, identity: &str, code: &str) -> Result<(), NotifyError> {
        self.delivered
            .lock()
            .push((identity.to_string(), code.to_string()));
        if self.fail_deliveries {
            return Err(NotifyError::Transport {
                provider: "memory",
                kind: "network",
            });
        }
        Ok(())
    }
}
