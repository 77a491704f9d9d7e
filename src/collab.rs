//! Interfaces of the external collaborators
//!
//! The crate never fetches prices or talks to a language model itself.
//! Callers plug those in through [`MarketDataSource`] and
//! [`NarrativeGenerator`].

use log::debug;
use serde::Serialize;
use serde_json::Value;

use crate::{interval::Interval, summary::Summary, Bar, Result, ZoneError};

/// Historical bars for a (symbol, interval, lookback) request.
///
/// Implementations own ticker mapping, transport and timeouts. Bars must be
/// returned in ascending date order.
pub trait MarketDataSource: Send + Sync {
    fn fetch(&self, symbol: &str, interval: Interval, lookback: &str) -> Result<Vec<Bar>>;
}

/// Turns a prompt plus structured zone data into free text
pub trait NarrativeGenerator {
    fn generate(&self, request: &NarrativeRequest) -> Result<String>;
}

impl<F> NarrativeGenerator for F
where
    F: Fn(&str, &Value) -> Result<String>,
{
    fn generate(&self, request: &NarrativeRequest) -> Result<String> {
        self(&request.prompt(), &request.zones)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

const PERSONA: &str = "You are a financial assistant that analyzes stock price data.";
const CLOSING: &str = "Base your analysis on the data provided.";

/// Role-tagged prompt messages plus the summary they describe
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NarrativeRequest {
    pub messages: Vec<Message>,
    pub zones: Value,
}

impl NarrativeRequest {
    pub fn new(query: Option<&str>, summary: &Summary) -> Result<Self> {
        let zones = serde_json::to_value(summary).map_err(|e| ZoneError::Narrative(e.to_string()))?;
        let pretty =
            serde_json::to_string_pretty(&zones).map_err(|e| ZoneError::Narrative(e.to_string()))?;

        let mut messages = vec![Message::new(Role::System, PERSONA)];
        if let Some(query) = query.map(str::trim).filter(|q| !q.is_empty()) {
            messages.push(Message::new(Role::User, format!("User query: {query}")));
        }
        messages.push(Message::new(
            Role::User,
            format!("Zones for {}:\n{pretty}", summary.source_label),
        ));
        messages.push(Message::new(Role::User, CLOSING));

        Ok(Self { messages, zones })
    }

    /// Messages joined into one prompt text
    pub fn prompt(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Build a request for `summary` and run it through `generator`.
/// An empty answer is an error.
pub fn narrate<G: NarrativeGenerator + ?Sized>(
    generator: &G,
    query: Option<&str>,
    summary: &Summary,
) -> Result<String> {
    let request = NarrativeRequest::new(query, summary)?;
    debug!("narrative request with {} messages", request.messages.len());
    let text = generator.generate(&request)?;
    let text = text.trim();
    if text.is_empty() {
        return Err(ZoneError::Narrative("generator returned no text".into()));
    }
    Ok(text.to_string())
}
