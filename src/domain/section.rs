use crate::domain::query::Query;
use crate::domain::request::{Refs, Request, RequestStatus};
use serde::{Deserialize, Serialize};

pub const GENERAL_SECTION_ID: &str = "general";
pub const GENERAL_SECTION_LABEL: &str = "General";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    Human,
    Bot,
}

/// One side of a request/response pair in the flat chat history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub text: String,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub refs: Refs,
    #[serde(default)]
    pub status: Option<RequestStatus>,
    #[serde(default)]
    pub query: Option<Query>,
    #[serde(default)]
    pub linked_session_id: Option<String>,
    #[serde(default)]
    pub sql: Option<String>,
    #[serde(default)]
    pub csv: Option<String>,
    #[serde(default)]
    pub chart_url: Option<String>,
}

impl ChatMessage {
    pub fn human(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Human,
            text: text.into(),
            request_id: None,
            refs: Refs::default(),
            status: None,
            query: None,
            linked_session_id: None,
            sql: None,
            csv: None,
            chart_url: None,
        }
    }
}

/// How exchanges targeting the same column are grouped when history is folded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionGrouping {
    /// All exchanges about one column coalesce into a single growing section.
    #[default]
    ByColumn,
    /// Every exchange is its own section.
    PerExchange,
}

/// A single request/response pair inside a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub request_id: Option<String>,
    pub user_text: String,
    pub bot_text: String,
    pub status: Option<RequestStatus>,
    pub sql: Option<String>,
    pub csv: Option<String>,
    pub chart_url: Option<String>,
    query: Option<Query>,
    pub linked_session_id: Option<String>,
}

impl Exchange {
    pub fn pending(user_text: impl Into<String>) -> Self {
        Self {
            request_id: None,
            user_text: user_text.into(),
            bot_text: String::new(),
            status: None,
            sql: None,
            csv: None,
            chart_url: None,
            query: None,
            linked_session_id: None,
        }
    }

    pub(crate) fn from_pair(human: &ChatMessage, bot: Option<&ChatMessage>) -> Self {
        let mut exchange = Exchange::pending(human.text.clone());
        if let Some(bot) = bot {
            exchange.request_id = bot.request_id.clone().or_else(|| human.request_id.clone());
            exchange.bot_text = bot.text.clone();
            exchange.status = bot.status;
            exchange.query = bot.query.clone();
            exchange.sql = bot
                .sql
                .clone()
                .or_else(|| bot.query.as_ref().map(|q| q.sql.clone()));
            exchange.csv = bot.csv.clone();
            exchange.chart_url = bot.chart_url.clone();
            exchange.linked_session_id = bot.linked_session_id.clone();
        }
        exchange
    }

    pub fn query(&self) -> Option<&Query> {
        self.query.as_ref()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.map_or(false, RequestStatus::is_terminal)
    }

    /// Patches in a poll observation. Returns false once the exchange is frozen.
    pub(crate) fn observe(&mut self, request: &Request) -> bool {
        if self.is_terminal() {
            return false;
        }
        if !request.request_id.is_empty() {
            self.request_id = Some(request.request_id.clone());
        }
        self.status = Some(request.status);
        if let Some(text) = &request.response_text {
            self.bot_text = text.clone();
        }
        if request.sql.is_some() {
            self.sql = request.sql.clone();
        }
        if request.csv.is_some() {
            self.csv = request.csv.clone();
        }
        if request.chart_url.is_some() {
            self.chart_url = request.chart_url.clone();
        }
        if self.query.is_none() && request.status == RequestStatus::Done {
            self.query = request.query.clone();
        }
        if request.linked_session_id.is_some() {
            self.linked_session_id = request.linked_session_id.clone();
        }
        true
    }

    pub(crate) fn fail(&mut self, message: String) {
        self.status = Some(RequestStatus::Error);
        self.bot_text = message;
    }
}

/// A labeled thread of exchanges scoped to one column or to `"general"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub label: String,
    pub exchanges: Vec<Exchange>,
}

impl Section {
    pub fn new(id: impl Into<String>, label: impl Into<String>, exchange: Exchange) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            exchanges: vec![exchange],
        }
    }

    pub fn is_general(&self) -> bool {
        self.id == GENERAL_SECTION_ID
    }

    pub fn latest(&self) -> Option<&Exchange> {
        self.exchanges.last()
    }

    pub(crate) fn latest_mut(&mut self) -> Option<&mut Exchange> {
        self.exchanges.last_mut()
    }

    pub fn request_id(&self) -> Option<&str> {
        self.latest()?.request_id.as_deref()
    }

    pub fn status(&self) -> Option<RequestStatus> {
        self.latest()?.status
    }

    pub fn query(&self) -> Option<&Query> {
        self.latest()?.query()
    }

    pub fn linked_session(&self) -> Option<&str> {
        self.latest()?.linked_session_id.as_deref()
    }

    /// `(user_text, bot_text)` of the latest exchange.
    pub fn chat(&self) -> Option<(&str, &str)> {
        self.latest()
            .map(|e| (e.user_text.as_str(), e.bot_text.as_str()))
    }

    pub fn is_pending(&self) -> bool {
        self.latest().map_or(false, |e| !e.is_terminal())
    }
}
