//! Section Model
//!
//! Folds the flat human/bot message history into labeled threads keyed by the
//! column each exchange referenced (`refs.cols[0]`), or `"general"` when there
//! is none. While a request is in flight only the trailing section is touched.

use crate::application::use_cases::sort_deriver::resolve_column;
use crate::domain::query::Column;
use crate::domain::request::{Request, RequestStatus};
use crate::domain::section::{
    ChatMessage, Exchange, MessageRole, Section, SectionGrouping, GENERAL_SECTION_ID,
    GENERAL_SECTION_LABEL,
};
use tracing::{debug, warn};

/// Turns persisted requests into the alternating human/bot message list.
pub fn messages_from_requests(requests: &[Request]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(requests.len() * 2);
    for request in requests {
        let mut human = ChatMessage::human(request.request_text.clone());
        human.request_id = Some(request.request_id.clone());
        human.refs = request.refs.clone();

        let text = match request.status {
            RequestStatus::Error => request.error_text(),
            _ => request.response_text.clone().unwrap_or_default(),
        };
        messages.push(human);
        messages.push(ChatMessage {
            role: MessageRole::Bot,
            text,
            request_id: Some(request.request_id.clone()),
            refs: request.refs.clone(),
            status: Some(request.status),
            query: request.query.clone(),
            linked_session_id: request.linked_session_id.clone(),
            sql: request.sql.clone(),
            csv: request.csv.clone(),
            chart_url: request.chart_url.clone(),
        });
    }
    messages
}

fn section_key(column: Option<&Column>) -> (String, String) {
    match column {
        Some(column) => (column.id.clone(), column.display_name().to_string()),
        None => (
            GENERAL_SECTION_ID.to_string(),
            GENERAL_SECTION_LABEL.to_string(),
        ),
    }
}

#[derive(Debug, Clone, Default)]
pub struct SectionModel {
    sections: Vec<Section>,
}

impl SectionModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds sections from history. With [`SectionGrouping::ByColumn`] every
    /// exchange about the same column joins the section where that column first appeared.
    pub fn from_messages(
        messages: &[ChatMessage],
        columns: &[Column],
        grouping: SectionGrouping,
    ) -> Self {
        let mut model = Self::new();

        for pair in messages.chunks(2) {
            let human = &pair[0];
            if human.role != MessageRole::Human {
                warn!(request_id = ?human.request_id, "History pair does not start with a human message");
            }
            let bot = pair.get(1);

            let referenced = bot
                .and_then(|b| b.refs.primary_column_id())
                .or_else(|| human.refs.primary_column_id());
            let column = referenced.and_then(|id| {
                columns
                    .iter()
                    .find(|c| c.id == id)
                    .or_else(|| resolve_column(id, columns))
            });
            let (id, label) = section_key(column);
            let exchange = Exchange::from_pair(human, bot);

            let existing = match grouping {
                SectionGrouping::ByColumn => model.sections.iter_mut().find(|s| s.id == id),
                SectionGrouping::PerExchange => None,
            };
            match existing {
                Some(section) => section.exchanges.push(exchange),
                None => model.sections.push(Section::new(id, label, exchange)),
            }
        }

        model
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn last(&self) -> Option<&Section> {
        self.sections.last()
    }

    /// Appends a pending trailing section for a fresh submission.
    pub fn begin_exchange(&mut self, user_text: &str, column: Option<&Column>) -> &Section {
        let (id, label) = section_key(column);
        debug!(section_id = %id, "Opening pending section");
        self.sections
            .push(Section::new(id, label, Exchange::pending(user_text)));
        &self.sections[self.sections.len() - 1]
    }

    /// Patches a poll observation into the trailing section only.
    /// Returns false when there is nothing live to patch.
    pub fn apply_observation(&mut self, request: &Request) -> bool {
        match self.sections.last_mut().and_then(Section::latest_mut) {
            Some(exchange) => exchange.observe(request),
            None => false,
        }
    }

    /// Records a terminal response that spawned a linked session.
    /// The section keeps its text; only status and the link are stored.
    pub fn mark_linked(&mut self, request: &Request) -> bool {
        let Some(exchange) = self.sections.last_mut().and_then(Section::latest_mut) else {
            return false;
        };
        if exchange.is_terminal() {
            return false;
        }
        if !request.request_id.is_empty() {
            exchange.request_id = Some(request.request_id.clone());
        }
        exchange.status = Some(request.status);
        exchange.linked_session_id = request.linked_session_id.clone();
        true
    }

    /// Replaces the pending placeholder of the trailing section with an error bubble.
    pub fn fail_last(&mut self, message: &str) -> bool {
        match self.sections.last_mut().and_then(Section::latest_mut) {
            Some(exchange) if !exchange.is_terminal() => {
                exchange.fail(message.to_string());
                true
            }
            _ => false,
        }
    }
}
