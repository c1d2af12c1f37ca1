//! Conversion between persisted session rows and transcript messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::SessionLoadError;
use super::message::Message;

/// How the first row of a session payload is treated.
///
/// The backend writes a `{ title, date }` header as row 0 of every session
/// file and returns it along with the exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HistoryLayout {
    #[default]
    HeaderRow,
    PairsOnly,
}

impl HistoryLayout {
    pub fn from_header_flag(header_row: bool) -> Self {
        if header_row {
            HistoryLayout::HeaderRow
        } else {
            HistoryLayout::PairsOnly
        }
    }
}

/// Row 0 of a session file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SessionHeader {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

/// One persisted question/answer pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub query: String,
    pub response: String,
}

impl Exchange {
    pub fn new(query: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            response: response.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionRecords {
    pub header: Option<SessionHeader>,
    pub exchanges: Vec<Exchange>,
}

impl SessionRecords {
    /// Split the raw `/api/choose_chat_history` array.
    ///
    /// With [`HistoryLayout::HeaderRow`] row 0 is never read as an exchange;
    /// if it does not look like a header it is ignored. Every later row must
    /// be a `{ query, response }` object.
    pub fn from_rows(rows: Vec<Value>, layout: HistoryLayout) -> Result<Self, SessionLoadError> {
        let mut rows = rows.into_iter().enumerate();

        let header = match layout {
            HistoryLayout::HeaderRow => rows
                .next()
                .and_then(|(_, row)| serde_json::from_value::<SessionHeader>(row).ok()),
            HistoryLayout::PairsOnly => None,
        };

        let exchanges = rows
            .map(|(index, row)| {
                serde_json::from_value::<Exchange>(row).map_err(|source| {
                    SessionLoadError::Malformed {
                        index,
                        detail: source.to_string(),
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { header, exchanges })
    }

    pub fn title(&self) -> Option<&str> {
        self.header.as_ref().and_then(|header| header.title.as_deref())
    }

    pub fn to_messages(&self) -> Vec<Message> {
        pairs_to_messages(&self.exchanges)
    }
}

/// Two messages per exchange, user first, ids counting up from 1.
pub fn pairs_to_messages(exchanges: &[Exchange]) -> Vec<Message> {
    let mut messages = Vec::with_capacity(exchanges.len() * 2);
    let mut next_id = 1;
    for exchange in exchanges {
        messages.push(Message::user(next_id, exchange.query.clone()));
        messages.push(Message::bot(next_id + 1, exchange.response.clone()));
        next_id += 2;
    }
    messages
}

/// What a successful session load reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub handle: String,
    pub title: Option<String>,
    pub exchanges: usize,
}
