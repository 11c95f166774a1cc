//! Quick-action tokens offered under bot replies.
//!
//! A token resolves to the text sent on the user's behalf. Resolution is pure;
//! the widget pushes the result through the normal send path.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Ticket priority, offered as quick actions during ticket creation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// `Low`.
    Low,
    /// `Medium`.
    Medium,
    /// `High`.
    High,
    /// `Urgent`.
    Urgent,
}

impl Priority {
    /// Lower-case literal sent to the assistant.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    /// Match a label, ignoring case.
    #[must_use]
    pub fn from_label(token: &str) -> Option<Self> {
        [Self::Low, Self::Medium, Self::High, Self::Urgent]
            .into_iter()
            .find(|p| token.eq_ignore_ascii_case(p.as_str()))
    }
}

/// A parsed quick-action token.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum QuickAction {
    /// `Create Ticket` or `Create Another Ticket`.
    CreateTicket,
    /// `Check Status`.
    CheckStatus,
    /// `Contact Support`.
    ContactSupport,
    /// `FAQ`.
    Faq,
    /// One of the priority buttons.
    Priority(Priority),
    /// Any other token; sent verbatim.
    Other(String),
}

impl QuickAction {
    /// Classify a token. Labels match exactly; priorities ignore case.
    #[must_use]
    pub fn parse(token: &str) -> Self {
        match token {
            "Create Ticket" | "Create Another Ticket" => Self::CreateTicket,
            "Check Status" => Self::CheckStatus,
            "Contact Support" => Self::ContactSupport,
            "FAQ" => Self::Faq,
            other => Priority::from_label(other).map_or_else(|| Self::Other(other.to_string()), Self::Priority),
        }
    }

    /// Text sent when the action is triggered.
    #[must_use]
    pub fn outbound_text(&self) -> &str {
        match self {
            Self::CreateTicket => "create ticket",
            Self::CheckStatus => "Show all my open tickets",
            Self::ContactSupport => "I want to speak with a technician",
            Self::Faq => "What are common support questions?",
            Self::Priority(priority) => priority.as_str(),
            Self::Other(text) => text,
        }
    }
}

impl fmt::Display for QuickAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.outbound_text())
    }
}

/// Resolve a token straight to its outbound text.
#[must_use]
pub fn resolve(token: &str) -> String {
    QuickAction::parse(token).outbound_text().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_labels() {
        assert_eq!(resolve("Create Ticket"), "create ticket");
        assert_eq!(resolve("Create Another Ticket"), "create ticket");
        assert_eq!(resolve("Check Status"), "Show all my open tickets");
        assert_eq!(resolve("Contact Support"), "I want to speak with a technician");
        assert_eq!(resolve("FAQ"), "What are common support questions?");
    }

    #[test]
    fn test_priorities_ignore_case() {
        assert_eq!(resolve("High"), "high");
        assert_eq!(resolve("URGENT"), "urgent");
        assert_eq!(resolve("medium"), "medium");
        assert_eq!(QuickAction::parse("Low"), QuickAction::Priority(Priority::Low));
    }

    #[test]
    fn test_unknown_tokens_pass_through() {
        assert_eq!(resolve("View ticket #12"), "View ticket #12");
        assert_eq!(resolve("check status"), "check status");
        assert_eq!(resolve("Highest"), "Highest");
    }
}
