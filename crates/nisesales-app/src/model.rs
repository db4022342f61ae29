// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::ids::*;

/// Placeholder stored in text fields the user left blank on import.
pub const UNSET_LABEL: &str = "未設定";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProspectScore {
    S,
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    Z,
}

impl ProspectScore {
    pub const ALL: [Self; 9] = [
        Self::S,
        Self::A,
        Self::B,
        Self::C,
        Self::D,
        Self::E,
        Self::F,
        Self::G,
        Self::Z,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::S => "S",
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::E => "E",
            Self::F => "F",
            Self::G => "G",
            Self::Z => "Z",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "S" => Some(Self::S),
            "A" => Some(Self::A),
            "B" => Some(Self::B),
            "C" => Some(Self::C),
            "D" => Some(Self::D),
            "E" => Some(Self::E),
            "F" => Some(Self::F),
            "G" => Some(Self::G),
            "Z" => Some(Self::Z),
            _ => None,
        }
    }

    /// Scores from the five-step numeric scale used before letter ranks.
    pub const fn from_legacy_rank(rank: u8) -> Option<Self> {
        match rank {
            1 => Some(Self::E),
            2 => Some(Self::D),
            3 => Some(Self::C),
            4 => Some(Self::A),
            5 => Some(Self::S),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityKind {
    Phone,
    Email,
    Negotiation,
    Visit,
    Other,
}

impl ActivityKind {
    /// Kinds offered when logging a new activity. `Visit` and `Other` only
    /// appear on older records.
    pub const CURRENT: [Self; 3] = [Self::Negotiation, Self::Email, Self::Phone];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Phone => "phone",
            Self::Email => "email",
            Self::Negotiation => "negotiation",
            Self::Visit => "visit",
            Self::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "phone" => Some(Self::Phone),
            "email" => Some(Self::Email),
            "negotiation" => Some(Self::Negotiation),
            "visit" => Some(Self::Visit),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Phone => "電話",
            Self::Email => "メール",
            Self::Negotiation => "商談",
            Self::Visit => "訪問",
            Self::Other => "その他",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NegotiationOutcome {
    Failed,
    NextProposal,
    Consideration,
    InternalSharing,
    TrialContract,
    Contract,
    OpinionExchange,
}

impl NegotiationOutcome {
    pub const ALL: [Self; 7] = [
        Self::Failed,
        Self::NextProposal,
        Self::Consideration,
        Self::InternalSharing,
        Self::TrialContract,
        Self::Contract,
        Self::OpinionExchange,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Failed => "failed",
            Self::NextProposal => "next_proposal",
            Self::Consideration => "consideration",
            Self::InternalSharing => "internal_sharing",
            Self::TrialContract => "trial_contract",
            Self::Contract => "contract",
            Self::OpinionExchange => "opinion_exchange",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "failed" => Some(Self::Failed),
            "next_proposal" => Some(Self::NextProposal),
            "consideration" => Some(Self::Consideration),
            "internal_sharing" => Some(Self::InternalSharing),
            "trial_contract" => Some(Self::TrialContract),
            "contract" => Some(Self::Contract),
            "opinion_exchange" => Some(Self::OpinionExchange),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Failed => "失注",
            Self::NextProposal => "次回提案",
            Self::Consideration => "検討中",
            Self::InternalSharing => "社内共有",
            Self::TrialContract => "トライアル契約",
            Self::Contract => "契約",
            Self::OpinionExchange => "意見交換",
        }
    }
}

/// Whether a company has had at least one negotiation logged against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NegotiationState {
    Met,
    NotMet,
}

impl NegotiationState {
    pub const ALL: [Self; 2] = [Self::Met, Self::NotMet];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Met => "商談済み",
            Self::NotMet => "未商談",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewMode {
    ByList,
    ByRepresentative,
}

impl ViewMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ByList => "list",
            Self::ByRepresentative => "representative",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "list" => Some(Self::ByList),
            "representative" => Some(Self::ByRepresentative),
            _ => None,
        }
    }

    pub const fn toggled(self) -> Self {
        match self {
            Self::ByList => Self::ByRepresentative,
            Self::ByRepresentative => Self::ByList,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListTab {
    All,
    Unassigned,
    Met,
    NotMet,
    List(ListId),
}

impl ListTab {
    /// Virtual tabs are computed from activity data and never persisted.
    pub const fn is_virtual(self) -> bool {
        matches!(self, Self::Met | Self::NotMet)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RepresentativeTab {
    All,
    Representative(RepresentativeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActiveTab {
    List(ListTab),
    Representative(RepresentativeTab),
}

impl ActiveTab {
    pub const fn view_mode(self) -> ViewMode {
        match self {
            Self::List(_) => ViewMode::ByList,
            Self::Representative(_) => ViewMode::ByRepresentative,
        }
    }

    pub const fn all_for(mode: ViewMode) -> Self {
        match mode {
            ViewMode::ByList => Self::List(ListTab::All),
            ViewMode::ByRepresentative => Self::Representative(RepresentativeTab::All),
        }
    }
}

impl Default for ActiveTab {
    fn default() -> Self {
        Self::List(ListTab::All)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    pub contact_person: String,
    pub department: String,
    pub position: String,
    pub email: String,
    pub phone_number: String,
    pub representative_id: RepresentativeId,
    pub list_id: Option<ListId>,
    pub prospect_score: Option<ProspectScore>,
    pub memo: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Representative {
    pub id: RepresentativeId,
    pub name: String,
    pub email: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyList {
    pub id: ListId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub company_id: CompanyId,
    pub date: Date,
    pub kind: ActivityKind,
    pub title: String,
    pub content: String,
    pub amount_yen: Option<i64>,
    pub probability: Option<u8>,
    pub outcome: Option<NegotiationOutcome>,
    pub next_action: Option<String>,
    pub next_action_date: Option<Date>,
    pub appointment_secured: Option<bool>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}
