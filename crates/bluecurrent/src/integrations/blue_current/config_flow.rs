//! Setup wizard producing a [`BlueCurrentConfig`].
//!
//! The `user` step takes an API token, validates it and identifies the account by its
//! e-mail address. Entering a token for an account that is already set up re-authenticates
//! that entry instead of adding a second one. The optional `card` step picks the charge card
//! used to start sessions.

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use tracing::error;
use tracing::info;

use super::client::BlueCurrentClient;
use super::client::ChargeCard;
use super::client::ClientError;
use crate::config::BlueCurrentConfig;

const TITLE_LEN: usize = 5;

/// Error shown on a form, keyed by its translation string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::IntoStaticStr, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FlowError {
    CannotConnect,
    LimitReached,
    AlreadyConnected,
    InvalidToken,
    NoCardsFound,
    Unknown,
}

impl From<&ClientError> for FlowError {
    fn from(err: &ClientError) -> Self {
        match err {
            ClientError::Websocket(_) | ClientError::ConnectionClosed => FlowError::CannotConnect,
            ClientError::RequestLimitReached => FlowError::LimitReached,
            ClientError::AlreadyConnected => FlowError::AlreadyConnected,
            ClientError::InvalidApiToken => FlowError::InvalidToken,
            ClientError::NoCardsFound => FlowError::NoCardsFound,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AbortReason {
    AlreadyConfigured,
    ReauthSuccessful,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Step {
    User,
    Card,
}

/// Input of the `user` step.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserInput {
    pub api_token: String,

    #[serde(default)]
    pub add_card: bool,
}

/// Input of the `card` step: the name of the selected card.
#[derive(Debug, Clone, Deserialize)]
pub struct CardInput {
    pub card: String,
}

/// A configured account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigEntry {
    /// Account e-mail address
    pub unique_id: String,
    pub title: String,
    pub data: BlueCurrentConfig,
}

/// Outcome of a flow step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowResult {
    Form {
        step_id: Step,
        error: Option<FlowError>,
        /// Selectable card names on the `card` step
        cards: Vec<String>,
    },
    CreateEntry(ConfigEntry),
    Abort {
        reason: AbortReason,
    },
}

impl FlowResult {
    fn form(step_id: Step, error: Option<FlowError>) -> Self {
        FlowResult::Form {
            step_id,
            error,
            cards: Vec::new(),
        }
    }
}

/// Entries created so far.
#[derive(Debug, Clone, Default)]
pub struct ConfigEntries {
    entries: Vec<ConfigEntry>,
}

impl ConfigEntries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entry: ConfigEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ConfigEntry] {
        &self.entries
    }

    fn has_token(&self, api_token: &str) -> bool {
        self.entries.iter().any(|e| e.data.api_token == api_token)
    }

    fn by_unique_id(&mut self, unique_id: &str) -> Option<&mut ConfigEntry> {
        self.entries.iter_mut().find(|e| e.unique_id == unique_id)
    }
}

fn title(api_token: &str) -> String {
    api_token.chars().take(TITLE_LEN).collect()
}

/// One run of the setup wizard.
pub struct ConfigFlow {
    client: Arc<dyn BlueCurrentClient>,
    unique_id: Option<String>,
    api_token: Option<String>,
    cards: Vec<ChargeCard>,
}

impl ConfigFlow {
    pub fn new(client: Arc<dyn BlueCurrentClient>) -> Self {
        Self {
            client,
            unique_id: None,
            api_token: None,
            cards: Vec::new(),
        }
    }

    /// Token entry. Without input the empty form is shown.
    pub async fn step_user(
        &mut self,
        entries: &mut ConfigEntries,
        input: Option<UserInput>,
    ) -> FlowResult {
        let Some(input) = input else {
            return FlowResult::form(Step::User, None);
        };

        if entries.has_token(&input.api_token) {
            return FlowResult::Abort {
                reason: AbortReason::AlreadyConfigured,
            };
        }

        let email = match self.validate(&input.api_token).await {
            Ok(email) => email,
            Err(err) => return FlowResult::form(Step::User, Some(err)),
        };

        if let Some(entry) = entries.by_unique_id(&email) {
            entry.data.api_token = input.api_token.clone();
            entry.title = title(&input.api_token);
            info!("Updated the API token of {}", email);
            return FlowResult::Abort {
                reason: AbortReason::ReauthSuccessful,
            };
        }

        self.unique_id = Some(email);
        self.api_token = Some(input.api_token);

        if input.add_card {
            return self.step_card(None).await;
        }
        self.create_entry(crate::config::DEFAULT_CARD)
    }

    /// Card selection. Without input the card form is shown.
    pub async fn step_card(&mut self, input: Option<CardInput>) -> FlowResult {
        if self.api_token.is_none() {
            return FlowResult::form(Step::User, None);
        }

        let cards = match self.client.get_charge_cards().await {
            Ok(cards) => cards,
            Err(e) => {
                error!("Failed to fetch charge cards: {}", e);
                return FlowResult::form(Step::User, Some(FlowError::from(&e)));
            }
        };
        self.cards = cards;

        let Some(input) = input else {
            return FlowResult::Form {
                step_id: Step::Card,
                error: None,
                cards: self.cards.iter().map(|c| c.name.clone()).collect(),
            };
        };

        match self.cards.iter().find(|c| c.name == input.card) {
            Some(card) => {
                let uid = card.uid.clone();
                self.create_entry(&uid)
            }
            None => FlowResult::Form {
                step_id: Step::Card,
                error: Some(FlowError::Unknown),
                cards: self.cards.iter().map(|c| c.name.clone()).collect(),
            },
        }
    }

    /// Re-authentication starts over at the token entry.
    pub async fn step_reauth(&mut self, entries: &mut ConfigEntries) -> FlowResult {
        self.step_user(entries, None).await
    }

    async fn validate(&self, api_token: &str) -> Result<String, FlowError> {
        let result: Result<String, ClientError> = async {
            if !self.client.validate_api_token(api_token).await? {
                return Err(ClientError::InvalidApiToken);
            }
            self.client.get_email().await
        }
        .await;

        result.map_err(|e| match e {
            ClientError::NoCardsFound => {
                error!("Unexpected error while validating the token: {}", e);
                FlowError::Unknown
            }
            e => FlowError::from(&e),
        })
    }

    fn create_entry(&self, card: &str) -> FlowResult {
        let (Some(unique_id), Some(api_token)) = (&self.unique_id, &self.api_token) else {
            return FlowResult::form(Step::User, Some(FlowError::Unknown));
        };

        let mut data = BlueCurrentConfig::new(api_token.clone());
        data.card = card.to_string();
        data.entry_id = unique_id.clone();

        FlowResult::CreateEntry(ConfigEntry {
            unique_id: unique_id.clone(),
            title: title(api_token),
            data,
        })
    }
}
