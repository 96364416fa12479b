use serde::{Deserialize, Serialize};

/// Messages received from the broker during the handshake, discriminated by
/// the `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum BrokerMessage {
    #[serde(rename = "broker:inforequest")]
    InfoRequest,

    #[serde(rename = "broker:runnerregistered")]
    RunnerRegistered,

    #[serde(rename = "broker:taskofferaccept")]
    TaskOfferAccept {
        #[serde(rename = "taskId")]
        task_id: String,
    },
}

/// Messages the launcher sends while posing as a runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum LauncherMessage {
    #[serde(rename = "runner:info")]
    Info { name: String, types: Vec<String> },

    #[serde(rename = "runner:taskoffer")]
    TaskOffer {
        #[serde(rename = "taskType")]
        task_type: String,
        /// -1 advertises an offer with no expiry.
        #[serde(rename = "validFor")]
        valid_for: i64,
        #[serde(rename = "offerId")]
        offer_id: String,
    },

    #[serde(rename = "runner:taskdeferred")]
    TaskDeferred {
        #[serde(rename = "taskId")]
        task_id: String,
    },
}
