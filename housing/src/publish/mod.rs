//! Message store client and publishing of emitted transactions.
//!
//! Each transaction becomes one geo-positioned message. The message body is the
//! transaction JSON without its serial number and coordinates (those travel as
//! the message's custom id and position). Messages are ordered by a sort key
//! derived from the transaction date, jittered within the day so that
//! same-day transactions do not collide.
//!
//! | Method | Path             | Purpose                                 |
//! |--------|------------------|-----------------------------------------|
//! | POST   | `/Me`            | Resolve the token's user and app        |
//! | POST   | `/MsgCreate`     | Create a message                        |
//! | POST   | `/MsgUpdate`     | Update body and/or sort key             |
//! | GET    | `/MsgsByAppUser` | Page through one partition of messages  |

use std::io::BufRead;

use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PublishError, PublishResult};
use crate::models::Transaction;
use crate::validation::validate_transaction;

pub const DEFAULT_HOST: &str = "http://www.jinma.io";

/// Number of partitions messages of an app are spread over.
pub const PARTITION_COUNT: u32 = 1536;

/// Seconds in a day minus one; upper bound (exclusive) of the sort key jitter.
const DAY_JITTER_SECS: i64 = 24 * 60 * 60 - 1;

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct App {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Icon")]
    pub icon: String,
    #[serde(rename = "MarketingURI")]
    pub marketing_uri: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Picture")]
    pub picture: String,
    #[serde(rename = "ThirdPartyID")]
    pub third_party_id: String,
    #[serde(rename = "Privacy")]
    pub privacy: String,
    #[serde(rename = "Language")]
    pub language: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Msg {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "User")]
    pub user: User,
    #[serde(rename = "Time")]
    pub time: f64,
    #[serde(rename = "Body")]
    pub body: String,
    #[serde(rename = "Lat")]
    pub lat: f64,
    #[serde(rename = "Lng")]
    pub lng: f64,
    #[serde(rename = "SKF64")]
    pub sort_key: f64,
    #[serde(rename = "Hashtags")]
    pub hashtags: Vec<String>,
    #[serde(rename = "App")]
    pub app: App,
    #[serde(rename = "CustomID")]
    pub custom_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MeResp {
    #[serde(rename = "User")]
    pub user: User,
    #[serde(rename = "App")]
    pub app: App,
}

/// One page of a partition listing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MsgPage {
    #[serde(rename = "Msgs")]
    pub msgs: Vec<Msg>,
    /// Empty on the last page
    #[serde(rename = "LastEvaluatedKey")]
    pub last_evaluated_key: String,
}

// =============================================================================
// Client
// =============================================================================

#[derive(Debug, Clone)]
pub struct MessageStoreClient {
    http: reqwest::Client,
    host: String,
    token: String,
    partitions: u32,
}

impl MessageStoreClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            host: DEFAULT_HOST.to_string(),
            token: token.into(),
            partitions: PARTITION_COUNT,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_partitions(mut self, partitions: u32) -> Self {
        self.partitions = partitions;
        self
    }

    /// The user and app the token belongs to.
    pub async fn me(&self) -> PublishResult<MeResp> {
        self.call(reqwest::Method::POST, "Me", Vec::new()).await
    }

    pub async fn create_message(
        &self,
        body: &str,
        lat: f64,
        lng: f64,
        sort_key: Option<f64>,
        custom_id: Option<&str>,
    ) -> PublishResult<Msg> {
        let mut params = vec![
            ("Lat", lat.to_string()),
            ("Lng", lng.to_string()),
            ("Body", body.to_string()),
        ];
        if let Some(sk) = sort_key {
            params.push(("SKF64", sk.to_string()));
        }
        if let Some(id) = custom_id.filter(|id| !id.is_empty()) {
            params.push(("CustomID", id.to_string()));
        }
        self.call(reqwest::Method::POST, "MsgCreate", params).await
    }

    /// Update a message. Fields left `None` are untouched.
    pub async fn update_message(&self, msg_id: &str, body: Option<&str>, sort_key: Option<f64>) -> PublishResult<Msg> {
        let mut params = vec![("MsgID", msg_id.to_string())];
        if let Some(body) = body.filter(|b| !b.is_empty()) {
            params.push(("Body", body.to_string()));
        }
        if let Some(sk) = sort_key {
            params.push(("SKF64", sk.to_string()));
        }
        self.call(reqwest::Method::POST, "MsgUpdate", params).await
    }

    /// One page of one partition. Pass the previous page's key to continue.
    pub async fn messages_by_app_user(
        &self,
        app_id: &str,
        partition: u32,
        exclusive_start_key: Option<&str>,
    ) -> PublishResult<MsgPage> {
        let mut params = vec![("AppID", app_id.to_string()), ("I", partition.to_string())];
        if let Some(esk) = exclusive_start_key.filter(|k| !k.is_empty()) {
            params.push(("ESK", esk.to_string()));
        }
        self.call(reqwest::Method::GET, "MsgsByAppUser", params).await
    }

    /// Every message of one partition, following pagination to the end.
    pub async fn scan_partition<F>(&self, app_id: &str, partition: u32, handle: &mut F) -> PublishResult<usize>
    where
        F: FnMut(Msg) -> PublishResult<()>,
    {
        let mut count = 0;
        let mut esk = String::new();
        loop {
            let page = self.messages_by_app_user(app_id, partition, Some(esk.as_str())).await?;
            for msg in page.msgs {
                handle(msg)?;
                count += 1;
            }
            if page.last_evaluated_key.is_empty() {
                return Ok(count);
            }
            esk = page.last_evaluated_key;
        }
    }

    /// Every message of the app, partition by partition.
    pub async fn scan_all_partitions<F>(&self, app_id: &str, handle: &mut F) -> PublishResult<usize>
    where
        F: FnMut(Msg) -> PublishResult<()>,
    {
        let mut total = 0;
        for partition in 0..self.partitions {
            total += self.scan_partition(app_id, partition, handle).await?;
            debug!(partition, total, "finished scanning partition");
        }
        Ok(total)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        endpoint: &str,
        mut params: Vec<(&str, String)>,
    ) -> PublishResult<T> {
        params.push(("Token", self.token.clone()));
        let url = format!("{}/{}", self.host, endpoint);

        let response = self
            .http
            .request(method, &url)
            .query(&params)
            .send()
            .await
            .map_err(|e| PublishError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PublishError::Request(e.to_string()))?;

        if status != reqwest::StatusCode::OK {
            return Err(PublishError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| PublishError::InvalidResponse(format!("{}: {}", e, body)))
    }
}

// =============================================================================
// Publishing
// =============================================================================

/// Sort key for a transaction date: the date plus a random offset within the day.
pub fn sort_key<R: Rng>(transaction_date: i64, rng: &mut R) -> f64 {
    let secs = rng.gen_range(0..DAY_JITTER_SECS);
    (transaction_date + secs) as f64 + rng.gen::<f64>()
}

/// Message body for a transaction: everything but serial number and coordinates.
pub fn publication_body(ts: &Transaction) -> PublishResult<String> {
    let mut body = ts.clone();
    body.serial_number.clear();
    body.lat = 0.0;
    body.lng = 0.0;
    Ok(serde_json::to_string(&body)?)
}

/// Publish one transaction as a message.
pub async fn publish_transaction<R: Rng>(
    client: &MessageStoreClient,
    ts: &Transaction,
    rng: &mut R,
) -> PublishResult<Msg> {
    if ts.serial_number.is_empty() {
        return Err(PublishError::MissingCustomId);
    }
    let body = publication_body(ts)?;
    let sk = sort_key(ts.transaction_date, rng);
    client
        .create_message(&body, ts.lat, ts.lng, Some(sk), Some(ts.serial_number.as_str()))
        .await
}

/// Counters for a publish or reindex run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishSummary {
    pub processed: usize,
    /// Lines before the resume offset
    pub skipped: usize,
}

/// Publish every transaction line of a JSON-lines stream.
///
/// Lines with a 0-based index below `offset` are skipped, so an interrupted run
/// can be resumed. Each line is schema-checked before anything is sent. Line
/// numbers in errors use the same 0-based index as `offset`.
pub async fn publish_lines<B: BufRead, R: Rng>(
    client: &MessageStoreClient,
    reader: B,
    offset: usize,
    rng: &mut R,
) -> PublishResult<PublishSummary> {
    let mut summary = PublishSummary::default();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if idx < offset {
            summary.skipped += 1;
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }

        let value: serde_json::Value = serde_json::from_str(&line).map_err(|e| PublishError::from(e).at_line(idx))?;
        validate_transaction(&value).map_err(|errors| PublishError::InvalidRecord { line: idx, errors })?;
        let ts: Transaction = serde_json::from_value(value).map_err(|e| PublishError::from(e).at_line(idx))?;

        let msg = publish_transaction(client, &ts, rng)
            .await
            .map_err(|e| e.at_line(idx))?;
        info!(line = idx, msg_id = %msg.id, serial = %ts.serial_number, "published transaction");
        summary.processed += 1;
    }
    Ok(summary)
}

/// Recompute the sort key of exported messages from the transaction in their body.
pub async fn reindex_lines<B: BufRead, R: Rng>(
    client: &MessageStoreClient,
    reader: B,
    rng: &mut R,
) -> PublishResult<PublishSummary> {
    let mut summary = PublishSummary::default();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let msg: Msg = serde_json::from_str(&line).map_err(|e| PublishError::from(e).at_line(idx))?;
        let ts: Transaction = serde_json::from_str(&msg.body).map_err(|e| PublishError::from(e).at_line(idx))?;
        let sk = sort_key(ts.transaction_date, rng);

        let updated = client
            .update_message(&msg.id, None, Some(sk))
            .await
            .map_err(|e| e.at_line(idx))?;
        info!(line = idx, msg_id = %updated.id, sort_key = updated.sort_key, "reindexed message");
        summary.processed += 1;
    }
    Ok(summary)
}
