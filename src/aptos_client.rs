use crate::{
    bet::Side,
    ledger::{
        Address,
        FlipOutcome,
        Ledger,
        TransactionHash,
        WagerRequest,
    },
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use reqwest::StatusCode;
use serde::{
    Deserialize,
    Serialize,
    de::DeserializeOwned,
};
use serde_json::Value;
use std::time::{
    Duration,
    SystemTime,
    UNIX_EPOCH,
};
use tokio::time;
use tracing::debug;

const MAX_GAS_AMOUNT: u64 = 20_000;
const GAS_UNIT_PRICE: u64 = 100;
const EXPIRATION: Duration = Duration::from_secs(60);
const CONFIRMATION_POLL: Duration = Duration::from_millis(500);
const CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for a fullnode's REST API.
#[derive(Clone)]
pub struct AptosClient {
    base_url: String,
    http: reqwest::Client,
}

impl AptosClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .build()
            .wrap_err("failed to build HTTP client for fullnode")?;
        Ok(Self { base_url, http })
    }

    pub async fn sequence_number(&self, address: &Address) -> Result<u64> {
        let url = format!("{}/accounts/{}", self.base_url, address);
        let dto: AccountDto = self.get_json(url, "account").await?;
        parse_u64(&dto.sequence_number, "sequence_number")
    }

    /// Builds the unsigned submission for a wager.
    pub async fn prepare_submission(&self, request: &WagerRequest) -> Result<Submission> {
        let sequence_number = self.sequence_number(&request.sender).await?;
        let expiration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .wrap_err("system clock is before the unix epoch")?
            + EXPIRATION;
        Ok(Submission {
            sender: request.sender.to_long_hex(),
            sequence_number: sequence_number.to_string(),
            max_gas_amount: MAX_GAS_AMOUNT.to_string(),
            gas_unit_price: GAS_UNIT_PRICE.to_string(),
            expiration_timestamp_secs: expiration.as_secs().to_string(),
            payload: EntryFunctionPayload {
                kind: "entry_function_payload",
                function: request.function.clone(),
                type_arguments: request.type_arguments.clone(),
                arguments: vec![
                    Value::String(request.stake_base_units.to_string()),
                    Value::Bool(request.predict_heads),
                ],
            },
            signature: None,
        })
    }

    /// Bytes the sender has to sign for `submission`.
    pub async fn signing_message(&self, submission: &Submission) -> Result<Vec<u8>> {
        let url = format!("{}/transactions/encode_submission", self.base_url);
        let res = self
            .http
            .post(url)
            .json(submission)
            .send()
            .await
            .wrap_err("fullnode request failed")?;
        let encoded: String = read_json(res, "encode_submission").await?;
        decode_hex(&encoded).wrap_err("invalid signing message from fullnode")
    }

    pub async fn submit_signed(&self, submission: &Submission) -> Result<TransactionHash> {
        if submission.signature.is_none() {
            return Err(eyre!("refusing to submit an unsigned transaction"));
        }
        let url = format!("{}/transactions", self.base_url);
        let res = self
            .http
            .post(url)
            .json(submission)
            .send()
            .await
            .wrap_err("fullnode request failed")?;
        let dto: PendingTransactionDto = read_json(res, "submit transaction").await?;
        Ok(TransactionHash(dto.hash))
    }

    /// Polls until the transaction leaves the mempool.
    pub async fn wait_for_transaction(
        &self,
        hash: &TransactionHash,
    ) -> Result<CommittedTransactionDto> {
        time::timeout(CONFIRMATION_TIMEOUT, self.poll_committed(hash))
            .await
            .map_err(|_| eyre!("timed out waiting for transaction {hash}"))?
    }

    async fn poll_committed(
        &self,
        hash: &TransactionHash,
    ) -> Result<CommittedTransactionDto> {
        let url = format!("{}/transactions/by_hash/{}", self.base_url, hash);
        let mut ticker = time::interval(CONFIRMATION_POLL);
        loop {
            ticker.tick().await;
            let res = self
                .http
                .get(&url)
                .send()
                .await
                .wrap_err("fullnode request failed")?;
            if res.status() == StatusCode::NOT_FOUND {
                debug!(%hash, "transaction not yet visible");
                continue;
            }
            let tx: Value = read_json(res, "transaction by hash").await?;
            if tx.get("type").and_then(Value::as_str) == Some("pending_transaction") {
                continue;
            }
            return serde_json::from_value(tx)
                .wrap_err("invalid committed transaction payload");
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String, what: &str) -> Result<T> {
        let res = self
            .http
            .get(url)
            .send()
            .await
            .wrap_err("fullnode request failed")?;
        read_json(res, what).await
    }
}

impl Ledger for AptosClient {
    async fn event_by_hash(
        &self,
        hash: &TransactionHash,
        event_type: &str,
    ) -> Result<FlipOutcome> {
        let tx = self.wait_for_transaction(hash).await?;
        if !tx.success {
            return Err(eyre!("transaction {hash} failed: {}", tx.vm_status));
        }
        let event = tx
            .events
            .into_iter()
            .find(|e| same_type_tag(&e.kind, event_type))
            .ok_or_else(|| eyre!("transaction {hash} emitted no {event_type}"))?;
        let data: FlipEventDto =
            serde_json::from_value(event.data).wrap_err("invalid flip event payload")?;
        Ok(data.into())
    }

    async fn balance(&self, address: &Address, coin_type: &str) -> Result<u64> {
        let url = format!("{}/view", self.base_url);
        let body = ViewRequest {
            function: "0x1::coin::balance",
            type_arguments: vec![coin_type.to_string()],
            arguments: vec![address.to_long_hex()],
        };
        let res = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .wrap_err("fullnode request failed")?;
        let values: Vec<String> = read_json(res, "coin balance view").await?;
        let raw = values
            .first()
            .ok_or_else(|| eyre!("empty coin balance view result"))?;
        parse_u64(raw, "coin balance")
    }
}

async fn read_json<T: DeserializeOwned>(res: reqwest::Response, what: &str) -> Result<T> {
    let status = res.status();
    let bytes = res
        .bytes()
        .await
        .wrap_err("failed to read fullnode response body")?;
    if !status.is_success() {
        let body = String::from_utf8_lossy(&bytes);
        return Err(eyre!(
            "fullnode responded with {status} when fetching {what}: {body}"
        ));
    }
    serde_json::from_slice(&bytes).wrap_err_with(|| format!("invalid {what} payload"))
}

fn parse_u64(raw: &str, what: &str) -> Result<u64> {
    raw.parse::<u64>()
        .map_err(|e| eyre!("invalid {what} '{raw}': {e}"))
}

pub fn decode_hex(raw: &str) -> Result<Vec<u8>> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    hex::decode(digits).wrap_err("invalid hex string")
}

/// Compares two Move type tags, ignoring how the address is spelled.
fn same_type_tag(a: &str, b: &str) -> bool {
    let canonical = |tag: &str| -> Option<(Address, String)> {
        let (address, rest) = tag.split_once("::")?;
        Some((Address::parse(address).ok()?, rest.to_string()))
    };
    match (canonical(a), canonical(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Submission {
    pub sender: String,
    pub sequence_number: String,
    pub max_gas_amount: String,
    pub gas_unit_price: String,
    pub expiration_timestamp_secs: String,
    pub payload: EntryFunctionPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<SignatureDto>,
}

#[derive(Clone, Debug, Serialize)]
pub struct EntryFunctionPayload {
    #[serde(rename = "type")]
    kind: &'static str,
    function: String,
    type_arguments: Vec<String>,
    arguments: Vec<Value>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SignatureDto {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub public_key: String,
    pub signature: String,
}

impl SignatureDto {
    pub fn ed25519(public_key: &[u8], signature: &[u8]) -> Self {
        Self {
            kind: "ed25519_signature",
            public_key: format!("0x{}", hex::encode(public_key)),
            signature: format!("0x{}", hex::encode(signature)),
        }
    }
}

#[derive(Serialize)]
struct ViewRequest {
    function: &'static str,
    type_arguments: Vec<String>,
    arguments: Vec<String>,
}

#[derive(Deserialize)]
struct AccountDto {
    sequence_number: String,
}

#[derive(Deserialize)]
struct PendingTransactionDto {
    hash: String,
}

#[derive(Debug, Deserialize)]
pub struct CommittedTransactionDto {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub vm_status: String,
    #[serde(default)]
    pub events: Vec<EventDto>,
}

#[derive(Debug, Deserialize)]
pub struct EventDto {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
}

#[derive(Deserialize)]
struct FlipEventDto {
    player: Address,
    heads: bool,
    is_won: bool,
}

impl From<FlipEventDto> for FlipOutcome {
    fn from(dto: FlipEventDto) -> Self {
        FlipOutcome {
            side: Side::from_heads(dto.heads),
            won: dto.is_won,
            player: dto.player,
        }
    }
}
