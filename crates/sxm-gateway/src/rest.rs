//! REST client for the perps exchange API.
//!
//! Signing is not done here: the client attaches the bearer token produced
//! by the wallet authentication layer and nothing else.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sxm_core::{ClientOrderId, OrderSide, Price, Size, Symbol};
use tracing::{debug, warn};

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{BoxFuture, ExchangeGateway};
use crate::types::{NewOrderRequest, OpenOrderInfo, OrderAck, PositionInfo};

fn default_base_url() -> String {
    "https://perps.standx.com".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

/// REST gateway settings.
#[derive(Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Bearer token from the auth layer. Usually supplied via `SXM_API_TOKEN`.
    #[serde(default, skip_serializing)]
    pub api_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
            api_token: None,
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field("timeout_ms", &self.timeout_ms)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct RawPosition {
    #[serde(default)]
    qty: Option<Decimal>,
    #[serde(default)]
    upnl: Option<Decimal>,
}

impl From<RawPosition> for PositionInfo {
    fn from(raw: RawPosition) -> Self {
        PositionInfo::new(raw.qty.unwrap_or_default(), raw.upnl.unwrap_or_default())
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PositionsEnvelope {
    List(Vec<RawPosition>),
    Wrapped { positions: Vec<RawPosition> },
}

#[derive(Debug, Deserialize)]
struct RawOpenOrder {
    cl_ord_id: String,
    side: OrderSide,
    price: Decimal,
    qty: Decimal,
}

impl From<RawOpenOrder> for OpenOrderInfo {
    fn from(raw: RawOpenOrder) -> Self {
        OpenOrderInfo {
            cl_ord_id: ClientOrderId::from(raw.cl_ord_id),
            side: raw.side,
            price: Price::new(raw.price),
            qty: Size::new(raw.qty),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OpenOrdersEnvelope {
    List(Vec<RawOpenOrder>),
    Result { result: Vec<RawOpenOrder> },
    Orders { orders: Vec<RawOpenOrder> },
}

impl OpenOrdersEnvelope {
    fn into_orders(self) -> Vec<RawOpenOrder> {
        match self {
            Self::List(v) | Self::Result { result: v } | Self::Orders { orders: v } => v,
        }
    }
}

#[derive(Debug, Serialize)]
struct CancelOrderBody<'a> {
    cl_ord_id: &'a ClientOrderId,
}

#[derive(Debug, Serialize)]
struct CancelOrdersBody<'a> {
    cl_ord_id_list: &'a [ClientOrderId],
}

/// Cancel endpoints answer with a bare code envelope.
#[derive(Debug, Default, Deserialize)]
struct CodeResponse {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

impl CodeResponse {
    fn into_result(self) -> GatewayResult<()> {
        match self.code {
            None | Some(0) => Ok(()),
            Some(code) => Err(GatewayError::Rejected {
                code,
                message: self.message.unwrap_or_default(),
            }),
        }
    }
}

/// reqwest-backed [`ExchangeGateway`].
pub struct RestGateway {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl RestGateway {
    pub fn new(config: &GatewayConfig) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| GatewayError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request and decode the JSON body, mapping non-2xx to
    /// [`GatewayError::Status`].
    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> GatewayResult<T> {
        let response = self.authorized(builder).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "Exchange returned error status");
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| GatewayError::Decode(format!("{e}: {body}")))
    }
}

impl ExchangeGateway for RestGateway {
    fn query_positions<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> BoxFuture<'a, GatewayResult<Vec<PositionInfo>>> {
        Box::pin(async move {
            let builder = self
                .client
                .get(self.url("/api/query_positions"))
                .query(&[("symbol", symbol.as_str())]);
            let envelope: PositionsEnvelope = self.send_json(builder).await?;
            let raw = match envelope {
                PositionsEnvelope::List(v) | PositionsEnvelope::Wrapped { positions: v } => v,
            };
            debug!(symbol = %symbol, count = raw.len(), "Queried positions");
            Ok(raw.into_iter().map(PositionInfo::from).collect())
        })
    }

    fn query_open_orders<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> BoxFuture<'a, GatewayResult<Vec<OpenOrderInfo>>> {
        Box::pin(async move {
            let builder = self
                .client
                .get(self.url("/api/query_open_orders"))
                .query(&[("symbol", symbol.as_str())]);
            let envelope: OpenOrdersEnvelope = self.send_json(builder).await?;
            let raw = envelope.into_orders();
            debug!(symbol = %symbol, count = raw.len(), "Queried open orders");
            Ok(raw.into_iter().map(OpenOrderInfo::from).collect())
        })
    }

    fn new_order(&self, request: NewOrderRequest) -> BoxFuture<'_, GatewayResult<OrderAck>> {
        Box::pin(async move {
            let builder = self.client.post(self.url("/api/new_order")).json(&request);
            let ack: OrderAck = self.send_json(builder).await?;
            debug!(
                cl_ord_id = %request.cl_ord_id,
                code = ?ack.code,
                accepted = ack.is_accepted(),
                "Order submitted"
            );
            Ok(ack)
        })
    }

    fn cancel_order<'a>(
        &'a self,
        cl_ord_id: &'a ClientOrderId,
    ) -> BoxFuture<'a, GatewayResult<()>> {
        Box::pin(async move {
            let builder = self
                .client
                .post(self.url("/api/cancel_order"))
                .json(&CancelOrderBody { cl_ord_id });
            let response: CodeResponse = self.send_json(builder).await?;
            response.into_result()
        })
    }

    fn cancel_orders(&self, cl_ord_ids: Vec<ClientOrderId>) -> BoxFuture<'_, GatewayResult<()>> {
        Box::pin(async move {
            let builder = self
                .client
                .post(self.url("/api/cancel_orders"))
                .json(&CancelOrdersBody {
                    cl_ord_id_list: &cl_ord_ids,
                });
            let response: CodeResponse = self.send_json(builder).await?;
            response.into_result()
        })
    }
}
