//! eBay Trading API client (XML over HTTPS).

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use relic_model::SoldItem;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use tracing::{debug, warn};
use uuid::Uuid;

use super::api::{ItemStatus, MarketplaceApi, SubmittedListing};
use super::payload::ListingPayload;
use crate::error::{RelicError, Result};

const SANDBOX_BASE_URL: &str = "https://api.sandbox.ebay.com";
const PRODUCTION_BASE_URL: &str = "https://api.ebay.com";
const ENDPOINT: &str = "/ws/api.dll";
const COMPATIBILITY_LEVEL: &str = "967";
const SITE_ID: &str = "0";
const XMLNS: &str = "urn:ebay:apis:eBLBaseComponents";

/// Developer keys plus the seller's auth token.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct EbayCredentials {
    pub app_id: String,
    pub cert_id: String,
    pub dev_id: String,
    pub auth_token: String,
    pub sandbox: bool,
}

impl fmt::Debug for EbayCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EbayCredentials")
            .field("app_id", &self.app_id)
            .field("dev_id", &self.dev_id)
            .field("cert_id", &"<redacted>")
            .field("auth_token", &"<redacted>")
            .field("sandbox", &self.sandbox)
            .finish()
    }
}

impl EbayCredentials {
    /// Names of the credential fields that are still empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("app_id", &self.app_id),
            ("cert_id", &self.cert_id),
            ("dev_id", &self.dev_id),
            ("auth_token", &self.auth_token),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    pub fn validate(&self) -> Result<()> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(RelicError::Relay(format!(
                "marketplace credentials incomplete: missing {}",
                missing.join(", ")
            )))
        }
    }

    pub fn base_url(&self) -> &'static str {
        if self.sandbox {
            SANDBOX_BASE_URL
        } else {
            PRODUCTION_BASE_URL
        }
    }
}

#[derive(Clone)]
pub struct EbayTradingClient {
    client: Client,
    credentials: EbayCredentials,
    endpoint: String,
}

impl fmt::Debug for EbayTradingClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EbayTradingClient")
            .field("endpoint", &self.endpoint)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl EbayTradingClient {
    pub fn new(credentials: EbayCredentials, timeout: Duration) -> Result<Self> {
        credentials.validate()?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| RelicError::Relay(format!("failed to build HTTP client: {err}")))?;
        let endpoint = format!("{}{ENDPOINT}", credentials.base_url());
        Ok(Self {
            client,
            credentials,
            endpoint,
        })
    }

    /// Point the client at a different host, e.g. a local stub.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.endpoint = format!("{}{ENDPOINT}", base_url.trim_end_matches('/'));
        self
    }

    fn request(&self, call: &str) -> reqwest::RequestBuilder {
        self.client
            .post(&self.endpoint)
            .header("X-EBAY-API-CALL-NAME", call)
            .header("X-EBAY-API-APP-NAME", &self.credentials.app_id)
            .header("X-EBAY-API-DEV-NAME", &self.credentials.dev_id)
            .header("X-EBAY-API-CERT-NAME", &self.credentials.cert_id)
            .header("X-EBAY-API-SITEID", SITE_ID)
            .header("X-EBAY-API-COMPATIBILITY-LEVEL", COMPATIBILITY_LEVEL)
    }

    async fn call(&self, call: &str, body: &str) -> Result<String> {
        let xml = envelope(call, &self.credentials.auth_token, body);
        debug!(target: "relic::relay", call, "calling trading api");
        let response = self
            .request(call)
            .header("Content-Type", "text/xml")
            .body(xml)
            .send()
            .await
            .map_err(|err| transport_error(call, err))?;
        read_response(call, response).await
    }
}

fn transport_error(call: &str, err: reqwest::Error) -> RelicError {
    if err.is_timeout() {
        RelicError::Relay(format!("{call} timed out"))
    } else {
        RelicError::Relay(format!("{call} request failed: {err}"))
    }
}

async fn read_response(call: &str, response: reqwest::Response) -> Result<String> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|err| RelicError::Relay(format!("{call} response unreadable: {err}")))?;
    if !status.is_success() {
        return Err(RelicError::Relay(format!("{call} returned HTTP {status}")));
    }
    check_ack(call, &text)?;
    Ok(text)
}

#[async_trait]
impl MarketplaceApi for EbayTradingClient {
    async fn upload_picture(&self, path: &Path) -> Result<String> {
        const CALL: &str = "UploadSiteHostedPictures";
        let bytes = tokio::fs::read(path).await.map_err(|source| RelicError::ImageLoad {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image.jpg".to_string());

        let picture_name = format!(
            "vintage_{}_{}",
            Utc::now().timestamp_millis(),
            &Uuid::new_v4().simple().to_string()[..8]
        );
        let mut body = XmlBody::default();
        body.element("PictureName", &picture_name);
        let xml = envelope(CALL, &self.credentials.auth_token, &body.finish());

        let payload_part = Part::text(xml)
            .mime_str("text/xml")
            .map_err(|err| RelicError::Relay(format!("{CALL} payload rejected: {err}")))?;
        let form = Form::new()
            .part("XML Payload", payload_part)
            .part("image", Part::bytes(bytes).file_name(file_name));

        let response = self
            .request(CALL)
            .multipart(form)
            .send()
            .await
            .map_err(|err| transport_error(CALL, err))?;
        let text = read_response(CALL, response).await?;
        tag_value(&text, "FullURL")
            .ok_or_else(|| RelicError::Relay(format!("{CALL} response has no picture URL")))
    }

    async fn create_listing(&self, payload: &ListingPayload) -> Result<SubmittedListing> {
        let text = self
            .call("AddFixedPriceItem", &add_item_body(payload))
            .await?;
        parse_submitted(&text)
    }

    async fn item_status(&self, item_id: &str) -> Result<ItemStatus> {
        let mut body = XmlBody::default();
        body.element("ItemID", item_id);
        body.element("DetailLevel", "ReturnAll");
        let text = self.call("GetItem", &body.finish()).await?;
        parse_item_status(item_id, &text)
    }

    async fn end_item(&self, item_id: &str, reason: &str) -> Result<()> {
        let mut body = XmlBody::default();
        body.element("ItemID", item_id);
        body.element("EndingReason", reason);
        self.call("EndFixedPriceItem", &body.finish()).await?;
        Ok(())
    }

    async fn sold_items_since(&self, since: DateTime<Utc>) -> Result<Vec<SoldItem>> {
        let mut body = XmlBody::default();
        body.element("ModTimeFrom", &since.to_rfc3339_opts(SecondsFormat::Millis, true));
        body.element("ModTimeTo", &Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
        let text = self.call("GetSellerTransactions", &body.finish()).await?;
        Ok(parse_transactions(&text))
    }
}

/// Accumulates escaped child elements of a request body.
#[derive(Debug, Default)]
struct XmlBody {
    xml: String,
}

impl XmlBody {
    fn element(&mut self, name: &str, value: &str) {
        self.xml.push_str(&format!("<{name}>{}</{name}>", escape_xml(value)));
    }

    fn raw(&mut self, name: &str, inner: &str) {
        self.xml.push_str(&format!("<{name}>{inner}</{name}>"));
    }

    fn nested(&mut self, name: &str, build: impl FnOnce(&mut XmlBody)) {
        let mut child = XmlBody::default();
        build(&mut child);
        self.raw(name, &child.xml);
    }

    fn finish(self) -> String {
        self.xml
    }
}

pub(crate) fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn envelope(call: &str, token: &str, body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <{call}Request xmlns=\"{XMLNS}\">\
         <RequesterCredentials><eBayAuthToken>{}</eBayAuthToken></RequesterCredentials>\
         {body}</{call}Request>",
        escape_xml(token)
    )
}

fn add_item_body(payload: &ListingPayload) -> String {
    let mut body = XmlBody::default();
    body.nested("Item", |item| {
        item.element("Title", &payload.title);
        // CDATA cannot contain its own terminator.
        item.raw(
            "Description",
            &format!("<![CDATA[{}]]>", payload.description_html.replace("]]>", "]]&gt;")),
        );
        item.nested("PrimaryCategory", |category| {
            category.element("CategoryID", &payload.category_id);
        });
        item.element("StartPrice", &format!("{:.2}", payload.start_price));
        item.element("ConditionID", &payload.condition_id);
        item.element("Country", "US");
        item.element("Currency", "USD");
        item.element("DispatchTimeMax", &payload.dispatch_time_max.to_string());
        item.element("ListingDuration", "GTC");
        item.element("ListingType", "FixedPriceItem");
        if let Some(email) = payload.paypal_email.as_deref().filter(|email| !email.is_empty()) {
            item.element("PaymentMethods", "PayPal");
            item.element("PayPalEmailAddress", email);
        }
        if !payload.picture_urls.is_empty() {
            item.nested("PictureDetails", |pictures| {
                for url in &payload.picture_urls {
                    pictures.element("PictureURL", url);
                }
            });
        }
        item.element("PostalCode", &payload.postal_code);
        item.element("Quantity", &payload.quantity.to_string());
        item.nested("ReturnPolicy", |policy| {
            policy.element("ReturnsAcceptedOption", "ReturnsAccepted");
            policy.element("RefundOption", "MoneyBack");
            policy.element("ReturnsWithinOption", "Days_30");
            policy.element("ShippingCostPaidByOption", "Buyer");
        });
        item.nested("ShippingDetails", |shipping| {
            shipping.element("ShippingType", "Calculated");
            shipping.nested("ShippingServiceOptions", |option| {
                option.element("ShippingService", "USPSPriority");
                option.element("FreeShipping", "false");
            });
        });
        item.element("Site", "US");
    });
    body.finish()
}

const ADDRESS_TAGS: &[&str] = &["Name", "Street1", "Street2", "CityName", "StateOrProvince", "PostalCode", "Country"];

/// Elements read from Trading API responses, besides [`ADDRESS_TAGS`].
const RESPONSE_TAGS: &[&str] = &[
    "Ack",
    "LongMessage",
    "ShortMessage",
    "FullURL",
    "ListingStatus",
    "Title",
    "QuantitySold",
    "CurrentPrice",
    "CreatedDate",
    "TransactionPrice",
    "OrderLineItemID",
    "ShippingAddress",
];

static TAG_PATTERNS: Lazy<HashMap<&'static str, Regex>> = Lazy::new(|| {
    RESPONSE_TAGS
        .iter()
        .chain(ADDRESS_TAGS)
        .map(|tag| {
            let re = Regex::new(&format!(r"(?s)<{tag}(?:\s[^>]*)?>(.*?)</{tag}>"))
                .expect("element regex should compile");
            (*tag, re)
        })
        .collect()
});

fn tag_value(xml: &str, tag: &str) -> Option<String> {
    let Some(re) = TAG_PATTERNS.get(tag) else {
        debug_assert!(false, "no pattern registered for <{tag}>");
        return None;
    };
    re.captures(xml)
        .and_then(|caps| caps.get(1))
        .map(|value| unescape_xml(value.as_str().trim()))
}

fn unescape_xml(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn check_ack(call: &str, xml: &str) -> Result<()> {
    match tag_value(xml, "Ack").as_deref() {
        Some("Failure") | Some("PartialFailure") => {
            let detail = tag_value(xml, "LongMessage")
                .or_else(|| tag_value(xml, "ShortMessage"))
                .unwrap_or_else(|| "unknown error".to_string());
            Err(RelicError::Relay(format!("{call} failed: {detail}")))
        }
        Some("Warning") => {
            if let Some(detail) = tag_value(xml, "LongMessage") {
                warn!(target: "relic::relay", call, warning = %detail, "trading api warning");
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

static ITEM_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<ItemID>(\d+)</ItemID>").expect("item id regex should compile"));

static TRANSACTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<Transaction>(.*?)</Transaction>").expect("transaction regex should compile")
});

// Fees arrive as <Fee><Name>..</Name><Fee currencyID="..">amount</Fee></Fee>.
static FEE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<Name>(\w+)</Name>\s*<Fee[^>]*>([\d.]+)</Fee>").expect("fee regex should compile")
});

fn parse_submitted(xml: &str) -> Result<SubmittedListing> {
    let item_id = ITEM_ID
        .captures(xml)
        .and_then(|caps| caps.get(1))
        .map(|id| id.as_str().to_string())
        .ok_or_else(|| RelicError::Relay("AddFixedPriceItem response has no ItemID".to_string()))?;

    let (insertion_fee, total_fees) = fees(xml);
    Ok(SubmittedListing {
        url: format!("https://www.ebay.com/itm/{item_id}"),
        item_id,
        insertion_fee,
        total_fees,
    })
}

/// Insertion fee and the listing total; the total falls back to the sum of
/// every fee line when the response carries no explicit total.
fn fees(xml: &str) -> (f64, f64) {
    let mut insertion = 0.0;
    let mut listed_total = None;
    let mut sum = 0.0;
    for caps in FEE.captures_iter(xml) {
        let amount = caps[2].parse::<f64>().unwrap_or(0.0);
        match &caps[1] {
            "InsertionFee" => insertion = amount,
            "ListingFee" | "TotalFees" => listed_total = Some(amount),
            _ => {}
        }
        sum += amount;
    }
    (insertion, listed_total.unwrap_or(sum))
}

fn parse_item_status(item_id: &str, xml: &str) -> Result<ItemStatus> {
    let listing_status = tag_value(xml, "ListingStatus")
        .ok_or_else(|| RelicError::Relay(format!("GetItem response for {item_id} has no status")))?;
    Ok(ItemStatus {
        item_id: item_id.to_string(),
        title: tag_value(xml, "Title"),
        listing_status,
        quantity_sold: tag_value(xml, "QuantitySold")
            .and_then(|qty| qty.parse().ok())
            .unwrap_or(0),
        current_price: tag_value(xml, "CurrentPrice").and_then(|price| price.parse().ok()),
    })
}

fn parse_transactions(xml: &str) -> Vec<SoldItem> {
    TRANSACTION
        .captures_iter(xml)
        .filter_map(|caps| {
            let block = caps.get(1)?.as_str();
            let Some(marketplace_item_id) = ITEM_ID.captures(block).map(|c| c[1].to_string()) else {
                warn!(target: "relic::relay", "skipping transaction without item id");
                return None;
            };
            let sold_date = tag_value(block, "CreatedDate")
                .and_then(|date| DateTime::parse_from_rfc3339(&date).ok())
                .map(|date| date.with_timezone(&Utc))
                .unwrap_or_else(Utc::now);
            Some(SoldItem {
                marketplace_item_id,
                title: tag_value(block, "Title").unwrap_or_default(),
                sold_price: tag_value(block, "TransactionPrice")
                    .and_then(|price| price.parse().ok())
                    .unwrap_or(0.0),
                sold_date,
                order_id: tag_value(block, "OrderLineItemID"),
                buyer_address: tag_value(block, "ShippingAddress").map(|address| flatten_address(&address)),
            })
        })
        .collect()
}

fn flatten_address(block: &str) -> String {
    ADDRESS_TAGS
        .iter()
        .filter_map(|tag| tag_value(block, tag))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}
