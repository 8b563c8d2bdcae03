//! OAI-PMH `ListRecords` client with resumption-token pagination.
//!
//! [`OaiClient::list_records`] returns a [`RecordPages`] cursor. The cursor
//! fetches one page at a time and only requests the next page once every
//! record buffered from the previous one has been handed out, so a harvest
//! can stream arbitrarily large repositories.
//!
//! # Failure policy
//!
//! The first request and later continuation requests are treated
//! differently:
//!
//! - any transport or status failure on the first request is fatal;
//! - a 5xx status or a timeout on a continuation request ends the sequence
//!   quietly (logged at `warn`), keeping everything already yielded;
//! - 4xx statuses, unparseable documents and explicit OAI `<error>`
//!   elements are fatal in every phase.
//!
//! This includes `noRecordsMatch`: a repository that answers a harvest with
//! an empty list fails the harvest instead of passing it as a clean run.
//!
//! In [`ParseMode::Recover`] a page that could only be partially decoded is
//! kept, and the cursor reports [`RecordPages::soft_ended`].
//!
//! # Example
//!
//! ```no_run
//! use harvester_core::oai::{HttpTimeouts, ListRecordsParams, OaiClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OaiClient::new("https://repo.example/oai", HttpTimeouts::default())?;
//! let mut pages = client.list_records(ListRecordsParams::new("oai_dc").with_from("2024-01-01"));
//! while let Some(record) = pages.next_record().await? {
//!     println!("{}", record.identifier);
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod http_client;

use std::collections::VecDeque;

use reqwest::Client;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::xml::{ParseMode, XmlElement, decode};

pub use error::OaiError;
pub use http_client::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_READ_TIMEOUT_SECS, HttpTimeouts, build_harvest_client,
};

/// OAI-PMH envelope namespace.
pub const OAI_NS: &str = "http://www.openarchives.org/OAI/2.0/";

/// `oai_dc` wrapper namespace.
pub const OAI_DC_NS: &str = "http://www.openarchives.org/OAI/2.0/oai_dc/";

/// Dublin Core element namespace.
pub const DC_NS: &str = "http://purl.org/dc/elements/1.1/";

/// Arguments of the initial `ListRecords` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRecordsParams {
    /// `metadataPrefix` argument (normally `oai_dc`).
    pub metadata_prefix: String,
    /// Optional `set` argument.
    pub set_spec: Option<String>,
    /// Optional lower date bound (`from`).
    pub from: Option<String>,
    /// Optional upper date bound (`until`).
    pub until: Option<String>,
}

impl ListRecordsParams {
    /// Creates parameters for the given metadata prefix with no set or bounds.
    #[must_use]
    pub fn new(metadata_prefix: impl Into<String>) -> Self {
        Self {
            metadata_prefix: metadata_prefix.into(),
            set_spec: None,
            from: None,
            until: None,
        }
    }

    /// Restricts the harvest to one set.
    #[must_use]
    pub fn with_set(mut self, set_spec: impl Into<String>) -> Self {
        self.set_spec = Some(set_spec.into());
        self
    }

    /// Sets the `from` bound.
    #[must_use]
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Sets the `until` bound.
    #[must_use]
    pub fn with_until(mut self, until: impl Into<String>) -> Self {
        self.until = Some(until.into());
        self
    }
}

/// One harvested record: its OAI identifier and Dublin Core container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestedRecord {
    /// Trimmed `header/identifier` text.
    pub identifier: String,
    /// The `oai_dc:dc` (or bare `dc:dc`) element.
    pub metadata: XmlElement,
}

/// Client for one OAI-PMH endpoint.
#[derive(Debug, Clone)]
pub struct OaiClient {
    http: Client,
    base_url: Url,
    parse_mode: ParseMode,
}

impl OaiClient {
    /// Creates a client for `base_url` using the shared harvest HTTP policy.
    ///
    /// Responses are decoded in [`ParseMode::Recover`] unless changed with
    /// [`OaiClient::with_parse_mode`].
    ///
    /// # Errors
    ///
    /// Returns [`OaiError::Client`] if the URL is invalid or the HTTP client
    /// cannot be built.
    pub fn new(base_url: &str, timeouts: HttpTimeouts) -> Result<Self, OaiError> {
        let http = build_harvest_client(timeouts)?;
        Self::with_http_client(base_url, http)
    }

    /// Creates a client that sends requests through an existing reqwest client.
    ///
    /// # Errors
    ///
    /// Returns [`OaiError::Client`] if the URL is invalid.
    pub fn with_http_client(base_url: &str, http: Client) -> Result<Self, OaiError> {
        let trimmed = base_url.trim().trim_end_matches('?');
        let base_url = Url::parse(trimmed)
            .map_err(|e| OaiError::Client(format!("invalid base URL '{trimmed}': {e}")))?;
        Ok(Self {
            http,
            base_url,
            parse_mode: ParseMode::Recover,
        })
    }

    /// Selects how response bodies are decoded.
    #[must_use]
    pub fn with_parse_mode(mut self, parse_mode: ParseMode) -> Self {
        self.parse_mode = parse_mode;
        self
    }

    /// The endpoint base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The decoding mode applied to responses.
    #[must_use]
    pub fn parse_mode(&self) -> ParseMode {
        self.parse_mode
    }

    /// Starts a `ListRecords` sequence. No request is sent until the first
    /// call to [`RecordPages::next_record`].
    #[must_use]
    pub fn list_records(&self, params: ListRecordsParams) -> RecordPages {
        RecordPages {
            client: self.clone(),
            next: NextRequest::Start(params),
            buffer: VecDeque::new(),
            pages_fetched: 0,
            soft_ended: false,
        }
    }

    fn initial_url(&self, params: &ListRecordsParams) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("verb", "ListRecords");
            query.append_pair("metadataPrefix", &params.metadata_prefix);
            if let Some(set_spec) = &params.set_spec {
                query.append_pair("set", set_spec);
            }
            if let Some(from) = &params.from {
                query.append_pair("from", from);
            }
            if let Some(until) = &params.until {
                query.append_pair("until", until);
            }
        }
        url
    }

    fn continuation_url(&self, token: &str) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("verb", "ListRecords")
            .append_pair("resumptionToken", token);
        url
    }

    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, OaiError> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| OaiError::from_transport(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OaiError::http_status(url.as_str(), status.as_u16()));
        }

        response
            .bytes()
            .await
            .map(|body| body.to_vec())
            .map_err(|e| OaiError::from_transport(url.as_str(), e))
    }
}

#[derive(Debug)]
enum NextRequest {
    Start(ListRecordsParams),
    Continue(String),
    Done,
}

/// Lazy cursor over the records of a `ListRecords` sequence.
///
/// After a fatal error or the end of the sequence every further call to
/// [`RecordPages::next_record`] returns `Ok(None)` without network traffic.
#[derive(Debug)]
pub struct RecordPages {
    client: OaiClient,
    next: NextRequest,
    buffer: VecDeque<HarvestedRecord>,
    pages_fetched: u32,
    soft_ended: bool,
}

impl RecordPages {
    /// Returns the next record, fetching the next page when the current one
    /// is exhausted.
    ///
    /// # Errors
    ///
    /// Returns an [`OaiError`] for fatal failures (see the module docs).
    pub async fn next_record(&mut self) -> Result<Option<HarvestedRecord>, OaiError> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                return Ok(Some(record));
            }

            let (url, continuation) = match std::mem::replace(&mut self.next, NextRequest::Done) {
                NextRequest::Done => return Ok(None),
                NextRequest::Start(params) => (self.client.initial_url(&params), false),
                NextRequest::Continue(token) => (self.client.continuation_url(&token), true),
            };

            match self.fetch_page(&url, continuation).await? {
                Some(page) => {
                    self.buffer.extend(page.records);
                    if let Some(token) = page.resumption_token {
                        self.next = NextRequest::Continue(token);
                    }
                }
                None => return Ok(None),
            }
        }
    }

    /// Drains the cursor into a vector.
    ///
    /// # Errors
    ///
    /// Returns the first fatal [`OaiError`]; records read before it are lost.
    pub async fn collect_records(mut self) -> Result<Vec<HarvestedRecord>, OaiError> {
        let mut records = Vec::new();
        while let Some(record) = self.next_record().await? {
            records.push(record);
        }
        Ok(records)
    }

    /// Number of pages successfully downloaded so far.
    #[must_use]
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// True when records were lost: a continuation failure cut the sequence
    /// short, or a page was only partially decoded.
    #[must_use]
    pub fn soft_ended(&self) -> bool {
        self.soft_ended
    }

    /// Fetches and decodes one page. `Ok(None)` means the sequence soft-ended.
    #[instrument(level = "debug", skip(self, url), fields(url = %url))]
    async fn fetch_page(&mut self, url: &Url, continuation: bool) -> Result<Option<Page>, OaiError> {
        let body = match self.client.fetch(url).await {
            Ok(body) => body,
            Err(err) if continuation && err.is_transient() => {
                warn!(
                    url = %url,
                    error = %err,
                    pages = self.pages_fetched,
                    "continuation request failed; ending harvest with records already read"
                );
                self.soft_ended = true;
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        self.pages_fetched += 1;

        let document = decode(&body, self.client.parse_mode)
            .map_err(|e| OaiError::parse(url.as_str(), e))?;
        let page = parse_page(&document.root)?;
        if !document.complete {
            warn!(
                url = %url,
                records = page.records.len(),
                "page only partially decoded; records after the malformed markup are lost"
            );
            self.soft_ended = true;
        }

        info!(
            page = self.pages_fetched,
            records = page.records.len(),
            has_token = page.resumption_token.is_some(),
            "fetched ListRecords page"
        );
        Ok(Some(page))
    }
}

/// Records and continuation token extracted from one response.
#[derive(Debug)]
struct Page {
    records: Vec<HarvestedRecord>,
    resumption_token: Option<String>,
}

fn parse_page(root: &XmlElement) -> Result<Page, OaiError> {
    if let Some(error) = root.find_descendant(Some(OAI_NS), "error") {
        let code = error.attribute("code").unwrap_or_default();
        return Err(OaiError::protocol(code, error.text().trim()));
    }

    let records = root
        .find_descendants(Some(OAI_NS), "record")
        .into_iter()
        .filter_map(extract_record)
        .collect();

    let resumption_token = root
        .find_descendant(Some(OAI_NS), "resumptionToken")
        .and_then(XmlElement::trimmed_text)
        .map(str::to_string);

    Ok(Page {
        records,
        resumption_token,
    })
}

fn extract_record(record: &XmlElement) -> Option<HarvestedRecord> {
    let Some(identifier) = record
        .child(Some(OAI_NS), "header")
        .and_then(|header| header.child(Some(OAI_NS), "identifier"))
        .and_then(XmlElement::trimmed_text)
    else {
        debug!("skipping record without identifier");
        return None;
    };

    let container = record.child(Some(OAI_NS), "metadata").and_then(|metadata| {
        metadata
            .child(Some(OAI_DC_NS), "dc")
            .or_else(|| metadata.child(Some(DC_NS), "dc"))
    });
    let Some(container) = container else {
        debug!(identifier, "skipping record without Dublin Core metadata");
        return None;
    };

    Some(HarvestedRecord {
        identifier: identifier.to_string(),
        metadata: container.clone(),
    })
}
