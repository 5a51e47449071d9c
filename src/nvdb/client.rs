use super::error::FetchError;
use super::params::QueryParams;
use log::{debug, info, warn};
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Media type the NVDB read API expects for v3 JSON responses.
pub const NVDB_ACCEPT: &str = "application/vnd.vegvesen.nvdb-v3-rev1+json";

#[derive(Debug, Deserialize)]
struct WirePage {
    #[serde(default)]
    objekter: Option<Vec<Value>>,
    #[serde(default)]
    metadata: Option<WireMetadata>,
}

#[derive(Debug, Deserialize)]
struct WireMetadata {
    #[serde(default)]
    neste: Option<WireNext>,
}

#[derive(Debug, Deserialize)]
struct WireNext {
    #[serde(default)]
    href: Option<String>,
}

/// One decoded page: its objects and the link to the following page.
#[derive(Debug, Default)]
pub struct PageEnvelope {
    pub objects: Vec<Value>,
    pub next_link: Option<String>,
}

impl From<WirePage> for PageEnvelope {
    fn from(page: WirePage) -> Self {
        let next_link = page
            .metadata
            .and_then(|metadata| metadata.neste)
            .and_then(|neste| neste.href)
            .filter(|href| !href.trim().is_empty());

        PageEnvelope {
            objects: page.objekter.unwrap_or_default(),
            next_link,
        }
    }
}

/// Result of walking a collection.
///
/// `interrupted` holds the failure that cut pagination short. The objects
/// fetched before it are kept.
#[derive(Debug, Default)]
pub struct Harvest {
    pub objects: Vec<Value>,
    pub requests: usize,
    pub interrupted: Option<FetchError>,
}

impl Harvest {
    pub fn is_complete(&self) -> bool {
        self.interrupted.is_none()
    }
}

#[derive(Clone)]
pub struct NvdbClient {
    http: reqwest::Client,
    base_url: String,
}

impl NvdbClient {
    pub fn new(
        base_url: impl Into<String>,
        request_timeout: Option<Duration>,
    ) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("nvdb-harvest/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn collection_url(&self, collection_id: &str) -> String {
        format!("{}/vegobjekter/{}", self.base_url, collection_id)
    }

    /// Fetch every page of a road object collection.
    ///
    /// Pagination stops on an empty page, a missing `neste` link, or the
    /// first failed request. Failures never propagate: the objects fetched
    /// so far are returned and the error is kept in [`Harvest::interrupted`].
    /// Follow-up requests use the server's link as-is, without `params`.
    ///
    /// An empty page in the middle of a collection looks exactly like the end
    /// of the data, so both stop the walk.
    pub async fn fetch(&self, collection_id: &str, params: &QueryParams) -> Harvest {
        let url = self.collection_url(collection_id);
        info!("nvdb: fetching {} with params {:?}", url, params.to_pairs());

        let mut harvest = Harvest::default();
        let mut request = self.http.get(&url).query(&params.to_pairs());

        loop {
            harvest.requests += 1;

            let page = match self.fetch_page(request).await {
                Ok(page) => page,
                Err(err) => {
                    warn!(
                        "nvdb: request {} failed, keeping {} objects fetched so far: {}",
                        harvest.requests,
                        harvest.objects.len(),
                        err
                    );
                    harvest.interrupted = Some(err);
                    break;
                }
            };

            if page.objects.is_empty() {
                if harvest.requests == 1 {
                    info!("nvdb: first page returned 0 objects, no data for these criteria");
                } else {
                    info!("nvdb: page returned 0 objects, assuming end of data");
                }
                break;
            }

            let page_len = page.objects.len();
            harvest.objects.extend(page.objects);
            info!(
                "nvdb: fetched {} objects, total {}",
                page_len,
                harvest.objects.len()
            );

            match page.next_link {
                Some(link) => {
                    debug!("nvdb: following next link {}", link);
                    request = self.http.get(link);
                }
                None => break,
            }
        }

        info!(
            "nvdb: finished fetching, {} objects in {} requests",
            harvest.objects.len(),
            harvest.requests
        );
        harvest
    }

    async fn fetch_page(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<PageEnvelope, FetchError> {
        let response = request.header(ACCEPT, NVDB_ACCEPT).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::status(status, body));
        }

        let body = response.bytes().await?;
        let page: WirePage = serde_json::from_slice(&body)?;
        Ok(page.into())
    }
}
