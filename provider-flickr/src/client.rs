//! Flickr photo search client
//!
//! Two sequential requests per search: page 1 to learn the page count, then
//! a uniformly random page within the reachable range.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, RetryPolicy};
use bytes::Bytes;
use core_runtime::config::PhotoSearchConfig;
use core_runtime::logging::redact_url;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::bbox::{choose_page, page_limit, BoundingBox};
use crate::error::{Result, SearchError};
use crate::types::{PhotosPage, SearchResponse};
use crate::PhotoSearch;

/// Photo search client for the Flickr REST API.
///
/// Never retries; a failed request is reported to the caller as is.
///
/// # Example
///
/// ```ignore
/// use provider_flickr::{FlickrClient, PhotoSearch};
///
/// let client = FlickrClient::new(http_client, PhotoSearchConfig::new(api_key));
/// let urls = client.search_by_location(37.0, -122.0).await?;
/// ```
pub struct FlickrClient {
    http_client: Arc<dyn HttpClient>,
    config: PhotoSearchConfig,
}

impl FlickrClient {
    pub fn new(http_client: Arc<dyn HttpClient>, config: PhotoSearchConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }

    pub fn config(&self) -> &PhotoSearchConfig {
        &self.config
    }

    /// Full request URL for one result page.
    fn search_url(&self, bbox: &BoundingBox, page: u32) -> String {
        let params = [
            ("method", self.config.method.clone()),
            ("api_key", self.config.api_key.clone()),
            ("bbox", bbox.to_param_string()),
            ("safe_search", self.config.safe_search.to_string()),
            ("extras", self.config.extras.clone()),
            ("format", self.config.format.clone()),
            ("nojsoncallback", "1".to_string()),
            ("per_page", self.config.per_page.to_string()),
            ("page", page.to_string()),
        ];

        let query: Vec<String> = params
            .iter()
            .map(|(name, value)| format!("{}={}", name, urlencoding::encode(value)))
            .collect();

        format!("{}?{}", self.config.base_url, query.join("&"))
    }

    async fn get(&self, url: &str) -> Result<HttpResponse> {
        let request = HttpRequest::get(url).timeout(self.config.request_timeout);
        let response = self
            .http_client
            .execute_with_retry(request, RetryPolicy::none())
            .await
            .map_err(|e| {
                warn!(url = %redact_url(url), error = %e, "Photo API request failed");
                SearchError::from(e)
            })?;

        if !response.is_success() {
            warn!(url = %redact_url(url), status = response.status, "Photo API returned error status");
            return Err(SearchError::http_status(
                response.status,
                &response.text_lossy(),
            ));
        }

        Ok(response)
    }

    #[instrument(skip(self, bbox), fields(bbox = %bbox.to_param_string()))]
    async fn search_page(&self, bbox: &BoundingBox, page: u32) -> Result<PhotosPage> {
        let url = self.search_url(bbox, page);
        debug!(url = %redact_url(&url), "Requesting search page");

        let response = self.get(&url).await?;
        SearchResponse::parse(&response.body)
    }

    /// Download the bytes behind a photo URL. Nothing is cached here.
    #[instrument(skip(self))]
    pub async fn fetch_image(&self, url: &str) -> Result<Bytes> {
        let response = self.get(url).await?;
        debug!(bytes = response.body.len(), "Image downloaded");
        Ok(response.body)
    }
}

#[async_trait]
impl PhotoSearch for FlickrClient {
    #[instrument(skip(self))]
    async fn search_by_location(&self, latitude: f64, longitude: f64) -> Result<Vec<String>> {
        let bbox = BoundingBox::around(
            latitude,
            longitude,
            self.config.bbox_half_width,
            self.config.bbox_half_height,
        );

        let first = self.search_page(&bbox, 1).await?;
        let limit = page_limit(first.pages, self.config.per_page, self.config.max_results_cap);
        if limit == 0 {
            info!("No photos near location");
            return Ok(Vec::new());
        }

        let page = choose_page(limit, &mut rand::thread_rng());
        let chosen = self.search_page(&bbox, page).await?;
        let urls = chosen.urls();

        info!(
            total_pages = first.pages,
            page,
            photo_count = urls.len(),
            "Photo search complete"
        );
        Ok(urls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use mockall::{mock, Sequence};
    use std::collections::HashMap;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
            async fn execute_with_retry(&self, request: HttpRequest, policy: RetryPolicy) -> BridgeResult<HttpResponse>;
            async fn is_connected(&self) -> bool;
        }
    }

    fn ok(body: &str) -> BridgeResult<HttpResponse> {
        Ok(HttpResponse {
            status: 200,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        })
    }

    fn query_param(url: &str, name: &str) -> Option<String> {
        let (_, query) = url.split_once('?')?;
        query.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            if key == name {
                urlencoding::decode(value).ok().map(|v| v.into_owned())
            } else {
                None
            }
        })
    }

    fn client(mock: MockHttpClient) -> FlickrClient {
        FlickrClient::new(Arc::new(mock), PhotoSearchConfig::new("test-key"))
    }

    const TWO_PHOTOS: &str = r#"{"stat":"ok","photos":{"page":1,"pages":1,"photo":[
        {"id":"1","url_m":"http://x/1.jpg"},{"id":"2","url_m":"http://x/2.jpg"}]}}"#;

    #[test]
    fn test_search_url_params() {
        let client = client(MockHttpClient::new());
        let bbox = BoundingBox::around(37.0, -122.0, 1.0, 1.0);
        let url = client.search_url(&bbox, 4);

        assert!(url.starts_with("https://api.flickr.com/services/rest/?"));
        assert_eq!(query_param(&url, "method").as_deref(), Some("flickr.photos.search"));
        assert_eq!(query_param(&url, "api_key").as_deref(), Some("test-key"));
        assert_eq!(query_param(&url, "bbox").as_deref(), Some("-123,36,-121,38"));
        assert_eq!(query_param(&url, "safe_search").as_deref(), Some("1"));
        assert_eq!(query_param(&url, "extras").as_deref(), Some("url_m"));
        assert_eq!(query_param(&url, "format").as_deref(), Some("json"));
        assert_eq!(query_param(&url, "nojsoncallback").as_deref(), Some("1"));
        assert_eq!(query_param(&url, "per_page").as_deref(), Some("21"));
        assert_eq!(query_param(&url, "page").as_deref(), Some("4"));
        assert!(url.contains("bbox=-123%2C36%2C-121%2C38"));
    }

    #[tokio::test]
    async fn test_two_requests_return_urls_in_order() {
        let mut mock = MockHttpClient::new();
        let mut seq = Sequence::new();

        mock.expect_execute_with_retry()
            .withf(|req, policy| {
                policy.max_attempts == 1 && query_param(&req.url, "page").as_deref() == Some("1")
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| ok(TWO_PHOTOS));
        mock.expect_execute_with_retry()
            .withf(|req, _| query_param(&req.url, "page").as_deref() == Some("1"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| ok(TWO_PHOTOS));

        let urls = client(mock).search_by_location(37.0, -122.0).await.unwrap();
        assert_eq!(urls, vec!["http://x/1.jpg", "http://x/2.jpg"]);
    }

    #[tokio::test]
    async fn test_random_page_within_limit() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute_with_retry()
            .withf(|req, _| query_param(&req.url, "page").as_deref() == Some("1"))
            .times(1)
            .returning(|_, _| ok(r#"{"stat":"ok","photos":{"pages":9999,"photo":[]}}"#));
        mock.expect_execute_with_retry()
            .withf(|req, _| {
                let page: u32 = query_param(&req.url, "page")
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(0);
                (1..=190).contains(&page)
            })
            .times(1)
            .returning(|_, _| ok(TWO_PHOTOS));

        let urls = client(mock).search_by_location(10.0, 10.0).await.unwrap();
        assert_eq!(urls.len(), 2);
    }

    #[tokio::test]
    async fn test_zero_pages_is_empty_success() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute_with_retry()
            .times(1)
            .returning(|_, _| ok(r#"{"stat":"ok","photos":{"page":1,"pages":0,"photo":[]}}"#));

        let urls = client(mock).search_by_location(0.0, -150.0).await.unwrap();
        assert!(urls.is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_is_network_error() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute_with_retry()
            .times(1)
            .returning(|_, _| Err(BridgeError::Transport("connection refused".to_string())));

        let err = client(mock).search_by_location(1.0, 1.0).await.unwrap_err();
        assert!(matches!(err, SearchError::Network(_)));
    }

    #[tokio::test]
    async fn test_non_2xx_is_http_status_error() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute_with_retry().times(1).returning(|_, _| {
            Ok(HttpResponse {
                status: 503,
                headers: HashMap::new(),
                body: Bytes::from_static(b"unavailable"),
            })
        });

        let err = client(mock).search_by_location(1.0, 1.0).await.unwrap_err();
        assert_eq!(
            err,
            SearchError::HttpStatus {
                status: 503,
                body: "unavailable".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_api_failure_on_second_request() {
        let mut mock = MockHttpClient::new();
        let mut seq = Sequence::new();
        mock.expect_execute_with_retry()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| ok(r#"{"stat":"ok","photos":{"pages":3,"photo":[]}}"#));
        mock.expect_execute_with_retry()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| ok(r#"{"stat":"fail","code":105,"message":"Service currently unavailable"}"#));

        let err = client(mock).search_by_location(1.0, 1.0).await.unwrap_err();
        assert!(matches!(err, SearchError::Api { .. }));
    }

    #[tokio::test]
    async fn test_fetch_image_returns_body() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute_with_retry()
            .withf(|req, _| req.url == "http://x/1.jpg")
            .times(1)
            .returning(|_, _| {
                Ok(HttpResponse {
                    status: 200,
                    headers: HashMap::new(),
                    body: Bytes::from_static(&[0xFF, 0xD8, 0xFF]),
                })
            });

        let bytes = client(mock).fetch_image("http://x/1.jpg").await.unwrap();
        assert_eq!(&bytes[..], &[0xFF, 0xD8, 0xFF]);
    }
}
