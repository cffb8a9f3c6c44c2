use orchestrator_core::{Error, Result};
use serde_json::{Map, Value};

/// Resolves a JSON patch value held by an external service.
#[async_trait::async_trait]
pub trait ValueResolver: Send + Sync {
    /// Returns the `value` field of the document served at `url`.
    async fn resolve(&self, url: &str) -> Result<Value>;
}

/// Reads patch values with an HTTP GET.
///
/// Requests carry no timeout: a stalled service stalls the apply.
#[derive(Clone, Debug, Default)]
pub struct HttpValueResolver {
    client: reqwest::Client,
}

// === impl HttpValueResolver ===

impl HttpValueResolver {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ValueResolver for HttpValueResolver {
    async fn resolve(&self, url: &str) -> Result<Value> {
        let url = reqwest::Url::parse(url)
            .map_err(|error| Error::validation(format!("invalid patch value URL {url}: {error}")))?;

        let rsp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|error| Error::downstream(format!("failed to get {url}"), error))?;
        let status = rsp.status();
        if status != reqwest::StatusCode::OK {
            tracing::error!(%url, %status, "Unexpected status code when reading patch value");
            return Err(Error::downstream(
                format!("unexpected status code when reading patch value from {url}"),
                format!("response: {status}, code: {}", status.as_u16()),
            ));
        }

        let mut body = rsp
            .json::<Map<String, Value>>()
            .await
            .map_err(|error| Error::downstream(format!("failed to decode {url}"), error))?;
        body.remove("value").ok_or_else(|| {
            Error::downstream(
                format!("unexpected patch value from {url}"),
                format!("response: {}", Value::Object(body)),
            )
        })
    }
}

/// Returns the URL embedded in a `$(http...)$` patch value, with the `{clusterProvider}` and
/// `{cluster}` placeholders substituted.
pub(super) fn embedded_url(value: &str, provider: &str, cluster: &str) -> Option<String> {
    if !value.starts_with("$(http") || !value.ends_with(")$") {
        return None;
    }
    let url = value.replace("$(", "").replace(")$", "");
    if !url.contains("/{") {
        return Some(url);
    }
    Some(
        url.replace("{clusterProvider}", provider)
            .replace("{cluster}", cluster),
    )
}
