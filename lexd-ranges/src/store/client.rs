//! REST client for a BaseX-style XML database
//!
//! Queries are posted to `{base_url}/rest/{database}` wrapped in the REST
//! query envelope. Transport failures and non-success responses surface as
//! `Error::Store`; retry policy belongs to the caller.

use crate::store::CanonicalStore;
use async_trait::async_trait;
use lexd_common::{Error, Result};
use tracing::debug;

/// Canonical store connector over HTTP
pub struct XmlDbClient {
    http: reqwest::Client,
    base_url: String,
    database: String,
    username: String,
    password: String,
}

impl XmlDbClient {
    pub fn new(
        base_url: impl Into<String>,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Store(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            database: database.into(),
            username: username.into(),
            password: password.into(),
        })
    }

    fn rest_url(&self) -> String {
        format!("{}/rest/{}", self.base_url, self.database)
    }

    async fn post_query(&self, query: &str) -> Result<String> {
        debug!(database = %self.database, query_len = query.len(), "Posting query");

        let body = format!(
            "<query xmlns=\"http://basex.org/rest\"><text>{}</text></query>",
            escape_text(query)
        );

        let response = self
            .http
            .post(self.rest_url())
            .basic_auth(&self.username, Some(&self.password))
            .header("Content-Type", "application/xml")
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Store(format!("Canonical store unreachable: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Store(format!("Failed to read store response: {}", e)))?;

        if !status.is_success() {
            return Err(Error::Store(format!(
                "Query rejected ({}): {}",
                status, text
            )));
        }

        Ok(text)
    }
}

#[async_trait]
impl CanonicalStore for XmlDbClient {
    async fn connect(&self) -> Result<()> {
        let response = self
            .http
            .get(format!("{}/rest", self.base_url))
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|e| Error::Store(format!("Canonical store unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Store(format!(
                "Canonical store rejected connection: {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connect().await.is_ok()
    }

    async fn execute_query(&self, query: &str) -> Result<String> {
        self.post_query(query).await
    }

    async fn execute_update(&self, query: &str) -> Result<()> {
        self.post_query(query).await.map(|_| ())
    }

    fn database(&self) -> &str {
        &self.database
    }
}

fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalized() {
        let client = XmlDbClient::new("http://localhost:8984/", "lexicon", "admin", "x").unwrap();
        assert_eq!(client.rest_url(), "http://localhost:8984/rest/lexicon");
        assert_eq!(client.database(), "lexicon");
    }

    #[test]
    fn test_query_body_escaped() {
        assert_eq!(
            escape_text("<range id='a'> & more"),
            "&lt;range id='a'&gt; &amp; more"
        );
    }
}
