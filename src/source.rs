use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ChartError, Result};
use crate::record::file_name_for;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Somewhere daily log documents can be fetched from.
///
/// `Ok(None)` means the document does not exist, which is a permanent
/// absence for that date rather than a failure.
pub trait RecordSource: Send + Sync {
    fn fetch(&self, date: NaiveDate) -> Result<Option<String>>;

    /// Human readable location, used in log output.
    fn describe(&self) -> String;
}

/// Reads `<root>/DD-MM-YYYY.json` from the local file system.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl RecordSource for DirectorySource {
    fn fetch(&self, date: NaiveDate) -> Result<Option<String>> {
        let path = self.root.join(file_name_for(date));
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ChartError::Io { path, source }),
        }
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// Fetches `<base>/data/DD-MM-YYYY.json` over HTTP.
pub struct HttpSource {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpSource {
    pub fn new(base_url: &str) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(HTTP_TIMEOUT).build();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent,
        }
    }

    fn url_for(&self, date: NaiveDate) -> String {
        format!("{}/data/{}", self.base_url, file_name_for(date))
    }
}

impl RecordSource for HttpSource {
    fn fetch(&self, date: NaiveDate) -> Result<Option<String>> {
        let url = self.url_for(date);
        match self.agent.get(&url).set("Accept", "application/json").call() {
            Ok(resp) => resp.into_string().map(Some).map_err(|e| ChartError::Http {
                url,
                message: e.to_string(),
            }),
            Err(ureq::Error::Status(404, _)) => Ok(None),
            Err(ureq::Error::Status(code, r)) => {
                let body = r.into_string().unwrap_or_default();
                Err(ChartError::Http {
                    url,
                    message: format!("status {code}: {body}"),
                })
            }
            Err(e) => Err(ChartError::Http {
                url,
                message: e.to_string(),
            }),
        }
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn jan(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    #[test]
    fn directory_reads_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("10-01-2025.json"), "{\"workout\":[]}").unwrap();
        let source = DirectorySource::new(dir.path());
        assert_eq!(
            source.fetch(jan(10)).unwrap().as_deref(),
            Some("{\"workout\":[]}")
        );
    }

    #[test]
    fn directory_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectorySource::new(dir.path());
        assert!(source.fetch(jan(11)).unwrap().is_none());
    }

    #[test]
    fn http_fetches_document() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(GET).path("/data/10-01-2025.json");
            then.status(200).body("{\"workout\":[]}");
        });

        let source = HttpSource::new(&format!("{}/", server.base_url()));
        let body = source.fetch(jan(10)).unwrap();
        assert_eq!(body.as_deref(), Some("{\"workout\":[]}"));
        m.assert();
    }

    #[test]
    fn http_404_is_absent() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(GET).path("/data/12-01-2025.json");
            then.status(404).body("not found");
        });

        let source = HttpSource::new(&server.base_url());
        assert!(source.fetch(jan(12)).unwrap().is_none());
        m.assert();
    }

    #[test]
    fn http_server_error_is_reported() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(GET).path("/data/13-01-2025.json");
            then.status(500).body("boom");
        });

        let source = HttpSource::new(&server.base_url());
        match source.fetch(jan(13)).unwrap_err() {
            ChartError::Http { message, .. } => assert!(message.contains("500")),
            e => panic!("unexpected error: {e:?}"),
        }
        m.assert();
    }
}
