//! HTTP downloads for the installer script and the API client gem

use declarative::{Error, Result};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use ureq::tls::{PemItem, RootCerts, TlsConfig};

/// Largest body accepted from a download
const MAX_DOWNLOAD_SIZE: u64 = 256 * 1024 * 1024;

/// Retrieves a URL's body
pub trait Fetcher {
    /// Fetch `url`, trusting only the certificates in `ca_bundle` when given
    fn fetch(&self, url: &str, ca_bundle: Option<&Path>) -> Result<Vec<u8>>;
}

/// Fetcher backed by `ureq`
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpFetcher;

impl HttpFetcher {
    fn agent(url: &str, ca_bundle: Option<&Path>) -> Result<ureq::Agent> {
        let Some(bundle) = ca_bundle else {
            return Ok(ureq::Agent::new_with_defaults());
        };

        let pem = fs::read(bundle).map_err(|e| Error::io(bundle, e))?;
        let certs: Vec<_> = ureq::tls::parse_pem(&pem)
            .filter_map(|item| match item {
                Ok(PemItem::Certificate(cert)) => Some(cert.to_owned()),
                _ => None,
            })
            .collect();
        if certs.is_empty() {
            return Err(Error::Download {
                url: url.to_string(),
                message: format!("no certificates found in {}", bundle.display()),
            });
        }
        log::debug!(
            "Pinning {} root certificates from {}",
            certs.len(),
            bundle.display()
        );

        let tls = TlsConfig::builder()
            .root_certs(RootCerts::Specific(Arc::new(certs)))
            .build();
        let config = ureq::Agent::config_builder().tls_config(tls).build();
        Ok(ureq::Agent::new_with_config(config))
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, ca_bundle: Option<&Path>) -> Result<Vec<u8>> {
        let download_error = |message: String| Error::Download {
            url: url.to_string(),
            message,
        };

        log::info!("Downloading {}", url);
        let agent = Self::agent(url, ca_bundle)?;
        let mut response = agent
            .get(url)
            .header("User-Agent", concat!("chefboot/", env!("CARGO_PKG_VERSION")))
            .call()
            .map_err(|e| match e {
                ureq::Error::StatusCode(code) => download_error(format!("HTTP {}", code)),
                other => download_error(other.to_string()),
            })?;

        let bytes = response
            .body_mut()
            .with_config()
            .limit(MAX_DOWNLOAD_SIZE)
            .read_to_vec()
            .map_err(|e| download_error(format!("failed to read response body: {}", e)))?;

        log::debug!("Downloaded {} bytes from {}", bytes.len(), url);
        Ok(bytes)
    }
}
