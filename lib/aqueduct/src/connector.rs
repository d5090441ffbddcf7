//! TLS connector for the default transport.

use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;

/// Builds the rustls-backed connector used by
/// [`HyperTransport`](crate::HyperTransport).
///
/// Trusts the webpki (Mozilla) roots, accepts plain-HTTP URLs for local
/// testing, and negotiates HTTP/1.1 or HTTP/2 over TLS. Exposed so a
/// custom [`Transport`](crate::Transport) can reuse the same TLS setup.
#[must_use]
pub fn https_connector() -> HttpsConnector<HttpConnector> {
    let roots: rustls::RootCertStore = webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();

    let tls = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    HttpsConnectorBuilder::new()
        .with_tls_config(tls)
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_a_connector() {
        let _connector = https_connector();
    }
}
