/// Builds the public URIs handed back to clients.
#[derive(Debug, Clone)]
pub struct LinkBuilder {
    base_url: String,
}

impl LinkBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Canonical redirect URI for a short key.
    pub fn redirect_uri(&self, hash: &str) -> String {
        format!("{}/{}", self.base_url, hash)
    }

    pub fn qr_uri(&self, hash: &str) -> String {
        format!("{}/{}/qr", self.base_url, hash)
    }
}
