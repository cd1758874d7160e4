use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub struct Config {
    pub credentials: Credentials,
    pub crawl: CrawlConfig,
    pub out_dir: PathBuf,
}

pub struct Credentials {
    pub username: String,
    pub password: String,
}

// Keeps the password out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Upper bound on listing pages walked per location.
    pub max_pages: usize,
    /// Requested concurrent location crawls; clamped by the orchestrator.
    pub workers: usize,
    /// Page cache lifetime in seconds; 0 disables caching.
    pub cache_ttl_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn debug_output_should_redact_the_password() {
        let credentials = Credentials {
            username: "frivillig".to_string(),
            password: "hemmelig".to_string(),
        };

        let printed = format!("{credentials:?}");

        assert!(printed.contains("frivillig"));
        assert!(!printed.contains("hemmelig"));
    }
}
