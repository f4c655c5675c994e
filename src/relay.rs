use percent_encoding::AsciiSet;
use percent_encoding::NON_ALPHANUMERIC;
use percent_encoding::utf8_percent_encode;
use url::Url;

pub const DEFAULT_RELAY_BASE: &str = "https://corsproxy.io/";

// Everything except the characters a URI component may carry unescaped.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// A public CORS relay that re-issues a request server-side. The target is
/// passed as the whole, percent-encoded query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relay {
    base: String,
}

impl Default for Relay {
    fn default() -> Self {
        Self {
            base: DEFAULT_RELAY_BASE.into(),
        }
    }
}

impl Relay {
    pub fn parse(base: &str) -> Result<Self, String> {
        let url = Url::parse(base).map_err(|e| format!("Failed to parse relay URL: {e}"))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!(
                "Relay URL must use http or https, got `{}`",
                url.scheme()
            ));
        }

        if url.query().is_some() {
            return Err("Relay URL can't carry a query, the target is appended as one".into());
        }

        Ok(Self {
            base: base.to_string(),
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn wrap(&self, destination: &str) -> String {
        format!("{}?{}", self.base, encode_component(destination))
    }
}

pub fn encode_component(input: &str) -> String {
    utf8_percent_encode(input, URI_COMPONENT).to_string()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn wraps_the_destination_as_the_query() {
        let relay = Relay::default();

        assert_eq!(
            relay.wrap("https://httpbin.org/post"),
            "https://corsproxy.io/?https%3A%2F%2Fhttpbin.org%2Fpost"
        );
    }

    #[test]
    fn encodes_like_a_uri_component() {
        assert_eq!(
            encode_component("https://x.test/a b?q=1&r=[2]#frag"),
            "https%3A%2F%2Fx.test%2Fa%20b%3Fq%3D1%26r%3D%5B2%5D%23frag"
        );
        assert_eq!(encode_component("-_.!~*'()"), "-_.!~*'()");
        assert_eq!(encode_component("café"), "caf%C3%A9");
        assert_eq!(encode_component(""), "");
    }

    #[test]
    fn parse_rejects_unusable_bases() {
        assert!(Relay::parse("https://relay.test/").is_ok());
        assert!(Relay::parse("http://127.0.0.1:8080/relay").is_ok());

        assert!(Relay::parse("not a url").is_err());
        assert!(Relay::parse("ftp://relay.test/").is_err());
        assert!(Relay::parse("https://relay.test/?url=").is_err());
    }
}
