use miette::Diagnostic;
use miette::NamedSource;
use miette::SourceSpan;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use thiserror::Error;
use toml::Value;

use crate::config::ConfigFile;
use crate::dispatcher::DEFAULT_DESTINATION;
use crate::dispatcher::HttpMethod;
use crate::relay::Relay;

pub struct Validator {
    config: ConfigFile,
    toml_src: String,
    file_name: String,
}

/// Request settings after the config file has been checked.
#[derive(Debug, Clone)]
pub struct Settings {
    pub destination: String,
    pub method: HttpMethod,
    pub relay: Option<Relay>,
    pub headers: HeaderMap,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            destination: DEFAULT_DESTINATION.into(),
            method: HttpMethod::Post,
            relay: Some(Relay::default()),
            headers: HeaderMap::new(),
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
#[error("Invalid field `{field}`: {message}")]
pub struct ValidationError {
    field: String,
    message: String,
    #[source_code]
    src: Option<NamedSource<String>>,
    #[label("invalid value here")]
    span: Option<SourceSpan>,
}

impl ValidationError {
    pub fn field(&self) -> &str {
        &self.field
    }
}

macro_rules! validation_err {
    ($field:expr, $msg:expr, $self:expr, $snippet:expr) => {
        ValidationError {
            field: $field.to_string(),
            message: $msg.to_string(),
            src: Some(NamedSource::new(
                $self.file_name.clone(),
                $self.toml_src.clone(),
            )),
            span: find_span($snippet, &$self.toml_src),
        }
    };
}

fn find_span(needle: &str, toml_src: &str) -> Option<SourceSpan> {
    toml_src
        .find(needle)
        .map(|start| SourceSpan::new(start.into(), needle.len()))
}

impl Validator {
    pub fn new(config: &ConfigFile, toml_src: &str, file_name: &str) -> Self {
        Self {
            config: config.clone(),
            toml_src: toml_src.into(),
            file_name: file_name.into(),
        }
    }

    pub fn validate(&self) -> Result<Settings, ValidationError> {
        let defaults = Settings::default();

        let destination = self
            .config
            .destination
            .clone()
            .unwrap_or(defaults.destination);

        let method = match &self.config.method {
            Some(method) => method
                .parse::<HttpMethod>()
                .map_err(|e| validation_err!("method", e, self, method))?,
            None => defaults.method,
        };

        let relay = self.validate_relay()?;

        let headers = match &self.config.headers {
            Some(value) => self.validate_headers(value)?,
            None => defaults.headers,
        };

        Ok(Settings {
            destination,
            method,
            relay,
            headers,
        })
    }

    fn validate_relay(&self) -> Result<Option<Relay>, ValidationError> {
        let Some(section) = &self.config.relay else {
            return Ok(Some(Relay::default()));
        };

        if section.enabled == Some(false) {
            return Ok(None);
        }

        match &section.base_url {
            Some(base_url) => Relay::parse(base_url)
                .map(Some)
                .map_err(|e| validation_err!("relay.base_url", e, self, base_url)),
            None => Ok(Some(Relay::default())),
        }
    }

    fn validate_headers(&self, value: &Value) -> Result<HeaderMap, ValidationError> {
        let Value::Table(map) = value else {
            return Err(validation_err!(
                "headers",
                format!("Expected a table for headers, got {value:?}"),
                self,
                "[headers]"
            ));
        };

        let mut header_map = HeaderMap::new();

        for (k, v) in map {
            let v_str = v.as_str().ok_or_else(|| {
                validation_err!(
                    format!("headers.{k}"),
                    format!("Header value must be a string, got {v:?}"),
                    self,
                    k
                )
            })?;

            let name = HeaderName::from_bytes(k.as_bytes()).map_err(|e| {
                validation_err!(
                    format!("headers.{k}"),
                    format!("Invalid header name `{k}`: {e}"),
                    self,
                    k
                )
            })?;

            let value = HeaderValue::from_str(v_str).map_err(|e| {
                validation_err!(
                    format!("headers.{k}"),
                    format!("Invalid header value for `{k}`: {e}"),
                    self,
                    v_str
                )
            })?;

            header_map.insert(name, value);
        }

        Ok(header_map)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn validate(src: &str) -> Result<Settings, ValidationError> {
        let config: ConfigFile = toml::from_str(src).unwrap();
        Validator::new(&config, src, "jsonsend.toml").validate()
    }

    #[test]
    fn empty_file_gives_the_defaults() {
        let settings = validate("").unwrap();

        assert_eq!(settings.destination, "https://httpbin.org/post");
        assert_eq!(settings.method, HttpMethod::Post);
        assert_eq!(settings.relay, Some(Relay::default()));
        assert!(settings.headers.is_empty());
    }

    #[test]
    fn reads_a_full_file() {
        let settings = validate(
            r#"
            destination = "http://localhost:3000/users"
            method = "GET"

            [relay]
            base_url = "http://localhost:8080/"

            [headers]
            X-Client = "jsonsend"
            "#,
        )
        .unwrap();

        assert_eq!(settings.destination, "http://localhost:3000/users");
        assert_eq!(settings.method, HttpMethod::Get);
        assert_eq!(settings.relay.unwrap().base(), "http://localhost:8080/");
        assert_eq!(settings.headers["x-client"], "jsonsend");
    }

    #[test]
    fn relay_can_be_disabled() {
        let settings = validate("[relay]\nenabled = false\n").unwrap();

        assert!(settings.relay.is_none());
    }

    #[test]
    fn bad_method_points_at_the_value() {
        let src = "method = \"DELETE\"\n";
        let err = validate(src).unwrap_err();

        assert_eq!(err.field(), "method");
        let span = err.span.unwrap();
        assert_eq!(&src[span.offset()..span.offset() + span.len()], "DELETE");
    }

    #[test]
    fn bad_relay_is_rejected() {
        let err = validate("[relay]\nbase_url = \"corsproxy\"\n").unwrap_err();

        assert_eq!(err.field(), "relay.base_url");
    }

    #[test]
    fn header_values_must_be_strings() {
        let err = validate("[headers]\nX-Retries = 3\n").unwrap_err();

        assert_eq!(err.field(), "headers.X-Retries");
        assert!(err.to_string().contains("must be a string"));
    }

    #[test]
    fn header_names_must_be_valid() {
        let err = validate("[headers]\n\"bad header\" = \"x\"\n").unwrap_err();

        assert!(err.to_string().contains("Invalid header name"));
    }

    #[test]
    fn headers_must_be_a_table() {
        let err = validate("headers = \"x\"\n").unwrap_err();

        assert_eq!(err.field(), "headers");
    }
}
