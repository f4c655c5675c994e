use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "jsonsend.toml";

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub destination: Option<String>,
    pub method: Option<String>,
    pub relay: Option<RelaySection>,
    pub headers: Option<toml::Value>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct RelaySection {
    pub base_url: Option<String>,
    pub enabled: Option<bool>,
}
