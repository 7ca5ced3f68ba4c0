use crate::qv::*;

use serde::{Deserialize, Serialize};

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct FormSettings {
    #[serde(rename = "formTitle")]
    pub form_title: Option<String>,
    pub budget: Option<u32>,
    #[serde(rename = "identityCacheTtlSeconds")]
    pub identity_cache_ttl_seconds: Option<u64>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct QvOption {
    pub name: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct StoreSource {
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "worksheetName")]
    pub worksheet_name: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct QvConfig {
    #[serde(rename = "formSettings")]
    pub form_settings: FormSettings,
    pub options: Vec<QvOption>,
    pub store: StoreSource,
}

pub const DEFAULT_STORE_PATH: &str = "responses.csv";
pub const DEFAULT_WORKSHEET_NAME: &str = "Responses";

impl QvConfig {
    /// The built-in form: the default slate, a budget of 9 and a CSV store
    /// in the current directory.
    pub fn builtin() -> QvConfig {
        QvConfig {
            form_settings: FormSettings {
                form_title: Some("Podcast Name Voting — Quadratic Voting".to_string()),
                budget: None,
                identity_cache_ttl_seconds: None,
            },
            options: OptionCatalog::default_slate()
                .names()
                .iter()
                .map(|name| QvOption { name: name.clone() })
                .collect(),
            store: StoreSource {
                provider: "csv".to_string(),
                file_path: DEFAULT_STORE_PATH.to_string(),
                worksheet_name: None,
            },
        }
    }

    pub fn catalog(&self) -> QvResult<OptionCatalog> {
        let names: Vec<String> = self.options.iter().map(|o| o.name.clone()).collect();
        OptionCatalog::new(&names).context(CatalogSnafu {})
    }

    pub fn budget(&self) -> CreditBudget {
        self.form_settings
            .budget
            .map(CreditBudget)
            .unwrap_or_default()
    }

    pub fn identity_cache_ttl(&self) -> Duration {
        self.form_settings
            .identity_cache_ttl_seconds
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_IDENTITY_TTL)
    }

    pub fn worksheet_name(&self) -> String {
        self.store
            .worksheet_name
            .clone()
            .unwrap_or_else(|| DEFAULT_WORKSHEET_NAME.to_string())
    }
}

/// Reads the configuration. A relative store path is resolved against the
/// directory of the configuration file.
pub fn read_config(path: &str) -> QvResult<QvConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let mut config: QvConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    let store_p = Path::new(&config.store.file_path);
    if store_p.is_relative() {
        let root_p = Path::new(path).parent().context(MissingParentDirSnafu {})?;
        config.store.file_path = root_p.join(store_p).display().to_string();
    }
    debug!("read_config: {:?}", config);
    Ok(config)
}
