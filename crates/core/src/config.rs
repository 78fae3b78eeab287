use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub archive: Option<ArchiveConfig>,
    #[serde(default)]
    pub local: Option<LocalConfig>,
    #[serde(default)]
    pub iteration: IterationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    pub server: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Path of an XML search document; when absent the built-in CT scan
    /// query is generated instead.
    #[serde(default)]
    pub query_file: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalConfig {
    #[serde(default)]
    pub directory: Option<String>,
    #[serde(default)]
    pub manifest: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IterationConfig {
    #[serde(default)]
    pub skip_annotated: bool,
}

pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut settings = config::Config::builder();
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    let cfg = settings.build()?;
    Ok(cfg.try_deserialize()?)
}
