use tasse::engine::config::EngineConfig;

pub struct DefaultsConfig {
    pub solvent_name: String,
    pub first_snapshot: usize,
    pub engine: EngineConfig,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            solvent_name: "HOH".to_string(),
            first_snapshot: 0,
            engine: EngineConfig::default(),
        }
    }
}
