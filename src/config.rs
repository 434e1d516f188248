use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AiConfig {
    /// No key means AI features run disabled rather than failing startup.
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory holding the snapshot entries.
    pub data_dir: PathBuf,
    pub ai: AiConfig,
    /// Affirmative judgments (of three reference images) required to accept
    /// a verification candidate.
    pub match_quorum: usize,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let data_dir = std::env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
        let ai = AiConfig {
            api_key,
            model: std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".into()),
            timeout_secs: std::env::var("GEMINI_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
        };

        let match_quorum = std::env::var("MATCH_QUORUM")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(2);
        anyhow::ensure!(
            (1..=3).contains(&match_quorum),
            "MATCH_QUORUM must be between 1 and 3"
        );

        Ok(Self {
            data_dir,
            ai,
            match_quorum,
        })
    }
}
