use std::sync::Arc;

use crate::config::{AiConfig, AppConfig};
use crate::store::{FileStore, MemoryStore, Store};
use crate::vision::{self, DisabledJudge, FaceJudge};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub config: Arc<AppConfig>,
    pub judge: Arc<dyn FaceJudge>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let snapshots = Arc::new(FileStore::new(&config.data_dir));
        let store = Arc::new(Store::open(snapshots).await);
        let judge = vision::from_config(&config.ai)?;
        Ok(Self {
            store,
            config,
            judge,
        })
    }

    pub fn from_parts(store: Arc<Store>, config: Arc<AppConfig>, judge: Arc<dyn FaceJudge>) -> Self {
        Self {
            store,
            config,
            judge,
        }
    }

    /// Test state: empty in-memory snapshots, disabled judge.
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            data_dir: "/tmp/facemark-test".into(),
            ai: AiConfig {
                api_key: None,
                model: "gemini-2.5-flash".into(),
                timeout_secs: 1,
            },
            match_quorum: 2,
        });
        Self {
            store: Arc::new(Store::empty(Arc::new(MemoryStore::new()))),
            config,
            judge: Arc::new(DisabledJudge),
        }
    }

    /// Test state with a scripted judge in place of the disabled one.
    pub fn fake_with_judge(judge: Arc<dyn FaceJudge>) -> Self {
        Self {
            judge,
            ..Self::fake()
        }
    }
}
