use std::sync::Arc;

use axum::Router;
use tempfile::TempDir;
use tokio::sync::broadcast;

use esg_quiz_backend::config::{
    Config, ExplainConfig, LLMConfig, PracticeConfig, RateLimitConfig, WorkerConfig,
};
use esg_quiz_backend::routes::build_router;
use esg_quiz_backend::state::AppState;
use esg_quiz_backend::store::Store;

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub config: Config,
    _temp_dir: TempDir,
}

pub struct TestOptions {
    pub api_limit: u64,
    pub time_budget_secs: u32,
    pub llm_enabled: bool,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            api_limit: 1000,
            time_budget_secs: 600,
            llm_enabled: false,
        }
    }
}

pub async fn spawn_with(options: TestOptions) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let sled_path = temp_dir.path().join("quiz-test.sled");

    // 直接构造 Config，避免 set_var 在并行测试间串扰
    let config = Config {
        host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
        port: 3000,
        log_level: "info".to_string(),
        log_json: false,
        enable_file_logs: false,
        log_dir: "./logs".to_string(),
        sled_path: sled_path.to_string_lossy().to_string(),
        jwt_secret: format!("integration-test-jwt-secret-{}", uuid::Uuid::new_v4()),
        jwt_expires_in_hours: 24,
        admin_jwt_secret: format!("integration-test-admin-secret-{}", uuid::Uuid::new_v4()),
        cors_origin: "http://localhost:5173".to_string(),
        trust_proxy: false,
        rate_limit: RateLimitConfig {
            window_secs: 60,
            max_requests: options.api_limit,
        },
        worker: WorkerConfig {
            is_leader: false,
            enable_explanation_worker: false,
        },
        practice: PracticeConfig {
            time_budget_secs: options.time_budget_secs,
            default_size: 5,
            max_size: 20,
        },
        llm: LLMConfig {
            enabled: options.llm_enabled,
            mock: true,
            api_url: String::new(),
            api_key: String::new(),
            model: "test-model".to_string(),
            timeout_secs: 5,
        },
        explain: ExplainConfig {
            batch_size: 3,
            batch_delay_ms: 0,
        },
    };

    let store = Arc::new(Store::open(&config.sled_path).expect("open store"));
    store.run_migrations().expect("run migrations");
    let (shutdown_tx, _) = broadcast::channel::<()>(8);
    let state = AppState::new(store, &config, shutdown_tx);
    let app = build_router(state.clone());

    TestApp {
        app,
        state,
        config,
        _temp_dir: temp_dir,
    }
}

pub async fn spawn_test_server() -> TestApp {
    spawn_with(TestOptions::default()).await
}

pub async fn spawn_test_server_with_limit(api_limit: u64) -> TestApp {
    spawn_with(TestOptions {
        api_limit,
        ..TestOptions::default()
    })
    .await
}
