/// 每答对一题的得分（无部分分、无难度加权）
pub const POINTS_PER_CORRECT: u32 = 5;

/// 练习倒计时预算（秒）
pub const DEFAULT_TIME_BUDGET_SECS: u32 = 1800;

/// 随机练习默认题量
pub const DEFAULT_PRACTICE_SIZE: usize = 20;

/// 单次练习最大题量
pub const MAX_PRACTICE_SIZE: usize = 100;

/// 每道题最多选项数（A-D）
pub const MAX_OPTIONS: usize = 4;

/// 题目难度范围
pub const MIN_DIFFICULTY: u8 = 1;
pub const MAX_DIFFICULTY: u8 = 5;

/// AI 解析批处理：每批并发请求数
pub const DEFAULT_EXPLAIN_BATCH_SIZE: usize = 3;

/// AI 解析批处理：批次间隔（毫秒），用于规避限流
pub const DEFAULT_EXPLAIN_BATCH_DELAY_MS: u64 = 2000;

/// 失败率超过此比例才告警
pub const EXPLAIN_ALERT_FAILURE_RATIO: f64 = 0.2;

/// 失败数至少达到此值才告警
pub const EXPLAIN_ALERT_MIN_FAILURES: usize = 3;

/// 后台补全解析每次最多处理的题目数
pub const EXPLAIN_BACKFILL_LIMIT: usize = 30;

/// 列表接口默认分页大小
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// 列表接口最大分页大小
pub const MAX_PAGE_SIZE: u64 = 100;

/// 排行榜默认条数
pub const DEFAULT_LEADERBOARD_LIMIT: usize = 20;

/// 每用户最大并发登录会话数
pub const MAX_SESSIONS_PER_USER: usize = 10;

/// 已交卷的会话本体保留天数，之后仅保留练习记录
pub const FINISHED_RUN_RETENTION_DAYS: i64 = 7;
