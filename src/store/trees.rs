pub const USERS: &str = "users";
pub const SESSIONS: &str = "sessions";
pub const ADMINS: &str = "admins";
pub const ADMIN_SESSIONS: &str = "admin_sessions";
pub const CONFIG_VERSIONS: &str = "config_versions";

// Question bank
pub const QUESTIONS: &str = "questions";

// Practice
pub const PRACTICE_RUNS: &str = "practice_runs";
pub const PRACTICE_SESSIONS: &str = "practice_sessions";
pub const ANSWER_RECORDS: &str = "answer_records";
pub const WRONG_ANSWERS: &str = "wrong_answers";
pub const FAVORITES: &str = "favorites";

// AI explanation pipeline
pub const EXPLANATION_JOBS: &str = "explanation_jobs";
pub const OPERATOR_ALERTS: &str = "operator_alerts";
