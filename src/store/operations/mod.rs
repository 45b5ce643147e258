pub mod admins;
pub mod alerts;
pub mod explanation_jobs;
pub mod favorites;
pub mod practice_runs;
pub mod practice_sessions;
pub mod questions;
pub mod sessions;
pub mod users;
pub mod wrong_answers;
