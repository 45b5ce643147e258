//! 练习会话：一次限时作答的完整生命周期。
//!
//! - [`run`]：会话状态机（作答草稿、导航、收藏、倒计时）
//! - [`scoring`]：交卷时的统计与错题本更新计划
//! - [`finalize`]：交卷写入（各写入互相独立、尽力而为）
//! - [`service`]：服务端驱动（加锁、补 tick、超时交卷）

pub mod finalize;
pub mod locks;
pub mod run;
pub mod scoring;
pub mod service;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::StoreError;

pub use run::{Advance, PracticeRun, RunQuestion, Tick};
pub use scoring::PracticeSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OptionLetter {
    A,
    B,
    C,
    D,
}

impl OptionLetter {
    pub const ALL: [OptionLetter; 4] = [Self::A, Self::B, Self::C, Self::D];

    pub fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
            Self::C => 2,
            Self::D => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }
}

impl fmt::Display for OptionLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionLetter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            "C" => Ok(Self::C),
            "D" => Ok(Self::D),
            other => Err(format!("invalid option letter: {other}")),
        }
    }
}

/// 题目来源：随机抽题、收藏题、错题本、指定分类。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PracticeMode {
    Random,
    Favorites,
    WrongAnswers,
    Category,
}

/// `NotStarted` 没有对应的变体：会话只能由 [`PracticeRun::start`] 创建，
/// 不存在的会话即未开始。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    InProgress,
    Finalizing,
    Finalized,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Finalizing => "finalizing",
            Self::Finalized => "finalized",
        }
    }
}

/// 交卷触发方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizeTrigger {
    Submitted,
    LastQuestion,
    TimeUp,
}

#[derive(Debug, Error)]
pub enum PracticeError {
    #[error("question set is empty")]
    NoContent,
    #[error("practice run is not in progress (status={})", .0.as_str())]
    NotInProgress(RunStatus),
    #[error("question {0} is not part of this practice run")]
    UnknownQuestion(String),
    #[error("practice run {0} not found")]
    RunNotFound(String),
    #[error("practice run belongs to another user")]
    NotOwner,
    #[error("invalid practice request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_letter_parses_case_insensitively() {
        assert_eq!(" b ".parse::<OptionLetter>().unwrap(), OptionLetter::B);
        assert!("E".parse::<OptionLetter>().is_err());
    }

    #[test]
    fn option_letter_index_round_trips() {
        for letter in OptionLetter::ALL {
            assert_eq!(OptionLetter::from_index(letter.index()), Some(letter));
        }
        assert_eq!(OptionLetter::from_index(4), None);
    }

    #[test]
    fn option_letter_serializes_uppercase() {
        let json = serde_json::to_string(&OptionLetter::D).unwrap();
        assert_eq!(json, "\"D\"");
    }
}
