use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::POINTS_PER_CORRECT;
use crate::store::operations::wrong_answers::WrongAnswerCounter;

use super::{OptionLetter, RunQuestion};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeSummary {
    pub total_questions: u32,
    pub total_answered: u32,
    pub correct_count: u32,
    pub wrong_count: u32,
    pub unanswered: u32,
    /// 以总题数为分母，未作答等同答错
    pub accuracy: u32,
    /// 以作答数为分母的辅助指标
    pub answer_accuracy: u32,
    pub score: u32,
    pub duration_secs: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graded {
    pub question_id: String,
    pub selected: OptionLetter,
    pub is_correct: bool,
}

/// 四舍五入（半数进位）的百分比，分母为 0 时返回 0。整数运算，0.5 边界精确进位。
pub fn percent(numerator: u32, denominator: u32) -> u32 {
    if denominator == 0 {
        return 0;
    }
    let (n, d) = (u64::from(numerator), u64::from(denominator));
    ((200 * n + d) / (2 * d)) as u32
}

/// 按题目顺序判分，只包含已作答的题。
pub fn grade(questions: &[RunQuestion], answers: &BTreeMap<String, OptionLetter>) -> Vec<Graded> {
    questions
        .iter()
        .filter_map(|q| {
            answers.get(&q.question_id).map(|&selected| Graded {
                question_id: q.question_id.clone(),
                selected,
                is_correct: selected == q.correct_answer,
            })
        })
        .collect()
}

pub fn summarize(graded: &[Graded], total_questions: usize, duration_secs: i64) -> PracticeSummary {
    let total_questions = total_questions as u32;
    let total_answered = graded.len() as u32;
    let correct_count = graded.iter().filter(|g| g.is_correct).count() as u32;

    PracticeSummary {
        total_questions,
        total_answered,
        correct_count,
        wrong_count: total_answered - correct_count,
        unanswered: total_questions.saturating_sub(total_answered),
        accuracy: percent(correct_count, total_questions),
        answer_accuracy: percent(correct_count, total_answered),
        score: correct_count * POINTS_PER_CORRECT,
        duration_secs,
    }
}

/// 计算一道题判分后错题计数的新状态，`None` 表示无需写入。
///
/// 答错：已有记录则计数加一并清除 mastered，否则新建 count=1。
/// 答对：仅把已有且未掌握的记录置为 mastered，不会新建记录。
pub fn next_counter(
    user_id: &str,
    existing: Option<&WrongAnswerCounter>,
    graded: &Graded,
    now: DateTime<Utc>,
) -> Option<WrongAnswerCounter> {
    match (existing, graded.is_correct) {
        (Some(counter), false) => {
            let mut next = counter.clone();
            next.wrong_count += 1;
            next.mastered = false;
            next.last_wrong_at = now;
            next.updated_at = now;
            Some(next)
        }
        (None, false) => Some(WrongAnswerCounter::first_miss(
            user_id,
            &graded.question_id,
            now,
        )),
        (Some(counter), true) if !counter.mastered => {
            let mut next = counter.clone();
            next.mastered = true;
            next.updated_at = now;
            Some(next)
        }
        (Some(_), true) | (None, true) => None,
    }
}
