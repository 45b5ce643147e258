use esg_quiz_backend::practice::OptionLetter;
use esg_quiz_backend::store::operations::questions::Question;
use esg_quiz_backend::store::Store;

/// 写入 `count` 道四选一题目，正确答案均为 A。
pub fn seed_questions(store: &Store, count: usize, category: &str) -> Vec<Question> {
    (0..count)
        .map(|idx| {
            let question = Question::new(
                &format!("{category} question {idx}"),
                vec![
                    "correct".to_string(),
                    "wrong b".to_string(),
                    "wrong c".to_string(),
                    "wrong d".to_string(),
                ],
                OptionLetter::A,
                category,
                2,
            );
            store.upsert_question(&question).expect("seed question");
            question
        })
        .collect()
}
