//! Built-in content served when no provider produced a usable answer.
//!
//! Everything here is static and schema-valid, so the fallback branch of a
//! generation run cannot fail.

use crate::domain::{GenerationOutput, GenerationRequest, OutputKind, QuizQuestion, QuizType, SummaryResult};

struct SeedQuestion {
  question: &'static str,
  options: [&'static str; 4],
  answer: &'static str,
}

const MULTIPLE_CHOICE_SEEDS: [SeedQuestion; 5] = [
  SeedQuestion {
    question: "Who read out the Proclamation of Indonesian Independence?",
    options: ["Mohammad Hatta", "Soekarno", "Sutan Sjahrir", "Ki Hajar Dewantara"],
    answer: "Soekarno",
  },
  SeedQuestion {
    question: "When was the Proclamation of Indonesian Independence read?",
    options: ["16 August 1945", "17 August 1945", "18 August 1945", "15 August 1945"],
    answer: "17 August 1945",
  },
  SeedQuestion {
    question: "What is the foundational philosophy of the Indonesian state?",
    options: ["The 1945 Constitution", "Pancasila", "Bhinneka Tunggal Ika", "Garuda Pancasila"],
    answer: "Pancasila",
  },
  SeedQuestion {
    question: "Who was the first vice president of Indonesia?",
    options: ["Soekarno", "Mohammad Hatta", "Sutan Sjahrir", "Tan Malaka"],
    answer: "Mohammad Hatta",
  },
  SeedQuestion {
    question: "What does 'Bhinneka Tunggal Ika' mean?",
    options: ["Unity in diversity", "One for all", "Strength through unity", "United we stand"],
    answer: "Unity in diversity",
  },
];

const ESSAY_SEEDS: [(&str, &str); 5] = [
  (
    "Explain how the Proclamation of Indonesian Independence was prepared and the role the key figures played in it.",
    "Should cover: the preparatory committee (PPKI), the roles of Soekarno and Hatta, the Rengasdengklok incident, drafting the proclamation text, and its reading on 17 August 1945.",
  ),
  (
    "Analyse why Pancasila matters as the foundation of the Indonesian state and how it is applied in national life.",
    "Should cover: the philosophy of Pancasila, its fit with Indonesia's diversity, its place in the 1945 Constitution, and its application in everyday life.",
  ),
  (
    "What role did young people play in the struggle for independence, and how is that relevant to young people today?",
    "Should cover: the Youth Pledge, youth in the independence struggle, and the challenges young people face in the modern era.",
  ),
  (
    "Explain the meaning of national unity in the context of 'Bhinneka Tunggal Ika'.",
    "Should cover: diversity of ethnicity, religion, race and social groups, and the effort to stay united despite differences.",
  ),
  (
    "Describe the impact of the Proclamation of Independence on Indonesia and on the wider world.",
    "Should cover: political, social and economic effects at home, international recognition, and Indonesia's position in the world.",
  ),
];

const SUMMARY_SEED: &str = "Indonesia has been independent since 17 August 1945, when Soekarno read the Proclamation of Independence. The state rests on Pancasila as its ideology and philosophy, with the 1945 Constitution as its supreme law. Mohammad Hatta served as the first vice president alongside Soekarno.

The country's diversity is captured in the motto 'Bhinneka Tunggal Ika', meaning unity in diversity: despite many ethnic groups, religions and social groups, Indonesia remains one nation.

The independence struggle involved many groups, young people above all, and the proclamation mattered not only to Indonesia but to the wider wave of decolonisation.";

const SUMMARY_KEY_POINTS: [&str; 5] = [
  "The Proclamation of Indonesian Independence was read by Soekarno on 17 August 1945",
  "Pancasila, made of five principles, is the foundation of the Indonesian state",
  "Mohammad Hatta was Indonesia's first vice president",
  "The 1945 Constitution is the highest legal foundation of the state",
  "Bhinneka Tunggal Ika is the national motto of unity in diversity",
];

/// Canned quiz, sliced to `count` (at least one question is always returned).
pub fn fallback_quiz(quiz_type: QuizType, count: usize) -> Vec<QuizQuestion> {
  let take = count.max(1);
  match quiz_type {
    QuizType::MultipleChoice => MULTIPLE_CHOICE_SEEDS
      .iter()
      .take(take)
      .map(|s| QuizQuestion {
        question: s.question.into(),
        options: Some(s.options.iter().map(|o| o.to_string()).collect()),
        correct_answer: s.answer.into(),
        kind: QuizType::MultipleChoice,
      })
      .collect(),
    QuizType::Essay => ESSAY_SEEDS
      .iter()
      .take(take)
      .map(|(q, a)| QuizQuestion {
        question: (*q).into(),
        options: None,
        correct_answer: (*a).into(),
        kind: QuizType::Essay,
      })
      .collect(),
  }
}

pub fn fallback_summary() -> SummaryResult {
  SummaryResult {
    summary: SUMMARY_SEED.into(),
    key_points: SUMMARY_KEY_POINTS.iter().map(|p| p.to_string()).collect(),
  }
}

/// Fallback payload matching the shape the request asked for.
pub fn fallback_output(request: &GenerationRequest) -> GenerationOutput {
  match request.output_kind {
    OutputKind::Quiz => GenerationOutput::Quiz(fallback_quiz(
      request.quiz_type.unwrap_or(QuizType::MultipleChoice),
      request.question_count,
    )),
    OutputKind::Summary => GenerationOutput::Summary(fallback_summary()),
  }
}
