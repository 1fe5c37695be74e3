use rand::seq::IndexedRandom;
use rand::Rng;

use crate::models::question::QuestionType;
use crate::services::response_parser::ANSWER_SEPARATOR;
use crate::services::topics::TOPICS;

/// Prompt sent to the model together with the topic it was built around.
#[derive(Debug, Clone)]
pub struct GenerationPrompt {
    pub topic: &'static str,
    pub text: String,
}

pub fn instruction_for(question_type: QuestionType) -> &'static str {
    match question_type {
        QuestionType::Cloze => {
            "Generate a Cloze Test (文意選填). Create a single, cohesive article. Within the article, \
             create 10 blanks, numbered (1) to (10). Then, provide 12 multiple-choice options labeled \
             (A) through (L). Two of the options must be distractors."
        }
        QuestionType::ParagraphStructure => {
            "Generate a Paragraph Structure Test (篇章結構). Create a single, cohesive article with 4 \
             main paragraphs. The article should have 4 blank slots where these paragraphs should go, \
             numbered (1) to (4). Then, provide 5 paragraph options labeled (A) through (E). Four of \
             these options are the correct paragraphs in a jumbled order, and one is an irrelevant \
             distractor paragraph."
        }
        QuestionType::ReadingComprehension => {
            "Generate a Reading Comprehension Test (閱讀測驗). Create a single, cohesive article. \
             Then, design 3 challenging, inference-based multiple-choice questions, clearly numbered \
             1., 2., 3., each with options (A), (B), (C), (D). The questions should require a deep \
             understanding of the text's nuances, tone, and implied meaning, not just surface-level \
             information."
        }
        QuestionType::Mixed => {
            "Generate a Mixed Format Test (混合題型). Create a single, cohesive article. Then, design \
             a total of 5 challenging questions, clearly numbered 1. through 5. This set of questions \
             must include at least one multiple-choice question and at least one non-multiple-choice \
             question (e.g., fill-in-the-blank, short answer summarizing a key point)."
        }
    }
}

/// Picks a topic uniformly at random and builds the generation prompt.
pub fn build_prompt<R: Rng + ?Sized>(question_type: QuestionType, rng: &mut R) -> GenerationPrompt {
    let topic = TOPICS.choose(rng).copied().unwrap_or(TOPICS[0]);
    GenerationPrompt {
        topic,
        text: build_prompt_with_topic(question_type, topic),
    }
}

pub fn build_prompt_with_topic(question_type: QuestionType, topic: &str) -> String {
    format!(
        r#"
You are an expert AI creating English proficiency tests for advanced high school students in Taiwan. Your sole task is to generate a difficult, high-quality test based on the following strict instructions.

*** TASK: {task} ***

*** TOPIC FOR THE ARTICLE: {topic} ***

*** CRITICAL RULES - ADHERE STRICTLY ***

1.  **VOCABULARY LEVEL**: The vocabulary used in the article and questions MUST primarily consist of words from Taiwan's High School Entrance Exam vocabulary list, Levels 1-3. You may include a few simple, common words from Level 4, but the core of the test should be based on Levels 1-3. You are FORBIDDEN from using any words from Level 5 or higher. This is the most important rule.

2.  **ARTICLE LENGTH**: The main English article must be at least 450 words long. It should be engaging, coherent, and on the specified topic.

3.  **DIFFICULTY**: The questions and options must be extremely challenging. Use plausible distractors, subtle traps, and options that require careful critical thinking. Avoid simple, obvious answers.

4.  **OUTPUT FORMAT (MANDATORY)**:
    - Your entire response MUST be plain text.
    - DO NOT use any Markdown (like **, ##, *, -) or HTML.
    - The output must contain the article, questions, and options first.
    - After all English content, you MUST use the exact Chinese separator on a new line: {separator}
    - After the separator, provide the correct answers and a brief, clear analysis for each question in Traditional Chinese.

Generate the test now.
"#,
        task = instruction_for(question_type),
        topic = topic,
        separator = ANSWER_SEPARATOR,
    )
}
