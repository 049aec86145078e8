//! Article summarization prompts.
//!
//! The model receives the full article text and must answer with a JSON
//! object matching [`response_schema`]. Narrative sections are requested in
//! Korean; bibliographic fields stay in English.

use serde_json::{json, Value};

/// System instruction sent with every summarization request
pub const SYSTEM_INSTRUCTION: &str = "You are a research assistant tasked with summarizing academic articles. Your goal is to extract key information from the articles and present it in a structured format.";

/// User prompt template
/// Placeholders: {article}
pub const SUMMARY_PROMPT_TEMPLATE: &str = r#"ARTICLE: """{article}"""

---

## 1. Title

Provide the full title of the article in English, exactly as it appears in the original.
- DOI or URL:

## 2. Authors

List all authors in the order they appear, in English.

## 3. Publication Date

Provide the publication date in English, formatted as:
**Month Day, Year** (e.g., January 15, 2023).
- If only the year is provided, format as: **January 1, [Year]**.
- If only the month and year are provided, format as: **[Month] 1, [Year]**.

## 4. Journal

Provide the name of the journal or publication in English.

## 5. Keywords

List 5-7 keywords that best represent the article's content in English. Use keywords directly from the article if available; otherwise, infer them from the content.

## 6. 초록 (Abstract)

Summarize the abstract in 3-5 bullet points in Korean. Each point should be 1-2 sentences, covering:
- Research background
- Methods
- Main results (include important numerical results where possible)
- Conclusions

## 7. 연구 격차 또는 문제 제기 (Research Gap or Problem Statement)

In Korean, include the following:
- 문제 제기 (Research gap or problem):
    - Clearly state the limitations or issues in existing research.
    - Describe the specific problem the study aims to address.
- 중요성 (Significance):
    - Explain why this research gap or problem is significant to the field.
- 관련 연구 (Related previous studies):
    - Mention 1-3 relevant studies and how the current research differs from or improves upon them.

## 8. 연구 목적 (Objective)

Clearly state the main objective(s) or research question(s) of the study in Korean. Include hypotheses if any. If there are multiple objectives, list them numerically.

## 9. 연구 방법론 (Methodology)

Provide a detailed description of the research methodology in Korean, including:
- 연구 설계 (Research Design): the overarching design, its rationale and any theoretical framework.
- 제안된 방법 (Proposed Methods): each model or algorithm, novel techniques, and how they were implemented.
- 데이터셋 (Dataset): source, size, characteristics and preprocessing steps.

## 10. 실험 (Experiment)

Describe the experimental process and evaluation methods in Korean, including:
- 실험 환경 (Experimental Setup): computational environment, conditions and parameters.
- 평가 방법 (Evaluation Methods): every metric used and what it measures.
- 비교 분석 (Comparative Analysis): baselines, ablation studies and improvements over the baselines.

## 11. 연구 결과 및 토의 (Results and Discussions)

Present key findings and their interpretations in bullet points in Korean, including:
- 주요 결과 (Main Results): major results, with important numerical results.
- 결과 해석 (Interpretation of Results): the meaning of each major result.
- 시사점 (Implications): theoretical and practical implications and real-world applications.
- 한계점 (Limitations): limitations or biases in the methodology or data and their effect on validity.

## 12. 연구의 기여 (Contribution)

In Korean, include the following:
- 주요 기여점 (Main Contributions): primary contributions and new insights, methods or frameworks.
- 연구 격차 해결 (Addressing Research Gap/Problem): how the study addresses the gap from Section 7.
- 시사점과 적용성 (Implications and Applications): theoretical implications and practical applications.
- 한계점 및 향후 연구 (Limitations and Future Research): unresolved issues and future research directions.
"#;

/// Build the summarization prompt for one article text
pub fn build_summary_prompt(article: &str) -> String {
    SUMMARY_PROMPT_TEMPLATE.replace("{article}", article)
}

fn string_list() -> Value {
    json!({"type": "ARRAY", "items": {"type": "STRING"}})
}

/// Object schema whose fields are all required string lists
fn list_object(fields: &[&str]) -> Value {
    let properties: serde_json::Map<String, Value> = fields
        .iter()
        .map(|f| (f.to_string(), string_list()))
        .collect();
    json!({
        "type": "OBJECT",
        "required": fields,
        "properties": properties,
    })
}

/// Structured output schema for `generationConfig.responseSchema`
pub fn response_schema() -> Value {
    let methodology = json!({
        "type": "OBJECT",
        "required": ["Research Design", "Proposed Methods", "Dataset"],
        "properties": {
            "Research Design": string_list(),
            "Proposed Methods": string_list(),
            "Dataset": list_object(&["Source", "Size", "Characteristics", "Preprocessing Steps"]),
        }
    });

    json!({
        "type": "OBJECT",
        "required": [
            "Title",
            "Authors",
            "Publication Date",
            "Journal",
            "Keywords",
            "Abstract",
            "Research Gap Or Problem Statement",
            "Objective",
            "Methodology",
            "Experiment",
            "Results And Discussions",
            "Contribution"
        ],
        "properties": {
            "Title": {"type": "STRING"},
            "DOI or URL": {"type": "STRING"},
            "Authors": string_list(),
            "Publication Date": {"type": "STRING"},
            "Journal": {"type": "STRING"},
            "Keywords": string_list(),
            "Abstract": string_list(),
            "Research Gap Or Problem Statement":
                list_object(&["Research Gap", "Significance", "Related Studies"]),
            "Objective": string_list(),
            "Methodology": methodology,
            "Experiment":
                list_object(&["Experimental Setup", "Evaluation Methods", "Comparative Analysis"]),
            "Results And Discussions": list_object(&[
                "Main Results",
                "Result Interpretations",
                "Implications",
                "Limitations"
            ]),
            "Contribution": list_object(&[
                "Main Contributions",
                "Addressing Research Gap",
                "Implications And Applications",
                "Limitations And Future Research"
            ]),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_summary_prompt() {
        let prompt = build_summary_prompt("Title: Urban heat islands");
        assert!(prompt.starts_with(r#"ARTICLE: """Title: Urban heat islands""""#));
        assert!(prompt.contains("## 12. 연구의 기여 (Contribution)"));
        assert!(!prompt.contains("{article}"));
    }

    #[test]
    fn test_response_schema_shape() {
        let schema = response_schema();
        assert_eq!(schema["required"].as_array().map(Vec::len), Some(12));
        assert_eq!(schema["properties"]["DOI or URL"]["type"], "STRING");
        assert_eq!(
            schema["properties"]["Methodology"]["properties"]["Dataset"]["required"][3],
            "Preprocessing Steps"
        );
        assert_eq!(
            schema["properties"]["Methodology"]["required"],
            json!(["Research Design", "Proposed Methods", "Dataset"])
        );
        assert_eq!(
            schema["properties"]["Experiment"]["properties"]["Comparative Analysis"]["items"]["type"],
            "STRING"
        );
    }
}
