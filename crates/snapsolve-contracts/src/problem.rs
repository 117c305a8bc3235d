use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemExample {
    pub input: String,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeSnippet {
    pub language: String,
    pub code: String,
}

/// Problem statement extracted from screenshots.
///
/// The pipeline treats this as opaque: it is produced by `extract`, stored, and
/// handed back verbatim to `generate`/`debug`. Fields the backend adds beyond
/// the known ones are kept in `extra` so nothing is lost on the round trip.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<ProblemExample>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub code_snippets: Vec<CodeSnippet>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProblemInfo {
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .unwrap_or("Untitled problem")
    }
}

/// A generated or debugged solution. Debug responses name the code field
/// `new_code`; both decode into `code`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SolutionSet {
    #[serde(alias = "new_code")]
    pub code: String,
    #[serde(default)]
    pub thoughts: Vec<String>,
    #[serde(default)]
    pub time_complexity: String,
    #[serde(default)]
    pub space_complexity: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ProblemInfo, SolutionSet};

    #[test]
    fn problem_info_keeps_unknown_fields() {
        let raw = json!({
            "title": "Two Sum",
            "description": "Find two numbers that add to target.",
            "examples": [{"input": "[2,7,11,15], 9", "output": "[0,1]"}],
            "codeSnippets": [{"language": "python", "code": "def two_sum(): pass"}],
            "test_cases": [[1, 2]],
        });
        let info: ProblemInfo = serde_json::from_value(raw.clone()).unwrap();

        assert_eq!(info.display_title(), "Two Sum");
        assert_eq!(info.examples.len(), 1);
        assert_eq!(info.code_snippets[0].language, "python");
        assert_eq!(info.extra["test_cases"], json!([[1, 2]]));
        assert_eq!(serde_json::to_value(&info).unwrap(), raw);
    }

    #[test]
    fn missing_title_falls_back() {
        let info = ProblemInfo {
            title: Some("  ".to_string()),
            ..ProblemInfo::default()
        };
        assert_eq!(info.display_title(), "Untitled problem");
    }

    #[test]
    fn debug_response_new_code_decodes_into_code() {
        let solution: SolutionSet = serde_json::from_value(json!({
            "success": true,
            "new_code": "print(1)",
            "thoughts": ["off by one"],
            "time_complexity": "O(n)",
            "space_complexity": "O(1)",
        }))
        .unwrap();
        assert_eq!(solution.code, "print(1)");
        assert_eq!(solution.thoughts, vec!["off by one".to_string()]);
    }
}
