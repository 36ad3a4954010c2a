use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CourseCategory {
    Programming,
    Business,
    Design,
    Marketing,
    #[serde(rename = "Data Science")]
    DataScience,
    Other,
}

impl CourseCategory {
    pub const ALL: [CourseCategory; 6] = [
        CourseCategory::Programming,
        CourseCategory::Business,
        CourseCategory::Design,
        CourseCategory::Marketing,
        CourseCategory::DataScience,
        CourseCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CourseCategory::Programming => "Programming",
            CourseCategory::Business => "Business",
            CourseCategory::Design => "Design",
            CourseCategory::Marketing => "Marketing",
            CourseCategory::DataScience => "Data Science",
            CourseCategory::Other => "Other",
        }
    }
}

impl fmt::Display for CourseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CourseCategory {
    type Err = String;

    /// Accepts the wire names plus case and separator variations
    /// (`data-science`, `DataScience`, `data_science`).
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = normalize(value);
        CourseCategory::ALL
            .into_iter()
            .find(|category| normalize(category.as_str()) == wanted)
            .ok_or_else(|| format!("unknown course category '{value}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    Desktop,
    Mobile,
    Tablet,
}

impl DeviceType {
    pub const ALL: [DeviceType; 3] = [DeviceType::Desktop, DeviceType::Mobile, DeviceType::Tablet];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Desktop => "Desktop",
            DeviceType::Mobile => "Mobile",
            DeviceType::Tablet => "Tablet",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = normalize(value);
        DeviceType::ALL
            .into_iter()
            .find(|device| normalize(device.as_str()) == wanted)
            .ok_or_else(|| format!("unknown device type '{value}'"))
    }
}

fn normalize(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Reads a category or device cell. Blank and unrecognized values both come
/// back as `None` so validation reports them as a missing selection.
fn lenient_selection<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|value| value.parse().ok()))
}

/// Behavioral metrics for one learner, serialized with the field names the
/// scoring service expects.
///
/// Category and device stay optional so an unselected value can be held and
/// rejected by validation instead of being defaulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerMetrics {
    #[serde(rename = "TimeSpentOnCourse")]
    pub time_spent_minutes: f64,
    #[serde(rename = "NumberOfVideosWatched")]
    pub videos_watched: i64,
    #[serde(rename = "NumberOfQuizzesTaken")]
    pub quizzes_taken: i64,
    #[serde(rename = "QuizScores")]
    pub average_quiz_score: f64,
    #[serde(rename = "CompletionRate")]
    pub completion_rate: f64,
    #[serde(rename = "CourseCategory", default, deserialize_with = "lenient_selection")]
    pub course_category: Option<CourseCategory>,
    #[serde(rename = "DeviceType", default, deserialize_with = "lenient_selection")]
    pub device_type: Option<DeviceType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DropoutRisk {
    Low,
    Medium,
    High,
}

impl fmt::Display for DropoutRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DropoutRisk::Low => "Low",
            DropoutRisk::Medium => "Medium",
            DropoutRisk::High => "High",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskPrediction {
    pub will_complete: bool,
    pub completion_probability: f64,
    pub dropout_risk: DropoutRisk,
    pub confidence: f64,
    pub input_data: LearnerMetrics,
}

#[derive(Debug, Clone)]
pub struct RiskSummary {
    pub risk: DropoutRisk,
    pub count: usize,
    pub avg_probability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Body of `POST /chat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub history: Vec<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatReply {
    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub model_loaded: bool,
    #[serde(rename = "gemini_api_configured", default)]
    pub assistant_configured: bool,
}
