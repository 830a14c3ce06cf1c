use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Errors raised when parsing project selections from their wire strings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProjectParseError {
    #[error("unknown project type: {0}")]
    UnknownProjectType(String),
    #[error("unknown expertise level: {0}")]
    UnknownExpertiseLevel(String),
    #[error("unknown editor language: {0}")]
    UnknownLanguage(String),
}

//
// ─── PROJECT TYPE ─────────────────────────────────────────────────────────────
//

/// Tech stack the learner builds the project with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectType {
    #[serde(rename = "python+streamlit")]
    PythonStreamlit,
    #[serde(rename = "html+css+js")]
    HtmlCssJs,
}

impl ProjectType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProjectType::PythonStreamlit => "python+streamlit",
            ProjectType::HtmlCssJs => "html+css+js",
        }
    }

    /// Editor language the workspace opens with.
    #[must_use]
    pub fn initial_language(self) -> EditorLanguage {
        match self {
            ProjectType::PythonStreamlit => EditorLanguage::Python,
            ProjectType::HtmlCssJs => EditorLanguage::Html,
        }
    }
}

impl FromStr for ProjectType {
    type Err = ProjectParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "python+streamlit" => Ok(ProjectType::PythonStreamlit),
            "html+css+js" => Ok(ProjectType::HtmlCssJs),
            other => Err(ProjectParseError::UnknownProjectType(other.to_owned())),
        }
    }
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── EXPERTISE LEVEL ──────────────────────────────────────────────────────────
//

/// Self-declared skill level of the learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpertiseLevel {
    Beginner,
    Intermediate,
    Expert,
}

impl ExpertiseLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ExpertiseLevel::Beginner => "beginner",
            ExpertiseLevel::Intermediate => "intermediate",
            ExpertiseLevel::Expert => "expert",
        }
    }
}

impl FromStr for ExpertiseLevel {
    type Err = ProjectParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "beginner" => Ok(ExpertiseLevel::Beginner),
            "intermediate" => Ok(ExpertiseLevel::Intermediate),
            "expert" => Ok(ExpertiseLevel::Expert),
            other => Err(ProjectParseError::UnknownExpertiseLevel(other.to_owned())),
        }
    }
}

impl fmt::Display for ExpertiseLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── EDITOR LANGUAGE ──────────────────────────────────────────────────────────
//

/// One of the editor buffers a learner can type into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorLanguage {
    Html,
    Css,
    Javascript,
    Python,
}

impl EditorLanguage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EditorLanguage::Html => "html",
            EditorLanguage::Css => "css",
            EditorLanguage::Javascript => "javascript",
            EditorLanguage::Python => "python",
        }
    }
}

impl FromStr for EditorLanguage {
    type Err = ProjectParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "html" => Ok(EditorLanguage::Html),
            "css" => Ok(EditorLanguage::Css),
            "javascript" | "js" => Ok(EditorLanguage::Javascript),
            "python" => Ok(EditorLanguage::Python),
            other => Err(ProjectParseError::UnknownLanguage(other.to_owned())),
        }
    }
}

impl fmt::Display for EditorLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
