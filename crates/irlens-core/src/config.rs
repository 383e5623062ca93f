use crate::{report::parse_pipeline, IrError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What to run and on which functions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectConfig {
    pub pipeline: Vec<String>,
    /// Only analyze these functions; empty means all of them.
    pub functions: Vec<String>,
    pub collect_stats: bool,
}

impl Default for InspectConfig {
    fn default() -> Self {
        Self {
            pipeline: vec!["aa-inspector".to_string(), "derived-iv".to_string()],
            functions: Vec::new(),
            collect_stats: false,
        }
    }
}

impl InspectConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).map_err(|e| IrError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| IrError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    pub fn with_pipeline(mut self, text: &str) -> Result<Self> {
        self.pipeline = parse_pipeline(text)?;
        Ok(self)
    }

    pub fn with_functions(mut self, functions: Vec<String>) -> Self {
        if !functions.is_empty() {
            self.functions = functions;
        }
        self
    }

    pub fn selects(&self, function: &str) -> bool {
        self.functions.is_empty() || self.functions.iter().any(|f| f == function)
    }

    fn validate(&self) -> Result<()> {
        parse_pipeline(&self.pipeline.join(","))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_partial_json() {
        let config = InspectConfig::from_json(r#"{ "collect_stats": true }"#).unwrap();
        assert_eq!(config.pipeline, vec!["aa-inspector", "derived-iv"]);
        assert!(config.collect_stats);
        assert!(config.selects("anything"));
    }

    #[test]
    fn test_function_filter() {
        let config = InspectConfig::default().with_functions(vec!["bar".into()]);
        assert!(config.selects("bar"));
        assert!(!config.selects("foo"));
        assert_eq!(InspectConfig::default().with_functions(Vec::new()), InspectConfig::default());
    }

    #[test]
    fn test_rejects_unknown_pass_and_bad_json() {
        assert!(matches!(
            InspectConfig::from_json(r#"{ "pipeline": ["gvn"] }"#),
            Err(IrError::UnknownPass(_))
        ));
        assert!(matches!(InspectConfig::from_json("{"), Err(IrError::Config(_))));
        assert!(matches!(
            InspectConfig::from_json(r#"{ "pipeline": [] }"#),
            Err(IrError::EmptyPipeline)
        ));
    }

    #[test]
    fn test_pipeline_override() {
        let config = InspectConfig::default().with_pipeline("derived-iv").unwrap();
        assert_eq!(config.pipeline, vec!["derived-iv"]);
    }
}
