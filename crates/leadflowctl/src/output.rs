//! Output formatting shared by the commands

use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Yaml,
}

/// Serialize for the json/yaml formats; `None` for text
pub fn render_structured<T: Serialize>(value: &T, format: OutputFormat) -> Result<Option<String>> {
    Ok(match format {
        OutputFormat::Text => None,
        OutputFormat::Json => Some(serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => Some(serde_yaml::to_string(value)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        id: &'static str,
    }

    #[test]
    fn test_render_structured() {
        let row = Row { id: "welcome" };
        assert!(render_structured(&row, OutputFormat::Text).unwrap().is_none());
        assert!(render_structured(&row, OutputFormat::Json)
            .unwrap()
            .unwrap()
            .contains("\"id\": \"welcome\""));
        assert_eq!(
            render_structured(&row, OutputFormat::Yaml).unwrap().unwrap(),
            "id: welcome\n"
        );
    }
}
