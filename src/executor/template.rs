//! Argument templates
//!
//! `{name}` placeholders in step programs, arguments and output paths.
//! Anything that is not `{identifier}` (for example `{"a": 1}`) is literal.

use std::collections::BTreeMap;
use std::path::Path;

use crate::config::Config;
use crate::types::{BatchError, Result, TileId};

/// Placeholders bound per tile rather than per run
pub const TILE_PLACEHOLDERS: &[&str] = &["tile_id", "row", "col", "scratch"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed template string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = source;

        while let Some(open) = rest.find('{') {
            literal.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) if is_identifier(&after[..close]) => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(after[..close].to_string()));
                    rest = &after[close + 1..];
                }
                _ => {
                    literal.push('{');
                    rest = after;
                }
            }
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self {
            source: source.to_string(),
            segments,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Fail on the first placeholder `vars` cannot bind
    pub fn check(&self, vars: &TemplateVars) -> Result<()> {
        match self.placeholders().find(|name| !vars.is_known(name)) {
            Some(name) => Err(BatchError::Template {
                template: self.source.clone(),
                placeholder: name.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Substitute placeholders; unbound ones are left verbatim
    pub fn render(&self, vars: &TemplateVars) -> String {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => match vars.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                },
            }
        }
        out
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Values available to templates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateVars {
    values: BTreeMap<String, String>,
}

impl TemplateVars {
    /// Run-wide values: configured paths plus `[paths.vars]`
    pub fn from_config(config: &Config) -> Self {
        let mut vars = Self::default();
        for (name, path) in &config.paths.vars {
            vars.insert(name, path.display().to_string());
        }
        vars.insert("log_root", config.paths.log_root.display().to_string());
        vars.insert("output_dir", config.paths.output_dir.display().to_string());
        vars.insert("input_dir", config.tiles.input_dir.display().to_string());
        vars
    }

    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.values.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Whether a placeholder will be bound at render time
    pub fn is_known(&self, name: &str) -> bool {
        self.values.contains_key(name) || TILE_PLACEHOLDERS.contains(&name)
    }

    /// Copy with the per-tile placeholders bound
    pub fn for_tile(&self, tile: &TileId, scratch_dir: &Path) -> Self {
        let mut vars = self.clone();
        vars.insert("tile_id", tile.as_str());
        vars.insert("row", tile.row());
        vars.insert("col", tile.col());
        vars.insert("scratch", scratch_dir.display().to_string());
        vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn vars() -> TemplateVars {
        let mut vars = TemplateVars::default();
        vars.insert("dtm_folder", "/data/dtm");
        vars
    }

    #[test]
    fn test_render_tile_placeholders() {
        let template = Template::parse("{dtm_folder}/DTM_1km_{tile_id}.tif");
        let tile = TileId::parse("6239_447").unwrap();
        let bound = vars().for_tile(&tile, Path::new("/scratch/temp_1"));
        assert_eq!(template.render(&bound), "/data/dtm/DTM_1km_6239_447.tif");

        let template = Template::parse("r{row}c{col} in {scratch}");
        assert_eq!(template.render(&bound), "r6239c447 in /scratch/temp_1");
    }

    #[test]
    fn test_non_identifier_braces_are_literal() {
        let template = Template::parse(r#"{"tile": "{tile_id}"} {Upper} {"#);
        assert_eq!(template.placeholders().collect::<Vec<_>>(), ["tile_id"]);
        let tile = TileId::parse("1_2").unwrap();
        let bound = vars().for_tile(&tile, Path::new("/s/temp_1"));
        assert_eq!(template.render(&bound), r#"{"tile": "1_2"} {Upper} {"#);
    }

    #[test]
    fn test_check_unknown_placeholder() {
        let template = Template::parse("{dsm_folder}/{tile_id}");
        let err = template.check(&vars()).unwrap_err();
        assert!(matches!(
            &err,
            BatchError::Template { placeholder, .. } if placeholder == "dsm_folder"
        ));
        assert!(err.is_fatal());

        assert!(Template::parse("{dtm_folder}/{tile_id}/{scratch}").check(&vars()).is_ok());
    }

    #[test]
    fn test_from_config() {
        let mut config = Config::default();
        config
            .paths
            .vars
            .insert("dtm_folder".to_string(), PathBuf::from("/d"));
        let config = config.resolve_paths(Path::new("/w"));
        let vars = TemplateVars::from_config(&config);
        assert_eq!(vars.get("dtm_folder"), Some("/d"));
        assert_eq!(vars.get("log_root"), Some("/w/log"));
        assert_eq!(vars.get("input_dir"), Some("/w/data/laz"));
    }
}
