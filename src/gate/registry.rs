use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info};

use super::model::GateModel;
use crate::error::GateError;

/// Gate tables bundled with the crate, keyed by model name.
const BUILTIN: &[(&str, &str)] = &[
    ("Bcell.RM", include_str!("../../models/Bcell.RM.tsv")),
    ("Tcell.RM", include_str!("../../models/Tcell.RM.tsv")),
    ("NK.RM", include_str!("../../models/NK.RM.tsv")),
    ("Myeloid.RM", include_str!("../../models/Myeloid.RM.tsv")),
    ("pDC.RM", include_str!("../../models/pDC.RM.tsv")),
    ("Erythrocyte.RM", include_str!("../../models/Erythrocyte.RM.tsv")),
    ("Platelet.RM", include_str!("../../models/Platelet.RM.tsv")),
    ("Stromal.RM", include_str!("../../models/Stromal.RM.tsv")),
    ("Epithelial.RM", include_str!("../../models/Epithelial.RM.tsv")),
    ("Endothelial.RM", include_str!("../../models/Endothelial.RM.tsv")),
];

/// Names of the bundled rhesus macaque models.
pub fn builtin_names() -> Vec<&'static str> {
    BUILTIN.iter().map(|(name, _)| *name).collect()
}

/// Validated gate models keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: BTreeMap<String, GateModel>,
}

impl ModelRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding the bundled models.
    pub fn builtin() -> Result<Self, GateError> {
        let mut registry = Self::empty();
        for (name, text) in BUILTIN {
            registry.add(GateModel::parse(name, text)?);
        }
        Ok(registry)
    }

    /// Add or replace a model.
    pub fn add(&mut self, model: GateModel) -> Option<GateModel> {
        self.models.insert(model.name.clone(), model)
    }

    /// Load every `*.tsv` gate table in `dir`; the file stem is the model
    /// name. Models already registered under that name are replaced.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        let entries =
            std::fs::read_dir(dir).with_context(|| format!("reading model dir {}", dir.display()))?;

        let mut loaded = 0;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("tsv") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let model = GateModel::parse(name, &text)?;
            if self.add(model).is_some() {
                info!("model {name} from {} replaces an existing definition", path.display());
            } else {
                debug!("loaded model {name} from {}", path.display());
            }
            loaded += 1;
        }
        Ok(loaded)
    }

    pub fn get(&self, name: &str) -> Result<&GateModel, GateError> {
        self.models
            .get(name)
            .ok_or_else(|| GateError::unknown_model(name, self.names()))
    }

    /// Resolve requested names to models, failing on the first unknown one.
    /// Repeated names resolve once.
    pub fn resolve(&self, names: &[String]) -> Result<Vec<&GateModel>, GateError> {
        let mut resolved: Vec<&GateModel> = Vec::with_capacity(names.len());
        for name in names {
            let model = self.get(name)?;
            if !resolved.iter().any(|m| m.name == model.name) {
                resolved.push(model);
            }
        }
        Ok(resolved)
    }

    pub fn names(&self) -> Vec<&str> {
        self.models.keys().map(String::as_str).collect()
    }

    pub fn models(&self) -> impl Iterator<Item = &GateModel> {
        self.models.values()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_models_are_valid() {
        let registry = ModelRegistry::builtin().unwrap();
        assert_eq!(registry.len(), builtin_names().len());
        for name in builtin_names() {
            assert!(registry.get(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn resolve_fails_fast_on_unknown() {
        let registry = ModelRegistry::builtin().unwrap();
        let names = vec!["Bcell.RM".to_string(), "Foo.RM".to_string()];
        match registry.resolve(&names) {
            Err(GateError::UnknownModel { name, available }) => {
                assert_eq!(name, "Foo.RM");
                assert!(available.contains(&"Bcell.RM".to_string()));
            }
            other => panic!("expected UnknownModel, got {other:?}"),
        }
    }

    #[test]
    fn resolve_dedups_and_keeps_order() {
        let registry = ModelRegistry::builtin().unwrap();
        let names: Vec<String> = ["Tcell.RM", "Bcell.RM", "Tcell.RM"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let models = registry.resolve(&names).unwrap();
        let got: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(got, vec!["Tcell.RM", "Bcell.RM"]);
    }
}
