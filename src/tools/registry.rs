use crate::llm::types::{FunctionDeclaration, ToolDeclaration};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Tool declarations handed to the model, fixed once built.
///
/// Conditional entries (tools that only make sense for one provider, say)
/// are decided while building, never by mutating a shared table later.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    declarations: Vec<ToolDeclaration>,
    index: HashMap<String, usize>,
}

#[derive(Debug, Default)]
pub struct ToolRegistryBuilder {
    declarations: Vec<ToolDeclaration>,
}

impl ToolRegistryBuilder {
    /// Add a tool. A later tool with the same name replaces the earlier one.
    #[must_use]
    pub fn tool(mut self, declaration: ToolDeclaration) -> Self {
        match self
            .declarations
            .iter_mut()
            .find(|d| d.name() == declaration.name())
        {
            Some(existing) => *existing = declaration,
            None => self.declarations.push(declaration),
        }
        self
    }

    #[must_use]
    pub fn tool_if(self, condition: bool, declaration: ToolDeclaration) -> Self {
        if condition { self.tool(declaration) } else { self }
    }

    #[must_use]
    pub fn tools(self, declarations: impl IntoIterator<Item = ToolDeclaration>) -> Self {
        declarations.into_iter().fold(self, Self::tool)
    }

    pub fn build(self) -> ToolRegistry {
        let index = self
            .declarations
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name().to_string(), i))
            .collect();
        ToolRegistry {
            declarations: self.declarations,
            index,
        }
    }
}

/// Entries in a declarations file: full `{"type", "function"}` objects or
/// bare function objects.
#[derive(Deserialize)]
#[serde(untagged)]
enum DeclarationEntry {
    Tool(ToolDeclaration),
    Function(FunctionDeclaration),
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// Load a JSON array of declarations.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read tools file {}", path.display()))?;
        Self::from_json_str(&contents)
            .with_context(|| format!("Failed to parse tools file {}", path.display()))
    }

    pub fn from_json_str(contents: &str) -> Result<Self> {
        let entries: Vec<DeclarationEntry> = serde_json::from_str(contents)?;
        let declarations = entries.into_iter().map(|entry| match entry {
            DeclarationEntry::Tool(tool) => tool,
            DeclarationEntry::Function(function) => ToolDeclaration {
                kind: "function".into(),
                function,
            },
        });
        Ok(Self::builder().tools(declarations).build())
    }

    /// Declarations in registration order.
    pub fn declarations(&self) -> &[ToolDeclaration] {
        &self.declarations
    }

    /// `None` when empty, so requests omit the field entirely.
    pub fn as_request_tools(&self) -> Option<&[ToolDeclaration]> {
        (!self.declarations.is_empty()).then_some(self.declarations.as_slice())
    }

    pub fn get(&self, name: &str) -> Option<&ToolDeclaration> {
        self.index.get(name).map(|&i| &self.declarations[i])
    }

    pub fn names(&self) -> Vec<&str> {
        self.declarations.iter().map(ToolDeclaration::name).collect()
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}
