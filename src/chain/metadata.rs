//! Call and event metadata shapes
//!
//! Nodes have shipped two documentation layouts over time: current metadata
//! carries `docs` plus named `fields`, older metadata carries `documentation`
//! plus `args`. Anything else is kept opaque and treated as undocumented.

use serde::Deserialize;

/// Metadata describing one call or event variant
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MethodMetadata {
    /// Absent `fields` means the argument names are not declared
    Documented {
        docs: Vec<String>,
        #[serde(default)]
        fields: Option<Vec<FieldMetadata>>,
    },
    Legacy {
        documentation: Vec<String>,
        #[serde(default)]
        args: Option<Vec<FieldMetadata>>,
    },
    Opaque(serde_json::Value),
}

impl Default for MethodMetadata {
    fn default() -> Self {
        MethodMetadata::Opaque(serde_json::Value::Null)
    }
}

/// A declared argument: either a named field or a bare type name
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FieldMetadata {
    Named {
        #[serde(default)]
        name: Option<String>,
        #[serde(default, rename = "typeName", alias = "type")]
        type_name: Option<String>,
    },
    Type(String),
}

impl FieldMetadata {
    /// Name when declared, otherwise the type name
    pub fn label(&self) -> Option<&str> {
        match self {
            FieldMetadata::Named { name, type_name } => {
                name.as_deref().or(type_name.as_deref())
            }
            FieldMetadata::Type(type_name) => Some(type_name),
        }
    }
}

impl MethodMetadata {
    /// Documentation lines joined with newlines (empty when undocumented)
    pub fn documentation(&self) -> String {
        match self {
            MethodMetadata::Documented { docs, .. } => docs.join("\n"),
            MethodMetadata::Legacy { documentation, .. } => documentation.join("\n"),
            MethodMetadata::Opaque(_) => String::new(),
        }
    }

    /// Declared argument labels, `None` when the metadata does not declare them
    pub fn arg_names(&self) -> Option<Vec<String>> {
        let fields = match self {
            MethodMetadata::Documented { fields, .. } => fields.as_ref()?,
            MethodMetadata::Legacy { args, .. } => args.as_ref()?,
            MethodMetadata::Opaque(_) => return None,
        };

        Some(
            fields
                .iter()
                .enumerate()
                .map(|(i, field)| {
                    field
                        .label()
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("arg{}", i))
                })
                .collect(),
        )
    }
}
