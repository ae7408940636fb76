//! Schema types for describing the provider's resources, functions and config.
//!
//! Schemas drive input validation during Check and are rendered to the Pulumi
//! package schema returned by GetSchema, from which language SDKs are
//! generated.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// The type of an attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// A string value.
    String,
    /// A whole number.
    Integer,
    /// Any number.
    Number,
    /// A boolean value.
    Bool,
    /// A list of values of a single type.
    List(Box<AttributeType>),
    /// A map from string keys to values of a single type.
    Map(Box<AttributeType>),
    /// A dynamic type that can hold any value (use sparingly).
    Dynamic,
}

impl AttributeType {
    /// Create a list type.
    pub fn list(element_type: AttributeType) -> Self {
        Self::List(Box::new(element_type))
    }

    /// Create a map type.
    pub fn map(element_type: AttributeType) -> Self {
        Self::Map(Box::new(element_type))
    }

    fn to_type_spec(&self) -> Value {
        match self {
            Self::String => json!({"type": "string"}),
            Self::Integer => json!({"type": "integer"}),
            Self::Number => json!({"type": "number"}),
            Self::Bool => json!({"type": "boolean"}),
            Self::List(items) => json!({"type": "array", "items": items.to_type_spec()}),
            Self::Map(values) => {
                json!({"type": "object", "additionalProperties": values.to_type_spec()})
            }
            Self::Dynamic => json!({"$ref": "pulumi.json#/Any"}),
        }
    }
}

/// Describes how an attribute can be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AttributeFlags {
    /// The attribute is required in configuration.
    pub required: bool,
    /// The attribute is optional in configuration.
    pub optional: bool,
    /// The attribute is computed by the provider (read-only).
    pub computed: bool,
    /// The attribute is sensitive and should be hidden in logs/UI.
    pub sensitive: bool,
}

impl AttributeFlags {
    /// Create flags for a required attribute.
    pub fn required() -> Self {
        Self {
            required: true,
            ..Default::default()
        }
    }

    /// Create flags for an optional attribute.
    pub fn optional() -> Self {
        Self {
            optional: true,
            ..Default::default()
        }
    }

    /// Create flags for a computed attribute (read-only, set by provider).
    pub fn computed() -> Self {
        Self {
            computed: true,
            ..Default::default()
        }
    }

    /// Mark the attribute as sensitive.
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

/// Describes a single attribute in a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// The type of the attribute.
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    /// Flags describing how the attribute can be used.
    #[serde(flatten)]
    pub flags: AttributeFlags,
    /// Human-readable description of the attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// If set, changing this attribute forces resource replacement.
    #[serde(default)]
    pub replace_on_changes: bool,
    /// Default value for the attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl Attribute {
    /// Create a new attribute with the given type and flags.
    pub fn new(attr_type: AttributeType, flags: AttributeFlags) -> Self {
        Self {
            attr_type,
            flags,
            description: None,
            replace_on_changes: false,
            default: None,
        }
    }

    /// Create a required string attribute.
    pub fn required_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::required())
    }

    /// Create an optional string attribute.
    pub fn optional_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::optional())
    }

    /// Create a computed string attribute.
    pub fn computed_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::computed())
    }

    /// Create a required integer attribute.
    pub fn required_int() -> Self {
        Self::new(AttributeType::Integer, AttributeFlags::required())
    }

    /// Create an optional integer attribute.
    pub fn optional_int() -> Self {
        Self::new(AttributeType::Integer, AttributeFlags::optional())
    }

    /// Create a computed integer attribute.
    pub fn computed_int() -> Self {
        Self::new(AttributeType::Integer, AttributeFlags::computed())
    }

    /// Create an optional bool attribute.
    pub fn optional_bool() -> Self {
        Self::new(AttributeType::Bool, AttributeFlags::optional())
    }

    /// Create an optional list-of-strings attribute.
    pub fn optional_strings() -> Self {
        Self::new(
            AttributeType::list(AttributeType::String),
            AttributeFlags::optional(),
        )
    }

    /// Set the description for this attribute.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark this attribute as forcing resource replacement when changed.
    pub fn with_replace_on_changes(mut self) -> Self {
        self.replace_on_changes = true;
        self
    }

    /// Set a default value for this attribute.
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Mark this attribute as sensitive.
    pub fn sensitive(mut self) -> Self {
        self.flags.sensitive = true;
        self
    }

    fn to_property_spec(&self) -> Value {
        let mut spec = self.attr_type.to_type_spec();
        if let Some(map) = spec.as_object_mut() {
            if let Some(description) = &self.description {
                map.insert("description".to_string(), json!(description));
            }
            if self.flags.sensitive {
                map.insert("secret".to_string(), json!(true));
            }
            if self.replace_on_changes {
                map.insert("replaceOnChanges".to_string(), json!(true));
            }
            if let Some(default) = &self.default {
                map.insert("default".to_string(), default.clone());
            }
        }
        spec
    }
}

/// Schema of one resource kind.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceSchema {
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Properties the user program supplies.
    #[serde(default)]
    pub inputs: BTreeMap<String, Attribute>,
    /// Properties only the provider sets.
    #[serde(default)]
    pub outputs: BTreeMap<String, Attribute>,
}

impl ResourceSchema {
    /// Create an empty resource schema.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Default::default()
        }
    }

    /// Add an input property.
    pub fn with_input(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.inputs.insert(name.into(), attr);
        self
    }

    /// Add an output-only property.
    pub fn with_output(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.outputs.insert(name.into(), attr);
        self
    }

    /// Flag the given inputs as replace-on-change.
    pub fn mark_replace_on_changes<'a>(mut self, fields: impl IntoIterator<Item = &'a str>) -> Self {
        for field in fields {
            if let Some(attr) = self.inputs.get_mut(field) {
                attr.replace_on_changes = true;
            }
        }
        self
    }

    fn to_resource_spec(&self) -> Value {
        let input_properties = properties_spec(&self.inputs);
        let required_inputs = required_names(&self.inputs);

        let mut outputs = self.inputs.clone();
        outputs.extend(self.outputs.clone());
        let required_outputs: Vec<&String> = self
            .outputs
            .iter()
            .filter(|(_, attr)| attr.flags.computed && !attr.flags.optional)
            .map(|(name, _)| name)
            .collect();

        json!({
            "description": self.description.clone().unwrap_or_default(),
            "inputProperties": input_properties,
            "requiredInputs": required_inputs,
            "properties": properties_spec(&outputs),
            "required": required_outputs,
        })
    }
}

/// Schema of one invoke function.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FunctionSchema {
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Arguments.
    #[serde(default)]
    pub inputs: BTreeMap<String, Attribute>,
    /// Result properties.
    #[serde(default)]
    pub outputs: BTreeMap<String, Attribute>,
}

impl FunctionSchema {
    /// Create an empty function schema.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Default::default()
        }
    }

    /// Add an argument.
    pub fn with_input(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.inputs.insert(name.into(), attr);
        self
    }

    /// Add a result property.
    pub fn with_output(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.outputs.insert(name.into(), attr);
        self
    }

    fn to_function_spec(&self) -> Value {
        json!({
            "description": self.description.clone().unwrap_or_default(),
            "inputs": {
                "properties": properties_spec(&self.inputs),
                "required": required_names(&self.inputs),
            },
            "outputs": {
                "properties": properties_spec(&self.outputs),
            },
        })
    }
}

/// The whole package: provider config, resources and functions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PackageSchema {
    /// Package name.
    pub name: String,
    /// Package version.
    pub version: String,
    /// Provider configuration variables.
    #[serde(default)]
    pub config: BTreeMap<String, Attribute>,
    /// Resources keyed by type token.
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceSchema>,
    /// Functions keyed by token.
    #[serde(default)]
    pub functions: BTreeMap<String, FunctionSchema>,
}

impl PackageSchema {
    /// Create an empty package schema.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Default::default()
        }
    }

    /// Add a provider configuration variable.
    pub fn with_config(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.config.insert(name.into(), attr);
        self
    }

    /// Add a resource schema.
    pub fn with_resource(mut self, token: impl Into<String>, schema: ResourceSchema) -> Self {
        self.resources.insert(token.into(), schema);
        self
    }

    /// Add a function schema.
    pub fn with_function(mut self, token: impl Into<String>, schema: FunctionSchema) -> Self {
        self.functions.insert(token.into(), schema);
        self
    }

    /// Render the Pulumi package schema document.
    pub fn to_pulumi_json(&self) -> Value {
        let resources: Map<String, Value> = self
            .resources
            .iter()
            .map(|(token, schema)| (token.clone(), schema.to_resource_spec()))
            .collect();
        let functions: Map<String, Value> = self
            .functions
            .iter()
            .map(|(token, schema)| (token.clone(), schema.to_function_spec()))
            .collect();
        json!({
            "name": self.name,
            "version": self.version,
            "displayName": "Buddy",
            "config": {
                "variables": properties_spec(&self.config),
                "defaults": required_names(&self.config),
            },
            "provider": {
                "inputProperties": properties_spec(&self.config),
            },
            "resources": resources,
            "functions": functions,
        })
    }
}

fn properties_spec(attrs: &BTreeMap<String, Attribute>) -> Value {
    Value::Object(
        attrs
            .iter()
            .map(|(name, attr)| (name.clone(), attr.to_property_spec()))
            .collect(),
    )
}

fn required_names(attrs: &BTreeMap<String, Attribute>) -> Vec<&String> {
    attrs
        .iter()
        .filter(|(_, attr)| attr.flags.required)
        .map(|(name, _)| name)
        .collect()
}
