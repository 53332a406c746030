use std::collections::HashSet;
use std::fmt::Write as _;

use crate::foundation::error::{BindError, BindResult};
use crate::foundation::value::{TypeTag, Value};
use crate::types::typespec::StaticType;
use crate::types::variant::TypeVariant;

/// Data flow of a parameter.
///
/// `Modify` marks the image an in-place operation draws into. Such operations only run inside a
/// transaction, against its private duplicate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Input,
    Output,
    Modify,
}

/// Inclusive numeric range a scalar must fall in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn contains(&self, x: f64) -> bool {
        x >= self.min && x <= self.max
    }
}

#[derive(Clone, Debug)]
pub struct ParamDescriptor {
    pub name: String,
    pub tag: TypeTag,
    pub variant: TypeVariant,
    pub required: bool,
    pub direction: Direction,
    pub default: Option<Value>,
    pub bounds: Option<Bounds>,
    pub description: String,
}

impl ParamDescriptor {
    /// Pseudo-parameter describing a metadata field, so field writes go through the same casts as
    /// operation arguments.
    pub(crate) fn field(name: &str, tag: TypeTag, variant: TypeVariant) -> Self {
        Self {
            name: name.to_string(),
            tag,
            variant,
            required: true,
            direction: Direction::Input,
            default: None,
            bounds: None,
            description: String::new(),
        }
    }

    pub fn is_input(&self) -> bool {
        self.direction == Direction::Input
    }

    pub fn is_output(&self) -> bool {
        self.direction == Direction::Output
    }

    pub fn typespec(&self) -> StaticType {
        self.variant.typespec()
    }
}

/// Call shape of one native operation. Immutable once loaded.
#[derive(Clone, Debug)]
pub struct OperationDescriptor {
    name: String,
    description: String,
    params: Vec<ParamDescriptor>,
    required_inputs: Vec<usize>,
    optional_inputs: Vec<usize>,
    required_outputs: Vec<usize>,
    optional_outputs: Vec<usize>,
    modify: Option<usize>,
}

impl OperationDescriptor {
    pub(crate) fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        params: Vec<ParamDescriptor>,
    ) -> BindResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(BindError::introspection("operation name must be non-empty"));
        }

        let mut seen = HashSet::new();
        let mut out = Self {
            name,
            description: description.into(),
            params: Vec::new(),
            required_inputs: Vec::new(),
            optional_inputs: Vec::new(),
            required_outputs: Vec::new(),
            optional_outputs: Vec::new(),
            modify: None,
        };

        for (i, p) in params.iter().enumerate() {
            if !seen.insert(p.name.as_str()) {
                return Err(BindError::introspection(format!(
                    "operation '{}' declares parameter '{}' twice",
                    out.name, p.name
                )));
            }
            match (p.direction, p.required) {
                (Direction::Input, true) => out.required_inputs.push(i),
                (Direction::Input, false) => out.optional_inputs.push(i),
                (Direction::Output, true) => out.required_outputs.push(i),
                (Direction::Output, false) => out.optional_outputs.push(i),
                (Direction::Modify, _) => {
                    if out.modify.is_some() {
                        return Err(BindError::introspection(format!(
                            "operation '{}' modifies more than one parameter",
                            out.name
                        )));
                    }
                    if p.variant != TypeVariant::Image || !p.required {
                        return Err(BindError::introspection(format!(
                            "operation '{}': modified parameter '{}' must be a required image",
                            out.name, p.name
                        )));
                    }
                    out.modify = Some(i);
                }
            }
        }

        out.params = params;
        Ok(out)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// All parameters in introspected order.
    pub fn params(&self) -> &[ParamDescriptor] {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&ParamDescriptor> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Positional inputs, in order. Excludes the modified image of an in-place operation.
    pub fn required_inputs(&self) -> impl Iterator<Item = &ParamDescriptor> {
        self.required_inputs.iter().map(|&i| &self.params[i])
    }

    pub fn optional_inputs(&self) -> impl Iterator<Item = &ParamDescriptor> {
        self.optional_inputs.iter().map(|&i| &self.params[i])
    }

    pub fn required_outputs(&self) -> impl Iterator<Item = &ParamDescriptor> {
        self.required_outputs.iter().map(|&i| &self.params[i])
    }

    pub fn optional_outputs(&self) -> impl Iterator<Item = &ParamDescriptor> {
        self.optional_outputs.iter().map(|&i| &self.params[i])
    }

    pub fn positional_arity(&self) -> usize {
        self.required_inputs.len()
    }

    /// Number of primary results every successful call returns.
    pub fn return_arity(&self) -> usize {
        self.required_outputs.len()
    }

    pub fn modified_param(&self) -> Option<&ParamDescriptor> {
        self.modify.map(|i| &self.params[i])
    }

    pub fn is_in_place(&self) -> bool {
        self.modify.is_some()
    }

    /// Human-readable calling convention, e.g.
    /// `resize(in: Image, *, scale: f64 = 1) -> (out: Image)`.
    pub fn signature(&self) -> String {
        let mut s = String::new();
        let _ = write!(s, "{}(", self.name);

        let mut parts = Vec::<String>::new();
        if let Some(p) = self.modified_param() {
            parts.push(format!("&mut {}: {}", p.name, p.typespec()));
        }
        parts.extend(
            self.required_inputs()
                .map(|p| format!("{}: {}", p.name, p.typespec())),
        );
        let mut optional = self.optional_inputs().peekable();
        if optional.peek().is_some() {
            parts.push("*".to_string());
            parts.extend(optional.map(|p| match &p.default {
                Some(d) => format!("{}: {} = {d}", p.name, p.typespec()),
                None => format!("{}: {}", p.name, p.typespec()),
            }));
        }
        s.push_str(&parts.join(", "));
        s.push(')');

        let outputs = self
            .required_outputs()
            .map(|p| format!("{}: {}", p.name, p.typespec()))
            .collect::<Vec<_>>();
        let _ = write!(s, " -> ({})", outputs.join(", "));

        let extras = self
            .optional_outputs()
            .map(|p| format!("{}: {}", p.name, p.typespec()))
            .collect::<Vec<_>>();
        if !extras.is_empty() {
            let _ = write!(s, " + {{{}}}", extras.join(", "));
        }
        s
    }
}

#[cfg(test)]
#[path = "../../tests/unit/introspect/descriptor.rs"]
mod tests;
