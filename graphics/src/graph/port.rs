//! Port declarations and port specs.

use std::fmt;

use crate::types::{FormatSet, Lifetime, ResourceFormat, SizePolicy, Texel};

use super::PassHandle;

/// Direction of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDirection {
    /// The pass reads the resource.
    Input,
    /// The pass writes the resource.
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
        }
    }
}

/// A parsed `"<pass>.<port>"` string.
///
/// The split happens at the last `.`, so pass names may contain dots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortSpec<'a> {
    /// Pass instance name.
    pub pass: &'a str,
    /// Port name.
    pub port: &'a str,
}

impl<'a> PortSpec<'a> {
    /// Parse a port spec. Returns `None` when either part is empty.
    pub fn parse(spec: &'a str) -> Option<Self> {
        let (pass, port) = spec.rsplit_once('.')?;
        if pass.is_empty() || port.is_empty() {
            return None;
        }
        Some(Self { pass, port })
    }
}

impl fmt::Display for PortSpec<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.pass, self.port)
    }
}

/// A resolved reference to a port of a pass in a graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortRef {
    /// Owning pass.
    pub pass: PassHandle,
    /// Port name.
    pub port: String,
}

impl PortRef {
    /// Create a new port reference.
    pub fn new(pass: PassHandle, port: impl Into<String>) -> Self {
        Self {
            pass,
            port: port.into(),
        }
    }
}

/// Declaration of an input port.
#[derive(Debug, Clone, PartialEq)]
pub struct InputPort {
    /// Port name.
    pub name: String,
    /// Formats the pass can read.
    pub accepts: FormatSet,
    /// Whether the pass runs without this input bound.
    pub optional: bool,
    /// Whether edges into this port deliver the previous frame's value.
    pub temporal: bool,
    /// Constant bound when no edge is declared.
    pub default: Option<Texel>,
}

impl InputPort {
    /// Create a required, immediate input.
    pub fn new(name: impl Into<String>, accepts: FormatSet) -> Self {
        Self {
            name: name.into(),
            accepts,
            optional: false,
            temporal: false,
            default: None,
        }
    }

    /// Mark the input optional.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Mark the input as a feedback (previous frame) input.
    pub fn temporal(mut self) -> Self {
        self.temporal = true;
        self
    }

    /// Bind a constant when no edge is declared.
    pub fn with_default(mut self, value: Texel) -> Self {
        self.default = Some(value);
        self
    }
}

/// Declaration of an output port.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPort {
    /// Port name.
    pub name: String,
    /// Formats the pass can write.
    pub formats: FormatSet,
    /// Format chosen when every consumer accepts it.
    pub preferred: ResourceFormat,
    /// How the output's dimensions are derived.
    pub size: SizePolicy,
    /// Declared lifetime. Feedback consumers promote it to temporal.
    pub lifetime: Lifetime,
}

impl OutputPort {
    /// Create a transient, swap-chain sized output producing exactly `format`.
    pub fn new(name: impl Into<String>, format: ResourceFormat) -> Self {
        Self {
            name: name.into(),
            formats: format.as_set(),
            preferred: format,
            size: SizePolicy::Default,
            lifetime: Lifetime::Transient,
        }
    }

    /// Allow additional formats besides the preferred one.
    pub fn with_formats(mut self, formats: FormatSet) -> Self {
        self.formats = formats | self.preferred.as_set();
        self
    }

    /// Set the size policy.
    pub fn with_size(mut self, size: SizePolicy) -> Self {
        self.size = size;
        self
    }

    /// Keep the output across frames.
    pub fn temporal(mut self) -> Self {
        self.lifetime = Lifetime::Temporal;
        self
    }
}

/// The fixed port interface of a pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReflection {
    inputs: Vec<InputPort>,
    outputs: Vec<OutputPort>,
}

impl PassReflection {
    /// Create an empty reflection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an input port.
    pub fn with_input(mut self, port: InputPort) -> Self {
        self.inputs.push(port);
        self
    }

    /// Add an output port.
    pub fn with_output(mut self, port: OutputPort) -> Self {
        self.outputs.push(port);
        self
    }

    /// Declared inputs, in declaration order.
    pub fn inputs(&self) -> &[InputPort] {
        &self.inputs
    }

    /// Declared outputs, in declaration order.
    pub fn outputs(&self) -> &[OutputPort] {
        &self.outputs
    }

    /// Look up an input by name.
    pub fn input(&self, name: &str) -> Option<&InputPort> {
        self.inputs.iter().find(|p| p.name == name)
    }

    /// Look up an output by name.
    pub fn output(&self, name: &str) -> Option<&OutputPort> {
        self.outputs.iter().find(|p| p.name == name)
    }

    /// Direction of the named port, if declared.
    pub fn direction(&self, name: &str) -> Option<PortDirection> {
        if self.input(name).is_some() {
            Some(PortDirection::Input)
        } else if self.output(name).is_some() {
            Some(PortDirection::Output)
        } else {
            None
        }
    }
}
