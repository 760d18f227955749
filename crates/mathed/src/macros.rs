//! User macros defined with `\newcommand`
//!
//! A [`MacroTable`] belongs to one parse or one editing session. Templates
//! keep parameter references as `Unknown("#k")` nodes; expansion replaces
//! them with the argument cells of an instance.

use crate::array::MathArray;
use crate::model::MathNode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::trace;

/// Most parameters a template may declare
pub const MAX_MACRO_ARGS: usize = 9;

/// A registered macro definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroData {
    pub name: String,
    pub arity: usize,
    pub body: MathArray,
    /// Optional form shown on screen instead of the expansion
    pub display: MathArray,
}

impl MacroData {
    /// Extract the definition carried by a template node
    pub fn from_node(node: &MathNode) -> Option<Self> {
        match node {
            MathNode::MacroTemplate { name, arity, cells } => Some(Self {
                name: name.clone(),
                arity: *arity,
                body: cells[0].clone(),
                display: cells[1].clone(),
            }),
            _ => None,
        }
    }

    /// Template node for this definition
    pub fn to_node(&self) -> MathNode {
        MathNode::macro_template(
            self.name.clone(),
            self.arity,
            self.body.clone(),
            self.display.clone(),
        )
    }

    /// Body (or display form when present) with `#k` replaced by `args[k-1]`
    pub fn expand(&self, args: &[MathArray]) -> MathArray {
        let source = if self.display.is_empty() {
            &self.body
        } else {
            &self.display
        };
        substitute(source, args)
    }
}

/// Name to definition map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroTable {
    macros: BTreeMap<String, MacroData>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition, replacing any earlier one with the same name
    pub fn insert(&mut self, data: MacroData) {
        trace!("defining macro \\{} with {} arguments", data.name, data.arity);
        self.macros.insert(data.name.clone(), data);
    }

    /// Register the definition carried by a template node
    pub fn define(&mut self, node: &MathNode) -> bool {
        match MacroData::from_node(node) {
            Some(data) => {
                self.insert(data);
                true
            }
            None => false,
        }
    }

    /// Register every template found anywhere in `array`
    pub fn collect_from(&mut self, array: &MathArray) {
        let mut found = Vec::new();
        array.walk(&mut |node| {
            if let Some(data) = MacroData::from_node(node) {
                found.push(data);
            }
        });
        for data in found {
            self.insert(data);
        }
    }

    pub fn get(&self, name: &str) -> Option<&MacroData> {
        self.macros.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.macros.keys().map(String::as_str)
    }

    /// Expansion of `name` applied to `args`, if the macro is known
    pub fn expand(&self, name: &str, args: &[MathArray]) -> Option<MathArray> {
        self.get(name).map(|data| data.expand(args))
    }
}

/// Parameter number of an `Unknown("#k")` node
pub fn parameter_index(node: &MathNode) -> Option<usize> {
    match node {
        MathNode::Unknown(text) => {
            let digits = text.strip_prefix('#')?;
            let k: usize = digits.parse().ok()?;
            (1..=MAX_MACRO_ARGS).contains(&k).then_some(k)
        }
        _ => None,
    }
}

fn substitute(source: &MathArray, args: &[MathArray]) -> MathArray {
    let mut out = MathArray::new();
    for node in source {
        if let Some(k) = parameter_index(node) {
            match args.get(k - 1) {
                Some(arg) => out.append(arg.clone()),
                None => out.push(node.clone()),
            }
            continue;
        }
        let mut node = node.clone();
        for cell in node.cells_mut() {
            *cell = substitute(cell, args);
        }
        out.push(node);
    }
    out
}
