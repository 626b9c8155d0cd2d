//=====================================================
// File: analyzer/tags.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Semantic facts attached to breadcrumbs
// Objective: Closed set of node tags; inverse-bearing tags always travel in pairs
//=====================================================

use crate::ast::Breadcrumbs;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BadWriteKind {
    NotVariable,
    OuterVariable,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeTag {
    ReferencesFile {
        path: String,
        export_name: Option<String>,
    },
    BadFileReference,
    ValueComesFrom {
        source: Breadcrumbs,
    },
    ValueGoesTo {
        destination: Breadcrumbs,
    },
    Calls {
        callee: Breadcrumbs,
    },
    CalledBy {
        call: Breadcrumbs,
    },
    CallsWithParameter {
        parameter: Breadcrumbs,
        index: usize,
    },
    ParameterForCall {
        call: Breadcrumbs,
        index: usize,
    },
    Causes {
        signal: Breadcrumbs,
    },
    CausedBy {
        cause: Breadcrumbs,
    },
    DeclarationForScope {
        scope: Breadcrumbs,
    },
    ScopeContainsDeclaration {
        declaration: Breadcrumbs,
    },
    CapturesValue {
        value: Breadcrumbs,
    },
    ValueCapturedBy {
        function: Breadcrumbs,
    },
    UsesCapturedValue {
        function: Breadcrumbs,
    },
    TypeAnnotated {
        annotation: Breadcrumbs,
    },
    AnnotatesTypeFor {
        node: Breadcrumbs,
    },
    SetsVariable {
        variable: Breadcrumbs,
    },
    VariableSetBy {
        statement: Breadcrumbs,
    },
    BadVariableWrite {
        kind: BadWriteKind,
    },
    FunctionCanReturnTypeOf {
        returns: Breadcrumbs,
    },
    ReturnsFromFunction {
        function: Breadcrumbs,
    },
    FunctionCanReturnAction {
        returns: Breadcrumbs,
    },
    ActionReturn {
        function: Breadcrumbs,
    },
    LoopBreaksAt {
        breaker: Breadcrumbs,
    },
    BreaksLoop {
        loop_node: Breadcrumbs,
    },
    Expression,
    NotInScope,
    TopLevelDeclaration {
        name: String,
    },
}

impl NodeTag {
    /// The tag that must be recorded at the other end of this fact, if any.
    pub fn inverse(&self, at: &Breadcrumbs) -> Option<(Breadcrumbs, NodeTag)> {
        let at = at.clone();
        let pair = match self {
            NodeTag::ValueComesFrom { source } => {
                (source.clone(), NodeTag::ValueGoesTo { destination: at })
            }
            NodeTag::ValueGoesTo { destination } => {
                (destination.clone(), NodeTag::ValueComesFrom { source: at })
            }
            NodeTag::Calls { callee } => (callee.clone(), NodeTag::CalledBy { call: at }),
            NodeTag::CalledBy { call } => (call.clone(), NodeTag::Calls { callee: at }),
            NodeTag::CallsWithParameter { parameter, index } => (
                parameter.clone(),
                NodeTag::ParameterForCall {
                    call: at,
                    index: *index,
                },
            ),
            NodeTag::ParameterForCall { call, index } => (
                call.clone(),
                NodeTag::CallsWithParameter {
                    parameter: at,
                    index: *index,
                },
            ),
            NodeTag::Causes { signal } => (signal.clone(), NodeTag::CausedBy { cause: at }),
            NodeTag::CausedBy { cause } => (cause.clone(), NodeTag::Causes { signal: at }),
            NodeTag::DeclarationForScope { scope } => (
                scope.clone(),
                NodeTag::ScopeContainsDeclaration { declaration: at },
            ),
            NodeTag::ScopeContainsDeclaration { declaration } => (
                declaration.clone(),
                NodeTag::DeclarationForScope { scope: at },
            ),
            NodeTag::CapturesValue { value } => {
                (value.clone(), NodeTag::ValueCapturedBy { function: at })
            }
            NodeTag::ValueCapturedBy { function } => {
                (function.clone(), NodeTag::CapturesValue { value: at })
            }
            NodeTag::TypeAnnotated { annotation } => {
                (annotation.clone(), NodeTag::AnnotatesTypeFor { node: at })
            }
            NodeTag::AnnotatesTypeFor { node } => {
                (node.clone(), NodeTag::TypeAnnotated { annotation: at })
            }
            NodeTag::SetsVariable { variable } => {
                (variable.clone(), NodeTag::VariableSetBy { statement: at })
            }
            NodeTag::VariableSetBy { statement } => {
                (statement.clone(), NodeTag::SetsVariable { variable: at })
            }
            NodeTag::FunctionCanReturnTypeOf { returns } => {
                (returns.clone(), NodeTag::ReturnsFromFunction { function: at })
            }
            NodeTag::ReturnsFromFunction { function } => (
                function.clone(),
                NodeTag::FunctionCanReturnTypeOf { returns: at },
            ),
            NodeTag::FunctionCanReturnAction { returns } => {
                (returns.clone(), NodeTag::ActionReturn { function: at })
            }
            NodeTag::ActionReturn { function } => (
                function.clone(),
                NodeTag::FunctionCanReturnAction { returns: at },
            ),
            NodeTag::LoopBreaksAt { breaker } => {
                (breaker.clone(), NodeTag::BreaksLoop { loop_node: at })
            }
            NodeTag::BreaksLoop { loop_node } => {
                (loop_node.clone(), NodeTag::LoopBreaksAt { breaker: at })
            }
            NodeTag::ReferencesFile { .. }
            | NodeTag::BadFileReference
            | NodeTag::UsesCapturedValue { .. }
            | NodeTag::BadVariableWrite { .. }
            | NodeTag::Expression
            | NodeTag::NotInScope
            | NodeTag::TopLevelDeclaration { .. } => return None,
        };
        Some(pair)
    }
}

/// Analyzer output: every tag in the file plus the files it imports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedNode {
    pub node_tags: BTreeMap<Breadcrumbs, Vec<NodeTag>>,
    pub files_referenced: BTreeSet<String>,
}

impl AnalyzedNode {
    pub fn tags(&self, breadcrumbs: &Breadcrumbs) -> &[NodeTag] {
        self.node_tags
            .get(breadcrumbs)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_tag(&self, breadcrumbs: &Breadcrumbs, tag: &NodeTag) -> bool {
        self.tags(breadcrumbs).contains(tag)
    }

    /// First tag at `breadcrumbs` for which `select` returns a value.
    pub fn find_tag<'a, T>(
        &'a self,
        breadcrumbs: &Breadcrumbs,
        select: impl Fn(&'a NodeTag) -> Option<T>,
    ) -> Option<T> {
        self.tags(breadcrumbs).iter().find_map(select)
    }

    /// Every tag at `breadcrumbs` for which `select` returns a value, in insertion order.
    pub fn filter_tags<'a, T>(
        &'a self,
        breadcrumbs: &Breadcrumbs,
        select: impl Fn(&'a NodeTag) -> Option<T>,
    ) -> Vec<T> {
        self.tags(breadcrumbs).iter().filter_map(select).collect()
    }

    pub fn value_source(&self, breadcrumbs: &Breadcrumbs) -> Option<&Breadcrumbs> {
        self.find_tag(breadcrumbs, |tag| match tag {
            NodeTag::ValueComesFrom { source } => Some(source),
            _ => None,
        })
    }

    pub fn file_reference(&self, breadcrumbs: &Breadcrumbs) -> Option<(&str, Option<&str>)> {
        self.find_tag(breadcrumbs, |tag| match tag {
            NodeTag::ReferencesFile { path, export_name } => {
                Some((path.as_str(), export_name.as_deref()))
            }
            _ => None,
        })
    }

    pub fn top_level_name(&self, breadcrumbs: &Breadcrumbs) -> Option<&str> {
        self.find_tag(breadcrumbs, |tag| match tag {
            NodeTag::TopLevelDeclaration { name } => Some(name.as_str()),
            _ => None,
        })
    }

    /// Values a function captures, in the order the closure stores them.
    pub fn captured_values(&self, function: &Breadcrumbs) -> Vec<&Breadcrumbs> {
        self.filter_tags(function, |tag| match tag {
            NodeTag::CapturesValue { value } => Some(value),
            _ => None,
        })
    }

    /// Call parameters sorted by position.
    pub fn call_parameters(&self, call: &Breadcrumbs) -> Vec<(usize, &Breadcrumbs)> {
        let mut params = self.filter_tags(call, |tag| match tag {
            NodeTag::CallsWithParameter { parameter, index } => Some((*index, parameter)),
            _ => None,
        });
        params.sort_by_key(|(index, _)| *index);
        params
    }
}
