//=====================================================
// File: analyzer/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Semantic tagging for CauseLang files
// Objective: Walk a file once, bind identifiers through copied scope maps,
//            and record value flow, calls, captures, and writes as node tags
//=====================================================

pub mod tags;

pub use tags::{AnalyzedNode, BadWriteKind, NodeTag};

use crate::ast::{
    BodyNode, BranchOptionNode, Breadcrumbs, DeclarationNode, ExpressionNode, FileNode,
    FunctionParameterNode, PatternNode, StatementNode, TypeReferenceNode,
};
use crate::stdlib_registry;
use std::collections::HashMap;

const SOURCE_EXTENSION: &str = ".cau";

#[derive(Debug, Clone)]
enum ScopeItemKind {
    /// Declared inside a function body; lives on that function's stack.
    Local { is_variable: bool },
    /// Declared at file level; read through the file's exports.
    TopLevel { is_variable: bool },
    /// Exported by a built-in file.
    Builtin { path: String },
}

#[derive(Debug, Clone)]
struct ScopeItem {
    origin: Breadcrumbs,
    function_depth: usize,
    kind: ScopeItemKind,
}

type Scope = HashMap<String, ScopeItem>;

#[derive(Clone)]
struct AnalyzerContext {
    scope: Scope,
    functions: Vec<Breadcrumbs>,
    current_loop: Option<Breadcrumbs>,
    return_annotation: Option<Breadcrumbs>,
}

impl AnalyzerContext {
    fn depth(&self) -> usize {
        self.functions.len()
    }

    fn current_function(&self) -> Option<&Breadcrumbs> {
        self.functions.last()
    }

    fn declare_local(&mut self, name: &str, origin: &Breadcrumbs, is_variable: bool) {
        self.scope.insert(
            name.to_string(),
            ScopeItem {
                origin: origin.clone(),
                function_depth: self.depth(),
                kind: ScopeItemKind::Local { is_variable },
            },
        );
    }
}

struct Analyzer<'a> {
    path: &'a str,
    output: AnalyzedNode,
}

/// Tag every node of `file`, which lives at `path` in the project.
pub fn analyze_file(path: &str, file: &FileNode) -> AnalyzedNode {
    let mut analyzer = Analyzer {
        path,
        output: AnalyzedNode::default(),
    };
    analyzer.analyze_file(file);
    analyzer.output
}

/// Normalise an import path relative to the importing file.
/// Returns `None` when the path climbs above the project root.
pub fn normalize_import_path(current_file: &str, import: &str) -> Option<String> {
    let with_extension = if import.ends_with(SOURCE_EXTENSION) {
        import.to_string()
    } else {
        format!("{import}{SOURCE_EXTENSION}")
    };
    if !(with_extension.starts_with("./") || with_extension.starts_with("../")) {
        return Some(with_extension);
    }
    let mut segments: Vec<&str> = current_file.split('/').collect();
    segments.pop();
    for part in with_extension.split('/') {
        match part {
            "." | "" => {}
            ".." => {
                if segments.len() <= 1 {
                    return None;
                }
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    Some(segments.join("/"))
}

impl<'a> Analyzer<'a> {
    fn add_tag(&mut self, at: &Breadcrumbs, tag: NodeTag) {
        if let Some((target, inverse)) = tag.inverse(at) {
            self.push_tag(target, inverse);
        }
        self.push_tag(at.clone(), tag);
    }

    fn push_tag(&mut self, at: Breadcrumbs, tag: NodeTag) {
        let tags = self.output.node_tags.entry(at).or_default();
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    fn analyze_file(&mut self, file: &FileNode) {
        let root = file.info.breadcrumbs.clone();
        let mut scope = Scope::new();
        for (name, path) in stdlib_registry::global_names() {
            scope.insert(
                name.to_string(),
                ScopeItem {
                    origin: root.clone(),
                    function_depth: 0,
                    kind: ScopeItemKind::Builtin {
                        path: path.to_string(),
                    },
                },
            );
        }

        // Hoist every file-level declaration so order doesn't matter at the top.
        for declaration in &file.declarations {
            let at = &declaration.info().breadcrumbs;
            match declaration {
                DeclarationNode::Import { mappings, .. } => {
                    for mapping in mappings {
                        scope.insert(
                            mapping.local_name().to_string(),
                            ScopeItem {
                                origin: mapping.info.breadcrumbs.clone(),
                                function_depth: 0,
                                kind: ScopeItemKind::TopLevel { is_variable: false },
                            },
                        );
                        self.add_tag(
                            &mapping.info.breadcrumbs,
                            NodeTag::DeclarationForScope {
                                scope: root.clone(),
                            },
                        );
                    }
                }
                other => {
                    let Some(name) = other.name() else { continue };
                    let is_variable = matches!(
                        other,
                        DeclarationNode::NamedValue {
                            is_variable: true,
                            ..
                        }
                    );
                    scope.insert(
                        name.to_string(),
                        ScopeItem {
                            origin: at.clone(),
                            function_depth: 0,
                            kind: ScopeItemKind::TopLevel { is_variable },
                        },
                    );
                    self.add_tag(
                        at,
                        NodeTag::DeclarationForScope {
                            scope: root.clone(),
                        },
                    );
                    self.add_tag(
                        at,
                        NodeTag::TopLevelDeclaration {
                            name: name.to_string(),
                        },
                    );
                }
            }
        }

        let ctx = AnalyzerContext {
            scope,
            functions: Vec::new(),
            current_loop: None,
            return_annotation: None,
        };
        for declaration in &file.declarations {
            self.analyze_declaration(declaration, &ctx);
        }
    }

    fn analyze_declaration(&mut self, declaration: &DeclarationNode, ctx: &AnalyzerContext) {
        let at = &declaration.info().breadcrumbs;
        match declaration {
            DeclarationNode::Import { path, mappings, .. } => {
                match normalize_import_path(self.path, &path.path) {
                    Some(normalized) => {
                        for mapping in mappings {
                            self.add_tag(
                                &mapping.info.breadcrumbs,
                                NodeTag::ReferencesFile {
                                    path: normalized.clone(),
                                    export_name: Some(mapping.source_name.text.clone()),
                                },
                            );
                        }
                        self.output.files_referenced.insert(normalized);
                    }
                    None => {
                        self.add_tag(at, NodeTag::BadFileReference);
                        for mapping in mappings {
                            self.add_tag(
                                &mapping.info.breadcrumbs,
                                NodeTag::ValueComesFrom { source: at.clone() },
                            );
                        }
                    }
                }
            }
            DeclarationNode::Function {
                name,
                params,
                return_type,
                body,
                ..
            } => {
                self.analyze_function(at, Some(&name.text), params, return_type.as_ref(), body, ctx);
            }
            DeclarationNode::NamedValue {
                type_annotation,
                value,
                ..
            } => {
                if let Some(annotation) = type_annotation {
                    self.analyze_type_reference(annotation, ctx);
                    self.add_tag(
                        at,
                        NodeTag::TypeAnnotated {
                            annotation: annotation.info.breadcrumbs.clone(),
                        },
                    );
                }
                self.analyze_expression(value, ctx);
                self.add_tag(
                    at,
                    NodeTag::ValueComesFrom {
                        source: value.info().breadcrumbs.clone(),
                    },
                );
            }
            DeclarationNode::ObjectType { fields, .. } => {
                for field in fields {
                    self.analyze_type_reference(&field.type_constraint, ctx);
                }
            }
            DeclarationNode::SignalType { fields, result, .. } => {
                for field in fields {
                    self.analyze_type_reference(&field.type_constraint, ctx);
                }
                self.analyze_type_reference(result, ctx);
            }
            DeclarationNode::OptionType { options, .. } => {
                for option in options {
                    self.analyze_type_reference(option, ctx);
                }
            }
        }
    }

    fn analyze_function(
        &mut self,
        at: &Breadcrumbs,
        own_name: Option<&str>,
        params: &[FunctionParameterNode],
        return_type: Option<&TypeReferenceNode>,
        body: &BodyNode,
        outer: &AnalyzerContext,
    ) {
        let mut ctx = outer.clone();
        ctx.functions.push(at.clone());
        ctx.current_loop = None;
        ctx.return_annotation = return_type.map(|reference| reference.info.breadcrumbs.clone());
        if let Some(name) = own_name {
            ctx.declare_local(name, at, false);
        }

        for param in params {
            if let Some(reference) = &param.type_reference {
                self.analyze_type_reference(reference, &ctx);
            }
            ctx.declare_local(&param.name.text, &param.info.breadcrumbs, false);
            self.add_tag(
                &param.info.breadcrumbs,
                NodeTag::DeclarationForScope { scope: at.clone() },
            );
        }

        let body_at = &body.info().breadcrumbs;
        if let Some(reference) = return_type {
            self.analyze_type_reference(reference, &ctx);
            self.add_tag(
                body_at,
                NodeTag::TypeAnnotated {
                    annotation: reference.info.breadcrumbs.clone(),
                },
            );
        }
        self.add_tag(
            at,
            NodeTag::FunctionCanReturnTypeOf {
                returns: body_at.clone(),
            },
        );
        self.analyze_body(body, &ctx);
    }

    fn analyze_body(&mut self, body: &BodyNode, outer: &AnalyzerContext) {
        let mut ctx = outer.clone();
        match body {
            BodyNode::Block { info, statements } => {
                for statement in statements {
                    self.analyze_statement(statement, &info.breadcrumbs, &mut ctx);
                }
            }
            BodyNode::SingleStatement { info, statement } => {
                self.analyze_statement(statement, &info.breadcrumbs, &mut ctx);
                self.add_tag(
                    &info.breadcrumbs,
                    NodeTag::ValueComesFrom {
                        source: statement.info().breadcrumbs.clone(),
                    },
                );
            }
        }
    }

    /// Declarations made here become visible to the following statements in `ctx`.
    fn analyze_statement(
        &mut self,
        statement: &StatementNode,
        block: &Breadcrumbs,
        ctx: &mut AnalyzerContext,
    ) {
        let at = &statement.info().breadcrumbs;
        match statement {
            StatementNode::Expression { expression, .. } => {
                self.analyze_expression(expression, ctx);
                self.add_tag(
                    at,
                    NodeTag::ValueComesFrom {
                        source: expression.info().breadcrumbs.clone(),
                    },
                );
            }
            StatementNode::Declaration { declaration, .. } => {
                self.analyze_local_declaration(declaration, block, ctx);
            }
            StatementNode::Effect { pattern, body, .. } => {
                let mut effect_ctx = ctx.clone();
                effect_ctx.current_loop = None;
                self.analyze_pattern(pattern, at, &mut effect_ctx);
                self.analyze_body(body, &effect_ctx);
            }
            StatementNode::Set {
                identifier,
                expression,
                ..
            } => {
                self.analyze_expression(expression, ctx);
                let Some(item) = ctx.scope.get(&identifier.text).cloned() else {
                    return;
                };
                let bad_write = match &item.kind {
                    ScopeItemKind::Local { is_variable } => {
                        self.add_tag(
                            at,
                            NodeTag::SetsVariable {
                                variable: item.origin.clone(),
                            },
                        );
                        if !is_variable {
                            Some(BadWriteKind::NotVariable)
                        } else if item.function_depth < ctx.depth() {
                            Some(BadWriteKind::OuterVariable)
                        } else {
                            None
                        }
                    }
                    ScopeItemKind::TopLevel { is_variable } => {
                        self.add_tag(
                            at,
                            NodeTag::SetsVariable {
                                variable: item.origin.clone(),
                            },
                        );
                        Some(if *is_variable {
                            BadWriteKind::OuterVariable
                        } else {
                            BadWriteKind::NotVariable
                        })
                    }
                    ScopeItemKind::Builtin { .. } => Some(BadWriteKind::NotVariable),
                };
                if let Some(kind) = bad_write {
                    self.add_tag(at, NodeTag::BadVariableWrite { kind });
                }
            }
        }
    }

    fn analyze_local_declaration(
        &mut self,
        declaration: &DeclarationNode,
        block: &Breadcrumbs,
        ctx: &mut AnalyzerContext,
    ) {
        let at = declaration.info().breadcrumbs.clone();
        match declaration {
            DeclarationNode::Import { mappings, .. } => {
                self.analyze_declaration(declaration, ctx);
                for mapping in mappings {
                    ctx.scope.insert(
                        mapping.local_name().to_string(),
                        ScopeItem {
                            origin: mapping.info.breadcrumbs.clone(),
                            function_depth: ctx.depth(),
                            kind: ScopeItemKind::TopLevel { is_variable: false },
                        },
                    );
                    self.add_tag(
                        &mapping.info.breadcrumbs,
                        NodeTag::DeclarationForScope {
                            scope: block.clone(),
                        },
                    );
                }
                return;
            }
            DeclarationNode::Function { name, .. } => {
                // Visible before its body is analyzed.
                ctx.declare_local(&name.text, &at, false);
                self.analyze_declaration(declaration, ctx);
            }
            DeclarationNode::NamedValue {
                name, is_variable, ..
            } => {
                self.analyze_declaration(declaration, ctx);
                ctx.declare_local(&name.text, &at, *is_variable);
            }
            DeclarationNode::ObjectType { name, .. }
            | DeclarationNode::SignalType { name, .. }
            | DeclarationNode::OptionType { name, .. } => {
                self.analyze_declaration(declaration, ctx);
                ctx.declare_local(&name.text, &at, false);
            }
        }
        self.add_tag(
            &at,
            NodeTag::DeclarationForScope {
                scope: block.clone(),
            },
        );
    }

    fn analyze_pattern(
        &mut self,
        pattern: &PatternNode,
        scope: &Breadcrumbs,
        ctx: &mut AnalyzerContext,
    ) {
        self.analyze_type_reference(&pattern.type_reference, ctx);
        if let Some(name) = &pattern.name {
            ctx.declare_local(&name.text, &pattern.info.breadcrumbs, false);
            self.add_tag(
                &pattern.info.breadcrumbs,
                NodeTag::DeclarationForScope {
                    scope: scope.clone(),
                },
            );
        }
    }

    fn analyze_type_reference(&mut self, reference: &TypeReferenceNode, ctx: &AnalyzerContext) {
        self.bind_identifier(
            &reference.info.breadcrumbs,
            &reference.identifier.text,
            ctx,
        );
    }

    /// Link a name use at `at` to whatever it refers to in `ctx`.
    fn bind_identifier(&mut self, at: &Breadcrumbs, name: &str, ctx: &AnalyzerContext) {
        let Some(item) = ctx.scope.get(name) else {
            self.add_tag(at, NodeTag::NotInScope);
            return;
        };
        match &item.kind {
            ScopeItemKind::Builtin { path } => {
                self.add_tag(
                    at,
                    NodeTag::ReferencesFile {
                        path: path.clone(),
                        export_name: Some(name.to_string()),
                    },
                );
            }
            ScopeItemKind::TopLevel { .. } => {
                self.add_tag(
                    at,
                    NodeTag::ValueComesFrom {
                        source: item.origin.clone(),
                    },
                );
            }
            ScopeItemKind::Local { .. } => {
                self.add_tag(
                    at,
                    NodeTag::ValueComesFrom {
                        source: item.origin.clone(),
                    },
                );
                if item.function_depth < ctx.depth() {
                    // Every function between the declaration and this use carries the value.
                    for function in &ctx.functions[item.function_depth..] {
                        self.add_tag(
                            function,
                            NodeTag::CapturesValue {
                                value: item.origin.clone(),
                            },
                        );
                    }
                    if let Some(function) = ctx.current_function() {
                        self.add_tag(
                            at,
                            NodeTag::UsesCapturedValue {
                                function: function.clone(),
                            },
                        );
                    }
                }
            }
        }
    }

    fn analyze_expression(&mut self, expression: &ExpressionNode, ctx: &AnalyzerContext) {
        let at = &expression.info().breadcrumbs;
        self.add_tag(at, NodeTag::Expression);
        match expression {
            ExpressionNode::Group { expression, .. } => {
                self.analyze_expression(expression, ctx);
                self.add_tag(
                    at,
                    NodeTag::ValueComesFrom {
                        source: expression.info().breadcrumbs.clone(),
                    },
                );
            }
            ExpressionNode::Block { block, .. } => {
                self.analyze_body(block, ctx);
                self.add_tag(
                    at,
                    NodeTag::ValueComesFrom {
                        source: block.info().breadcrumbs.clone(),
                    },
                );
            }
            ExpressionNode::Function {
                params,
                return_type,
                body,
                ..
            } => {
                self.analyze_function(at, None, params, return_type.as_ref(), body, ctx);
            }
            ExpressionNode::Branch {
                with_value,
                branches,
                ..
            } => {
                if let Some(value) = with_value {
                    self.analyze_expression(value, ctx);
                }
                for option in branches {
                    match option {
                        BranchOptionNode::If {
                            condition, body, ..
                        } => {
                            self.analyze_expression(condition, ctx);
                            self.analyze_body(body, ctx);
                        }
                        BranchOptionNode::Is {
                            info,
                            pattern,
                            body,
                        } => {
                            let mut option_ctx = ctx.clone();
                            self.analyze_pattern(pattern, &info.breadcrumbs, &mut option_ctx);
                            self.analyze_body(body, &option_ctx);
                        }
                        BranchOptionNode::Else { body, .. } => self.analyze_body(body, ctx),
                    }
                }
            }
            ExpressionNode::Loop { body, .. } => {
                let mut loop_ctx = ctx.clone();
                loop_ctx.current_loop = Some(at.clone());
                self.analyze_body(body, &loop_ctx);
            }
            ExpressionNode::Cause { signal, .. } => {
                self.analyze_expression(signal, ctx);
                self.add_tag(
                    at,
                    NodeTag::Causes {
                        signal: signal.info().breadcrumbs.clone(),
                    },
                );
            }
            ExpressionNode::Return { value, .. } => {
                let function = ctx.current_function().cloned();
                match (value, function) {
                    (Some(value), function) => {
                        self.analyze_expression(value, ctx);
                        let value_at = &value.info().breadcrumbs;
                        if let Some(function) = function {
                            self.add_tag(
                                value_at,
                                NodeTag::ReturnsFromFunction { function },
                            );
                        }
                        if let Some(annotation) = &ctx.return_annotation {
                            self.add_tag(
                                value_at,
                                NodeTag::TypeAnnotated {
                                    annotation: annotation.clone(),
                                },
                            );
                        }
                    }
                    (None, Some(function)) => {
                        self.add_tag(at, NodeTag::ActionReturn { function });
                    }
                    (None, None) => {}
                }
            }
            ExpressionNode::Break { with_value, .. } => {
                if let Some(value) = with_value {
                    self.analyze_expression(value, ctx);
                }
                if let Some(loop_node) = &ctx.current_loop {
                    self.add_tag(
                        at,
                        NodeTag::BreaksLoop {
                            loop_node: loop_node.clone(),
                        },
                    );
                }
            }
            ExpressionNode::Call {
                callee, parameters, ..
            } => {
                self.analyze_expression(callee, ctx);
                self.add_tag(
                    at,
                    NodeTag::Calls {
                        callee: callee.info().breadcrumbs.clone(),
                    },
                );
                for (index, param) in parameters.iter().enumerate() {
                    self.analyze_expression(&param.value, ctx);
                    self.add_tag(
                        &param.info.breadcrumbs,
                        NodeTag::ValueComesFrom {
                            source: param.value.info().breadcrumbs.clone(),
                        },
                    );
                    self.add_tag(
                        at,
                        NodeTag::CallsWithParameter {
                            parameter: param.info.breadcrumbs.clone(),
                            index,
                        },
                    );
                }
            }
            ExpressionNode::Member { object, .. } => self.analyze_expression(object, ctx),
            ExpressionNode::Identifier { name, .. } => self.bind_identifier(at, name, ctx),
            ExpressionNode::StringLiteral { .. } | ExpressionNode::NumberLiteral { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_resolve_against_the_importing_file() {
        assert_eq!(
            normalize_import_path("project/src/main.cau", "./util"),
            Some("project/src/util.cau".to_string())
        );
        assert_eq!(
            normalize_import_path("project/src/main.cau", "../lib/util.cau"),
            Some("project/lib/util.cau".to_string())
        );
        assert_eq!(
            normalize_import_path("project/main.cau", "core/math"),
            Some("core/math.cau".to_string())
        );
    }

    #[test]
    fn climbing_above_the_project_is_rejected() {
        assert_eq!(normalize_import_path("project/main.cau", "../other"), None);
    }
}
