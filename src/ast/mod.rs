//=====================================================
// File: ast/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: CauseLang syntax tree definitions
// Objective: Define file, declaration, statement, expression, pattern, and
//            type reference nodes, each addressed by its breadcrumbs
//=====================================================

pub mod breadcrumbs;
pub mod build;

pub use breadcrumbs::{
    BreadcrumbEntry, Breadcrumbs, DocumentPosition, DocumentRange, NodeInfo, SourcePosition,
};

use std::collections::BTreeMap;

/// A bare name with its own position (declaration names, member names).
#[derive(Debug, Clone, PartialEq)]
pub struct IdentifierNode {
    pub info: NodeInfo,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeReferenceNode {
    pub info: NodeInfo,
    pub identifier: IdentifierNode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileNode {
    pub info: NodeInfo,
    pub declarations: Vec<DeclarationNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportPathNode {
    pub info: NodeInfo,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportMappingNode {
    pub info: NodeInfo,
    pub source_name: IdentifierNode,
    pub rename: Option<IdentifierNode>,
}

impl ImportMappingNode {
    /// Name the mapping binds in the importing file.
    pub fn local_name(&self) -> &str {
        self.rename
            .as_ref()
            .map(|rename| rename.text.as_str())
            .unwrap_or(&self.source_name.text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionParameterNode {
    pub info: NodeInfo,
    pub name: IdentifierNode,
    pub type_reference: Option<TypeReferenceNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectFieldNode {
    pub info: NodeInfo,
    pub name: IdentifierNode,
    pub type_constraint: TypeReferenceNode,
}

/// Declarations valid at file level and inside blocks.
#[derive(Debug, Clone, PartialEq)]
pub enum DeclarationNode {
    Import {
        info: NodeInfo,
        path: ImportPathNode,
        mappings: Vec<ImportMappingNode>,
    },
    Function {
        info: NodeInfo,
        name: IdentifierNode,
        params: Vec<FunctionParameterNode>,
        return_type: Option<TypeReferenceNode>,
        body: BodyNode,
    },
    NamedValue {
        info: NodeInfo,
        name: IdentifierNode,
        type_annotation: Option<TypeReferenceNode>,
        value: ExpressionNode,
        is_variable: bool,
    },
    ObjectType {
        info: NodeInfo,
        name: IdentifierNode,
        fields: Vec<ObjectFieldNode>,
    },
    SignalType {
        info: NodeInfo,
        name: IdentifierNode,
        fields: Vec<ObjectFieldNode>,
        result: TypeReferenceNode,
    },
    OptionType {
        info: NodeInfo,
        name: IdentifierNode,
        options: Vec<TypeReferenceNode>,
    },
}

impl DeclarationNode {
    pub fn info(&self) -> &NodeInfo {
        match self {
            DeclarationNode::Import { info, .. }
            | DeclarationNode::Function { info, .. }
            | DeclarationNode::NamedValue { info, .. }
            | DeclarationNode::ObjectType { info, .. }
            | DeclarationNode::SignalType { info, .. }
            | DeclarationNode::OptionType { info, .. } => info,
        }
    }

    /// Declared name, if the declaration binds exactly one.
    pub fn name(&self) -> Option<&str> {
        match self {
            DeclarationNode::Import { .. } => None,
            DeclarationNode::Function { name, .. }
            | DeclarationNode::NamedValue { name, .. }
            | DeclarationNode::ObjectType { name, .. }
            | DeclarationNode::SignalType { name, .. }
            | DeclarationNode::OptionType { name, .. } => Some(&name.text),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BodyNode {
    Block {
        info: NodeInfo,
        statements: Vec<StatementNode>,
    },
    SingleStatement {
        info: NodeInfo,
        statement: Box<StatementNode>,
    },
}

impl BodyNode {
    pub fn info(&self) -> &NodeInfo {
        match self {
            BodyNode::Block { info, .. } | BodyNode::SingleStatement { info, .. } => info,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternNode {
    pub info: NodeInfo,
    pub name: Option<IdentifierNode>,
    pub type_reference: TypeReferenceNode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementNode {
    Expression {
        info: NodeInfo,
        expression: ExpressionNode,
    },
    Declaration {
        info: NodeInfo,
        declaration: Box<DeclarationNode>,
    },
    Effect {
        info: NodeInfo,
        pattern: PatternNode,
        body: BodyNode,
    },
    Set {
        info: NodeInfo,
        identifier: IdentifierNode,
        expression: ExpressionNode,
    },
}

impl StatementNode {
    pub fn info(&self) -> &NodeInfo {
        match self {
            StatementNode::Expression { info, .. }
            | StatementNode::Declaration { info, .. }
            | StatementNode::Effect { info, .. }
            | StatementNode::Set { info, .. } => info,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallParameterNode {
    pub info: NodeInfo,
    pub value: ExpressionNode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BranchOptionNode {
    If {
        info: NodeInfo,
        condition: ExpressionNode,
        body: BodyNode,
    },
    Is {
        info: NodeInfo,
        pattern: PatternNode,
        body: BodyNode,
    },
    Else {
        info: NodeInfo,
        body: BodyNode,
    },
}

impl BranchOptionNode {
    pub fn info(&self) -> &NodeInfo {
        match self {
            BranchOptionNode::If { info, .. }
            | BranchOptionNode::Is { info, .. }
            | BranchOptionNode::Else { info, .. } => info,
        }
    }

    pub fn body(&self) -> &BodyNode {
        match self {
            BranchOptionNode::If { body, .. }
            | BranchOptionNode::Is { body, .. }
            | BranchOptionNode::Else { body, .. } => body,
        }
    }
}

/// Expressions in CauseLang
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionNode {
    Group {
        info: NodeInfo,
        expression: Box<ExpressionNode>,
    },
    Block {
        info: NodeInfo,
        block: Box<BodyNode>,
    },
    Function {
        info: NodeInfo,
        params: Vec<FunctionParameterNode>,
        return_type: Option<TypeReferenceNode>,
        body: Box<BodyNode>,
    },
    Branch {
        info: NodeInfo,
        with_value: Option<Box<ExpressionNode>>,
        branches: Vec<BranchOptionNode>,
    },
    Loop {
        info: NodeInfo,
        body: Box<BodyNode>,
    },
    Cause {
        info: NodeInfo,
        signal: Box<ExpressionNode>,
    },
    Return {
        info: NodeInfo,
        value: Option<Box<ExpressionNode>>,
    },
    Break {
        info: NodeInfo,
        with_value: Option<Box<ExpressionNode>>,
    },
    Call {
        info: NodeInfo,
        callee: Box<ExpressionNode>,
        parameters: Vec<CallParameterNode>,
    },
    Member {
        info: NodeInfo,
        object: Box<ExpressionNode>,
        member: IdentifierNode,
    },
    Identifier {
        info: NodeInfo,
        name: String,
    },
    StringLiteral {
        info: NodeInfo,
        text: String,
    },
    NumberLiteral {
        info: NodeInfo,
        value: f64,
    },
}

impl ExpressionNode {
    pub fn info(&self) -> &NodeInfo {
        match self {
            ExpressionNode::Group { info, .. }
            | ExpressionNode::Block { info, .. }
            | ExpressionNode::Function { info, .. }
            | ExpressionNode::Branch { info, .. }
            | ExpressionNode::Loop { info, .. }
            | ExpressionNode::Cause { info, .. }
            | ExpressionNode::Return { info, .. }
            | ExpressionNode::Break { info, .. }
            | ExpressionNode::Call { info, .. }
            | ExpressionNode::Member { info, .. }
            | ExpressionNode::Identifier { info, .. }
            | ExpressionNode::StringLiteral { info, .. }
            | ExpressionNode::NumberLiteral { info, .. } => info,
        }
    }
}

//=====================================================
// Node references
//=====================================================

/// Borrowed view of any node, used to look nodes up by breadcrumbs.
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    File(&'a FileNode),
    Declaration(&'a DeclarationNode),
    ImportPath(&'a ImportPathNode),
    ImportMapping(&'a ImportMappingNode),
    FunctionParameter(&'a FunctionParameterNode),
    ObjectField(&'a ObjectFieldNode),
    Body(&'a BodyNode),
    Statement(&'a StatementNode),
    Pattern(&'a PatternNode),
    Expression(&'a ExpressionNode),
    CallParameter(&'a CallParameterNode),
    BranchOption(&'a BranchOptionNode),
    TypeReference(&'a TypeReferenceNode),
    Identifier(&'a IdentifierNode),
}

impl<'a> NodeRef<'a> {
    pub fn info(&self) -> &'a NodeInfo {
        match *self {
            NodeRef::File(node) => &node.info,
            NodeRef::Declaration(node) => node.info(),
            NodeRef::ImportPath(node) => &node.info,
            NodeRef::ImportMapping(node) => &node.info,
            NodeRef::FunctionParameter(node) => &node.info,
            NodeRef::ObjectField(node) => &node.info,
            NodeRef::Body(node) => node.info(),
            NodeRef::Statement(node) => node.info(),
            NodeRef::Pattern(node) => &node.info,
            NodeRef::Expression(node) => node.info(),
            NodeRef::CallParameter(node) => &node.info,
            NodeRef::BranchOption(node) => node.info(),
            NodeRef::TypeReference(node) => &node.info,
            NodeRef::Identifier(node) => &node.info,
        }
    }

    pub fn breadcrumbs(&self) -> &'a Breadcrumbs {
        &self.info().breadcrumbs
    }

    /// Direct children in document order.
    pub fn children(&self) -> Vec<NodeRef<'a>> {
        let mut out = Vec::new();
        match *self {
            NodeRef::File(file) => {
                out.extend(file.declarations.iter().map(NodeRef::Declaration));
            }
            NodeRef::Declaration(declaration) => match declaration {
                DeclarationNode::Import { path, mappings, .. } => {
                    out.push(NodeRef::ImportPath(path));
                    out.extend(mappings.iter().map(NodeRef::ImportMapping));
                }
                DeclarationNode::Function {
                    name,
                    params,
                    return_type,
                    body,
                    ..
                } => {
                    out.push(NodeRef::Identifier(name));
                    out.extend(params.iter().map(NodeRef::FunctionParameter));
                    out.extend(return_type.iter().map(NodeRef::TypeReference));
                    out.push(NodeRef::Body(body));
                }
                DeclarationNode::NamedValue {
                    name,
                    type_annotation,
                    value,
                    ..
                } => {
                    out.push(NodeRef::Identifier(name));
                    out.extend(type_annotation.iter().map(NodeRef::TypeReference));
                    out.push(NodeRef::Expression(value));
                }
                DeclarationNode::ObjectType { name, fields, .. } => {
                    out.push(NodeRef::Identifier(name));
                    out.extend(fields.iter().map(NodeRef::ObjectField));
                }
                DeclarationNode::SignalType {
                    name,
                    fields,
                    result,
                    ..
                } => {
                    out.push(NodeRef::Identifier(name));
                    out.extend(fields.iter().map(NodeRef::ObjectField));
                    out.push(NodeRef::TypeReference(result));
                }
                DeclarationNode::OptionType { name, options, .. } => {
                    out.push(NodeRef::Identifier(name));
                    out.extend(options.iter().map(NodeRef::TypeReference));
                }
            },
            NodeRef::ImportPath(_) | NodeRef::Identifier(_) => {}
            NodeRef::ImportMapping(mapping) => {
                out.push(NodeRef::Identifier(&mapping.source_name));
                out.extend(mapping.rename.iter().map(NodeRef::Identifier));
            }
            NodeRef::FunctionParameter(param) => {
                out.push(NodeRef::Identifier(&param.name));
                out.extend(param.type_reference.iter().map(NodeRef::TypeReference));
            }
            NodeRef::ObjectField(field) => {
                out.push(NodeRef::Identifier(&field.name));
                out.push(NodeRef::TypeReference(&field.type_constraint));
            }
            NodeRef::Body(body) => match body {
                BodyNode::Block { statements, .. } => {
                    out.extend(statements.iter().map(NodeRef::Statement));
                }
                BodyNode::SingleStatement { statement, .. } => {
                    out.push(NodeRef::Statement(statement));
                }
            },
            NodeRef::Statement(statement) => match statement {
                StatementNode::Expression { expression, .. } => {
                    out.push(NodeRef::Expression(expression));
                }
                StatementNode::Declaration { declaration, .. } => {
                    out.push(NodeRef::Declaration(declaration));
                }
                StatementNode::Effect { pattern, body, .. } => {
                    out.push(NodeRef::Pattern(pattern));
                    out.push(NodeRef::Body(body));
                }
                StatementNode::Set {
                    identifier,
                    expression,
                    ..
                } => {
                    out.push(NodeRef::Identifier(identifier));
                    out.push(NodeRef::Expression(expression));
                }
            },
            NodeRef::Pattern(pattern) => {
                out.extend(pattern.name.iter().map(NodeRef::Identifier));
                out.push(NodeRef::TypeReference(&pattern.type_reference));
            }
            NodeRef::TypeReference(reference) => {
                out.push(NodeRef::Identifier(&reference.identifier));
            }
            NodeRef::CallParameter(param) => out.push(NodeRef::Expression(&param.value)),
            NodeRef::BranchOption(option) => match option {
                BranchOptionNode::If {
                    condition, body, ..
                } => {
                    out.push(NodeRef::Expression(condition));
                    out.push(NodeRef::Body(body));
                }
                BranchOptionNode::Is { pattern, body, .. } => {
                    out.push(NodeRef::Pattern(pattern));
                    out.push(NodeRef::Body(body));
                }
                BranchOptionNode::Else { body, .. } => out.push(NodeRef::Body(body)),
            },
            NodeRef::Expression(expression) => match expression {
                ExpressionNode::Group { expression, .. } => {
                    out.push(NodeRef::Expression(expression));
                }
                ExpressionNode::Block { block, .. } => out.push(NodeRef::Body(block)),
                ExpressionNode::Function {
                    params,
                    return_type,
                    body,
                    ..
                } => {
                    out.extend(params.iter().map(NodeRef::FunctionParameter));
                    out.extend(return_type.iter().map(NodeRef::TypeReference));
                    out.push(NodeRef::Body(body));
                }
                ExpressionNode::Branch {
                    with_value,
                    branches,
                    ..
                } => {
                    out.extend(with_value.iter().map(|value| NodeRef::Expression(value)));
                    out.extend(branches.iter().map(NodeRef::BranchOption));
                }
                ExpressionNode::Loop { body, .. } => out.push(NodeRef::Body(body)),
                ExpressionNode::Cause { signal, .. } => out.push(NodeRef::Expression(signal)),
                ExpressionNode::Return { value, .. } => {
                    out.extend(value.iter().map(|value| NodeRef::Expression(value)));
                }
                ExpressionNode::Break { with_value, .. } => {
                    out.extend(with_value.iter().map(|value| NodeRef::Expression(value)));
                }
                ExpressionNode::Call {
                    callee, parameters, ..
                } => {
                    out.push(NodeRef::Expression(callee));
                    out.extend(parameters.iter().map(NodeRef::CallParameter));
                }
                ExpressionNode::Member { object, member, .. } => {
                    out.push(NodeRef::Expression(object));
                    out.push(NodeRef::Identifier(member));
                }
                ExpressionNode::Identifier { .. }
                | ExpressionNode::StringLiteral { .. }
                | ExpressionNode::NumberLiteral { .. } => {}
            },
        }
        out
    }
}

impl FileNode {
    /// Every node in the file keyed by breadcrumbs.
    pub fn index(&self) -> BTreeMap<Breadcrumbs, NodeRef<'_>> {
        let mut index = BTreeMap::new();
        let mut pending = vec![NodeRef::File(self)];
        while let Some(node) = pending.pop() {
            index.insert(node.breadcrumbs().clone(), node);
            pending.extend(node.children());
        }
        index
    }

    /// Overwrite every node's breadcrumbs with its structural path from the root.
    pub fn assign_breadcrumbs(&mut self) {
        let root = Breadcrumbs::empty();
        self.info.breadcrumbs = root.clone();
        let base = root.append_name("declarations");
        for (index, declaration) in self.declarations.iter_mut().enumerate() {
            stamp_declaration(declaration, base.append_index(index));
        }
    }
}

//=====================================================
// Breadcrumb assignment
//=====================================================

fn stamp_identifier(node: &mut IdentifierNode, at: Breadcrumbs) {
    node.info.breadcrumbs = at;
}

fn stamp_type_reference(node: &mut TypeReferenceNode, at: Breadcrumbs) {
    stamp_identifier(&mut node.identifier, at.append_name("identifier"));
    node.info.breadcrumbs = at;
}

fn stamp_params(params: &mut [FunctionParameterNode], base: &Breadcrumbs) {
    let base = base.append_name("params");
    for (index, param) in params.iter_mut().enumerate() {
        let at = base.append_index(index);
        stamp_identifier(&mut param.name, at.append_name("name"));
        if let Some(reference) = param.type_reference.as_mut() {
            stamp_type_reference(reference, at.append_name("type_reference"));
        }
        param.info.breadcrumbs = at;
    }
}

fn stamp_fields(fields: &mut [ObjectFieldNode], base: &Breadcrumbs) {
    let base = base.append_name("fields");
    for (index, field) in fields.iter_mut().enumerate() {
        let at = base.append_index(index);
        stamp_identifier(&mut field.name, at.append_name("name"));
        stamp_type_reference(&mut field.type_constraint, at.append_name("type_constraint"));
        field.info.breadcrumbs = at;
    }
}

fn stamp_declaration(node: &mut DeclarationNode, at: Breadcrumbs) {
    match node {
        DeclarationNode::Import {
            info,
            path,
            mappings,
        } => {
            path.info.breadcrumbs = at.append_name("path");
            let base = at.append_name("mappings");
            for (index, mapping) in mappings.iter_mut().enumerate() {
                let mapping_at = base.append_index(index);
                stamp_identifier(&mut mapping.source_name, mapping_at.append_name("source_name"));
                if let Some(rename) = mapping.rename.as_mut() {
                    stamp_identifier(rename, mapping_at.append_name("rename"));
                }
                mapping.info.breadcrumbs = mapping_at;
            }
            info.breadcrumbs = at;
        }
        DeclarationNode::Function {
            info,
            name,
            params,
            return_type,
            body,
        } => {
            stamp_identifier(name, at.append_name("name"));
            stamp_params(params, &at);
            if let Some(reference) = return_type.as_mut() {
                stamp_type_reference(reference, at.append_name("return_type"));
            }
            stamp_body(body, at.append_name("body"));
            info.breadcrumbs = at;
        }
        DeclarationNode::NamedValue {
            info,
            name,
            type_annotation,
            value,
            ..
        } => {
            stamp_identifier(name, at.append_name("name"));
            if let Some(reference) = type_annotation.as_mut() {
                stamp_type_reference(reference, at.append_name("type_annotation"));
            }
            stamp_expression(value, at.append_name("value"));
            info.breadcrumbs = at;
        }
        DeclarationNode::ObjectType { info, name, fields } => {
            stamp_identifier(name, at.append_name("name"));
            stamp_fields(fields, &at);
            info.breadcrumbs = at;
        }
        DeclarationNode::SignalType {
            info,
            name,
            fields,
            result,
        } => {
            stamp_identifier(name, at.append_name("name"));
            stamp_fields(fields, &at);
            stamp_type_reference(result, at.append_name("result"));
            info.breadcrumbs = at;
        }
        DeclarationNode::OptionType {
            info,
            name,
            options,
        } => {
            stamp_identifier(name, at.append_name("name"));
            let base = at.append_name("options");
            for (index, option) in options.iter_mut().enumerate() {
                stamp_type_reference(option, base.append_index(index));
            }
            info.breadcrumbs = at;
        }
    }
}

fn stamp_body(node: &mut BodyNode, at: Breadcrumbs) {
    match node {
        BodyNode::Block { info, statements } => {
            let base = at.append_name("statements");
            for (index, statement) in statements.iter_mut().enumerate() {
                stamp_statement(statement, base.append_index(index));
            }
            info.breadcrumbs = at;
        }
        BodyNode::SingleStatement { info, statement } => {
            stamp_statement(statement, at.append_name("statement"));
            info.breadcrumbs = at;
        }
    }
}

fn stamp_pattern(node: &mut PatternNode, at: Breadcrumbs) {
    if let Some(name) = node.name.as_mut() {
        stamp_identifier(name, at.append_name("name"));
    }
    stamp_type_reference(&mut node.type_reference, at.append_name("type_reference"));
    node.info.breadcrumbs = at;
}

fn stamp_statement(node: &mut StatementNode, at: Breadcrumbs) {
    match node {
        StatementNode::Expression { info, expression } => {
            stamp_expression(expression, at.append_name("expression"));
            info.breadcrumbs = at;
        }
        StatementNode::Declaration { info, declaration } => {
            stamp_declaration(declaration, at.append_name("declaration"));
            info.breadcrumbs = at;
        }
        StatementNode::Effect {
            info,
            pattern,
            body,
        } => {
            stamp_pattern(pattern, at.append_name("pattern"));
            stamp_body(body, at.append_name("body"));
            info.breadcrumbs = at;
        }
        StatementNode::Set {
            info,
            identifier,
            expression,
        } => {
            stamp_identifier(identifier, at.append_name("identifier"));
            stamp_expression(expression, at.append_name("expression"));
            info.breadcrumbs = at;
        }
    }
}

fn stamp_expression(node: &mut ExpressionNode, at: Breadcrumbs) {
    match node {
        ExpressionNode::Group { expression, .. } => {
            stamp_expression(expression, at.append_name("expression"));
        }
        ExpressionNode::Block { block, .. } => stamp_body(block, at.append_name("block")),
        ExpressionNode::Function {
            params,
            return_type,
            body,
            ..
        } => {
            stamp_params(params, &at);
            if let Some(reference) = return_type.as_mut() {
                stamp_type_reference(reference, at.append_name("return_type"));
            }
            stamp_body(body, at.append_name("body"));
        }
        ExpressionNode::Branch {
            with_value,
            branches,
            ..
        } => {
            if let Some(value) = with_value.as_mut() {
                stamp_expression(value, at.append_name("with_value"));
            }
            let base = at.append_name("branches");
            for (index, option) in branches.iter_mut().enumerate() {
                let option_at = base.append_index(index);
                match option {
                    BranchOptionNode::If {
                        info,
                        condition,
                        body,
                    } => {
                        stamp_expression(condition, option_at.append_name("condition"));
                        stamp_body(body, option_at.append_name("body"));
                        info.breadcrumbs = option_at;
                    }
                    BranchOptionNode::Is {
                        info,
                        pattern,
                        body,
                    } => {
                        stamp_pattern(pattern, option_at.append_name("pattern"));
                        stamp_body(body, option_at.append_name("body"));
                        info.breadcrumbs = option_at;
                    }
                    BranchOptionNode::Else { info, body } => {
                        stamp_body(body, option_at.append_name("body"));
                        info.breadcrumbs = option_at;
                    }
                }
            }
        }
        ExpressionNode::Loop { body, .. } => stamp_body(body, at.append_name("body")),
        ExpressionNode::Cause { signal, .. } => stamp_expression(signal, at.append_name("signal")),
        ExpressionNode::Return { value, .. } => {
            if let Some(value) = value.as_mut() {
                stamp_expression(value, at.append_name("value"));
            }
        }
        ExpressionNode::Break { with_value, .. } => {
            if let Some(value) = with_value.as_mut() {
                stamp_expression(value, at.append_name("with_value"));
            }
        }
        ExpressionNode::Call {
            callee, parameters, ..
        } => {
            stamp_expression(callee, at.append_name("callee"));
            let base = at.append_name("parameters");
            for (index, param) in parameters.iter_mut().enumerate() {
                let param_at = base.append_index(index);
                stamp_expression(&mut param.value, param_at.append_name("value"));
                param.info.breadcrumbs = param_at;
            }
        }
        ExpressionNode::Member { object, member, .. } => {
            stamp_expression(object, at.append_name("object"));
            stamp_identifier(member, at.append_name("member"));
        }
        ExpressionNode::Identifier { .. }
        | ExpressionNode::StringLiteral { .. }
        | ExpressionNode::NumberLiteral { .. } => {}
    }
    set_expression_breadcrumbs(node, at);
}

fn set_expression_breadcrumbs(node: &mut ExpressionNode, at: Breadcrumbs) {
    let info = match node {
        ExpressionNode::Group { info, .. }
        | ExpressionNode::Block { info, .. }
        | ExpressionNode::Function { info, .. }
        | ExpressionNode::Branch { info, .. }
        | ExpressionNode::Loop { info, .. }
        | ExpressionNode::Cause { info, .. }
        | ExpressionNode::Return { info, .. }
        | ExpressionNode::Break { info, .. }
        | ExpressionNode::Call { info, .. }
        | ExpressionNode::Member { info, .. }
        | ExpressionNode::Identifier { info, .. }
        | ExpressionNode::StringLiteral { info, .. }
        | ExpressionNode::NumberLiteral { info, .. } => info,
    };
    info.breadcrumbs = at;
}

#[cfg(test)]
mod tests {
    use super::build::*;
    use super::*;

    #[test]
    fn assigns_structural_breadcrumbs() {
        let file = file(vec![function(
            "main",
            block(vec![expr(call(ident("Debug"), vec![text("x")]))]),
        )]);
        let index = file.index();
        let call_at = Breadcrumbs::parse("declarations.0.body.statements.0.expression");
        match index.get(&call_at) {
            Some(NodeRef::Expression(ExpressionNode::Call { .. })) => {}
            other => panic!("expected call expression, found {other:?}"),
        }
        let arg_at = call_at.append_name("parameters").append_index(0).append_name("value");
        assert!(matches!(
            index.get(&arg_at),
            Some(NodeRef::Expression(ExpressionNode::StringLiteral { .. }))
        ));
    }
}
