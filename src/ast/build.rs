//=====================================================
// File: ast/build.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Programmatic construction of CauseLang syntax trees
// Objective: Let embedders and tests assemble trees without a parser;
//            `file` stamps breadcrumbs on the finished tree
//=====================================================

use super::*;

fn info() -> NodeInfo {
    NodeInfo::default()
}

fn name(text: &str) -> IdentifierNode {
    IdentifierNode {
        info: info(),
        text: text.to_string(),
    }
}

pub fn type_ref(text: &str) -> TypeReferenceNode {
    TypeReferenceNode {
        info: info(),
        identifier: name(text),
    }
}

/// Finish a file and assign breadcrumbs to every node.
pub fn file(declarations: Vec<DeclarationNode>) -> FileNode {
    let mut node = FileNode {
        info: info(),
        declarations,
    };
    node.assign_breadcrumbs();
    node
}

//=====================================================
// Declarations
//=====================================================

/// `import "path" { a, b }`
pub fn import(path: &str, names: &[&str]) -> DeclarationNode {
    let mappings = names
        .iter()
        .map(|source| ImportMappingNode {
            info: info(),
            source_name: name(source),
            rename: None,
        })
        .collect();
    import_mappings(path, mappings)
}

/// `import "path" { source as rename }`
pub fn import_as(path: &str, renames: &[(&str, &str)]) -> DeclarationNode {
    let mappings = renames
        .iter()
        .map(|(source, rename)| ImportMappingNode {
            info: info(),
            source_name: name(source),
            rename: Some(name(rename)),
        })
        .collect();
    import_mappings(path, mappings)
}

fn import_mappings(path: &str, mappings: Vec<ImportMappingNode>) -> DeclarationNode {
    DeclarationNode::Import {
        info: info(),
        path: ImportPathNode {
            info: info(),
            path: path.to_string(),
        },
        mappings,
    }
}

pub fn function(function_name: &str, body: BodyNode) -> DeclarationNode {
    function_with(function_name, Vec::new(), None, body)
}

pub fn function_with(
    function_name: &str,
    params: Vec<FunctionParameterNode>,
    return_type: Option<&str>,
    body: BodyNode,
) -> DeclarationNode {
    DeclarationNode::Function {
        info: info(),
        name: name(function_name),
        params,
        return_type: return_type.map(type_ref),
        body,
    }
}

pub fn param(param_name: &str) -> FunctionParameterNode {
    FunctionParameterNode {
        info: info(),
        name: name(param_name),
        type_reference: None,
    }
}

pub fn typed_param(param_name: &str, type_name: &str) -> FunctionParameterNode {
    FunctionParameterNode {
        info: info(),
        name: name(param_name),
        type_reference: Some(type_ref(type_name)),
    }
}

/// `let name = value`
pub fn let_value(value_name: &str, value: ExpressionNode) -> DeclarationNode {
    named_value(value_name, None, value, false)
}

/// `let variable name = value`
pub fn let_variable(value_name: &str, value: ExpressionNode) -> DeclarationNode {
    named_value(value_name, None, value, true)
}

/// `let name: Type = value`
pub fn let_typed(value_name: &str, type_name: &str, value: ExpressionNode) -> DeclarationNode {
    named_value(value_name, Some(type_name), value, false)
}

pub fn named_value(
    value_name: &str,
    type_name: Option<&str>,
    value: ExpressionNode,
    is_variable: bool,
) -> DeclarationNode {
    DeclarationNode::NamedValue {
        info: info(),
        name: name(value_name),
        type_annotation: type_name.map(type_ref),
        value,
        is_variable,
    }
}

fn fields(entries: &[(&str, &str)]) -> Vec<ObjectFieldNode> {
    entries
        .iter()
        .map(|(field_name, type_name)| ObjectFieldNode {
            info: info(),
            name: name(field_name),
            type_constraint: type_ref(type_name),
        })
        .collect()
}

pub fn object_type(type_name: &str, entries: &[(&str, &str)]) -> DeclarationNode {
    DeclarationNode::ObjectType {
        info: info(),
        name: name(type_name),
        fields: fields(entries),
    }
}

pub fn signal_type(type_name: &str, entries: &[(&str, &str)], result: &str) -> DeclarationNode {
    DeclarationNode::SignalType {
        info: info(),
        name: name(type_name),
        fields: fields(entries),
        result: type_ref(result),
    }
}

pub fn option_type(type_name: &str, options: &[&str]) -> DeclarationNode {
    DeclarationNode::OptionType {
        info: info(),
        name: name(type_name),
        options: options.iter().map(|option| type_ref(option)).collect(),
    }
}

//=====================================================
// Bodies and statements
//=====================================================

pub fn block(statements: Vec<StatementNode>) -> BodyNode {
    BodyNode::Block {
        info: info(),
        statements,
    }
}

pub fn single(statement: StatementNode) -> BodyNode {
    BodyNode::SingleStatement {
        info: info(),
        statement: Box::new(statement),
    }
}

pub fn expr(expression: ExpressionNode) -> StatementNode {
    StatementNode::Expression {
        info: info(),
        expression,
    }
}

pub fn decl(declaration: DeclarationNode) -> StatementNode {
    StatementNode::Declaration {
        info: info(),
        declaration: Box::new(declaration),
    }
}

pub fn pattern(binding: Option<&str>, type_name: &str) -> PatternNode {
    PatternNode {
        info: info(),
        name: binding.map(name),
        type_reference: type_ref(type_name),
    }
}

/// `effect for Type as binding { body }`
pub fn effect(binding: Option<&str>, type_name: &str, body: BodyNode) -> StatementNode {
    StatementNode::Effect {
        info: info(),
        pattern: pattern(binding, type_name),
        body,
    }
}

pub fn set(variable: &str, expression: ExpressionNode) -> StatementNode {
    StatementNode::Set {
        info: info(),
        identifier: name(variable),
        expression,
    }
}

//=====================================================
// Expressions
//=====================================================

pub fn ident(text: &str) -> ExpressionNode {
    ExpressionNode::Identifier {
        info: info(),
        name: text.to_string(),
    }
}

pub fn text(value: &str) -> ExpressionNode {
    ExpressionNode::StringLiteral {
        info: info(),
        text: value.to_string(),
    }
}

pub fn number(value: f64) -> ExpressionNode {
    ExpressionNode::NumberLiteral {
        info: info(),
        value,
    }
}

pub fn group(expression: ExpressionNode) -> ExpressionNode {
    ExpressionNode::Group {
        info: info(),
        expression: Box::new(expression),
    }
}

pub fn block_expr(body: BodyNode) -> ExpressionNode {
    ExpressionNode::Block {
        info: info(),
        block: Box::new(body),
    }
}

pub fn lambda(
    params: Vec<FunctionParameterNode>,
    return_type: Option<&str>,
    body: BodyNode,
) -> ExpressionNode {
    ExpressionNode::Function {
        info: info(),
        params,
        return_type: return_type.map(type_ref),
        body: Box::new(body),
    }
}

pub fn call(callee: ExpressionNode, parameters: Vec<ExpressionNode>) -> ExpressionNode {
    ExpressionNode::Call {
        info: info(),
        callee: Box::new(callee),
        parameters: parameters
            .into_iter()
            .map(|value| CallParameterNode {
                info: info(),
                value,
            })
            .collect(),
    }
}

pub fn cause(signal: ExpressionNode) -> ExpressionNode {
    ExpressionNode::Cause {
        info: info(),
        signal: Box::new(signal),
    }
}

pub fn member(object: ExpressionNode, member_name: &str) -> ExpressionNode {
    ExpressionNode::Member {
        info: info(),
        object: Box::new(object),
        member: name(member_name),
    }
}

pub fn branch(with_value: Option<ExpressionNode>, branches: Vec<BranchOptionNode>) -> ExpressionNode {
    ExpressionNode::Branch {
        info: info(),
        with_value: with_value.map(Box::new),
        branches,
    }
}

pub fn when(condition: ExpressionNode, body: BodyNode) -> BranchOptionNode {
    BranchOptionNode::If {
        info: info(),
        condition,
        body,
    }
}

pub fn is_type(binding: Option<&str>, type_name: &str, body: BodyNode) -> BranchOptionNode {
    BranchOptionNode::Is {
        info: info(),
        pattern: pattern(binding, type_name),
        body,
    }
}

pub fn otherwise(body: BodyNode) -> BranchOptionNode {
    BranchOptionNode::Else { info: info(), body }
}

pub fn loop_body(body: BodyNode) -> ExpressionNode {
    ExpressionNode::Loop {
        info: info(),
        body: Box::new(body),
    }
}

pub fn return_value(value: Option<ExpressionNode>) -> ExpressionNode {
    ExpressionNode::Return {
        info: info(),
        value: value.map(Box::new),
    }
}

pub fn break_with(with_value: Option<ExpressionNode>) -> ExpressionNode {
    ExpressionNode::Break {
        info: info(),
        with_value: with_value.map(Box::new),
    }
}
