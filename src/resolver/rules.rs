//=====================================================
// File: resolver/rules.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Per-node typing rules
// Objective: Compute one slot from the current resolution state, returning
//            Pending whenever a dependency is still unresolved
//=====================================================

use super::{PassOutput, Resolver};
use crate::analyzer::{BadWriteKind, NodeTag};
use crate::ast::{
    BodyNode, BranchOptionNode, Breadcrumbs, DeclarationNode, ExpressionNode,
    FunctionParameterNode, NodeRef, ObjectFieldNode, PatternNode, StatementNode,
    TypeReferenceNode,
};
use crate::errors::CompileError;
use crate::types::{
    CanonicalLangType, ConstraintReference, ErrorLangType, IncompatibleType, LangParameter,
    LangType, ObjectField, PrimitiveKind, ValueLangType,
};

type Rule = Result<LangType, CompileError>;

fn error(error: ErrorLangType) -> LangType {
    LangType::Error(error)
}

/// `Action` named as a type is also its own only value.
fn action_as_value(value: LangType) -> LangType {
    match value {
        LangType::Constraint(ValueLangType::Action) => LangType::Value(ValueLangType::Action),
        other => other,
    }
}

/// Unique types and `Action` read as values; everything else is unchanged.
fn value_view(value: LangType) -> LangType {
    match value {
        LangType::Constraint(ValueLangType::Instance(canonical)) if canonical.is_unique() => {
            LangType::Value(ValueLangType::Instance(canonical))
        }
        other => action_as_value(other),
    }
}

impl<'a> Resolver<'a> {
    //=================================================
    // Inferred side
    //=================================================

    pub(super) fn infer(&self, at: &Breadcrumbs, output: &mut PassOutput) -> Rule {
        if self.has_tag(at, &NodeTag::NotInScope) {
            return Ok(error(ErrorLangType::NotInScope));
        }
        match self.node(at)? {
            NodeRef::Expression(expression) => self.infer_expression(at, expression, output),
            NodeRef::TypeReference(_) => self.infer_type_reference(at, output),
            NodeRef::Body(body) => self.infer_body(body, output),
            NodeRef::Statement(statement) => self.infer_statement(at, statement, output),
            NodeRef::Declaration(declaration) => self.infer_declaration(at, declaration, output),
            NodeRef::ImportMapping(_) => match self.analyzed.file_reference(at) {
                Some((path, name)) => Ok(self.lookup_export(path, name)),
                None => self.follow_value_source(at, output),
            },
            NodeRef::FunctionParameter(param) => Ok(self.parameter_type(param, output)),
            NodeRef::Pattern(pattern) => Ok(self.pattern_type(pattern, output)),
            NodeRef::CallParameter(_) => self.follow_value_source(at, output),
            _ => Err(CompileError::Internal(format!("no typing rule for the node at {at}"))),
        }
    }

    fn infer_expression(
        &self,
        at: &Breadcrumbs,
        expression: &ExpressionNode,
        output: &mut PassOutput,
    ) -> Rule {
        match expression {
            ExpressionNode::Identifier { .. } => self.infer_identifier(at, output),
            ExpressionNode::StringLiteral { .. } => {
                Ok(LangType::Value(ValueLangType::Primitive(PrimitiveKind::Text)))
            }
            ExpressionNode::NumberLiteral { .. } => {
                Ok(LangType::Value(ValueLangType::Primitive(PrimitiveKind::Number)))
            }
            ExpressionNode::Group { .. } | ExpressionNode::Block { .. } => {
                self.follow_value_source(at, output)
            }
            ExpressionNode::Function {
                params,
                return_type,
                ..
            } => Ok(self.function_type(at, None, params, return_type.as_ref(), output)),
            ExpressionNode::Branch {
                with_value,
                branches,
                ..
            } => Ok(self.infer_branch(with_value.is_some(), branches, output)),
            ExpressionNode::Loop { .. } => self.infer_loop(at, output),
            ExpressionNode::Cause { signal, .. } => Ok(self.infer_cause(signal, output)),
            ExpressionNode::Return { .. } => Ok(LangType::Value(ValueLangType::NeverContinues)),
            ExpressionNode::Break { .. } => {
                let breaks_loop = self
                    .analyzed
                    .find_tag(at, |tag| match tag {
                        NodeTag::BreaksLoop { .. } => Some(()),
                        _ => None,
                    })
                    .is_some();
                Ok(if breaks_loop {
                    LangType::Value(ValueLangType::NeverContinues)
                } else {
                    error(ErrorLangType::CannotBreakHere)
                })
            }
            ExpressionNode::Call { callee, .. } => Ok(self.infer_call(at, callee, output)),
            ExpressionNode::Member { object, member, .. } => {
                Ok(self.infer_member(object, &member.text, output))
            }
        }
    }

    fn infer_identifier(&self, at: &Breadcrumbs, output: &mut PassOutput) -> Rule {
        if let Some((path, name)) = self.analyzed.file_reference(at) {
            return Ok(action_as_value(self.lookup_export(path, name)));
        }
        let source = self
            .analyzed
            .value_source(at)
            .ok_or_else(|| CompileError::MissingTag {
                breadcrumbs: at.clone(),
                tag: "ValueComesFrom",
            })?;
        let captured = self
            .analyzed
            .find_tag(at, |tag| match tag {
                NodeTag::UsesCapturedValue { .. } => Some(()),
                _ => None,
            })
            .is_some();
        if captured && self.is_mutable_value(source) {
            return Ok(error(ErrorLangType::OuterVariable));
        }
        Ok(action_as_value(self.forward(source, output)))
    }

    fn is_mutable_value(&self, at: &Breadcrumbs) -> bool {
        matches!(
            self.index.get(at),
            Some(NodeRef::Declaration(DeclarationNode::NamedValue {
                is_variable: true,
                ..
            }))
        )
    }

    fn infer_type_reference(&self, at: &Breadcrumbs, output: &mut PassOutput) -> Rule {
        let found = match self.analyzed.file_reference(at) {
            Some((path, name)) => self.lookup_export(path, name),
            None => self.follow_value_source(at, output)?,
        };
        Ok(match found {
            LangType::Value(_) => error(ErrorLangType::NotATypeReference),
            other => other,
        })
    }

    /// A declared constraint read as the type of the values it admits.
    fn constraint_as_value(&self, reference: &TypeReferenceNode, output: &mut PassOutput) -> LangType {
        let at = &reference.info.breadcrumbs;
        match self.get_inferred_type_of(at, output) {
            LangType::Constraint(constraint) => LangType::Value(constraint),
            LangType::Value(_) => error(ErrorLangType::NotATypeReference),
            LangType::Error(err) => error(ErrorLangType::proxy(&err, self.position_of(at))),
            LangType::Pending => LangType::Pending,
        }
    }

    fn parameter_type(&self, param: &FunctionParameterNode, output: &mut PassOutput) -> LangType {
        match &param.type_reference {
            Some(reference) => self.constraint_as_value(reference, output),
            None => LangType::Value(ValueLangType::Anything),
        }
    }

    fn pattern_type(&self, pattern: &PatternNode, output: &mut PassOutput) -> LangType {
        self.constraint_as_value(&pattern.type_reference, output)
    }

    fn infer_body(&self, body: &BodyNode, output: &mut PassOutput) -> Rule {
        let statements: Vec<&StatementNode> = match body {
            BodyNode::Block { statements, .. } => statements.iter().collect(),
            BodyNode::SingleStatement { statement, .. } => vec![statement.as_ref()],
        };
        let mut last = LangType::Value(ValueLangType::Action);
        for statement in statements {
            last = match statement {
                StatementNode::Expression { info, .. } => {
                    let value = self.forward(&info.breadcrumbs, output);
                    if value.is_pending() || value.is_never_continues() {
                        return Ok(value);
                    }
                    value
                }
                _ => LangType::Value(ValueLangType::Action),
            };
        }
        Ok(last)
    }

    fn infer_statement(
        &self,
        at: &Breadcrumbs,
        statement: &StatementNode,
        output: &mut PassOutput,
    ) -> Rule {
        match statement {
            StatementNode::Expression { .. } => self.follow_value_source(at, output),
            StatementNode::Declaration { .. } => Ok(LangType::Value(ValueLangType::Action)),
            StatementNode::Effect { pattern, body, .. } => Ok(self.infer_effect(pattern, body, output)),
            StatementNode::Set { expression, .. } => {
                Ok(self.infer_set(at, &expression.info().breadcrumbs, output))
            }
        }
    }

    fn infer_declaration(
        &self,
        at: &Breadcrumbs,
        declaration: &DeclarationNode,
        output: &mut PassOutput,
    ) -> Rule {
        match declaration {
            DeclarationNode::Import { .. } => Ok(if self.has_tag(at, &NodeTag::BadFileReference) {
                error(ErrorLangType::ImportPathInvalid)
            } else {
                LangType::Value(ValueLangType::Action)
            }),
            DeclarationNode::Function {
                name,
                params,
                return_type,
                ..
            } => Ok(self.function_type(
                at,
                Some(&name.text),
                params,
                return_type.as_ref(),
                output,
            )),
            DeclarationNode::NamedValue { value, .. }
                if at.is_file_declaration()
                    && !matches!(
                        value,
                        ExpressionNode::StringLiteral { .. } | ExpressionNode::NumberLiteral { .. }
                    ) =>
            {
                Ok(error(ErrorLangType::ImplementationTodo {
                    description: "top-level values must be literals".into(),
                }))
            }
            DeclarationNode::NamedValue { .. } => self.follow_value_source(at, output),
            DeclarationNode::ObjectType { name, fields, .. } => {
                Ok(self.canonical_type(at, &name.text, fields, None, output))
            }
            DeclarationNode::SignalType {
                name,
                fields,
                result,
                ..
            } => Ok(self.canonical_type(at, &name.text, fields, Some(result), output)),
            DeclarationNode::OptionType { options, .. } => {
                let mut references = Vec::with_capacity(options.len());
                for option in options {
                    let resolved = self.get_inferred_type_of(&option.info.breadcrumbs, output);
                    if resolved.is_pending() {
                        return Ok(LangType::Pending);
                    }
                    references.push(resolved.to_constraint_reference());
                }
                Ok(LangType::Constraint(ValueLangType::Option(references)))
            }
        }
    }

    fn canonical_type(
        &self,
        at: &Breadcrumbs,
        name: &str,
        fields: &[ObjectFieldNode],
        result: Option<&TypeReferenceNode>,
        output: &mut PassOutput,
    ) -> LangType {
        let mut resolved_fields = Vec::with_capacity(fields.len());
        for field in fields {
            let constraint =
                self.get_inferred_type_of(&field.type_constraint.info.breadcrumbs, output);
            if constraint.is_pending() {
                return LangType::Pending;
            }
            resolved_fields.push(ObjectField {
                name: field.name.text.clone(),
                constraint: constraint.to_constraint_reference(),
            });
        }
        let id = self.canonical_id(at, name);
        let canonical = match result {
            Some(result) => {
                let result = self.get_inferred_type_of(&result.info.breadcrumbs, output);
                if result.is_pending() {
                    return LangType::Pending;
                }
                CanonicalLangType::Signal {
                    id,
                    name: name.to_string(),
                    fields: resolved_fields,
                    result: Box::new(result.to_constraint_reference()),
                }
            }
            None => CanonicalLangType::Object {
                id,
                name: name.to_string(),
                fields: resolved_fields,
            },
        };
        output.canonical.push(canonical.clone());
        LangType::Constraint(ValueLangType::Instance(canonical))
    }

    fn function_type(
        &self,
        at: &Breadcrumbs,
        name: Option<&str>,
        params: &[FunctionParameterNode],
        return_type: Option<&TypeReferenceNode>,
        output: &mut PassOutput,
    ) -> LangType {
        let mut lang_params = Vec::with_capacity(params.len());
        for param in params {
            let constraint = match &param.type_reference {
                Some(reference) => self.get_inferred_type_of(&reference.info.breadcrumbs, output),
                None => LangType::Constraint(ValueLangType::Anything),
            };
            if constraint.is_pending() {
                return LangType::Pending;
            }
            lang_params.push(LangParameter {
                name: param.name.text.clone(),
                constraint: constraint.to_constraint_reference(),
            });
        }

        let return_constraint = match return_type {
            Some(reference) => self
                .get_inferred_type_of(&reference.info.breadcrumbs, output)
                .to_constraint_reference(),
            None => self.inferred_return_constraint(at, output),
        };
        if matches!(return_constraint, ConstraintReference::Pending) {
            return LangType::Pending;
        }

        LangType::Value(ValueLangType::Function {
            name: name.map(str::to_string),
            return_constraint: Box::new(return_constraint),
            params: lang_params,
        })
    }

    /// Union of everything an unannotated function can hand back.
    fn inferred_return_constraint(
        &self,
        at: &Breadcrumbs,
        output: &mut PassOutput,
    ) -> ConstraintReference {
        let returns = self.analyzed.filter_tags(at, |tag| match tag {
            NodeTag::FunctionCanReturnTypeOf { returns } => Some(returns),
            _ => None,
        });
        let returns_action = self
            .analyzed
            .find_tag(at, |tag| match tag {
                NodeTag::FunctionCanReturnAction { .. } => Some(()),
                _ => None,
            })
            .is_some();

        let mut members: Vec<ValueLangType> = Vec::new();
        for returned in returns {
            let value = match value_view(self.get_resolved_type_of(returned, output)) {
                LangType::Pending => return ConstraintReference::Pending,
                LangType::Error(err) => {
                    return ConstraintReference::Error(ErrorLangType::proxy(
                        &err,
                        self.position_of(returned),
                    ));
                }
                LangType::Constraint(constraint) => {
                    return ConstraintReference::Error(ErrorLangType::ConstraintUsedAsValue {
                        constraint: Box::new(constraint),
                    });
                }
                LangType::Value(value) => value,
            };
            if value != ValueLangType::NeverContinues && !members.contains(&value) {
                members.push(value);
            }
        }
        if returns_action && !members.contains(&ValueLangType::Action) {
            members.push(ValueLangType::Action);
        }

        match members.len() {
            0 => ConstraintReference::Resolved(ValueLangType::NeverContinues),
            1 => ConstraintReference::Resolved(members.remove(0)),
            _ => ConstraintReference::Resolved(ValueLangType::Option(
                members.into_iter().map(ConstraintReference::Resolved).collect(),
            )),
        }
    }

    fn infer_call(&self, at: &Breadcrumbs, callee: &ExpressionNode, output: &mut PassOutput) -> LangType {
        let callee_at = &callee.info().breadcrumbs;
        let args = self.analyzed.call_parameters(at);
        match self.get_resolved_type_of(callee_at, output) {
            LangType::Pending => LangType::Pending,
            LangType::Error(err) => error(ErrorLangType::proxy(&err, self.position_of(callee_at))),
            LangType::Value(ValueLangType::Function {
                return_constraint,
                params,
                ..
            }) => {
                let names: Vec<&str> = params.iter().map(|param| param.name.as_str()).collect();
                if let Some(arity_error) = check_arity(&names, args.len()) {
                    return error(arity_error);
                }
                for (_, arg) in &args {
                    if self.get_inferred_type_of(arg, output).is_pending() {
                        return LangType::Pending;
                    }
                }
                match return_constraint.as_value_type() {
                    LangType::Error(err) => {
                        error(ErrorLangType::proxy(&err, self.position_of(callee_at)))
                    }
                    other => other,
                }
            }
            LangType::Constraint(ValueLangType::Instance(canonical)) => {
                let names: Vec<&str> = canonical
                    .fields()
                    .iter()
                    .map(|field| field.name.as_str())
                    .collect();
                if let Some(arity_error) = check_arity(&names, args.len()) {
                    return error(arity_error);
                }
                for (_, arg) in &args {
                    match self.get_inferred_type_of(arg, output) {
                        LangType::Pending => return LangType::Pending,
                        LangType::Error(err) => {
                            return error(ErrorLangType::proxy(&err, self.position_of(arg)));
                        }
                        _ => {}
                    }
                }
                LangType::Value(ValueLangType::Instance(canonical))
            }
            _ => error(ErrorLangType::NotCallable),
        }
    }

    fn infer_cause(&self, signal: &ExpressionNode, output: &mut PassOutput) -> LangType {
        let signal_at = &signal.info().breadcrumbs;
        let canonical = match self.get_resolved_type_of(signal_at, output) {
            LangType::Pending => return LangType::Pending,
            LangType::Error(err) => {
                return error(ErrorLangType::proxy(&err, self.position_of(signal_at)));
            }
            LangType::Value(ValueLangType::Instance(canonical)) => canonical,
            LangType::Constraint(ValueLangType::Instance(canonical)) if canonical.is_unique() => {
                canonical
            }
            _ => return error(ErrorLangType::NotCausable),
        };
        match canonical.signal_result().map(ConstraintReference::as_value_type) {
            Some(LangType::Error(err)) => {
                error(ErrorLangType::proxy(&err, self.position_of(signal_at)))
            }
            Some(result) => result,
            None => error(ErrorLangType::NotCausable),
        }
    }

    fn infer_branch(
        &self,
        has_value: bool,
        branches: &[BranchOptionNode],
        output: &mut PassOutput,
    ) -> LangType {
        if branches.is_empty() {
            return LangType::Value(ValueLangType::Action);
        }
        if !has_value
            && branches
                .iter()
                .any(|option| matches!(option, BranchOptionNode::Is { .. }))
        {
            return error(ErrorLangType::ImplementationTodo {
                description: "is-branches need a value to match against".into(),
            });
        }
        let else_count = branches
            .iter()
            .filter(|option| matches!(option, BranchOptionNode::Else { .. }))
            .count();
        if else_count > 1 {
            return error(ErrorLangType::TooManyElseBranches);
        }
        if else_count == 0 {
            return error(ErrorLangType::MissingElseBranch);
        }

        let mut arms: Vec<IncompatibleType> = Vec::new();
        for option in branches {
            let body_at = &option.body().info().breadcrumbs;
            match value_view(self.get_resolved_type_of(body_at, output)) {
                LangType::Pending => return LangType::Pending,
                LangType::Error(_) => continue,
                arm if arm.is_never_continues() => continue,
                arm => arms.push(IncompatibleType {
                    value_type: arm,
                    position: self.position_of(body_at),
                }),
            }
        }
        let Some(first) = arms.first() else {
            return LangType::Value(ValueLangType::NeverContinues);
        };
        if arms.iter().all(|arm| arm.value_type == first.value_type) {
            first.value_type.clone()
        } else {
            error(ErrorLangType::IncompatibleTypes { types: arms })
        }
    }

    fn infer_loop(&self, at: &Breadcrumbs, output: &mut PassOutput) -> Rule {
        let breakers = self.analyzed.filter_tags(at, |tag| match tag {
            NodeTag::LoopBreaksAt { breaker } => Some(breaker),
            _ => None,
        });
        let mut members: Vec<ValueLangType> = Vec::new();
        for breaker in breakers {
            let broken_with = match self.node(breaker)? {
                NodeRef::Expression(ExpressionNode::Break {
                    with_value: Some(value),
                    ..
                }) => value_view(self.get_resolved_type_of(&value.info().breadcrumbs, output)),
                _ => LangType::Value(ValueLangType::Action),
            };
            match broken_with {
                LangType::Pending => return Ok(LangType::Pending),
                LangType::Value(value)
                    if value != ValueLangType::NeverContinues && !members.contains(&value) =>
                {
                    members.push(value);
                }
                _ => {}
            }
        }
        Ok(match members.len() {
            0 => LangType::Value(ValueLangType::NeverContinues),
            1 => LangType::Value(members.remove(0)),
            _ => LangType::Value(ValueLangType::Option(
                members.into_iter().map(ConstraintReference::Resolved).collect(),
            )),
        })
    }

    fn infer_member(&self, object: &ExpressionNode, name: &str, output: &mut PassOutput) -> LangType {
        let object_at = &object.info().breadcrumbs;
        match self.get_resolved_type_of(object_at, output) {
            LangType::Pending => LangType::Pending,
            LangType::Error(err) => error(ErrorLangType::proxy(&err, self.position_of(object_at))),
            LangType::Value(ValueLangType::Instance(canonical)) => {
                match canonical.field_index(name) {
                    Some(index) => canonical.fields()[index].constraint.as_value_type(),
                    None => error(ErrorLangType::DoesNotHaveMember {
                        name: name.to_string(),
                    }),
                }
            }
            LangType::Constraint(_) => error(ErrorLangType::ImplementationTodo {
                description: "members of type references".into(),
            }),
            LangType::Value(_) => error(ErrorLangType::DoesNotHaveAnyMembers),
        }
    }

    fn infer_effect(&self, pattern: &PatternNode, body: &BodyNode, output: &mut PassOutput) -> LangType {
        let pattern_at = &pattern.type_reference.info.breadcrumbs;
        let result = match self.get_inferred_type_of(pattern_at, output) {
            LangType::Pending => return LangType::Pending,
            LangType::Error(err) => {
                return error(ErrorLangType::proxy(&err, self.position_of(pattern_at)));
            }
            LangType::Constraint(ValueLangType::AnySignal) => {
                ConstraintReference::Resolved(ValueLangType::Anything)
            }
            LangType::Constraint(ValueLangType::Instance(canonical)) if canonical.is_signal() => {
                canonical
                    .signal_result()
                    .cloned()
                    .unwrap_or(ConstraintReference::Resolved(ValueLangType::Anything))
            }
            other => {
                return error(ErrorLangType::MismatchedType {
                    expected: Box::new(ValueLangType::AnySignal),
                    actual: Box::new(other),
                });
            }
        };
        let result = match result {
            ConstraintReference::Pending => return LangType::Pending,
            ConstraintReference::Error(err) => {
                return error(ErrorLangType::proxy(&err, self.position_of(pattern_at)));
            }
            ConstraintReference::Resolved(result) => result,
        };

        let body_at = &body.info().breadcrumbs;
        match self.get_resolved_type_of(body_at, output) {
            LangType::Pending => LangType::Pending,
            LangType::Error(err) => error(ErrorLangType::proxy(&err, self.position_of(body_at))),
            handled if handled.is_assignable_to(&result) => LangType::Value(ValueLangType::Action),
            handled => error(ErrorLangType::MismatchedType {
                expected: Box::new(result),
                actual: Box::new(handled),
            }),
        }
    }

    fn infer_set(&self, at: &Breadcrumbs, value_at: &Breadcrumbs, output: &mut PassOutput) -> LangType {
        if let Some(kind) = self.analyzed.find_tag(at, |tag| match tag {
            NodeTag::BadVariableWrite { kind } => Some(*kind),
            _ => None,
        }) {
            return error(match kind {
                BadWriteKind::NotVariable => ErrorLangType::NotVariable,
                BadWriteKind::OuterVariable => ErrorLangType::OuterVariable,
            });
        }
        let Some(variable) = self.analyzed.find_tag(at, |tag| match tag {
            NodeTag::SetsVariable { variable } => Some(variable),
            _ => None,
        }) else {
            return error(ErrorLangType::NotInScope);
        };

        let variable_type = self.get_resolved_type_of(variable, output);
        let value_type = self.get_resolved_type_of(value_at, output);
        match (variable_type, value_type) {
            (LangType::Pending, _) | (_, LangType::Pending) => LangType::Pending,
            (LangType::Error(err), _) => error(ErrorLangType::proxy(&err, self.position_of(variable))),
            (_, LangType::Error(err)) => error(ErrorLangType::proxy(&err, self.position_of(value_at))),
            (LangType::Value(variable_type), value) => {
                if value.is_assignable_to(&variable_type) {
                    LangType::Value(ValueLangType::Action)
                } else {
                    error(ErrorLangType::MismatchedType {
                        expected: Box::new(variable_type),
                        actual: Box::new(value),
                    })
                }
            }
            (LangType::Constraint(_), _) => error(ErrorLangType::NotVariable),
        }
    }

    //=================================================
    // Expected side
    //=================================================

    pub(super) fn expect(&self, at: &Breadcrumbs, output: &mut PassOutput) -> Rule {
        if let Some(annotation) = self.analyzed.find_tag(at, |tag| match tag {
            NodeTag::TypeAnnotated { annotation } => Some(annotation),
            _ => None,
        }) {
            return Ok(match self.get_inferred_type_of(annotation, output) {
                LangType::Pending => LangType::Pending,
                LangType::Constraint(constraint) => LangType::Constraint(constraint),
                LangType::Value(_) => error(ErrorLangType::NotATypeReference),
                LangType::Error(err) => {
                    error(ErrorLangType::proxy(&err, self.position_of(annotation)))
                }
            });
        }

        if let Some((call, index)) = self.analyzed.find_tag(at, |tag| match tag {
            NodeTag::ParameterForCall { call, index } => Some((call, *index)),
            _ => None,
        }) {
            let callee = self
                .analyzed
                .find_tag(call, |tag| match tag {
                    NodeTag::Calls { callee } => Some(callee),
                    _ => None,
                })
                .ok_or_else(|| CompileError::MissingTag {
                    breadcrumbs: call.clone(),
                    tag: "Calls",
                })?;
            let constraint = match self.get_resolved_type_of(callee, output) {
                LangType::Pending => return Ok(LangType::Pending),
                LangType::Value(ValueLangType::Function { params, .. }) => {
                    params.get(index).map(|param| param.constraint.clone())
                }
                LangType::Constraint(ValueLangType::Instance(canonical)) => canonical
                    .fields()
                    .get(index)
                    .map(|field| field.constraint.clone()),
                _ => None,
            };
            return Ok(match constraint {
                Some(ConstraintReference::Pending) => LangType::Pending,
                Some(ConstraintReference::Resolved(constraint)) => LangType::Constraint(constraint),
                Some(ConstraintReference::Error(_)) | None => {
                    LangType::Constraint(ValueLangType::Anything)
                }
            });
        }

        Err(CompileError::Internal(format!(
            "expected type requested for {at} without an annotation or call"
        )))
    }
}

/// Compare a declared parameter list against the number of arguments given.
fn check_arity(names: &[&str], given: usize) -> Option<ErrorLangType> {
    if given > names.len() {
        Some(ErrorLangType::ExcessParameter {
            expected: names.len(),
        })
    } else if given < names.len() {
        Some(ErrorLangType::MissingParameters {
            names: names[given..].iter().map(|name| name.to_string()).collect(),
        })
    } else {
        None
    }
}
