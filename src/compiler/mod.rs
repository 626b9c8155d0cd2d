//=====================================================
// File: compiler/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Bytecode compiler for CauseLang
// Objective: Lower an analyzed and resolved file into procedures and exports;
//            statically detected errors compile to BadValues or raised
//            TypeErrors instead of failing the build
//=====================================================

mod procedure;

use procedure::{CompilerScope, MutableProcedure, ScopeKind, find_value_reference};

use crate::analyzer::{AnalyzedNode, NodeTag};
use crate::ast::{
    BodyNode, BranchOptionNode, Breadcrumbs, CallParameterNode, DeclarationNode, ExpressionNode,
    FileNode, FunctionParameterNode, IdentifierNode, NodeInfo, PatternNode, StatementNode,
    TypeReferenceNode,
};
use crate::bytecode::{
    CompiledConstant, CompiledExport, CompiledFile, Instruction, Procedure, ProcedureIdentity,
    SourceMapPhase,
};
use crate::errors::CompileError;
use crate::resolver::ResolvedFile;
use crate::stdlib_registry::BUILTIN_PATH;
use crate::types::{ErrorLangType, LangType, ValueLangType};
use std::collections::BTreeMap;
use tracing::debug;

/// Compile one file. User errors never fail compilation; only disagreements
/// between the analyzer, resolver, and compiler do.
pub fn compile(
    file: &FileNode,
    analyzed: &AnalyzedNode,
    resolved: &ResolvedFile,
) -> Result<CompiledFile, CompileError> {
    let mut compiler = Compiler {
        path: &resolved.path,
        analyzed,
        resolved,
        builders: Vec::new(),
        procedures: Vec::new(),
        scopes: Vec::new(),
    };

    let mut exports = BTreeMap::new();
    for declaration in &file.declarations {
        if let Some((name, export)) = compiler.compile_top_level(declaration)? {
            exports.insert(name, export);
        }
    }

    let compiled = CompiledFile {
        path: resolved.path.clone(),
        types: resolved.canonical_types.clone(),
        procedures: compiler.procedures,
        exports,
    };
    debug!(
        path = %compiled.path,
        procedures = compiled.procedures.len(),
        exports = compiled.exports.len(),
        "compiled file"
    );
    Ok(compiled)
}

/// Errors after which there is no sensible call to make.
fn prevents_dispatch(error: &ErrorLangType) -> bool {
    matches!(
        error,
        ErrorLangType::NotCallable
            | ErrorLangType::MissingParameters { .. }
            | ErrorLangType::ExcessParameter { .. }
    )
}

struct Compiler<'a> {
    path: &'a str,
    analyzed: &'a AnalyzedNode,
    resolved: &'a ResolvedFile,
    builders: Vec<MutableProcedure>,
    procedures: Vec<Procedure>,
    scopes: Vec<CompilerScope>,
}

impl<'a> Compiler<'a> {
    //=================================================
    // Emission helpers
    //=================================================

    fn builder(&mut self) -> Result<&mut MutableProcedure, CompileError> {
        self.builders
            .last_mut()
            .ok_or_else(|| CompileError::Internal("no procedure is being compiled".into()))
    }

    fn emit(
        &mut self,
        instruction: Instruction,
        info: &NodeInfo,
        phase: SourceMapPhase,
    ) -> Result<(), CompileError> {
        self.builder()?.write(instruction, info, phase);
        Ok(())
    }

    fn emit_jump(&mut self, instruction: Instruction, info: &NodeInfo) -> Result<usize, CompileError> {
        let builder = self.builder()?;
        let index = builder.next_index();
        builder.write(instruction, info, SourceMapPhase::Plumbing);
        Ok(index)
    }

    fn patch_jump(&mut self, index: usize) -> Result<(), CompileError> {
        let builder = self.builder()?;
        let target = builder.next_index();
        builder.patch_jump(index, target)
    }

    fn constant(&mut self, constant: CompiledConstant) -> Result<usize, CompileError> {
        Ok(self.builder()?.add_constant(constant))
    }

    fn depth(&mut self) -> Result<usize, CompileError> {
        Ok(self.builder()?.stack_depth)
    }

    fn set_depth(&mut self, depth: usize) -> Result<(), CompileError> {
        self.builder()?.stack_depth = depth;
        Ok(())
    }

    fn begin_scope(&mut self, owner: &Breadcrumbs, kind: ScopeKind) {
        self.scopes.push(CompilerScope::new(owner, kind));
    }

    fn end_scope(&mut self, owner: &Breadcrumbs) -> Result<CompilerScope, CompileError> {
        match self.scopes.pop() {
            Some(scope) if scope.owner == *owner => Ok(scope),
            Some(scope) => Err(CompileError::Internal(format!(
                "closing scope {owner} but {} is innermost",
                scope.owner
            ))),
            None => Err(CompileError::Internal(format!("no open scope for {owner}"))),
        }
    }

    fn current_scope(&mut self) -> Result<&mut CompilerScope, CompileError> {
        self.scopes
            .last_mut()
            .ok_or_else(|| CompileError::Internal("no open scope".into()))
    }

    /// The value on top of the stack becomes the slot for `declaration`.
    fn add_to_scope(&mut self, declaration: &Breadcrumbs) -> Result<(), CompileError> {
        let index = self.depth()?.checked_sub(1).ok_or_else(|| {
            CompileError::Internal(format!("nothing on the stack to bind to {declaration}"))
        })?;
        let scope = self.current_scope()?;
        if scope
            .named_value_indices
            .insert(declaration.clone(), index)
            .is_some()
        {
            return Err(CompileError::DuplicateScopeEntry {
                name: declaration.to_string(),
            });
        }
        Ok(())
    }

    fn runtime_error(&self, at: &Breadcrumbs) -> Option<ErrorLangType> {
        self.resolved.check_for_runtime_errors(at)
    }

    /// What other nodes see this node as: its expected type if it has one.
    fn resolved_type(&self, at: &Breadcrumbs) -> Option<LangType> {
        match self.resolved.get_expected_type(at) {
            Some(LangType::Constraint(constraint)) => Some(LangType::Value(constraint.clone())),
            _ => self.resolved.get_inferred_type(at).cloned(),
        }
    }

    fn never_continues(&self, at: &Breadcrumbs) -> bool {
        self.resolved
            .get_inferred_type(at)
            .is_some_and(LangType::is_never_continues)
    }

    fn function_type_of(&self, at: &Breadcrumbs) -> ValueLangType {
        match self.resolved.get_inferred_type(at) {
            Some(LangType::Value(function_type)) => function_type.clone(),
            _ => ValueLangType::Anything,
        }
    }

    fn error_literal(&mut self, info: &NodeInfo, error: ErrorLangType) -> Result<(), CompileError> {
        let constant = self.constant(CompiledConstant::Error {
            position: info.source_position(self.path),
            error,
        })?;
        self.emit(Instruction::Literal { constant }, info, SourceMapPhase::Execute)
    }

    fn replace_with_bad_value(
        &mut self,
        info: &NodeInfo,
        error: ErrorLangType,
    ) -> Result<(), CompileError> {
        self.emit(Instruction::Pop { number: 1 }, info, SourceMapPhase::Cleanup)?;
        self.error_literal(info, error)
    }

    /// Cause `TypeError(bad_value)` for an error that leaves nothing to continue with.
    fn raise_type_error(&mut self, info: &NodeInfo, error: ErrorLangType) -> Result<(), CompileError> {
        self.emit_import(info, BUILTIN_PATH, "TypeError")?;
        self.error_literal(info, error)?;
        self.emit(Instruction::Construct { arity: 1 }, info, SourceMapPhase::Plumbing)?;
        self.emit(Instruction::Cause, info, SourceMapPhase::Plumbing)
    }

    fn emit_import(&mut self, info: &NodeInfo, path: &str, name: &str) -> Result<(), CompileError> {
        let file_path_constant = self.constant(CompiledConstant::Text(path.to_string()))?;
        let export_name_constant = self.constant(CompiledConstant::Text(name.to_string()))?;
        self.emit(
            Instruction::Import {
                file_path_constant,
                export_name_constant,
            },
            info,
            SourceMapPhase::Execute,
        )
    }

    //=================================================
    // File level
    //=================================================

    fn compile_top_level(
        &mut self,
        declaration: &DeclarationNode,
    ) -> Result<Option<(String, CompiledExport)>, CompileError> {
        let info = declaration.info();
        let at = &info.breadcrumbs;
        let position = info.source_position(self.path);
        let export = match declaration {
            DeclarationNode::Import { .. } => return Ok(None),
            DeclarationNode::Function {
                name, params, body, ..
            } => {
                let procedure_index = self.compile_function(info, Some(&name.text), params, body)?;
                CompiledExport::Function {
                    procedure_index,
                    function_type: self.function_type_of(at),
                }
            }
            DeclarationNode::NamedValue { value, .. } => match self.runtime_error(at) {
                Some(error) => CompiledExport::Error { position, error },
                None => match (value, self.resolved_type(at)) {
                    (ExpressionNode::StringLiteral { text, .. }, Some(LangType::Value(value_type))) => {
                        CompiledExport::Value {
                            value: CompiledConstant::Text(text.clone()),
                            value_type,
                        }
                    }
                    (ExpressionNode::NumberLiteral { value, .. }, Some(LangType::Value(value_type))) => {
                        CompiledExport::Value {
                            value: CompiledConstant::Number(*value),
                            value_type,
                        }
                    }
                    _ => CompiledExport::Error {
                        position,
                        error: ErrorLangType::ImplementationTodo {
                            description: "top-level values must be literals".into(),
                        },
                    },
                },
            },
            DeclarationNode::ObjectType { .. }
            | DeclarationNode::SignalType { .. }
            | DeclarationNode::OptionType { .. } => match self.resolved.get_inferred_type(at) {
                Some(LangType::Constraint(constraint)) => CompiledExport::Constraint {
                    constraint: constraint.clone(),
                },
                Some(LangType::Error(error)) => CompiledExport::Error {
                    position,
                    error: error.clone(),
                },
                _ => CompiledExport::Error {
                    position,
                    error: ErrorLangType::NeverResolved,
                },
            },
        };
        Ok(declaration.name().map(|name| (name.to_string(), export)))
    }

    /// Compile a function body into its own procedure. The frame holds the
    /// function itself in slot 0, then parameters, then captured values.
    fn compile_function(
        &mut self,
        info: &NodeInfo,
        name: Option<&str>,
        params: &[FunctionParameterNode],
        body: &BodyNode,
    ) -> Result<usize, CompileError> {
        let at = &info.breadcrumbs;
        let analyzed = self.analyzed;
        let captures = analyzed.captured_values(at);

        let mut scope = CompilerScope::new(at, ScopeKind::Function);
        scope.named_value_indices.insert(at.clone(), 0);
        for (index, param) in params.iter().enumerate() {
            scope
                .named_value_indices
                .insert(param.info.breadcrumbs.clone(), index + 1);
        }
        for (index, captured) in captures.iter().enumerate() {
            scope
                .named_value_indices
                .insert((*captured).clone(), params.len() + 1 + index);
        }

        let outer_scopes = std::mem::take(&mut self.scopes);
        self.scopes.push(scope);
        self.builders.push(MutableProcedure::new(
            ProcedureIdentity::Function {
                name: name.map(str::to_string),
                declaration: info.source_position(self.path),
            },
            1 + params.len() + captures.len(),
        ));

        self.compile_body(body)?;
        if let Some(error) = self.runtime_error(&body.info().breadcrumbs) {
            self.replace_with_bad_value(body.info(), error)?;
        }
        self.emit(Instruction::Return, body.info(), SourceMapPhase::Cleanup)?;

        self.end_scope(at)?;
        self.scopes = outer_scopes;
        let builder = self
            .builders
            .pop()
            .ok_or_else(|| CompileError::Internal(format!("lost procedure for {at}")))?;
        self.procedures.push(builder.finish());
        Ok(self.procedures.len() - 1)
    }

    /// Compile a function and push a closure over its captured values.
    fn define_function(
        &mut self,
        info: &NodeInfo,
        name: Option<&str>,
        params: &[FunctionParameterNode],
        body: &BodyNode,
    ) -> Result<(), CompileError> {
        let at = &info.breadcrumbs;
        let procedure_index = self.compile_function(info, name, params, body)?;
        let analyzed = self.analyzed;
        let captures = analyzed.captured_values(at);
        for captured in &captures {
            let reference = find_value_reference(&self.scopes, captured)?;
            self.emit(reference.read(), info, SourceMapPhase::Setup)?;
        }
        let type_constant = self.constant(CompiledConstant::Type(self.function_type_of(at)))?;
        self.emit(
            Instruction::DefineFunction {
                procedure_index,
                type_constant,
                captured_values: captures.len(),
            },
            info,
            SourceMapPhase::Execute,
        )
    }

    //=================================================
    // Bodies and statements
    //=================================================

    /// Leaves exactly one value, the body's result, above the entry height.
    fn compile_body(&mut self, body: &BodyNode) -> Result<(), CompileError> {
        let info = body.info();
        let at = &info.breadcrumbs;
        let statements: Vec<&StatementNode> = match body {
            BodyNode::Block { statements, .. } => statements.iter().collect(),
            BodyNode::SingleStatement { statement, .. } => vec![statement.as_ref()],
        };

        self.begin_scope(at, ScopeKind::Body);
        let base = self.depth()?;
        if statements.is_empty() {
            self.emit(Instruction::PushAction, info, SourceMapPhase::Execute)?;
        }
        for (index, statement) in statements.iter().enumerate() {
            let is_last = index + 1 == statements.len();
            self.compile_statement(statement)?;
            match statement {
                StatementNode::Expression { info: statement_info, expression } => {
                    if self.never_continues(&expression.info().breadcrumbs) {
                        // Nothing after this runs; account for it as the result.
                        let size = self.current_scope()?.size();
                        self.set_depth(base + size + 1)?;
                        break;
                    }
                    if !is_last {
                        self.emit(
                            Instruction::Pop { number: 1 },
                            statement_info,
                            SourceMapPhase::Cleanup,
                        )?;
                    }
                }
                other if is_last => {
                    self.emit(Instruction::PushAction, other.info(), SourceMapPhase::Plumbing)?;
                }
                _ => {}
            }
        }

        let scope = self.end_scope(at)?;
        if scope.effect_count > 0 {
            self.emit(
                Instruction::PopEffects {
                    number: scope.effect_count,
                },
                info,
                SourceMapPhase::Cleanup,
            )?;
        }
        self.emit(
            Instruction::PopScope {
                values: scope.size(),
            },
            info,
            SourceMapPhase::Cleanup,
        )
    }

    fn compile_statement(&mut self, statement: &StatementNode) -> Result<(), CompileError> {
        match statement {
            StatementNode::Expression { expression, .. } => self.compile_expression(expression),
            StatementNode::Declaration { declaration, .. } => {
                self.compile_local_declaration(declaration)
            }
            StatementNode::Effect {
                info,
                pattern,
                body,
            } => {
                let procedure_index = self.compile_effect(info, pattern, body)?;
                self.emit(
                    Instruction::RegisterEffect { procedure_index },
                    info,
                    SourceMapPhase::Setup,
                )?;
                self.current_scope()?.effect_count += 1;
                Ok(())
            }
            StatementNode::Set {
                info, expression, ..
            } => self.compile_set(info, expression),
        }
    }

    fn compile_set(&mut self, info: &NodeInfo, expression: &ExpressionNode) -> Result<(), CompileError> {
        let at = &info.breadcrumbs;
        self.compile_expression(expression)?;
        if let Some(error) = self.runtime_error(at) {
            self.emit(Instruction::Pop { number: 1 }, info, SourceMapPhase::Cleanup)?;
            self.raise_type_error(info, error)?;
            return self.emit(Instruction::Pop { number: 1 }, info, SourceMapPhase::Cleanup);
        }
        let analyzed = self.analyzed;
        let variable = analyzed
            .find_tag(at, |tag| match tag {
                NodeTag::SetsVariable { variable } => Some(variable),
                _ => None,
            })
            .ok_or_else(|| CompileError::MissingTag {
                breadcrumbs: at.clone(),
                tag: "SetsVariable",
            })?;
        let reference = find_value_reference(&self.scopes, variable)?;
        self.emit(reference.write(), info, SourceMapPhase::Execute)
    }

    fn compile_local_declaration(&mut self, declaration: &DeclarationNode) -> Result<(), CompileError> {
        let info = declaration.info();
        let at = &info.breadcrumbs;
        match declaration {
            DeclarationNode::Import { .. } => return Ok(()),
            DeclarationNode::Function {
                name, params, body, ..
            } => self.define_function(info, Some(&name.text), params, body)?,
            DeclarationNode::NamedValue { value, .. } => {
                self.compile_expression(value)?;
                if let Some(error) = self.runtime_error(at) {
                    self.replace_with_bad_value(info, error)?;
                }
            }
            DeclarationNode::ObjectType { .. }
            | DeclarationNode::SignalType { .. }
            | DeclarationNode::OptionType { .. } => match self.resolved.get_inferred_type(at) {
                Some(LangType::Constraint(constraint)) => {
                    let constant = self.constant(CompiledConstant::Type(constraint.clone()))?;
                    self.emit(Instruction::Literal { constant }, info, SourceMapPhase::Execute)?;
                }
                Some(LangType::Error(error)) => self.error_literal(info, error.clone())?,
                _ => self.error_literal(info, ErrorLangType::NeverResolved)?,
            },
        }
        self.add_to_scope(at)
    }

    /// Handlers run in their own frame with the signal in slot 0.
    fn compile_effect(
        &mut self,
        info: &NodeInfo,
        pattern: &PatternNode,
        body: &BodyNode,
    ) -> Result<usize, CompileError> {
        let at = &info.breadcrumbs;
        let type_at = &pattern.type_reference.info.breadcrumbs;
        let matches_type = match self.resolved.get_inferred_type(type_at) {
            Some(LangType::Constraint(constraint)) => Some(constraint.clone()),
            _ => None,
        };
        self.builders.push(MutableProcedure::new(
            ProcedureIdentity::Effect {
                matches_type,
                declaration: info.source_position(self.path),
            },
            1,
        ));
        let mut scope = CompilerScope::new(at, ScopeKind::Effect);
        if pattern.name.is_some() {
            scope
                .named_value_indices
                .insert(pattern.info.breadcrumbs.clone(), 0);
        }
        self.scopes.push(scope);

        if self.runtime_error(type_at).is_some() {
            self.emit(Instruction::RejectSignal, &pattern.info, SourceMapPhase::Plumbing)?;
        } else {
            self.emit(Instruction::ReadLocal { index: 0 }, &pattern.info, SourceMapPhase::Setup)?;
            self.compile_type_reference(&pattern.type_reference)?;
            self.emit(Instruction::IsAssignableTo, &pattern.info, SourceMapPhase::Setup)?;
            let reject = self.emit_jump(Instruction::JumpIfFalse { instruction: 0 }, &pattern.info)?;
            self.compile_body(body)?;
            if let Some(error) = self.runtime_error(at) {
                self.emit(Instruction::Pop { number: 1 }, info, SourceMapPhase::Cleanup)?;
                self.raise_type_error(info, error)?;
            }
            self.emit(Instruction::FinishEffect, info, SourceMapPhase::Cleanup)?;
            self.patch_jump(reject)?;
            self.emit(Instruction::RejectSignal, info, SourceMapPhase::Plumbing)?;
        }

        self.end_scope(at)?;
        let builder = self
            .builders
            .pop()
            .ok_or_else(|| CompileError::Internal(format!("lost effect procedure for {at}")))?;
        self.procedures.push(builder.finish());
        Ok(self.procedures.len() - 1)
    }

    //=================================================
    // Expressions
    //=================================================

    /// Leaves exactly one value on the stack.
    fn compile_expression(&mut self, expression: &ExpressionNode) -> Result<(), CompileError> {
        let info = expression.info();
        match expression {
            ExpressionNode::Identifier { .. } => return self.compile_name_use(info),
            ExpressionNode::Group { expression, .. } => self.compile_expression(expression)?,
            ExpressionNode::Block { block, .. } => self.compile_body(block)?,
            ExpressionNode::StringLiteral { text, .. } => {
                let constant = self.constant(CompiledConstant::Text(text.clone()))?;
                self.emit(Instruction::Literal { constant }, info, SourceMapPhase::Execute)?;
            }
            ExpressionNode::NumberLiteral { value, .. } => {
                let constant = self.constant(CompiledConstant::Number(*value))?;
                self.emit(Instruction::Literal { constant }, info, SourceMapPhase::Execute)?;
            }
            ExpressionNode::Function { params, body, .. } => {
                self.define_function(info, None, params, body)?;
            }
            ExpressionNode::Branch {
                with_value,
                branches,
                ..
            } => self.compile_branch(info, with_value.as_deref(), branches)?,
            ExpressionNode::Loop { body, .. } => {
                let start = self.emit_jump(Instruction::StartLoop { end_instruction: 0 }, info)?;
                self.compile_body(body)?;
                self.emit(Instruction::ContinueLoop, info, SourceMapPhase::Plumbing)?;
                self.patch_jump(start)?;
            }
            ExpressionNode::Cause { signal, .. } => self.compile_cause(info, signal)?,
            ExpressionNode::Return { value, .. } => {
                match value {
                    Some(value) => self.compile_expression(value)?,
                    None => self.emit(Instruction::PushAction, info, SourceMapPhase::Setup)?,
                }
                self.emit(Instruction::Return, info, SourceMapPhase::Execute)?;
            }
            ExpressionNode::Break { with_value, .. } => {
                match with_value {
                    Some(value) => self.compile_expression(value)?,
                    None => self.emit(Instruction::PushAction, info, SourceMapPhase::Setup)?,
                }
                match self.runtime_error(&info.breadcrumbs) {
                    Some(error) => {
                        self.emit(Instruction::Pop { number: 1 }, info, SourceMapPhase::Cleanup)?;
                        self.raise_type_error(info, error)?;
                    }
                    None => {
                        self.emit(Instruction::BreakLoop { levels: 1 }, info, SourceMapPhase::Execute)?
                    }
                }
            }
            ExpressionNode::Call {
                callee, parameters, ..
            } => self.compile_call(info, callee, parameters)?,
            ExpressionNode::Member { object, member, .. } => {
                self.compile_member(info, object, member)?
            }
        }

        if let Some(error) = self.runtime_error(&info.breadcrumbs) {
            self.replace_with_bad_value(info, error)?;
        }
        Ok(())
    }

    fn compile_type_reference(&mut self, reference: &TypeReferenceNode) -> Result<(), CompileError> {
        self.compile_name_use(&reference.info)
    }

    /// Push whatever a name refers to: an import, a same-file export, or a slot.
    fn compile_name_use(&mut self, info: &NodeInfo) -> Result<(), CompileError> {
        let at = &info.breadcrumbs;
        if let Some(error) = self.runtime_error(at) {
            return self.error_literal(info, error);
        }
        let analyzed = self.analyzed;
        if let Some((path, name)) = analyzed.file_reference(at) {
            let name = name.ok_or_else(|| CompileError::MissingTag {
                breadcrumbs: at.clone(),
                tag: "ReferencesFile",
            })?;
            self.emit_import(info, path, name)?;
        } else {
            let source = analyzed
                .value_source(at)
                .ok_or_else(|| CompileError::MissingTag {
                    breadcrumbs: at.clone(),
                    tag: "ValueComesFrom",
                })?;
            if let Some((path, Some(name))) = analyzed.file_reference(source) {
                self.emit_import(info, path, name)?;
            } else if let Some(name) = analyzed.top_level_name(source) {
                let export_name_constant = self.constant(CompiledConstant::Text(name.to_string()))?;
                self.emit(
                    Instruction::ImportSameFile {
                        export_name_constant,
                    },
                    info,
                    SourceMapPhase::Execute,
                )?;
            } else {
                let reference = find_value_reference(&self.scopes, source)?;
                self.emit(reference.read(), info, SourceMapPhase::Execute)?;
            }
        }

        if self.resolved.get_inferred_type(at) == Some(&LangType::Value(ValueLangType::Action)) {
            self.emit(Instruction::Pop { number: 1 }, info, SourceMapPhase::Cleanup)?;
            self.emit(Instruction::PushAction, info, SourceMapPhase::Execute)?;
        }
        Ok(())
    }

    fn compile_call(
        &mut self,
        info: &NodeInfo,
        callee: &ExpressionNode,
        parameters: &[CallParameterNode],
    ) -> Result<(), CompileError> {
        let callee_at = &callee.info().breadcrumbs;
        self.compile_expression(callee)?;
        for parameter in parameters {
            self.compile_expression(&parameter.value)?;
            if let Some(error) = self.runtime_error(&parameter.info.breadcrumbs) {
                self.replace_with_bad_value(&parameter.info, error)?;
            }
        }

        let arity = parameters.len();
        let blocking = self.runtime_error(callee_at).or_else(|| {
            self.runtime_error(&info.breadcrumbs)
                .filter(prevents_dispatch)
        });
        if let Some(error) = blocking {
            self.emit(Instruction::Pop { number: arity + 1 }, info, SourceMapPhase::Cleanup)?;
            return self.raise_type_error(info, error);
        }

        let instruction = match self.resolved_type(callee_at) {
            Some(LangType::Constraint(ValueLangType::Instance(canonical)))
                if canonical.is_unique() =>
            {
                Instruction::Pop { number: arity }
            }
            Some(LangType::Constraint(_)) => Instruction::Construct { arity },
            _ => Instruction::CallFunction { arity },
        };
        self.emit(instruction, info, SourceMapPhase::Execute)
    }

    fn compile_cause(&mut self, info: &NodeInfo, signal: &ExpressionNode) -> Result<(), CompileError> {
        self.compile_expression(signal)?;
        let blocking = self.runtime_error(&signal.info().breadcrumbs).or_else(|| {
            self.runtime_error(&info.breadcrumbs)
                .filter(|error| matches!(error, ErrorLangType::NotCausable))
        });
        match blocking {
            Some(error) => {
                self.emit(Instruction::Pop { number: 1 }, info, SourceMapPhase::Cleanup)?;
                self.raise_type_error(info, error)
            }
            None => self.emit(Instruction::Cause, info, SourceMapPhase::Execute),
        }
    }

    fn compile_member(
        &mut self,
        info: &NodeInfo,
        object: &ExpressionNode,
        member: &IdentifierNode,
    ) -> Result<(), CompileError> {
        self.compile_expression(object)?;
        if self.runtime_error(&info.breadcrumbs).is_some() {
            // The generic error check replaces the object with a BadValue.
            return Ok(());
        }
        let index = match self.resolved_type(&object.info().breadcrumbs) {
            Some(LangType::Value(ValueLangType::Instance(canonical))) => {
                canonical.field_index(&member.text)
            }
            _ => None,
        }
        .ok_or_else(|| {
            CompileError::Internal(format!(
                "member {} resolved without a matching field at {}",
                member.text, info.breadcrumbs
            ))
        })?;
        self.emit(Instruction::GetMember { index }, info, SourceMapPhase::Execute)
    }

    fn compile_branch(
        &mut self,
        info: &NodeInfo,
        with_value: Option<&ExpressionNode>,
        branches: &[BranchOptionNode],
    ) -> Result<(), CompileError> {
        let at = &info.breadcrumbs;
        self.begin_scope(at, ScopeKind::Body);
        let subject = match with_value {
            Some(value) => {
                self.compile_expression(value)?;
                let value_at = value.info().breadcrumbs.clone();
                self.add_to_scope(&value_at)?;
                Some(value_at)
            }
            None => None,
        };

        let arm_depth = self.depth()?;
        let mut end_jumps = Vec::new();
        let mut has_else = false;
        for option in branches {
            match option {
                BranchOptionNode::If {
                    info: option_info,
                    condition,
                    body,
                } => {
                    self.compile_expression(condition)?;
                    let skip = self.emit_jump(Instruction::JumpIfFalse { instruction: 0 }, option_info)?;
                    self.compile_body(body)?;
                    end_jumps.push(self.emit_jump(Instruction::Jump { instruction: 0 }, option_info)?);
                    self.set_depth(arm_depth)?;
                    self.patch_jump(skip)?;
                }
                BranchOptionNode::Is {
                    info: option_info,
                    pattern,
                    body,
                } => {
                    // Without a subject the branch already resolved to an error.
                    let Some(subject) = &subject else { continue };
                    let reference = find_value_reference(&self.scopes, subject)?;
                    self.emit(reference.read(), option_info, SourceMapPhase::Setup)?;
                    self.compile_type_reference(&pattern.type_reference)?;
                    self.emit(Instruction::IsAssignableTo, option_info, SourceMapPhase::Setup)?;
                    let skip = self.emit_jump(Instruction::JumpIfFalse { instruction: 0 }, option_info)?;

                    let option_at = &option_info.breadcrumbs;
                    self.begin_scope(option_at, ScopeKind::Body);
                    self.emit(reference.read(), option_info, SourceMapPhase::Setup)?;
                    if pattern.name.is_some() {
                        self.add_to_scope(&pattern.info.breadcrumbs)?;
                    }
                    self.compile_body(body)?;
                    self.end_scope(option_at)?;
                    self.emit(Instruction::PopScope { values: 1 }, option_info, SourceMapPhase::Cleanup)?;
                    end_jumps.push(self.emit_jump(Instruction::Jump { instruction: 0 }, option_info)?);
                    self.set_depth(arm_depth)?;
                    self.patch_jump(skip)?;
                }
                BranchOptionNode::Else {
                    info: option_info,
                    body,
                } => {
                    has_else = true;
                    self.compile_body(body)?;
                    end_jumps.push(self.emit_jump(Instruction::Jump { instruction: 0 }, option_info)?);
                    self.set_depth(arm_depth)?;
                }
            }
        }

        if has_else {
            self.set_depth(arm_depth + 1)?;
        } else {
            let error = self
                .runtime_error(at)
                .unwrap_or(ErrorLangType::MissingElseBranch);
            self.raise_type_error(info, error)?;
        }
        for jump in end_jumps {
            self.patch_jump(jump)?;
        }

        let scope = self.end_scope(at)?;
        self.emit(
            Instruction::PopScope {
                values: scope.size(),
            },
            info,
            SourceMapPhase::Cleanup,
        )
    }
}
