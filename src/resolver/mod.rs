//=====================================================
// File: resolver/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Type resolution for CauseLang files
// Objective: Solve inferred and expected types for every tagged node by
//            fixpoint iteration over the analyzer's fact graph
//=====================================================

mod rules;

use crate::analyzer::{AnalyzedNode, NodeTag};
use crate::ast::{Breadcrumbs, DeclarationNode, FileNode, NodeRef, SourcePosition, StatementNode};
use crate::errors::CompileError;
use crate::stdlib_registry;
use crate::types::{CanonicalLangType, CanonicalLangTypeId, ErrorLangType, LangType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResolutionType {
    Inferred,
    Expected,
}

/// One of the two type slots every node may have.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResolutionKey {
    pub kind: ResolutionType,
    pub breadcrumbs: Breadcrumbs,
}

impl ResolutionKey {
    pub fn inferred(breadcrumbs: &Breadcrumbs) -> Self {
        Self {
            kind: ResolutionType::Inferred,
            breadcrumbs: breadcrumbs.clone(),
        }
    }

    pub fn expected(breadcrumbs: &Breadcrumbs) -> Self {
        Self {
            kind: ResolutionType::Expected,
            breadcrumbs: breadcrumbs.clone(),
        }
    }
}

impl fmt::Display for ResolutionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self.kind, self.breadcrumbs)
    }
}

/// The exports and types another file can see of a compiled file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalFileDescriptor {
    pub exports: BTreeMap<String, LangType>,
    pub types: BTreeMap<CanonicalLangTypeId, CanonicalLangType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverError {
    pub position: SourcePosition,
    pub error: ErrorLangType,
}

impl fmt::Display for ResolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.position, self.error)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedFile {
    pub path: String,
    pub resolved_types: BTreeMap<ResolutionKey, LangType>,
    pub canonical_types: BTreeMap<CanonicalLangTypeId, CanonicalLangType>,
    pub diagnostics: Vec<ResolverError>,
}

impl ResolvedFile {
    pub fn get_inferred_type(&self, breadcrumbs: &Breadcrumbs) -> Option<&LangType> {
        self.resolved_types.get(&ResolutionKey::inferred(breadcrumbs))
    }

    pub fn get_expected_type(&self, breadcrumbs: &Breadcrumbs) -> Option<&LangType> {
        self.resolved_types.get(&ResolutionKey::expected(breadcrumbs))
    }

    /// The error a node would carry at runtime, if any.
    pub fn check_for_runtime_errors(&self, breadcrumbs: &Breadcrumbs) -> Option<ErrorLangType> {
        let from_slot = |slot: Option<&LangType>| match slot {
            Some(LangType::Error(error)) => Some(error.clone()),
            Some(LangType::Pending) => Some(ErrorLangType::NeverResolved),
            _ => None,
        };
        from_slot(self.get_inferred_type(breadcrumbs))
            .or_else(|| from_slot(self.get_expected_type(breadcrumbs)))
    }

    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

/// Resolve every type in `file`, seeing other files only through `external`.
/// Built-in files are always visible.
pub fn resolve_for_file(
    path: &str,
    file: &FileNode,
    analyzed: &AnalyzedNode,
    external: &HashMap<String, ExternalFileDescriptor>,
) -> Result<ResolvedFile, CompileError> {
    let index = file.index();
    let mut resolver = Resolver {
        path,
        index: &index,
        analyzed,
        external,
        resolved: BTreeMap::new(),
        canonical: BTreeMap::new(),
        canonical_numbers: number_canonical_declarations(&index),
    };
    resolver.seed();
    let passes = resolver.run_to_fixpoint()?;
    resolver.check_expectations();
    let diagnostics = resolver.collect_diagnostics();
    debug!(
        path,
        passes,
        diagnostics = diagnostics.len(),
        "resolved file"
    );
    Ok(ResolvedFile {
        path: path.to_string(),
        resolved_types: resolver.resolved,
        canonical_types: resolver.canonical,
        diagnostics,
    })
}

/// Same-named object and signal declarations get increasing numbers so their
/// canonical ids stay distinct.
fn number_canonical_declarations(
    index: &BTreeMap<Breadcrumbs, NodeRef<'_>>,
) -> BTreeMap<Breadcrumbs, u8> {
    let mut seen: HashMap<&str, u8> = HashMap::new();
    let mut numbers = BTreeMap::new();
    for (breadcrumbs, node) in index {
        if let NodeRef::Declaration(
            DeclarationNode::ObjectType { name, .. } | DeclarationNode::SignalType { name, .. },
        ) = node
        {
            let count = seen.entry(name.text.as_str()).or_insert(0);
            numbers.insert(breadcrumbs.clone(), *count);
            *count = count.saturating_add(1);
        }
    }
    numbers
}

/// Work produced by one pass, applied once the pass is complete.
#[derive(Default)]
struct PassOutput {
    requested: BTreeSet<ResolutionKey>,
    canonical: Vec<CanonicalLangType>,
}

struct Resolver<'a> {
    path: &'a str,
    index: &'a BTreeMap<Breadcrumbs, NodeRef<'a>>,
    analyzed: &'a AnalyzedNode,
    external: &'a HashMap<String, ExternalFileDescriptor>,
    resolved: BTreeMap<ResolutionKey, LangType>,
    canonical: BTreeMap<CanonicalLangTypeId, CanonicalLangType>,
    canonical_numbers: BTreeMap<Breadcrumbs, u8>,
}

impl<'a> Resolver<'a> {
    fn seed_key(&mut self, key: ResolutionKey) {
        self.resolved.entry(key).or_insert(LangType::Pending);
    }

    fn seed(&mut self) {
        let mut keys = Vec::new();
        for (breadcrumbs, tags) in &self.analyzed.node_tags {
            for tag in tags {
                match tag {
                    NodeTag::Expression | NodeTag::DeclarationForScope { .. } => {
                        keys.push(ResolutionKey::inferred(breadcrumbs));
                    }
                    NodeTag::TypeAnnotated { annotation } => {
                        keys.push(ResolutionKey::inferred(annotation));
                        keys.push(ResolutionKey::inferred(breadcrumbs));
                        keys.push(ResolutionKey::expected(breadcrumbs));
                    }
                    NodeTag::ParameterForCall { .. } => {
                        keys.push(ResolutionKey::inferred(breadcrumbs));
                        keys.push(ResolutionKey::expected(breadcrumbs));
                    }
                    _ => {}
                }
            }
        }
        for (breadcrumbs, node) in self.index {
            if let NodeRef::Statement(StatementNode::Effect { .. } | StatementNode::Set { .. }) =
                node
            {
                keys.push(ResolutionKey::inferred(breadcrumbs));
            }
        }
        for key in keys {
            self.seed_key(key);
        }
    }

    /// Resolve pending slots until a pass neither resolves nor requests anything.
    fn run_to_fixpoint(&mut self) -> Result<usize, CompileError> {
        let mut passes = 0;
        loop {
            passes += 1;
            let pending: Vec<ResolutionKey> = self
                .resolved
                .iter()
                .filter(|(_, value)| value.is_pending())
                .map(|(key, _)| key.clone())
                .collect();

            let mut output = PassOutput::default();
            let mut updates = Vec::new();
            for key in pending {
                let value = match key.kind {
                    ResolutionType::Inferred => self.infer(&key.breadcrumbs, &mut output)?,
                    ResolutionType::Expected => self.expect(&key.breadcrumbs, &mut output)?,
                };
                if !value.is_pending() {
                    updates.push((key, value));
                }
            }

            let mut changed = !updates.is_empty();
            for (key, value) in updates {
                self.set_resolved(key, value)?;
            }
            for canonical in output.canonical {
                self.register_canonical(canonical)?;
            }
            for key in output.requested {
                if !self.resolved.contains_key(&key) {
                    self.resolved.insert(key, LangType::Pending);
                    changed = true;
                }
            }
            if !changed {
                return Ok(passes);
            }
        }
    }

    fn set_resolved(&mut self, key: ResolutionKey, value: LangType) -> Result<(), CompileError> {
        match self.resolved.get(&key) {
            None | Some(LangType::Pending) => {
                self.resolved.insert(key, value);
                Ok(())
            }
            Some(existing) if *existing == value => Ok(()),
            Some(_) => Err(CompileError::Clobbered {
                key: key.to_string(),
            }),
        }
    }

    fn register_canonical(&mut self, canonical: CanonicalLangType) -> Result<(), CompileError> {
        match self.canonical.get(canonical.id()) {
            Some(existing) if *existing != canonical => Err(CompileError::CanonicalClobbered {
                id: canonical.id().to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.canonical.insert(canonical.id().clone(), canonical);
                Ok(())
            }
        }
    }

    /// After convergence, a node whose actual type doesn't satisfy its expected
    /// type is marked as a mismatch.
    fn check_expectations(&mut self) {
        let mut mismatches = Vec::new();
        for (key, expected) in &self.resolved {
            if key.kind != ResolutionType::Expected {
                continue;
            }
            let LangType::Constraint(constraint) = expected else {
                continue;
            };
            let inferred_key = ResolutionKey::inferred(&key.breadcrumbs);
            let Some(actual) = self.resolved.get(&inferred_key) else {
                continue;
            };
            if matches!(actual, LangType::Value(_) | LangType::Constraint(_))
                && !actual.is_assignable_to(constraint)
            {
                mismatches.push((
                    inferred_key,
                    LangType::Error(ErrorLangType::MismatchedType {
                        expected: Box::new(constraint.clone()),
                        actual: Box::new(actual.clone()),
                    }),
                ));
            }
        }
        for (key, value) in mismatches {
            self.resolved.insert(key, value);
        }
    }

    fn collect_diagnostics(&self) -> Vec<ResolverError> {
        let mut diagnostics = Vec::new();
        for (key, value) in &self.resolved {
            let error = match value {
                LangType::Pending => ErrorLangType::NeverResolved,
                LangType::Error(error) if !error.is_proxy() => error.clone(),
                _ => continue,
            };
            diagnostics.push(ResolverError {
                position: self.position_of(&key.breadcrumbs),
                error,
            });
        }
        diagnostics
    }

    //=================================================
    // Shared lookups for the rules
    //=================================================

    fn node(&self, breadcrumbs: &Breadcrumbs) -> Result<NodeRef<'a>, CompileError> {
        self.index
            .get(breadcrumbs)
            .copied()
            .ok_or_else(|| CompileError::MissingNode(breadcrumbs.clone()))
    }

    fn position_of(&self, breadcrumbs: &Breadcrumbs) -> SourcePosition {
        match self.index.get(breadcrumbs) {
            Some(node) => node.info().source_position(self.path),
            None => SourcePosition::Source {
                path: self.path.to_string(),
                breadcrumbs: breadcrumbs.clone(),
                position: Default::default(),
            },
        }
    }

    fn lookup_file(&self, path: &str) -> Option<&ExternalFileDescriptor> {
        self.external
            .get(path)
            .or_else(|| stdlib_registry::descriptor(path))
    }

    fn lookup_export(&self, path: &str, name: Option<&str>) -> LangType {
        let Some(file) = self.lookup_file(path) else {
            return LangType::Error(ErrorLangType::FileNotFound);
        };
        match name.and_then(|name| file.exports.get(name)) {
            Some(export) => export.clone(),
            None => LangType::Error(ErrorLangType::ExportNotFound),
        }
    }

    /// Type of the slot as-is, requesting it if nobody has asked for it yet.
    fn get_inferred_type_of(&self, breadcrumbs: &Breadcrumbs, output: &mut PassOutput) -> LangType {
        let key = ResolutionKey::inferred(breadcrumbs);
        match self.resolved.get(&key) {
            Some(value) => value.clone(),
            None => {
                output.requested.insert(key);
                LangType::Pending
            }
        }
    }

    /// The type other nodes see: the expected type if the node has one,
    /// otherwise what it was inferred to be.
    fn get_resolved_type_of(&self, breadcrumbs: &Breadcrumbs, output: &mut PassOutput) -> LangType {
        match self.resolved.get(&ResolutionKey::expected(breadcrumbs)) {
            Some(LangType::Constraint(constraint)) => LangType::Value(constraint.clone()),
            Some(LangType::Pending) => LangType::Pending,
            Some(LangType::Error(error)) => LangType::Error(error.clone()),
            _ => self.get_inferred_type_of(breadcrumbs, output),
        }
    }

    /// Copy a source's type, forwarding errors as proxies through `source`.
    fn forward(&self, source: &Breadcrumbs, output: &mut PassOutput) -> LangType {
        match self.get_resolved_type_of(source, output) {
            LangType::Error(error) => {
                LangType::Error(ErrorLangType::proxy(&error, self.position_of(source)))
            }
            other => other,
        }
    }

    fn follow_value_source(
        &self,
        breadcrumbs: &Breadcrumbs,
        output: &mut PassOutput,
    ) -> Result<LangType, CompileError> {
        let source = self
            .analyzed
            .value_source(breadcrumbs)
            .ok_or_else(|| CompileError::MissingTag {
                breadcrumbs: breadcrumbs.clone(),
                tag: "ValueComesFrom",
            })?;
        Ok(self.forward(source, output))
    }

    fn has_tag(&self, breadcrumbs: &Breadcrumbs, tag: &NodeTag) -> bool {
        self.analyzed.has_tag(breadcrumbs, tag)
    }

    fn canonical_id(&self, breadcrumbs: &Breadcrumbs, name: &str) -> CanonicalLangTypeId {
        CanonicalLangTypeId {
            path: self.path.to_string(),
            parent_name: None,
            name: name.to_string(),
            number: self.canonical_numbers.get(breadcrumbs).copied().unwrap_or(0),
        }
    }
}
