//=====================================================
// File: bundle.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Multi-file compilation for CauseLang
// Objective: Compile files once their dependencies are available and hand
//            the VM one read-only collection of compiled files
//=====================================================

use crate::analyzer::{AnalyzedNode, analyze_file};
use crate::ast::FileNode;
use crate::bytecode::CompiledFile;
use crate::compiler::compile;
use crate::errors::{CompileError, VmError};
use crate::resolver::{ExternalFileDescriptor, ResolverError, resolve_for_file};
use crate::stdlib_registry;
use crate::types::{CanonicalLangType, CanonicalLangTypeId};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Analyze, resolve, and compile one file against the descriptors of the
/// files it imports. Returns the compiled file and its diagnostics.
pub fn compile_file(
    path: &str,
    file: &FileNode,
    descriptors: &HashMap<String, ExternalFileDescriptor>,
) -> Result<(CompiledFile, Vec<ResolverError>), CompileError> {
    let analyzed = analyze_file(path, file);
    compile_analyzed(path, file, &analyzed, descriptors)
}

fn compile_analyzed(
    path: &str,
    file: &FileNode,
    analyzed: &AnalyzedNode,
    descriptors: &HashMap<String, ExternalFileDescriptor>,
) -> Result<(CompiledFile, Vec<ResolverError>), CompileError> {
    let resolved = resolve_for_file(path, file, analyzed, descriptors)?;
    let compiled = compile(file, analyzed, &resolved)?;
    Ok((compiled, resolved.diagnostics))
}

struct PendingFile {
    file: FileNode,
    analyzed: AnalyzedNode,
}

/// Collects source and precompiled files, then compiles them in dependency order.
#[derive(Default)]
pub struct CodeBundleBuilder {
    pending: BTreeMap<String, PendingFile>,
    compiled: BTreeMap<String, Arc<CompiledFile>>,
}

impl CodeBundleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, path: impl Into<String>, file: FileNode) -> &mut Self {
        let path = path.into();
        let analyzed = analyze_file(&path, &file);
        self.pending.insert(path, PendingFile { file, analyzed });
        self
    }

    pub fn add_compiled_file(&mut self, file: CompiledFile) -> &mut Self {
        self.compiled.insert(file.path.clone(), Arc::new(file));
        self
    }

    /// Files some added file imports that nobody has provided yet.
    pub fn required_file_paths(&self) -> Vec<String> {
        let referenced: BTreeSet<&String> = self
            .pending
            .values()
            .flat_map(|pending| pending.analyzed.files_referenced.iter())
            .collect();
        referenced
            .into_iter()
            .filter(|path| {
                !stdlib_registry::is_builtin_path(path)
                    && !self.pending.contains_key(*path)
                    && !self.compiled.contains_key(*path)
            })
            .cloned()
            .collect()
    }

    /// Compile every pending file. Files whose imports can never be satisfied
    /// (missing files, cycles) are still compiled; their imports become errors.
    pub fn build(mut self) -> Result<CodeBundle, CompileError> {
        let mut descriptors: HashMap<String, ExternalFileDescriptor> = self
            .compiled
            .iter()
            .map(|(path, file)| (path.clone(), file.to_file_descriptor()))
            .collect();
        let mut diagnostics = Vec::new();

        loop {
            let ready: Vec<String> = self
                .pending
                .iter()
                .filter(|(path, pending)| {
                    pending.analyzed.files_referenced.iter().all(|dependency| {
                        dependency == *path
                            || stdlib_registry::is_builtin_path(dependency)
                            || descriptors.contains_key(dependency)
                    })
                })
                .map(|(path, _)| path.clone())
                .collect();
            if ready.is_empty() {
                break;
            }
            for path in ready {
                if let Some(pending) = self.pending.remove(&path) {
                    let (compiled, mut found) =
                        compile_analyzed(&path, &pending.file, &pending.analyzed, &descriptors)?;
                    diagnostics.append(&mut found);
                    descriptors.insert(path.clone(), compiled.to_file_descriptor());
                    self.compiled.insert(path, Arc::new(compiled));
                }
            }
        }

        for (path, pending) in std::mem::take(&mut self.pending) {
            debug!(path = %path, "compiling with unsatisfied imports");
            let (compiled, mut found) =
                compile_analyzed(&path, &pending.file, &pending.analyzed, &descriptors)?;
            diagnostics.append(&mut found);
            descriptors.insert(path.clone(), compiled.to_file_descriptor());
            self.compiled.insert(path, Arc::new(compiled));
        }

        debug!(
            files = self.compiled.len(),
            diagnostics = diagnostics.len(),
            "built code bundle"
        );
        Ok(CodeBundle {
            files: self.compiled,
            diagnostics,
        })
    }
}

/// Compiled files ready to run. Read-only and shareable between VMs.
#[derive(Debug, Clone, Default)]
pub struct CodeBundle {
    files: BTreeMap<String, Arc<CompiledFile>>,
    diagnostics: Vec<ResolverError>,
}

impl CodeBundle {
    pub fn files(&self) -> impl Iterator<Item = &Arc<CompiledFile>> {
        self.files.values()
    }

    pub fn diagnostics(&self) -> &[ResolverError] {
        &self.diagnostics
    }

    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    /// A compiled file by path; built-in files are always available.
    pub fn require_file(&self, path: &str) -> Result<Arc<CompiledFile>, VmError> {
        self.files
            .get(path)
            .or_else(|| stdlib_registry::file(path))
            .cloned()
            .ok_or_else(|| VmError::UnknownFile(path.to_string()))
    }

    pub fn get_file_descriptor(&self, path: &str) -> Option<ExternalFileDescriptor> {
        self.require_file(path)
            .ok()
            .map(|file| file.to_file_descriptor())
    }

    pub fn get_type(&self, id: &CanonicalLangTypeId) -> Option<CanonicalLangType> {
        self.require_file(&id.path).ok()?.types.get(id).cloned()
    }

    pub fn builtin_type_id(&self, name: &str) -> Option<CanonicalLangTypeId> {
        stdlib_registry::builtin_type(name).map(|canonical| canonical.id().clone())
    }
}
