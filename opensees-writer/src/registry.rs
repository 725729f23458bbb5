//! Emitter registry keyed by (namespace, type name)

use std::collections::HashMap;

use crate::context::EmissionContext;
use crate::emitters;
use crate::error::{EmitError, EmitResult};
use crate::models::{ModelDocument, Targets};
use crate::xobject::XObject;

/// What an emitter can see besides the context: the document and the
/// registry itself, for emitters that delegate (patterns).
pub struct Scope<'a> {
    pub doc: &'a ModelDocument,
    pub registry: &'a Registry,
    /// Enclosing load pattern, if any
    pub pattern: Option<u64>,
}

impl<'a> Scope<'a> {
    pub fn new(doc: &'a ModelDocument, registry: &'a Registry) -> Self {
        Self {
            doc,
            registry,
            pattern: None,
        }
    }

    pub fn within_pattern(&self, pattern: u64) -> Self {
        Self {
            doc: self.doc,
            registry: self.registry,
            pattern: Some(pattern),
        }
    }
}

pub trait Emitter: Send + Sync {
    /// Write the TCL commands for `entity` assigned to `targets`.
    fn emit(
        &self,
        ctx: &mut EmissionContext,
        scope: &Scope<'_>,
        entity: &XObject,
        targets: &Targets,
    ) -> EmitResult<()>;

    /// (ndm, ndf) an element property requires on its nodes
    fn nodal_spatial_dim(&self, _entity: &XObject, _default: (u32, u32)) -> EmitResult<Option<(u32, u32)>> {
        Ok(None)
    }
}

#[derive(Default)]
pub struct Registry {
    emitters: HashMap<(String, String), Box<dyn Emitter>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in emitter installed
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        emitters::register_builtin(&mut registry);
        registry
    }

    pub fn register(&mut self, namespace: &str, name: &str, emitter: Box<dyn Emitter>) {
        let key = (namespace.to_string(), name.to_string());
        if self.emitters.insert(key, emitter).is_some() {
            tracing::warn!("Replacing emitter for {}/{}", namespace, name);
        }
    }

    pub fn contains(&self, namespace: &str, name: &str) -> bool {
        self.emitters
            .contains_key(&(namespace.to_string(), name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.emitters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emitters.is_empty()
    }

    /// Registered (namespace, name) pairs, unordered
    pub fn kinds(&self) -> impl Iterator<Item = (&str, &str)> {
        self.emitters.keys().map(|(ns, name)| (ns.as_str(), name.as_str()))
    }

    pub fn get(&self, namespace: &str, name: &str) -> EmitResult<&dyn Emitter> {
        self.emitters
            .get(&(namespace.to_string(), name.to_string()))
            .map(|e| e.as_ref())
            .ok_or_else(|| EmitError::UnknownEntityKind {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    pub fn emitter_for(&self, entity: &XObject) -> EmitResult<&dyn Emitter> {
        self.get(&entity.namespace, &entity.name)
    }

    pub fn emit(
        &self,
        ctx: &mut EmissionContext,
        doc: &ModelDocument,
        entity: &XObject,
        targets: &Targets,
    ) -> EmitResult<()> {
        self.emit_in(ctx, &Scope::new(doc, self), entity, targets)
    }

    /// Dispatch within an existing scope (used by delegating emitters).
    pub fn emit_in(
        &self,
        ctx: &mut EmissionContext,
        scope: &Scope<'_>,
        entity: &XObject,
        targets: &Targets,
    ) -> EmitResult<()> {
        let emitter = self.emitter_for(entity)?;
        tracing::debug!("Emitting {}", entity.label());
        emitter.emit(ctx, scope, entity, targets)
    }
}
