use crate::intern::Symbol;
use crate::token::Loc;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Immutable,
    Mutable,
    Param,
    Function,
    Type,
    Import,
    Variant,
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub kind: BindingKind,
    pub declared_type: Option<String>,
    pub declared_at: Loc,
    pub used: bool,
    pub first_use_at: Option<Loc>,
    pub is_pub: bool,
}

impl Binding {
    pub fn new(kind: BindingKind, declared_at: Loc) -> Self {
        Binding {
            kind,
            declared_type: None,
            declared_at,
            used: false,
            first_use_at: None,
            is_pub: false,
        }
    }

    pub fn with_type(mut self, ty: Option<String>) -> Self {
        self.declared_type = ty;
        self
    }

    pub fn public(mut self) -> Self {
        self.is_pub = true;
        self
    }
}

/// One scope frame. Definitions are append-only for the frame's lifetime;
/// the frame is inspected for unused bindings as it pops.
#[derive(Debug, Default)]
pub struct Frame {
    bindings: HashMap<Symbol, Binding>,
    /// Entering a function body sets this; shadow detection counts the
    /// boundaries crossed between use and definition.
    pub is_function_boundary: bool,
    /// Narrowed types layered over bindings from enclosing frames.
    pub narrowed: HashMap<Symbol, String>,
}

impl Frame {
    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &Binding)> {
        self.bindings.iter()
    }
}

/// Lexical scope tree, flattened into a stack for the single analysis walk.
#[derive(Debug, Default)]
pub struct ScopeStack {
    frames: Vec<Frame>,
}

impl ScopeStack {
    pub fn new() -> Self {
        let mut stack = ScopeStack { frames: Vec::new() };
        stack.push(false);
        stack
    }

    pub fn push(&mut self, is_function_boundary: bool) {
        self.frames.push(Frame {
            is_function_boundary,
            ..Frame::default()
        });
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn at_module_level(&self) -> bool {
        !self.frames.iter().any(|f| f.is_function_boundary)
    }

    /// Defines in the current frame. Returns the existing binding's location
    /// when the name is already taken in this frame.
    pub fn define(&mut self, name: Symbol, binding: Binding) -> Result<(), Loc> {
        let frame = self.frames.last_mut().expect("scope stack never empty");
        if let Some(existing) = frame.bindings.get(&name) {
            return Err(existing.declared_at);
        }
        frame.bindings.insert(name, binding);
        Ok(())
    }

    /// Replaces a same-frame binding unconditionally (rebinding an
    /// immutable name in its own frame is a fresh definition).
    pub fn rebind(&mut self, name: Symbol, binding: Binding) {
        let frame = self.frames.last_mut().expect("scope stack never empty");
        frame.bindings.insert(name, binding);
    }

    pub fn lookup(&self, name: Symbol) -> Option<&Binding> {
        for frame in self.frames.iter().rev() {
            if let Some(binding) = frame.bindings.get(&name) {
                return Some(binding);
            }
        }
        None
    }

    pub fn lookup_mut(&mut self, name: Symbol) -> Option<&mut Binding> {
        for frame in self.frames.iter_mut().rev() {
            if let Some(binding) = frame.bindings.get_mut(&name) {
                return Some(binding);
            }
        }
        None
    }

    /// Whether the name resolves in a frame other than the current one.
    pub fn defined_in_outer_frame(&self, name: Symbol) -> bool {
        let last = self.frames.len().saturating_sub(1);
        self.frames[..last]
            .iter()
            .any(|f| f.bindings.contains_key(&name))
    }

    pub fn defined_in_current_frame(&self, name: Symbol) -> bool {
        self.frames
            .last()
            .map_or(false, |f| f.bindings.contains_key(&name))
    }

    /// Whether an existing binding sits on the far side of a function
    /// boundary from the current frame.
    pub fn crosses_function_boundary(&self, name: Symbol) -> bool {
        let mut crossed = false;
        for frame in self.frames.iter().rev() {
            if frame.bindings.contains_key(&name) {
                return crossed;
            }
            if frame.is_function_boundary {
                crossed = true;
            }
        }
        false
    }

    /// Effective type of a binding, honoring narrowing overlays from inner
    /// frames outward.
    pub fn effective_type(&self, name: Symbol) -> Option<String> {
        for frame in self.frames.iter().rev() {
            if let Some(ty) = frame.narrowed.get(&name) {
                return Some(ty.clone());
            }
            if let Some(binding) = frame.bindings.get(&name) {
                return binding.declared_type.clone();
            }
        }
        None
    }

    pub fn narrow(&mut self, name: Symbol, ty: String) {
        let frame = self.frames.last_mut().expect("scope stack never empty");
        frame.narrowed.insert(name, ty);
    }

    /// Names visible from the current frame, for typo suggestions.
    pub fn visible_names<'i>(&self, interner: &'i crate::intern::Interner) -> Vec<&'i str> {
        let mut names = Vec::new();
        for frame in &self.frames {
            for sym in frame.bindings.keys() {
                names.push(interner.resolve(*sym));
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::Interner;

    fn sym(interner: &mut Interner, s: &str) -> Symbol {
        interner.intern(s)
    }

    #[test]
    fn define_and_lookup() {
        let mut interner = Interner::new();
        let mut scopes = ScopeStack::new();
        let x = sym(&mut interner, "x");
        scopes.define(x, Binding::new(BindingKind::Immutable, Loc::default())).unwrap();
        assert!(scopes.lookup(x).is_some());
    }

    #[test]
    fn duplicate_in_same_frame_is_rejected() {
        let mut interner = Interner::new();
        let mut scopes = ScopeStack::new();
        let x = sym(&mut interner, "x");
        scopes.define(x, Binding::new(BindingKind::Immutable, Loc::default())).unwrap();
        assert!(scopes.define(x, Binding::new(BindingKind::Immutable, Loc::default())).is_err());
    }

    #[test]
    fn lookup_walks_parent_frames() {
        let mut interner = Interner::new();
        let mut scopes = ScopeStack::new();
        let x = sym(&mut interner, "x");
        scopes.define(x, Binding::new(BindingKind::Mutable, Loc::default())).unwrap();
        scopes.push(false);
        assert_eq!(scopes.lookup(x).map(|b| b.kind), Some(BindingKind::Mutable));
        assert!(scopes.defined_in_outer_frame(x));
        assert!(!scopes.defined_in_current_frame(x));
    }

    #[test]
    fn function_boundary_crossing_is_detected() {
        let mut interner = Interner::new();
        let mut scopes = ScopeStack::new();
        let x = sym(&mut interner, "x");
        scopes.define(x, Binding::new(BindingKind::Immutable, Loc::default())).unwrap();
        scopes.push(true);
        assert!(scopes.crosses_function_boundary(x));
        scopes.pop();
        assert!(!scopes.crosses_function_boundary(x));
    }

    #[test]
    fn narrowing_overlays_win_over_declared_type() {
        let mut interner = Interner::new();
        let mut scopes = ScopeStack::new();
        let x = sym(&mut interner, "x");
        scopes
            .define(
                x,
                Binding::new(BindingKind::Immutable, Loc::default())
                    .with_type(Some("Int | Nil".to_string())),
            )
            .unwrap();
        scopes.push(false);
        scopes.narrow(x, "Int".to_string());
        assert_eq!(scopes.effective_type(x).as_deref(), Some("Int"));
        scopes.pop();
        assert_eq!(scopes.effective_type(x).as_deref(), Some("Int | Nil"));
    }

    #[test]
    fn popped_frame_reports_unused_bindings() {
        let mut interner = Interner::new();
        let mut scopes = ScopeStack::new();
        scopes.push(false);
        let x = sym(&mut interner, "unused");
        scopes.define(x, Binding::new(BindingKind::Immutable, Loc::default())).unwrap();
        let frame = scopes.pop().expect("frame");
        let unused: Vec<_> = frame.iter().filter(|(_, b)| !b.used).collect();
        assert_eq!(unused.len(), 1);
    }
}
