use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::val::{Type, TypeId, Value};

/// Base score for a definition whose arity equals the argument count.
const EXACT_ARITY: u32 = 2;
/// Base score for a variadic definition that absorbs extra arguments.
const VARIADIC_ARITY: u32 = 1;

pub struct Definition {
    types: Vec<Rc<Type>>,
    variadic: bool,
    func: Value,
}

impl Definition {
    pub fn types(&self) -> &[Rc<Type>] {
        &self.types
    }

    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    pub fn func(&self) -> &Value {
        &self.func
    }

    /// `None` when the definition cannot accept these argument types.
    fn score(&self, args: &[Rc<Type>]) -> Option<u32> {
        let arity = self.types.len();
        if arity > args.len() || (arity < args.len() && !self.variadic) {
            return None;
        }
        let mut score = if arity == args.len() { EXACT_ARITY } else { VARIADIC_ARITY };
        for (param, arg) in self.types.iter().zip(args) {
            if !arg.is_a(param) {
                return None;
            }
            score += param.rank();
        }
        Some(score)
    }
}

/// A named generic function.
///
/// Definitions are kept in registration order. Resolution picks the
/// highest score; on a tie the earliest definition wins. Results are
/// cached per argument-type signature until the next `define`.
pub struct Method {
    name: Rc<str>,
    definitions: RefCell<Vec<Definition>>,
    cache: RefCell<FxHashMap<Vec<TypeId>, Option<Value>>>,
    resolutions: Cell<u64>,
}

impl Method {
    pub fn new(name: &str) -> Rc<Self> {
        Rc::new(Self {
            name: Rc::from(name),
            definitions: RefCell::new(Vec::new()),
            cache: RefCell::new(FxHashMap::default()),
            resolutions: Cell::new(0),
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn define(&self, types: Vec<Rc<Type>>, variadic: bool, func: Value) {
        tracing::debug!(
            target: "kestrel::dispatch",
            method = %self.name,
            arity = types.len(),
            variadic,
            "define method"
        );
        self.definitions.borrow_mut().push(Definition {
            types,
            variadic,
            func,
        });
        self.cache.borrow_mut().clear();
    }

    pub fn definition_count(&self) -> usize {
        self.definitions.borrow().len()
    }

    /// Number of full (uncached) resolutions performed so far.
    pub fn resolutions(&self) -> u64 {
        self.resolutions.get()
    }

    pub fn resolve(&self, args: &[Rc<Type>]) -> Option<Value> {
        let signature: Vec<TypeId> = args.iter().map(|ty| ty.id()).collect();
        if let Some(cached) = self.cache.borrow().get(&signature) {
            return cached.clone();
        }
        self.resolutions.set(self.resolutions.get() + 1);
        let mut best: Option<(u32, &Definition)> = None;
        let definitions = self.definitions.borrow();
        for definition in definitions.iter() {
            let Some(score) = definition.score(args) else {
                continue;
            };
            if best.is_none_or(|(current, _)| score > current) {
                best = Some((score, definition));
            }
        }
        let found = best.map(|(_, definition)| definition.func.clone());
        tracing::trace!(
            target: "kestrel::dispatch",
            method = %self.name,
            found = found.is_some(),
            "resolve method"
        );
        self.cache.borrow_mut().insert(signature, found.clone());
        found
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("definitions", &self.definition_count())
            .finish()
    }
}

/// Methods by name; a name always maps to the same `Method`.
pub struct MethodRegistry {
    methods: RefCell<FxHashMap<Rc<str>, Rc<Method>>>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self {
            methods: RefCell::new(FxHashMap::default()),
        }
    }

    pub fn get(&self, name: &str) -> Option<Rc<Method>> {
        self.methods.borrow().get(name).cloned()
    }

    pub fn get_or_create(&self, name: &str) -> Rc<Method> {
        if let Some(method) = self.get(name) {
            return method;
        }
        let method = Method::new(name);
        self.methods.borrow_mut().insert(Rc::from(name), method.clone());
        method
    }

    pub fn len(&self) -> usize {
        self.methods.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.borrow().is_empty()
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}
