//! Runtime context: type registry, method table, globals and the scheduler.
//!
//! All state is single-threaded and owned by one `Runtime`. Host code
//! enters through `Runtime::run`; everything after that happens inside
//! scheduler tasks.

use std::rc::Rc;

use anyhow::{Result, anyhow, ensure};

use crate::dispatch::{self, Method, MethodRegistry};
use crate::iter;
use crate::val::{BuiltinTypes, Type, TypeRegistry, Value};
use crate::vm::objects::ObjectRegistry;

mod continuation;
mod debug;
mod globals;
mod scheduler;


pub use continuation::{Caller, Continuation, capture, continuation};
pub use debug::{BreakpointSet, Debugger};
pub use globals::Globals;
pub use scheduler::{Scheduler, Task};

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Queue length at which the scheduler logs a warning.
    pub max_queue_warn: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { max_queue_warn: 1 << 16 }
    }
}

pub struct Runtime {
    scheduler: Scheduler,
    types: TypeRegistry,
    builtins: BuiltinTypes,
    methods: MethodRegistry,
    globals: Globals,
    objects: ObjectRegistry,
    debugger: Option<Rc<dyn Debugger>>,
    config: RuntimeConfig,
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let types = TypeRegistry::new();
        let builtins = BuiltinTypes::register(&types);
        let globals = Globals::new();
        for ty in builtins.all() {
            globals.define(ty.name(), Value::Type(ty.clone()));
        }
        let rt = Self {
            scheduler: Scheduler::new(config.max_queue_warn),
            types,
            builtins,
            methods: MethodRegistry::new(),
            globals,
            objects: ObjectRegistry::default(),
            debugger: None,
            config,
        };
        dispatch::register_core_methods(&rt);
        rt
    }

    pub fn with_debugger(mut self, debugger: Rc<dyn Debugger>) -> Self {
        self.debugger = Some(debugger);
        self
    }

    pub fn with_objects(mut self, objects: ObjectRegistry) -> Self {
        self.objects = objects;
        self
    }

    #[inline]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    #[inline]
    pub fn builtins(&self) -> &BuiltinTypes {
        &self.builtins
    }

    #[inline]
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    #[inline]
    pub fn methods(&self) -> &MethodRegistry {
        &self.methods
    }

    #[inline]
    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    #[inline]
    pub fn objects(&self) -> &ObjectRegistry {
        &self.objects
    }

    #[inline]
    pub fn debugger(&self) -> Option<&Rc<dyn Debugger>> {
        self.debugger.as_ref()
    }

    #[inline]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Register a type and publish it as a global under its name.
    pub fn define_type(&self, name: &str, parents: &[Rc<Type>]) -> Rc<Type> {
        let ty = self.types.define(name, parents);
        self.globals.define(name, Value::Type(ty.clone()));
        tracing::debug!(target: "kestrel::dispatch", name, rank = ty.rank(), "define type");
        ty
    }

    pub fn type_of(&self, value: &Value) -> Rc<Type> {
        self.builtins.type_of(value)
    }

    /// Whether `value` is an instance of `ty` or one of its descendants.
    pub fn is(&self, value: &Value, ty: &Type) -> bool {
        self.type_of(value).is_a(ty)
    }

    pub fn method(&self, name: &str) -> Rc<Method> {
        self.methods.get_or_create(name)
    }

    /// Add a definition to the named method.
    pub fn define_method(&self, name: &str, types: &[Rc<Type>], variadic: bool, func: Value) {
        self.method(name).define(types.to_vec(), variadic, func);
    }

    /// Add a definition to the constructor of `ty` (what calling the type does).
    pub fn define_constructor(&self, ty: &Type, types: &[Rc<Type>], variadic: bool, func: Value) {
        ty.constructor().define(types.to_vec(), variadic, func);
    }

    pub fn schedule(&self, task: impl FnOnce(&Runtime) + 'static) {
        self.scheduler.schedule(self, Box::new(task));
    }

    /// Deliver `value` to `caller` on a later step.
    pub fn resume(&self, caller: Caller, value: Value) {
        self.schedule(move |rt| caller.resume(rt, value));
    }

    /// Call `func` with `args`; the result goes to `caller`.
    pub fn call(&self, caller: Caller, func: Value, args: Vec<Value>) {
        self.schedule(move |rt| dispatch::call_now(rt, caller, func, args));
    }

    /// Start iterating `value`; `caller` receives the first state or nil.
    pub fn iterate(&self, caller: Caller, value: Value) {
        self.schedule(move |rt| iter::iterate_now(rt, caller, value));
    }

    pub fn iter_next(&self, caller: Caller, state: Value) {
        self.schedule(move |rt| iter::next_now(rt, caller, state));
    }

    pub fn iter_key(&self, caller: Caller, state: Value) {
        self.schedule(move |rt| iter::key_now(rt, caller, state));
    }

    pub fn iter_value(&self, caller: Caller, state: Value) {
        self.schedule(move |rt| iter::value_now(rt, caller, state));
    }

    /// Run `func` to completion from host code.
    ///
    /// Language errors come back as `Ok(Value::Error(..))`; `Err` means the
    /// computation never produced a result at all.
    pub fn run(&self, func: Value, args: Vec<Value>) -> Result<Value> {
        ensure!(
            !self.scheduler.is_running(),
            "Runtime::run cannot be nested inside a running task"
        );
        let (caller, slot) = capture();
        self.call(caller, func, args);
        let result = slot.borrow_mut().take();
        result.ok_or_else(|| anyhow!("computation finished without producing a result"))
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
