use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use once_cell::unsync::OnceCell;
use rustc_hash::FxHashMap;

use crate::dispatch::Method;
use crate::val::Value;
use crate::val::array::ArrayKind;

/// Index of a type inside its registry. Stable for the life of the runtime.
pub type TypeId = usize;

/// A nominal runtime type.
///
/// `ancestry` always starts with the type itself and always contains `any`,
/// so `is_a` is a plain membership test. `rank` is the depth used by method
/// scoring: `any` has rank 1, every other type is one deeper than its
/// deepest parent.
pub struct Type {
    id: TypeId,
    name: Rc<str>,
    ancestry: Vec<TypeId>,
    rank: u32,
    exports: RefCell<FxHashMap<Rc<str>, Value>>,
    constructor: OnceCell<Rc<Method>>,
}

impl Type {
    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn rank(&self) -> u32 {
        self.rank
    }

    #[inline]
    pub fn ancestry(&self) -> &[TypeId] {
        &self.ancestry
    }

    #[inline]
    pub fn is_a(&self, other: &Type) -> bool {
        self.ancestry.contains(&other.id)
    }

    /// Lazily created `<name>::of` method; calling the type calls this.
    pub fn constructor(&self) -> Rc<Method> {
        self.constructor
            .get_or_init(|| Method::new(&format!("{}::of", self.name)))
            .clone()
    }

    pub fn export(&self, name: &str) -> Option<Value> {
        self.exports.borrow().get(name).cloned()
    }

    pub fn set_export(&self, name: &str, value: Value) {
        self.exports.borrow_mut().insert(Rc::from(name), value);
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Type")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("rank", &self.rank)
            .finish()
    }
}

/// Owns every type known to a runtime.
pub struct TypeRegistry {
    types: RefCell<Vec<Rc<Type>>>,
    by_name: RefCell<FxHashMap<Rc<str>, Rc<Type>>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            types: RefCell::new(Vec::new()),
            by_name: RefCell::new(FxHashMap::default()),
        }
    }

    /// Register a type. `any` is implied as an ancestor; the first type
    /// registered becomes the root itself.
    pub fn define(&self, name: &str, parents: &[Rc<Type>]) -> Rc<Type> {
        let mut types = self.types.borrow_mut();
        let id = types.len();
        let mut ancestry = vec![id];
        let mut rank = 0;
        for parent in parents {
            rank = rank.max(parent.rank);
            for ancestor in &parent.ancestry {
                if !ancestry.contains(ancestor) {
                    ancestry.push(*ancestor);
                }
            }
        }
        if let Some(root) = types.first() {
            rank = rank.max(root.rank);
            if !ancestry.contains(&root.id) {
                ancestry.push(root.id);
            }
        }
        let ty = Rc::new(Type {
            id,
            name: Rc::from(name),
            ancestry,
            rank: rank + 1,
            exports: RefCell::new(FxHashMap::default()),
            constructor: OnceCell::new(),
        });
        types.push(ty.clone());
        self.by_name.borrow_mut().insert(ty.name.clone(), ty.clone());
        ty
    }

    pub fn get(&self, name: &str) -> Option<Rc<Type>> {
        self.by_name.borrow().get(name).cloned()
    }

    pub fn by_id(&self, id: TypeId) -> Option<Rc<Type>> {
        self.types.borrow().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.types.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.borrow().is_empty()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Handles to the builtin type DAG.
pub struct BuiltinTypes {
    pub any: Rc<Type>,
    pub type_: Rc<Type>,
    pub function: Rc<Type>,
    pub iteratable: Rc<Type>,
    pub nil: Rc<Type>,
    pub some: Rc<Type>,
    pub blank: Rc<Type>,
    pub boolean: Rc<Type>,
    pub number: Rc<Type>,
    pub integer: Rc<Type>,
    pub real: Rc<Type>,
    pub string: Rc<Type>,
    pub regex: Rc<Type>,
    pub method: Rc<Type>,
    pub native: Rc<Type>,
    pub list: Rc<Type>,
    pub names: Rc<Type>,
    pub map: Rc<Type>,
    pub tuple: Rc<Type>,
    pub variable: Rc<Type>,
    pub list_node: Rc<Type>,
    pub map_node: Rc<Type>,
    pub map_index: Rc<Type>,
    pub global: Rc<Type>,
    pub uninitialized: Rc<Type>,
    pub closure: Rc<Type>,
    pub frame: Rc<Type>,
    pub partial: Rc<Type>,
    pub chained: Rc<Type>,
    pub chained_state: Rc<Type>,
    pub range: Rc<Type>,
    pub range_iter: Rc<Type>,
    pub string_iter: Rc<Type>,
    pub string_buffer: Rc<Type>,
    pub error: Rc<Type>,
    pub error_value: Rc<Type>,
    pub module: Rc<Type>,
    pub array: Rc<Type>,
    pub array_kinds: Vec<Rc<Type>>,
}

impl BuiltinTypes {
    /// Register the builtin DAG. Must run against an empty registry so that
    /// `any` ends up as the root.
    pub fn register(registry: &TypeRegistry) -> Self {
        let any = registry.define("any", &[]);
        let type_ = registry.define("type", &[]);
        let function = registry.define("function", &[]);
        let iteratable = registry.define("iteratable", &[]);
        let number = registry.define("number", &[function.clone()]);
        let string = registry.define("string", &[iteratable.clone()]);
        let list = registry.define("list", &[iteratable.clone()]);
        let array = registry.define("array", &[]);
        let array_kinds = ArrayKind::ALL
            .iter()
            .map(|kind| registry.define(&format!("array::{}", kind.name()), &[array.clone()]))
            .collect();
        Self {
            nil: registry.define("nil", &[]),
            some: registry.define("some", &[]),
            blank: registry.define("blank", &[]),
            boolean: registry.define("boolean", &[]),
            integer: registry.define("integer", &[number.clone()]),
            real: registry.define("real", &[number.clone()]),
            regex: registry.define("regex", &[]),
            method: registry.define("method", &[function.clone()]),
            native: registry.define("native", &[function.clone()]),
            names: registry.define("names", &[list.clone()]),
            map: registry.define("map", &[iteratable.clone()]),
            tuple: registry.define("tuple", &[]),
            variable: registry.define("variable", &[]),
            list_node: registry.define("list-node", &[]),
            map_node: registry.define("map-node", &[]),
            map_index: registry.define("map-index", &[]),
            global: registry.define("global", &[]),
            uninitialized: registry.define("uninitialized", &[]),
            closure: registry.define("closure", &[function.clone(), iteratable.clone()]),
            frame: registry.define("frame", &[function.clone()]),
            partial: registry.define("partial-function", &[function.clone()]),
            chained: registry.define("chained-function", &[function.clone(), iteratable.clone()]),
            chained_state: registry.define("chained-state", &[]),
            range: registry.define("range", &[iteratable.clone()]),
            range_iter: registry.define("range-iter", &[]),
            string_iter: registry.define("string-iter", &[]),
            string_buffer: registry.define("stringbuffer", &[]),
            error: registry.define("error", &[]),
            error_value: registry.define("error-value", &[]),
            module: registry.define("module", &[]),
            any,
            type_,
            function,
            iteratable,
            number,
            string,
            list,
            array,
            array_kinds,
        }
    }

    /// Every builtin handle, for publishing as globals.
    pub fn all(&self) -> Vec<Rc<Type>> {
        let mut all = vec![
            self.any.clone(),
            self.type_.clone(),
            self.function.clone(),
            self.iteratable.clone(),
            self.nil.clone(),
            self.some.clone(),
            self.blank.clone(),
            self.boolean.clone(),
            self.number.clone(),
            self.integer.clone(),
            self.real.clone(),
            self.string.clone(),
            self.regex.clone(),
            self.method.clone(),
            self.native.clone(),
            self.list.clone(),
            self.names.clone(),
            self.map.clone(),
            self.tuple.clone(),
            self.variable.clone(),
            self.list_node.clone(),
            self.map_node.clone(),
            self.map_index.clone(),
            self.global.clone(),
            self.uninitialized.clone(),
            self.closure.clone(),
            self.frame.clone(),
            self.partial.clone(),
            self.chained.clone(),
            self.chained_state.clone(),
            self.range.clone(),
            self.range_iter.clone(),
            self.string_iter.clone(),
            self.string_buffer.clone(),
            self.error.clone(),
            self.error_value.clone(),
            self.module.clone(),
            self.array.clone(),
        ];
        all.extend(self.array_kinds.iter().cloned());
        all
    }

    pub fn type_of(&self, value: &Value) -> Rc<Type> {
        let ty = match value {
            Value::Nil | Value::Unset => &self.nil,
            Value::Some => &self.some,
            Value::Blank => &self.blank,
            Value::Boolean(_) => &self.boolean,
            Value::Integer(_) => &self.integer,
            Value::Real(_) => &self.real,
            Value::String(_) => &self.string,
            Value::Regex(_) => &self.regex,
            Value::Type(_) => &self.type_,
            Value::Method(_) => &self.method,
            Value::Native(_) => &self.native,
            Value::List(_) => &self.list,
            Value::Names(_) => &self.names,
            Value::Map(_) => &self.map,
            Value::Tuple(_) => &self.tuple,
            Value::Variable(_) => &self.variable,
            Value::ListSlot { .. } => &self.list_node,
            Value::MapNode(_) => &self.map_node,
            Value::MapIndex(_) => &self.map_index,
            Value::Global(_) => &self.global,
            Value::Uninitialized(_) => &self.uninitialized,
            Value::Closure(_) => &self.closure,
            Value::Frame(_) => &self.frame,
            Value::Partial(_) => &self.partial,
            Value::Chained(_) => &self.chained,
            Value::ChainState(_) => &self.chained_state,
            Value::Range(..) => &self.range,
            Value::RangeIter { .. } => &self.range_iter,
            Value::StringIter(_) => &self.string_iter,
            Value::StringBuffer(_) => &self.string_buffer,
            Value::Error(_) => &self.error,
            Value::ErrorValue(_) => &self.error_value,
            Value::Module(_) => &self.module,
            Value::Object(object) => return object.ty().clone(),
            Value::Array(array) => &self.array_kinds[array.kind() as usize],
        };
        ty.clone()
    }
}
