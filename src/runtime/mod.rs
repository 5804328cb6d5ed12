//! Runtime semantic core: the object heap, property access, coercions and
//! the scope chain. Everything hangs off a [`Realm`], which owns one global
//! object/environment pair; independent realms never share objects.

use crate::error::{ErrorKind, JsError};
use crate::types::{JsObject, JsString, JsSymbol, JsValue, number_ops};
use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::RefCell;
use std::rc::Rc;

mod types;
pub use types::*;

mod helpers;
pub use helpers::*;
mod environment;
mod gc;
pub use gc::Tracer;
mod object;

pub(crate) const GC_THRESHOLD: usize = 4096;
pub(crate) const MAX_PROTOTYPE_DEPTH: usize = 10_000;

#[derive(Debug, Clone)]
pub struct RealmOptions {
    /// Strict code: no Annex B block-function hoisting.
    pub strict: bool,
    pub annex_b: bool,
    /// Allocations between automatic collections in [`Realm::maybe_gc`].
    pub gc_threshold: usize,
    /// Longest prototype chain any lookup will walk.
    pub max_prototype_depth: usize,
}

impl Default for RealmOptions {
    fn default() -> Self {
        Self {
            strict: false,
            annex_b: true,
            gc_threshold: GC_THRESHOLD,
            max_prototype_depth: MAX_PROTOTYPE_DEPTH,
        }
    }
}

pub struct Realm {
    global_env: EnvRef,
    global_object: JsObject,
    objects: Vec<Option<Rc<RefCell<JsObjectData>>>>,
    object_prototype: JsObject,
    function_prototype: JsObject,
    array_prototype: JsObject,
    iterator_prototype: JsObject,
    error_prototypes: FxHashMap<ErrorKind, JsObject>,
    next_symbol_id: u64,
    free_list: Vec<usize>,
    gc_alloc_count: usize,
    /// Arrays currently being joined by `to_string`.
    join_stack: Vec<JsObject>,
    options: RealmOptions,
}

impl Default for Realm {
    fn default() -> Self {
        Self::new()
    }
}

impl Realm {
    pub fn new() -> Self {
        Self::with_options(RealmOptions::default())
    }

    pub fn with_options(options: RealmOptions) -> Self {
        let placeholder = JsObject { id: 0 };
        let mut realm = Self {
            global_env: Environment::new_global(),
            global_object: placeholder,
            objects: Vec::new(),
            object_prototype: placeholder,
            function_prototype: placeholder,
            array_prototype: placeholder,
            iterator_prototype: placeholder,
            error_prototypes: FxHashMap::default(),
            next_symbol_id: 1,
            free_list: Vec::new(),
            gc_alloc_count: 0,
            join_stack: Vec::new(),
            options,
        };
        realm.setup_intrinsics();
        realm
    }

    fn setup_intrinsics(&mut self) {
        self.object_prototype =
            self.allocate_object_slot(JsObjectData::new(ObjectKind::Ordinary, None));
        let root = Some(self.object_prototype);

        // Function.prototype is itself callable and returns undefined
        let mut function_proto = JsObjectData::new(ObjectKind::Function, root);
        function_proto.callable = Some(JsFunction::native("", 0, |_, _, _| {
            Ok(JsValue::Undefined)
        }));
        self.function_prototype = self.allocate_object_slot(function_proto);

        let mut array_proto = JsObjectData::new(ObjectKind::Array, root);
        array_proto.array_elements = Some(Vec::new());
        self.array_prototype = self.allocate_object_slot(array_proto);

        self.iterator_prototype =
            self.allocate_object_slot(JsObjectData::new(ObjectKind::Ordinary, root));

        let error_proto = self.allocate_error_prototype(ErrorKind::Error, root);
        for kind in [
            ErrorKind::SyntaxError,
            ErrorKind::ReferenceError,
            ErrorKind::TypeError,
            ErrorKind::RangeError,
        ] {
            self.allocate_error_prototype(kind, Some(error_proto));
        }

        let global = self.allocate_object_slot(JsObjectData::new(ObjectKind::Ordinary, root));
        let env = self.global_env.clone();
        self.set_global_object(&env, global);
        if let Some(data) = self.get_object(global) {
            let mut data = data.borrow_mut();
            for (name, value) in [
                ("undefined", JsValue::Undefined),
                ("NaN", JsValue::NAN),
                ("Infinity", JsValue::INFINITY),
            ] {
                data.insert_property(name, Property::data(value, false, false, false));
            }
        }
        self.define_builtin("globalThis", JsValue::Object(global));
    }

    fn allocate_error_prototype(&mut self, kind: ErrorKind, proto: Option<JsObject>) -> JsObject {
        let mut data = JsObjectData::new(ObjectKind::Ordinary, proto);
        data.insert_builtin("name", JsValue::string(kind.name()));
        data.insert_builtin("message", JsValue::EMPTY_STRING);
        let id = self.allocate_object_slot(data);
        self.error_prototypes.insert(kind, id);
        id
    }

    pub fn options(&self) -> &RealmOptions {
        &self.options
    }

    pub fn global_env(&self) -> EnvRef {
        self.global_env.clone()
    }

    pub fn global_object(&self) -> JsObject {
        self.global_object
    }

    pub fn object_prototype(&self) -> JsObject {
        self.object_prototype
    }

    pub fn function_prototype(&self) -> JsObject {
        self.function_prototype
    }

    pub fn array_prototype(&self) -> JsObject {
        self.array_prototype
    }

    pub fn iterator_prototype(&self) -> JsObject {
        self.iterator_prototype
    }

    pub fn error_prototype(&self, kind: ErrorKind) -> JsObject {
        self.error_prototypes
            .get(&kind)
            .copied()
            .unwrap_or(self.object_prototype)
    }

    pub(crate) fn intrinsics(&self) -> Vec<JsObject> {
        let mut roots = vec![
            self.object_prototype,
            self.function_prototype,
            self.array_prototype,
            self.iterator_prototype,
        ];
        roots.extend(self.error_prototypes.values().copied());
        roots
    }

    pub fn get_object(&self, obj: JsObject) -> Option<Rc<RefCell<JsObjectData>>> {
        self.objects.get(obj.id as usize).and_then(|slot| slot.clone())
    }

    pub(crate) fn object(&self, obj: JsObject) -> Result<Rc<RefCell<JsObjectData>>, JsError> {
        self.get_object(obj)
            .ok_or_else(|| JsError::type_error(format!("object #{} has been collected", obj.id)))
    }

    pub fn create_object(&mut self) -> JsObject {
        self.create_object_with_proto(Some(self.object_prototype))
    }

    pub fn create_object_with_proto(&mut self, proto: Option<JsObject>) -> JsObject {
        self.create_object_of_kind(ObjectKind::Ordinary, proto)
    }

    pub fn create_object_of_kind(&mut self, kind: ObjectKind, proto: Option<JsObject>) -> JsObject {
        self.allocate_object_slot(JsObjectData::new(kind, proto))
    }

    pub fn create_array(&mut self, elements: Vec<JsValue>) -> JsObject {
        let mut data = JsObjectData::new(ObjectKind::Array, Some(self.array_prototype));
        data.array_elements = Some(elements);
        self.allocate_object_slot(data)
    }

    pub fn create_function(&mut self, func: JsFunction) -> JsObject {
        let mut data = JsObjectData::new(ObjectKind::Function, Some(self.function_prototype));
        data.insert_property(
            "length",
            Property::data(JsValue::Number(func.arity as f64), false, false, true),
        );
        data.insert_property(
            "name",
            Property::data(JsValue::string(&func.name), false, false, true),
        );
        data.callable = Some(func);
        self.allocate_object_slot(data)
    }

    /// Function object with both `[[Call]]` and `[[Construct]]`, plus a fresh
    /// `prototype` object whose `constructor` points back at it.
    pub fn create_constructor(&mut self, call: JsFunction, construct: JsFunction) -> JsObject {
        let func = self.create_function(call);
        let proto = self.create_object();
        if let Some(data) = self.get_object(proto) {
            data.borrow_mut()
                .insert_builtin("constructor", JsValue::Object(func));
        }
        if let Some(data) = self.get_object(func) {
            let mut data = data.borrow_mut();
            data.insert_property(
                "prototype",
                Property::data(JsValue::Object(proto), true, false, false),
            );
            data.constructor = Some(construct);
        }
        func
    }

    pub fn create_error(&mut self, kind: ErrorKind, message: &str) -> JsObject {
        let mut data = JsObjectData::new(ObjectKind::Error, Some(self.error_prototype(kind)));
        data.insert_builtin("message", JsValue::string(message));
        data.slots.insert("ErrorData", JsValue::string(kind.name()));
        self.allocate_object_slot(data)
    }

    /// The value the evaluator should throw for `err`.
    pub fn error_value(&mut self, err: &JsError) -> JsValue {
        match err.category() {
            Some(kind) => JsValue::Object(self.create_error(kind, &err.message())),
            None => match err {
                JsError::Thrown(value) => value.clone(),
                _ => JsValue::Undefined,
            },
        }
    }

    pub fn create_iterator<F>(&mut self, next: F) -> JsObject
    where
        F: FnMut(&mut Realm) -> Result<Option<JsValue>, JsError> + 'static,
    {
        let next: NextFn = Rc::new(RefCell::new(next));
        let mut data = JsObjectData::new(ObjectKind::Iterator, Some(self.iterator_prototype));
        data.iterator_next = Some(next);
        self.allocate_object_slot(data)
    }

    pub fn new_symbol(&mut self, description: Option<&str>) -> JsSymbol {
        let id = self.next_symbol_id;
        self.next_symbol_id += 1;
        JsSymbol {
            id,
            description: description.map(JsString::from_str),
        }
    }
}
