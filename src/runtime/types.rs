use super::Realm;
use super::gc::Tracer;
use crate::error::JsError;
use crate::types::{JsObject, JsString, JsValue};
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub type EnvRef = Rc<RefCell<Environment>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Block,
    Function,
    Global,
}

/// One scope in the chain. `var`-style and lexical bindings are kept in
/// separate records so a `let` can shadow a `var` of the same name.
#[derive(Debug)]
pub struct Environment {
    pub(crate) lexical: FxHashMap<String, Binding>,
    pub(crate) vars: FxHashMap<String, Binding>,
    pub(crate) parent: Option<EnvRef>,
    pub scope: ScopeKind,
    /// Names whose var binding exists only because of Annex B block-function
    /// hoisting.
    pub(crate) annex_b_names: FxHashSet<String>,
    pub(crate) global_object: Option<JsObject>,
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub value: JsValue,
    pub mutable: bool,
    pub kind: BindingKind,
    pub initialized: bool,
}

impl Binding {
    pub(crate) fn new(kind: BindingKind, value: JsValue) -> Self {
        Self {
            value,
            mutable: kind != BindingKind::Const,
            kind,
            initialized: true,
        }
    }

    pub(crate) fn uninitialized(kind: BindingKind) -> Self {
        Self {
            initialized: false,
            ..Self::new(kind, JsValue::Undefined)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Var,
    Let,
    Const,
    Function,
}

/// A stored own property.
#[derive(Debug, Clone)]
pub enum Property {
    Data {
        value: JsValue,
        writable: bool,
        enumerable: bool,
        configurable: bool,
    },
    Accessor {
        get: Option<JsValue>,
        set: Option<JsValue>,
        enumerable: bool,
        configurable: bool,
    },
}

impl Property {
    pub fn data(value: JsValue, writable: bool, enumerable: bool, configurable: bool) -> Self {
        Property::Data {
            value,
            writable,
            enumerable,
            configurable,
        }
    }

    /// Writable, enumerable and configurable: what plain assignment creates.
    pub fn data_default(value: JsValue) -> Self {
        Self::data(value, true, true, true)
    }

    /// Writable and configurable but hidden from enumeration.
    pub fn builtin(value: JsValue) -> Self {
        Self::data(value, true, false, true)
    }

    pub fn is_accessor(&self) -> bool {
        matches!(self, Property::Accessor { .. })
    }

    pub fn enumerable(&self) -> bool {
        match self {
            Property::Data { enumerable, .. } | Property::Accessor { enumerable, .. } => *enumerable,
        }
    }

    pub fn configurable(&self) -> bool {
        match self {
            Property::Data { configurable, .. } | Property::Accessor { configurable, .. } => {
                *configurable
            }
        }
    }

    pub fn value(&self) -> Option<&JsValue> {
        match self {
            Property::Data { value, .. } => Some(value),
            Property::Accessor { .. } => None,
        }
    }

    pub(crate) fn trace(&self, tracer: &mut Tracer) {
        match self {
            Property::Data { value, .. } => tracer.mark_value(value),
            Property::Accessor { get, set, .. } => {
                for v in get.iter().chain(set.iter()) {
                    tracer.mark_value(v);
                }
            }
        }
    }
}

/// Partial property description, as passed to `define_property`. Absent
/// fields keep the current attribute or fall back to `false`/`undefined`.
#[derive(Debug, Clone, Default)]
pub struct PropertyDescriptor {
    pub value: Option<JsValue>,
    pub writable: Option<bool>,
    pub get: Option<JsValue>,
    pub set: Option<JsValue>,
    pub enumerable: Option<bool>,
    pub configurable: Option<bool>,
}

impl PropertyDescriptor {
    pub fn data(value: JsValue, writable: bool, enumerable: bool, configurable: bool) -> Self {
        Self {
            value: Some(value),
            writable: Some(writable),
            get: None,
            set: None,
            enumerable: Some(enumerable),
            configurable: Some(configurable),
        }
    }

    pub fn data_default(value: JsValue) -> Self {
        Self::data(value, true, true, true)
    }

    pub fn accessor(
        get: Option<JsValue>,
        set: Option<JsValue>,
        enumerable: bool,
        configurable: bool,
    ) -> Self {
        Self {
            value: None,
            writable: None,
            get,
            set,
            enumerable: Some(enumerable),
            configurable: Some(configurable),
        }
    }

    pub fn is_data_descriptor(&self) -> bool {
        self.value.is_some() || self.writable.is_some()
    }

    pub fn is_accessor_descriptor(&self) -> bool {
        self.get.is_some() || self.set.is_some()
    }

    /// Completes this descriptor against the property it replaces.
    pub fn into_property(self, current: Option<&Property>) -> Property {
        let enumerable = self
            .enumerable
            .unwrap_or_else(|| current.is_some_and(Property::enumerable));
        let configurable = self
            .configurable
            .unwrap_or_else(|| current.is_some_and(Property::configurable));

        if self.is_accessor_descriptor() {
            let (cur_get, cur_set) = match current {
                Some(Property::Accessor { get, set, .. }) => (get.clone(), set.clone()),
                _ => (None, None),
            };
            return Property::Accessor {
                get: self.get.or(cur_get),
                set: self.set.or(cur_set),
                enumerable,
                configurable,
            };
        }

        match current {
            Some(Property::Accessor { get, set, .. }) if !self.is_data_descriptor() => {
                Property::Accessor {
                    get: get.clone(),
                    set: set.clone(),
                    enumerable,
                    configurable,
                }
            }
            Some(Property::Data {
                value, writable, ..
            }) => Property::Data {
                value: self.value.unwrap_or_else(|| value.clone()),
                writable: self.writable.unwrap_or(*writable),
                enumerable,
                configurable,
            },
            _ => Property::Data {
                value: self.value.unwrap_or(JsValue::Undefined),
                writable: self.writable.unwrap_or(false),
                enumerable,
                configurable,
            },
        }
    }
}

impl From<&Property> for PropertyDescriptor {
    fn from(prop: &Property) -> Self {
        match prop {
            Property::Data {
                value,
                writable,
                enumerable,
                configurable,
            } => Self::data(value.clone(), *writable, *enumerable, *configurable),
            Property::Accessor {
                get,
                set,
                enumerable,
                configurable,
            } => Self::accessor(get.clone(), set.clone(), *enumerable, *configurable),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Ordinary,
    Array,
    Function,
    RegExp,
    Date,
    Error,
    Map,
    Set,
    WeakMap,
    WeakSet,
    Promise,
    Iterator,
    Generator,
    Proxy,
}

impl ObjectKind {
    pub fn class_name(self) -> &'static str {
        match self {
            ObjectKind::Ordinary => "Object",
            ObjectKind::Array => "Array",
            ObjectKind::Function => "Function",
            ObjectKind::RegExp => "RegExp",
            ObjectKind::Date => "Date",
            ObjectKind::Error => "Error",
            ObjectKind::Map => "Map",
            ObjectKind::Set => "Set",
            ObjectKind::WeakMap => "WeakMap",
            ObjectKind::WeakSet => "WeakSet",
            ObjectKind::Promise => "Promise",
            ObjectKind::Iterator => "Iterator",
            ObjectKind::Generator => "Generator",
            ObjectKind::Proxy => "Proxy",
        }
    }
}

/// Behaviour behind a function object's `[[Call]]` or `[[Construct]]`.
///
/// Implementations that capture values or environments must report them from
/// [`Callable::trace`] so the collector keeps them alive.
pub trait Callable {
    fn call(&self, realm: &mut Realm, this: &JsValue, args: &[JsValue]) -> Result<JsValue, JsError>;

    fn trace(&self, _tracer: &mut Tracer) {}
}

impl<F> Callable for F
where
    F: Fn(&mut Realm, &JsValue, &[JsValue]) -> Result<JsValue, JsError>,
{
    fn call(&self, realm: &mut Realm, this: &JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
        self(realm, this, args)
    }
}

#[derive(Clone)]
pub struct JsFunction {
    pub name: String,
    pub arity: usize,
    pub behavior: Rc<dyn Callable>,
}

impl JsFunction {
    pub fn new(name: impl Into<String>, arity: usize, behavior: impl Callable + 'static) -> Self {
        Self {
            name: name.into(),
            arity,
            behavior: Rc::new(behavior),
        }
    }

    pub fn native(
        name: impl Into<String>,
        arity: usize,
        f: impl Fn(&mut Realm, &JsValue, &[JsValue]) -> Result<JsValue, JsError> + 'static,
    ) -> Self {
        Self::new(name, arity, f)
    }
}

impl fmt::Debug for JsFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JsFunction({:?}, {})", self.name, self.arity)
    }
}

/// Lazy producer behind an iterator object: `Ok(None)` signals exhaustion.
///
/// Producers are opaque to the collector; objects they need must also be
/// stored in the iterator's slots.
pub type NextFn = Rc<RefCell<dyn FnMut(&mut Realm) -> Result<Option<JsValue>, JsError>>>;

pub struct JsObjectData {
    pub id: JsObject,
    pub kind: ObjectKind,
    /// Keyed by the full UTF-16 key so lone surrogates stay distinct.
    pub properties: IndexMap<JsString, Property>,
    pub prototype: Option<JsObject>,
    pub callable: Option<JsFunction>,
    pub constructor: Option<JsFunction>,
    /// Kind-specific hidden state (`[[ErrorData]]`, `[[DateValue]]`, ...).
    pub slots: FxHashMap<&'static str, JsValue>,
    pub array_elements: Option<Vec<JsValue>>,
    pub iterator_next: Option<NextFn>,
    pub extensible: bool,
    /// Set on the global object: the environment whose var bindings mirror
    /// this object's properties.
    pub(crate) global_env: Option<EnvRef>,
}

impl JsObjectData {
    pub(crate) fn new(kind: ObjectKind, prototype: Option<JsObject>) -> Self {
        Self {
            id: JsObject { id: 0 },
            kind,
            properties: IndexMap::new(),
            prototype,
            callable: None,
            constructor: None,
            slots: FxHashMap::default(),
            array_elements: None,
            iterator_next: None,
            extensible: true,
            global_env: None,
        }
    }

    pub fn is_callable(&self) -> bool {
        self.callable.is_some()
    }

    pub fn is_array(&self) -> bool {
        self.kind == ObjectKind::Array
    }

    /// Index elements and `length` of array-kind objects.
    pub(crate) fn array_own(&self, key: &JsString) -> Option<Property> {
        let elems = self.array_elements.as_ref()?;
        if *key == "length" {
            return Some(Property::data(
                JsValue::Number(elems.len() as f64),
                true,
                false,
                false,
            ));
        }
        let idx = key.array_index()?;
        elems.get(idx).map(|v| Property::data_default(v.clone()))
    }

    pub fn get_own_property(&self, key: &JsString) -> Option<Property> {
        self.properties
            .get(key)
            .cloned()
            .or_else(|| self.array_own(key))
    }

    pub fn has_own_property(&self, key: &JsString) -> bool {
        self.properties.contains_key(key) || self.array_own(key).is_some()
    }

    pub fn insert_property(&mut self, key: impl Into<JsString>, prop: Property) {
        self.properties.insert(key.into(), prop);
    }

    pub fn insert_builtin(&mut self, key: impl Into<JsString>, value: JsValue) {
        self.insert_property(key, Property::builtin(value));
    }

    pub(crate) fn trace(&self, tracer: &mut Tracer) {
        if let Some(proto) = self.prototype {
            tracer.mark_object(proto);
        }
        for prop in self.properties.values() {
            prop.trace(tracer);
        }
        if let Some(elems) = &self.array_elements {
            for v in elems {
                tracer.mark_value(v);
            }
        }
        for v in self.slots.values() {
            tracer.mark_value(v);
        }
        for func in self.callable.iter().chain(self.constructor.iter()) {
            func.behavior.trace(tracer);
        }
        if let Some(env) = &self.global_env {
            tracer.mark_env(env);
        }
    }
}

impl fmt::Debug for JsObjectData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsObjectData")
            .field("id", &self.id.id)
            .field("kind", &self.kind)
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .field("prototype", &self.prototype.map(|p| p.id))
            .field("callable", &self.callable)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_keeps_unspecified_attributes() {
        let current = Property::data(JsValue::Number(1.0), true, false, true);
        let updated = PropertyDescriptor {
            value: Some(JsValue::Number(2.0)),
            ..Default::default()
        }
        .into_property(Some(&current));
        let Property::Data {
            value,
            writable,
            enumerable,
            configurable,
        } = updated
        else {
            panic!("expected data property");
        };
        assert!(matches!(value, JsValue::Number(n) if n == 2.0));
        assert!(writable);
        assert!(!enumerable);
        assert!(configurable);
    }

    #[test]
    fn fresh_descriptor_defaults_to_false() {
        let prop = PropertyDescriptor {
            value: Some(JsValue::Null),
            ..Default::default()
        }
        .into_property(None);
        assert!(!prop.enumerable());
        assert!(!prop.configurable());
        assert!(matches!(prop, Property::Data { writable: false, .. }));
    }

    #[test]
    fn accessor_descriptor_replaces_data() {
        let current = Property::data_default(JsValue::Number(1.0));
        let prop = PropertyDescriptor {
            get: Some(JsValue::Undefined),
            ..Default::default()
        }
        .into_property(Some(&current));
        assert!(prop.is_accessor());
        assert!(prop.enumerable());
    }

    #[test]
    fn array_elements_are_own_properties() {
        let mut data = JsObjectData::new(ObjectKind::Array, None);
        data.array_elements = Some(vec![JsValue::TRUE, JsValue::Null]);
        assert!(data.has_own_property(&"1".into()));
        assert!(!data.has_own_property(&"2".into()));
        let length = data.get_own_property(&"length".into()).and_then(|p| p.value().cloned());
        assert!(matches!(length, Some(JsValue::Number(n)) if n == 2.0));
        assert!(!data.get_own_property(&"length".into()).is_some_and(|p| p.enumerable()));
    }

    #[test]
    fn const_bindings_are_immutable() {
        assert!(!Binding::new(BindingKind::Const, JsValue::Null).mutable);
        assert!(Binding::new(BindingKind::Let, JsValue::Null).mutable);
        assert!(!Binding::uninitialized(BindingKind::Let).initialized);
    }
}
