use super::*;

/// Index writes further than this past the end of a dense array are stored
/// as ordinary properties instead of growing the element vector.
const MAX_DENSE_GAP: usize = 1 << 16;

enum Lookup {
    Found(JsValue),
    Getter(JsValue),
    Proto(Option<JsObject>),
}

enum SetOutcome {
    Stored,
    Ignored,
    Setter(Option<JsValue>),
}

impl Realm {
    fn prototype_depth_error(&self) -> JsError {
        JsError::range_error(format!(
            "Maximum prototype chain length ({}) exceeded",
            self.options.max_prototype_depth
        ))
    }

    /// `[[Get]]` with the object itself as receiver.
    pub fn get(&mut self, obj: JsObject, key: impl Into<JsString>) -> Result<JsValue, JsError> {
        self.get_with_receiver(obj, key, &JsValue::Object(obj))
    }

    /// Looks `key` up along the prototype chain. Getters run with `receiver`
    /// as `this`; the object borrow is released before the call so getters
    /// may mutate the object they are read from.
    pub fn get_with_receiver(
        &mut self,
        obj: JsObject,
        key: impl Into<JsString>,
        receiver: &JsValue,
    ) -> Result<JsValue, JsError> {
        let key = key.into();
        let mut current = Some(obj);
        let mut depth = 0;
        while let Some(id) = current {
            if depth > self.options.max_prototype_depth {
                return Err(self.prototype_depth_error());
            }
            depth += 1;
            let step = {
                let data = self.object(id)?;
                let data = data.borrow();
                match data.get_own_property(&key) {
                    Some(Property::Data { value, .. }) => Lookup::Found(value),
                    Some(Property::Accessor { get: Some(getter), .. }) => Lookup::Getter(getter),
                    Some(Property::Accessor { get: None, .. }) => Lookup::Found(JsValue::Undefined),
                    None => Lookup::Proto(data.prototype),
                }
            };
            match step {
                Lookup::Found(value) => return Ok(value),
                Lookup::Getter(getter) => return self.call(&getter, receiver, &[]),
                Lookup::Proto(proto) => current = proto,
            }
        }
        Ok(JsValue::Undefined)
    }

    /// Simplified `[[Set]]`: only own properties are consulted, so an
    /// inherited setter or read-only property never intercepts the write.
    /// Non-writable targets and non-extensible objects ignore it silently.
    pub fn set(&mut self, obj: JsObject, key: impl Into<JsString>, value: JsValue) -> Result<(), JsError> {
        let key = key.into();
        let rc = self.object(obj)?;
        let outcome = {
            let mut data = rc.borrow_mut();
            let outcome = match data.properties.get_mut(&key) {
                Some(Property::Accessor { set, .. }) => SetOutcome::Setter(set.clone()),
                Some(Property::Data {
                    value: slot,
                    writable,
                    ..
                }) => {
                    if *writable {
                        *slot = value.clone();
                        SetOutcome::Stored
                    } else {
                        SetOutcome::Ignored
                    }
                }
                None => set_absent(&mut data, &key, &value)?,
            };
            if let SetOutcome::Stored = outcome {
                self.sync_global_binding(&data, &key);
            }
            outcome
        };
        if let SetOutcome::Setter(Some(setter)) = outcome {
            self.call(&setter, &JsValue::Object(obj), &[value])?;
        }
        Ok(())
    }

    /// Replaces the own property `key`, bypassing accessors and attribute
    /// checks. Attributes missing from `desc` keep their current values.
    pub fn define_property(
        &mut self,
        obj: JsObject,
        key: impl Into<JsString>,
        desc: PropertyDescriptor,
    ) -> Result<(), JsError> {
        let key = key.into();
        let rc = self.object(obj)?;
        let mut data = rc.borrow_mut();
        if !desc.is_accessor_descriptor() && !data.properties.contains_key(&key) {
            let is_plain = desc.writable != Some(false)
                && desc.enumerable != Some(false)
                && desc.configurable != Some(false);
            if let Some(elems) = data.array_elements.as_mut() {
                if key == "length" {
                    if let Some(v) = &desc.value {
                        let len = array_length(v, elems.len())?;
                        elems.resize(len, JsValue::Undefined);
                    }
                    return Ok(());
                }
                if let Some(idx) = key.array_index()
                    && idx < elems.len()
                    && is_plain
                {
                    if let Some(v) = desc.value {
                        elems[idx] = v;
                    }
                    return Ok(());
                }
            }
        }
        let current = data.get_own_property(&key);
        let prop = desc.into_property(current.as_ref());
        data.properties.insert(key.clone(), prop);
        self.sync_global_binding(&data, &key);
        Ok(())
    }

    pub fn get_own_property(
        &self,
        obj: JsObject,
        key: impl Into<JsString>,
    ) -> Result<Option<Property>, JsError> {
        Ok(self.object(obj)?.borrow().get_own_property(&key.into()))
    }

    pub fn has_own_property(&self, obj: JsObject, key: impl Into<JsString>) -> Result<bool, JsError> {
        Ok(self.object(obj)?.borrow().has_own_property(&key.into()))
    }

    pub fn has_property(&self, obj: JsObject, key: impl Into<JsString>) -> Result<bool, JsError> {
        let key = key.into();
        let mut current = Some(obj);
        let mut depth = 0;
        while let Some(id) = current {
            if depth > self.options.max_prototype_depth {
                return Err(self.prototype_depth_error());
            }
            depth += 1;
            let data = self.object(id)?;
            let data = data.borrow();
            if data.has_own_property(&key) {
                return Ok(true);
            }
            current = data.prototype;
        }
        Ok(false)
    }

    /// Removes an own property. Returns `false` (and leaves it in place) for
    /// non-configurable properties. Deleting an array element leaves an
    /// `undefined` in its slot.
    pub fn delete_property(&mut self, obj: JsObject, key: impl Into<JsString>) -> Result<bool, JsError> {
        let key = key.into();
        let rc = self.object(obj)?;
        let mut data = rc.borrow_mut();
        match data.properties.get(&key) {
            Some(prop) if !prop.configurable() => return Ok(false),
            Some(_) => {
                data.properties.shift_remove(&key);
                self.unlink_global_binding(&data, &key);
                return Ok(true);
            }
            None => {}
        }
        if let Some(elems) = data.array_elements.as_mut() {
            if key == "length" {
                return Ok(false);
            }
            if let Some(idx) = key.array_index()
                && idx < elems.len()
            {
                elems[idx] = JsValue::Undefined;
            }
        }
        Ok(true)
    }

    /// Own keys: integer indices ascending, then the remaining keys in
    /// insertion order (`length` first for arrays). Keys come back exactly as
    /// stored, lone surrogates included.
    pub fn own_keys(&self, obj: JsObject) -> Result<Vec<JsString>, JsError> {
        let data = self.object(obj)?;
        let data = data.borrow();
        let mut indices: Vec<usize> = data
            .array_elements
            .as_ref()
            .map(|elems| (0..elems.len()).collect())
            .unwrap_or_default();
        indices.extend(data.properties.keys().filter_map(JsString::array_index));
        indices.sort_unstable();
        indices.dedup();

        let mut keys: Vec<JsString> = indices
            .into_iter()
            .map(|i| JsString::from(i.to_string()))
            .collect();
        let length = JsString::from("length");
        if data.array_elements.is_some() && !data.properties.contains_key(&length) {
            keys.push(length);
        }
        keys.extend(
            data.properties
                .keys()
                .filter(|k| k.array_index().is_none())
                .cloned(),
        );
        Ok(keys)
    }

    /// Returns `false` when the change would close a prototype cycle or the
    /// object is non-extensible.
    pub fn set_prototype_of(&mut self, obj: JsObject, proto: Option<JsObject>) -> Result<bool, JsError> {
        let rc = self.object(obj)?;
        {
            let data = rc.borrow();
            if data.prototype == proto {
                return Ok(true);
            }
            if !data.extensible {
                return Ok(false);
            }
        }
        let mut current = proto;
        let mut depth = 0;
        while let Some(id) = current {
            if id == obj {
                return Ok(false);
            }
            if depth > self.options.max_prototype_depth {
                return Err(self.prototype_depth_error());
            }
            depth += 1;
            current = self.object(id)?.borrow().prototype;
        }
        rc.borrow_mut().prototype = proto;
        Ok(true)
    }

    pub fn prevent_extensions(&mut self, obj: JsObject) -> Result<(), JsError> {
        self.object(obj)?.borrow_mut().extensible = false;
        Ok(())
    }

    pub fn is_extensible(&self, obj: JsObject) -> Result<bool, JsError> {
        Ok(self.object(obj)?.borrow().extensible)
    }

    pub fn is_callable(&self, val: &JsValue) -> bool {
        match val {
            JsValue::Object(o) => self
                .get_object(*o)
                .is_some_and(|data| data.borrow().is_callable()),
            _ => false,
        }
    }

    pub fn call(&mut self, func: &JsValue, this: &JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
        let behavior = match func {
            JsValue::Object(o) => self
                .object(*o)?
                .borrow()
                .callable
                .as_ref()
                .map(|f| f.behavior.clone()),
            _ => None,
        };
        match behavior {
            Some(behavior) => behavior.call(self, this, args),
            None => Err(JsError::type_error(format!("{func} is not a function"))),
        }
    }

    /// `new func(...args)`: the instance inherits from `func.prototype`
    /// (falling back to `Object.prototype`); an object returned by the
    /// constructor behaviour replaces it.
    pub fn construct(&mut self, func: &JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
        let ctor = match func {
            JsValue::Object(o) => self
                .object(*o)?
                .borrow()
                .constructor
                .as_ref()
                .map(|f| f.behavior.clone())
                .map(|behavior| (*o, behavior)),
            _ => None,
        };
        let Some((func_obj, behavior)) = ctor else {
            return Err(JsError::type_error(format!("{func} is not a constructor")));
        };
        let proto = match self.get(func_obj, "prototype")? {
            JsValue::Object(p) => p,
            _ => self.object_prototype,
        };
        let instance = JsValue::Object(self.create_object_with_proto(Some(proto)));
        let result = behavior.call(self, &instance, args)?;
        Ok(if result.is_object() { result } else { instance })
    }

    /// Pulls the next value from an iterator object; `None` once exhausted.
    /// Re-entering a producer that is still running is a TypeError.
    pub fn iterator_next(&mut self, iter: JsObject) -> Result<Option<JsValue>, JsError> {
        let rc = self.object(iter)?;
        let producer = {
            let data = rc.borrow();
            if matches!(data.slots.get("Done"), Some(JsValue::Boolean(true))) {
                return Ok(None);
            }
            data.iterator_next.clone()
        };
        let Some(producer) = producer else {
            return Err(JsError::type_error("object is not an iterator"));
        };
        let mut next = producer
            .try_borrow_mut()
            .map_err(|_| JsError::type_error("Generator is already running"))?;
        let result = (&mut *next)(self);
        drop(next);
        if let Ok(None) = &result {
            rc.borrow_mut().slots.insert("Done", JsValue::TRUE);
        }
        result
    }
}

fn set_absent(data: &mut JsObjectData, key: &JsString, value: &JsValue) -> Result<SetOutcome, JsError> {
    let extensible = data.extensible;
    if let Some(elems) = data.array_elements.as_mut() {
        if *key == "length" {
            let len = array_length(value, elems.len())?;
            elems.resize(len, JsValue::Undefined);
            return Ok(SetOutcome::Stored);
        }
        if let Some(idx) = key.array_index() {
            if idx < elems.len() {
                elems[idx] = value.clone();
                return Ok(SetOutcome::Stored);
            }
            if !extensible {
                return Ok(SetOutcome::Ignored);
            }
            if idx - elems.len() <= MAX_DENSE_GAP {
                elems.resize(idx + 1, JsValue::Undefined);
                elems[idx] = value.clone();
                return Ok(SetOutcome::Stored);
            }
        }
    }
    if !extensible {
        return Ok(SetOutcome::Ignored);
    }
    data.properties
        .insert(key.clone(), Property::data_default(value.clone()));
    Ok(SetOutcome::Stored)
}

fn array_length(value: &JsValue, current: usize) -> Result<usize, JsError> {
    match value {
        JsValue::Number(n)
            if *n >= 0.0 && n.fract() == 0.0 && *n <= (current + MAX_DENSE_GAP) as f64 =>
        {
            Ok(*n as usize)
        }
        _ => Err(JsError::range_error("Invalid array length")),
    }
}
