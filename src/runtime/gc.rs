use super::*;

/// Mark-phase state handed to [`Callable::trace`] and the object tracers.
pub struct Tracer {
    worklist: Vec<JsObject>,
    seen_envs: FxHashSet<usize>,
}

impl Tracer {
    fn new() -> Self {
        Self {
            worklist: Vec::new(),
            seen_envs: FxHashSet::default(),
        }
    }

    pub fn mark_object(&mut self, obj: JsObject) {
        self.worklist.push(obj);
    }

    pub fn mark_value(&mut self, val: &JsValue) {
        if let JsValue::Object(o) = val {
            self.worklist.push(*o);
        }
    }

    /// Marks every binding of `env` and its enclosing scopes.
    pub fn mark_env(&mut self, env: &EnvRef) {
        let mut current = Some(env.clone());
        while let Some(e) = current {
            if !self.seen_envs.insert(Rc::as_ptr(&e) as usize) {
                break;
            }
            let borrowed = e.borrow();
            for binding in borrowed.lexical.values().chain(borrowed.vars.values()) {
                self.mark_value(&binding.value);
            }
            if let Some(global) = borrowed.global_object {
                self.worklist.push(global);
            }
            current = borrowed.parent.clone();
        }
    }
}

impl Realm {
    pub(crate) fn allocate_object_slot(&mut self, mut data: JsObjectData) -> JsObject {
        self.gc_alloc_count += 1;
        let idx = self.free_list.pop().unwrap_or(self.objects.len());
        let id = JsObject { id: idx as u64 };
        data.id = id;
        let slot = Some(Rc::new(RefCell::new(data)));
        if idx == self.objects.len() {
            self.objects.push(slot);
        } else {
            self.objects[idx] = slot;
        }
        id
    }

    /// Collects once `gc_threshold` objects were allocated since the last
    /// cycle. Call only where every live handle is reachable from the realm
    /// or passed in as an extra root.
    pub fn maybe_gc(&mut self, extra_envs: &[EnvRef], extra_values: &[JsValue]) -> bool {
        if self.gc_alloc_count < self.options.gc_threshold {
            return false;
        }
        self.collect_garbage(extra_envs, extra_values);
        true
    }

    /// Mark/sweep over the object arena. Returns the number of objects freed.
    pub fn collect_garbage(&mut self, extra_envs: &[EnvRef], extra_values: &[JsValue]) -> usize {
        self.gc_alloc_count = 0;
        let obj_count = self.objects.len();
        let mut marks = vec![false; obj_count];

        // Roots
        let mut tracer = Tracer::new();
        tracer.mark_env(&self.global_env);
        tracer.mark_object(self.global_object);
        for proto in self.intrinsics() {
            tracer.mark_object(proto);
        }
        for env in extra_envs {
            tracer.mark_env(env);
        }
        for val in extra_values {
            tracer.mark_value(val);
        }

        // Mark
        while let Some(obj) = tracer.worklist.pop() {
            let idx = obj.id as usize;
            if idx >= obj_count || marks[idx] {
                continue;
            }
            marks[idx] = true;
            let obj_rc = match &self.objects[idx] {
                Some(rc) => rc.clone(),
                None => continue,
            };
            obj_rc.borrow().trace(&mut tracer);
        }

        // Sweep
        let mut swept = 0;
        for (i, marked) in marks.iter().enumerate() {
            if !marked && self.objects[i].is_some() {
                self.objects[i] = None;
                self.free_list.push(i);
                swept += 1;
            }
        }
        tracing::debug!(swept, live = obj_count - self.free_list.len(), "garbage collection");
        swept
    }

    /// Number of objects currently allocated.
    pub fn live_objects(&self) -> usize {
        self.objects.iter().filter(|slot| slot.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CapturingFn {
        env: EnvRef,
    }

    impl Callable for CapturingFn {
        fn call(&self, realm: &mut Realm, _this: &JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
            realm.get_binding(&self.env, "captured")
        }

        fn trace(&self, tracer: &mut Tracer) {
            tracer.mark_env(&self.env);
        }
    }

    #[test]
    fn unreachable_objects_are_swept() {
        let mut realm = Realm::new();
        let baseline = realm.live_objects();
        let kept = realm.create_object();
        let _dropped = realm.create_object();
        let swept = realm.collect_garbage(&[], &[JsValue::Object(kept)]);
        assert_eq!(swept, 1);
        assert_eq!(realm.live_objects(), baseline + 1);
        assert!(realm.get_object(kept).is_some());
    }

    #[test]
    fn freed_slots_are_reused() {
        let mut realm = Realm::new();
        let garbage = realm.create_object();
        realm.collect_garbage(&[], &[]);
        assert!(realm.get_object(garbage).is_none());
        let fresh = realm.create_object();
        assert_eq!(fresh, garbage);
    }

    #[test]
    fn cycles_without_roots_are_collected() {
        let mut realm = Realm::new();
        let a = realm.create_object();
        let b = realm.create_object_with_proto(Some(a));
        realm.set(a, "peer", JsValue::Object(b)).unwrap();
        assert_eq!(realm.collect_garbage(&[], &[]), 2);
    }

    #[test]
    fn global_bindings_and_prototype_chains_are_roots() {
        let mut realm = Realm::new();
        let proto = realm.create_object();
        let child = realm.create_object_with_proto(Some(proto));
        let env = realm.global_env();
        realm
            .declare(&env, "child", BindingKind::Let, JsValue::Object(child))
            .unwrap();
        assert_eq!(realm.collect_garbage(&[], &[]), 0);
        assert!(realm.get_object(proto).is_some());
    }

    #[test]
    fn callables_trace_their_captures() {
        let mut realm = Realm::new();
        let scope = Environment::new_function(&realm.global_env());
        let captured = realm.create_object();
        realm
            .declare(&scope, "captured", BindingKind::Let, JsValue::Object(captured))
            .unwrap();
        let func = realm.create_function(JsFunction::new("f", 0, CapturingFn { env: scope }));
        realm.collect_garbage(&[], &[JsValue::Object(func)]);
        assert!(realm.get_object(captured).is_some());
        let result = realm.call(&JsValue::Object(func), &JsValue::Undefined, &[]).unwrap();
        assert!(matches!(result, JsValue::Object(o) if o == captured));
    }

    #[test]
    fn maybe_gc_waits_for_threshold() {
        let mut realm = Realm::with_options(RealmOptions {
            gc_threshold: 3,
            ..RealmOptions::default()
        });
        realm.collect_garbage(&[], &[]);
        realm.create_object();
        assert!(!realm.maybe_gc(&[], &[]));
        realm.create_object();
        realm.create_object();
        assert!(realm.maybe_gc(&[], &[]));
        assert_eq!(realm.gc_alloc_count, 0);
    }
}
