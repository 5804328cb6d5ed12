use super::*;

impl Environment {
    fn with_scope(parent: Option<EnvRef>, scope: ScopeKind) -> EnvRef {
        Rc::new(RefCell::new(Environment {
            lexical: FxHashMap::default(),
            vars: FxHashMap::default(),
            parent,
            scope,
            annex_b_names: FxHashSet::default(),
            global_object: None,
        }))
    }

    pub fn new_global() -> EnvRef {
        Self::with_scope(None, ScopeKind::Global)
    }

    pub fn new_function(parent: &EnvRef) -> EnvRef {
        Self::with_scope(Some(parent.clone()), ScopeKind::Function)
    }

    pub fn new_block(parent: &EnvRef) -> EnvRef {
        Self::with_scope(Some(parent.clone()), ScopeKind::Block)
    }

    pub fn parent(&self) -> Option<EnvRef> {
        self.parent.clone()
    }

    pub fn global_object(&self) -> Option<JsObject> {
        self.global_object
    }

    pub fn is_block(&self) -> bool {
        self.scope == ScopeKind::Block
    }

    /// Pre-registers a lexical slot so that reads before the declaration
    /// runs fail with the TDZ error instead of "not defined".
    pub fn create_uninitialized(&mut self, name: &str, kind: BindingKind) {
        self.lexical
            .insert(name.to_string(), Binding::uninitialized(kind));
    }

    pub fn has_var_binding(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn has_lexical_binding(&self, name: &str) -> bool {
        self.lexical.contains_key(name)
    }

    pub fn is_annex_b_binding(&self, name: &str) -> bool {
        self.annex_b_names.contains(name)
    }

    /// Whether this scope or any enclosing one declares `name`.
    pub fn has_binding(&self, name: &str) -> bool {
        if self.lexical.contains_key(name) || self.vars.contains_key(name) {
            return true;
        }
        match &self.parent {
            Some(parent) => parent.borrow().has_binding(name),
            None => false,
        }
    }

    /// Nearest enclosing function or global scope, skipping blocks.
    pub fn get_function_scope(env: &EnvRef) -> EnvRef {
        let mut current = env.clone();
        loop {
            let parent = {
                let scope = current.borrow();
                if !scope.is_block() {
                    break;
                }
                scope.parent.clone()
            };
            match parent {
                Some(p) => current = p,
                None => break,
            }
        }
        current
    }

    fn binding_is_lexical(&self, kind: BindingKind) -> bool {
        match kind {
            BindingKind::Let | BindingKind::Const => true,
            BindingKind::Function => self.is_block(),
            BindingKind::Var => false,
        }
    }
}

/// Where an outward binding walk stopped.
enum Resolved {
    Value(JsValue),
    /// A scope linked to a global object: its var (if any) and its parent.
    Global(JsObject, Option<JsValue>, Option<EnvRef>),
    Outer(Option<EnvRef>),
}

enum AssignStep {
    Global(JsObject, Option<EnvRef>),
    Outer(Option<EnvRef>),
}

impl Realm {
    /// Declares `name` in exactly this scope.
    ///
    /// `let`/`const` (and block-level functions) go to the lexical record;
    /// redeclaring an initialised one fails. `var` and function-scope
    /// functions go to the var record and, at the global scope, appear as
    /// enumerable non-configurable properties of the global object.
    pub fn declare(
        &mut self,
        env: &EnvRef,
        name: &str,
        kind: BindingKind,
        value: JsValue,
    ) -> Result<(), JsError> {
        let global = {
            let mut scope = env.borrow_mut();
            if scope.binding_is_lexical(kind) {
                let sloppy = !self.options.strict;
                if let Some(existing) = scope.lexical.get_mut(name) {
                    // B.3.2.4: sloppy blocks may repeat a function declaration
                    let repeated_function = sloppy
                        && existing.kind == BindingKind::Function
                        && kind == BindingKind::Function;
                    if existing.initialized && !repeated_function {
                        return Err(JsError::AlreadyDeclared(name.to_string()));
                    }
                    *existing = Binding::new(kind, value);
                } else {
                    scope
                        .lexical
                        .insert(name.to_string(), Binding::new(kind, value));
                }
                return Ok(());
            }

            match scope.vars.get_mut(name) {
                Some(existing) => {
                    existing.value = value.clone();
                    existing.initialized = true;
                    if kind == BindingKind::Function {
                        existing.kind = kind;
                    }
                }
                None => {
                    scope
                        .vars
                        .insert(name.to_string(), Binding::new(kind, value.clone()));
                }
            }
            scope.annex_b_names.remove(name);
            scope.global_object
        };
        if let Some(global) = global {
            self.mirror_global_var(global, name, value, false)?;
        }
        Ok(())
    }

    /// Resolves `name` outward from `env`.
    pub fn get_binding(&mut self, env: &EnvRef, name: &str) -> Result<JsValue, JsError> {
        let mut current = Some(env.clone());
        while let Some(e) = current {
            let step = {
                let scope = e.borrow();
                if let Some(b) = scope.lexical.get(name) {
                    if !b.initialized {
                        return Err(JsError::Uninitialized(name.to_string()));
                    }
                    Resolved::Value(b.value.clone())
                } else if let Some(global) = scope.global_object {
                    Resolved::Global(
                        global,
                        scope.vars.get(name).map(|b| b.value.clone()),
                        scope.parent.clone(),
                    )
                } else if let Some(b) = scope.vars.get(name) {
                    Resolved::Value(b.value.clone())
                } else {
                    Resolved::Outer(scope.parent.clone())
                }
            };
            match step {
                Resolved::Value(v) => return Ok(v),
                Resolved::Global(global, var, parent) => {
                    // The global object is authoritative for var bindings
                    if self.has_property(global, name)? {
                        return self.get(global, name);
                    }
                    if let Some(v) = var {
                        return Ok(v);
                    }
                    current = parent;
                }
                Resolved::Outer(parent) => current = parent,
            }
        }
        Err(JsError::NotDefined(name.to_string()))
    }

    /// Assigns to an existing binding found by walking outward. Never
    /// creates an implicit global.
    pub fn set_binding(&mut self, env: &EnvRef, name: &str, value: JsValue) -> Result<(), JsError> {
        let mut current = Some(env.clone());
        while let Some(e) = current {
            let step = {
                let mut scope = e.borrow_mut();
                if let Some(b) = scope.lexical.get_mut(name) {
                    assign(b, name, value)?;
                    return Ok(());
                }
                if let Some(global) = scope.global_object {
                    AssignStep::Global(global, scope.parent.clone())
                } else if let Some(b) = scope.vars.get_mut(name) {
                    assign(b, name, value)?;
                    return Ok(());
                } else {
                    AssignStep::Outer(scope.parent.clone())
                }
            };
            match step {
                AssignStep::Global(global, parent) => {
                    if self.has_property(global, name)? {
                        // syncs the var binding in lock-step
                        return self.set(global, name, value);
                    }
                    if let Some(b) = e.borrow_mut().vars.get_mut(name) {
                        return assign(b, name, value);
                    }
                    current = parent;
                }
                AssignStep::Outer(parent) => current = parent,
            }
        }
        Err(JsError::NotDefined(name.to_string()))
    }

    /// Assigns in exactly this scope, creating a var binding when absent.
    pub fn set_in_current_scope(
        &mut self,
        env: &EnvRef,
        name: &str,
        value: JsValue,
    ) -> Result<(), JsError> {
        let global = {
            let mut scope = env.borrow_mut();
            if let Some(b) = scope.lexical.get_mut(name) {
                return assign(b, name, value);
            }
            match scope.vars.get_mut(name) {
                Some(b) => assign(b, name, value.clone())?,
                None => {
                    scope.vars.insert(
                        name.to_string(),
                        Binding::new(BindingKind::Var, value.clone()),
                    );
                }
            }
            scope.global_object
        };
        if let Some(global) = global {
            self.mirror_global_var(global, name, value, false)?;
        }
        Ok(())
    }

    /// Hoists a `var`: creates the binding only if this scope has no binding
    /// of any kind for `name`. At the global scope the mirrored property is
    /// configurable iff `deletable`, and an existing global property is left
    /// untouched.
    pub fn declare_var_no_duplicate(
        &mut self,
        env: &EnvRef,
        name: &str,
        value: JsValue,
        deletable: bool,
    ) -> Result<(), JsError> {
        let global = {
            let mut scope = env.borrow_mut();
            if scope.lexical.contains_key(name) || scope.vars.contains_key(name) {
                return Ok(());
            }
            scope.vars.insert(
                name.to_string(),
                Binding::new(BindingKind::Var, value.clone()),
            );
            scope.global_object
        };
        let Some(global) = global else {
            return Ok(());
        };
        if let Some(existing) = self.get_own_property(global, name)? {
            // keep the binding in step with the property that already exists
            if let Some(current) = existing.value()
                && let Some(b) = env.borrow_mut().vars.get_mut(name)
            {
                b.value = current.clone();
            }
            return Ok(());
        }
        let data = self.object(global)?;
        data.borrow_mut()
            .insert_property(name, Property::data(value, true, true, deletable));
        Ok(())
    }

    /// Annex B.3.3: makes a block-level function declaration visible as a
    /// `var` of the nearest function (or global) scope. Refused when any
    /// block between the declaring block and that scope, or the scope
    /// itself, has a lexical binding of the same name. Returns whether the
    /// var binding was created or updated; a failed global mirror is an
    /// error.
    pub fn declare_annex_b_function(
        &mut self,
        block_env: &EnvRef,
        name: &str,
        value: JsValue,
    ) -> Result<bool, JsError> {
        if self.options.strict || !self.options.annex_b {
            return Ok(false);
        }
        let mut current = block_env.borrow().parent.clone();
        let target = loop {
            let Some(e) = current else {
                return Ok(false);
            };
            let next = {
                let scope = e.borrow();
                if scope.lexical.contains_key(name) {
                    tracing::debug!(name, "annex B hoisting blocked by lexical binding");
                    return Ok(false);
                }
                if !scope.is_block() {
                    None
                } else {
                    Some(scope.parent.clone())
                }
            };
            match next {
                Some(parent) => current = parent,
                None => break e,
            }
        };

        let global = {
            let mut scope = target.borrow_mut();
            match scope.vars.get_mut(name) {
                Some(b) => b.value = value.clone(),
                None => {
                    scope.vars.insert(
                        name.to_string(),
                        Binding::new(BindingKind::Var, value.clone()),
                    );
                    scope.annex_b_names.insert(name.to_string());
                }
            }
            scope.global_object
        };
        if let Some(global) = global {
            self.mirror_global_var(global, name, value, false)?;
        }
        tracing::debug!(name, "annex B function hoisted");
        Ok(true)
    }

    /// Links `env` and `obj` as the global environment/object pair. Existing
    /// var bindings are mirrored as non-enumerable properties.
    pub fn set_global_object(&mut self, env: &EnvRef, obj: JsObject) {
        let vars: Vec<(String, JsValue)> = {
            let mut scope = env.borrow_mut();
            scope.global_object = Some(obj);
            scope
                .vars
                .iter()
                .map(|(name, b)| (name.clone(), b.value.clone()))
                .collect()
        };
        if env.borrow().parent.is_none() {
            self.global_env = env.clone();
            self.global_object = obj;
        }
        let Some(data) = self.get_object(obj) else {
            return;
        };
        let mut data = data.borrow_mut();
        data.global_env = Some(env.clone());
        for (name, value) in vars.iter().map(|(n, v)| (JsString::from(n), v)) {
            if !data.properties.contains_key(&name) {
                data.insert_builtin(name, value.clone());
            }
        }
        tracing::debug!(global = obj.id, mirrored = vars.len(), "global object bound");
    }

    /// Installs a builtin before user code runs: a var binding plus a
    /// non-enumerable global property.
    pub fn define_builtin(&mut self, name: &str, value: JsValue) {
        let env = self.global_env.clone();
        env.borrow_mut().vars.insert(
            name.to_string(),
            Binding::new(BindingKind::Var, value.clone()),
        );
        if let Some(data) = self.get_object(self.global_object) {
            data.borrow_mut().insert_builtin(name, value);
        }
    }

    /// Writes a global var's value onto the global object without invoking
    /// accessors. New properties get the var attributes.
    fn mirror_global_var(
        &mut self,
        global: JsObject,
        name: &str,
        value: JsValue,
        configurable: bool,
    ) -> Result<(), JsError> {
        let key = JsString::from(name);
        let data = self.object(global)?;
        let mut data = data.borrow_mut();
        match data.properties.get_mut(&key) {
            Some(Property::Data { value: slot, .. }) => *slot = value,
            Some(Property::Accessor { .. }) => {}
            None => {
                data.insert_property(key, Property::data(value, true, true, configurable));
            }
        }
        Ok(())
    }

    /// Propagates a global object property write into the var binding of the
    /// same name. Keys that are not well-formed never name a binding.
    pub(crate) fn sync_global_binding(&self, data: &JsObjectData, key: &JsString) {
        let Some(env) = &data.global_env else {
            return;
        };
        let Some(value) = data.properties.get(key).and_then(Property::value) else {
            return;
        };
        let Some(name) = key.to_well_formed_string() else {
            return;
        };
        if let Some(b) = env.borrow_mut().vars.get_mut(&name) {
            b.value = value.clone();
        }
    }

    /// Drops the var binding behind a deleted global property.
    pub(crate) fn unlink_global_binding(&self, data: &JsObjectData, key: &JsString) {
        if let Some(env) = &data.global_env
            && let Some(name) = key.to_well_formed_string()
        {
            let mut scope = env.borrow_mut();
            scope.vars.remove(&name);
            scope.annex_b_names.remove(&name);
        }
    }
}

fn assign(binding: &mut Binding, name: &str, value: JsValue) -> Result<(), JsError> {
    if !binding.initialized {
        return Err(JsError::Uninitialized(name.to_string()));
    }
    if !binding.mutable {
        return Err(JsError::ConstAssignment(name.to_string()));
    }
    binding.value = value;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(v: &JsValue) -> f64 {
        match v {
            JsValue::Number(n) => *n,
            other => panic!("expected number, got {other:?}"),
        }
    }

    #[test]
    fn tdz_differs_from_not_defined() {
        let mut realm = Realm::new();
        let env = Environment::new_block(&realm.global_env());
        env.borrow_mut()
            .create_uninitialized("a", BindingKind::Let);
        assert!(matches!(
            realm.get_binding(&env, "a"),
            Err(JsError::Uninitialized(_))
        ));
        assert!(matches!(
            realm.set_binding(&env, "a", JsValue::Null),
            Err(JsError::Uninitialized(_))
        ));
        assert!(matches!(
            realm.get_binding(&env, "nope"),
            Err(JsError::NotDefined(_))
        ));
        realm
            .declare(&env, "a", BindingKind::Let, JsValue::Number(1.0))
            .unwrap();
        assert_eq!(num(&realm.get_binding(&env, "a").unwrap()), 1.0);
    }

    #[test]
    fn duplicate_lexical_is_rejected() {
        let mut realm = Realm::new();
        let env = realm.global_env();
        realm
            .declare(&env, "x", BindingKind::Let, JsValue::Null)
            .unwrap();
        assert!(matches!(
            realm.declare(&env, "x", BindingKind::Const, JsValue::Null),
            Err(JsError::AlreadyDeclared(_))
        ));
    }

    #[test]
    fn lexical_shadows_global_var() {
        let mut realm = Realm::new();
        let env = realm.global_env();
        realm
            .declare(&env, "v", BindingKind::Var, JsValue::Number(1.0))
            .unwrap();
        realm
            .declare(&env, "v", BindingKind::Let, JsValue::Number(2.0))
            .unwrap();
        assert_eq!(num(&realm.get_binding(&env, "v").unwrap()), 2.0);
        // the global object still carries the var
        let global = realm.global_object();
        assert_eq!(num(&realm.get(global, "v").unwrap()), 1.0);
    }

    #[test]
    fn const_assignment_fails() {
        let mut realm = Realm::new();
        let env = Environment::new_function(&realm.global_env());
        realm
            .declare(&env, "k", BindingKind::Const, JsValue::TRUE)
            .unwrap();
        let inner = Environment::new_block(&env);
        assert!(matches!(
            realm.set_binding(&inner, "k", JsValue::FALSE),
            Err(JsError::ConstAssignment(_))
        ));
    }

    #[test]
    fn set_binding_walks_outward_without_implicit_globals() {
        let mut realm = Realm::new();
        let outer = Environment::new_function(&realm.global_env());
        realm
            .declare(&outer, "n", BindingKind::Var, JsValue::Number(1.0))
            .unwrap();
        let inner = Environment::new_block(&outer);
        realm
            .set_binding(&inner, "n", JsValue::Number(5.0))
            .unwrap();
        assert_eq!(num(&realm.get_binding(&outer, "n").unwrap()), 5.0);
        assert!(matches!(
            realm.set_binding(&inner, "ghost", JsValue::Null),
            Err(JsError::NotDefined(_))
        ));
        assert!(!realm.global_env().borrow().has_binding("ghost"));
    }

    #[test]
    fn global_var_is_mirrored_both_ways() {
        let mut realm = Realm::new();
        let env = realm.global_env();
        let global = realm.global_object();
        realm
            .declare(&env, "y", BindingKind::Var, JsValue::Number(1.0))
            .unwrap();
        let prop = realm.get_own_property(global, "y").unwrap().unwrap();
        assert!(prop.enumerable());
        assert!(!prop.configurable());

        realm.set(global, "y", JsValue::Number(2.0)).unwrap();
        assert_eq!(num(&realm.get_binding(&env, "y").unwrap()), 2.0);
        assert_eq!(num(&env.borrow().vars["y"].value), 2.0);

        realm.set_binding(&env, "y", JsValue::Number(3.0)).unwrap();
        assert_eq!(num(&realm.get(global, "y").unwrap()), 3.0);
    }

    #[test]
    fn global_object_properties_resolve_as_bindings() {
        let mut realm = Realm::new();
        let env = realm.global_env();
        let global = realm.global_object();
        realm.set(global, "late", JsValue::TRUE).unwrap();
        assert!(matches!(
            realm.get_binding(&env, "late").unwrap(),
            JsValue::Boolean(true)
        ));
        realm.set_binding(&env, "late", JsValue::FALSE).unwrap();
        assert!(matches!(
            realm.get(global, "late").unwrap(),
            JsValue::Boolean(false)
        ));
    }

    #[test]
    fn var_hoisting_never_overwrites() {
        let mut realm = Realm::new();
        let env = Environment::new_function(&realm.global_env());
        realm
            .declare(&env, "f", BindingKind::Function, JsValue::Number(1.0))
            .unwrap();
        realm
            .declare_var_no_duplicate(&env, "f", JsValue::Undefined, false)
            .unwrap();
        assert_eq!(num(&realm.get_binding(&env, "f").unwrap()), 1.0);
        realm
            .declare_var_no_duplicate(&env, "g", JsValue::Undefined, false)
            .unwrap();
        assert!(env.borrow().has_var_binding("g"));
    }

    #[test]
    fn deletable_global_var_is_configurable() {
        let mut realm = Realm::new();
        let env = realm.global_env();
        let global = realm.global_object();
        realm
            .declare_var_no_duplicate(&env, "e", JsValue::Number(4.0), true)
            .unwrap();
        assert!(realm.get_own_property(global, "e").unwrap().unwrap().configurable());
        assert!(realm.delete_property(global, "e").unwrap());
        assert!(!env.borrow().has_var_binding("e"));
        assert!(matches!(
            realm.get_binding(&env, "e"),
            Err(JsError::NotDefined(_))
        ));
    }

    #[test]
    fn var_hoisting_adopts_existing_global_property() {
        let mut realm = Realm::new();
        let env = realm.global_env();
        let global = realm.global_object();
        realm.set(global, "pre", JsValue::Number(9.0)).unwrap();
        realm
            .declare_var_no_duplicate(&env, "pre", JsValue::Undefined, false)
            .unwrap();
        assert_eq!(num(&realm.get_binding(&env, "pre").unwrap()), 9.0);
        assert_eq!(num(&env.borrow().vars["pre"].value), 9.0);
    }

    #[test]
    fn set_in_current_scope_creates_local_var() {
        let mut realm = Realm::new();
        let outer = Environment::new_function(&realm.global_env());
        realm
            .declare(&outer, "z", BindingKind::Var, JsValue::Number(1.0))
            .unwrap();
        let inner = Environment::new_function(&outer);
        realm
            .set_in_current_scope(&inner, "z", JsValue::Number(2.0))
            .unwrap();
        assert_eq!(num(&realm.get_binding(&inner, "z").unwrap()), 2.0);
        assert_eq!(num(&realm.get_binding(&outer, "z").unwrap()), 1.0);
    }

    #[test]
    fn function_scope_skips_blocks() {
        let realm = Realm::new();
        let func = Environment::new_function(&realm.global_env());
        let block = Environment::new_block(&Environment::new_block(&func));
        assert!(Rc::ptr_eq(&Environment::get_function_scope(&block), &func));
        let global = realm.global_env();
        assert!(Rc::ptr_eq(&Environment::get_function_scope(&global), &global));
    }

    #[test]
    fn block_function_is_lexical() {
        let mut realm = Realm::new();
        let func = Environment::new_function(&realm.global_env());
        let block = Environment::new_block(&func);
        realm
            .declare(&block, "h", BindingKind::Function, JsValue::Null)
            .unwrap();
        assert!(block.borrow().has_lexical_binding("h"));
        assert!(!func.borrow().has_var_binding("h"));
        // sloppy mode tolerates a repeated block function
        realm
            .declare(&block, "h", BindingKind::Function, JsValue::TRUE)
            .unwrap();
    }

    #[test]
    fn annex_b_hoists_to_function_scope() {
        let mut realm = Realm::new();
        let func = Environment::new_function(&realm.global_env());
        let block = Environment::new_block(&func);
        realm
            .declare(&block, "inner", BindingKind::Function, JsValue::Number(1.0))
            .unwrap();
        assert!(realm.declare_annex_b_function(&block, "inner", JsValue::Number(1.0)).unwrap());
        drop(block);
        assert_eq!(num(&realm.get_binding(&func, "inner").unwrap()), 1.0);
        assert!(func.borrow().is_annex_b_binding("inner"));
    }

    #[test]
    fn annex_b_blocked_by_intervening_let() {
        let mut realm = Realm::new();
        let func = Environment::new_function(&realm.global_env());
        let outer_block = Environment::new_block(&func);
        realm
            .declare(&outer_block, "f", BindingKind::Let, JsValue::Null)
            .unwrap();
        let inner_block = Environment::new_block(&outer_block);
        realm
            .declare(&inner_block, "f", BindingKind::Function, JsValue::TRUE)
            .unwrap();
        assert!(!realm.declare_annex_b_function(&inner_block, "f", JsValue::TRUE).unwrap());
        assert!(!func.borrow().has_var_binding("f"));
    }

    #[test]
    fn annex_b_blocked_by_function_scope_let() {
        let mut realm = Realm::new();
        let func = Environment::new_function(&realm.global_env());
        realm
            .declare(&func, "f", BindingKind::Let, JsValue::Null)
            .unwrap();
        let block = Environment::new_block(&func);
        assert!(!realm.declare_annex_b_function(&block, "f", JsValue::TRUE).unwrap());
    }

    #[test]
    fn annex_b_disabled_in_strict_realm() {
        let mut realm = Realm::with_options(RealmOptions {
            strict: true,
            ..RealmOptions::default()
        });
        let func = Environment::new_function(&realm.global_env());
        let block = Environment::new_block(&func);
        assert!(!realm.declare_annex_b_function(&block, "f", JsValue::TRUE).unwrap());
    }

    #[test]
    fn annex_b_at_global_scope_mirrors_property() {
        let mut realm = Realm::new();
        let global_env = realm.global_env();
        let block = Environment::new_block(&global_env);
        assert!(realm.declare_annex_b_function(&block, "top", JsValue::Number(3.0)).unwrap());
        let global = realm.global_object();
        assert_eq!(num(&realm.get(global, "top").unwrap()), 3.0);
        assert!(global_env.borrow().is_annex_b_binding("top"));

        // a later ordinary declaration is no longer Annex-B-only
        realm
            .declare(&global_env, "top", BindingKind::Var, JsValue::Number(4.0))
            .unwrap();
        assert!(!global_env.borrow().is_annex_b_binding("top"));
    }

    #[test]
    fn set_global_object_mirrors_existing_vars_hidden() {
        let mut realm = Realm::new();
        let env = Environment::new_global();
        env.borrow_mut().vars.insert(
            "builtin".to_string(),
            Binding::new(BindingKind::Var, JsValue::Number(1.0)),
        );
        let obj = realm.create_object();
        realm.set_global_object(&env, obj);
        let prop = realm.get_own_property(obj, "builtin").unwrap().unwrap();
        assert!(!prop.enumerable());
        assert_eq!(env.borrow().global_object(), Some(obj));
        assert_eq!(realm.global_object(), obj);
    }

    #[test]
    fn linked_nested_scope_still_reaches_outer_bindings() {
        let mut realm = Realm::new();
        let outer = Environment::new_function(&realm.global_env());
        realm
            .declare(&outer, "a", BindingKind::Var, JsValue::Number(1.0))
            .unwrap();
        let inner = Environment::new_block(&outer);
        let obj = realm.create_object();
        realm.set_global_object(&inner, obj);

        assert_eq!(num(&realm.get_binding(&inner, "a").unwrap()), 1.0);
        realm.set_binding(&inner, "a", JsValue::Number(2.0)).unwrap();
        assert_eq!(num(&realm.get_binding(&outer, "a").unwrap()), 2.0);
        assert!(!realm.has_own_property(obj, "a").unwrap());

        // the linked object still answers first for its own names
        realm.set(obj, "a", JsValue::Number(7.0)).unwrap();
        assert_eq!(num(&realm.get_binding(&inner, "a").unwrap()), 7.0);
        assert!(matches!(
            realm.get_binding(&inner, "missing"),
            Err(JsError::NotDefined(_))
        ));
        assert!(matches!(
            realm.set_binding(&inner, "missing", JsValue::Null),
            Err(JsError::NotDefined(_))
        ));
    }

    #[test]
    fn annex_b_reports_failed_global_mirror() {
        let mut realm = Realm::new();
        let func = Environment::new_function(&realm.global_env());
        realm.set_global_object(&func, JsObject { id: u64::MAX });
        let block = Environment::new_block(&func);
        assert!(matches!(
            realm.declare_annex_b_function(&block, "f", JsValue::TRUE),
            Err(JsError::TypeError(_))
        ));
    }

    #[test]
    fn builtins_are_hidden_from_enumeration() {
        let mut realm = Realm::new();
        realm.define_builtin("answer", JsValue::Number(42.0));
        let global = realm.global_object();
        let env = realm.global_env();
        assert!(!realm.get_own_property(global, "answer").unwrap().unwrap().enumerable());
        assert_eq!(num(&realm.get_binding(&env, "answer").unwrap()), 42.0);
    }
}
